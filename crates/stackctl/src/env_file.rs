//! The project's `.env` file: reading values and rendering it from the template.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{CtlError, CtlResult};

pub const KONG_HTTP_PORT: &str = "KONG_HTTP_PORT";
pub const ANON_KEY: &str = "ANON_KEY";
const DEFAULT_KONG_HTTP_PORT: u16 = 8000;

/// Read `KEY=VALUE` pairs, with dotenv quoting and comment rules.
pub fn read(path: &Path) -> CtlResult<BTreeMap<String, String>> {
    let iter = dotenvy::from_path_iter(path)
        .map_err(|e| CtlError::Config(format!("read {}: {e}", path.display())))?;
    iter.map(|item| item.map_err(|e| CtlError::Config(format!("parse {}: {e}", path.display()))))
        .collect()
}

/// Kong's published HTTP port, falling back to compose's default.
pub fn kong_http_port(env: &BTreeMap<String, String>) -> CtlResult<u16> {
    match env.get(KONG_HTTP_PORT) {
        None => Ok(DEFAULT_KONG_HTTP_PORT),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| CtlError::Config(format!("{KONG_HTTP_PORT} is not a port: {raw}"))),
    }
}

/// Rewrite `template`, replacing the value of every `KEY=` line whose key is
/// in `overrides`. Comments, blank lines, ordering, and other keys are kept.
pub fn render(template: &str, overrides: &BTreeMap<&str, String>) -> String {
    let mut out = String::with_capacity(template.len());
    for line in template.lines() {
        let key = line
            .split_once('=')
            .map(|(k, _)| k.trim())
            .filter(|k| !k.starts_with('#'));
        match key.and_then(|k| overrides.get(k).map(|v| (k, v))) {
            Some((k, value)) => {
                out.push_str(k);
                out.push('=');
                out.push_str(value);
            }
            None => out.push_str(line),
        }
        out.push('\n');
    }
    out
}
