//! HS256 API keys for the stack's `anon` and `service_role` roles.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

use crate::error::{CtlError, CtlResult};

const ISSUER: &str = "supabase";
const VALIDITY_DAYS: i64 = 5 * 365;

#[derive(Serialize)]
struct Header {
    alg: &'static str,
    typ: &'static str,
}

#[derive(Serialize)]
struct Claims<'a> {
    role: &'a str,
    iss: &'a str,
    iat: i64,
    exp: i64,
}

/// Sign an API key for `role`, issued at `now`.
pub fn api_key(secret: &str, role: &str, now: DateTime<Utc>) -> CtlResult<String> {
    let header = Header {
        alg: "HS256",
        typ: "JWT",
    };
    let claims = Claims {
        role,
        iss: ISSUER,
        iat: now.timestamp(),
        exp: (now + Duration::days(VALIDITY_DAYS)).timestamp(),
    };
    let signing_input = format!("{}.{}", segment(&header)?, segment(&claims)?);

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| CtlError::Internal(format!("hmac key: {e}")))?;
    mac.update(signing_input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{signing_input}.{signature}"))
}

/// Base64url JSON segment of a token.
fn segment<T: Serialize>(value: &T) -> CtlResult<String> {
    let json = serde_json::to_vec(value)
        .map_err(|e| CtlError::Internal(format!("encode jwt segment: {e}")))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}
