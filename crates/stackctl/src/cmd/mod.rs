mod benchmark;
mod containers;
mod logs;
mod plans;
mod reset;
mod resources;
mod setup;
mod start;
mod status;
mod stop;

pub use benchmark::{BenchmarkArgs, run_benchmark};
pub use containers::run_container_status;
pub use logs::{LogsArgs, run_logs};
pub use plans::run_plans;
pub use reset::{ResetArgs, run_reset};
pub use resources::run_resources;
pub use setup::{SetupArgs, run_setup};
pub use start::{StartArgs, run_start};
pub use status::{StatusArgs, run_status};
pub use stop::run_stop;

/// Left-aligned columns separated by two spaces.
pub(crate) fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    let header_row: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    for row in std::iter::once(&header_row).chain(rows) {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_pads_columns() {
        let rows = vec![
            vec!["supabase-db".to_string(), "running".to_string()],
            vec!["kong".to_string(), "exited".to_string()],
        ];
        assert_eq!(
            table(&["NAME", "STATE"], &rows),
            "NAME         STATE\nsupabase-db  running\nkong         exited\n"
        );
    }
}
