//! First-run detection.
//!
//! A project needs setup when its `.env` is missing or when more than
//! [`MAX_MISSING_INIT_FILES`] of the [`INIT_FILES`] are missing. A couple of
//! missing files are tolerated so that a partially customised checkout can
//! still start.

use serde::Serialize;

use crate::paths::ProjectPaths;

/// Initialization files mounted into the containers, relative to the project root.
pub const INIT_FILES: [&str; 10] = [
    "volumes/db/realtime.sql",
    "volumes/db/webhooks.sql",
    "volumes/db/roles.sql",
    "volumes/db/jwt.sql",
    "volumes/db/_supabase.sql",
    "volumes/db/logs.sql",
    "volumes/db/pooler.sql",
    "volumes/db/pg_hba.conf",
    "volumes/api/kong.yml",
    "volumes/pooler/pooler.exs",
];

pub const MAX_MISSING_INIT_FILES: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetupReport {
    pub env_present: bool,
    pub missing: Vec<&'static str>,
}

impl SetupReport {
    pub fn needs_setup(&self) -> bool {
        !self.env_present || self.missing.len() > MAX_MISSING_INIT_FILES
    }
}

/// Check which required files exist under the project root.
pub fn check_setup(paths: &ProjectPaths) -> SetupReport {
    let env_present = paths.env_file().is_file();
    let missing = INIT_FILES
        .iter()
        .filter(|rel| !paths.root().join(rel).is_file())
        .copied()
        .collect();
    SetupReport {
        env_present,
        missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project_with(env: bool, init_files: &[&str]) -> (tempfile::TempDir, ProjectPaths) {
        let dir = tempfile::tempdir().unwrap();
        let paths = ProjectPaths::new(dir.path().to_path_buf());
        if env {
            std::fs::write(paths.env_file(), "POSTGRES_PASSWORD=x\n").unwrap();
        }
        for rel in init_files {
            let path = dir.path().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, "-- init\n").unwrap();
        }
        (dir, paths)
    }

    #[test]
    fn complete_project_needs_no_setup() {
        let (_dir, paths) = project_with(true, &INIT_FILES);
        let report = check_setup(&paths);
        assert!(report.env_present);
        assert!(report.missing.is_empty());
        assert!(!report.needs_setup());
    }

    #[test]
    fn missing_env_always_needs_setup() {
        let (_dir, paths) = project_with(false, &INIT_FILES);
        let report = check_setup(&paths);
        assert!(!report.env_present);
        assert!(report.needs_setup());
    }

    #[test]
    fn two_missing_init_files_are_tolerated() {
        let (_dir, paths) = project_with(true, &INIT_FILES[2..]);
        let report = check_setup(&paths);
        assert_eq!(report.missing, vec![INIT_FILES[0], INIT_FILES[1]]);
        assert!(!report.needs_setup());
    }

    #[test]
    fn three_missing_init_files_need_setup() {
        let (_dir, paths) = project_with(true, &INIT_FILES[3..]);
        let report = check_setup(&paths);
        assert_eq!(report.missing.len(), 3);
        assert!(report.needs_setup());
    }

    #[test]
    fn empty_project_reports_everything_missing() {
        let (_dir, paths) = project_with(false, &[]);
        let report = check_setup(&paths);
        assert_eq!(report.missing.len(), INIT_FILES.len());
        assert!(report.needs_setup());
    }

    #[test]
    fn directory_in_place_of_file_counts_as_missing() {
        let (dir, paths) = project_with(true, &INIT_FILES[1..]);
        std::fs::create_dir_all(dir.path().join(INIT_FILES[0])).unwrap();
        let report = check_setup(&paths);
        assert_eq!(report.missing, vec![INIT_FILES[0]]);
    }
}
