//! First-run setup: `.env` with fresh secrets, init files, volume directories.

use std::collections::BTreeMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use stack::{ProjectPaths, check_setup};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::config::StackConfig;
use crate::env_file;
use crate::error::{CtlError, CtlResult};
use crate::jwt;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);
const ENV_EXAMPLE: &str = ".env.example";
const PG_HBA: &str = "volumes/db/pg_hba.conf";
const PG_HBA_TEMPLATE: &str = include_str!("../templates/pg_hba.conf");
/// `.env` holds database and JWT secrets.
const ENV_FILE_MODE: u32 = 0o600;

/// Bring the project to a startable state. Existing files are left untouched.
pub async fn run(paths: &ProjectPaths, config: &StackConfig) -> CtlResult<()> {
    let client = reqwest::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .build()
        .map_err(|e| CtlError::Download(format!("build http client: {e}")))?;
    let source = config.init.source_url.trim_end_matches('/');

    if !paths.env_example().is_file() {
        download(&client, &format!("{source}/{ENV_EXAMPLE}"), &paths.env_example()).await?;
        info!("[OK] downloaded {ENV_EXAMPLE}");
    }
    if paths.env_file().is_file() {
        info!("[OK] .env exists, keeping it");
    } else {
        write_env_file(paths).await?;
        info!("[OK] .env created with generated secrets");
    }

    for rel in check_setup(paths).missing {
        let target = paths.root().join(rel);
        if rel == PG_HBA {
            write_atomic(&target, PG_HBA_TEMPLATE.as_bytes(), None).await?;
        } else {
            download(&client, &format!("{source}/{rel}"), &target).await?;
        }
        info!("[OK] {rel}");
    }

    for dir in volume_dirs(config) {
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| CtlError::Internal(format!("create {}: {e}", dir.display())))?;
    }
    info!("[OK] volume directories created");
    Ok(())
}

fn volume_dirs(config: &StackConfig) -> Vec<PathBuf> {
    let mut dirs = config.reset.data_dirs.clone();
    if !dirs.contains(&config.reset.storage_dir) {
        dirs.push(config.reset.storage_dir.clone());
    }
    dirs
}

/// Render `.env` from `.env.example`, replacing every secret.
async fn write_env_file(paths: &ProjectPaths) -> CtlResult<()> {
    let template = tokio::fs::read_to_string(paths.env_example())
        .await
        .map_err(|e| CtlError::Internal(format!("read {ENV_EXAMPLE}: {e}")))?;
    let secrets = generate_secrets()?;
    let content = env_file::render(&template, &secrets);
    write_atomic(&paths.env_file(), content.as_bytes(), Some(ENV_FILE_MODE)).await
}

/// Fresh values for every secret in `.env`. The API keys are signed with
/// the generated `JWT_SECRET`.
fn generate_secrets() -> CtlResult<BTreeMap<&'static str, String>> {
    let jwt_secret = random_hex(2);
    let now = Utc::now();
    let anon_key = jwt::api_key(&jwt_secret, "anon", now)?;
    let service_role_key = jwt::api_key(&jwt_secret, "service_role", now)?;

    Ok(BTreeMap::from([
        ("POSTGRES_PASSWORD", random_hex(1)),
        ("JWT_SECRET", jwt_secret),
        (env_file::ANON_KEY, anon_key),
        ("SERVICE_ROLE_KEY", service_role_key),
        ("DASHBOARD_PASSWORD", random_hex(1)),
        ("SECRET_KEY_BASE", random_hex(2)),
        ("VAULT_ENC_KEY", random_hex(1)),
        ("PG_META_CRYPTO_KEY", random_hex(1)),
    ]))
}

/// `32 * blocks` random hex characters.
fn random_hex(blocks: usize) -> String {
    (0..blocks)
        .map(|_| uuid::Uuid::new_v4().simple().to_string())
        .collect()
}

/// Download `url` to `target` through a temp file in the same directory.
async fn download(client: &reqwest::Client, url: &str, target: &Path) -> CtlResult<()> {
    debug!(url, target = %target.display(), "downloading");
    let response = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| CtlError::Download(format!("GET {url}: {e}")))?;

    create_parent(target).await?;
    let tmp = temp_path(target);
    if let Err(e) = stream_to_file(response, &tmp).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    atomic_rename(&tmp, target, None).await
}

/// Stream an HTTP response to a file.
async fn stream_to_file(mut response: reqwest::Response, path: &Path) -> CtlResult<()> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| CtlError::Internal(format!("create {}: {e}", path.display())))?;

    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| CtlError::Download(format!("read response chunk: {e}")))?
    {
        file.write_all(&chunk)
            .await
            .map_err(|e| CtlError::Internal(format!("write {}: {e}", path.display())))?;
    }

    file.flush()
        .await
        .map_err(|e| CtlError::Internal(format!("flush {}: {e}", path.display())))
}

async fn write_atomic(target: &Path, content: &[u8], mode: Option<u32>) -> CtlResult<()> {
    create_parent(target).await?;
    let tmp = temp_path(target);
    tokio::fs::write(&tmp, content)
        .await
        .map_err(|e| CtlError::Internal(format!("write {}: {e}", tmp.display())))?;
    atomic_rename(&tmp, target, mode).await
}

/// Set permissions then atomically rename to target. Cleans up temp on failure.
async fn atomic_rename(tmp_path: &Path, target: &Path, mode: Option<u32>) -> CtlResult<()> {
    let result = async {
        if let Some(mode) = mode {
            tokio::fs::set_permissions(tmp_path, std::fs::Permissions::from_mode(mode))
                .await
                .map_err(|e| CtlError::Internal(format!("chmod {}: {e}", target.display())))?;
        }
        tokio::fs::rename(tmp_path, target)
            .await
            .map_err(|e| CtlError::Internal(format!("rename to {}: {e}", target.display())))
    }
    .await;

    if result.is_err() {
        let _ = tokio::fs::remove_file(tmp_path).await;
    }
    result
}

fn temp_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    target.with_file_name(name)
}

async fn create_parent(path: &Path) -> CtlResult<()> {
    let Some(dir) = path.parent() else {
        return Ok(());
    };
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| CtlError::Internal(format!("create {}: {e}", dir.display())))
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use stack::INIT_FILES;

    use super::*;
    use crate::config;

    const ENV_EXAMPLE_BODY: &str = "\
# Secrets
POSTGRES_PASSWORD=your-super-secret-and-long-postgres-password
JWT_SECRET=your-super-secret-jwt-token-with-at-least-32-characters-long
ANON_KEY=old-anon
SERVICE_ROLE_KEY=old-service
DASHBOARD_USERNAME=supabase
DASHBOARD_PASSWORD=this_password_is_insecure_and_should_be_updated
SECRET_KEY_BASE=UpNVntn3cDxHJpq99YMc1T1AQgQpc8kfYTuRgBiYa15BLrx8etQoXz3gZv1
VAULT_ENC_KEY=your-encryption-key-32-chars-min
PG_META_CRYPTO_KEY=your-encryption-key-32-chars-min
KONG_HTTP_PORT=8000
";

    async fn project(source_url: &str) -> (tempfile::TempDir, ProjectPaths, StackConfig) {
        let dir = tempfile::tempdir().unwrap();
        let paths = ProjectPaths::new(dir.path().to_path_buf());
        let mut config = config::load(dir.path(), None).await.unwrap();
        config.init.source_url = source_url.to_string();
        (dir, paths, config)
    }

    async fn mock_sources(server: &MockServer) -> Vec<httpmock::Mock<'_>> {
        let mut mocks = vec![
            server
                .mock_async(|when, then| {
                    when.method(GET).path("/docker/.env.example");
                    then.status(200).body(ENV_EXAMPLE_BODY);
                })
                .await,
        ];
        for rel in INIT_FILES.iter().filter(|rel| **rel != PG_HBA) {
            let path = format!("/docker/{rel}");
            let body = format!("-- {rel}\n");
            mocks.push(
                server
                    .mock_async(|when, then| {
                        when.method(GET).path(&path);
                        then.status(200).body(&body);
                    })
                    .await,
            );
        }
        mocks
    }

    #[tokio::test]
    async fn bootstrap_fresh_project() {
        let server = MockServer::start_async().await;
        let mocks = mock_sources(&server).await;
        let (_dir, paths, config) = project(&server.url("/docker/")).await;

        run(&paths, &config).await.unwrap();

        for mock in &mocks {
            mock.assert_calls_async(1).await;
        }
        let report = check_setup(&paths);
        assert!(!report.needs_setup());
        assert!(report.missing.is_empty());

        let roles = std::fs::read_to_string(paths.root().join("volumes/db/roles.sql")).unwrap();
        assert_eq!(roles, "-- volumes/db/roles.sql\n");
        let hba = std::fs::read_to_string(paths.root().join(PG_HBA)).unwrap();
        assert!(hba.contains("scram-sha-256"));

        assert!(paths.root().join("volumes/db/data").is_dir());
        assert!(paths.root().join("volumes/storage").is_dir());
        assert!(!paths.root().join("volumes/db/roles.sql.part").exists());
    }

    #[tokio::test]
    async fn env_file_gets_fresh_secrets() {
        let server = MockServer::start_async().await;
        let _mocks = mock_sources(&server).await;
        let (_dir, paths, config) = project(&server.url("/docker")).await;

        run(&paths, &config).await.unwrap();

        let env = env_file::read(&paths.env_file()).unwrap();
        assert_eq!(env["JWT_SECRET"].len(), 64);
        assert_eq!(env["POSTGRES_PASSWORD"].len(), 32);
        assert_eq!(env["VAULT_ENC_KEY"].len(), 32);
        assert_ne!(env["ANON_KEY"], "old-anon");
        assert_eq!(env["ANON_KEY"].split('.').count(), 3);
        assert_ne!(env["DASHBOARD_PASSWORD"], "this_password_is_insecure_and_should_be_updated");
        assert_eq!(env["DASHBOARD_USERNAME"], "supabase");
        assert_eq!(env["KONG_HTTP_PORT"], "8000");

        let mode = std::fs::metadata(paths.env_file()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn existing_files_are_kept() {
        let server = MockServer::start_async().await;
        let mocks = mock_sources(&server).await;
        let (_dir, paths, config) = project(&server.url("/docker")).await;
        std::fs::write(paths.env_file(), "JWT_SECRET=mine\n").unwrap();
        std::fs::write(paths.env_example(), ENV_EXAMPLE_BODY).unwrap();
        std::fs::create_dir_all(paths.root().join("volumes/api")).unwrap();
        std::fs::write(paths.root().join("volumes/api/kong.yml"), "custom").unwrap();

        run(&paths, &config).await.unwrap();

        assert_eq!(std::fs::read_to_string(paths.env_file()).unwrap(), "JWT_SECRET=mine\n");
        assert_eq!(
            std::fs::read_to_string(paths.root().join("volumes/api/kong.yml")).unwrap(),
            "custom"
        );
        // .env.example was not fetched again.
        mocks[0].assert_calls_async(0).await;
    }

    #[tokio::test]
    async fn failed_download_is_an_error() {
        let server = MockServer::start_async().await;
        let _missing = server
            .mock_async(|when, then| {
                when.method(GET).path("/docker/.env.example");
                then.status(404);
            })
            .await;
        let (_dir, paths, config) = project(&server.url("/docker")).await;

        let err = run(&paths, &config).await.unwrap_err();
        assert!(matches!(err, CtlError::Download(_)), "got: {err}");
        assert!(!paths.env_example().exists());
        assert!(!paths.env_file().exists());
    }

    #[test]
    fn temp_path_sits_next_to_target() {
        assert_eq!(
            temp_path(Path::new("/p/volumes/db/jwt.sql")),
            PathBuf::from("/p/volumes/db/jwt.sql.part")
        );
    }
}
