use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Server settings, read from `ATRIUM_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub upload_dir: PathBuf,
    pub public_url: String,
    pub max_upload_bytes: usize,
    /// Users created at startup as `(id, username)`.
    pub seed_users: Vec<(i64, String)>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let host = var("ATRIUM_HOST", "0.0.0.0");
        let port: u16 = var("ATRIUM_PORT", "3000")
            .parse()
            .context("ATRIUM_PORT must be a port number")?;
        let max_upload_mb: usize = var("ATRIUM_MAX_UPLOAD_MB", "50")
            .parse()
            .context("ATRIUM_MAX_UPLOAD_MB must be a whole number")?;
        let max_upload_bytes = max_upload_mb
            .checked_mul(1024 * 1024)
            .context("ATRIUM_MAX_UPLOAD_MB is too large")?;
        let public_url = var("ATRIUM_PUBLIC_URL", &format!("http://localhost:{}", port));
        let seed_users = parse_seed_users(&var("ATRIUM_SEED_USERS", ""))?;

        Ok(Self {
            host,
            port,
            db_path: var("ATRIUM_DB_PATH", "atrium.db").into(),
            upload_dir: var("ATRIUM_UPLOAD_DIR", "./uploads").into(),
            public_url,
            max_upload_bytes,
            seed_users,
        })
    }
}

/// Parse `"1:alice,2:bob"`. Blank entries are skipped.
fn parse_seed_users(raw: &str) -> Result<Vec<(i64, String)>> {
    let mut users = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (id, name) = entry
            .split_once(':')
            .with_context(|| format!("ATRIUM_SEED_USERS entry '{}' is not id:username", entry))?;
        let id: i64 = id
            .trim()
            .parse()
            .with_context(|| format!("ATRIUM_SEED_USERS entry '{}' has a bad id", entry))?;
        if id <= 0 {
            bail!("ATRIUM_SEED_USERS entry '{}' needs a positive id", entry);
        }
        users.push((id, name.trim().to_string()));
    }
    Ok(users)
}
