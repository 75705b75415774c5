//! Server configuration loaded from the environment

use anyhow::{Context, Result};
use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{info, warn};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Clone)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
    /// Root directory of the filesystem blob store
    pub data_dir: PathBuf,
    pub admin_password: String,
    pub max_upload_bytes: usize,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind", &self.bind)
            .field("port", &self.port)
            .field("data_dir", &self.data_dir)
            .field("admin_password", &"<redacted>")
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::from([127, 0, 0, 1]),
            port: DEFAULT_PORT,
            data_dir: PathBuf::from("data"),
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ServerConfig {
    /// Load from process environment
    ///
    /// Recognized variables: `GUIDEBOOK_BIND`, `GUIDEBOOK_PORT`,
    /// `GUIDEBOOK_DATA_DIR`, `GUIDEBOOK_MAX_UPLOAD_BYTES`, `ADMIN_PASSWORD`
    /// and `ADMIN_PASSWORD_FILE` (a secret file, takes precedence).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let admin_password = match lookup("ADMIN_PASSWORD_FILE") {
            Some(path) => read_secret(&path)?,
            None => match lookup("ADMIN_PASSWORD").filter(|p| !p.is_empty()) {
                Some(password) => password,
                None => {
                    warn!("ADMIN_PASSWORD not set, using the built-in default password");
                    DEFAULT_ADMIN_PASSWORD.to_string()
                }
            },
        };

        Ok(Self {
            bind: try_load(&lookup, "GUIDEBOOK_BIND", defaults.bind)?,
            port: try_load(&lookup, "GUIDEBOOK_PORT", defaults.port)?,
            data_dir: lookup("GUIDEBOOK_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            admin_password,
            max_upload_bytes: try_load(
                &lookup,
                "GUIDEBOOK_MAX_UPLOAD_BYTES",
                defaults.max_upload_bytes,
            )?,
        })
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }
}

fn try_load<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr + fmt::Display,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {key} value: {raw}")),
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

fn read_secret(path: &str) -> Result<String> {
    let secret = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read admin password from {path}"))?;
    let secret = secret.trim();
    anyhow::ensure!(!secret.is_empty(), "Admin password file {path} is empty");
    Ok(secret.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.admin_password, DEFAULT_ADMIN_PASSWORD);
        assert_eq!(config.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn test_env_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("GUIDEBOOK_PORT", "9000"),
            ("GUIDEBOOK_DATA_DIR", "/srv/guides"),
            ("ADMIN_PASSWORD", "s3cret"),
            ("GUIDEBOOK_BIND", "0.0.0.0"),
        ]))
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.data_dir, PathBuf::from("/srv/guides"));
        assert_eq!(config.admin_password, "s3cret");
        assert!(config.bind.is_unspecified());
    }

    #[test]
    fn test_invalid_port_is_error() {
        let err = ServerConfig::from_lookup(lookup(&[("GUIDEBOOK_PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("GUIDEBOOK_PORT"));
    }

    #[test]
    fn test_password_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("admin_password");
        std::fs::write(&path, "from-file\n").unwrap();

        let config = ServerConfig::from_lookup(lookup(&[
            ("ADMIN_PASSWORD", "from-env"),
            ("ADMIN_PASSWORD_FILE", path.to_str().unwrap()),
        ]))
        .unwrap();
        assert_eq!(config.admin_password, "from-file");
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = ServerConfig::default();
        assert!(!format!("{config:?}").contains(DEFAULT_ADMIN_PASSWORD));
    }
}
