//! Daemon configuration, loaded from a JSON file.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::types::Passphrase;
use crate::{Error, Result};

/// Local plaintext directories.
#[derive(Debug, Clone, Deserialize)]
pub struct LocalConfig {
    /// Directory watched for plaintext changes to encrypt.
    pub monitored_path: PathBuf,
    /// Directory receiving plaintext reconstructed from remote ciphertext.
    pub decrypted_path: PathBuf,
}

/// Cloud-sync mirror folder settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncFolderConfig {
    /// Root of the folder mirrored by the cloud-sync agent.
    ///
    /// When absent, well-known locations are probed at startup.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Name of the ciphertext folder inside the sync root.
    #[serde(default = "default_encrypted_folder")]
    pub encrypted_folder: String,
}

fn default_encrypted_folder() -> String {
    "encrypted_files".to_string()
}

/// GnuPG settings.
#[derive(Debug, Clone, Deserialize)]
pub struct PgpConfig {
    /// GnuPG home directory (defaults to gpg's own default when absent).
    #[serde(default)]
    pub gnupg_home: Option<PathBuf>,
    /// Name or uid fragment of the key used for encryption.
    pub key_name: String,
    /// Decryption pass-phrase. Prompted interactively when absent.
    #[serde(default)]
    pub passphrase: Option<Passphrase>,
}

/// Complete daemon configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub local: LocalConfig,
    pub sync_folder: SyncFolderConfig,
    pub pgp: PgpConfig,
    /// Optional log file; file logging is disabled when absent.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// # Errors
    /// - File missing or unreadable
    /// - JSON malformed or missing required fields
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("invalid config {}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "local": {
            "monitored_path": "/home/user/private",
            "decrypted_path": "/home/user/decrypted"
        },
        "sync_folder": {
            "path": "/home/user/OneDrive"
        },
        "pgp": {
            "key_name": "backup@example.com",
            "passphrase": "secret"
        }
    }"#;

    #[test]
    fn test_parse_sample_config() {
        let config: Config = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(
            config.local.monitored_path,
            PathBuf::from("/home/user/private")
        );
        assert_eq!(config.sync_folder.encrypted_folder, "encrypted_files");
        assert_eq!(config.pgp.key_name, "backup@example.com");
        assert_eq!(config.pgp.passphrase.unwrap().as_str(), "secret");
        assert!(config.log_file.is_none());
    }

    #[test]
    fn test_missing_required_field_fails() {
        let result: std::result::Result<Config, _> = serde_json::from_str("{}");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = Config::load(&path).unwrap();
        assert!(config.sync_folder.path.is_some());
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let err = Config::load(Path::new("/nonexistent/config.json")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
