//! GnuPG-backed crypto engine.
//!
//! Shells out to the `gpg` binary rather than reimplementing OpenPGP.
//! Availability of the binary and of the configured secret key is verified
//! at construction; both are startup-fatal when missing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use cryptsync_common::{Error, Passphrase, Result};

use crate::engine::{default_ciphertext_path, CryptoEngine};

/// Crypto engine backed by the system `gpg` binary.
pub struct GpgEngine {
    gnupg_home: Option<PathBuf>,
    key_name: String,
}

impl GpgEngine {
    /// Create a GnuPG engine for the given key.
    ///
    /// # Preconditions
    /// - `gpg` must be on PATH
    /// - A secret key whose uid contains `key_name` must exist in the keyring
    ///
    /// # Errors
    /// - `Error::Config` if gpg is unavailable or the key is absent
    pub async fn new(gnupg_home: Option<PathBuf>, key_name: impl Into<String>) -> Result<Self> {
        let engine = Self {
            gnupg_home,
            key_name: key_name.into(),
        };
        engine.verify_installation().await?;
        engine.verify_key().await?;
        Ok(engine)
    }

    /// Base gpg invocation with batch flags and the configured home.
    fn command(&self) -> Command {
        let mut cmd = Command::new("gpg");
        cmd.arg("--batch").arg("--yes");
        if let Some(home) = &self.gnupg_home {
            cmd.arg("--homedir").arg(home);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    async fn verify_installation(&self) -> Result<()> {
        let output = Command::new("gpg")
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| Error::Config(format!("GnuPG not found, please install it: {}", e)))?;

        if !output.status.success() {
            return Err(Error::Config("GnuPG not found, please install it".to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if let Some(first_line) = stdout.lines().next() {
            info!("Using {}", first_line);
        }
        Ok(())
    }

    /// Verify that the configured secret key exists in the keyring.
    async fn verify_key(&self) -> Result<()> {
        let output = self
            .command()
            .arg("--with-colons")
            .arg("--list-secret-keys")
            .output()
            .await
            .map_err(|e| Error::Config(format!("cannot access GPG keyring: {}", e)))?;

        if !output.status.success() {
            return Err(Error::Config(format!(
                "cannot access GPG keyring: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        // uid records carry the user id in field 10 of the colon format
        let stdout = String::from_utf8_lossy(&output.stdout);
        let key_exists = stdout
            .lines()
            .filter(|line| line.starts_with("uid:"))
            .filter_map(|line| line.split(':').nth(9))
            .any(|uid| uid.contains(&self.key_name));

        if !key_exists {
            return Err(Error::Config(format!(
                "PGP key '{}' not found; generate or import it first",
                self.key_name
            )));
        }

        debug!("Verified secret key for '{}'", self.key_name);
        Ok(())
    }
}

#[async_trait]
impl CryptoEngine for GpgEngine {
    async fn encrypt(&self, plaintext: &Path) -> Result<PathBuf> {
        let output_path = default_ciphertext_path(plaintext);

        let output = self
            .command()
            .arg("--trust-model")
            .arg("always")
            .arg("--recipient")
            .arg(&self.key_name)
            .arg("--output")
            .arg(&output_path)
            .arg("--encrypt")
            .arg(plaintext)
            .output()
            .await?;

        if !output.status.success() {
            return Err(Error::Engine(format!(
                "encryption of {} failed: {}",
                plaintext.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        debug!("Encrypted {} to {}", plaintext.display(), output_path.display());
        Ok(output_path)
    }

    async fn decrypt(
        &self,
        ciphertext: &Path,
        passphrase: &Passphrase,
        output: &Path,
    ) -> Result<()> {
        let mut child = self
            .command()
            .arg("--pinentry-mode")
            .arg("loopback")
            .arg("--passphrase-fd")
            .arg("0")
            .arg("--output")
            .arg(output)
            .arg("--decrypt")
            .arg(ciphertext)
            .stdin(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(passphrase.as_str().as_bytes()).await?;
            stdin.write_all(b"\n").await?;
        }

        let result = child.wait_with_output().await?;
        if !result.status.success() {
            return Err(Error::Engine(format!(
                "decryption of {} failed: {}",
                ciphertext.display(),
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }

        debug!("Decrypted {} to {}", ciphertext.display(), output.display());
        Ok(())
    }
}
