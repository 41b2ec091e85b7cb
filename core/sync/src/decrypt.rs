//! Decryption pipeline: remote ciphertext change to hardened local plaintext.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use cryptsync_common::{Error, Passphrase, Result};
use cryptsync_crypto::{file_digest, CryptoEngine};

use crate::pathsafe::is_safe;

/// Total decrypt attempts per event before terminal failure.
pub const MAX_PASSPHRASE_ATTEMPTS: u32 = 3;

/// Retry progress for one decrypt call.
///
/// Every transition out of `Attempting` that is not into `Succeeded`
/// deletes any partially written output first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Attempting(u32),
    Succeeded,
    Failed,
}

impl Attempt {
    fn next(self) -> Self {
        match self {
            Attempt::Attempting(n) if n < MAX_PASSPHRASE_ATTEMPTS => Attempt::Attempting(n + 1),
            _ => Attempt::Failed,
        }
    }
}

/// Outcome of one decryption pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecryptOutcome {
    /// Plaintext written to the decrypted root.
    Decrypted(PathBuf),
    /// Not a ciphertext artifact.
    SkippedArtifact,
    /// Path failed the safety check.
    SkippedUnsafe,
}

/// Pipeline turning a remote ciphertext change into a local plaintext file.
#[derive(Clone)]
pub struct DecryptPipeline {
    monitored_root: PathBuf,
    decrypted_root: PathBuf,
    encrypted_root: PathBuf,
    engine: Arc<dyn CryptoEngine>,
    passphrase: Option<Passphrase>,
}

impl DecryptPipeline {
    /// Create the pipeline for resolved roots.
    pub fn new(
        monitored_root: PathBuf,
        decrypted_root: PathBuf,
        encrypted_root: PathBuf,
        engine: Arc<dyn CryptoEngine>,
        passphrase: Option<Passphrase>,
    ) -> Self {
        Self {
            monitored_root,
            decrypted_root,
            encrypted_root,
            engine,
            passphrase,
        }
    }

    /// Decrypt a remote ciphertext file into the decrypted root.
    ///
    /// Output is flattened to `{decrypted_root}/{basename}`; the relative
    /// directory structure is not mirrored on this side.
    pub async fn decrypt_to_local(&self, path: &Path) -> Result<DecryptOutcome> {
        self.decrypt_verified(path, None).await
    }

    /// Decrypt with an optional integrity check against a reference
    /// plaintext. A digest mismatch counts as a failed attempt.
    pub async fn decrypt_verified(
        &self,
        path: &Path,
        reference: Option<&Path>,
    ) -> Result<DecryptOutcome> {
        if !is_safe(path, &self.encrypted_root) {
            warn!("Skipping unsafe path {}", path.display());
            return Ok(DecryptOutcome::SkippedUnsafe);
        }

        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        let Some(target_name) = name.strip_suffix(".gpg") else {
            debug!("Skipping non-ciphertext file {}", path.display());
            return Ok(DecryptOutcome::SkippedArtifact);
        };
        if target_name.is_empty() {
            return Err(Error::Validation(format!(
                "ciphertext has no base name: {}",
                path.display()
            )));
        }

        info!("Remote file changed: {}", name);

        // Work on an isolated copy so a failed decrypt cannot corrupt the
        // externally visible mirror. The dotfile name keeps the encrypt
        // direction from picking the copy up.
        let staged = self.monitored_root.join(format!(".temp_{}", name));
        tokio::fs::copy(path, &staged).await?;

        let target = self.decrypted_root.join(target_name);
        let partial = self.decrypted_root.join(format!(".{}.partial", target_name));

        let passphrase = self.resolve_passphrase().await?;

        let mut state = Attempt::Attempting(1);
        let result = loop {
            match state {
                Attempt::Attempting(n) => {
                    state = match self
                        .try_decrypt(&staged, &passphrase, &partial, reference)
                        .await
                    {
                        Ok(()) => Attempt::Succeeded,
                        Err(e) => {
                            warn!(
                                "Decrypt attempt {}/{} for {} failed: {}",
                                n, MAX_PASSPHRASE_ATTEMPTS, name, e
                            );
                            remove_if_exists(&partial).await;
                            state.next()
                        }
                    };
                }
                Attempt::Succeeded => break Ok(()),
                Attempt::Failed => {
                    break Err(Error::Engine(format!(
                        "decryption of {} failed after {} attempts",
                        name, MAX_PASSPHRASE_ATTEMPTS
                    )))
                }
            }
        };

        if let Err(e) = result {
            remove_if_exists(&staged).await;
            return Err(e);
        }

        harden_permissions(&partial).await?;
        tokio::fs::rename(&partial, &target).await?;
        remove_if_exists(&staged).await;

        info!("Decrypted {} to {}", name, target.display());
        Ok(DecryptOutcome::Decrypted(target))
    }

    async fn try_decrypt(
        &self,
        staged: &Path,
        passphrase: &Passphrase,
        output: &Path,
        reference: Option<&Path>,
    ) -> Result<()> {
        self.engine.decrypt(staged, passphrase, output).await?;
        if let Some(reference) = reference {
            if file_digest(output).await? != file_digest(reference).await? {
                return Err(Error::Integrity(
                    "decrypted content does not match reference digest".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Use the configured pass-phrase, prompting interactively when absent.
    async fn resolve_passphrase(&self) -> Result<Passphrase> {
        if let Some(passphrase) = &self.passphrase {
            return Ok(passphrase.clone());
        }
        let prompted =
            tokio::task::spawn_blocking(|| rpassword::prompt_password("Enter PGP passphrase: "))
                .await
                .map_err(|e| Error::Engine(format!("passphrase prompt failed: {}", e)))??;
        Ok(Passphrase::new(prompted))
    }
}

/// Restrict a decrypted file to owner read/write.
async fn harden_permissions(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

async fn remove_if_exists(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Cannot remove {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_transitions_are_bounded() {
        let mut state = Attempt::Attempting(1);
        state = state.next();
        assert_eq!(state, Attempt::Attempting(2));
        state = state.next();
        assert_eq!(state, Attempt::Attempting(3));
        state = state.next();
        assert_eq!(state, Attempt::Failed);
        assert_eq!(state.next(), Attempt::Failed);
    }
}
