//! Encryption pipeline: local plaintext change to uploaded ciphertext.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use cryptsync_common::{Error, Result, SyncPath};
use cryptsync_crypto::engine::default_ciphertext_path;
use cryptsync_crypto::CryptoEngine;
use cryptsync_storage::SyncFolderClient;

use crate::conflict::{ciphertext_path, has_newer_remote, modified_time};
use crate::pathsafe::is_safe;

/// Outcome of one encryption pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncryptOutcome {
    /// Ciphertext uploaded to the mirror.
    Uploaded,
    /// Hidden, temporary, or already-ciphertext artifact; never processed.
    SkippedArtifact,
    /// Path failed the safety check.
    SkippedUnsafe,
    /// Newer remote counterpart exists; marker written, upload skipped.
    Conflicted,
}

/// Pipeline turning a local plaintext change into an uploaded ciphertext.
#[derive(Clone)]
pub struct EncryptPipeline {
    monitored_root: PathBuf,
    engine: Arc<dyn CryptoEngine>,
    client: Arc<dyn SyncFolderClient>,
}

impl EncryptPipeline {
    /// Create the pipeline for a resolved monitored root.
    pub fn new(
        monitored_root: PathBuf,
        engine: Arc<dyn CryptoEngine>,
        client: Arc<dyn SyncFolderClient>,
    ) -> Self {
        Self {
            monitored_root,
            engine,
            client,
        }
    }

    /// Encrypt a changed local file and upload the ciphertext.
    ///
    /// Records the processed modification time in `records` after a
    /// successful upload. Callers catch and log the returned errors; one
    /// bad event must not stop the daemon.
    pub async fn encrypt_and_upload(
        &self,
        path: &Path,
        records: &mut HashMap<String, DateTime<Utc>>,
    ) -> Result<EncryptOutcome> {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        // Dotfiles also cover the decrypt pipeline's staging copies, which
        // keeps the two directions from feeding back into each other.
        if name.starts_with('.') || name.ends_with(".tmp") || name.ends_with(".gpg") {
            debug!("Skipping transient artifact {}", path.display());
            return Ok(EncryptOutcome::SkippedArtifact);
        }

        if !is_safe(path, &self.monitored_root) {
            warn!("Skipping unsafe path {}", path.display());
            return Ok(EncryptOutcome::SkippedUnsafe);
        }

        let rel = path.strip_prefix(&self.monitored_root).map_err(|_| {
            Error::Validation(format!(
                "{} is outside the monitored root",
                path.display()
            ))
        })?;
        let rel = SyncPath::from_relative(rel)?;

        let local_mtime = modified_time(&tokio::fs::metadata(path).await?);
        info!("Local file changed: {}", rel);

        if has_newer_remote(&rel, local_mtime, self.client.as_ref()).await? {
            let marker = conflict_marker_path(path);
            tokio::fs::copy(path, &marker).await?;
            warn!(
                "Conflict detected for {}; local copy saved as {}",
                rel,
                marker.display()
            );
            return Ok(EncryptOutcome::Conflicted);
        }

        let ciphertext = self.engine.encrypt(path).await?;

        let remote = ciphertext_path(self.client.encrypted_root(), &rel);
        if let Some(parent) = remote.parent() {
            self.client.ensure_folder(parent).await?;
        }
        self.client.upload(&ciphertext, &remote).await?;

        records.insert(rel.to_string(), local_mtime);

        // The engine may have staged the ciphertext away from the default
        // location; that copy is ours to clean up.
        if ciphertext != default_ciphertext_path(path) {
            tokio::fs::remove_file(&ciphertext).await?;
        }

        Ok(EncryptOutcome::Uploaded)
    }
}

/// Marker path preserving a local edit shadowed by a newer remote version.
pub fn conflict_marker_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".conflict");
    PathBuf::from(name)
}
