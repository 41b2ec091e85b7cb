//! Sync folder client trait definition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use cryptsync_common::Result;

/// Descriptor for a file in the mirrored sync folder.
///
/// Returned transiently by listing operations; never cached beyond one
/// lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteFile {
    /// File name (basename).
    pub name: String,
    /// Provider-specific identifier. For local mirrors this is the full path.
    pub id: String,
    /// Last modification time.
    pub modified: DateTime<Utc>,
}

/// Client for the folder mirrored by a cloud-sync agent.
///
/// Stands in for any cloud provider whose agent mirrors state into a local
/// folder. All operations block until complete.
#[async_trait]
pub trait SyncFolderClient: Send + Sync {
    /// Absolute path of the mirrored ciphertext folder.
    fn encrypted_root(&self) -> &Path;

    /// List files under a folder, recursively.
    ///
    /// # Errors
    /// - Folder missing or unreadable
    async fn list(&self, folder: &Path) -> Result<Vec<RemoteFile>>;

    /// Upload a local file to the given remote path.
    ///
    /// # Postconditions
    /// - Intermediate directories are created as needed
    /// - Returns the descriptor of the uploaded file
    async fn upload(&self, local: &Path, remote: &Path) -> Result<RemoteFile>;

    /// Download a file by identifier to `dest`.
    ///
    /// # Errors
    /// - Identifier does not resolve inside the sync folder
    async fn download(&self, id: &str, dest: &Path) -> Result<PathBuf>;

    /// Ensure a folder exists inside the sync root.
    async fn ensure_folder(&self, folder: &Path) -> Result<()>;
}
