//! Conflict detection against the remote ciphertext mirror.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::warn;

use cryptsync_common::{Result, SyncPath};
use cryptsync_storage::SyncFolderClient;

/// Deterministic ciphertext path for a relative plaintext path.
///
/// Directory structure is preserved identically; `.gpg` is appended to the
/// final component only.
pub fn ciphertext_path(encrypted_root: &Path, rel: &SyncPath) -> PathBuf {
    let mut path = encrypted_root.to_path_buf();
    for comp in rel.parent_components() {
        path.push(comp);
    }
    path.push(format!("{}.gpg", rel.name()));
    path
}

/// Modification time of filesystem metadata as UTC.
pub(crate) fn modified_time(meta: &std::fs::Metadata) -> DateTime<Utc> {
    meta.modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}

/// Check whether a remote ciphertext counterpart strictly newer than
/// `local_mtime` exists for `rel`.
///
/// The mirrored file is stat'ed directly when present; otherwise the client
/// listing is consulted, matching by identifier or basename. A listing
/// failure stays permissive: it is logged and treated as "no newer remote",
/// so a flaky mirror cannot wedge uploads.
pub async fn has_newer_remote(
    rel: &SyncPath,
    local_mtime: DateTime<Utc>,
    client: &dyn SyncFolderClient,
) -> Result<bool> {
    let candidate = ciphertext_path(client.encrypted_root(), rel);

    if let Ok(meta) = tokio::fs::metadata(&candidate).await {
        return Ok(modified_time(&meta) > local_mtime);
    }

    let files = match client.list(client.encrypted_root()).await {
        Ok(files) => files,
        Err(e) => {
            warn!("Cannot list encrypted folder during conflict check: {}", e);
            return Ok(false);
        }
    };

    let want_name = format!("{}.gpg", rel.name());
    let remote = files
        .iter()
        .find(|f| Path::new(&f.id) == candidate.as_path() || f.name == want_name);

    Ok(remote.map(|f| f.modified > local_mtime).unwrap_or(false))
}
