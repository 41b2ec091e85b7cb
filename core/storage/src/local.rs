//! Filesystem-backed sync folder client.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use cryptsync_common::{Config, Error, Result, SyncFolderConfig};

use crate::client::{RemoteFile, SyncFolderClient};

/// Sync folder client backed by the local filesystem mirror.
///
/// Works against whatever folder the cloud-sync agent keeps in sync; the
/// agent itself handles the actual network transfer.
pub struct LocalFolderClient {
    sync_root: PathBuf,
    encrypted_root: PathBuf,
}

impl LocalFolderClient {
    /// Create a client for the configured sync folder.
    ///
    /// When no path is configured, well-known cloud-agent folder locations
    /// are probed as a convenience fallback.
    ///
    /// # Postconditions
    /// - The encrypted folder exists inside the sync root
    ///
    /// # Errors
    /// - `Error::Config` if no sync folder could be located
    pub fn new(config: &SyncFolderConfig) -> Result<Self> {
        let sync_root = match &config.path {
            Some(path) => path.clone(),
            None => detect_sync_folder().ok_or_else(|| {
                Error::Config(
                    "sync folder not found; set 'sync_folder.path' in the config".to_string(),
                )
            })?,
        };

        if !sync_root.is_dir() {
            return Err(Error::Config(format!(
                "sync folder does not exist: {}",
                sync_root.display()
            )));
        }

        let encrypted_root = sync_root.join(&config.encrypted_folder);
        std::fs::create_dir_all(&encrypted_root)?;

        Ok(Self {
            sync_root,
            encrypted_root,
        })
    }

    /// Create a client from explicit paths. Used by tests and tooling.
    pub fn with_roots(sync_root: PathBuf, encrypted_root: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&encrypted_root)?;
        Ok(Self {
            sync_root,
            encrypted_root,
        })
    }

    /// Build a client straight from the daemon configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.sync_folder)
    }

    /// Resolve a download identifier to a source path inside the sync folder.
    ///
    /// Relative identifiers are tried against the encrypted folder first and
    /// the sync root second. Resolution never follows a candidate outside its
    /// base (path traversal defense).
    fn resolve_id(&self, id: &str) -> Result<PathBuf> {
        let id_path = Path::new(id);

        if id_path.is_absolute() {
            if id_path.exists()
                && (is_within(&self.sync_root, id_path) || is_within(&self.encrypted_root, id_path))
            {
                return Ok(id_path.to_path_buf());
            }
            return Err(Error::NotFound(format!("file '{}' not in sync folder", id)));
        }

        for base in [&self.encrypted_root, &self.sync_root] {
            let candidate = base.join(id_path);
            if candidate.exists() && is_within(base, &candidate) {
                return Ok(candidate);
            }
        }
        Err(Error::NotFound(format!("file '{}' not in sync folder", id)))
    }
}

/// Check that `target` resolves to `base` or a descendant of it.
fn is_within(base: &Path, target: &Path) -> bool {
    let (Ok(base), Ok(target)) = (base.canonicalize(), target.canonicalize()) else {
        return false;
    };
    target == base || target.starts_with(&base)
}

/// Probe well-known cloud-agent folder locations.
fn detect_sync_folder() -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(home) = dirs::home_dir() {
        for name in [
            "SyncFolder",
            "Dropbox",
            "Google Drive",
            "OneDrive",
            "OneDrive - Personal",
            "OneDrive - Business",
            "Library/CloudStorage/OneDrive-Personal",
        ] {
            candidates.push(home.join(name));
        }
    }
    // Android (Termux) mounts
    candidates.push(PathBuf::from("/storage/emulated/0/OneDrive"));
    candidates.push(PathBuf::from("/sdcard/OneDrive"));

    for path in candidates {
        if path.is_dir() {
            info!("Detected sync folder at {}", path.display());
            return Some(path);
        }
    }
    None
}

fn modified_time(meta: &std::fs::Metadata) -> DateTime<Utc> {
    meta.modified().map(DateTime::<Utc>::from).unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl SyncFolderClient for LocalFolderClient {
    fn encrypted_root(&self) -> &Path {
        &self.encrypted_root
    }

    async fn list(&self, folder: &Path) -> Result<Vec<RemoteFile>> {
        if !folder.is_dir() {
            return Err(Error::NotFound(format!(
                "folder not found: {}",
                folder.display()
            )));
        }

        let mut files = Vec::new();
        let mut pending = vec![folder.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let meta = entry.metadata().await?;
                if meta.is_dir() {
                    pending.push(path);
                } else if meta.is_file() {
                    files.push(RemoteFile {
                        name: path
                            .file_name()
                            .and_then(|n| n.to_str())
                            .unwrap_or("")
                            .to_string(),
                        id: path.to_string_lossy().into_owned(),
                        modified: modified_time(&meta),
                    });
                }
            }
        }

        Ok(files)
    }

    async fn upload(&self, local: &Path, remote: &Path) -> Result<RemoteFile> {
        if let Some(parent) = remote.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::copy(local, remote).await?;

        let meta = fs::metadata(remote).await?;
        info!("Uploaded {} to {}", local.display(), remote.display());
        Ok(RemoteFile {
            name: remote
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("")
                .to_string(),
            id: remote.to_string_lossy().into_owned(),
            modified: modified_time(&meta),
        })
    }

    async fn download(&self, id: &str, dest: &Path) -> Result<PathBuf> {
        let src = self.resolve_id(id)?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::copy(&src, dest).await?;
        info!("Downloaded {} to {}", src.display(), dest.display());
        Ok(dest.to_path_buf())
    }

    async fn ensure_folder(&self, folder: &Path) -> Result<()> {
        let full = if folder.is_absolute() {
            folder.to_path_buf()
        } else {
            self.sync_root.join(folder)
        };
        fs::create_dir_all(&full).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn client(temp: &TempDir) -> LocalFolderClient {
        let sync_root = temp.path().join("sync");
        let encrypted_root = sync_root.join("encrypted_files");
        std::fs::create_dir_all(&sync_root).unwrap();
        LocalFolderClient::with_roots(sync_root, encrypted_root).unwrap()
    }

    #[tokio::test]
    async fn test_upload_creates_intermediate_dirs() {
        let temp = TempDir::new().unwrap();
        let client = client(&temp);

        let local = temp.path().join("note.txt");
        tokio::fs::write(&local, b"data").await.unwrap();

        let remote = client.encrypted_root().join("sub/note.txt.gpg");
        let uploaded = client.upload(&local, &remote).await.unwrap();

        assert!(remote.is_file());
        assert_eq!(uploaded.name, "note.txt.gpg");
    }

    #[tokio::test]
    async fn test_list_is_recursive() {
        let temp = TempDir::new().unwrap();
        let client = client(&temp);

        let nested = client.encrypted_root().join("a/b");
        tokio::fs::create_dir_all(&nested).await.unwrap();
        tokio::fs::write(nested.join("deep.gpg"), b"x").await.unwrap();
        tokio::fs::write(client.encrypted_root().join("top.gpg"), b"y")
            .await
            .unwrap();

        let mut names: Vec<String> = client
            .list(client.encrypted_root())
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["deep.gpg", "top.gpg"]);
    }

    #[tokio::test]
    async fn test_download_by_relative_id() {
        let temp = TempDir::new().unwrap();
        let client = client(&temp);

        tokio::fs::write(client.encrypted_root().join("doc.gpg"), b"cipher")
            .await
            .unwrap();

        let dest = temp.path().join("out/doc.gpg");
        client.download("doc.gpg", &dest).await.unwrap();
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"cipher");
    }

    #[tokio::test]
    async fn test_download_rejects_traversal() {
        let temp = TempDir::new().unwrap();
        let client = client(&temp);

        // A file outside the sync folder must not be reachable via ".."
        let outside = temp.path().join("secret.txt");
        tokio::fs::write(&outside, b"leak").await.unwrap();

        let dest = temp.path().join("out.txt");
        let result = client.download("../../secret.txt", &dest).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_download_rejects_absolute_path_outside_root() {
        let temp = TempDir::new().unwrap();
        let client = client(&temp);

        let outside = temp.path().join("secret.txt");
        tokio::fs::write(&outside, b"leak").await.unwrap();

        let dest = temp.path().join("out.txt");
        let result = client
            .download(&outside.to_string_lossy(), &dest)
            .await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_ensure_folder_relative_to_sync_root() {
        let temp = TempDir::new().unwrap();
        let client = client(&temp);

        client.ensure_folder(Path::new("encrypted_files/sub")).await.unwrap();
        assert!(temp.path().join("sync/encrypted_files/sub").is_dir());
    }

    #[test]
    fn test_new_rejects_missing_sync_folder() {
        let config = SyncFolderConfig {
            path: Some(PathBuf::from("/nonexistent/sync")),
            encrypted_folder: "encrypted_files".to_string(),
        };
        assert!(matches!(
            LocalFolderClient::new(&config),
            Err(Error::Config(_))
        ));
    }
}
