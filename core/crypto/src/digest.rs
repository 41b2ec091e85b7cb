//! Content digests for decrypt verification.

use blake2::{Blake2s256, Digest};
use std::path::Path;

use cryptsync_common::Result;

/// Compute the Blake2s-256 digest of a file's contents.
pub async fn file_digest(path: &Path) -> Result<[u8; 32]> {
    let data = tokio::fs::read(path).await?;
    let mut hasher = Blake2s256::new();
    hasher.update(&data);
    Ok(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_equal_content_equal_digest() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        tokio::fs::write(&a, b"plain").await.unwrap();
        tokio::fs::write(&b, b"plain").await.unwrap();

        assert_eq!(
            file_digest(&a).await.unwrap(),
            file_digest(&b).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_different_content_different_digest() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        tokio::fs::write(&a, b"plain").await.unwrap();
        tokio::fs::write(&b, b"other").await.unwrap();

        assert_ne!(
            file_digest(&a).await.unwrap(),
            file_digest(&b).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_error() {
        assert!(file_digest(Path::new("/nonexistent")).await.is_err());
    }
}
