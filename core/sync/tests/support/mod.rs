//! Shared test doubles for the sync pipeline tests.
#![allow(dead_code)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use cryptsync_common::{Error, Passphrase, Result};
use cryptsync_crypto::engine::default_ciphertext_path;
use cryptsync_crypto::CryptoEngine;
use cryptsync_storage::{LocalFolderClient, RemoteFile, SyncFolderClient};

/// Header marking mock ciphertext artifacts.
pub const MAGIC: &[u8] = b"MOCKGPG1";

/// Crypto engine double: reversible byte transform behind the real trait,
/// with scriptable decrypt failures.
pub struct MockEngine {
    passphrase: String,
    fail_next_decrypts: AtomicU32,
    decrypt_calls: AtomicU32,
    stage_dir: Option<PathBuf>,
}

impl MockEngine {
    pub fn new(passphrase: &str) -> Self {
        Self {
            passphrase: passphrase.to_string(),
            fail_next_decrypts: AtomicU32::new(0),
            decrypt_calls: AtomicU32::new(0),
            stage_dir: None,
        }
    }

    /// Engine that stages ciphertext in `dir` instead of next to the
    /// plaintext, so cleanup of the staged artifact can be exercised.
    pub fn with_stage_dir(passphrase: &str, dir: PathBuf) -> Self {
        let mut engine = Self::new(passphrase);
        engine.stage_dir = Some(dir);
        engine
    }

    /// Make the next `n` decrypt calls fail, leaving a partial output.
    pub fn fail_next_decrypts(&self, n: u32) {
        self.fail_next_decrypts.store(n, Ordering::SeqCst);
    }

    pub fn decrypt_calls(&self) -> u32 {
        self.decrypt_calls.load(Ordering::SeqCst)
    }

    fn transform(data: &[u8]) -> Vec<u8> {
        data.iter().map(|b| b ^ 0xA5).collect()
    }
}

#[async_trait]
impl CryptoEngine for MockEngine {
    async fn encrypt(&self, plaintext: &Path) -> Result<PathBuf> {
        let data = tokio::fs::read(plaintext).await?;
        let mut out = MAGIC.to_vec();
        out.extend(Self::transform(&data));

        let output = match &self.stage_dir {
            Some(dir) => dir.join(format!(
                "{}.gpg",
                plaintext.file_name().unwrap().to_string_lossy()
            )),
            None => default_ciphertext_path(plaintext),
        };
        tokio::fs::write(&output, out).await?;
        Ok(output)
    }

    async fn decrypt(
        &self,
        ciphertext: &Path,
        passphrase: &Passphrase,
        output: &Path,
    ) -> Result<()> {
        self.decrypt_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_next_decrypts.load(Ordering::SeqCst) > 0 {
            self.fail_next_decrypts.fetch_sub(1, Ordering::SeqCst);
            // Leave a partial artifact behind, as a real engine can.
            tokio::fs::write(output, b"partial garbage").await?;
            return Err(Error::Engine("simulated engine failure".to_string()));
        }

        if passphrase.as_str() != self.passphrase {
            return Err(Error::Engine("bad passphrase".to_string()));
        }

        let data = tokio::fs::read(ciphertext).await?;
        let Some(body) = data.strip_prefix(MAGIC) else {
            return Err(Error::Engine("not a mock ciphertext".to_string()));
        };
        tokio::fs::write(output, Self::transform(body)).await?;
        Ok(())
    }
}

/// Client whose listing always fails; everything else delegates.
pub struct FailingListClient {
    inner: LocalFolderClient,
}

impl FailingListClient {
    pub fn new(inner: LocalFolderClient) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl SyncFolderClient for FailingListClient {
    fn encrypted_root(&self) -> &Path {
        self.inner.encrypted_root()
    }

    async fn list(&self, _folder: &Path) -> Result<Vec<RemoteFile>> {
        Err(Error::Storage("mirror unavailable".to_string()))
    }

    async fn upload(&self, local: &Path, remote: &Path) -> Result<RemoteFile> {
        self.inner.upload(local, remote).await
    }

    async fn download(&self, id: &str, dest: &Path) -> Result<PathBuf> {
        self.inner.download(id, dest).await
    }

    async fn ensure_folder(&self, folder: &Path) -> Result<()> {
        self.inner.ensure_folder(folder).await
    }
}
