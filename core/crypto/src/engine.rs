//! Crypto engine trait definition.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use cryptsync_common::{Passphrase, Result};

/// Boundary to the external PGP implementation.
///
/// Implementations run each operation to completion; nothing in this
/// interface is cancellable mid-flight.
#[async_trait]
pub trait CryptoEngine: Send + Sync {
    /// Encrypt a plaintext file.
    ///
    /// # Postconditions
    /// - Returns the path of the ciphertext artifact. The engine chooses the
    ///   location; callers must clean it up if it differs from
    ///   `{plaintext}.gpg`.
    ///
    /// # Errors
    /// - Source missing or unreadable
    /// - Engine reports encryption failure
    async fn encrypt(&self, plaintext: &Path) -> Result<PathBuf>;

    /// Decrypt a ciphertext file to `output`.
    ///
    /// # Postconditions
    /// - On success, the complete plaintext exists at `output`
    /// - On failure, a partially written `output` may remain; callers must
    ///   delete it before retrying
    ///
    /// # Errors
    /// - Ciphertext missing or unreadable
    /// - Wrong pass-phrase or engine failure
    async fn decrypt(&self, ciphertext: &Path, passphrase: &Passphrase, output: &Path)
        -> Result<()>;
}

/// Default ciphertext location for a plaintext path: `{plaintext}.gpg`.
pub fn default_ciphertext_path(plaintext: &Path) -> PathBuf {
    let mut name = plaintext.as_os_str().to_os_string();
    name.push(".gpg");
    PathBuf::from(name)
}
