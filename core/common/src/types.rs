//! Common types used throughout cryptsync.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use zeroize::Zeroize;

/// A relative path within the mirrored plaintext/ciphertext trees.
///
/// This type represents the logical location of a file relative to the
/// monitored root on the plaintext side, or relative to the encrypted
/// folder on the ciphertext side. The two trees mirror each other 1:1.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncPath {
    components: Vec<String>,
}

impl SyncPath {
    /// Create a path from string components.
    ///
    /// # Preconditions
    /// - Components must not contain path separators
    /// - Components must not be empty or traversal markers (`.`/`..`)
    ///
    /// # Errors
    /// - Returns error if any component is invalid
    pub fn from_components(components: Vec<String>) -> crate::Result<Self> {
        if components.is_empty() {
            return Err(crate::Error::Validation(
                "SyncPath cannot be empty".to_string(),
            ));
        }
        for comp in &components {
            if comp.is_empty() {
                return Err(crate::Error::Validation(
                    "Path component cannot be empty".to_string(),
                ));
            }
            if comp.contains('/') || comp.contains('\\') {
                return Err(crate::Error::Validation(
                    "Path component cannot contain separators".to_string(),
                ));
            }
            if comp == "." || comp == ".." {
                return Err(crate::Error::Validation(
                    "Path component cannot be a traversal marker".to_string(),
                ));
            }
        }
        Ok(Self { components })
    }

    /// Parse a relative path string into a SyncPath.
    ///
    /// Uses '/' as separator. Leading and trailing separators are rejected
    /// because a SyncPath is always relative and always names a file.
    pub fn parse(path: &str) -> crate::Result<Self> {
        if path.starts_with('/') {
            return Err(crate::Error::Validation(format!(
                "SyncPath must be relative: {}",
                path
            )));
        }
        let components: Vec<String> = path.split('/').map(String::from).collect();
        Self::from_components(components)
    }

    /// Build a SyncPath from a relative filesystem path.
    ///
    /// # Errors
    /// - Absolute paths, `..` components, and non-UTF-8 components are rejected
    pub fn from_relative(path: &Path) -> crate::Result<Self> {
        if path.is_absolute() {
            return Err(crate::Error::Validation(format!(
                "SyncPath must be relative: {}",
                path.display()
            )));
        }
        let mut components = Vec::new();
        for comp in path.components() {
            match comp {
                std::path::Component::Normal(os) => {
                    let s = os.to_str().ok_or_else(|| {
                        crate::Error::Validation(format!(
                            "Path is not valid UTF-8: {}",
                            path.display()
                        ))
                    })?;
                    components.push(s.to_string());
                }
                _ => {
                    return Err(crate::Error::Validation(format!(
                        "Path contains traversal components: {}",
                        path.display()
                    )));
                }
            }
        }
        Self::from_components(components)
    }

    /// Get the file name (last component).
    pub fn name(&self) -> &str {
        // from_components guarantees at least one component
        self.components.last().map(|s| s.as_str()).unwrap_or("")
    }

    /// Get the parent components, if any.
    pub fn parent_components(&self) -> &[String] {
        &self.components[..self.components.len() - 1]
    }

    /// Get the path components.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Resolve this path against a filesystem root.
    pub fn to_fs_path(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        for comp in &self.components {
            path.push(comp);
        }
        path
    }
}

impl fmt::Display for SyncPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.components.join("/"))
    }
}

/// Pass-phrase wrapper that zeroizes on drop.
#[derive(Clone, Zeroize, Deserialize)]
#[zeroize(drop)]
#[serde(transparent)]
pub struct Passphrase(String);

impl Passphrase {
    /// Wrap a pass-phrase string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if the pass-phrase is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Passphrase([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_path_parse() {
        let path = SyncPath::parse("sub/secret.txt").unwrap();
        assert_eq!(path.components(), &["sub", "secret.txt"]);
        assert_eq!(path.name(), "secret.txt");
        assert_eq!(path.to_string(), "sub/secret.txt");
    }

    #[test]
    fn test_sync_path_rejects_absolute() {
        assert!(SyncPath::parse("/etc/passwd").is_err());
        assert!(SyncPath::from_relative(Path::new("/etc/passwd")).is_err());
    }

    #[test]
    fn test_sync_path_rejects_traversal() {
        assert!(SyncPath::parse("../escape.txt").is_err());
        assert!(SyncPath::from_relative(Path::new("a/../b.txt")).is_err());
    }

    #[test]
    fn test_sync_path_rejects_empty() {
        assert!(SyncPath::parse("").is_err());
        assert!(SyncPath::from_components(vec![]).is_err());
    }

    #[test]
    fn test_sync_path_to_fs_path() {
        let path = SyncPath::parse("sub/secret.txt").unwrap();
        let fs = path.to_fs_path(Path::new("/mon"));
        assert_eq!(fs, PathBuf::from("/mon/sub/secret.txt"));
    }

    #[test]
    fn test_passphrase_debug_redacted() {
        let pass = Passphrase::new("hunter2");
        assert_eq!(format!("{:?}", pass), "Passphrase([REDACTED])");
        assert_eq!(pass.as_str(), "hunter2");
    }
}
