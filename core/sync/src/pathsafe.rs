//! Path safety validation.

use std::path::{Component, Path, PathBuf};
use tracing::warn;

/// Check that `path` lies inside `root` and crosses no symbolic link.
///
/// Passes only if the normalized path is equal to or a descendant of the
/// resolved root, and no component of its ancestry below the root,
/// including the path itself, is a symlink. A path that no longer exists
/// (race with deletion) is evaluated syntactically on its normalized
/// absolute form.
///
/// `false` means "skip this event"; it is never an error.
pub fn is_safe(path: &Path, root: &Path) -> bool {
    if !path.is_absolute() {
        return false;
    }

    let Ok(root) = root.canonicalize() else {
        warn!("Cannot resolve root {}", root.display());
        return false;
    };

    let normalized = normalize_lexical(path);
    let Ok(rel) = normalized.strip_prefix(&root) else {
        return false;
    };

    // Walk every component below the root. A nonexistent suffix cannot
    // introduce a symlink, so the walk stops at the first missing one.
    let mut current = root;
    for comp in rel.components() {
        current.push(comp);
        match std::fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => return false,
            Ok(_) => {}
            Err(_) => break,
        }
    }
    true
}

/// Normalize a path lexically: drop `.`, resolve `..` against the prefix.
///
/// No filesystem access; symlinks are deliberately not resolved so that
/// `is_safe` can still detect them.
fn normalize_lexical(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::Prefix(prefix) => out.push(prefix.as_os_str()),
            Component::RootDir => out.push(Component::RootDir),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(name) => out.push(name),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_lexical() {
        assert_eq!(
            normalize_lexical(Path::new("/a/b/../c/./d")),
            PathBuf::from("/a/c/d")
        );
        assert_eq!(normalize_lexical(Path::new("/a/../../b")), PathBuf::from("/b"));
    }

    #[test]
    fn test_existing_file_inside_root_is_safe() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("sub/file.txt");
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, b"x").unwrap();

        assert!(is_safe(&file, temp.path()));
    }

    #[test]
    fn test_nonexistent_path_inside_root_is_safe() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("sub/missing.txt");

        assert!(is_safe(&file, temp.path()));
    }

    #[test]
    fn test_traversal_escape_is_unsafe() {
        let temp = TempDir::new().unwrap();
        let escape = temp.path().join("sub/../../etc/passwd");

        assert!(!is_safe(&escape, temp.path()));
    }

    #[test]
    fn test_path_outside_root_is_unsafe() {
        let temp = TempDir::new().unwrap();
        assert!(!is_safe(Path::new("/etc/passwd"), temp.path()));
    }

    #[test]
    fn test_relative_path_is_unsafe() {
        let temp = TempDir::new().unwrap();
        assert!(!is_safe(Path::new("file.txt"), temp.path()));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_ancestor_is_unsafe() {
        let temp = TempDir::new().unwrap();
        let outside = temp.path().join("outside");
        let root = temp.path().join("root");
        std::fs::create_dir_all(&outside).unwrap();
        std::fs::create_dir_all(&root).unwrap();

        let link = root.join("link");
        std::os::unix::fs::symlink(&outside, &link).unwrap();
        let file = link.join("file.txt");
        std::fs::write(&file, b"x").unwrap();

        assert!(!is_safe(&file, &root));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_file_itself_is_unsafe() {
        let temp = TempDir::new().unwrap();
        let real = temp.path().join("real.txt");
        std::fs::write(&real, b"x").unwrap();

        let root = temp.path().join("root");
        std::fs::create_dir_all(&root).unwrap();
        let link = root.join("link.txt");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        assert!(!is_safe(&link, &root));
    }

    #[test]
    fn test_missing_root_is_unsafe() {
        let missing = Path::new("/nonexistent-root");
        assert!(!is_safe(Path::new("/nonexistent-root/file"), missing));
    }
}
