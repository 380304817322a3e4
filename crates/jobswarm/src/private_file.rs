//! Owner-only files replaced through a temp file and a rename.

use std::io::Write;
use std::path::{Path, PathBuf};

/// I/O failure on `path` while writing a private file.
#[derive(Debug)]
pub(crate) struct WriteError {
    pub path: PathBuf,
    pub source: std::io::Error,
}

fn at(path: &Path) -> impl FnOnce(std::io::Error) -> WriteError + '_ {
    move |source| WriteError {
        path: path.to_path_buf(),
        source,
    }
}

/// `path` with `suffix` appended to its file name.
pub(crate) fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}

/// Replaces `path` with `contents`, mode 0600 on unix. Readers see either
/// the old file or the new one.
pub(crate) fn write_private(path: &Path, contents: impl AsRef<[u8]>) -> Result<(), WriteError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(at(parent))?;
    }

    let tmp = sibling(path, ".tmp");
    let _ = std::fs::remove_file(&tmp);

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(&tmp).map_err(at(&tmp))?;
    file.write_all(contents.as_ref()).map_err(at(&tmp))?;
    file.sync_all().map_err(at(&tmp))?;
    drop(file);

    std::fs::rename(&tmp, path).map_err(at(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sibling_appends_to_file_name() {
        assert_eq!(
            sibling(Path::new("/v/credentials.key"), ".next"),
            PathBuf::from("/v/credentials.key.next")
        );
    }

    #[test]
    fn test_write_creates_parent_and_replaces() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.json");

        write_private(&path, "first").unwrap();
        write_private(&path, b"second").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        assert!(!sibling(&path, ".tmp").exists());
    }

    #[test]
    fn test_stale_temp_file_is_replaced() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(sibling(&path, ".tmp"), "leftover").unwrap();

        write_private(&path, "fresh").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "fresh");
    }

    #[cfg(unix)]
    #[test]
    fn test_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secret");
        write_private(&path, "x").unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_error_names_failing_path() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();

        let err = write_private(&blocker.join("child"), "x").unwrap_err();
        assert_eq!(err.path, blocker);
    }
}
