use crate::error::{Error, Result};
use std::{
    ffi::OsString,
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tracing::debug;

/// Replaces the contents of `path` atomically.
///
/// # Process
///
/// 1. Writes content to a temporary file next to the target
/// 2. Copies the target's permissions onto it
/// 3. Syncs the temporary file to disk
/// 4. Renames it over the target
///
/// The target is untouched unless every step succeeds.
///
/// # Errors
///
/// Returns [`Error::Io`] if any step fails; the temporary file is removed.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let temp_path = temp_path_for(path);

    let result = write_temp(path, &temp_path, content)
        .and_then(|()| fs::rename(&temp_path, path).map_err(|e| Error::io(path, e)));

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result?;

    debug!("Wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

fn write_temp(target: &Path, temp_path: &Path, content: &str) -> Result<()> {
    let mut temp_file = fs::File::create(temp_path).map_err(|e| Error::io(temp_path, e))?;

    temp_file
        .write_all(content.as_bytes())
        .map_err(|e| Error::io(temp_path, e))?;

    if let Ok(metadata) = fs::metadata(target) {
        temp_file
            .set_permissions(metadata.permissions())
            .map_err(|e| Error::io(temp_path, e))?;
    }

    // Ensure data is flushed to disk
    temp_file.sync_all().map_err(|e| Error::io(temp_path, e))?;

    Ok(())
}

/// `dir/.name.llm-apply.tmp`
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(path.file_name().unwrap_or_default());
    name.push(".llm-apply.tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn test_write_atomic_replaces_content() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("main.py");
        file.write_str("old").unwrap();

        write_atomic(file.path(), "new").unwrap();

        file.assert("new");
        assert!(!temp_path_for(file.path()).exists());
    }

    #[test]
    fn test_write_atomic_leaves_no_temp_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("notes.txt");
        file.write_str("x").unwrap();

        write_atomic(file.path(), "y").unwrap();

        let entries: Vec<_> = fs::read_dir(temp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_write_atomic_missing_directory() {
        let temp = assert_fs::TempDir::new().unwrap();
        let path = temp.path().join("absent/file.txt");

        let err = write_atomic(&path, "content").unwrap_err();
        assert!(err.is_io());
    }

    #[cfg(unix)]
    #[test]
    fn test_write_atomic_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("run.sh");
        file.write_str("echo old").unwrap();
        fs::set_permissions(file.path(), fs::Permissions::from_mode(0o755)).unwrap();

        write_atomic(file.path(), "echo new").unwrap();

        let mode = fs::metadata(file.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_temp_path_is_sibling() {
        let path = Path::new("src/lib.rs");
        assert_eq!(temp_path_for(path), PathBuf::from("src/.lib.rs.llm-apply.tmp"));
    }
}
