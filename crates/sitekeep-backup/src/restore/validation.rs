//! Pre-flight validation for restore operations

use crate::error::{BackupError, Result};
use camino::Utf8Path;
use std::fs::{self, File};
use std::io;
use tracing::{debug, info};

/// Checks that the dump can be read before anything else happens.
pub fn validate_restore_preconditions(dump_path: &Utf8Path) -> Result<()> {
    info!("Validating restore preconditions for: {}", dump_path);

    let metadata = fs::metadata(dump_path).map_err(|e| BackupError::io(dump_path, e))?;
    if !metadata.is_file() {
        return Err(BackupError::io(
            dump_path,
            io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
        ));
    }
    debug!("✓ Dump file exists");

    File::open(dump_path).map_err(|e| BackupError::io(dump_path, e))?;
    debug!("✓ Dump file is readable");

    Ok(())
}

/// Checks that files can be extracted into `dir`.
pub fn validate_dir_writable(dir: &Utf8Path) -> Result<()> {
    if !dir.is_dir() {
        return Err(BackupError::io(
            dir,
            io::Error::new(io::ErrorKind::NotFound, "directory does not exist"),
        ));
    }

    let marker = dir.join(".restore-write-test");
    fs::write(&marker, b"test").map_err(|e| BackupError::io(&marker, e))?;
    fs::remove_file(&marker).ok();

    debug!("✓ {} is writable", dir);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_missing_dump() {
        let err =
            validate_restore_preconditions(Utf8Path::new("/tmp/nonexistent-dump-12345.sql.gz"))
                .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().contains("nonexistent-dump-12345"));
    }

    #[test]
    fn test_directory_is_not_a_dump() {
        let temp = TempDir::new().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        assert!(validate_restore_preconditions(&dir).is_err());
    }

    #[test]
    fn test_readable_dump() {
        let temp = TempDir::new().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().join("dump.sql")).unwrap();
        fs::write(&path, "SELECT 1;").unwrap();
        validate_restore_preconditions(&path).unwrap();
    }

    #[test]
    fn test_dir_writable() {
        let temp = TempDir::new().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        validate_dir_writable(&dir).unwrap();
        assert!(!dir.join(".restore-write-test").exists());

        assert!(validate_dir_writable(&dir.join("missing")).is_err());
    }
}
