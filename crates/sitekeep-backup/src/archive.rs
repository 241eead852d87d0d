//! Tar archives of a site's file storage.
//!
//! Public and private files are archived with paths relative to the site
//! directory (`public/files/...`, `private/files/...`), so extracting an
//! archive into the site directory puts every file back in place.

use crate::compression::open_maybe_gzip;
use crate::error::{BackupError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::io::Write;
use tar::{Archive, Builder as TarBuilder};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Writes a tar of every file below `source_dir`, naming entries relative to `base_dir`.
///
/// A missing source directory yields an empty archive.
pub fn archive_directory<W: Write>(
    source_dir: &Utf8Path,
    base_dir: &Utf8Path,
    out: W,
) -> Result<(usize, W)> {
    let mut tar = TarBuilder::new(out);
    tar.follow_symlinks(false);
    let mut file_count = 0;

    if source_dir.is_dir() {
        for entry in WalkDir::new(source_dir)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| {
                let path = e
                    .path()
                    .and_then(|p| Utf8PathBuf::from_path_buf(p.to_path_buf()).ok())
                    .unwrap_or_else(|| source_dir.to_owned());
                BackupError::io(&path, e.into())
            })?;

            let path = entry.path();
            let rel_path = path.strip_prefix(base_dir).unwrap_or(path);
            if rel_path.as_os_str().is_empty() {
                continue;
            }

            let file_type = entry.file_type();
            let appended = if file_type.is_dir() {
                tar.append_dir(rel_path, path)
            } else if file_type.is_file() || file_type.is_symlink() {
                file_count += 1;
                tar.append_path_with_name(path, rel_path)
            } else {
                continue;
            };
            appended.map_err(|e| BackupError::io(source_dir, e))?;
        }
    } else {
        warn!("{} does not exist; writing an empty archive", source_dir);
    }

    let out = tar
        .into_inner()
        .map_err(|e| BackupError::io(source_dir, e))?;
    debug!("Archived {} files from {}", file_count, source_dir);
    Ok((file_count, out))
}

/// Extracts a (possibly gzipped) tar into `dest`.
///
/// Entries that would land outside `dest` are skipped.
pub fn extract_archive(archive_path: &Utf8Path, dest: &Utf8Path) -> Result<usize> {
    let reader = open_maybe_gzip(archive_path).map_err(|e| BackupError::io(archive_path, e))?;
    let mut archive = Archive::new(reader);
    archive.set_preserve_permissions(false);

    let mut extracted = 0;
    let entries = archive
        .entries()
        .map_err(|e| BackupError::io(archive_path, e))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| BackupError::io(archive_path, e))?;
        let unpacked = entry
            .unpack_in(dest)
            .map_err(|e| BackupError::io(dest, e))?;
        if unpacked {
            extracted += 1;
        } else {
            let name = entry
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            warn!("Skipping archive entry outside {}: {}", dest, name);
        }
    }

    debug!("Extracted {} entries from {}", extracted, archive_path);
    Ok(extracted)
}
