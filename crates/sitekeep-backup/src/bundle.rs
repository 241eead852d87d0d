//! Single-file backup bundles.
//!
//! A bundle is a gzip tar holding `.backup-manifest.json` first, followed by
//! every artifact of one backup under its default file name. Creating a
//! bundle never modifies the artifacts themselves.

use crate::compression::{calculate_checksum, gzip_writer, open_maybe_gzip};
use crate::dumper::{Artifact, ArtifactKind, DumpOutcome};
use crate::error::{BackupError, Result};
use crate::manifest::{ArtifactInfo, BackupManifest, ChecksumInfo, MANIFEST_FILENAME};
use crate::paths::{
    part_path, CONFIG_SUFFIX, DATABASE_SUFFIX, PRIVATE_FILES_SUFFIX, PUBLIC_FILES_SUFFIX,
};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs::{self, File};
use std::io::{BufWriter, Read};
use tar::{Archive, Builder as TarBuilder, Header};
use tracing::{debug, info, warn};

/// The artifacts found in an unpacked bundle.
#[derive(Debug, Clone)]
pub struct UnpackedBundle {
    pub manifest: BackupManifest,
    pub database: Utf8PathBuf,
    pub public_files: Option<Utf8PathBuf>,
    pub private_files: Option<Utf8PathBuf>,
    pub config: Option<Utf8PathBuf>,
}

/// Name of an artifact inside a bundle.
fn entry_name(stem: &str, kind: ArtifactKind) -> String {
    let suffix = match kind {
        ArtifactKind::Database => DATABASE_SUFFIX,
        ArtifactKind::PublicFiles => PUBLIC_FILES_SUFFIX,
        ArtifactKind::PrivateFiles => PRIVATE_FILES_SUFFIX,
        ArtifactKind::Config => CONFIG_SUFFIX,
    };
    format!("{}-{}", stem, suffix)
}

/// Bundle order: database, file archives, configuration.
fn bundle_rank(kind: ArtifactKind) -> u8 {
    match kind {
        ArtifactKind::Database => 0,
        ArtifactKind::PublicFiles => 1,
        ArtifactKind::PrivateFiles => 2,
        ArtifactKind::Config => 3,
    }
}

/// Writes the bundle for a finished dump to `outcome.paths.bundle`.
///
/// Returns the manifest stored in the bundle.
pub fn create_bundle(outcome: &DumpOutcome) -> Result<BackupManifest> {
    let bundle_path = outcome
        .paths
        .bundle
        .as_deref()
        .ok_or_else(|| BackupError::invalid_policy("no bundle path was planned"))?;
    let mut artifacts: Vec<_> = outcome.artifacts.iter().collect();
    artifacts.sort_by_key(|a| bundle_rank(a.kind));

    let manifest = BackupManifest::new(
        outcome.site.clone(),
        outcome.engine.as_str(),
        outcome.paths.is_partial,
        outcome.tables.clone(),
        artifacts
            .iter()
            .map(|a| ArtifactInfo {
                name: entry_name(&outcome.paths.stem, a.kind),
                size_bytes: a.size_bytes,
                checksum: ChecksumInfo::sha256(a.checksum.clone()),
            })
            .collect(),
    );
    let manifest_json = manifest.to_json()?;

    info!("Creating bundle {}", bundle_path);
    let part = part_path(bundle_path);
    let written = write_bundle(&part, &manifest_json, &artifacts, &manifest)
        .and_then(|()| fs::rename(&part, bundle_path).map_err(|e| BackupError::io(bundle_path, e)));
    if let Err(e) = written {
        if let Err(cleanup) = fs::remove_file(&part) {
            debug!("Could not remove {}: {}", part, cleanup);
        }
        return Err(e);
    }

    debug!(
        "Bundled {} artifacts ({} bytes before compression)",
        manifest.artifacts.len(),
        manifest.total_size()
    );
    Ok(manifest)
}

fn write_bundle(
    part: &Utf8Path,
    manifest_json: &str,
    artifacts: &[&Artifact],
    manifest: &BackupManifest,
) -> Result<()> {
    let file = File::create(part).map_err(|e| BackupError::io(part, e))?;
    let mut tar = TarBuilder::new(gzip_writer(BufWriter::new(file)));

    let mut header = Header::new_gnu();
    header.set_size(manifest_json.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(manifest.created_at.timestamp().max(0) as u64);
    header.set_cksum();
    tar.append_data(&mut header, MANIFEST_FILENAME, manifest_json.as_bytes())
        .map_err(|e| BackupError::io(part, e))?;

    for (artifact, info) in artifacts.iter().zip(&manifest.artifacts) {
        tar.append_path_with_name(&artifact.path, &info.name)
            .map_err(|e| BackupError::io(&artifact.path, e))?;
    }

    let gz = tar.into_inner().map_err(|e| BackupError::io(part, e))?;
    let buffered = gz.finish().map_err(|e| BackupError::io(part, e))?;
    let file = buffered
        .into_inner()
        .map_err(|e| BackupError::io(part, e.into_error()))?;
    file.sync_all().map_err(|e| BackupError::io(part, e))
}

/// Unpacks a bundle into `dest` and verifies every artifact against the manifest.
pub fn unpack_bundle(bundle: &Utf8Path, dest: &Utf8Path) -> Result<UnpackedBundle> {
    info!("Unpacking bundle {}", bundle);
    fs::create_dir_all(dest).map_err(|e| BackupError::io(dest, e))?;

    let reader = open_maybe_gzip(bundle).map_err(|e| BackupError::io(bundle, e))?;
    let mut archive = Archive::new(reader);
    archive.set_preserve_permissions(false);
    let mut entries = archive.entries().map_err(|e| BackupError::io(bundle, e))?;

    let manifest = {
        let mut first = entries
            .next()
            .ok_or_else(|| BackupError::manifest(format!("{} is empty", bundle)))?
            .map_err(|e| BackupError::io(bundle, e))?;
        let name = entry_path(&first);
        if name != MANIFEST_FILENAME {
            return Err(BackupError::manifest(format!(
                "{} does not start with {} (found {})",
                bundle, MANIFEST_FILENAME, name
            )));
        }
        let mut json = String::new();
        first
            .read_to_string(&mut json)
            .map_err(|e| BackupError::io(bundle, e))?;
        let manifest = BackupManifest::from_json(&json)?;
        manifest.validate()?;
        manifest
    };

    for entry in entries {
        let mut entry = entry.map_err(|e| BackupError::io(bundle, e))?;
        let name = entry_path(&entry);
        if manifest.artifact(&name).is_none() {
            warn!("Skipping bundle entry not listed in the manifest: {}", name);
            continue;
        }
        entry.unpack_in(dest).map_err(|e| BackupError::io(dest, e))?;
    }

    for artifact in &manifest.artifacts {
        let path = dest.join(&artifact.name);
        if !path.is_file() {
            return Err(BackupError::manifest(format!(
                "Artifact {} is listed in the manifest but missing from {}",
                artifact.name, bundle
            )));
        }
        let checksum = calculate_checksum(&path).map_err(|e| BackupError::io(&path, e))?;
        if checksum != artifact.checksum.value {
            return Err(BackupError::manifest(format!(
                "Checksum mismatch for {}: expected {}, found {}",
                artifact.name, artifact.checksum.value, checksum
            )));
        }
    }
    debug!("Verified {} artifacts", manifest.artifacts.len());

    let find = |suffix: &str| {
        manifest
            .artifacts
            .iter()
            .map(|a| a.name.as_str())
            .find(|name| name.ends_with(suffix) && !is_private_archive(name, suffix))
            .map(|name| dest.join(name))
    };

    let database = find(DATABASE_SUFFIX)
        .ok_or_else(|| BackupError::manifest(format!("{} holds no database dump", bundle)))?;

    Ok(UnpackedBundle {
        database,
        public_files: find(PUBLIC_FILES_SUFFIX),
        private_files: find(PRIVATE_FILES_SUFFIX),
        config: find(CONFIG_SUFFIX),
        manifest,
    })
}

/// `files.tar` is also a suffix of `private-files.tar`.
fn is_private_archive(name: &str, suffix: &str) -> bool {
    suffix == PUBLIC_FILES_SUFFIX && name.ends_with(PRIVATE_FILES_SUFFIX)
}

fn entry_path<R: Read>(entry: &tar::Entry<'_, R>) -> String {
    entry
        .path()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default()
}
