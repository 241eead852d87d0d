//! The dump engine: writes every artifact of one backup.
//!
//! Artifacts are written to `<path>.part` and renamed into place once all of
//! them succeeded. The database dump is renamed last, so its presence marks a
//! complete backup. A failed run removes everything it wrote.

use crate::archive::archive_directory;
use crate::compression::{gzip_writer, ChecksumWriter};
use crate::dump::write_header;
use crate::engine::{DatabaseEngine, EngineKind};
use crate::error::{BackupError, Result};
use crate::paths::{part_path, BackupPaths};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use sitekeep_core::{Site, TableName};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// The kinds of file a backup produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Database,
    PublicFiles,
    PrivateFiles,
    Config,
}

impl ArtifactKind {
    pub fn label(&self) -> &'static str {
        match self {
            ArtifactKind::Database => "Database",
            ArtifactKind::PublicFiles => "Public",
            ArtifactKind::PrivateFiles => "Private",
            ArtifactKind::Config => "Config",
        }
    }
}

/// A file written by a backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub path: Utf8PathBuf,
    pub size_bytes: u64,
    /// SHA256 of the file contents
    pub checksum: String,
}

/// Result of a successful dump.
#[derive(Debug, Clone, Serialize)]
pub struct DumpOutcome {
    pub site: String,
    pub engine: EngineKind,
    pub paths: BackupPaths,
    pub tables: Vec<TableName>,
    pub artifacts: Vec<Artifact>,
    pub duration: Duration,
}

impl DumpOutcome {
    /// The one-line success message.
    pub fn summary(&self) -> String {
        let mut line = format!(
            "Backup for Site {} has been successfully completed",
            self.site
        );
        if self.paths.with_files {
            line.push_str(" with files");
        }
        line
    }

    pub fn artifact(&self, kind: ArtifactKind) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.kind == kind)
    }

    /// Removes every artifact of this backup, the database dump first so the
    /// backup stops being registered before anything else goes.
    pub fn discard(&self) {
        let database = self.artifacts.iter().filter(|a| a.kind == ArtifactKind::Database);
        let others = self.artifacts.iter().filter(|a| a.kind != ArtifactKind::Database);
        for artifact in database.chain(others) {
            if let Err(e) = fs::remove_file(&artifact.path) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!("Failed to remove {}: {}", artifact.path, e);
                }
            }
        }
    }
}

/// Files written by an in-progress run, removed again if it fails.
#[derive(Debug, Default)]
struct Staging {
    parts: Vec<Utf8PathBuf>,
    committed: Vec<Utf8PathBuf>,
}

impl Staging {
    fn discard(&self) {
        for path in self.parts.iter().chain(self.committed.iter()) {
            if path.exists() {
                if let Err(e) = fs::remove_file(path) {
                    warn!("Failed to remove {}: {}", path, e);
                }
            }
        }
    }
}

/// Writes backups using a database engine.
pub struct DumpEngine<'a> {
    engine: &'a dyn DatabaseEngine,
}

impl<'a> DumpEngine<'a> {
    pub fn new(engine: &'a dyn DatabaseEngine) -> Self {
        Self { engine }
    }

    /// Dumps `tables` and, when `paths.with_files` is set, the site's files.
    pub fn run(&self, site: &Site, paths: &BackupPaths, tables: &[TableName]) -> Result<DumpOutcome> {
        let start = Instant::now();
        info!(
            "Backing up {} ({} tables{}) to {}",
            site.name(),
            tables.len(),
            if paths.with_files { ", with files" } else { "" },
            paths.backup_dir
        );
        if tables.is_empty() {
            warn!("No tables selected for backup; the dump will contain only its header");
        }

        paths.create_parent_dirs()?;

        let mut staging = Staging::default();
        let artifacts = match self.write_artifacts(site, paths, tables, &mut staging) {
            Ok(artifacts) => artifacts,
            Err(e) => {
                warn!("Backup failed, removing partial artifacts: {}", e);
                staging.discard();
                return Err(e);
            }
        };

        let duration = start.elapsed();
        info!("Backup of {} finished in {:?}", site.name(), duration);

        Ok(DumpOutcome {
            site: site.name().to_string(),
            engine: self.engine.kind(),
            paths: paths.clone(),
            tables: tables.to_vec(),
            artifacts,
            duration,
        })
    }

    fn write_artifacts(
        &self,
        site: &Site,
        paths: &BackupPaths,
        tables: &[TableName],
        staging: &mut Staging,
    ) -> Result<Vec<Artifact>> {
        let mut artifacts = Vec::with_capacity(4);

        if let Some(public) = &paths.public_files {
            debug!("Archiving public files");
            artifacts.push(write_part(ArtifactKind::PublicFiles, public, staging, |out| {
                archive_directory(&site.public_files_dir(), site.dir(), out).map(|_| ())
            })?);
        }

        if let Some(private) = &paths.private_files {
            debug!("Archiving private files");
            artifacts.push(write_part(ArtifactKind::PrivateFiles, private, staging, |out| {
                archive_directory(&site.private_files_dir(), site.dir(), out).map(|_| ())
            })?);
        }

        debug!("Saving site configuration snapshot");
        let config_source = site.config_path();
        artifacts.push(write_part(ArtifactKind::Config, &paths.config, staging, |out| {
            let contents = match fs::read(&config_source) {
                Ok(contents) => contents,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => b"{}\n".to_vec(),
                Err(e) => return Err(BackupError::io(&config_source, e)),
            };
            out.write_all(&contents)
                .map_err(|e| BackupError::io(&paths.config, e))
        })?);

        debug!("Dumping {} tables", tables.len());
        artifacts.push(write_part(ArtifactKind::Database, &paths.database, staging, |out| {
            write_database(self.engine, site.name(), tables, out, &paths.database)
        })?);

        // Database last: its presence marks the backup complete.
        for artifact in &artifacts {
            let part = part_path(&artifact.path);
            fs::rename(&part, &artifact.path).map_err(|e| BackupError::io(&artifact.path, e))?;
            staging.committed.push(artifact.path.clone());
        }
        staging.parts.clear();

        Ok(artifacts)
    }
}

/// Writes the gzip SQL dump of `tables` into `out`, the file at `path`.
fn write_database(
    engine: &dyn DatabaseEngine,
    site_name: &str,
    tables: &[TableName],
    out: &mut dyn Write,
    path: &Utf8Path,
) -> Result<()> {
    let mut gz = gzip_writer(out);
    write_header(&mut gz, site_name, engine.kind(), tables).map_err(|e| BackupError::io(path, e))?;
    if !tables.is_empty() {
        let mut trap = WriteTrap::new(&mut gz);
        let exported = engine.export_tables(tables, &mut trap);
        if let Some(e) = trap.take_error() {
            return Err(BackupError::io(path, e));
        }
        exported?;
    }
    gz.finish().map_err(|e| BackupError::io(path, e))?;
    Ok(())
}

/// Remembers the first error of the writer handed to an engine.
///
/// Engines wrap whatever they see into their own error; a failing dump file
/// has to surface as a filesystem error instead.
struct WriteTrap<W> {
    inner: W,
    error: Option<io::Error>,
}

impl<W: Write> WriteTrap<W> {
    fn new(inner: W) -> Self {
        Self { inner, error: None }
    }

    fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }

    fn record(&mut self, e: io::Error) -> io::Error {
        if self.error.is_none() {
            self.error = Some(io::Error::new(e.kind(), e.to_string()));
        }
        e
    }
}

impl<W: Write> Write for WriteTrap<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf).map_err(|e| self.record(e))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush().map_err(|e| self.record(e))
    }
}

/// Writes one artifact to its `.part` file, returning its size and checksum.
fn write_part<F>(
    kind: ArtifactKind,
    path: &Utf8Path,
    staging: &mut Staging,
    write: F,
) -> Result<Artifact>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    let part = part_path(path);
    let file = File::create(&part).map_err(|e| BackupError::io(&part, e))?;
    staging.parts.push(part.clone());

    let mut writer = ChecksumWriter::new(BufWriter::new(file));
    write(&mut writer)?;

    let size_bytes = writer.bytes_written();
    let checksum = writer.checksum();
    let file = writer
        .into_inner()
        .and_then(|buffered| buffered.into_inner().map_err(|e| e.into_error()))
        .map_err(|e| BackupError::io(&part, e))?;
    file.sync_all().map_err(|e| BackupError::io(&part, e))?;

    debug!("Wrote {} ({} bytes)", part, size_bytes);
    Ok(Artifact {
        kind,
        path: path.to_owned(),
        size_bytes,
        checksum,
    })
}
