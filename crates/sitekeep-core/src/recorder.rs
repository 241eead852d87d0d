//! Request recorder toggle
//!
//! The recorder itself lives elsewhere in the platform; sitekeep only owns the
//! on/off switch, kept behind [`Recorder`].

use crate::error::Result;
use crate::site::Site;
use camino::Utf8PathBuf;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Marker file whose presence means "recording".
pub const RECORDER_MARKER: &str = ".recorder-active";

/// Lifecycle of the recorder switch.
pub trait Recorder {
    fn start(&self) -> Result<()>;
    fn stop(&self) -> Result<()>;
    fn status(&self) -> Result<bool>;
}

/// Recorder switch persisted in the site directory, shared across processes.
#[derive(Debug, Clone)]
pub struct SiteRecorder {
    marker: Utf8PathBuf,
}

impl SiteRecorder {
    pub fn new(site: &Site) -> Self {
        Self {
            marker: site.dir().join(RECORDER_MARKER),
        }
    }
}

impl Recorder for SiteRecorder {
    fn start(&self) -> Result<()> {
        fs::write(&self.marker, b"1")?;
        info!("Recorder started");
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        match fs::remove_file(&self.marker) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        info!("Recorder stopped");
        Ok(())
    }

    fn status(&self) -> Result<bool> {
        Ok(self.marker.is_file())
    }
}

/// Process-local recorder switch.
#[derive(Debug, Default)]
pub struct InMemoryRecorder {
    active: AtomicBool,
}

impl Recorder for InMemoryRecorder {
    fn start(&self) -> Result<()> {
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.active.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn status(&self) -> Result<bool> {
        Ok(self.active.load(Ordering::SeqCst))
    }
}
