//! CLI command implementations

pub mod backup;
pub mod backups;
pub mod config;
pub mod recording;
pub mod restore;
pub mod version;

use crate::cli::SiteArgs;
use anyhow::{Context, Result};
use sitekeep_core::Site;

/// Opens the site selected by `--site`/`SITEKEEP_SITE`.
pub fn open_site(args: &SiteArgs) -> Result<Site> {
    let name = args
        .site
        .as_deref()
        .ok_or(sitekeep_core::Error::NoSiteSelected)?;
    Site::open(&args.sites_dir, name).with_context(|| format!("Cannot open site {}", name))
}
