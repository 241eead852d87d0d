//! Recorder toggle commands

use anyhow::Result;
use sitekeep_core::{Recorder, SiteRecorder};

use crate::cli::SiteArgs;
use crate::output;

fn recorder(site_args: &SiteArgs) -> Result<SiteRecorder> {
    Ok(SiteRecorder::new(&super::open_site(site_args)?))
}

pub fn start(site_args: &SiteArgs) -> Result<()> {
    recorder(site_args)?.start()?;
    output::success("Recorder started");
    Ok(())
}

pub fn stop(site_args: &SiteArgs) -> Result<()> {
    recorder(site_args)?.stop()?;
    output::success("Recorder stopped");
    Ok(())
}

pub fn status(site_args: &SiteArgs) -> Result<()> {
    let active = recorder(site_args)?.status()?;
    println!("{}", if active { "on" } else { "off" });
    Ok(())
}
