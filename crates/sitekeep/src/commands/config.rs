//! set-config command

use anyhow::{bail, Context, Result};
use clap::Args;
use serde_json::Value;

use crate::cli::SiteArgs;
use crate::output;

#[derive(Args, Debug)]
pub struct SetConfigArgs {
    /// Key to set; dots address nested objects (backup.excludes)
    pub key: String,

    /// Value to store
    pub value: String,

    /// Parse the value as a JSON object or array
    #[arg(long)]
    pub as_dict: bool,
}

/// Turns the command-line value into the JSON stored in site config.
///
/// Without `--as-dict`, JSON scalars (numbers, booleans, null, quoted strings)
/// are stored as such and everything else as a plain string.
pub fn parse_value(raw: &str, as_dict: bool) -> Result<Value> {
    if as_dict {
        let value: Value = serde_json::from_str(raw)
            .with_context(|| format!("--as-dict value is not valid JSON: {}", raw))?;
        if !value.is_object() && !value.is_array() {
            bail!("--as-dict value must be a JSON object or array, got: {}", raw);
        }
        return Ok(value);
    }

    match serde_json::from_str::<Value>(raw) {
        Ok(value) if !value.is_object() && !value.is_array() => Ok(value),
        _ => Ok(Value::String(raw.to_string())),
    }
}

pub fn run(args: SetConfigArgs, site_args: &SiteArgs) -> Result<()> {
    let site = super::open_site(site_args)?;
    let value = parse_value(&args.value, args.as_dict)?;

    let path = site.config_path();
    let mut config = site.load_own_config()?;
    config.set(&args.key, value)?;
    config
        .save(&path)
        .with_context(|| format!("Failed to write {}", path))?;

    output::success(&format!("Updated {} in {}", args.key, path));
    Ok(())
}
