mod kernel;
mod pack;

pub(crate) use kernel::{run_fetch_kernel, FetchKernelArgs};
pub(crate) use pack::{run_pack, PackArgs};

use anyhow::{Context, Result};
use initrd_builder::config::BuildConfig;
use std::path::Path;

/// `--config` when given, otherwise `initrd.toml` in the working directory.
pub(crate) fn load_build_config(explicit: Option<&Path>) -> Result<BuildConfig> {
    let cwd = std::env::current_dir().context("reading current directory")?;
    let config = BuildConfig::discover(explicit, &cwd)?;
    Ok(config.unwrap_or_default())
}
