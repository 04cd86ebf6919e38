use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use initrd_builder::config::DEFAULT_KERNEL_ARTIFACT;
use initrd_builder::kernel::{CacheLocation, HttpFetcher, KernelCache};

#[derive(Args, Debug)]
pub(crate) struct FetchKernelArgs {
    /// Kernel version to resolve
    version: String,

    /// Cache next to this executable instead of the home directory
    #[arg(long)]
    local: bool,

    /// Download URL; {version} and {artifact} are substituted
    #[arg(long, env = "INITRD_KERNEL_URL", value_name = "TEMPLATE")]
    url_template: Option<String>,

    /// Artifact name used in cache file names
    #[arg(long, value_name = "NAME")]
    artifact: Option<String>,

    /// Build-config file (default: ./initrd.toml when present)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

pub(crate) fn run_fetch_kernel(args: FetchKernelArgs) -> Result<()> {
    let config = super::load_build_config(args.config.as_deref())?;
    let artifact = args
        .artifact
        .or(config.kernel.artifact)
        .unwrap_or_else(|| DEFAULT_KERNEL_ARTIFACT.to_string());
    let url_template = args.url_template.or(config.kernel.url_template);

    let location = CacheLocation::from_local_flag(args.local);
    let cache = KernelCache::for_location(location, &artifact)
        .with_context(|| format!("opening {:?} kernel cache", location))?;
    let fetcher = HttpFetcher::new(url_template);

    let path = cache
        .resolve(&args.version, args.local, &fetcher)
        .with_context(|| format!("resolving kernel {}", args.version))?;
    println!("{}", path.display());
    Ok(())
}
