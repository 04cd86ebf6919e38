use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{FetchKernelArgs, PackArgs};

#[derive(Parser, Debug)]
#[command(name = "initrd-builder", version, about = "Assemble initrd bundles and cache kernels")]
struct Cli {
    /// Log debug detail (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pack source directories into an initrd bundle
    Pack(PackArgs),
    /// Make sure a kernel version is in the local cache
    FetchKernel(FetchKernelArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Pack(args) => commands::run_pack(args),
        Command::FetchKernel(args) => commands::run_fetch_kernel(args),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
