use anyhow::{bail, Context, Result};
use clap::Args;
use std::path::PathBuf;

use initrd_builder::artifact::InitrdWriter;
use initrd_builder::collect::WalkDirWalker;
use initrd_builder::config::{SourceDirectory, DEFAULT_OUTPUT};
use initrd_builder::pack::{pack, PackOptions, PackOutcome};

#[derive(Args, Debug)]
pub(crate) struct PackArgs {
    /// Source directories, optionally as DIR=PACKAGE_PATH
    #[arg(value_name = "DIR[=PACKAGE_PATH]")]
    dirs: Vec<SourceDirectory>,

    /// Build-config file (default: ./initrd.toml when present)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output bundle file
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Application entry point
    #[arg(long, value_name = "APP_ENTRY")]
    entry: Option<String>,

    /// Explicit system entry, replacing the runtime library loader
    #[arg(long, value_name = "PATH")]
    system_entry: Option<String>,

    /// Print the files that would be packed and exit
    #[arg(long)]
    list: bool,

    /// Extra ignore pattern applied to every directory (repeatable)
    #[arg(long, value_name = "PATTERN")]
    ignore: Vec<String>,

    /// zstd compression level
    #[arg(long, default_value_t = initrd_builder::artifact::initrd::DEFAULT_ZSTD_LEVEL)]
    level: i32,
}

pub(crate) fn run_pack(args: PackArgs) -> Result<()> {
    let config = super::load_build_config(args.config.as_deref())?;

    let dirs = if args.dirs.is_empty() {
        config.source_directories()
    } else {
        args.dirs
    };
    if dirs.is_empty() {
        bail!("no source directories given (pass DIR arguments or add [[directory]] to initrd.toml)");
    }

    let mut options = PackOptions::new(dirs);
    options.output = args
        .output
        .or(config.output.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
    options.app_entry = args.entry.or(config.entry.clone());
    options.system_entry = args.system_entry.or(config.system_entry.clone());
    options.ignore = config.ignore_with(&args.ignore);
    options.list_only = args.list;

    let outcome = pack(&options, &WalkDirWalker, &InitrdWriter::new(args.level))
        .with_context(|| format!("packing {}", options.output.display()))?;

    match outcome {
        PackOutcome::Listed(entries) => {
            for entry in entries {
                println!("{}", entry.relative_path.display());
            }
        }
        PackOutcome::Built { summary, .. } => {
            println!(
                "{} ({} files, {} bytes, sha256 {})",
                summary.output.display(),
                summary.entries,
                summary.size_bytes,
                summary.sha256
            );
        }
    }
    Ok(())
}
