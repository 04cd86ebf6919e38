//! Initrd bundle assembly and kernel caching.
//!
//! This crate builds the initial RAM bundle of a runtime image out of one or
//! more source directories, and keeps a per-user cache of prebuilt kernels.
//!
//! - **Collection** - walk every source directory concurrently, honoring ignore patterns
//! - **Manifest** - name every file inside the bundle and locate the single runtime
//!   library descriptor (`runtimecorelib.json`) plus the boot entry point
//! - **Emission** - serialize the manifest into the output bundle file
//! - **Kernel cache** - resolve a kernel version to a local file, downloading it once
//!
//! # Architecture
//!
//! ```text
//! SourceDirectory[] ──► collect ──► RawFileRecord[] ──► manifest ──► Bundle ──► artifact ──► .initrd
//!                      (walker)                     (descriptor,              (writer)
//!                                                    entry point)
//!
//! version ──► kernel::KernelCache ──► <home>/.kernel-cache/<artifact>.<version>
//!                   │
//!                   └── miss ──► KernelFetcher (HTTP)
//! ```
//!
//! The walker, bundle writer and kernel fetcher are traits, with
//! [`collect::WalkDirWalker`], [`artifact::InitrdWriter`] and
//! [`kernel::HttpFetcher`] as the shipped implementations.
//!
//! # Example
//!
//! ```rust,no_run
//! use initrd_builder::artifact::InitrdWriter;
//! use initrd_builder::collect::WalkDirWalker;
//! use initrd_builder::config::SourceDirectory;
//! use initrd_builder::pack::{pack, PackOptions, PackOutcome};
//!
//! let options = PackOptions::new(vec![
//!     SourceDirectory::new("node_modules/jsos", "jsos"),
//!     SourceDirectory::new("app", "app"),
//! ]);
//! if let PackOutcome::Built { summary, .. } = pack(&options, &WalkDirWalker, &InitrdWriter::default())? {
//!     println!("wrote {}", summary.output.display());
//! }
//! # Ok::<(), initrd_builder::Error>(())
//! ```

pub mod artifact;
pub mod collect;
pub mod config;
pub mod error;
pub mod kernel;
pub mod manifest;
pub mod pack;

pub use error::{Error, Result};
pub use manifest::{Bundle, BundleEntry, CoreConfig};
pub use pack::{pack, PackOptions, PackOutcome};
