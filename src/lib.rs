pub mod cache;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod hasher;
pub mod index;
pub mod pipeline;
pub mod scanner;
pub mod utils;
pub mod validator;

pub use cache::{CacheSnapshot, CacheStore};
pub use cli::Cli;
pub use config::Config;
pub use duplicates::{FolderGroup, ResolveOptions, ResolveReport, folder_groups, resolve};
pub use error::{Error, ExitCode, Result};
pub use hasher::{HashAlgorithm, Hasher};
pub use index::{Digest, Index};
pub use pipeline::{CorruptCachePolicy, IndexSource, RunOptions, RunSummary, run};
pub use scanner::{ScanReport, build_index};
pub use utils::format_human_elapsed;
pub use validator::{ValidationReport, validate};
