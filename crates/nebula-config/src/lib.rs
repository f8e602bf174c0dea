//! Configuration for the paged-volume tools.
//!
//! Settings persist to disk as RON, accept CLI overrides via clap, and stay
//! forward/backward compatible through `#[serde(default)]` on every section.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{Config, DebugConfig, PagerConfig, VolumeConfig, WorkloadConfig};
pub use error::ConfigError;
