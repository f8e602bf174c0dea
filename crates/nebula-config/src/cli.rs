//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Command-line arguments for the volume demo.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "nebula-volume", about = "Paged voxel volume demo")]
pub struct CliArgs {
    /// Memory budget for resident chunks, in MiB.
    #[arg(long)]
    pub memory_budget_mb: Option<usize>,

    /// Chunk side length in voxels (power of two, at most 256).
    #[arg(long)]
    pub chunk_side_length: Option<u16>,

    /// Terrain noise seed.
    #[arg(long)]
    pub seed: Option<u32>,

    /// Worker threads (0 = one per CPU).
    #[arg(long)]
    pub threads: Option<usize>,

    /// Number of regions to sample.
    #[arg(long)]
    pub regions: Option<u32>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(mb) = args.memory_budget_mb {
            self.volume.memory_budget_mb = mb;
        }
        if let Some(side) = args.chunk_side_length {
            self.volume.chunk_side_length = side;
        }
        if let Some(seed) = args.seed {
            self.pager.seed = seed;
        }
        if let Some(threads) = args.threads {
            self.workload.threads = threads;
        }
        if let Some(regions) = args.regions {
            self.workload.regions = regions;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
