//! Demo binary that drives a paged voxel volume end to end.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI flags.
//! Run with `cargo run -p nebula-demo` for the defaults, or e.g.
//! `cargo run -p nebula-demo -- --memory-budget-mb 8 --threads 4` to watch
//! eviction under a tight budget.

mod heightmap;
mod stats;
mod terrain_pager;
mod workload;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;

use clap::Parser;
use glam::IVec3;
use nebula_config::{CliArgs, Config};
use nebula_math::Region;
use nebula_voxel::{PagedVolume, Voxel, VoxelType, VolumeError};
use tracing::info;

use crate::stats::ChunkStats;
use crate::terrain_pager::TerrainPager;
use crate::workload::{ScanPool, ScanTask};

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let config_dir = args
        .config
        .clone()
        .or_else(Config::default_dir)
        .unwrap_or_else(|| PathBuf::from("."));

    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join(&config.debug.log_dir);
    nebula_log::init_logging(Some(&log_dir), config.debug.file_logging, Some(&config));

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config) -> Result<(), VolumeError> {
    let pager = Arc::new(TerrainPager::new(
        config.pager.seed,
        config.pager.terrain_height,
        config.pager.persist_modified,
    ));
    let volume = Arc::new(PagedVolume::<Voxel>::try_with_settings(
        pager.clone(),
        config.volume.to_settings(),
    )?);
    let stats = Arc::new(ChunkStats::default());
    volume.add_chunk_listener(stats.clone());

    info!(
        "Volume ready: {} voxel chunks, limit {} chunks, eviction {:?}",
        volume.chunk_side_length(),
        volume.chunk_count_limit(),
        volume.eviction_policy()
    );

    carve_landmarks(&volume, config.pager.terrain_height);

    let size = config.workload.region_size.max(1);
    let tasks = scan_tasks(config.workload.regions, size, config.pager.terrain_height);
    let threads = match config.workload.threads {
        0 => ScanPool::default_thread_count(),
        n => n,
    };
    let pool = ScanPool::new(Arc::clone(&volume), threads, threads * 2);
    info!("Scanning {} regions of {size}³ on {} threads", tasks.len(), pool.worker_count());

    let start = Instant::now();
    let results = pool.run(tasks);
    let elapsed = start.elapsed();
    drop(pool);

    let solid: u64 = results.iter().map(|r| r.solid).sum();
    let surface: u64 = results.iter().map(|r| r.surface).sum();
    let slowest = results.iter().map(|r| r.elapsed_us).max().unwrap_or(0);
    info!(
        "Scan finished in {:.1} ms: {solid} solid voxels, {surface} on the surface (slowest region {slowest} us)",
        elapsed.as_secs_f64() * 1000.0
    );
    info!(
        "Chunks: {} resident ({} KiB), {} created, {} evicted; written region {}",
        volume.chunk_count(),
        volume.calculate_size_in_bytes() / 1024,
        stats.created(),
        stats.evicted(),
        volume.region()
    );

    volume.flush_all();
    let pager_stats = pager.stats();
    info!(
        "Pager: {} generated, {} loaded, {} stored ({} chunks held)",
        pager_stats.generated.load(Ordering::Relaxed),
        pager_stats.loaded.load(Ordering::Relaxed),
        pager_stats.stored.load(Ordering::Relaxed),
        pager.stored_chunks()
    );
    Ok(())
}

/// Writes a few structures through the volume API so that edits get paged out and back in.
fn carve_landmarks(volume: &PagedVolume<Voxel>, terrain_height: i32) {
    let pillar = vec![Voxel::new(VoxelType::ROCK, 200); 96];
    volume.set_voxels_columns(-4, terrain_height - 16, -4, 8, 8, &pillar);

    let mut shaft = Region::new(IVec3::new(60, terrain_height - 40, 60), IVec3::new(67, terrain_height + 40, 67));
    volume.prefetch(&shaft);
    shaft.shrink_by(IVec3::new(1, 0, 1));
    for z in shaft.lower_z()..=shaft.upper_z() {
        for y in shaft.lower_y()..=shaft.upper_y() {
            for x in shaft.lower_x()..=shaft.upper_x() {
                volume.set_voxel(IVec3::new(x, y, z), Voxel::AIR);
            }
        }
    }
    info!("Landmarks written, volume region now {}", volume.region());
}

/// A spiral of regions centred on the terrain surface.
fn scan_tasks(count: u32, size: i32, terrain_height: i32) -> Vec<ScanTask> {
    let mut position = IVec3::new(0, terrain_height - size / 2, 0);
    let mut direction = IVec3::X;
    let mut leg = 1;
    let mut walked = 0;
    let mut turns = 0;
    (0..count)
        .map(|id| {
            let region = Region::new(position, position + IVec3::splat(size - 1));
            position += direction * size;
            walked += 1;
            if walked == leg {
                walked = 0;
                direction = IVec3::new(-direction.z, 0, direction.x);
                turns += 1;
                if turns % 2 == 0 {
                    leg += 1;
                }
            }
            ScanTask { id, region }
        })
        .collect()
}
