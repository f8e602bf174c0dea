//! Procedural terrain pager with an in-memory store for modified chunks.
//!
//! Chunks are generated from a heightmap the first time they are paged in.
//! When a modified chunk is paged out its raw voxel bytes go into a
//! [`DashMap`], and the next page-in for that chunk restores them instead of
//! regenerating.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use glam::IVec3;
use nebula_math::morton;
use nebula_voxel::{Chunk, Pager, PagerContext, Voxel, VoxelType};

use crate::heightmap::{HeightmapParams, HeightmapSampler};

/// Depth below the surface at which dirt turns into rock.
const DIRT_DEPTH: i32 = 3;

/// Height of the water surface.
const SEA_LEVEL: i32 = 0;

/// Counters for pager activity.
#[derive(Debug, Default)]
pub struct PagerStats {
    pub generated: AtomicU64,
    pub loaded: AtomicU64,
    pub stored: AtomicU64,
}

pub struct TerrainPager {
    heightmap: HeightmapSampler,
    terrain_height: i32,
    persist_modified: bool,
    store: DashMap<IVec3, Vec<u8>>,
    stats: PagerStats,
}

impl TerrainPager {
    pub fn new(seed: u32, terrain_height: i32, persist_modified: bool) -> Self {
        Self {
            heightmap: HeightmapSampler::new(HeightmapParams {
                seed,
                ..Default::default()
            }),
            terrain_height,
            persist_modified,
            store: DashMap::new(),
            stats: PagerStats::default(),
        }
    }

    pub fn stats(&self) -> &PagerStats {
        &self.stats
    }

    /// Number of chunks held in the store.
    pub fn stored_chunks(&self) -> usize {
        self.store.len()
    }

    /// Surface height of the column at `(x, z)`.
    pub fn surface_height(&self, x: i32, z: i32) -> i32 {
        self.terrain_height + self.heightmap.sample(x as f64, z as f64).round() as i32
    }

    /// Material of the voxel at height `y` in a column whose surface is at `surface`.
    pub fn material_at(y: i32, surface: i32) -> VoxelType {
        if y > surface {
            if y <= SEA_LEVEL { VoxelType::WATER } else { VoxelType::AIR }
        } else if y == surface {
            if surface < SEA_LEVEL { VoxelType::SAND } else { VoxelType::GRASS }
        } else if y > surface - DIRT_DEPTH {
            VoxelType::DIRT
        } else {
            VoxelType::ROCK
        }
    }

    fn generate(&self, chunk: &mut Chunk<Voxel>) {
        let mins = chunk.region().lower();
        let side = chunk.side_length() as i32;
        let surfaces: Vec<i32> = (0..side * side)
            .map(|i| self.surface_height(mins.x + i % side, mins.z + i / side))
            .collect();

        let data = chunk.data_mut();
        for lz in 0..side {
            for lx in 0..side {
                let surface = surfaces[(lz * side + lx) as usize];
                let column = morton::MORTON_X[lx as usize] | morton::MORTON_Z[lz as usize];
                for ly in 0..side {
                    let material = Self::material_at(mins.y + ly, surface);
                    if !material.is_air() {
                        let index = column | morton::MORTON_Y[ly as usize];
                        data[index as usize] = Voxel::new(material, (surface & 0xff) as u8);
                    }
                }
            }
        }
    }
}

impl Pager<Voxel> for TerrainPager {
    fn page_in(&self, ctx: &mut PagerContext<'_, Voxel>) -> bool {
        let position = ctx.chunk.position();
        if let Some(bytes) = self.store.get(&position)
            && ctx.chunk.set_data_bytes(&bytes)
        {
            self.stats.loaded.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("loaded chunk {position} from store");
            return false;
        }
        self.generate(ctx.chunk);
        self.stats.generated.fetch_add(1, Ordering::Relaxed);
        true
    }

    fn page_out(&self, chunk: &Chunk<Voxel>) {
        if !self.persist_modified {
            return;
        }
        self.store.insert(chunk.position(), chunk.data_bytes());
        self.stats.stored.fetch_add(1, Ordering::Relaxed);
    }
}
