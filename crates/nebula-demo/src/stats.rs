//! Chunk lifecycle counters for the demo report.

use std::sync::atomic::{AtomicU64, Ordering};

use nebula_voxel::{Chunk, ChunkListener, Voxel};

#[derive(Debug, Default)]
pub struct ChunkStats {
    created: AtomicU64,
    evicted: AtomicU64,
}

impl ChunkStats {
    pub fn created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }
}

impl ChunkListener<Voxel> for ChunkStats {
    fn chunk_created(&self, _chunk: &Chunk<Voxel>) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    fn chunk_evicted(&self, chunk: &Chunk<Voxel>) {
        self.evicted.fetch_add(1, Ordering::Relaxed);
        tracing::trace!("chunk {} left the cache", chunk.position());
    }
}
