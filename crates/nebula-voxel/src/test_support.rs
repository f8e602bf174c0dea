//! Pagers shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use glam::IVec3;
use rustc_hash::FxHashMap;
use std::sync::Mutex;

use crate::chunk::Chunk;
use crate::pager::{Pager, PagerContext};

/// Fills every chunk with a value derived from the voxel position and counts calls.
pub(crate) struct RecordingPager {
    page_ins: Mutex<FxHashMap<IVec3, usize>>,
    page_outs: Mutex<FxHashMap<IVec3, usize>>,
    total_page_outs: AtomicUsize,
    fill: bool,
}

impl RecordingPager {
    /// A pager that leaves chunks empty.
    pub(crate) fn new() -> Self {
        Self {
            page_ins: Mutex::new(FxHashMap::default()),
            page_outs: Mutex::new(FxHashMap::default()),
            total_page_outs: AtomicUsize::new(0),
            fill: false,
        }
    }

    /// A pager that writes [`RecordingPager::pattern`] into every chunk.
    pub(crate) fn filling() -> Self {
        Self {
            fill: true,
            ..Self::new()
        }
    }

    /// Deterministic value for a voxel position.
    pub(crate) fn pattern(pos: IVec3) -> u32 {
        (pos.x.wrapping_mul(73_856_093) ^ pos.y.wrapping_mul(19_349_663) ^ pos.z.wrapping_mul(83_492_791))
            as u32
    }

    pub(crate) fn page_in_count(&self, chunk: IVec3) -> usize {
        self.page_ins.lock().unwrap().get(&chunk).copied().unwrap_or(0)
    }

    pub(crate) fn page_out_count(&self, chunk: IVec3) -> usize {
        self.page_outs.lock().unwrap().get(&chunk).copied().unwrap_or(0)
    }

    pub(crate) fn total_page_outs(&self) -> usize {
        self.total_page_outs.load(Ordering::SeqCst)
    }
}

impl Pager<u32> for RecordingPager {
    fn page_in(&self, ctx: &mut PagerContext<'_, u32>) -> bool {
        let position = ctx.chunk.position();
        *self.page_ins.lock().unwrap().entry(position).or_insert(0) += 1;
        if !self.fill {
            return false;
        }
        let region = ctx.region;
        let mins = region.lower();
        let side = ctx.chunk.side_length() as u32;
        for z in 0..side {
            for y in 0..side {
                for x in 0..side {
                    let pos = mins + IVec3::new(x as i32, y as i32, z as i32);
                    ctx.chunk.set_voxel(x, y, z, Self::pattern(pos));
                }
            }
        }
        // Generated data has never been persisted.
        true
    }

    fn page_out(&self, chunk: &Chunk<u32>) {
        *self.page_outs.lock().unwrap().entry(chunk.position()).or_insert(0) += 1;
        self.total_page_outs.fetch_add(1, Ordering::SeqCst);
    }
}
