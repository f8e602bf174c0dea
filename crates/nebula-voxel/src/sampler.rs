//! Cursor-style voxel access with cheap neighbour stepping.
//!
//! [`Sampler`] caches the chunk under its position plus the Morton index of
//! the current voxel. Steps and neighbour peeks that stay inside the chunk
//! adjust that index through the `DELTA_*` tables instead of re-encoding or
//! going back to the chunk table.

use std::sync::Arc;

use glam::{IVec3, UVec3};
use nebula_math::morton::{self, DELTA_X, DELTA_Y, DELTA_Z};

use crate::chunk::Chunk;
use crate::paged_volume::PagedVolume;
use crate::voxel::VoxelValue;

macro_rules! named_peeks {
    ($($name:ident => ($dx:expr, $dy:expr, $dz:expr)),* $(,)?) => {
        $(
            fn $name(&self) -> V {
                self.peek_voxel($dx, $dy, $dz)
            }
        )*
    };
}

/// Common interface of [`Sampler`] and [`BufferedSampler`](crate::BufferedSampler).
///
/// Named peeks follow the pattern `peek_voxel_{a}x{b}y{c}z` where each offset
/// is `1n` (-1), `0p` (0) or `1p` (+1).
pub trait VoxelSampler<V: VoxelValue> {
    /// Absolute voxel position of the cursor.
    fn position(&self) -> IVec3;

    /// Voxel under the cursor.
    fn voxel(&self) -> V;

    fn set_position(&mut self, pos: IVec3);

    /// Writes the voxel under the cursor. Returns `false` if nothing was written.
    fn set_voxel(&mut self, value: V) -> bool;

    fn move_positive_x(&mut self);
    fn move_positive_y(&mut self);
    fn move_positive_z(&mut self);
    fn move_negative_x(&mut self);
    fn move_negative_y(&mut self);
    fn move_negative_z(&mut self);

    /// Voxel at the cursor offset by `(dx, dy, dz)`, each in `-1..=1`.
    fn peek_voxel(&self, dx: i32, dy: i32, dz: i32) -> V;

    fn set_position_xyz(&mut self, x: i32, y: i32, z: i32) {
        self.set_position(IVec3::new(x, y, z));
    }

    named_peeks! {
        peek_voxel_1nx1ny1nz => (-1, -1, -1),
        peek_voxel_1nx1ny0pz => (-1, -1, 0),
        peek_voxel_1nx1ny1pz => (-1, -1, 1),
        peek_voxel_1nx0py1nz => (-1, 0, -1),
        peek_voxel_1nx0py0pz => (-1, 0, 0),
        peek_voxel_1nx0py1pz => (-1, 0, 1),
        peek_voxel_1nx1py1nz => (-1, 1, -1),
        peek_voxel_1nx1py0pz => (-1, 1, 0),
        peek_voxel_1nx1py1pz => (-1, 1, 1),
        peek_voxel_0px1ny1nz => (0, -1, -1),
        peek_voxel_0px1ny0pz => (0, -1, 0),
        peek_voxel_0px1ny1pz => (0, -1, 1),
        peek_voxel_0px0py1nz => (0, 0, -1),
        peek_voxel_0px0py0pz => (0, 0, 0),
        peek_voxel_0px0py1pz => (0, 0, 1),
        peek_voxel_0px1py1nz => (0, 1, -1),
        peek_voxel_0px1py0pz => (0, 1, 0),
        peek_voxel_0px1py1pz => (0, 1, 1),
        peek_voxel_1px1ny1nz => (1, -1, -1),
        peek_voxel_1px1ny0pz => (1, -1, 0),
        peek_voxel_1px1ny1pz => (1, -1, 1),
        peek_voxel_1px0py1nz => (1, 0, -1),
        peek_voxel_1px0py0pz => (1, 0, 0),
        peek_voxel_1px0py1pz => (1, 0, 1),
        peek_voxel_1px1py1nz => (1, 1, -1),
        peek_voxel_1px1py0pz => (1, 1, 0),
        peek_voxel_1px1py1pz => (1, 1, 1),
    }
}

/// A movable cursor over a [`PagedVolume`].
///
/// The sampler holds a strong reference to the chunk it is in, so that chunk
/// survives eviction until the sampler moves away or is dropped. A sampler
/// is a single-threaded cursor; give each thread its own.
///
/// Until the first [`set_position`](VoxelSampler::set_position) the sampler
/// is unbound: reads return the empty voxel, writes are ignored and moves
/// only shift the position.
pub struct Sampler<'a, V: VoxelValue> {
    volume: &'a PagedVolume<V>,
    current: Option<Arc<Chunk<V>>>,
    previous: Option<Arc<Chunk<V>>>,
    position: IVec3,
    /// Position inside the current chunk, each axis in `[0, side)`.
    local: UVec3,
    /// Morton index of `local`.
    index: u32,
    side_length: u32,
}

impl<'a, V: VoxelValue> Sampler<'a, V> {
    /// Creates an unbound sampler.
    pub fn new(volume: &'a PagedVolume<V>) -> Self {
        Self {
            volume,
            current: None,
            previous: None,
            position: IVec3::ZERO,
            local: UVec3::ZERO,
            index: 0,
            side_length: volume.chunk_side_length() as u32,
        }
    }

    pub fn volume(&self) -> &'a PagedVolume<V> {
        self.volume
    }

    /// The chunk the cursor is in, if bound.
    pub fn current_chunk(&self) -> Option<&Arc<Chunk<V>>> {
        self.current.as_ref()
    }

    /// Rebinds to the chunk holding `pos`, reusing the current or previous chunk if possible.
    ///
    /// A cached chunk that has been evicted is not reused; the volume may
    /// already hold a newer copy of it.
    fn bind(&mut self, pos: IVec3) {
        let coord = self.volume.chunk_pos(pos);
        let reusable = |slot: &Option<Arc<Chunk<V>>>| {
            slot.as_ref().is_some_and(|c| c.position() == coord && !c.is_evicted())
        };
        if reusable(&self.current) {
            if let Some(chunk) = &self.current {
                self.volume.touch(chunk);
            }
        } else if reusable(&self.previous) {
            std::mem::swap(&mut self.current, &mut self.previous);
            if let Some(chunk) = &self.current {
                self.volume.touch(chunk);
            }
        } else {
            let chunk = self.volume.resolve_chunk(coord);
            self.previous = self.current.replace(chunk);
        }

        self.local = self.volume.local_pos(pos).as_uvec3();
        self.index = morton::encode(self.local.x, self.local.y, self.local.z);
    }

    /// Morton index of the neighbour at `(dx, dy, dz)` if it is in the current chunk.
    fn neighbour_index(&self, dx: i32, dy: i32, dz: i32) -> Option<u32> {
        let mut index = self.index;
        for (offset, local, deltas) in [
            (dx, self.local.x, &DELTA_X),
            (dy, self.local.y, &DELTA_Y),
            (dz, self.local.z, &DELTA_Z),
        ] {
            match offset {
                0 => {}
                1 if local + 1 < self.side_length => {
                    index = index.wrapping_add_signed(deltas[local as usize]);
                }
                -1 if local > 0 => {
                    index = index.wrapping_add_signed(-deltas[local as usize - 1]);
                }
                _ => return None,
            }
        }
        Some(index)
    }
}

impl<V: VoxelValue> VoxelSampler<V> for Sampler<'_, V> {
    fn position(&self) -> IVec3 {
        self.position
    }

    fn voxel(&self) -> V {
        match &self.current {
            Some(chunk) => chunk.voxel_at_index(self.index),
            None => V::empty(),
        }
    }

    fn set_position(&mut self, pos: IVec3) {
        self.position = pos;
        self.bind(pos);
    }

    /// Writes into the bound chunk and marks it modified.
    ///
    /// The volume's accumulated region is not updated; use
    /// [`PagedVolume::set_voxel`] when that matters.
    fn set_voxel(&mut self, value: V) -> bool {
        match &self.current {
            Some(chunk) => {
                chunk.set_voxel_at_index(self.index, value);
                true
            }
            None => false,
        }
    }

    fn move_positive_x(&mut self) {
        self.position.x += 1;
        if self.current.is_none() {
            return;
        }
        if self.local.x + 1 < self.side_length {
            self.index = self.index.wrapping_add_signed(DELTA_X[self.local.x as usize]);
            self.local.x += 1;
        } else {
            self.bind(self.position);
        }
    }

    fn move_positive_y(&mut self) {
        self.position.y += 1;
        if self.current.is_none() {
            return;
        }
        if self.local.y + 1 < self.side_length {
            self.index = self.index.wrapping_add_signed(DELTA_Y[self.local.y as usize]);
            self.local.y += 1;
        } else {
            self.bind(self.position);
        }
    }

    fn move_positive_z(&mut self) {
        self.position.z += 1;
        if self.current.is_none() {
            return;
        }
        if self.local.z + 1 < self.side_length {
            self.index = self.index.wrapping_add_signed(DELTA_Z[self.local.z as usize]);
            self.local.z += 1;
        } else {
            self.bind(self.position);
        }
    }

    fn move_negative_x(&mut self) {
        self.position.x -= 1;
        if self.current.is_none() {
            return;
        }
        if self.local.x > 0 {
            self.local.x -= 1;
            self.index = self.index.wrapping_add_signed(-DELTA_X[self.local.x as usize]);
        } else {
            self.bind(self.position);
        }
    }

    fn move_negative_y(&mut self) {
        self.position.y -= 1;
        if self.current.is_none() {
            return;
        }
        if self.local.y > 0 {
            self.local.y -= 1;
            self.index = self.index.wrapping_add_signed(-DELTA_Y[self.local.y as usize]);
        } else {
            self.bind(self.position);
        }
    }

    fn move_negative_z(&mut self) {
        self.position.z -= 1;
        if self.current.is_none() {
            return;
        }
        if self.local.z > 0 {
            self.local.z -= 1;
            self.index = self.index.wrapping_add_signed(-DELTA_Z[self.local.z as usize]);
        } else {
            self.bind(self.position);
        }
    }

    /// Neighbours inside the current chunk are read through the delta
    /// tables; the rest fall back to [`PagedVolume::voxel`], which may page
    /// in a chunk.
    fn peek_voxel(&self, dx: i32, dy: i32, dz: i32) -> V {
        debug_assert!(
            (-1..=1).contains(&dx) && (-1..=1).contains(&dy) && (-1..=1).contains(&dz),
            "peek offset ({dx}, {dy}, {dz}) out of range"
        );
        let Some(chunk) = &self.current else {
            return V::empty();
        };
        match self.neighbour_index(dx, dy, dz) {
            Some(index) => chunk.voxel_at_index(index),
            None => self.volume.voxel(self.position + IVec3::new(dx, dy, dz)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingPager;

    const SIDE: u16 = 8;
    const CHUNK_BYTES: usize = 8 * 8 * 8 * 4;

    fn filled_volume(chunks: usize) -> (Arc<RecordingPager>, PagedVolume<u32>) {
        let pager = Arc::new(RecordingPager::filling());
        let volume: PagedVolume<u32> = PagedVolume::new(pager.clone(), chunks * CHUNK_BYTES, SIDE);
        (pager, volume)
    }

    #[test]
    fn test_unbound_sampler_reads_empty() {
        let (_, volume) = filled_volume(64);
        let mut sampler = Sampler::new(&volume);
        assert!(sampler.current_chunk().is_none());
        assert_eq!(sampler.voxel(), 0);
        assert_eq!(sampler.peek_voxel_1px0py0pz(), 0);
        assert!(!sampler.set_voxel(5));
        sampler.move_positive_x();
        assert_eq!(sampler.position(), IVec3::X);
        assert!(sampler.current_chunk().is_none());
        assert_eq!(volume.chunk_count(), 0);
    }

    #[test]
    fn test_set_position_reads_volume() {
        let (_, volume) = filled_volume(64);
        let mut sampler = Sampler::new(&volume);
        for pos in [IVec3::ZERO, IVec3::new(-1, -9, 17), IVec3::new(100, 3, -50)] {
            sampler.set_position(pos);
            assert_eq!(sampler.position(), pos);
            assert_eq!(sampler.voxel(), RecordingPager::pattern(pos));
        }
    }

    #[test]
    fn test_moves_agree_with_direct_reads_across_chunks() {
        let (_, volume) = filled_volume(64);
        let start = IVec3::new(-13, 5, 2);
        let axes: [(IVec3, fn(&mut Sampler<'_, u32>)); 6] = [
            (IVec3::X, |s| s.move_positive_x()),
            (IVec3::Y, |s| s.move_positive_y()),
            (IVec3::Z, |s| s.move_positive_z()),
            (IVec3::NEG_X, |s| s.move_negative_x()),
            (IVec3::NEG_Y, |s| s.move_negative_y()),
            (IVec3::NEG_Z, |s| s.move_negative_z()),
        ];
        for (axis, step) in axes {
            let mut sampler = Sampler::new(&volume);
            sampler.set_position(start);
            for n in 1..=40 {
                step(&mut sampler);
                let expected = start + axis * n;
                assert_eq!(sampler.position(), expected);
                assert_eq!(sampler.voxel(), volume.voxel(expected), "axis {axis} step {n}");
            }
        }
    }

    #[test]
    fn test_peeks_agree_with_direct_reads() {
        let (_, volume) = filled_volume(128);
        let positions = [
            IVec3::new(3, 4, 5),   // interior
            IVec3::new(0, 4, 5),   // face
            IVec3::new(7, 0, 5),   // edge
            IVec3::new(8, 8, 8),   // corner
            IVec3::new(-1, -8, 15),
            IVec3::new(-9, 7, -16),
        ];
        let mut sampler = Sampler::new(&volume);
        for pos in positions {
            sampler.set_position(pos);
            for dz in -1..=1 {
                for dy in -1..=1 {
                    for dx in -1..=1 {
                        let expected = RecordingPager::pattern(pos + IVec3::new(dx, dy, dz));
                        assert_eq!(sampler.peek_voxel(dx, dy, dz), expected, "{pos} + ({dx},{dy},{dz})");
                    }
                }
            }
        }
    }

    #[test]
    fn test_named_peeks_match_offsets() {
        let (_, volume) = filled_volume(64);
        let mut sampler = Sampler::new(&volume);
        let pos = IVec3::new(7, 0, 3);
        sampler.set_position(pos);
        let at = |d: IVec3| RecordingPager::pattern(pos + d);
        assert_eq!(sampler.peek_voxel_1nx1ny1nz(), at(IVec3::new(-1, -1, -1)));
        assert_eq!(sampler.peek_voxel_1px1py1pz(), at(IVec3::new(1, 1, 1)));
        assert_eq!(sampler.peek_voxel_1px0py0pz(), at(IVec3::X));
        assert_eq!(sampler.peek_voxel_0px1ny0pz(), at(IVec3::NEG_Y));
        assert_eq!(sampler.peek_voxel_0px0py1pz(), at(IVec3::Z));
        assert_eq!(sampler.peek_voxel_0px0py0pz(), sampler.voxel());
        assert_eq!(sampler.peek_voxel_1nx1py0pz(), at(IVec3::new(-1, 1, 0)));
    }

    #[test]
    fn test_set_voxel_writes_through_but_not_region() {
        let pager = Arc::new(RecordingPager::new());
        let volume = PagedVolume::<u32>::new(pager, 64 * CHUNK_BYTES, SIDE);
        let mut sampler = Sampler::new(&volume);
        sampler.set_position(IVec3::new(-2, 3, 9));
        assert!(sampler.set_voxel(42));
        assert_eq!(volume.voxel(IVec3::new(-2, 3, 9)), 42);
        assert!(sampler.current_chunk().is_some_and(|c| c.is_modified()));
        assert_eq!(volume.region(), nebula_math::Region::INVALID);
    }

    #[test]
    fn test_previous_chunk_is_reused_across_boundary() {
        let (pager, volume) = filled_volume(64);
        let mut sampler = Sampler::new(&volume);
        sampler.set_position(IVec3::new(7, 0, 0));
        for _ in 0..10 {
            sampler.move_positive_x();
            sampler.move_negative_x();
        }
        assert_eq!(pager.page_in_count(IVec3::ZERO), 1);
        assert_eq!(pager.page_in_count(IVec3::X), 1);
        assert_eq!(sampler.position(), IVec3::new(7, 0, 0));
    }

    #[test]
    fn test_evicted_previous_chunk_is_not_reused() {
        let pager = Arc::new(RecordingPager::new());
        let volume = PagedVolume::<u32>::new(pager.clone(), 32 * CHUNK_BYTES, SIDE);
        let mut sampler = Sampler::new(&volume);
        let pos = IVec3::new(7, 0, 0);
        sampler.set_position(pos);
        sampler.move_positive_x();

        for x in 2..=40 {
            volume.chunk_at(IVec3::new(x, 10, 0));
        }
        assert!(!volume.is_resident(IVec3::ZERO));
        volume.set_voxel(pos, 42);

        sampler.move_negative_x();
        assert_eq!(sampler.voxel(), volume.voxel(pos));
        assert_eq!(sampler.voxel(), 42);
        assert!(sampler.current_chunk().is_some_and(|c| !c.is_evicted()));
        assert_eq!(pager.page_in_count(IVec3::ZERO), 2);
    }

    #[test]
    fn test_sampler_keeps_evicted_chunk_alive() {
        let pager = Arc::new(RecordingPager::new());
        let volume = PagedVolume::<u32>::new(pager.clone(), 32 * CHUNK_BYTES, SIDE);
        let mut sampler = Sampler::new(&volume);
        sampler.set_position(IVec3::new(1, 1, 1));
        sampler.set_voxel(9);

        for x in 1..=40 {
            volume.chunk_at(IVec3::new(x, 10, 0));
        }
        assert!(!volume.is_resident(IVec3::ZERO));
        assert_eq!(pager.total_page_outs(), 0);
        assert_eq!(sampler.voxel(), 9);

        drop(sampler);
        assert_eq!(pager.page_out_count(IVec3::ZERO), 1);
    }
}
