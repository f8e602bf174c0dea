//! Dense, Morton-ordered voxel storage for one cubic chunk of a paged volume.
//!
//! A chunk stores `side³` voxels in Z-order so that neighbouring voxels are
//! neighbours in memory. Chunks are shared between the volume's chunk table
//! and any sampler bound to them; the last holder to drop a modified chunk
//! hands it to the [`Pager`] for persistence.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use glam::IVec3;
use nebula_math::{Region, morton};

use crate::pager::Pager;
use crate::settings::validate_side_length;
use crate::voxel::VoxelValue;

/// One cube of voxels, the unit of paging and eviction.
pub struct Chunk<V: VoxelValue> {
    /// Position in chunk space (voxel position divided by the side length).
    position: IVec3,
    side_length: u16,
    side_length_power: u8,
    /// `side³` voxels in Morton order.
    data: RwLock<Box<[V]>>,
    /// Set on every write; decides whether the chunk is paged out on drop.
    modified: AtomicBool,
    /// Timestamp of the most recent access, maintained by the volume.
    last_accessed: AtomicU64,
    /// Set once the volume drops the chunk from its table.
    evicted: AtomicBool,
    pager: Arc<dyn Pager<V>>,
}

impl<V: VoxelValue> Chunk<V> {
    /// Allocates an empty chunk at chunk-space `position`.
    ///
    /// # Panics
    ///
    /// Panics if `side_length` is not a non-zero power of two no larger than 256.
    pub fn new(position: IVec3, side_length: u16, pager: Arc<dyn Pager<V>>) -> Self {
        if let Err(err) = validate_side_length(side_length) {
            panic!("cannot create chunk at {position}: {err}");
        }
        let voxel_count = side_length as usize * side_length as usize * side_length as usize;
        Self {
            position,
            side_length,
            side_length_power: side_length.trailing_zeros() as u8,
            data: RwLock::new(vec![V::empty(); voxel_count].into_boxed_slice()),
            modified: AtomicBool::new(false),
            last_accessed: AtomicU64::new(0),
            evicted: AtomicBool::new(false),
            pager,
        }
    }

    /// Size of the voxel data of a chunk with the given side length.
    ///
    /// Other fields are ignored; they are tiny next to the voxel array.
    pub fn calculate_size_in_bytes(side_length: u16) -> usize {
        let side = side_length as usize;
        side * side * side * std::mem::size_of::<V>()
    }

    /// Position in chunk space.
    pub fn position(&self) -> IVec3 {
        self.position
    }

    pub fn side_length(&self) -> u16 {
        self.side_length
    }

    /// `log2(side_length)`.
    pub fn side_length_power(&self) -> u8 {
        self.side_length_power
    }

    /// Voxel-space region covered by this chunk.
    pub fn region(&self) -> Region {
        let mins = self.position << self.side_length_power as i32;
        Region::new(mins, mins + IVec3::splat(self.side_length as i32 - 1))
    }

    /// Number of voxels (`side³`).
    pub fn voxel_count(&self) -> usize {
        self.read().len()
    }

    pub fn data_size_in_bytes(&self) -> usize {
        Self::calculate_size_in_bytes(self.side_length)
    }

    /// Read access to the raw voxels in Morton order.
    pub fn data(&self) -> RwLockReadGuard<'_, Box<[V]>> {
        self.read()
    }

    /// Exclusive access to the raw voxels, used while paging in.
    pub fn data_mut(&mut self) -> &mut [V] {
        self.data.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the raw voxel bytes in Morton order, for persistence.
    pub fn data_bytes(&self) -> Vec<u8> {
        bytemuck::cast_slice::<V, u8>(&self.read()).to_vec()
    }

    /// Replaces the whole voxel array (Morton order) and marks the chunk modified.
    ///
    /// Returns `false` and leaves the chunk untouched if `voxels` has the wrong length.
    pub fn set_data(&self, voxels: &[V]) -> bool {
        let mut data = self.write();
        if voxels.len() != data.len() {
            tracing::warn!(
                "Chunk::set_data size mismatch at {}: got {}, expected {}",
                self.position,
                voxels.len(),
                data.len()
            );
            return false;
        }
        data.copy_from_slice(voxels);
        self.modified.store(true, Ordering::Release);
        true
    }

    /// Replaces the voxel array from raw bytes as produced by [`Chunk::data_bytes`].
    ///
    /// Returns `false` if `bytes` has the wrong length.
    pub fn set_data_bytes(&self, bytes: &[u8]) -> bool {
        let mut data = self.write();
        let target: &mut [u8] = bytemuck::cast_slice_mut(&mut data[..]);
        if bytes.len() != target.len() {
            return false;
        }
        target.copy_from_slice(bytes);
        self.modified.store(true, Ordering::Release);
        true
    }

    /// Reads the voxel at a local position.
    ///
    /// # Panics
    ///
    /// Panics if any coordinate is outside `[0, side_length)`.
    pub fn voxel(&self, x: u32, y: u32, z: u32) -> V {
        self.read()[self.index_of(x, y, z)]
    }

    /// Writes the voxel at a local position and marks the chunk modified.
    ///
    /// # Panics
    ///
    /// Panics if any coordinate is outside `[0, side_length)`.
    pub fn set_voxel(&self, x: u32, y: u32, z: u32, value: V) {
        let index = self.index_of(x, y, z);
        self.write()[index] = value;
        self.modified.store(true, Ordering::Release);
    }

    /// Writes a contiguous run along +y starting at `(x, y, z)`.
    ///
    /// # Panics
    ///
    /// Panics if the run does not fit between `y` and the end of the chunk.
    pub fn set_voxels(&self, x: u32, y: u32, z: u32, values: &[V]) {
        let side = self.side_length as u32;
        assert!(x < side && y < side && z < side, "({x}, {y}, {z}) is outside the chunk");
        assert!(
            values.len() <= (side - y) as usize,
            "run of {} voxels from y={y} exceeds chunk side length {side}",
            values.len()
        );
        let column = morton::MORTON_X[x as usize] | morton::MORTON_Z[z as usize];
        let mut data = self.write();
        for (i, value) in values.iter().enumerate() {
            data[(column | morton::MORTON_Y[y as usize + i]) as usize] = *value;
        }
        self.modified.store(true, Ordering::Release);
    }

    /// Reads by Morton index.
    pub fn voxel_at_index(&self, index: u32) -> V {
        self.read()[index as usize]
    }

    /// Writes by Morton index and marks the chunk modified.
    pub fn set_voxel_at_index(&self, index: u32, value: V) {
        self.write()[index as usize] = value;
        self.modified.store(true, Ordering::Release);
    }

    /// `true` if the contents differ from what the pager has persisted.
    pub fn is_modified(&self) -> bool {
        self.modified.load(Ordering::Acquire)
    }

    pub fn set_modified(&self, modified: bool) {
        self.modified.store(modified, Ordering::Release);
    }

    /// Volume timestamp of the most recent access.
    pub fn last_accessed(&self) -> u64 {
        self.last_accessed.load(Ordering::Relaxed)
    }

    pub(crate) fn touch(&self, timestamp: u64) {
        self.last_accessed.store(timestamp, Ordering::Relaxed);
    }

    /// Returns `true` once the chunk is no longer in its volume's chunk table.
    ///
    /// Writes to an evicted chunk still reach the pager when it is dropped,
    /// but the volume may already hand out a fresh copy for the same position.
    pub fn is_evicted(&self) -> bool {
        self.evicted.load(Ordering::Acquire)
    }

    pub(crate) fn set_evicted(&self, evicted: bool) {
        self.evicted.store(evicted, Ordering::Release);
    }

    fn index_of(&self, x: u32, y: u32, z: u32) -> usize {
        let side = self.side_length as u32;
        assert!(
            x < side && y < side && z < side,
            "({x}, {y}, {z}) is outside the chunk (side length {side})"
        );
        morton::encode(x, y, z) as usize
    }

    fn read(&self) -> RwLockReadGuard<'_, Box<[V]>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Box<[V]>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V: VoxelValue> Drop for Chunk<V> {
    fn drop(&mut self) {
        if self.is_modified() {
            tracing::debug!("paging out chunk at {}", self.position);
            self.pager.page_out(self);
        }
    }
}

impl<V: VoxelValue> fmt::Debug for Chunk<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("position", &self.position)
            .field("side_length", &self.side_length)
            .field("modified", &self.is_modified())
            .field("last_accessed", &self.last_accessed())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pager::NullPager;
    use crate::test_support::RecordingPager;

    fn chunk(side: u16) -> Chunk<u32> {
        Chunk::new(IVec3::ZERO, side, Arc::new(NullPager))
    }

    #[test]
    fn test_new_chunk_is_empty_and_clean() {
        let c = chunk(16);
        assert_eq!(c.voxel_count(), 16 * 16 * 16);
        assert!(c.data().iter().all(|&v| v == 0));
        assert!(!c.is_modified());
    }

    #[test]
    fn test_set_then_get_every_voxel() {
        let c = chunk(8);
        for z in 0..8 {
            for y in 0..8 {
                for x in 0..8 {
                    c.set_voxel(x, y, z, x + y * 8 + z * 64);
                }
            }
        }
        for z in 0..8 {
            for y in 0..8 {
                for x in 0..8 {
                    assert_eq!(c.voxel(x, y, z), x + y * 8 + z * 64);
                }
            }
        }
        assert!(c.is_modified());
    }

    #[test]
    fn test_storage_is_morton_ordered() {
        let c = chunk(4);
        c.set_voxel(1, 0, 0, 10);
        c.set_voxel(0, 1, 0, 20);
        c.set_voxel(0, 0, 1, 30);
        c.set_voxel(1, 1, 1, 40);
        let data = c.data();
        assert_eq!(data[1], 10);
        assert_eq!(data[2], 20);
        assert_eq!(data[4], 30);
        assert_eq!(data[7], 40);
    }

    #[test]
    #[should_panic(expected = "outside the chunk")]
    fn test_out_of_range_local_coordinate_panics() {
        chunk(8).voxel(8, 0, 0);
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn test_invalid_side_length_panics() {
        chunk(24);
    }

    #[test]
    fn test_set_voxels_writes_run_along_y() {
        let c = chunk(8);
        c.set_voxels(2, 3, 4, &[1, 2, 3, 4, 5]);
        assert_eq!(c.voxel(2, 2, 4), 0);
        for i in 0..5 {
            assert_eq!(c.voxel(2, 3 + i, 4), i + 1);
        }
        assert!(c.is_modified());
    }

    #[test]
    #[should_panic(expected = "exceeds chunk side length")]
    fn test_set_voxels_overflowing_run_panics() {
        chunk(8).set_voxels(0, 5, 0, &[1, 2, 3, 4]);
    }

    #[test]
    fn test_set_data_rejects_size_mismatch() {
        let c = chunk(2);
        assert!(!c.set_data(&[1, 2, 3]));
        assert!(!c.is_modified());
        assert!(c.set_data(&[1, 2, 3, 4, 5, 6, 7, 8]));
        assert_eq!(c.voxel(1, 1, 1), 8);
    }

    #[test]
    fn test_data_bytes_round_trip() {
        let a = chunk(4);
        a.set_voxel(3, 2, 1, 0xdead_beef);
        let bytes = a.data_bytes();
        assert_eq!(bytes.len(), a.data_size_in_bytes());

        let b = chunk(4);
        assert!(b.set_data_bytes(&bytes));
        assert_eq!(b.voxel(3, 2, 1), 0xdead_beef);
        assert!(!b.set_data_bytes(&bytes[1..]));
    }

    #[test]
    fn test_size_in_bytes() {
        assert_eq!(Chunk::<u32>::calculate_size_in_bytes(32), 32 * 32 * 32 * 4);
        assert_eq!(Chunk::<u8>::calculate_size_in_bytes(256), 256 * 256 * 256);
    }

    #[test]
    fn test_region_for_negative_position() {
        let c: Chunk<u32> = Chunk::new(IVec3::new(-1, 0, 2), 16, Arc::new(NullPager));
        assert_eq!(c.region(), Region::from_coords(-16, 0, 32, -1, 15, 47));
    }

    #[test]
    fn test_drop_pages_out_only_when_modified() {
        let pager = Arc::new(RecordingPager::new());
        {
            let clean: Chunk<u32> = Chunk::new(IVec3::ZERO, 4, pager.clone());
            let dirty: Chunk<u32> = Chunk::new(IVec3::X, 4, pager.clone());
            dirty.set_voxel(0, 0, 0, 1);
            drop(clean);
            drop(dirty);
        }
        assert_eq!(pager.page_out_count(IVec3::ZERO), 0);
        assert_eq!(pager.page_out_count(IVec3::X), 1);
    }
}
