//! A detached, row-major snapshot of a region for lock-free bulk reads.

use glam::IVec3;
use nebula_math::{Region, morton};

use crate::paged_volume::PagedVolume;
use crate::sampler::VoxelSampler;
use crate::voxel::VoxelValue;

/// Copy of a region of a [`PagedVolume`], padded by one voxel on every side
/// so that every neighbour of the requested region can be peeked.
///
/// Construction locks the chunk table once and copies every overlapping
/// chunk. After that the sampler never touches the volume again: reads are
/// plain index arithmetic and writes only change the local copy. Positions
/// outside the padded region read as the empty voxel.
#[derive(Clone, Debug)]
pub struct BufferedSampler<V: VoxelValue> {
    buffer: Vec<V>,
    region: Region,
    width: isize,
    z_stride: isize,
    position: IVec3,
    /// Buffer index of `position`; meaningful only while it is inside `region`.
    index: isize,
}

impl<V: VoxelValue> BufferedSampler<V> {
    /// Snapshots `region` plus one voxel of padding.
    ///
    /// The cursor starts at the lower corner of the requested region.
    pub fn new(volume: &PagedVolume<V>, region: &Region) -> Self {
        if !region.is_valid() {
            return Self {
                buffer: Vec::new(),
                region: Region::INVALID,
                width: 0,
                z_stride: 0,
                position: IVec3::ZERO,
                index: 0,
            };
        }

        let mut padded = *region;
        padded.grow(1);
        let mut buffer = vec![V::empty(); padded.voxels()];
        let width = padded.width_in_voxels() as usize;
        let z_stride = padded.stride();

        let lower = volume.chunk_pos(padded.lower());
        let upper = volume.chunk_pos(padded.upper());
        volume.with_locked_chunks(|resolver| {
            for cz in lower.z..=upper.z {
                for cy in lower.y..=upper.y {
                    for cx in lower.x..=upper.x {
                        let chunk = resolver.resolve(IVec3::new(cx, cy, cz));
                        let mut overlap = chunk.region();
                        overlap.crop_to(&padded);
                        let chunk_mins = chunk.region().lower();
                        let data = chunk.data();

                        for z in overlap.lower_z()..=overlap.upper_z() {
                            let lz = morton::MORTON_Z[(z - chunk_mins.z) as usize];
                            for y in overlap.lower_y()..=overlap.upper_y() {
                                let lyz = lz | morton::MORTON_Y[(y - chunk_mins.y) as usize];
                                let row = padded.index(IVec3::new(overlap.lower_x(), y, z));
                                for (i, x) in (overlap.lower_x()..=overlap.upper_x()).enumerate() {
                                    let index = lyz | morton::MORTON_X[(x - chunk_mins.x) as usize];
                                    buffer[row + i] = data[index as usize];
                                }
                            }
                        }
                    }
                }
            }
        });
        debug_assert_eq!(buffer.len(), z_stride * padded.depth_in_voxels() as usize);

        let mut sampler = Self {
            buffer,
            region: padded,
            width: width as isize,
            z_stride: z_stride as isize,
            position: IVec3::ZERO,
            index: 0,
        };
        sampler.set_position(region.lower());
        sampler
    }

    /// The padded region held in the buffer.
    pub fn region(&self) -> Region {
        self.region
    }

    /// The buffer in row-major order (`z * z_stride + y * width + x`).
    pub fn data(&self) -> &[V] {
        &self.buffer
    }

    /// Reads an absolute position. Empty outside the padded region.
    pub fn voxel_at(&self, pos: IVec3) -> V {
        if self.region.contains_point(pos) {
            self.buffer[self.region.index(pos)]
        } else {
            V::empty()
        }
    }

    fn offset(&self, dx: i32, dy: i32, dz: i32) -> isize {
        dz as isize * self.z_stride + dy as isize * self.width + dx as isize
    }
}

impl<V: VoxelValue> VoxelSampler<V> for BufferedSampler<V> {
    fn position(&self) -> IVec3 {
        self.position
    }

    fn voxel(&self) -> V {
        if self.region.contains_point(self.position) {
            self.buffer[self.index as usize]
        } else {
            V::empty()
        }
    }

    fn set_position(&mut self, pos: IVec3) {
        self.position = pos;
        let rel = pos - self.region.lower();
        self.index = self.offset(rel.x, rel.y, rel.z);
    }

    /// Changes the local copy only; the volume is never written.
    fn set_voxel(&mut self, value: V) -> bool {
        if !self.region.contains_point(self.position) {
            return false;
        }
        self.buffer[self.index as usize] = value;
        true
    }

    fn move_positive_x(&mut self) {
        self.position.x += 1;
        self.index += 1;
    }

    fn move_positive_y(&mut self) {
        self.position.y += 1;
        self.index += self.width;
    }

    fn move_positive_z(&mut self) {
        self.position.z += 1;
        self.index += self.z_stride;
    }

    fn move_negative_x(&mut self) {
        self.position.x -= 1;
        self.index -= 1;
    }

    fn move_negative_y(&mut self) {
        self.position.y -= 1;
        self.index -= self.width;
    }

    fn move_negative_z(&mut self) {
        self.position.z -= 1;
        self.index -= self.z_stride;
    }

    fn peek_voxel(&self, dx: i32, dy: i32, dz: i32) -> V {
        debug_assert!(
            (-1..=1).contains(&dx) && (-1..=1).contains(&dy) && (-1..=1).contains(&dz),
            "peek offset ({dx}, {dy}, {dz}) out of range"
        );
        if self.region.contains_point(self.position + IVec3::new(dx, dy, dz)) {
            self.buffer[(self.index + self.offset(dx, dy, dz)) as usize]
        } else {
            V::empty()
        }
    }
}
