//! Paged voxel volumes: Morton-ordered chunks created on demand by a [`Pager`],
//! cached under a memory budget, and read through cursor-style samplers.

mod buffered_sampler;
mod chunk;
mod error;
mod listener;
mod paged_volume;
mod pager;
mod sampler;
mod settings;
mod voxel;

#[cfg(test)]
mod test_support;

pub use buffered_sampler::BufferedSampler;
pub use chunk::Chunk;
pub use error::VolumeError;
pub use listener::{ChunkListener, ListenerId};
pub use paged_volume::{ChunkResolver, PagedVolume};
pub use pager::{NullPager, Pager, PagerContext};
pub use sampler::{Sampler, VoxelSampler};
pub use settings::{
    DEFAULT_CHUNK_SIDE_LENGTH, DEFAULT_TARGET_MEMORY_BYTES, EvictionPolicy, MAX_CHUNK_SIDE_LENGTH,
    MIN_PRACTICAL_CHUNKS, VolumeSettings, validate_side_length,
};
pub use voxel::{Voxel, VoxelType, VoxelValue};
