//! The paging contract: where chunk contents come from and where they go.
//!
//! A [`Pager`] is the only way chunk data enters or leaves a
//! [`PagedVolume`](crate::PagedVolume). It can generate data procedurally,
//! decompress it from disk, stream it over the network, or do nothing at all.

use nebula_math::Region;

use crate::chunk::Chunk;
use crate::voxel::VoxelValue;

/// Everything a pager needs to fill a freshly allocated chunk.
pub struct PagerContext<'a, V: VoxelValue> {
    /// Voxel-space region covered by the chunk.
    pub region: Region,
    /// The chunk to populate. All voxels start out empty.
    pub chunk: &'a mut Chunk<V>,
}

/// Supplies and persists chunk contents.
///
/// `page_in` runs while the volume's chunk table is locked, so it must not
/// call back into the same volume. `page_out` runs when the last reference
/// to a modified chunk is dropped.
pub trait Pager<V: VoxelValue>: Send + Sync {
    /// Populates `ctx.chunk`.
    ///
    /// Returns `true` if the data was freshly generated and has never been
    /// persisted, `false` if it was loaded from storage. The result becomes
    /// the chunk's modified flag, which decides whether it is paged out.
    fn page_in(&self, ctx: &mut PagerContext<'_, V>) -> bool;

    /// Persists a modified chunk that is about to be destroyed.
    fn page_out(&self, chunk: &Chunk<V>);
}

/// A pager that leaves chunks empty and never persists anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullPager;

impl<V: VoxelValue> Pager<V> for NullPager {
    fn page_in(&self, _ctx: &mut PagerContext<'_, V>) -> bool {
        false
    }

    fn page_out(&self, _chunk: &Chunk<V>) {}
}
