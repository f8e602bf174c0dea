//! An unbounded voxel grid backed by a bounded cache of chunks.
//!
//! [`PagedVolume`] maps chunk coordinates to shared [`Chunk`] handles. Chunks
//! are created on first access, filled by the volume's [`Pager`], and evicted
//! approximately least-recently-used once the table reaches its chunk-count
//! limit. Every table operation (lookup, creation, eviction and timestamp
//! bump) happens under one exclusive lock; chunk contents have their own
//! per-chunk locks so voxel reads and writes never hold the table lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use glam::IVec3;
use nebula_math::Region;
use rustc_hash::FxHashMap;

use crate::chunk::Chunk;
use crate::error::VolumeError;
use crate::listener::{ChunkListener, ChunkListeners, ListenerId};
use crate::pager::{Pager, PagerContext};
use crate::settings::{EvictionPolicy, MIN_PRACTICAL_CHUNKS, VolumeSettings, validate_side_length};
use crate::voxel::VoxelValue;

type ChunkTable<V> = FxHashMap<IVec3, Arc<Chunk<V>>>;

/// A paged, lazily populated voxel volume.
pub struct PagedVolume<V: VoxelValue> {
    pager: Arc<dyn Pager<V>>,
    chunks: Mutex<ChunkTable<V>>,
    chunk_count_limit: usize,
    chunk_side_length: u16,
    chunk_side_length_power: u8,
    chunk_mask: i32,
    eviction: EvictionPolicy,
    /// Monotonic access counter; chunk timestamps are drawn from it.
    timestamper: AtomicU64,
    /// Bounding box of every voxel written through the volume.
    region: RwLock<Region>,
    listeners: ChunkListeners<V>,
}

/// Chunk-table changes made under the lock, published after it is released.
struct TableChanges<V: VoxelValue> {
    created: Vec<Arc<Chunk<V>>>,
    evicted: Vec<Arc<Chunk<V>>>,
}

impl<V: VoxelValue> Default for TableChanges<V> {
    fn default() -> Self {
        Self {
            created: Vec::new(),
            evicted: Vec::new(),
        }
    }
}

/// Exclusive access to a volume's chunk table for a batch of lookups.
///
/// Obtained through [`PagedVolume::with_locked_chunks`]. Listener callbacks
/// and page-outs caused by the batch are deferred until the lock is released.
pub struct ChunkResolver<'a, V: VoxelValue> {
    volume: &'a PagedVolume<V>,
    table: MutexGuard<'a, ChunkTable<V>>,
    changes: TableChanges<V>,
    last: Option<Arc<Chunk<V>>>,
}

impl<V: VoxelValue> ChunkResolver<'_, V> {
    /// Returns the chunk at chunk-space `coord`, paging it in if necessary.
    pub fn resolve(&mut self, coord: IVec3) -> Arc<Chunk<V>> {
        let timestamp = self.volume.next_timestamp();
        if let Some(last) = self.last.as_ref().filter(|last| last.position() == coord) {
            last.touch(timestamp);
            return Arc::clone(last);
        }

        let resident = self.table.get(&coord).cloned();
        let chunk = match resident {
            Some(chunk) => {
                chunk.touch(timestamp);
                chunk
            }
            None => self.create(coord, timestamp),
        };
        self.last = Some(Arc::clone(&chunk));
        chunk
    }

    /// Number of chunks currently in the table.
    pub fn chunk_count(&self) -> usize {
        self.table.len()
    }

    fn create(&mut self, coord: IVec3, timestamp: u64) -> Arc<Chunk<V>> {
        // A chunk evicted earlier in this batch has not been paged out yet;
        // re-inserting it avoids paging in stale data.
        let chunk = if let Some(i) = self.changes.evicted.iter().position(|c| c.position() == coord) {
            let chunk = self.changes.evicted.swap_remove(i);
            chunk.set_evicted(false);
            chunk
        } else {
            let mut chunk = Chunk::new(coord, self.volume.chunk_side_length, Arc::clone(&self.volume.pager));
            let region = chunk.region();
            let generated = self.volume.pager.page_in(&mut PagerContext {
                region,
                chunk: &mut chunk,
            });
            chunk.set_modified(generated);
            tracing::debug!("paged in chunk at {coord} (generated: {generated})");
            let chunk = Arc::new(chunk);
            self.changes.created.push(Arc::clone(&chunk));
            chunk
        };
        chunk.touch(timestamp);
        self.table.insert(coord, Arc::clone(&chunk));

        if self.table.len() >= self.volume.chunk_count_limit {
            self.evict(coord);
        }
        chunk
    }

    /// Removes the least recently accessed chunks according to the eviction policy.
    fn evict(&mut self, newest: IVec3) {
        let count = self
            .volume
            .eviction
            .evictions_for(self.table.len(), self.volume.chunk_count_limit);
        let victims: Vec<IVec3> = if count == 1 {
            self.table
                .iter()
                .filter(|(coord, _)| **coord != newest)
                .min_by_key(|(_, chunk)| chunk.last_accessed())
                .map(|(coord, _)| *coord)
                .into_iter()
                .collect()
        } else {
            let mut ages: Vec<(u64, IVec3)> = self
                .table
                .iter()
                .filter(|(coord, _)| **coord != newest)
                .map(|(coord, chunk)| (chunk.last_accessed(), *coord))
                .collect();
            if count < ages.len() {
                ages.select_nth_unstable_by_key(count, |(age, _)| *age);
                ages.truncate(count);
            }
            ages.into_iter().map(|(_, coord)| coord).collect()
        };

        for coord in victims {
            if let Some(chunk) = self.table.remove(&coord) {
                tracing::debug!("evicting chunk at {coord}");
                chunk.set_evicted(true);
                if self.last.as_ref().is_some_and(|last| last.position() == coord) {
                    self.last = None;
                }
                self.changes.evicted.push(chunk);
            }
        }
    }
}

impl<V: VoxelValue> PagedVolume<V> {
    /// Creates a volume that aims to keep its chunk data under `target_memory_bytes`.
    ///
    /// A budget too small for [`MIN_PRACTICAL_CHUNKS`] chunks is raised to
    /// that many with a warning.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_side_length` is not a power of two in `1..=256`.
    pub fn new(pager: Arc<dyn Pager<V>>, target_memory_bytes: usize, chunk_side_length: u16) -> Self {
        Self::with_settings(
            pager,
            VolumeSettings {
                target_memory_bytes,
                chunk_side_length,
                eviction: EvictionPolicy::default(),
            },
        )
    }

    /// Creates a volume from [`VolumeSettings`], clamping an infeasible budget.
    ///
    /// # Panics
    ///
    /// Panics if the chunk side length is invalid.
    pub fn with_settings(pager: Arc<dyn Pager<V>>, settings: VolumeSettings) -> Self {
        let side = settings.chunk_side_length;
        if let Err(err) = validate_side_length(side) {
            panic!("invalid volume settings: {err}");
        }
        let chunk_bytes = Chunk::<V>::calculate_size_in_bytes(side);
        let mut chunk_count_limit = settings.raw_chunk_limit::<V>();
        if chunk_count_limit < MIN_PRACTICAL_CHUNKS {
            tracing::warn!(
                "Requested memory usage limit of {}MiB is too low and cannot be adhered to",
                settings.target_memory_bytes / (1024 * 1024)
            );
            chunk_count_limit = MIN_PRACTICAL_CHUNKS;
        }
        tracing::info!(
            "Memory usage limit for volume now set to {}MiB ({} chunks of {}KiB)",
            chunk_count_limit * chunk_bytes / (1024 * 1024),
            chunk_count_limit,
            chunk_bytes / 1024
        );

        Self {
            pager,
            chunks: Mutex::new(FxHashMap::default()),
            chunk_count_limit,
            chunk_side_length: side,
            chunk_side_length_power: side.trailing_zeros() as u8,
            chunk_mask: side as i32 - 1,
            eviction: settings.eviction,
            timestamper: AtomicU64::new(0),
            region: RwLock::new(Region::INVALID),
            listeners: ChunkListeners::new(),
        }
    }

    /// Like [`PagedVolume::with_settings`], but returns an error for an
    /// invalid side length instead of panicking. Small budgets are still
    /// clamped with a warning; use [`VolumeSettings::validate`] to reject them.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::InvalidSideLength`] if the side length is not a
    /// power of two in `1..=256`.
    pub fn try_with_settings(
        pager: Arc<dyn Pager<V>>,
        settings: VolumeSettings,
    ) -> Result<Self, VolumeError> {
        validate_side_length(settings.chunk_side_length)?;
        Ok(Self::with_settings(pager, settings))
    }

    // -- Voxel access -------------------------------------------------------

    /// Reads the voxel at `pos`, paging in its chunk if needed.
    pub fn voxel(&self, pos: IVec3) -> V {
        let chunk = self.resolve_chunk(self.chunk_pos(pos));
        let local = self.local_pos(pos);
        chunk.voxel(local.x as u32, local.y as u32, local.z as u32)
    }

    pub fn voxel_xyz(&self, x: i32, y: i32, z: i32) -> V {
        self.voxel(IVec3::new(x, y, z))
    }

    /// Writes the voxel at `pos` and grows the accumulated region.
    pub fn set_voxel(&self, pos: IVec3, value: V) {
        let chunk = self.resolve_chunk(self.chunk_pos(pos));
        let local = self.local_pos(pos);
        chunk.set_voxel(local.x as u32, local.y as u32, local.z as u32, value);
        self.region_write().accumulate(pos);
    }

    pub fn set_voxel_xyz(&self, x: i32, y: i32, z: i32, value: V) {
        self.set_voxel(IVec3::new(x, y, z), value);
    }

    /// Writes one column: `values[i]` goes to `(x, i, z)`.
    pub fn set_voxels(&self, x: i32, z: i32, values: &[V]) {
        self.set_voxels_columns(x, 0, z, 1, 1, values);
    }

    /// Writes the same run of `values` into `nx * nz` columns.
    ///
    /// Column `(x + i, z + k)` receives `values[j]` at height `y + j`. Runs
    /// cross chunk boundaries along y transparently; the whole batch takes
    /// the chunk-table lock once.
    pub fn set_voxels_columns(&self, x: i32, y: i32, z: i32, nx: i32, nz: i32, values: &[V]) {
        if nx <= 0 || nz <= 0 || values.is_empty() {
            return;
        }
        let side = self.chunk_side_length as i32;
        self.with_locked_chunks(|resolver| {
            for k in 0..nz {
                for i in 0..nx {
                    let column = IVec3::new(x + i, y, z + k);
                    let mut written = 0usize;
                    while written < values.len() {
                        let pos = column + IVec3::Y * written as i32;
                        let chunk = resolver.resolve(self.chunk_pos(pos));
                        let local = self.local_pos(pos);
                        let run = (values.len() - written).min((side - local.y) as usize);
                        chunk.set_voxels(
                            local.x as u32,
                            local.y as u32,
                            local.z as u32,
                            &values[written..written + run],
                        );
                        written += run;
                    }
                }
            }
        });
        let written = Region::new(
            IVec3::new(x, y, z),
            IVec3::new(x + nx - 1, y + values.len() as i32 - 1, z + nz - 1),
        );
        self.region_write().accumulate_region(&written);
    }

    // -- Chunk access -------------------------------------------------------

    /// Returns the chunk containing voxel `pos`, paging it in if needed.
    pub fn chunk(&self, pos: IVec3) -> Arc<Chunk<V>> {
        self.resolve_chunk(self.chunk_pos(pos))
    }

    /// Returns the chunk at chunk-space `coord`, paging it in if needed.
    pub fn chunk_at(&self, coord: IVec3) -> Arc<Chunk<V>> {
        self.resolve_chunk(coord)
    }

    /// Chunk-space coordinate of voxel `pos` (floor division via arithmetic shift).
    pub fn chunk_pos(&self, pos: IVec3) -> IVec3 {
        pos >> self.chunk_side_length_power as i32
    }

    pub fn chunk_side_length(&self) -> u16 {
        self.chunk_side_length
    }

    pub fn chunk_side_length_power(&self) -> u8 {
        self.chunk_side_length_power
    }

    /// Number of resident chunks.
    pub fn chunk_count(&self) -> usize {
        self.table().len()
    }

    /// Table size at which eviction kicks in.
    pub fn chunk_count_limit(&self) -> usize {
        self.chunk_count_limit
    }

    pub fn eviction_policy(&self) -> EvictionPolicy {
        self.eviction
    }

    /// Returns `true` if the chunk at `coord` is in the table. Does not count as an access.
    pub fn is_resident(&self, coord: IVec3) -> bool {
        self.table().contains_key(&coord)
    }

    /// Pages in every chunk overlapping `region` in one locked batch.
    ///
    /// At most `chunk_count_limit - 1` chunks are fetched; asking for more
    /// would evict the prefetched chunks again. Returns the number resolved.
    pub fn prefetch(&self, region: &Region) -> usize {
        if !region.is_valid() {
            return 0;
        }
        let lower = self.chunk_pos(region.lower());
        let upper = self.chunk_pos(region.upper());
        let dims = upper.as_i64vec3() - lower.as_i64vec3() + 1;
        let wanted = (dims.x as u128 * dims.y as u128 * dims.z as u128).min(usize::MAX as u128) as usize;
        let budget = self.chunk_count_limit - 1;
        if wanted > budget {
            tracing::warn!(
                "Attempting to prefetch {wanted} chunks, more than the limit of {budget} (this would cause thrashing)"
            );
        }

        self.with_locked_chunks(|resolver| {
            let mut fetched = 0;
            for z in lower.z..=upper.z {
                for y in lower.y..=upper.y {
                    for x in lower.x..=upper.x {
                        if fetched == budget {
                            return fetched;
                        }
                        resolver.resolve(IVec3::new(x, y, z));
                        fetched += 1;
                    }
                }
            }
            fetched
        })
    }

    /// Drops every resident chunk, paging out the modified ones.
    ///
    /// Chunks still held elsewhere (by a sampler, say) page out when the
    /// last holder releases them.
    pub fn flush_all(&self) {
        let evicted: Vec<Arc<Chunk<V>>> = self
            .table()
            .drain()
            .map(|(_, chunk)| {
                chunk.set_evicted(true);
                chunk
            })
            .collect();
        if !evicted.is_empty() {
            tracing::debug!("flushing {} chunks", evicted.len());
        }
        self.publish(TableChanges {
            created: Vec::new(),
            evicted,
        });
    }

    /// Memory used by resident chunk data.
    pub fn calculate_size_in_bytes(&self) -> usize {
        self.chunk_count() * Chunk::<V>::calculate_size_in_bytes(self.chunk_side_length)
    }

    /// Bounding box of every voxel written through the volume.
    ///
    /// [`Region::INVALID`] until the first write. Writes made through a
    /// [`Sampler`](crate::Sampler) are not included.
    pub fn region(&self) -> Region {
        *self.region.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_chunk_listener(&self, listener: Arc<dyn ChunkListener<V>>) -> ListenerId {
        self.listeners.add(listener)
    }

    /// Returns `false` if `id` was not registered.
    pub fn remove_chunk_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Runs `f` with the chunk table locked, for batches of chunk lookups.
    ///
    /// `f` must not call back into this volume; the lock is not re-entrant.
    pub fn with_locked_chunks<R>(&self, f: impl FnOnce(&mut ChunkResolver<'_, V>) -> R) -> R {
        let mut resolver = ChunkResolver {
            volume: self,
            table: self.table(),
            changes: TableChanges::default(),
            last: None,
        };
        let result = f(&mut resolver);
        let ChunkResolver { table, changes, last, .. } = resolver;
        drop(last);
        drop(table);
        self.publish(changes);
        result
    }

    pub(crate) fn resolve_chunk(&self, coord: IVec3) -> Arc<Chunk<V>> {
        self.with_locked_chunks(|resolver| resolver.resolve(coord))
    }

    pub(crate) fn local_pos(&self, pos: IVec3) -> IVec3 {
        pos & self.chunk_mask
    }

    /// Marks `chunk` as just accessed without going through the table.
    pub(crate) fn touch(&self, chunk: &Chunk<V>) {
        chunk.touch(self.next_timestamp());
    }

    fn next_timestamp(&self) -> u64 {
        self.timestamper.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Notifies listeners, then releases evicted chunks (which may page them out).
    fn publish(&self, changes: TableChanges<V>) {
        let TableChanges { created, evicted } = changes;
        self.listeners.notify_created(&created);
        self.listeners.notify_evicted(&evicted);
        drop(evicted);
    }

    fn table(&self) -> MutexGuard<'_, ChunkTable<V>> {
        self.chunks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn region_write(&self) -> std::sync::RwLockWriteGuard<'_, Region> {
        self.region.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V: VoxelValue> Drop for PagedVolume<V> {
    fn drop(&mut self) {
        self.flush_all();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
