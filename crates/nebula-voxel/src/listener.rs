//! Chunk lifecycle notifications.
//!
//! Listeners are told when a chunk becomes resident and when it is evicted.
//! Callbacks always run after the volume has released its chunk table, so a
//! listener may read from the volume it is registered with.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::chunk::Chunk;
use crate::voxel::VoxelValue;

/// Receives chunk lifecycle events from a [`PagedVolume`](crate::PagedVolume).
pub trait ChunkListener<V: VoxelValue>: Send + Sync {
    /// A chunk was allocated and paged in.
    fn chunk_created(&self, _chunk: &Chunk<V>) {}

    /// A chunk was dropped from the chunk table, by eviction or `flush_all`.
    ///
    /// The chunk is still alive during the call; it is paged out afterwards
    /// once the last reference goes away.
    fn chunk_evicted(&self, _chunk: &Chunk<V>) {}
}

/// Handle returned by [`PagedVolume::add_chunk_listener`](crate::PagedVolume::add_chunk_listener).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Registered listeners, in registration order.
pub(crate) struct ChunkListeners<V: VoxelValue> {
    next_id: AtomicU64,
    entries: Mutex<Vec<(ListenerId, Arc<dyn ChunkListener<V>>)>>,
}

impl<V: VoxelValue> ChunkListeners<V> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            entries: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn add(&self, listener: Arc<dyn ChunkListener<V>>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, listener));
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Clones the current listener list so callbacks can run without holding the lock.
    pub(crate) fn snapshot(&self) -> Vec<Arc<dyn ChunkListener<V>>> {
        self.lock().iter().map(|(_, l)| Arc::clone(l)).collect()
    }

    pub(crate) fn notify_created(&self, chunks: &[Arc<Chunk<V>>]) {
        if chunks.is_empty() {
            return;
        }
        for listener in self.snapshot() {
            for chunk in chunks {
                listener.chunk_created(chunk);
            }
        }
    }

    pub(crate) fn notify_evicted(&self, chunks: &[Arc<Chunk<V>>]) {
        if chunks.is_empty() {
            return;
        }
        for listener in self.snapshot() {
            for chunk in chunks {
                listener.chunk_evicted(chunk);
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(ListenerId, Arc<dyn ChunkListener<V>>)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
