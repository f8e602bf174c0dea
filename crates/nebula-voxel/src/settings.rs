//! Memory budget and eviction configuration for a [`PagedVolume`](crate::PagedVolume).

use serde::{Deserialize, Serialize};

use crate::chunk::Chunk;
use crate::error::VolumeError;
use crate::voxel::VoxelValue;

/// Default memory budget: 256 MiB.
pub const DEFAULT_TARGET_MEMORY_BYTES: usize = 256 * 1024 * 1024;

/// Default chunk side length in voxels.
pub const DEFAULT_CHUNK_SIDE_LENGTH: u16 = 32;

/// Largest supported chunk side length (the Morton tables cover 0..256).
pub const MAX_CHUNK_SIDE_LENGTH: u16 = 256;

/// Lower bound for the chunk-count limit: a chunk, its 26 neighbours and a few spare.
pub const MIN_PRACTICAL_CHUNKS: usize = 32;

/// How many chunks are evicted once the table reaches its limit.
///
/// Eviction runs once per growth event (a chunk was created and the table
/// is at or above its limit). Each pass scans the whole table, so the
/// policy trades scan cost against how closely it follows true LRU.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvictionPolicy {
    /// Evict the single least recently accessed chunk.
    #[default]
    OneOldest,
    /// Evict the `n` least recently accessed chunks in one scan.
    Batch(u32),
    /// Evict until the table is strictly below its limit again.
    UntilUnderLimit,
}

impl EvictionPolicy {
    /// Number of chunks to evict from a table holding `resident` chunks
    /// with the given chunk-count `limit`.
    ///
    /// Never evicts the last chunk, which is the one just created.
    pub fn evictions_for(self, resident: usize, limit: usize) -> usize {
        let wanted = match self {
            EvictionPolicy::OneOldest => 1,
            EvictionPolicy::Batch(n) => n.max(1) as usize,
            EvictionPolicy::UntilUnderLimit => (resident + 1).saturating_sub(limit).max(1),
        };
        wanted.min(resident.saturating_sub(1))
    }
}

/// Construction parameters for a [`PagedVolume`](crate::PagedVolume).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeSettings {
    /// Upper limit the volume aims to keep its chunk data under.
    pub target_memory_bytes: usize,
    /// Side length of every chunk; a power of two no larger than 256.
    pub chunk_side_length: u16,
    pub eviction: EvictionPolicy,
}

impl Default for VolumeSettings {
    fn default() -> Self {
        Self {
            target_memory_bytes: DEFAULT_TARGET_MEMORY_BYTES,
            chunk_side_length: DEFAULT_CHUNK_SIDE_LENGTH,
            eviction: EvictionPolicy::default(),
        }
    }
}

impl VolumeSettings {
    /// Chunk-count limit the budget converts to, before clamping.
    pub fn raw_chunk_limit<V: VoxelValue>(&self) -> usize {
        self.target_memory_bytes / Chunk::<V>::calculate_size_in_bytes(self.chunk_side_length)
    }

    /// Checks the side length and that the budget reaches [`MIN_PRACTICAL_CHUNKS`].
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::InvalidSideLength`] or [`VolumeError::BudgetTooSmall`].
    pub fn validate<V: VoxelValue>(&self) -> Result<(), VolumeError> {
        validate_side_length(self.chunk_side_length)?;
        let chunks = self.raw_chunk_limit::<V>();
        if chunks < MIN_PRACTICAL_CHUNKS {
            return Err(VolumeError::BudgetTooSmall {
                budget: self.target_memory_bytes,
                chunk_bytes: Chunk::<V>::calculate_size_in_bytes(self.chunk_side_length),
                chunks,
                minimum: MIN_PRACTICAL_CHUNKS,
            });
        }
        Ok(())
    }
}

/// Checks that `side_length` is a non-zero power of two no larger than 256.
///
/// # Errors
///
/// Returns [`VolumeError::InvalidSideLength`] otherwise.
pub fn validate_side_length(side_length: u16) -> Result<(), VolumeError> {
    if side_length == 0 || side_length > MAX_CHUNK_SIDE_LENGTH || !side_length.is_power_of_two()
    {
        return Err(VolumeError::InvalidSideLength(side_length as u32));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = VolumeSettings::default();
        assert!(settings.validate::<u32>().is_ok());
        assert_eq!(settings.raw_chunk_limit::<u32>(), 2048);
    }

    #[test]
    fn test_side_length_validation() {
        for ok in [1u16, 2, 16, 32, 128, 256] {
            assert!(validate_side_length(ok).is_ok(), "{ok} should be accepted");
        }
        for bad in [0u16, 3, 48, 100, 512] {
            assert_eq!(
                validate_side_length(bad),
                Err(VolumeError::InvalidSideLength(bad as u32))
            );
        }
    }

    #[test]
    fn test_budget_too_small_is_reported() {
        let settings = VolumeSettings {
            target_memory_bytes: 1024 * 1024,
            chunk_side_length: 32,
            eviction: EvictionPolicy::OneOldest,
        };
        // 32³ × 4 bytes = 128 KiB per chunk, so 1 MiB holds 8.
        let err = settings.validate::<u32>().unwrap_err();
        assert_eq!(
            err,
            VolumeError::BudgetTooSmall {
                budget: 1024 * 1024,
                chunk_bytes: 128 * 1024,
                chunks: 8,
                minimum: MIN_PRACTICAL_CHUNKS,
            }
        );
    }

    #[test]
    fn test_eviction_counts() {
        assert_eq!(EvictionPolicy::OneOldest.evictions_for(40, 32), 1);
        assert_eq!(EvictionPolicy::Batch(4).evictions_for(40, 32), 4);
        assert_eq!(EvictionPolicy::Batch(0).evictions_for(40, 32), 1);
        assert_eq!(EvictionPolicy::UntilUnderLimit.evictions_for(32, 32), 1);
        assert_eq!(EvictionPolicy::UntilUnderLimit.evictions_for(40, 32), 9);
        // The newest chunk always survives.
        assert_eq!(EvictionPolicy::Batch(10).evictions_for(3, 2), 2);
        assert_eq!(EvictionPolicy::OneOldest.evictions_for(1, 1), 0);
    }

    #[test]
    fn test_settings_deserialize_with_defaults() {
        let json = r#"{"chunk_side_length":16}"#;
        let settings: VolumeSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.chunk_side_length, 16);
        assert_eq!(settings.target_memory_bytes, DEFAULT_TARGET_MEMORY_BYTES);
        assert_eq!(settings.eviction, EvictionPolicy::OneOldest);
    }
}
