//! Volume configuration errors.

use thiserror::Error;

/// Errors reported when validating [`VolumeSettings`](crate::VolumeSettings).
///
/// The infallible constructors of [`PagedVolume`](crate::PagedVolume) never
/// return these: they assert on invalid side lengths and clamp small budgets.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VolumeError {
    /// Side length is zero, not a power of two, or above 256.
    #[error("chunk side length {0} must be a non-zero power of two no larger than 256")]
    InvalidSideLength(u32),

    /// The memory budget cannot hold the practical minimum number of chunks.
    #[error(
        "memory budget of {budget} bytes holds only {chunks} chunks of {chunk_bytes} bytes \
         (minimum is {minimum})"
    )]
    BudgetTooSmall {
        budget: usize,
        chunk_bytes: usize,
        chunks: usize,
        minimum: usize,
    },
}
