//! Integer voxel-space geometry for the Nebula volume: inclusive regions and Morton indexing.

pub mod morton;
mod region;

pub use region::{Region, intersects};
