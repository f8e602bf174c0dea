//! Voxel value types stored in paged chunks.
//!
//! The volume is generic over any plain-old-data value. Air is always the
//! all-zero bit pattern so that freshly allocated chunk memory represents
//! empty space.

use std::fmt;

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// A value that can live in a [`PagedVolume`](crate::PagedVolume).
///
/// Implemented for every `Pod` type, so plain integers work out of the box.
/// The empty value is the all-zero bit pattern.
pub trait VoxelValue: Pod + PartialEq + fmt::Debug + Send + Sync {
    /// The value of a voxel nobody has written yet.
    fn empty() -> Self {
        Self::zeroed()
    }
}

impl<T> VoxelValue for T where T: Pod + PartialEq + fmt::Debug + Send + Sync {}

/// Material stored in a [`Voxel`] (1 byte).
#[repr(transparent)]
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize,
)]
pub struct VoxelType(pub u8);

impl VoxelType {
    pub const AIR: VoxelType = VoxelType(0);
    pub const WATER: VoxelType = VoxelType(1);
    pub const GENERIC: VoxelType = VoxelType(2);
    pub const GRASS: VoxelType = VoxelType(3);
    pub const DIRT: VoxelType = VoxelType(4);
    pub const ROCK: VoxelType = VoxelType(5);
    pub const SAND: VoxelType = VoxelType(6);

    /// Returns `true` for empty space.
    pub fn is_air(self) -> bool {
        self == Self::AIR
    }

    /// Returns `true` if the material blocks movement (not air, not water).
    pub fn is_solid(self) -> bool {
        !self.is_air() && self != Self::WATER
    }
}

/// Default voxel: a material plus a palette colour index (2 bytes).
#[repr(C)]
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize,
)]
pub struct Voxel {
    pub material: VoxelType,
    pub color: u8,
}

impl Voxel {
    /// Empty space.
    pub const AIR: Voxel = Voxel::new(VoxelType::AIR, 0);

    pub const fn new(material: VoxelType, color: u8) -> Self {
        Self { material, color }
    }

    pub fn is_air(&self) -> bool {
        self.material.is_air()
    }

    pub fn is_solid(&self) -> bool {
        self.material.is_solid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_voxel_is_air() {
        assert_eq!(Voxel::empty(), Voxel::AIR);
        assert!(Voxel::empty().is_air());
        assert_eq!(<u32 as VoxelValue>::empty(), 0);
    }

    #[test]
    fn test_voxel_is_two_bytes() {
        assert_eq!(std::mem::size_of::<Voxel>(), 2);
        let v = Voxel::new(VoxelType::ROCK, 9);
        assert_eq!(bytemuck::bytes_of(&v), &[5, 9]);
    }

    #[test]
    fn test_solidity() {
        assert!(!VoxelType::AIR.is_solid());
        assert!(!VoxelType::WATER.is_solid());
        assert!(VoxelType::ROCK.is_solid());
        assert!(Voxel::new(VoxelType::GRASS, 0).is_solid());
    }
}
