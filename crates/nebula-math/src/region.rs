//! Inclusive integer axis-aligned boxes in voxel space.

use std::fmt;
use std::ops::{Add, AddAssign};

use glam::{I64Vec3, IVec3};

/// Axis-aligned box of voxel positions with inclusive bounds on both ends.
///
/// A region is valid when `maxs >= mins` on every axis. Unlike
/// an AABB built from two arbitrary corners, the constructor does not sort
/// components: [`Region::INVALID`] (`mins = 0`, `maxs = -1`) is a
/// meaningful "nothing yet" value that [`Region::accumulate`] grows out of.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Region {
    mins: IVec3,
    maxs: IVec3,
}

impl Region {
    /// The empty region. Every containment test against it fails.
    pub const INVALID: Region = Region {
        mins: IVec3::ZERO,
        maxs: IVec3::splat(-1),
    };

    /// The largest representable region.
    pub const MAX: Region = Region {
        mins: IVec3::splat(i32::MIN),
        maxs: IVec3::splat(i32::MAX),
    };

    /// Creates a region from its lower and upper corner (both inclusive).
    pub const fn new(mins: IVec3, maxs: IVec3) -> Self {
        Self { mins, maxs }
    }

    /// Creates a region from individual corner components.
    pub const fn from_coords(
        min_x: i32,
        min_y: i32,
        min_z: i32,
        max_x: i32,
        max_y: i32,
        max_z: i32,
    ) -> Self {
        Self {
            mins: IVec3::new(min_x, min_y, min_z),
            maxs: IVec3::new(max_x, max_y, max_z),
        }
    }

    /// Creates a cube spanning `min..=max` on every axis.
    pub const fn cube(min: i32, max: i32) -> Self {
        Self {
            mins: IVec3::splat(min),
            maxs: IVec3::splat(max),
        }
    }

    /// Lower corner.
    pub fn lower(&self) -> IVec3 {
        self.mins
    }

    /// Upper corner.
    pub fn upper(&self) -> IVec3 {
        self.maxs
    }

    pub fn lower_x(&self) -> i32 {
        self.mins.x
    }

    pub fn lower_y(&self) -> i32 {
        self.mins.y
    }

    pub fn lower_z(&self) -> i32 {
        self.mins.z
    }

    pub fn upper_x(&self) -> i32 {
        self.maxs.x
    }

    pub fn upper_y(&self) -> i32 {
        self.maxs.y
    }

    pub fn upper_z(&self) -> i32 {
        self.maxs.z
    }

    pub fn set_lower(&mut self, mins: IVec3) {
        self.mins = mins;
    }

    pub fn set_upper(&mut self, maxs: IVec3) {
        self.maxs = maxs;
    }

    /// Width along x, counted in voxels (`maxs - mins + 1`).
    pub fn width_in_voxels(&self) -> i32 {
        self.width_in_cells() + 1
    }

    /// Height along y, counted in voxels.
    pub fn height_in_voxels(&self) -> i32 {
        self.height_in_cells() + 1
    }

    /// Depth along z, counted in voxels.
    pub fn depth_in_voxels(&self) -> i32 {
        self.depth_in_cells() + 1
    }

    /// Width along x, counted in cells (`maxs - mins`).
    pub fn width_in_cells(&self) -> i32 {
        self.maxs.x - self.mins.x
    }

    pub fn height_in_cells(&self) -> i32 {
        self.maxs.y - self.mins.y
    }

    pub fn depth_in_cells(&self) -> i32 {
        self.maxs.z - self.mins.z
    }

    /// Dimensions in voxels on every axis.
    pub fn dimensions_in_voxels(&self) -> IVec3 {
        self.maxs - self.mins + IVec3::ONE
    }

    /// Dimensions in cells on every axis.
    pub fn dimensions_in_cells(&self) -> IVec3 {
        self.maxs - self.mins
    }

    /// Number of voxels covered. Zero for invalid regions.
    pub fn voxels(&self) -> usize {
        if !self.is_valid() {
            return 0;
        }
        let dim = self.extent();
        dim.x
            .checked_mul(dim.y)
            .and_then(|slice| slice.checked_mul(dim.z))
            .map_or(usize::MAX, |count| count as usize)
    }

    /// Number of voxels in one z-slice (`width * height`).
    pub fn stride(&self) -> usize {
        let dim = self.extent();
        (dim.x * dim.y) as usize
    }

    /// Dimensions in voxels, widened so that spans up to `2^32` fit.
    fn extent(&self) -> I64Vec3 {
        self.maxs.as_i64vec3() - self.mins.as_i64vec3() + I64Vec3::ONE
    }

    /// Center voxel, rounded towards the lower corner.
    pub fn center(&self) -> IVec3 {
        self.mins + (self.maxs - self.mins) / 2
    }

    /// Returns `true` when `maxs >= mins` on every axis.
    pub fn is_valid(&self) -> bool {
        self.maxs.x >= self.mins.x && self.maxs.y >= self.mins.y && self.maxs.z >= self.mins.z
    }

    /// Row-major index of `pos` relative to the lower corner (x fastest, z slowest).
    pub fn index(&self, pos: IVec3) -> usize {
        debug_assert!(self.contains_point(pos), "{pos} is outside {self}");
        let rel = pos.as_i64vec3() - self.mins.as_i64vec3();
        let dim = self.extent();
        ((rel.z * dim.y + rel.y) * dim.x + rel.x) as usize
    }

    /// Inverse of [`Region::index`].
    pub fn from_index(&self, index: usize) -> IVec3 {
        let index = index as i64;
        let dim = self.extent();
        let rel = I64Vec3::new(index % dim.x, (index / dim.x) % dim.y, index / (dim.x * dim.y));
        (self.mins.as_i64vec3() + rel).as_ivec3()
    }

    pub fn contains_point(&self, pos: IVec3) -> bool {
        self.contains_point_in_x(pos.x)
            && self.contains_point_in_y(pos.y)
            && self.contains_point_in_z(pos.z)
    }

    pub fn contains_point_in_x(&self, x: i32) -> bool {
        x >= self.mins.x && x <= self.maxs.x
    }

    pub fn contains_point_in_y(&self, y: i32) -> bool {
        y >= self.mins.y && y <= self.maxs.y
    }

    pub fn contains_point_in_z(&self, z: i32) -> bool {
        z >= self.mins.z && z <= self.maxs.z
    }

    /// Returns `true` if `other` lies completely inside this region.
    pub fn contains_region(&self, other: &Region) -> bool {
        self.contains_point(other.mins) && self.contains_point(other.maxs)
    }

    /// Returns `true` if `pos` is inside and touches at least one face.
    pub fn is_on_border(&self, pos: IVec3) -> bool {
        self.contains_point(pos)
            && (pos.x == self.mins.x
                || pos.x == self.maxs.x
                || pos.y == self.mins.y
                || pos.y == self.maxs.y
                || pos.z == self.mins.z
                || pos.z == self.maxs.z)
    }

    /// Enlarges the region so that it contains `pos`.
    ///
    /// An invalid region collapses to the single voxel `pos`.
    pub fn accumulate(&mut self, pos: IVec3) {
        if !self.is_valid() {
            self.mins = pos;
            self.maxs = pos;
            return;
        }
        self.mins = self.mins.min(pos);
        self.maxs = self.maxs.max(pos);
    }

    /// Enlarges the region so that it contains `other`.
    ///
    /// This is a bounding box, not a union: the result may cover voxels
    /// that belong to neither input. `other` must be valid.
    pub fn accumulate_region(&mut self, other: &Region) {
        debug_assert!(other.is_valid(), "cannot accumulate an invalid region");
        if !self.is_valid() {
            *self = *other;
            return;
        }
        self.mins = self.mins.min(other.mins);
        self.maxs = self.maxs.max(other.maxs);
    }

    /// Copying variant of [`Region::accumulate_region`].
    pub fn accumulate_copy(&self, other: &Region) -> Region {
        let mut r = *self;
        r.accumulate_region(other);
        r
    }

    /// Shrinks this region to its intersection with `other`.
    ///
    /// The result is invalid when the two regions do not intersect.
    pub fn crop_to(&mut self, other: &Region) {
        self.mins = self.mins.max(other.mins);
        self.maxs = self.maxs.min(other.maxs);
    }

    /// Grows the region by `amount` in every direction.
    pub fn grow(&mut self, amount: i32) {
        self.grow_by(IVec3::splat(amount));
    }

    /// Grows the region by a separate amount per axis.
    pub fn grow_by(&mut self, amount: IVec3) {
        self.mins -= amount;
        self.maxs += amount;
    }

    /// Shrinks the region by `amount` in every direction.
    pub fn shrink(&mut self, amount: i32) {
        self.shrink_by(IVec3::splat(amount));
    }

    pub fn shrink_by(&mut self, amount: IVec3) {
        self.mins += amount;
        self.maxs -= amount;
    }

    /// Moves the whole region.
    pub fn shift(&mut self, amount: IVec3) {
        self.shift_lower_corner(amount);
        self.shift_upper_corner(amount);
    }

    pub fn shift_lower_corner(&mut self, amount: IVec3) {
        self.mins += amount;
    }

    pub fn shift_upper_corner(&mut self, amount: IVec3) {
        self.maxs += amount;
    }
}

impl Default for Region {
    fn default() -> Self {
        Self::INVALID
    }
}

impl Add<IVec3> for Region {
    type Output = Region;

    fn add(mut self, amount: IVec3) -> Region {
        self.shift(amount);
        self
    }
}

impl AddAssign<IVec3> for Region {
    fn add_assign(&mut self, amount: IVec3) {
        self.shift(amount);
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "region[mins({},{},{}), maxs({},{},{})]",
            self.mins.x, self.mins.y, self.mins.z, self.maxs.x, self.maxs.y, self.maxs.z
        )
    }
}

/// Returns `true` if the two regions share at least one voxel.
pub fn intersects(a: &Region, b: &Region) -> bool {
    a.maxs.x >= b.mins.x
        && a.mins.x <= b.maxs.x
        && a.maxs.y >= b.mins.y
        && a.mins.y <= b.maxs.y
        && a.maxs.z >= b.mins.z
        && a.mins.z <= b.maxs.z
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_point_inclusive_bounds() {
        let r = Region::cube(0, 10);
        assert!(r.contains_point(IVec3::ZERO));
        assert!(r.contains_point(IVec3::splat(10)));
        assert!(r.contains_point(IVec3::new(10, 5, 5)));
        assert!(!r.contains_point(IVec3::new(11, 5, 5)));
        assert!(!r.contains_point(IVec3::new(5, -1, 5)));
    }

    #[test]
    fn test_invalid_region_contains_nothing() {
        assert!(!Region::INVALID.is_valid());
        assert!(!Region::INVALID.contains_point(IVec3::ZERO));
        assert_eq!(Region::INVALID.voxels(), 0);
        assert_eq!(Region::default(), Region::INVALID);
    }

    #[test]
    fn test_contains_region() {
        let outer = Region::cube(-5, 5);
        assert!(outer.contains_region(&Region::cube(-5, 5)));
        assert!(outer.contains_region(&Region::cube(0, 1)));
        assert!(!outer.contains_region(&Region::cube(0, 6)));
    }

    #[test]
    fn test_dimensions() {
        let r = Region::from_coords(2, 3, 4, 11, 13, 15);
        assert_eq!(r.width_in_voxels(), 10);
        assert_eq!(r.height_in_voxels(), 11);
        assert_eq!(r.depth_in_voxels(), 12);
        assert_eq!(r.width_in_cells(), 9);
        assert_eq!(r.dimensions_in_cells(), IVec3::new(9, 10, 11));
        assert_eq!(r.voxels(), 10 * 11 * 12);
        assert_eq!(r.stride(), 110);
    }

    #[test]
    fn test_accumulate_point_from_single_voxel() {
        let mut r = Region::new(IVec3::new(1, 1, 1), IVec3::new(1, 1, 1));
        r.accumulate(IVec3::new(-3, 4, 1));
        assert_eq!(r.lower(), IVec3::new(-3, 1, 1));
        assert_eq!(r.upper(), IVec3::new(1, 4, 1));
    }

    #[test]
    fn test_accumulate_grows_out_of_invalid() {
        let mut r = Region::INVALID;
        r.accumulate(IVec3::new(5, 6, 7));
        assert_eq!(r, Region::new(IVec3::new(5, 6, 7), IVec3::new(5, 6, 7)));

        let mut r = Region::INVALID;
        r.accumulate_region(&Region::cube(-4, -2));
        assert_eq!(r, Region::cube(-4, -2));
    }

    #[test]
    fn test_accumulate_region_is_bounding_box() {
        let a = Region::cube(0, 1);
        let b = Region::cube(5, 6);
        let acc = a.accumulate_copy(&b);
        assert_eq!(acc, Region::cube(0, 6));
        // Bounding box covers voxels in neither input.
        assert!(acc.contains_point(IVec3::splat(3)));
    }

    #[test]
    fn test_crop_to_intersection() {
        let mut a = Region::cube(0, 10);
        a.crop_to(&Region::cube(5, 15));
        assert_eq!(a, Region::cube(5, 10));

        let mut disjoint = Region::cube(0, 1);
        disjoint.crop_to(&Region::cube(5, 6));
        assert!(!disjoint.is_valid());
    }

    #[test]
    fn test_intersects_touching_and_disjoint() {
        let a = Region::cube(0, 10);
        assert!(intersects(&a, &Region::from_coords(10, 0, 0, 20, 10, 10)));
        assert!(!intersects(&a, &Region::from_coords(11, 0, 0, 20, 10, 10)));
        assert!(intersects(&Region::cube(5, 6), &a));
    }

    #[test]
    fn test_grow_and_shrink() {
        let mut r = Region::cube(0, 4);
        r.grow(1);
        assert_eq!(r, Region::cube(-1, 5));
        r.shrink(2);
        assert_eq!(r, Region::cube(1, 3));
        r.grow_by(IVec3::new(1, 0, 2));
        assert_eq!(r, Region::from_coords(0, 1, -1, 4, 3, 5));
    }

    #[test]
    fn test_shift_and_add() {
        let r = Region::cube(0, 2) + IVec3::new(10, -10, 0);
        assert_eq!(r, Region::from_coords(10, -10, 0, 12, -8, 2));

        let mut s = Region::cube(0, 2);
        s += IVec3::ONE;
        assert_eq!(s, Region::cube(1, 3));

        let mut t = Region::cube(0, 2);
        t.shift_upper_corner(IVec3::splat(3));
        assert_eq!(t, Region::cube(0, 5));
    }

    #[test]
    fn test_index_round_trip() {
        let r = Region::from_coords(-2, 5, 7, 3, 9, 8);
        for i in 0..r.voxels() {
            let pos = r.from_index(i);
            assert!(r.contains_point(pos));
            assert_eq!(r.index(pos), i);
        }
        assert_eq!(r.index(r.lower()), 0);
        assert_eq!(r.index(r.upper()), r.voxels() - 1);
    }

    #[test]
    fn test_index_beyond_i32_range() {
        let r = Region::from_coords(-40_000, -40_000, 0, 39_999, 39_999, 3);
        assert_eq!(r.stride(), 80_000 * 80_000);
        assert_eq!(r.voxels(), 80_000 * 80_000 * 4);
        for pos in [r.lower(), r.upper(), IVec3::new(12, -7, 2)] {
            assert_eq!(r.from_index(r.index(pos)), pos);
        }
        assert_eq!(r.index(r.upper()), r.voxels() - 1);
        assert_eq!(Region::MAX.voxels(), usize::MAX);
    }

    #[test]
    fn test_is_on_border() {
        let r = Region::cube(0, 4);
        assert!(r.is_on_border(IVec3::new(0, 2, 2)));
        assert!(r.is_on_border(IVec3::new(2, 2, 4)));
        assert!(!r.is_on_border(IVec3::new(2, 2, 2)));
        assert!(!r.is_on_border(IVec3::new(5, 2, 2)));
    }

    #[test]
    fn test_center() {
        assert_eq!(Region::cube(0, 10).center(), IVec3::splat(5));
        assert_eq!(Region::cube(-4, 5).center(), IVec3::ZERO);
    }

    #[test]
    fn test_display() {
        let r = Region::from_coords(0, -1, 2, 3, 4, 5);
        assert_eq!(r.to_string(), "region[mins(0,-1,2), maxs(3,4,5)]");
    }
}
