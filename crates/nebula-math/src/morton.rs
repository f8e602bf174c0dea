//! Morton encoding (Z-order curve) for dense chunk storage.
//!
//! Chunks of up to 256³ voxels store their data in Morton order so that
//! spatially close voxels are close in memory. The per-axis tables turn an
//! encode into three lookups and two ORs; the delta tables let a cursor step
//! to a neighbouring voxel with a single addition.

/// Largest coordinate (exclusive) covered by the lookup tables.
pub const MORTON_TABLE_SIZE: usize = 256;

/// Spread the low 10 bits of `v` so that bit `k` lands on bit `3k`.
const fn spread_bits(v: u32) -> u32 {
    let mut x = v & 0x3ff;
    x = (x | (x << 16)) & 0x030000ff;
    x = (x | (x << 8)) & 0x0300f00f;
    x = (x | (x << 4)) & 0x030c30c3;
    x = (x | (x << 2)) & 0x09249249;
    x
}

/// Inverse of [`spread_bits`].
const fn compact_bits(v: u32) -> u32 {
    let mut x = v & 0x09249249;
    x = (x | (x >> 2)) & 0x030c30c3;
    x = (x | (x >> 4)) & 0x0300f00f;
    x = (x | (x >> 8)) & 0x030000ff;
    x = (x | (x >> 16)) & 0x3ff;
    x
}

const fn build_table(shift: u32) -> [u32; MORTON_TABLE_SIZE] {
    let mut table = [0u32; MORTON_TABLE_SIZE];
    let mut i = 0;
    while i < MORTON_TABLE_SIZE {
        table[i] = spread_bits(i as u32) << shift;
        i += 1;
    }
    table
}

// Entry 255 is the step to coordinate 256. Never taken inside a chunk, but
// it keeps the table total.
const fn build_delta(shift: u32) -> [i32; MORTON_TABLE_SIZE] {
    let mut table = [0i32; MORTON_TABLE_SIZE];
    let mut i = 0;
    while i < MORTON_TABLE_SIZE {
        let next = spread_bits(i as u32 + 1) << shift;
        let here = spread_bits(i as u32) << shift;
        table[i] = (next - here) as i32;
        i += 1;
    }
    table
}

/// Morton contribution of an x coordinate.
pub static MORTON_X: [u32; MORTON_TABLE_SIZE] = build_table(0);
/// Morton contribution of a y coordinate.
pub static MORTON_Y: [u32; MORTON_TABLE_SIZE] = build_table(1);
/// Morton contribution of a z coordinate.
pub static MORTON_Z: [u32; MORTON_TABLE_SIZE] = build_table(2);

/// `DELTA_X[c]` is the index difference between local x `c + 1` and `c`.
pub static DELTA_X: [i32; MORTON_TABLE_SIZE] = build_delta(0);
/// `DELTA_Y[c]` is the index difference between local y `c + 1` and `c`.
pub static DELTA_Y: [i32; MORTON_TABLE_SIZE] = build_delta(1);
/// `DELTA_Z[c]` is the index difference between local z `c + 1` and `c`.
pub static DELTA_Z: [i32; MORTON_TABLE_SIZE] = build_delta(2);

/// Morton index of a local position. Each coordinate must be below 256.
#[inline]
pub fn encode(x: u32, y: u32, z: u32) -> u32 {
    debug_assert!(
        (x as usize) < MORTON_TABLE_SIZE
            && (y as usize) < MORTON_TABLE_SIZE
            && (z as usize) < MORTON_TABLE_SIZE,
        "local position ({x}, {y}, {z}) exceeds the morton tables"
    );
    MORTON_X[x as usize] | MORTON_Y[y as usize] | MORTON_Z[z as usize]
}

/// Decodes a Morton index back into its local position.
#[inline]
pub fn decode(index: u32) -> (u32, u32, u32) {
    (
        compact_bits(index),
        compact_bits(index >> 1),
        compact_bits(index >> 2),
    )
}
