use deku::bitvec::{BitVec, BitView};
use deku::prelude::*;

use crate::SwTilesError;

/// Size in bytes of an encoded level-table entry.
pub const LEVEL_ENTRY_BYTES: usize = 64;

/// A georeferenced regular grid within an archive, plus where its index and
/// payloads live in the file.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Level {
    /// Identifier of this level, unique within the archive. Carries no
    /// ordering implication: levels are stored in the order they were written.
    pub level_id: u8,

    /// Ground meters per pixel.
    pub resolution_m: f32,

    /// Ground meters per tile edge. Used for all grid arithmetic; the
    /// relation `tile_extent_m == resolution_m * tile_size_px` is recommended
    /// but not enforced.
    pub tile_extent_m: f32,

    /// Easting of the top-left corner of cell (row=0, col=0).
    pub origin_e: f64,

    /// Northing of the top-left corner of cell (row=0, col=0).
    pub origin_n: f64,

    /// Number of columns in the dense index.
    pub grid_cols: u32,

    /// Number of rows in the dense index.
    pub grid_rows: u32,

    /// Number of non-empty cells. Advisory: correctness is driven by
    /// per-cell length, not this field.
    pub tile_count: u32,

    /// Absolute file byte offset of this level's index region.
    pub index_offset: u64,

    /// Byte length of this level's index region (`grid_cols * grid_rows * 8`).
    pub index_length: u64,

    /// Absolute file byte offset of this level's payload region.
    pub data_offset: u64,
}

#[derive(Debug, DekuRead, DekuWrite)]
#[deku(endian = "little")]
struct RawLevelEntry {
    level_id: u8,
    _reserved_1: u8,
    resolution_m: f32,
    tile_extent_m: f32,
    _reserved_2: u16,
    origin_e: f64,
    origin_n: f64,
    grid_cols: u32,
    grid_rows: u32,
    tile_count: u32,
    index_offset: u64,
    index_length: u64,
    data_offset: u64,
}

impl From<&Level> for RawLevelEntry {
    fn from(level: &Level) -> Self {
        Self {
            level_id: level.level_id,
            _reserved_1: 0,
            resolution_m: level.resolution_m,
            tile_extent_m: level.tile_extent_m,
            _reserved_2: 0,
            origin_e: level.origin_e,
            origin_n: level.origin_n,
            grid_cols: level.grid_cols,
            grid_rows: level.grid_rows,
            tile_count: level.tile_count,
            index_offset: level.index_offset,
            index_length: level.index_length,
            data_offset: level.data_offset,
        }
    }
}

impl From<RawLevelEntry> for Level {
    fn from(raw: RawLevelEntry) -> Self {
        Self {
            level_id: raw.level_id,
            resolution_m: raw.resolution_m,
            tile_extent_m: raw.tile_extent_m,
            origin_e: raw.origin_e,
            origin_n: raw.origin_n,
            grid_cols: raw.grid_cols,
            grid_rows: raw.grid_rows,
            tile_count: raw.tile_count,
            index_offset: raw.index_offset,
            index_length: raw.index_length,
            data_offset: raw.data_offset,
        }
    }
}

/// Reads a level-table entry from its fixed 64-byte encoding.
///
/// Reserved bytes are accepted with any value, per the lenient-on-read
/// policy for this format. Since the input is a fixed-size array of exactly
/// [`LEVEL_ENTRY_BYTES`], decoding every field at its declared offset cannot
/// fail.
#[allow(clippy::missing_panics_doc)]
pub fn decode_level_entry(buf: &[u8; LEVEL_ENTRY_BYTES]) -> Level {
    let (rest, raw) = RawLevelEntry::read(buf.view_bits(), ())
        .expect("a fixed 64 byte buffer always satisfies the level entry layout");
    debug_assert!(rest.is_empty());

    raw.into()
}

/// Writes a level-table entry to its fixed 64-byte encoding, zeroing both
/// reserved fields.
pub fn encode_level_entry(level: &Level) -> [u8; LEVEL_ENTRY_BYTES] {
    let raw = RawLevelEntry::from(level);
    let mut bits = BitVec::with_capacity(8 * LEVEL_ENTRY_BYTES);
    raw.write(&mut bits, ())
        .expect("writing a fixed-size struct to an unbounded BitVec cannot fail");

    let mut buf = [0u8; LEVEL_ENTRY_BYTES];
    buf.copy_from_slice(bits.as_raw_slice());
    buf
}
