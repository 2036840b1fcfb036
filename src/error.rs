use thiserror::Error;

/// Errors produced while encoding, decoding, writing or reading an archive.
#[derive(Debug, Error)]
pub enum SwTilesError {
    /// The first 8 bytes of the buffer were not the literal `SWTILES\0`.
    #[error("bad magic: expected `SWTILES\\0`")]
    BadMagic,

    /// The header's `version` field was not the version this crate implements.
    #[error("unsupported version: {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version found in the header.
        found: u16,
        /// Version this crate implements.
        expected: u16,
    },

    /// A `fetch` returned fewer bytes than requested.
    #[error("truncated read: expected {expected} bytes, got {got}")]
    Truncated {
        /// Bytes requested.
        expected: usize,
        /// Bytes actually returned.
        got: usize,
    },

    /// A reserved byte was non-zero where strict decoding requires zero.
    #[error("reserved byte at offset {offset} is non-zero")]
    ReservedNotZero {
        /// Byte offset of the offending reserved byte, relative to the record start.
        offset: usize,
    },

    /// `data_type` or `image_format` held a value outside the defined enum.
    #[error("bad enum value {value} for field `{field}`")]
    BadEnum {
        /// Name of the offending field.
        field: &'static str,
        /// Raw byte value that failed to map to a known variant.
        value: u8,
    },

    /// `coord_to_cell` produced a (row, col) outside the level's grid.
    #[error("coordinates resolve to cell ({row}, {col}), outside grid {grid_rows}x{grid_cols}")]
    OutOfGrid {
        /// Computed row.
        row: i64,
        /// Computed column.
        col: i64,
        /// Number of rows in the level's grid.
        grid_rows: u32,
        /// Number of columns in the level's grid.
        grid_cols: u32,
    },

    /// An index cell's offset did not fit in 40 bits.
    #[error("offset {0} does not fit in 40 bits")]
    OffsetOverflow(u64),

    /// An index cell's length did not fit in 24 bits.
    #[error("length {0} does not fit in 24 bits")]
    LengthOverflow(u32),

    /// The same (level, row, col) was written more than once.
    #[error("duplicate cell at level {level_id}, row {row}, col {col}")]
    DuplicateCell {
        /// Level the duplicate occurred on.
        level_id: u8,
        /// Row of the duplicate cell.
        row: u32,
        /// Column of the duplicate cell.
        col: u32,
    },

    /// A tile was written at a (row, col) outside the level's declared grid.
    #[error("cell ({row}, {col}) is outside grid {grid_rows}x{grid_cols}")]
    CellOutOfGrid {
        /// Row of the offending cell.
        row: u32,
        /// Column of the offending cell.
        col: u32,
        /// Number of rows in the level's grid.
        grid_rows: u32,
        /// Number of columns in the level's grid.
        grid_cols: u32,
    },

    /// A single tile payload was at or above the 2^24 byte limit.
    #[error("payload of {0} bytes exceeds the 2^24 byte limit")]
    PayloadTooLarge(usize),

    /// A level's cumulative payload reached the 2^40 byte limit.
    #[error("level {level_id} payload reached the 2^40 byte limit")]
    LevelPayloadTooLarge {
        /// Level whose payload overflowed.
        level_id: u8,
    },

    /// The byte source failed to produce the requested bytes.
    #[error("fetch of {length} bytes at offset {offset} failed: {reason}")]
    FetchFailed {
        /// Offset of the failed fetch.
        offset: u64,
        /// Length of the failed fetch.
        length: u64,
        /// Human-readable failure reason (status code, I/O error, etc).
        reason: String,
    },

    /// The writer's sink rejected a write or seek-and-patch.
    #[error("sink operation failed: {0}")]
    SinkFailed(String),

    /// A level id referenced by the caller does not exist in the archive.
    #[error("level {0} not found")]
    LevelNotFound(u8),

    /// More level plans were given than the header's `num_levels` field (u8) can hold.
    #[error("{0} levels were given, but an archive may declare at most 255")]
    TooManyLevels(usize),
}
