//! The packed 8-byte index cell: a little-endian 40-bit offset followed by a
//! little-endian 24-bit length. Deliberately hand-rolled byte-by-byte rather
//! than loaded as a native-width integer, to sidestep alignment assumptions
//! a reader might otherwise make about this non-native width.

use crate::SwTilesError;

/// Size in bytes of an encoded index cell.
pub const INDEX_CELL_BYTES: usize = 8;

/// Largest offset representable in 40 bits.
pub const MAX_OFFSET: u64 = (1 << 40) - 1;

/// Largest length representable in 24 bits.
pub const MAX_LENGTH: u32 = (1 << 24) - 1;

/// Decodes an index cell into `(offset, length)`.
///
/// `offset` is relative to the owning level's `data_offset`. A `length` of
/// zero denotes an empty cell; callers should not assume `offset` is zero
/// in that case.
pub fn decode_index_cell(buf: &[u8; INDEX_CELL_BYTES]) -> (u64, u32) {
    let offset = u64::from(buf[0])
        | u64::from(buf[1]) << 8
        | u64::from(buf[2]) << 16
        | u64::from(buf[3]) << 24
        | u64::from(buf[4]) << 32;

    let length = u32::from(buf[5]) | u32::from(buf[6]) << 8 | u32::from(buf[7]) << 16;

    (offset, length)
}

/// Encodes `(offset, length)` into the packed 8-byte cell layout.
///
/// # Errors
/// Returns [`SwTilesError::OffsetOverflow`] if `offset` does not fit in 40
/// bits, or [`SwTilesError::LengthOverflow`] if `length` does not fit in 24
/// bits.
pub fn encode_index_cell(offset: u64, length: u32) -> Result<[u8; INDEX_CELL_BYTES], SwTilesError> {
    if offset > MAX_OFFSET {
        return Err(SwTilesError::OffsetOverflow(offset));
    }
    if length > MAX_LENGTH {
        return Err(SwTilesError::LengthOverflow(length));
    }

    let mut buf = [0u8; INDEX_CELL_BYTES];
    buf[0] = (offset & 0xFF) as u8;
    buf[1] = ((offset >> 8) & 0xFF) as u8;
    buf[2] = ((offset >> 16) & 0xFF) as u8;
    buf[3] = ((offset >> 24) & 0xFF) as u8;
    buf[4] = ((offset >> 32) & 0xFF) as u8;
    buf[5] = (length & 0xFF) as u8;
    buf[6] = ((length >> 8) & 0xFF) as u8;
    buf[7] = ((length >> 16) & 0xFF) as u8;

    Ok(buf)
}
