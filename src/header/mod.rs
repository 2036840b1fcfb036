pub use data_type::DataType;
pub use image_format::ImageFormat;

mod data_type;
mod image_format;

use crate::{SwTilesError, MAGIC};

/// Size in bytes of the encoded header.
pub const HEADER_BYTES: usize = 256;

/// Global, archive-wide metadata. Immutable once written.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Header {
    /// What kind of data this archive's payloads represent.
    pub data_type: DataType,

    /// Image codec every payload is encoded with.
    pub image_format: ImageFormat,

    /// EPSG code of the CRS that `bounds_*` and every level's origin are expressed in.
    pub crs_epsg: u32,

    /// Minimum easting across every non-empty tile in the archive.
    pub bounds_min_e: f64,

    /// Minimum northing across every non-empty tile in the archive.
    pub bounds_min_n: f64,

    /// Maximum easting across every non-empty tile in the archive.
    pub bounds_max_e: f64,

    /// Maximum northing across every non-empty tile in the archive.
    pub bounds_max_n: f64,

    /// Pixel width (== height) shared by every payload.
    pub tile_size_px: u16,

    /// Number of entries in the level table.
    pub num_levels: u8,

    /// Absolute byte offset of the level table, normally [`HEADER_BYTES`].
    pub level_table_offset: u64,
}

/// Reads a header from its fixed 256-byte encoding.
///
/// # Errors
/// Returns [`SwTilesError::BadMagic`] if the first 8 bytes are not the
/// literal magic, [`SwTilesError::UnsupportedVersion`] if the version field
/// isn't 2, [`SwTilesError::ReservedNotZero`] if a reserved byte is
/// non-zero, or [`SwTilesError::BadEnum`] if `data_type` or `image_format`
/// holds an undefined value.
#[allow(clippy::missing_panics_doc)]
pub fn decode_header(buf: &[u8; HEADER_BYTES]) -> Result<Header, SwTilesError> {
    if &buf[0..8] != MAGIC {
        return Err(SwTilesError::BadMagic);
    }

    let version = u16::from_le_bytes([buf[8], buf[9]]);
    if version != crate::FORMAT_VERSION {
        return Err(SwTilesError::UnsupportedVersion {
            found: version,
            expected: crate::FORMAT_VERSION,
        });
    }

    if buf[51] != 0 {
        return Err(SwTilesError::ReservedNotZero { offset: 51 });
    }
    for (i, byte) in buf[60..256].iter().enumerate() {
        if *byte != 0 {
            return Err(SwTilesError::ReservedNotZero { offset: 60 + i });
        }
    }

    let data_type = DataType::try_from(buf[10])?;
    let image_format = ImageFormat::try_from(buf[11])?;

    let crs_epsg = u32::from_le_bytes(buf[12..16].try_into().expect("4 byte slice"));
    let bounds_min_e = f64::from_le_bytes(buf[16..24].try_into().expect("8 byte slice"));
    let bounds_min_n = f64::from_le_bytes(buf[24..32].try_into().expect("8 byte slice"));
    let bounds_max_e = f64::from_le_bytes(buf[32..40].try_into().expect("8 byte slice"));
    let bounds_max_n = f64::from_le_bytes(buf[40..48].try_into().expect("8 byte slice"));
    let tile_size_px = u16::from_le_bytes(buf[48..50].try_into().expect("2 byte slice"));
    let num_levels = buf[50];
    let level_table_offset = u64::from_le_bytes(buf[52..60].try_into().expect("8 byte slice"));

    Ok(Header {
        data_type,
        image_format,
        crs_epsg,
        bounds_min_e,
        bounds_min_n,
        bounds_max_e,
        bounds_max_n,
        tile_size_px,
        num_levels,
        level_table_offset,
    })
}

/// Writes a header to its fixed 256-byte encoding, zeroing all reserved bytes.
pub fn encode_header(header: &Header) -> [u8; HEADER_BYTES] {
    let mut buf = [0u8; HEADER_BYTES];

    buf[0..8].copy_from_slice(MAGIC);
    buf[8..10].copy_from_slice(&crate::FORMAT_VERSION.to_le_bytes());
    buf[10] = header.data_type.to_u8();
    buf[11] = header.image_format.to_u8();
    buf[12..16].copy_from_slice(&header.crs_epsg.to_le_bytes());
    buf[16..24].copy_from_slice(&header.bounds_min_e.to_le_bytes());
    buf[24..32].copy_from_slice(&header.bounds_min_n.to_le_bytes());
    buf[32..40].copy_from_slice(&header.bounds_max_e.to_le_bytes());
    buf[40..48].copy_from_slice(&header.bounds_max_n.to_le_bytes());
    buf[48..50].copy_from_slice(&header.tile_size_px.to_le_bytes());
    buf[50] = header.num_levels;
    // buf[51] stays reserved = 0
    buf[52..60].copy_from_slice(&header.level_table_offset.to_le_bytes());
    // buf[60..256] stays reserved = 0

    buf
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_header() -> Header {
        Header {
            data_type: DataType::Raster,
            image_format: ImageFormat::Png,
            crs_epsg: 3857,
            bounds_min_e: -100.0,
            bounds_min_n: -200.0,
            bounds_max_e: 300.0,
            bounds_max_n: 400.0,
            tile_size_px: 256,
            num_levels: 3,
            level_table_offset: 256,
        }
    }

    #[test]
    fn round_trip() {
        let header = sample_header();
        let buf = encode_header(&header);
        let decoded = decode_header(&buf).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut buf = encode_header(&sample_header());
        buf[0] = b'X';
        assert!(matches!(decode_header(&buf), Err(SwTilesError::BadMagic)));
    }

    #[test]
    fn rejects_bad_version() {
        let mut buf = encode_header(&sample_header());
        buf[8..10].copy_from_slice(&1u16.to_le_bytes());
        assert!(matches!(
            decode_header(&buf),
            Err(SwTilesError::UnsupportedVersion {
                found: 1,
                expected: 2
            })
        ));
    }

    #[test]
    fn rejects_nonzero_reserved_byte() {
        let mut buf = encode_header(&sample_header());
        buf[51] = 1;
        assert!(matches!(
            decode_header(&buf),
            Err(SwTilesError::ReservedNotZero { offset: 51 })
        ));

        let mut buf = encode_header(&sample_header());
        buf[200] = 7;
        assert!(matches!(
            decode_header(&buf),
            Err(SwTilesError::ReservedNotZero { offset: 200 })
        ));
    }

    #[test]
    fn rejects_bad_enum() {
        let mut buf = encode_header(&sample_header());
        buf[10] = 0;
        assert!(matches!(
            decode_header(&buf),
            Err(SwTilesError::BadEnum {
                field: "data_type",
                value: 0
            })
        ));
    }

    #[test]
    fn magic_is_checked_before_version() {
        let mut buf = encode_header(&sample_header());
        buf[0] = b'X';
        buf[8..10].copy_from_slice(&99u16.to_le_bytes());
        assert!(matches!(decode_header(&buf), Err(SwTilesError::BadMagic)));
    }
}
