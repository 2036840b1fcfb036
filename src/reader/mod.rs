//! Random access over an archive: local-file or range-capable HTTP, plus
//! the coordinate arithmetic that maps georeferenced positions to grid
//! cells and back.

mod byte_source;
mod cache;

pub use byte_source::{ByteSource, HttpByteSource, LocalByteSource};
pub use cache::{CachingByteSource, DEFAULT_CACHE_CAPACITY};

#[cfg(feature = "async")]
pub use byte_source::{AsyncByteSource, AsyncHttpByteSource};

use crate::coord::{cell_to_bounds, coord_to_cell, tiles_in_view, CellBounds};
use crate::header::{decode_header, Header, HEADER_BYTES};
use crate::index_cell::{decode_index_cell, INDEX_CELL_BYTES};
use crate::level::{decode_level_entry, Level, LEVEL_ENTRY_BYTES};
use crate::SwTilesError;

/// A located, opaque tile payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    /// Raw payload bytes, returned verbatim: no decoding is performed.
    pub bytes: Vec<u8>,
    /// Advertised media type, from the archive's `image_format`.
    pub media_type: &'static str,
    /// Ground-space box this tile covers.
    pub bounds: (f64, f64, f64, f64),
}

fn check_truncated(got: usize, expected: usize) -> Result<(), SwTilesError> {
    if got < expected {
        return Err(SwTilesError::Truncated { expected, got });
    }
    Ok(())
}

/// Random access over an archive backed by a [`ByteSource`].
///
/// Stateless after [`open`](Self::open): the header and level table are
/// parsed once and held for the reader's lifetime; every `get_tile` call
/// issues its own fetches and is safe to run concurrently with any other.
pub struct Reader<S> {
    source: S,
    header: Header,
    levels: Vec<Level>,
}

impl<S: ByteSource> Reader<S> {
    /// Opens a reader: fetches and decodes the header, then the level table.
    ///
    /// # Errors
    /// Returns [`SwTilesError::Truncated`] if either fetch returns fewer
    /// bytes than requested, or whatever [`crate::header::decode_header`]
    /// returns for a malformed header.
    pub fn open(source: S) -> Result<Self, SwTilesError> {
        let header_bytes = source.fetch(0, HEADER_BYTES as u64)?;
        check_truncated(header_bytes.len(), HEADER_BYTES)?;

        let header_array: [u8; HEADER_BYTES] = header_bytes[0..HEADER_BYTES]
            .try_into()
            .expect("length checked above");
        let header = match decode_header(&header_array) {
            Ok(header) => header,
            Err(e) => {
                tracing::warn!("rejecting archive at open: {e}");
                return Err(e);
            }
        };

        let table_len = header.num_levels as usize * LEVEL_ENTRY_BYTES;
        let table_bytes = source.fetch(header.level_table_offset, table_len as u64)?;
        check_truncated(table_bytes.len(), table_len)?;

        let levels: Vec<Level> = table_bytes
            .chunks_exact(LEVEL_ENTRY_BYTES)
            .map(|chunk| {
                let array: [u8; LEVEL_ENTRY_BYTES] =
                    chunk.try_into().expect("chunks_exact guarantees length");
                decode_level_entry(&array)
            })
            .collect();

        tracing::debug!(num_levels = levels.len(), "opened archive");

        Ok(Self {
            source,
            header,
            levels,
        })
    }

    /// Returns the archive's header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Looks up a level by id via linear search over the (at most 255) entries.
    ///
    /// # Errors
    /// Returns [`SwTilesError::LevelNotFound`] if no level has this id.
    pub fn level(&self, level_id: u8) -> Result<&Level, SwTilesError> {
        self.levels
            .iter()
            .find(|l| l.level_id == level_id)
            .ok_or(SwTilesError::LevelNotFound(level_id))
    }

    /// Maps a georeferenced position to the grid cell that contains it. See
    /// [`crate::coord::coord_to_cell`].
    ///
    /// # Errors
    /// Returns [`SwTilesError::LevelNotFound`] if `level_id` is unknown.
    pub fn coord_to_cell(&self, level_id: u8, easting: f64, northing: f64) -> Result<(i64, i64), SwTilesError> {
        let level = self.level(level_id)?;
        Ok(coord_to_cell(level, easting, northing))
    }

    /// Maps a grid cell to the ground-space box it covers. See
    /// [`crate::coord::cell_to_bounds`].
    ///
    /// # Errors
    /// Returns [`SwTilesError::LevelNotFound`] if `level_id` is unknown.
    pub fn cell_to_bounds(
        &self,
        level_id: u8,
        row: u32,
        col: u32,
    ) -> Result<(f64, f64, f64, f64), SwTilesError> {
        let level = self.level(level_id)?;
        Ok(cell_to_bounds(level, row, col))
    }

    /// Pure metadata arithmetic: the clamped rectangle of cells overlapping
    /// a ground-space view. Never touches the byte source.
    ///
    /// # Errors
    /// Returns [`SwTilesError::LevelNotFound`] if `level_id` is unknown.
    pub fn tiles_in_view(
        &self,
        level_id: u8,
        min_e: f64,
        min_n: f64,
        max_e: f64,
        max_n: f64,
    ) -> Result<Vec<CellBounds>, SwTilesError> {
        let level = self.level(level_id)?;
        Ok(tiles_in_view(level, min_e, min_n, max_e, max_n))
    }

    /// Fetches a tile by `(level_id, row, col)`.
    ///
    /// Returns `Ok(None)` if the cell is empty or lies outside the grid:
    /// an absent tile is not an error. Otherwise issues an index-cell
    /// fetch, decodes it, then a payload fetch.
    ///
    /// # Errors
    /// Returns [`SwTilesError::LevelNotFound`] if `level_id` is unknown, or
    /// [`SwTilesError::FetchFailed`] / [`SwTilesError::Truncated`] if a
    /// fetch fails or is short.
    pub fn get_tile(&self, level_id: u8, row: u32, col: u32) -> Result<Option<Tile>, SwTilesError> {
        let level = self.level(level_id)?;

        if row >= level.grid_rows || col >= level.grid_cols {
            return Ok(None);
        }

        let cell_offset =
            level.index_offset + (u64::from(row) * u64::from(level.grid_cols) + u64::from(col)) * INDEX_CELL_BYTES as u64;
        let cell_bytes = self.source.fetch(cell_offset, INDEX_CELL_BYTES as u64)?;
        check_truncated(cell_bytes.len(), INDEX_CELL_BYTES)?;

        let cell_array: [u8; INDEX_CELL_BYTES] = cell_bytes[0..INDEX_CELL_BYTES]
            .try_into()
            .expect("length checked above");
        let (offset, length) = decode_index_cell(&cell_array);

        if length == 0 {
            return Ok(None);
        }

        let bytes = self
            .source
            .fetch(level.data_offset + offset, u64::from(length))?;
        check_truncated(bytes.len(), length as usize)?;

        Ok(Some(Tile {
            bytes,
            media_type: self.header.image_format.media_type(),
            bounds: cell_to_bounds(level, row, col),
        }))
    }

    /// Composition of [`coord_to_cell`](Self::coord_to_cell) and
    /// [`get_tile`](Self::get_tile): returns `Ok(None)` for an out-of-grid
    /// coordinate rather than [`SwTilesError::OutOfGrid`], per the
    /// out-of-grid-is-not-an-error policy for tile lookup.
    ///
    /// # Errors
    /// Returns [`SwTilesError::LevelNotFound`] if `level_id` is unknown, or
    /// a fetch error as in [`get_tile`](Self::get_tile).
    pub fn get_tile_by_coord(
        &self,
        level_id: u8,
        easting: f64,
        northing: f64,
    ) -> Result<Option<Tile>, SwTilesError> {
        let level = self.level(level_id)?;
        let (row, col) = coord_to_cell(level, easting, northing);

        if row < 0 || col < 0 || row >= i64::from(level.grid_rows) || col >= i64::from(level.grid_cols) {
            return Ok(None);
        }

        #[allow(clippy::cast_sign_loss)]
        self.get_tile(level_id, row as u32, col as u32)
    }
}

#[cfg(feature = "async")]
pub use r#async::AsyncReader;

#[cfg(feature = "async")]
mod r#async {
    use super::{
        cell_to_bounds, check_truncated, coord_to_cell, decode_header, decode_index_cell,
        decode_level_entry, AsyncByteSource, Header, Level, SwTilesError, Tile, HEADER_BYTES,
        INDEX_CELL_BYTES, LEVEL_ENTRY_BYTES,
    };

    /// Asynchronous counterpart of [`super::Reader`], generic over an
    /// [`AsyncByteSource`].
    pub struct AsyncReader<S> {
        source: S,
        header: Header,
        levels: Vec<Level>,
    }

    impl<S: AsyncByteSource> AsyncReader<S> {
        /// Async counterpart of [`Reader::open`](super::Reader::open).
        ///
        /// # Errors
        /// Same as [`Reader::open`](super::Reader::open).
        pub async fn open(source: S) -> Result<Self, SwTilesError> {
            let header_bytes = source.fetch_async(0, HEADER_BYTES as u64).await?;
            check_truncated(header_bytes.len(), HEADER_BYTES)?;

            let header_array: [u8; HEADER_BYTES] = header_bytes[0..HEADER_BYTES]
                .try_into()
                .expect("length checked above");
            let header = decode_header(&header_array)?;

            let table_len = header.num_levels as usize * LEVEL_ENTRY_BYTES;
            let table_bytes = source
                .fetch_async(header.level_table_offset, table_len as u64)
                .await?;
            check_truncated(table_bytes.len(), table_len)?;

            let levels = table_bytes
                .chunks_exact(LEVEL_ENTRY_BYTES)
                .map(|chunk| {
                    let array: [u8; LEVEL_ENTRY_BYTES] =
                        chunk.try_into().expect("chunks_exact guarantees length");
                    decode_level_entry(&array)
                })
                .collect();

            Ok(Self {
                source,
                header,
                levels,
            })
        }

        /// Returns the archive's header.
        pub fn header(&self) -> &Header {
            &self.header
        }

        /// Async counterpart of [`Reader::level`](super::Reader::level).
        ///
        /// # Errors
        /// Same as [`Reader::level`](super::Reader::level).
        pub fn level(&self, level_id: u8) -> Result<&Level, SwTilesError> {
            self.levels
                .iter()
                .find(|l| l.level_id == level_id)
                .ok_or(SwTilesError::LevelNotFound(level_id))
        }

        /// Async counterpart of [`Reader::get_tile`](super::Reader::get_tile).
        ///
        /// # Errors
        /// Same as [`Reader::get_tile`](super::Reader::get_tile).
        pub async fn get_tile(
            &self,
            level_id: u8,
            row: u32,
            col: u32,
        ) -> Result<Option<Tile>, SwTilesError> {
            let level = self.level(level_id)?;

            if row >= level.grid_rows || col >= level.grid_cols {
                return Ok(None);
            }

            let cell_offset = level.index_offset
                + (u64::from(row) * u64::from(level.grid_cols) + u64::from(col))
                    * INDEX_CELL_BYTES as u64;
            let cell_bytes = source_fetch(&self.source, cell_offset, INDEX_CELL_BYTES as u64).await?;
            check_truncated(cell_bytes.len(), INDEX_CELL_BYTES)?;

            let cell_array: [u8; INDEX_CELL_BYTES] = cell_bytes[0..INDEX_CELL_BYTES]
                .try_into()
                .expect("length checked above");
            let (offset, length) = decode_index_cell(&cell_array);

            if length == 0 {
                return Ok(None);
            }

            let bytes = source_fetch(&self.source, level.data_offset + offset, u64::from(length))
                .await?;
            check_truncated(bytes.len(), length as usize)?;

            Ok(Some(Tile {
                bytes,
                media_type: self.header.image_format.media_type(),
                bounds: cell_to_bounds(level, row, col),
            }))
        }

        /// Async counterpart of
        /// [`Reader::get_tile_by_coord`](super::Reader::get_tile_by_coord).
        ///
        /// # Errors
        /// Same as [`Reader::get_tile_by_coord`](super::Reader::get_tile_by_coord).
        pub async fn get_tile_by_coord(
            &self,
            level_id: u8,
            easting: f64,
            northing: f64,
        ) -> Result<Option<Tile>, SwTilesError> {
            let level = self.level(level_id)?;
            let (row, col) = coord_to_cell(level, easting, northing);

            if row < 0
                || col < 0
                || row >= i64::from(level.grid_rows)
                || col >= i64::from(level.grid_cols)
            {
                return Ok(None);
            }

            #[allow(clippy::cast_sign_loss)]
            self.get_tile(level_id, row as u32, col as u32).await
        }
    }

    async fn source_fetch<S: AsyncByteSource>(
        source: &S,
        offset: u64,
        length: u64,
    ) -> Result<Vec<u8>, SwTilesError> {
        source.fetch_async(offset, length).await
    }

}

#[cfg(test)]
mod test {
    use super::*;
    use crate::writer::{HeaderPrototype, LevelPlan, Writer};
    use crate::{DataType, ImageFormat};
    use std::io::Cursor;

    fn archive_bytes(levels: Vec<LevelPlan>) -> Vec<u8> {
        let proto = HeaderPrototype {
            data_type: DataType::Raster,
            image_format: ImageFormat::Png,
            crs_epsg: 3857,
            tile_size_px: 256,
        };
        let mut buf = Cursor::new(Vec::<u8>::new());
        Writer::new(proto).write(levels, &mut buf).unwrap();
        buf.into_inner()
    }

    #[test]
    fn s1_single_empty_level_roundtrip() {
        let plan = LevelPlan::new(0, 1.0, 100.0, 0.0, 0.0, 2, 2);
        let bytes = archive_bytes(vec![plan]);

        let reader = Reader::open(LocalByteSource::from_cursor(bytes)).unwrap();
        let level = reader.level(0).unwrap();
        assert_eq!(level.tile_count, 0);

        for row in 0..2 {
            for col in 0..2 {
                assert_eq!(reader.get_tile(0, row, col).unwrap(), None);
            }
        }
    }

    #[test]
    fn s2_single_cell_roundtrip() {
        let plan = LevelPlan::new(0, 1.0, 100.0, 0.0, 0.0, 1, 1)
            .with_tiles(vec![(0, 0, vec![0xAA, 0xBB, 0xCC, 0xDD])]);
        let bytes = archive_bytes(vec![plan]);

        let reader = Reader::open(LocalByteSource::from_cursor(bytes)).unwrap();
        let tile = reader.get_tile(0, 0, 0).unwrap().unwrap();
        assert_eq!(tile.bytes, vec![0xAA, 0xBB, 0xCC, 0xDD]);
        assert_eq!(tile.bounds, (0.0, -100.0, 100.0, 0.0));
    }

    #[test]
    fn s4_coord_lookup() {
        let plan = LevelPlan::new(0, 500.0, 500_000.0, 265_000.0, 7_675_000.0, 2, 2).with_tiles(
            vec![(0, 0, vec![1]), (1, 1, vec![2])],
        );
        let bytes = archive_bytes(vec![plan]);
        let reader = Reader::open(LocalByteSource::from_cursor(bytes)).unwrap();

        assert_eq!(
            reader.coord_to_cell(0, 265_000.0 + 1.0, 7_675_000.0 - 1.0).unwrap(),
            (0, 0)
        );
        assert_eq!(
            reader
                .coord_to_cell(0, 265_000.0 + 500_001.0, 7_675_000.0 - 500_001.0)
                .unwrap(),
            (1, 1)
        );
    }

    #[test]
    fn index_completeness() {
        let plan = LevelPlan::new(0, 1.0, 10.0, 0.0, 0.0, 4, 4).with_tiles(vec![
            (0, 0, vec![1, 2]),
            (3, 3, vec![3, 4, 5]),
            (1, 2, vec![6]),
        ]);
        let bytes = archive_bytes(vec![plan]);
        let reader = Reader::open(LocalByteSource::from_cursor(bytes)).unwrap();

        assert_eq!(reader.get_tile(0, 0, 0).unwrap().unwrap().bytes, vec![1, 2]);
        assert_eq!(reader.get_tile(0, 3, 3).unwrap().unwrap().bytes, vec![3, 4, 5]);
        assert_eq!(reader.get_tile(0, 1, 2).unwrap().unwrap().bytes, vec![6]);
        assert_eq!(reader.get_tile(0, 2, 2).unwrap(), None);
    }

    #[test]
    fn out_of_grid_cell_is_none_not_error() {
        let plan = LevelPlan::new(0, 1.0, 10.0, 0.0, 0.0, 2, 2);
        let bytes = archive_bytes(vec![plan]);
        let reader = Reader::open(LocalByteSource::from_cursor(bytes)).unwrap();
        assert_eq!(reader.get_tile(0, 99, 99).unwrap(), None);
    }

    #[test]
    fn get_tile_by_coord_out_of_grid_is_none() {
        let plan = LevelPlan::new(0, 1.0, 10.0, 0.0, 0.0, 2, 2).with_tiles(vec![(0, 0, vec![1])]);
        let bytes = archive_bytes(vec![plan]);
        let reader = Reader::open(LocalByteSource::from_cursor(bytes)).unwrap();
        assert_eq!(reader.get_tile_by_coord(0, 1_000_000.0, -1_000_000.0).unwrap(), None);
    }

    #[test]
    fn s6_bad_magic_rejected_at_open() {
        let mut bytes = archive_bytes(vec![LevelPlan::new(0, 1.0, 10.0, 0.0, 0.0, 1, 1)]);
        bytes[0..8].copy_from_slice(b"NOTATILE");

        let err = Reader::open(LocalByteSource::from_cursor(bytes)).unwrap_err();
        assert!(matches!(err, SwTilesError::BadMagic));
    }

    #[test]
    fn unknown_level_is_level_not_found() {
        let plan = LevelPlan::new(0, 1.0, 10.0, 0.0, 0.0, 1, 1);
        let bytes = archive_bytes(vec![plan]);
        let reader = Reader::open(LocalByteSource::from_cursor(bytes)).unwrap();
        assert!(matches!(
            reader.level(7),
            Err(SwTilesError::LevelNotFound(7))
        ));
    }

    struct RecordingSource {
        inner: LocalByteSource<Cursor<Vec<u8>>>,
        fetches: std::sync::Mutex<Vec<(u64, u64)>>,
    }

    impl ByteSource for RecordingSource {
        fn fetch(&self, offset: u64, length: u64) -> Result<Vec<u8>, SwTilesError> {
            self.fetches.lock().unwrap().push((offset, length));
            self.inner.fetch(offset, length)
        }
    }

    #[test]
    fn s5_byte_traffic_bound() {
        let plan = LevelPlan::new(0, 1.0, 10.0, 0.0, 0.0, 2, 2).with_tiles(vec![(0, 0, vec![1, 2, 3])]);
        let bytes = archive_bytes(vec![plan]);

        let source = RecordingSource {
            inner: LocalByteSource::from_cursor(bytes),
            fetches: std::sync::Mutex::new(Vec::new()),
        };

        let reader = Reader::open(source).unwrap();
        assert_eq!(reader.source.fetches.lock().unwrap().len(), 2);

        reader.get_tile(0, 0, 0).unwrap();
        assert_eq!(reader.source.fetches.lock().unwrap().len(), 4);

        reader.get_tile(0, 1, 1).unwrap();
        assert_eq!(reader.source.fetches.lock().unwrap().len(), 5);
    }
}
