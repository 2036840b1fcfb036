//! Assembles an archive from a declared set of per-level tile iterators in a
//! single streaming pass, patching previously written regions once each
//! level's payload is known.

mod sink;

pub use sink::Sink;

use std::collections::HashSet;
use std::io::{Seek, Write};

use crate::header::{encode_header, DataType, Header, ImageFormat, HEADER_BYTES};
use crate::index_cell::{encode_index_cell, INDEX_CELL_BYTES};
use crate::level::{encode_level_entry, Level, LEVEL_ENTRY_BYTES};
use crate::SwTilesError;

/// The fields of the header that are fixed before any level is written.
#[derive(Debug, Clone, Copy)]
pub struct HeaderPrototype {
    /// What kind of data this archive's payloads represent.
    pub data_type: DataType,
    /// Image codec every payload is encoded with.
    pub image_format: ImageFormat,
    /// EPSG code of the CRS levels are expressed in.
    pub crs_epsg: u32,
    /// Pixel width (== height) shared by every payload.
    pub tile_size_px: u16,
}

/// One level's grid geometry plus the non-empty tiles to write for it.
pub struct LevelPlan {
    level_id: u8,
    resolution_m: f32,
    tile_extent_m: f32,
    origin_e: f64,
    origin_n: f64,
    grid_cols: u32,
    grid_rows: u32,
    tiles: Vec<(u32, u32, Vec<u8>)>,
}

impl LevelPlan {
    /// Declares a level's grid geometry. Call [`with_tiles`](Self::with_tiles)
    /// to attach the non-empty cells to write.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        level_id: u8,
        resolution_m: f32,
        tile_extent_m: f32,
        origin_e: f64,
        origin_n: f64,
        grid_cols: u32,
        grid_rows: u32,
    ) -> Self {
        Self {
            level_id,
            resolution_m,
            tile_extent_m,
            origin_e,
            origin_n,
            grid_cols,
            grid_rows,
            tiles: Vec::new(),
        }
    }

    /// Attaches the non-empty `(row, col, payload)` records for this level,
    /// in the order they will be written.
    #[must_use]
    pub fn with_tiles(mut self, tiles: Vec<(u32, u32, Vec<u8>)>) -> Self {
        self.tiles = tiles;
        self
    }
}

/// Assembles a valid archive from a header prototype and an ordered list of
/// level plans.
pub struct Writer {
    proto: HeaderPrototype,
}

impl Writer {
    /// Creates a writer that will stamp every archive it produces with the
    /// given header prototype.
    pub fn new(proto: HeaderPrototype) -> Self {
        Self { proto }
    }

    /// Writes an archive to `sink`, in the exact region order: header, level
    /// table, then for each level in plan order, its index followed by its
    /// payloads.
    ///
    /// # Errors
    /// Returns [`SwTilesError::TooManyLevels`] if more than 255 level plans
    /// are given, [`SwTilesError::CellOutOfGrid`] if a tile's `(row, col)`
    /// falls outside its level's declared grid,
    /// [`SwTilesError::DuplicateCell`] if the same `(level, row, col)` is
    /// written twice, [`SwTilesError::PayloadTooLarge`] if a single payload
    /// reaches 2^24 bytes, [`SwTilesError::LevelPayloadTooLarge`] if a
    /// level's cumulative payload reaches 2^40 bytes, or
    /// [`SwTilesError::SinkFailed`] if the sink rejects a write or seek.
    pub fn write(&self, levels: Vec<LevelPlan>, sink: &mut impl Sink) -> Result<(), SwTilesError> {
        let num_levels = levels.len();
        if num_levels > 255 {
            return Err(SwTilesError::TooManyLevels(num_levels));
        }

        let level_table_offset = HEADER_BYTES as u64;
        let level_table_len = num_levels as u64 * LEVEL_ENTRY_BYTES as u64;

        // Reserve space for the header and level table; both are patched at the end.
        sink.write(&vec![0u8; HEADER_BYTES])?;
        sink.write(&vec![0u8; level_table_len as usize])?;

        let mut bounds: Option<(f64, f64, f64, f64)> = None;
        let mut level_entries = Vec::with_capacity(num_levels);

        for plan in levels {
            let (entry, level_bounds) = self.write_level(sink, &plan)?;
            if let Some(level_bounds) = level_bounds {
                bounds = Some(match bounds {
                    None => level_bounds,
                    Some((min_e, min_n, max_e, max_n)) => (
                        min_e.min(level_bounds.0),
                        min_n.min(level_bounds.1),
                        max_e.max(level_bounds.2),
                        max_n.max(level_bounds.3),
                    ),
                });
            }
            level_entries.push(entry);
        }

        tracing::debug!(num_levels, "wrote level table");

        let (bounds_min_e, bounds_min_n, bounds_max_e, bounds_max_n) =
            bounds.unwrap_or((0.0, 0.0, 0.0, 0.0));

        let header = Header {
            data_type: self.proto.data_type,
            image_format: self.proto.image_format,
            crs_epsg: self.proto.crs_epsg,
            bounds_min_e,
            bounds_min_n,
            bounds_max_e,
            bounds_max_n,
            tile_size_px: self.proto.tile_size_px,
            num_levels: num_levels as u8,
            level_table_offset,
        };
        sink.write_at(0, &encode_header(&header))?;

        for (i, entry) in level_entries.iter().enumerate() {
            let offset = level_table_offset + i as u64 * LEVEL_ENTRY_BYTES as u64;
            sink.write_at(offset, &encode_level_entry(entry))?;
        }

        Ok(())
    }

    /// Reserves the index, streams payloads, then returns the level's table
    /// entry and its ground-space bounds, or `None` for the bounds if the
    /// level has no tiles and so contributes no ground extent. Patches only
    /// the index region; the level table entry is returned for the caller
    /// to patch once every level has been processed, since entries are laid
    /// out contiguously ahead of any level's data.
    fn write_level(
        &self,
        sink: &mut impl Sink,
        plan: &LevelPlan,
    ) -> Result<(Level, Option<(f64, f64, f64, f64)>), SwTilesError> {
        let num_cells = plan.grid_rows as u64 * plan.grid_cols as u64;
        let index_offset = sink.tell()?;
        let index_length = num_cells * INDEX_CELL_BYTES as u64;

        sink.write(&vec![0u8; index_length as usize])?;
        let data_offset = sink.tell()?;

        let mut cells = vec![(0u64, 0u32); num_cells as usize];
        let mut seen: HashSet<(u32, u32)> = HashSet::with_capacity(plan.tiles.len());
        let mut cursor = 0u64;
        let mut tile_count = 0u32;

        let extent = f64::from(plan.tile_extent_m);
        let mut bounds: Option<(f64, f64, f64, f64)> = None;

        for (row, col, payload) in &plan.tiles {
            if *row >= plan.grid_rows || *col >= plan.grid_cols {
                return Err(SwTilesError::CellOutOfGrid {
                    row: *row,
                    col: *col,
                    grid_rows: plan.grid_rows,
                    grid_cols: plan.grid_cols,
                });
            }

            if !seen.insert((*row, *col)) {
                return Err(SwTilesError::DuplicateCell {
                    level_id: plan.level_id,
                    row: *row,
                    col: *col,
                });
            }

            if payload.len() as u64 > u64::from(crate::index_cell::MAX_LENGTH) {
                return Err(SwTilesError::PayloadTooLarge(payload.len()));
            }
            #[allow(clippy::cast_possible_truncation)]
            let length = payload.len() as u32;

            if cursor > crate::index_cell::MAX_OFFSET
                || cursor + u64::from(length) > crate::index_cell::MAX_OFFSET + 1
            {
                return Err(SwTilesError::LevelPayloadTooLarge {
                    level_id: plan.level_id,
                });
            }

            let cell_index = *row as usize * plan.grid_cols as usize + *col as usize;
            cells[cell_index] = (cursor, length);

            sink.write(payload)?;
            cursor += u64::from(length);
            tile_count += 1;

            let min_e = plan.origin_e + f64::from(*col) * extent;
            let max_e = min_e + extent;
            let max_n = plan.origin_n - f64::from(*row) * extent;
            let min_n = max_n - extent;
            bounds = Some(match bounds {
                None => (min_e, min_n, max_e, max_n),
                Some((a, b, c, d)) => (a.min(min_e), b.min(min_n), c.max(max_e), d.max(max_n)),
            });
        }

        let mut patched = vec![0u8; index_length as usize];
        for (i, (offset, length)) in cells.iter().enumerate() {
            let cell_buf = encode_index_cell(*offset, *length)?;
            patched[i * INDEX_CELL_BYTES..(i + 1) * INDEX_CELL_BYTES].copy_from_slice(&cell_buf);
        }
        sink.write_at(index_offset, &patched)?;

        tracing::debug!(
            level_id = plan.level_id,
            tile_count,
            "wrote level payloads"
        );

        let entry = Level {
            level_id: plan.level_id,
            resolution_m: plan.resolution_m,
            tile_extent_m: plan.tile_extent_m,
            origin_e: plan.origin_e,
            origin_n: plan.origin_n,
            grid_cols: plan.grid_cols,
            grid_rows: plan.grid_rows,
            tile_count,
            index_offset,
            index_length,
            data_offset,
        };

        Ok((entry, bounds))
    }
}

/// Blanket [`Sink`] implementation for any `Write + Seek`, e.g. a
/// [`std::fs::File`] or a [`std::io::Cursor`].
impl<T: Write + Seek> Sink for T {
    fn write(&mut self, buf: &[u8]) -> Result<(), SwTilesError> {
        Write::write_all(self, buf).map_err(|e| SwTilesError::SinkFailed(e.to_string()))
    }

    fn tell(&mut self) -> Result<u64, SwTilesError> {
        self.stream_position()
            .map_err(|e| SwTilesError::SinkFailed(e.to_string()))
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<(), SwTilesError> {
        let current = self.tell()?;
        self.seek(std::io::SeekFrom::Start(offset))
            .map_err(|e| SwTilesError::SinkFailed(e.to_string()))?;
        Write::write_all(self, buf).map_err(|e| SwTilesError::SinkFailed(e.to_string()))?;
        self.seek(std::io::SeekFrom::Start(current))
            .map_err(|e| SwTilesError::SinkFailed(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    fn proto() -> HeaderPrototype {
        HeaderPrototype {
            data_type: DataType::Raster,
            image_format: ImageFormat::Png,
            crs_epsg: 3857,
            tile_size_px: 256,
        }
    }

    fn write_to_buf(levels: Vec<LevelPlan>) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::<u8>::new());
        Writer::new(proto()).write(levels, &mut buf).unwrap();
        buf.into_inner()
    }

    #[test]
    fn s1_single_empty_level() {
        let plan = LevelPlan::new(0, 1.0, 100.0, 0.0, 0.0, 2, 2);
        let bytes = write_to_buf(vec![plan]);
        assert_eq!(bytes.len(), 256 + 64 + 32);
    }

    #[test]
    fn s2_single_cell() {
        let plan = LevelPlan::new(0, 1.0, 100.0, 0.0, 0.0, 1, 1)
            .with_tiles(vec![(0, 0, vec![0xAA, 0xBB, 0xCC, 0xDD])]);
        let bytes = write_to_buf(vec![plan]);

        let index_offset = 256 + 64;
        let cell = &bytes[index_offset..index_offset + 8];
        let (offset, length) = crate::index_cell::decode_index_cell(cell.try_into().unwrap());
        assert_eq!((offset, length), (0, 4));

        let data_offset = index_offset + 8;
        assert_eq!(&bytes[data_offset..data_offset + 4], &[0xAA, 0xBB, 0xCC, 0xDD]);
    }

    #[test]
    fn s3_two_tile_order_independence() {
        let plan = LevelPlan::new(0, 1.0, 100.0, 0.0, 0.0, 2, 2)
            .with_tiles(vec![(0, 1, vec![0u8; 10]), (1, 0, vec![0u8; 20])]);
        let bytes = write_to_buf(vec![plan]);

        let index_offset = 256 + 64;
        let cell_at = |row: usize, col: usize| {
            let start = index_offset + (row * 2 + col) * 8;
            crate::index_cell::decode_index_cell(bytes[start..start + 8].try_into().unwrap())
        };

        assert_eq!(cell_at(0, 1), (0, 10));
        assert_eq!(cell_at(1, 0), (10, 20));
        assert_eq!(cell_at(0, 0), (0, 0));
        assert_eq!(cell_at(1, 1), (0, 0));
    }

    #[test]
    fn rejects_cell_out_of_grid() {
        let plan = LevelPlan::new(0, 1.0, 100.0, 0.0, 0.0, 1, 1)
            .with_tiles(vec![(5, 5, vec![1, 2, 3])]);
        let mut buf = Cursor::new(Vec::<u8>::new());
        let err = Writer::new(proto()).write(vec![plan], &mut buf).unwrap_err();
        assert!(matches!(err, SwTilesError::CellOutOfGrid { .. }));
    }

    #[test]
    fn rejects_duplicate_cell() {
        let plan = LevelPlan::new(0, 1.0, 100.0, 0.0, 0.0, 2, 2)
            .with_tiles(vec![(0, 0, vec![1]), (0, 0, vec![2])]);
        let mut buf = Cursor::new(Vec::<u8>::new());
        let err = Writer::new(proto()).write(vec![plan], &mut buf).unwrap_err();
        assert!(matches!(err, SwTilesError::DuplicateCell { .. }));
    }

    #[test]
    fn rejects_payload_too_large() {
        let plan = LevelPlan::new(0, 1.0, 100.0, 0.0, 0.0, 1, 1).with_tiles(vec![(
            0,
            0,
            vec![0u8; (crate::index_cell::MAX_LENGTH as usize) + 1],
        )]);
        let mut buf = Cursor::new(Vec::<u8>::new());
        let err = Writer::new(proto()).write(vec![plan], &mut buf).unwrap_err();
        assert!(matches!(err, SwTilesError::PayloadTooLarge(_)));
    }

    #[test]
    fn writes_reserved_bytes_as_zero() {
        let plan = LevelPlan::new(0, 1.0, 100.0, 0.0, 0.0, 1, 1)
            .with_tiles(vec![(0, 0, vec![1, 2, 3])]);
        let bytes = write_to_buf(vec![plan]);
        assert_eq!(bytes[51], 0);
        assert!(bytes[60..256].iter().all(|&b| b == 0));
        let level_entry_start = 256;
        assert_eq!(bytes[level_entry_start + 1], 0);
        assert_eq!(bytes[level_entry_start + 10], 0);
        assert_eq!(bytes[level_entry_start + 11], 0);
    }

    #[test]
    fn header_bounds_are_the_union_of_written_tiles() {
        let plan_a = LevelPlan::new(0, 1.0, 100.0, 0.0, 0.0, 2, 2)
            .with_tiles(vec![(0, 0, vec![1])]);
        let plan_b = LevelPlan::new(1, 1.0, 50.0, 1000.0, 1000.0, 2, 2)
            .with_tiles(vec![(1, 1, vec![2])]);
        let bytes = write_to_buf(vec![plan_a, plan_b]);
        let header = crate::header::decode_header(bytes[0..256].try_into().unwrap()).unwrap();

        assert_eq!(header.bounds_min_e, 0.0);
        assert_eq!(header.bounds_min_n, -100.0);
        assert_eq!(header.bounds_max_e, 1000.0 + 100.0);
        assert_eq!(header.bounds_max_n, 1000.0 - 50.0);
    }

    #[test]
    fn empty_level_does_not_pull_bounds_toward_zero() {
        let plan_a = LevelPlan::new(0, 1.0, 100.0, 265_000.0, 265_000.0, 2, 2)
            .with_tiles(vec![(0, 0, vec![1])]);
        let plan_b = LevelPlan::new(1, 1.0, 50.0, 0.0, 0.0, 2, 2);
        let bytes = write_to_buf(vec![plan_a, plan_b]);
        let header = crate::header::decode_header(bytes[0..256].try_into().unwrap()).unwrap();

        assert_eq!(header.bounds_min_e, 265_000.0);
        assert_eq!(header.bounds_max_e, 265_000.0 + 100.0);
        assert_eq!(header.bounds_min_n, 265_000.0 - 100.0);
        assert_eq!(header.bounds_max_n, 265_000.0);
    }

    #[test]
    fn all_levels_empty_yields_zero_bounds() {
        let plan = LevelPlan::new(0, 1.0, 100.0, 0.0, 0.0, 2, 2);
        let bytes = write_to_buf(vec![plan]);
        let header = crate::header::decode_header(bytes[0..256].try_into().unwrap()).unwrap();

        assert_eq!(
            (
                header.bounds_min_e,
                header.bounds_min_n,
                header.bounds_max_e,
                header.bounds_max_n
            ),
            (0.0, 0.0, 0.0, 0.0)
        );
    }

    #[test]
    fn rejects_more_than_255_levels() {
        let levels: Vec<LevelPlan> = (0..=255)
            .map(|i| LevelPlan::new(i as u8, 1.0, 100.0, 0.0, 0.0, 1, 1))
            .collect();
        let mut buf = Cursor::new(Vec::<u8>::new());
        let err = Writer::new(proto()).write(levels, &mut buf).unwrap_err();
        assert!(matches!(err, SwTilesError::TooManyLevels(256)));
    }
}
