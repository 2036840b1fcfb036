//! Mapping between georeferenced positions and grid cells, and back.
//!
//! Row increases southward (northing decreases): this matches image
//! coordinate convention rather than Cartesian convention, and every
//! function here uses `origin_n - row * extent` for a row's upper edge, not
//! `origin_n + row * extent`.

use crate::Level;

/// Maps a georeferenced position to the grid cell that contains it.
///
/// The returned `(row, col)` may lie outside `[0, grid_rows) x [0, grid_cols)`;
/// this function performs no bounds validation. Callers that need an
/// in-grid guarantee should check the result against `level.grid_rows` /
/// `level.grid_cols`, or use a reader's `get_tile_by_coord`.
pub fn coord_to_cell(level: &Level, easting: f64, northing: f64) -> (i64, i64) {
    let extent = f64::from(level.tile_extent_m);
    let col = ((easting - level.origin_e) / extent).floor() as i64;
    let row = ((level.origin_n - northing) / extent).floor() as i64;
    (row, col)
}

/// Maps a grid cell to the ground-space box it covers: `(min_e, min_n, max_e, max_n)`.
pub fn cell_to_bounds(level: &Level, row: u32, col: u32) -> (f64, f64, f64, f64) {
    let extent = f64::from(level.tile_extent_m);
    let min_e = level.origin_e + f64::from(col) * extent;
    let max_e = min_e + extent;
    let max_n = level.origin_n - f64::from(row) * extent;
    let min_n = max_n - extent;
    (min_e, min_n, max_e, max_n)
}

/// A single grid cell together with the ground-space box it covers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellBounds {
    /// Row of the cell.
    pub row: u32,
    /// Column of the cell.
    pub col: u32,
    /// Minimum easting of the cell's box.
    pub min_e: f64,
    /// Minimum northing of the cell's box.
    pub min_n: f64,
    /// Maximum easting of the cell's box.
    pub max_e: f64,
    /// Maximum northing of the cell's box.
    pub max_n: f64,
}

/// Computes the clamped, inclusive rectangle of cells overlapping a
/// ground-space view, by mapping the view's NW and SE corners through
/// [`coord_to_cell`] and clamping each axis to the level's grid.
///
/// Pure metadata arithmetic: never touches a byte source.
pub fn tiles_in_view(
    level: &Level,
    min_e: f64,
    min_n: f64,
    max_e: f64,
    max_n: f64,
) -> Vec<CellBounds> {
    if level.grid_rows == 0 || level.grid_cols == 0 {
        return Vec::new();
    }

    let (row_nw, col_nw) = coord_to_cell(level, min_e, max_n);
    let (row_se, col_se) = coord_to_cell(level, max_e, min_n);

    let clamp_row = |r: i64| -> u32 { r.clamp(0, i64::from(level.grid_rows) - 1) as u32 };
    let clamp_col = |c: i64| -> u32 { c.clamp(0, i64::from(level.grid_cols) - 1) as u32 };

    let row_start = clamp_row(row_nw.min(row_se));
    let row_end = clamp_row(row_nw.max(row_se));
    let col_start = clamp_col(col_nw.min(col_se));
    let col_end = clamp_col(col_nw.max(col_se));

    let mut cells = Vec::new();
    for row in row_start..=row_end {
        for col in col_start..=col_end {
            let (min_e, min_n, max_e, max_n) = cell_to_bounds(level, row, col);
            cells.push(CellBounds {
                row,
                col,
                min_e,
                min_n,
                max_e,
                max_n,
            });
        }
    }
    cells
}
