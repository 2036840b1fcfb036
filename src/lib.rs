//! # `swtiles`
//!
//! A low level implementation of the SWTILES format: a single-file binary
//! archive for georeferenced raster tile pyramids, designed to be served from
//! object storage and consumed directly by clients via HTTP range requests.
//!
//! An archive colocates a fixed header, a per-level metadata table, a dense
//! spatial index and concatenated opaque image payloads, so that any tile at
//! any level can be retrieved in exactly two range requests: one for its
//! 8-byte index entry, one for the tile bytes.
//!
//! This crate covers three things:
//! - the [`header`] / [`level`] / [`index_cell`] codec: pure, allocation-free
//!   functions that encode and decode the format's fixed-layout records
//! - the [`writer`] module: assembles an archive from a declared set of
//!   per-level tile iterators in a single streaming pass
//! - the [`reader`] module: random access over a local file or a
//!   range-capable HTTP endpoint, including the coordinate arithmetic that
//!   maps georeferenced positions to grid cells and back
//!
//! ## Examples
//!
//! ### Writing an archive
//! ```rust
//! use swtiles::{DataType, ImageFormat, HeaderPrototype, LevelPlan, Writer};
//! use std::io::Cursor;
//!
//! let proto = HeaderPrototype {
//!     data_type: DataType::Raster,
//!     image_format: ImageFormat::Png,
//!     crs_epsg: 3857,
//!     tile_size_px: 256,
//! };
//!
//! let plan = LevelPlan::new(0, 100.0, 25600.0, 0.0, 0.0, 1, 1)
//!     .with_tiles(vec![(0, 0, vec![0xAA, 0xBB, 0xCC, 0xDD])]);
//!
//! let mut buf = Cursor::new(Vec::<u8>::new());
//! Writer::new(proto).write(vec![plan], &mut buf).unwrap();
//! ```
//!
//! ### Reading an archive
//! ```rust
//! # use swtiles::{DataType, ImageFormat, HeaderPrototype, LevelPlan, Writer};
//! # use std::io::Cursor;
//! # let proto = HeaderPrototype { data_type: DataType::Raster, image_format: ImageFormat::Png, crs_epsg: 3857, tile_size_px: 256 };
//! # let plan = LevelPlan::new(0, 100.0, 25600.0, 0.0, 0.0, 1, 1).with_tiles(vec![(0, 0, vec![0xAA, 0xBB, 0xCC, 0xDD])]);
//! # let mut buf = Cursor::new(Vec::<u8>::new());
//! # Writer::new(proto).write(vec![plan], &mut buf).unwrap();
//! use swtiles::reader::{LocalByteSource, Reader};
//!
//! let source = LocalByteSource::from_cursor(buf.into_inner());
//! let mut reader = Reader::open(source).unwrap();
//! let tile = reader.get_tile(0, 0, 0).unwrap();
//! assert!(tile.is_some());
//! ```

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod error;
pub mod header;
pub mod index_cell;
pub mod level;

/// Pure coordinate arithmetic mapping georeferenced positions to grid cells and back.
pub mod coord;
pub mod reader;
pub mod writer;

pub use error::SwTilesError;
pub use header::{decode_header, encode_header, DataType, Header, ImageFormat, HEADER_BYTES};
pub use index_cell::{decode_index_cell, encode_index_cell};
pub use level::{decode_level_entry, encode_level_entry, Level, LEVEL_ENTRY_BYTES};
pub use reader::Reader;
pub use writer::{HeaderPrototype, LevelPlan, Writer};

#[cfg(feature = "async")]
pub use reader::AsyncReader;

/// File extension conventionally used for SWTILES archives.
pub const FILE_EXTENSION: &str = "swtiles";

/// Media type conventionally advertised for SWTILES archives themselves
/// (not the tiles they contain, see [`ImageFormat::media_type`]).
pub const MEDIA_TYPE: &str = "application/x-swtiles";

/// Format version this crate reads and writes. Archives with a different
/// version are rejected by [`decode_header`].
pub const FORMAT_VERSION: u16 = 2;

/// The literal 8-byte magic every archive starts with.
pub const MAGIC: &[u8; 8] = b"SWTILES\0";
