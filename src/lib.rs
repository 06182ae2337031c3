// src/lib.rs

//! Tile batch encoding, glyph atlases, palettes and blend modes for
//! grid-of-glyphs renderers.
//!
//! The data flow is:
//!
//! ```text
//! DetailMode ─► TileBatch::new ─► set_tile / push_tile / push_tile_free
//!                                        │
//!            GlyphAtlas + Palette ───────┤
//!                                        ▼
//!                        draw::draw_batch ─► DrawBackend
//! ```
//!
//! Batches, atlases and palettes are plain data. Only the [`DrawBackend`]
//! implementation touches a graphics context; [`raster::SoftwareRasterizer`]
//! is a CPU implementation useful for tests and headless rendering.

pub mod atlas;
pub mod batch;
pub mod blend;
pub mod config;
pub mod context;
pub mod detail;
pub mod draw;
pub mod error;
pub mod palette;
pub mod raster;
pub mod tile;

pub use atlas::{AtlasImage, GlyphAtlas, OutOfRangeGlyph, UvRect};
pub use batch::TileBatch;
pub use blend::{BlendMode, Rgba};
pub use config::Config;
pub use context::{AtlasHandle, BatchHandle, Context, ContextId, PaletteHandle};
pub use detail::{ColorEncoding, DetailFlags, DetailMode, GlyphWidth, Layout};
pub use draw::{DestRect, DrawBackend, DrawCall};
pub use error::{clear_debug_callback, set_debug_callback, DebugReport, ErrorKind, TileError};
pub use palette::{combine_classic_color, split_classic_color, ClassicColor, Palette, TerminalPaletteSize};
pub use tile::{Tile, TileColors, TilePosition, TileRecord};
