// src/atlas.rs

//! Glyph atlases: glyph id to texture-coordinate lookup.
//!
//! An atlas pairs a source image with one normalized [`UvRect`] per glyph
//! and the [`BlendMode`] used to composite its texels. UVs are computed once
//! at construction, so resolving a glyph at draw time is a single index.
//!
//! Construction strategies:
//! - [`GlyphAtlas::grid`]: uniform cells, glyph `i` at cell `(i % cols, i / cols)`.
//! - [`GlyphAtlas::codepage`]: a 16x16 grid of 256 glyphs.
//! - [`GlyphAtlas::from_bounding_boxes`]: explicit pixel boxes per glyph.
//! - [`GlyphAtlas::from_raw_uvs`]: precomputed normalized quads.

use crate::blend::{BlendMode, Rgba};
use crate::error::{report, TileError};
use log::debug;
use serde::{Deserialize, Serialize};

/// Glyph ids are at most 16 bits wide.
pub const MAX_GLYPH_COUNT: usize = u16::MAX as usize + 1;

const CODEPAGE_GRID: u32 = 16;

/// Decoded pixels backing an atlas. Rows are tightly packed, top row first.
///
/// Channel counts: 1 (coverage, replicated to all four channels), 2 (grey +
/// alpha), 3 (RGB, opaque) or 4 (RGBA).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtlasImage {
    width: u32,
    height: u32,
    channel_count: u8,
    pixels: Vec<u8>,
}

impl AtlasImage {
    pub fn new(width: u32, height: u32, channel_count: u8, pixels: Vec<u8>) -> Result<Self, TileError> {
        if width == 0 || height == 0 {
            return Err(report(
                TileError::InvalidDimensions(format!("atlas image {}x{}", width, height)),
                "AtlasImage::new",
            ));
        }
        if !(1..=4).contains(&channel_count) {
            return Err(report(
                TileError::InvalidChannelCount(channel_count),
                "AtlasImage::new",
            ));
        }
        let expected = width as usize * height as usize * channel_count as usize;
        if pixels.len() != expected {
            return Err(report(
                TileError::InvalidDimensions(format!(
                    "atlas image needs {} bytes, got {}",
                    expected,
                    pixels.len()
                )),
                "AtlasImage::new",
            ));
        }
        Ok(Self {
            width,
            height,
            channel_count,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channel_count(&self) -> u8 {
        self.channel_count
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Texel at `(x, y)`, clamped to the image edge.
    pub fn texel(&self, x: u32, y: u32) -> Rgba {
        let x = x.min(self.width - 1) as usize;
        let y = y.min(self.height - 1) as usize;
        let channels = self.channel_count as usize;
        let start = (y * self.width as usize + x) * channels;
        match &self.pixels[start..start + channels] {
            [v] => Rgba::new(*v, *v, *v, *v),
            [v, a] => Rgba::new(*v, *v, *v, *a),
            [r, g, b] => Rgba::opaque(*r, *g, *b),
            [r, g, b, a] => Rgba::new(*r, *g, *b, *a),
            _ => Rgba::TRANSPARENT,
        }
    }

    /// Nearest texel to a normalized coordinate.
    pub fn sample(&self, u: f32, v: f32) -> Rgba {
        let x = (u * self.width as f32).floor().max(0.0) as u32;
        let y = (v * self.height as f32).floor().max(0.0) as u32;
        self.texel(x, y)
    }
}

/// A glyph's quad in normalized texture space. Also known as S, T, P, Q.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UvRect {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl UvRect {
    pub const fn new(left: f32, right: f32, top: f32, bottom: f32) -> Self {
        Self {
            left,
            right,
            top,
            bottom,
        }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.left, self.right, self.top, self.bottom]
    }
}

/// What a draw does with a glyph id the atlas has no entry for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OutOfRangeGlyph {
    /// Draw glyph 0 instead.
    #[default]
    ClampToZero,
    /// Draw the highest valid glyph instead.
    ClampToLast,
    /// Draw nothing for that tile.
    Transparent,
}

/// How the atlas's UVs were produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtlasKind {
    Grid {
        cell_width: u32,
        cell_height: u32,
        columns: u32,
        rows: u32,
    },
    Coordinate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlyphAtlas {
    image: AtlasImage,
    kind: AtlasKind,
    uvs: Vec<UvRect>,
    blend_mode: BlendMode,
    out_of_range: OutOfRangeGlyph,
}

impl GlyphAtlas {
    /// Uniform grid of `cell_width` x `cell_height` cells. Partial cells at
    /// the right and bottom edges are ignored.
    pub fn grid(
        image: AtlasImage,
        cell_width: u32,
        cell_height: u32,
        blend_mode: BlendMode,
    ) -> Result<Self, TileError> {
        Self::build_grid(image, cell_width, cell_height, blend_mode, "GlyphAtlas::grid")
    }

    /// The classic 16x16 code page layout: 256 glyphs, image sides must be
    /// multiples of 16.
    pub fn codepage(image: AtlasImage, blend_mode: BlendMode) -> Result<Self, TileError> {
        let (width, height) = (image.width(), image.height());
        if width % CODEPAGE_GRID != 0 || height % CODEPAGE_GRID != 0 {
            return Err(report(
                TileError::InvalidCodepageDimensions { width, height },
                "GlyphAtlas::codepage",
            ));
        }
        Self::build_grid(
            image,
            width / CODEPAGE_GRID,
            height / CODEPAGE_GRID,
            blend_mode,
            "GlyphAtlas::codepage",
        )
    }

    fn build_grid(
        image: AtlasImage,
        cell_width: u32,
        cell_height: u32,
        blend_mode: BlendMode,
        location: &'static str,
    ) -> Result<Self, TileError> {
        if cell_width == 0 || cell_height == 0 {
            return Err(report(
                TileError::InvalidDimensions(format!("grid cell {}x{}", cell_width, cell_height)),
                location,
            ));
        }
        let columns = image.width() / cell_width;
        let rows = image.height() / cell_height;
        if columns == 0 || rows == 0 {
            return Err(report(
                TileError::InvalidDimensions(format!(
                    "grid cell {}x{} larger than image {}x{}",
                    cell_width,
                    cell_height,
                    image.width(),
                    image.height()
                )),
                location,
            ));
        }
        let glyph_count = columns as usize * rows as usize;
        check_glyph_count(glyph_count, location)?;

        let (width, height) = (image.width() as f32, image.height() as f32);
        let uvs = (0..glyph_count as u32)
            .map(|i| {
                let x = (i % columns) * cell_width;
                let y = (i / columns) * cell_height;
                UvRect::new(
                    x as f32 / width,
                    (x + cell_width) as f32 / width,
                    y as f32 / height,
                    (y + cell_height) as f32 / height,
                )
            })
            .collect();

        debug!(
            "Created grid atlas: {}x{} cells of {}x{} px, {} glyphs, {}",
            columns, rows, cell_width, cell_height, glyph_count, blend_mode
        );
        Ok(Self {
            image,
            kind: AtlasKind::Grid {
                cell_width,
                cell_height,
                columns,
                rows,
            },
            uvs,
            blend_mode,
            out_of_range: OutOfRangeGlyph::default(),
        })
    }

    /// `pixel_boxes` holds `left, right, top, bottom` for each glyph in turn.
    /// Boxes may overlap and need not follow any grid.
    pub fn from_bounding_boxes(
        image: AtlasImage,
        glyph_count: usize,
        pixel_boxes: &[u32],
        blend_mode: BlendMode,
    ) -> Result<Self, TileError> {
        const LOCATION: &str = "GlyphAtlas::from_bounding_boxes";
        check_glyph_count(glyph_count, LOCATION)?;
        check_quad_len(glyph_count, pixel_boxes.len(), LOCATION)?;

        let (width, height) = (image.width() as f32, image.height() as f32);
        let uvs = pixel_boxes
            .chunks_exact(4)
            .map(|b| {
                UvRect::new(
                    b[0] as f32 / width,
                    b[1] as f32 / width,
                    b[2] as f32 / height,
                    b[3] as f32 / height,
                )
            })
            .collect();
        debug!("Created bounding box atlas: {} glyphs, {}", glyph_count, blend_mode);
        Ok(Self::coordinate(image, uvs, blend_mode))
    }

    /// `uvs` holds already-normalized `left, right, top, bottom` per glyph.
    pub fn from_raw_uvs(
        image: AtlasImage,
        glyph_count: usize,
        uvs: &[f32],
        blend_mode: BlendMode,
    ) -> Result<Self, TileError> {
        const LOCATION: &str = "GlyphAtlas::from_raw_uvs";
        check_glyph_count(glyph_count, LOCATION)?;
        check_quad_len(glyph_count, uvs.len(), LOCATION)?;

        let uvs = uvs
            .chunks_exact(4)
            .map(|q| UvRect::new(q[0], q[1], q[2], q[3]))
            .collect();
        debug!("Created raw UV atlas: {} glyphs, {}", glyph_count, blend_mode);
        Ok(Self::coordinate(image, uvs, blend_mode))
    }

    fn coordinate(image: AtlasImage, uvs: Vec<UvRect>, blend_mode: BlendMode) -> Self {
        Self {
            image,
            kind: AtlasKind::Coordinate,
            uvs,
            blend_mode,
            out_of_range: OutOfRangeGlyph::default(),
        }
    }

    pub fn with_out_of_range(mut self, policy: OutOfRangeGlyph) -> Self {
        self.out_of_range = policy;
        self
    }

    pub fn set_out_of_range(&mut self, policy: OutOfRangeGlyph) {
        self.out_of_range = policy;
    }

    pub fn out_of_range(&self) -> OutOfRangeGlyph {
        self.out_of_range
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    pub fn set_blend_mode(&mut self, blend_mode: BlendMode) {
        debug!("Atlas blend mode {} -> {}", self.blend_mode, blend_mode);
        self.blend_mode = blend_mode;
    }

    pub fn glyph_count(&self) -> usize {
        self.uvs.len()
    }

    pub fn kind(&self) -> AtlasKind {
        self.kind
    }

    pub fn image(&self) -> &AtlasImage {
        &self.image
    }

    pub fn uvs(&self) -> &[UvRect] {
        &self.uvs
    }

    /// The UV quad for `glyph`, or `None` if the atlas has no such glyph.
    pub fn try_glyph_uv(&self, glyph: u16) -> Option<UvRect> {
        self.uvs.get(glyph as usize).copied()
    }

    /// The UV quad to draw for `glyph`, applying the out-of-range policy.
    /// `None` means the tile is not drawn.
    pub fn glyph_uv(&self, glyph: u16) -> Option<UvRect> {
        self.try_glyph_uv(glyph).or_else(|| match self.out_of_range {
            OutOfRangeGlyph::ClampToZero => self.uvs.first().copied(),
            OutOfRangeGlyph::ClampToLast => self.uvs.last().copied(),
            OutOfRangeGlyph::Transparent => None,
        })
    }
}

fn check_glyph_count(glyph_count: usize, location: &'static str) -> Result<(), TileError> {
    if glyph_count == 0 || glyph_count > MAX_GLYPH_COUNT {
        return Err(report(
            TileError::InvalidGlyphCount(format!(
                "{} glyphs, expected 1..={}",
                glyph_count, MAX_GLYPH_COUNT
            )),
            location,
        ));
    }
    Ok(())
}

fn check_quad_len(glyph_count: usize, len: usize, location: &'static str) -> Result<(), TileError> {
    if len != glyph_count * 4 {
        return Err(report(
            TileError::InvalidGlyphCount(format!(
                "{} glyphs need {} values, got {}",
                glyph_count,
                glyph_count * 4,
                len
            )),
            location,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests;
