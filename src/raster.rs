// src/raster.rs

//! CPU reference backend.
//!
//! [`SoftwareRasterizer`] implements [`DrawBackend`] over an RGBA8
//! framebuffer held in memory. It samples atlas texels nearest-neighbor,
//! resolves tile colors through the palette and composites with
//! [`BlendMode::composite`](crate::blend::BlendMode::composite), then lays
//! the result over the existing framebuffer contents. Records are drawn in
//! buffer order, so later Sparse and Free records cover earlier ones.
//!
//! Full and Sparse tiles split the destination rectangle into a
//! `tiles_wide` x `tiles_tall` grid. Free tiles are `tiles_wide` x
//! `tiles_tall` pixels, placed at their pixel coordinate relative to the
//! destination's top-left corner. Everything is clipped to both the
//! destination and the framebuffer.

use crate::blend::Rgba;
use crate::context::{Context, ContextId};
use crate::detail::Layout;
use crate::draw::{DrawBackend, DrawCall};
use crate::tile::{decode_position, Tile, TilePosition};
use anyhow::Result;
use log::{debug, trace};

/// Half-open pixel span on both axes, in `i64` so Free coordinates near the
/// `i32` limits cannot overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PixelRect {
    left: i64,
    right: i64,
    top: i64,
    bottom: i64,
}

impl PixelRect {
    fn intersect(self, other: PixelRect) -> PixelRect {
        PixelRect {
            left: self.left.max(other.left),
            right: self.right.min(other.right),
            top: self.top.max(other.top),
            bottom: self.bottom.min(other.bottom),
        }
    }

    fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }
}

pub struct SoftwareRasterizer {
    context: ContextId,
    width: u32,
    height: u32,
    framebuffer: Vec<u8>,
}

impl SoftwareRasterizer {
    /// A transparent `width` x `height` framebuffer bound to `ctx`.
    pub fn new(ctx: &Context, width: u32, height: u32) -> Self {
        debug!("Created {}x{} software rasterizer for context {}", width, height, ctx.id());
        Self {
            context: ctx.id(),
            width,
            height,
            framebuffer: vec![0; width as usize * height as usize * 4],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// RGBA8 pixels, row-major, top row first.
    pub fn framebuffer(&self) -> &[u8] {
        &self.framebuffer
    }

    pub fn clear(&mut self, color: Rgba) {
        for pixel in self.framebuffer.chunks_exact_mut(4) {
            pixel.copy_from_slice(&color.to_bytes());
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let start = (y as usize * self.width as usize + x as usize) * 4;
        let p = &self.framebuffer[start..start + 4];
        Some(Rgba::new(p[0], p[1], p[2], p[3]))
    }

    fn bounds(&self) -> PixelRect {
        PixelRect {
            left: 0,
            right: self.width as i64,
            top: 0,
            bottom: self.height as i64,
        }
    }

    /// Where record `index` lands, before clipping.
    fn tile_rect(call: &DrawCall<'_>, index: usize, record: &[u8]) -> Option<PixelRect> {
        let dest = call.dest;
        let (wide, tall) = (call.tiles_wide as i64, call.tiles_tall as i64);
        let cell = |x: i64, y: i64| {
            let (dw, dh) = (dest.width(), dest.height());
            PixelRect {
                left: dest.left as i64 + x * dw / wide,
                right: dest.left as i64 + (x + 1) * dw / wide,
                top: dest.top as i64 + y * dh / tall,
                bottom: dest.top as i64 + (y + 1) * dh / tall,
            }
        };
        match (call.mode.layout, decode_position(call.mode, record)) {
            (Layout::Full, _) => Some(cell(index as i64 % wide, index as i64 / wide)),
            (Layout::Sparse, Some(TilePosition::Cell { x, y })) => Some(cell(x as i64, y as i64)),
            (Layout::Free, Some(TilePosition::Pixel { x, y })) => {
                let left = dest.left as i64 + x as i64;
                let top = dest.top as i64 + y as i64;
                Some(PixelRect {
                    left,
                    right: left + wide,
                    top,
                    bottom: top + tall,
                })
            }
            _ => None,
        }
    }

    fn draw_tile(&mut self, call: &DrawCall<'_>, tile: Tile, rect: PixelRect, clip: PixelRect) {
        let Some(uv) = call.atlas.glyph_uv(tile.glyph) else {
            trace!("Glyph {} not in atlas, skipped", tile.glyph);
            return;
        };
        let visible = rect.intersect(clip);
        if visible.is_empty() {
            return;
        }
        let (fg, bg) = tile.colors.resolve(call.palette);
        let blend = call.atlas.blend_mode();
        let image = call.atlas.image();
        let (rect_w, rect_h) = ((rect.right - rect.left) as f32, (rect.bottom - rect.top) as f32);

        for py in visible.top..visible.bottom {
            let fy = ((py - rect.top) as f32 + 0.5) / rect_h;
            let v = uv.top + fy * (uv.bottom - uv.top);
            for px in visible.left..visible.right {
                let fx = ((px - rect.left) as f32 + 0.5) / rect_w;
                let u = uv.left + fx * (uv.right - uv.left);
                let color = blend.composite(image.sample(u, v), fg, bg);

                let start = (py as usize * self.width as usize + px as usize) * 4;
                let dst = &mut self.framebuffer[start..start + 4];
                let out = color.over(Rgba::new(dst[0], dst[1], dst[2], dst[3]));
                dst.copy_from_slice(&out.to_bytes());
            }
        }
    }
}

impl DrawBackend for SoftwareRasterizer {
    fn context_id(&self) -> ContextId {
        self.context
    }

    fn target_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn draw_batch_data(&mut self, call: &DrawCall<'_>) -> Result<()> {
        let clip = self.bounds().intersect(PixelRect {
            left: call.dest.left as i64,
            right: call.dest.right as i64,
            top: call.dest.top as i64,
            bottom: call.dest.bottom as i64,
        });
        if clip.is_empty() {
            return Ok(());
        }
        let bytes_per_tile = call.mode.bytes_per_tile();
        for (index, record) in call.data.chunks_exact(bytes_per_tile).enumerate() {
            if let Some(rect) = Self::tile_rect(call, index, record) {
                self.draw_tile(call, Tile::decode(call.mode, record), rect, clip);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::{AtlasImage, GlyphAtlas};
    use crate::blend::BlendMode;
    use crate::detail::{ColorEncoding, DetailMode, GlyphWidth};
    use crate::draw::{draw_batch, DestRect};
    use crate::tile::TileColors;
    use crate::TileBatch;
    use test_log::test;

    /// Two 2x2 glyphs side by side: glyph 0 fully red, glyph 1 black.
    fn two_glyph_image() -> AtlasImage {
        #[rustfmt::skip]
        let pixels = vec![
            255, 0, 0, 255,  255, 0, 0, 255,  0, 0, 0, 255,  0, 0, 0, 255,
            255, 0, 0, 255,  255, 0, 0, 255,  0, 0, 0, 255,  0, 0, 0, 255,
        ];
        AtlasImage::new(4, 2, 4, pixels).unwrap()
    }

    #[test]
    fn test_full_batch_fg_red_mix() {
        let mut ctx = Context::new();
        let atlas = ctx.insert_atlas(GlyphAtlas::grid(two_glyph_image(), 2, 2, BlendMode::FgRed).unwrap());
        let mut raster = SoftwareRasterizer::new(&ctx, 4, 2);

        let mode = DetailMode::new(GlyphWidth::G8, ColorEncoding::C24, Layout::Full);
        let mut batch = TileBatch::new(mode, 2, 1).unwrap();
        let colors = TileColors::Rgb {
            fg: [0, 255, 0],
            bg: [0, 0, 255],
        };
        batch.set_tile(0, 0, Tile::new(0, colors)).unwrap();
        batch.set_tile(1, 0, Tile::new(1, colors)).unwrap();

        draw_batch(&mut raster, &ctx, atlas, None, &batch, None).unwrap();
        // Red texels pick the foreground, black ones the background.
        assert_eq!(raster.pixel(0, 0), Some(Rgba::opaque(0, 255, 0)));
        assert_eq!(raster.pixel(1, 1), Some(Rgba::opaque(0, 255, 0)));
        assert_eq!(raster.pixel(2, 0), Some(Rgba::opaque(0, 0, 255)));
        assert_eq!(raster.pixel(3, 1), Some(Rgba::opaque(0, 0, 255)));
    }

    #[test]
    fn test_free_tiles_clip_to_framebuffer() {
        let mut ctx = Context::new();
        let atlas = ctx.insert_atlas(GlyphAtlas::grid(two_glyph_image(), 2, 2, BlendMode::Normal).unwrap());
        let mut raster = SoftwareRasterizer::new(&ctx, 3, 3);

        let mode = DetailMode::new(GlyphWidth::G8, ColorEncoding::C0, Layout::Free);
        let mut batch = TileBatch::new(mode, 2, 2).unwrap();
        batch.push_tile_free(-1, -1, Tile::plain(0)).unwrap();
        batch.push_tile_free(i32::MAX, 0, Tile::plain(0)).unwrap();

        draw_batch(&mut raster, &ctx, atlas, None, &batch, None).unwrap();
        assert_eq!(raster.pixel(0, 0), Some(Rgba::opaque(255, 0, 0)));
        assert_eq!(raster.pixel(1, 0), Some(Rgba::TRANSPARENT));
        assert_eq!(raster.pixel(0, 1), Some(Rgba::TRANSPARENT));
    }

    #[test]
    fn test_extreme_dest_rect_is_clipped() {
        let mut ctx = Context::new();
        let atlas = ctx.insert_atlas(GlyphAtlas::grid(two_glyph_image(), 2, 2, BlendMode::Normal).unwrap());
        let mut raster = SoftwareRasterizer::new(&ctx, 4, 4);

        let mode = DetailMode::new(GlyphWidth::G8, ColorEncoding::C0, Layout::Full);
        let batch = TileBatch::new(mode, 1, 1).unwrap();
        let dest = DestRect::new(-10, i32::MAX, 0, 4);
        draw_batch(&mut raster, &ctx, atlas, None, &batch, Some(dest)).unwrap();

        // The single cell spans far past the framebuffer; its left edge samples glyph 0.
        assert_eq!(raster.pixel(0, 0), Some(Rgba::opaque(255, 0, 0)));
        assert_eq!(raster.pixel(3, 3), Some(Rgba::opaque(255, 0, 0)));
    }

    #[test]
    fn test_dest_rect_limits_drawing() {
        let mut ctx = Context::new();
        let atlas = ctx.insert_atlas(GlyphAtlas::grid(two_glyph_image(), 2, 2, BlendMode::Normal).unwrap());
        let mut raster = SoftwareRasterizer::new(&ctx, 4, 4);
        raster.clear(Rgba::opaque(9, 9, 9));

        let mode = DetailMode::new(GlyphWidth::G8, ColorEncoding::C0, Layout::Full);
        let batch = TileBatch::new(mode, 1, 1).unwrap();
        let dest = DestRect::new(2, 4, 2, 4);
        draw_batch(&mut raster, &ctx, atlas, None, &batch, Some(dest)).unwrap();

        assert_eq!(raster.pixel(1, 1), Some(Rgba::opaque(9, 9, 9)));
        assert_eq!(raster.pixel(2, 2), Some(Rgba::opaque(255, 0, 0)));
        assert_eq!(raster.pixel(3, 3), Some(Rgba::opaque(255, 0, 0)));
        assert_eq!(raster.pixel(4, 4), None);
    }
}
