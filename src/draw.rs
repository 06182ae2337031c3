// src/draw.rs

//! The boundary between encoded tile data and whatever turns it into pixels.
//!
//! A backend implements [`DrawBackend`] and receives fully validated
//! [`DrawCall`]s. The entry points in this module resolve handles against a
//! [`Context`] and guarantee, before the backend sees anything, that:
//!
//! - the backend, atlas and palette all belong to the same context,
//! - a palette is present whenever the detail mode is indexed,
//! - the atlas's blend mode suits the detail mode's color encoding,
//! - the tile bytes are exactly `bytes_per_tile * tiles_wide * tiles_tall`
//!   long for Full layouts and `bytes_per_tile * tile_count` otherwise.
//!
//! Any violation is reported on the debug channel and nothing is drawn.

use crate::atlas::GlyphAtlas;
use crate::batch::TileBatch;
use crate::context::{AtlasHandle, BatchHandle, Context, ContextId, PaletteHandle};
use crate::detail::{DetailMode, Layout};
use crate::error::{report, TileError};
use crate::palette::Palette;
use anyhow::Result;
use log::trace;

/// Target region in framebuffer pixels. `right` and `bottom` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DestRect {
    pub left: i32,
    pub right: i32,
    pub top: i32,
    pub bottom: i32,
}

impl DestRect {
    pub const fn new(left: i32, right: i32, top: i32, bottom: i32) -> Self {
        Self {
            left,
            right,
            top,
            bottom,
        }
    }

    /// The whole of a `width` x `height` target.
    pub const fn full(width: u32, height: u32) -> Self {
        Self::new(0, width as i32, 0, height as i32)
    }

    /// Signed span; `i64` so extreme edges cannot overflow.
    pub const fn width(&self) -> i64 {
        self.right as i64 - self.left as i64
    }

    pub const fn height(&self) -> i64 {
        self.bottom as i64 - self.top as i64
    }
}

/// One validated draw, as handed to a backend.
#[derive(Debug, Clone, Copy)]
pub struct DrawCall<'a> {
    pub atlas: &'a GlyphAtlas,
    /// Present iff `mode.has_palette()`.
    pub palette: Option<&'a Palette>,
    pub mode: DetailMode,
    pub tiles_wide: u32,
    pub tiles_tall: u32,
    pub tile_count: usize,
    pub data: &'a [u8],
    pub dest: DestRect,
}

/// Something that can rasterize tile data into a framebuffer.
///
/// Implementations own whatever per-context state they need (GPU textures,
/// a CPU framebuffer, recorded calls in tests). All validation has happened
/// by the time `draw_batch_data` runs, so implementations may index
/// `call.data` by `bytes_per_tile` without further checks.
pub trait DrawBackend {
    /// The context whose resources this backend may draw.
    fn context_id(&self) -> ContextId;

    /// Framebuffer size in pixels, used when no destination is given.
    fn target_size(&self) -> (u32, u32);

    /// Rasterizes one validated call.
    fn draw_batch_data(&mut self, call: &DrawCall<'_>) -> Result<()>;
}

/// Draws `batch` into `dest`, or the whole target when `dest` is `None`.
pub fn draw_batch<B: DrawBackend + ?Sized>(
    backend: &mut B,
    ctx: &Context,
    atlas: AtlasHandle,
    palette: Option<PaletteHandle>,
    batch: &TileBatch,
    dest: Option<DestRect>,
) -> Result<()> {
    draw_batch_data(
        backend,
        ctx,
        atlas,
        palette,
        batch.mode(),
        batch.tiles_wide(),
        batch.tiles_tall(),
        batch.tile_count(),
        batch.data(),
        dest,
    )
}

/// Like [`draw_batch`], for a batch owned by `ctx`.
pub fn draw_batch_handle<B: DrawBackend + ?Sized>(
    backend: &mut B,
    ctx: &Context,
    atlas: AtlasHandle,
    palette: Option<PaletteHandle>,
    batch: BatchHandle,
    dest: Option<DestRect>,
) -> Result<()> {
    let batch = ctx.batch(batch)?;
    draw_batch(backend, ctx, atlas, palette, batch, dest)
}

/// Draws raw tile bytes that were encoded elsewhere.
#[allow(clippy::too_many_arguments)]
pub fn draw_batch_data<B: DrawBackend + ?Sized>(
    backend: &mut B,
    ctx: &Context,
    atlas: AtlasHandle,
    palette: Option<PaletteHandle>,
    mode: DetailMode,
    tiles_wide: u32,
    tiles_tall: u32,
    tile_count: usize,
    data: &[u8],
    dest: Option<DestRect>,
) -> Result<()> {
    const LOCATION: &str = "draw_batch_data";

    if backend.context_id() != ctx.id() {
        return Err(report(
            TileError::MismatchedContextOwnership {
                owner: ctx.id(),
                used: backend.context_id(),
            },
            LOCATION,
        )
        .into());
    }
    let atlas = ctx.atlas(atlas)?;
    let palette = palette.map(|handle| ctx.palette(handle)).transpose()?;

    if mode.has_palette() && palette.is_none() {
        return Err(report(TileError::PaletteRequiredButMissing(mode), LOCATION).into());
    }
    if !mode.is_compatible_with(atlas.blend_mode()) {
        return Err(report(
            TileError::IncompatibleBlendMode {
                blend: atlas.blend_mode(),
                color: mode.color,
            },
            LOCATION,
        )
        .into());
    }
    if tiles_wide == 0 || tiles_tall == 0 {
        return Err(report(
            TileError::InvalidDimensions(format!("draw {}x{}", tiles_wide, tiles_tall)),
            LOCATION,
        )
        .into());
    }

    let records = match mode.layout {
        Layout::Full => (tiles_wide as usize).checked_mul(tiles_tall as usize),
        Layout::Sparse | Layout::Free => Some(tile_count),
    };
    let Some((records, expected)) =
        records.and_then(|records| Some((records, records.checked_mul(mode.bytes_per_tile())?)))
    else {
        return Err(report(
            TileError::InvalidDimensions(format!(
                "{} draw of {}x{} ({} records) overflows",
                mode, tiles_wide, tiles_tall, tile_count
            )),
            LOCATION,
        )
        .into());
    };
    if data.len() != expected {
        return Err(report(
            TileError::InvalidDimensions(format!(
                "{} tile data is {} bytes, expected {}",
                mode,
                data.len(),
                expected
            )),
            LOCATION,
        )
        .into());
    }
    if records == 0 {
        trace!("Skipping draw of empty {} batch", mode);
        return Ok(());
    }

    let (width, height) = backend.target_size();
    let call = DrawCall {
        atlas,
        palette: palette.filter(|_| mode.has_palette()),
        mode,
        tiles_wide,
        tiles_tall,
        tile_count: records,
        data,
        dest: dest.unwrap_or(DestRect::full(width, height)),
    };
    trace!(
        "Drawing {} records of {} into {:?}",
        call.tile_count,
        mode,
        call.dest
    );
    backend.draw_batch_data(&call)
}

#[cfg(test)]
pub mod mock;
