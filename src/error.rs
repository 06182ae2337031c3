// src/error.rs

//! Error taxonomy for the tile layer and the process-wide debug channel.
//!
//! Every validation failure in this crate is local: the failing operation
//! returns `Err(TileError)` and leaves its target untouched. Before the error
//! is handed back it is also pushed through [`report`], which logs it at
//! `warn` level and forwards a [`DebugReport`] to the callback installed with
//! [`set_debug_callback`], if any.
//!
//! The callback is a single global. Install it once during startup, before
//! batches or atlases are touched from several threads.

use crate::context::ContextId;
use crate::detail::{ColorEncoding, DetailMode, GlyphWidth, Layout};
use log::warn;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use thiserror::Error;

/// The category of a reported error, without any payload.
///
/// This is what travels over the debug channel; [`TileError`] carries the
/// details for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidDetailMode,
    NullBatch,
    NullAtlas,
    NullPalette,
    OutOfBoundsTileCoordinate,
    PaletteRequiredButMissing,
    MismatchedContextOwnership,
    InvalidDimensions,
    InvalidChannelCount,
    InvalidColorCount,
    InvalidColorIndex,
    InvalidGlyphCount,
    InvalidCodepageDimensions,
    InvalidBlendMode,
    IncompatibleBlendMode,
    MismatchedColorEncoding,
    GlyphOutOfRange,
    WrongLayout,
    UnknownName,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TileError {
    #[error("invalid detail mode bits {0:#06x}")]
    InvalidDetailMode(u32),
    #[error("batch handle does not refer to a live batch")]
    NullBatch,
    #[error("atlas handle does not refer to a live atlas")]
    NullAtlas,
    #[error("palette handle does not refer to a live palette")]
    NullPalette,
    #[error("tile ({x}, {y}) is outside the {tiles_wide}x{tiles_tall} grid")]
    OutOfBoundsTileCoordinate {
        x: u32,
        y: u32,
        tiles_wide: u32,
        tiles_tall: u32,
    },
    #[error("detail mode {0} requires a palette")]
    PaletteRequiredButMissing(DetailMode),
    #[error("resource belongs to context {owner}, used with context {used}")]
    MismatchedContextOwnership { owner: ContextId, used: ContextId },
    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),
    #[error("palette channel count must be 3 or 4, got {0}")]
    InvalidChannelCount(u8),
    #[error("palette color count must be 1..=256, got {0}")]
    InvalidColorCount(usize),
    #[error("classic color index must be 0..16, got {0}")]
    InvalidColorIndex(u8),
    #[error("invalid glyph count: {0}")]
    InvalidGlyphCount(String),
    #[error("code page atlas image {width}x{height} is not divisible into 16x16 cells")]
    InvalidCodepageDimensions { width: u32, height: u32 },
    #[error("invalid blend mode id {0}")]
    InvalidBlendMode(u8),
    #[error("blend mode {blend} cannot be used with color encoding {color}")]
    IncompatibleBlendMode {
        blend: crate::blend::BlendMode,
        color: ColorEncoding,
    },
    #[error("tile colors are {given}, batch expects {expected}")]
    MismatchedColorEncoding {
        expected: ColorEncoding,
        given: ColorEncoding,
    },
    #[error("glyph {glyph} does not fit a {width} batch")]
    GlyphOutOfRange { glyph: u16, width: GlyphWidth },
    #[error("operation needs a {expected} batch, this one is {actual}")]
    WrongLayout { expected: Layout, actual: Layout },
    #[error("unknown name {0:?}")]
    UnknownName(String),
}

impl TileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TileError::InvalidDetailMode(_) => ErrorKind::InvalidDetailMode,
            TileError::NullBatch => ErrorKind::NullBatch,
            TileError::NullAtlas => ErrorKind::NullAtlas,
            TileError::NullPalette => ErrorKind::NullPalette,
            TileError::OutOfBoundsTileCoordinate { .. } => ErrorKind::OutOfBoundsTileCoordinate,
            TileError::PaletteRequiredButMissing(_) => ErrorKind::PaletteRequiredButMissing,
            TileError::MismatchedContextOwnership { .. } => ErrorKind::MismatchedContextOwnership,
            TileError::InvalidDimensions(_) => ErrorKind::InvalidDimensions,
            TileError::InvalidChannelCount(_) => ErrorKind::InvalidChannelCount,
            TileError::InvalidColorCount(_) => ErrorKind::InvalidColorCount,
            TileError::InvalidColorIndex(_) => ErrorKind::InvalidColorIndex,
            TileError::InvalidGlyphCount(_) => ErrorKind::InvalidGlyphCount,
            TileError::InvalidCodepageDimensions { .. } => ErrorKind::InvalidCodepageDimensions,
            TileError::InvalidBlendMode(_) => ErrorKind::InvalidBlendMode,
            TileError::IncompatibleBlendMode { .. } => ErrorKind::IncompatibleBlendMode,
            TileError::MismatchedColorEncoding { .. } => ErrorKind::MismatchedColorEncoding,
            TileError::GlyphOutOfRange { .. } => ErrorKind::GlyphOutOfRange,
            TileError::WrongLayout { .. } => ErrorKind::WrongLayout,
            TileError::UnknownName(_) => ErrorKind::UnknownName,
        }
    }
}

/// One message on the debug channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugReport {
    pub kind: ErrorKind,
    /// The public operation that failed, e.g. `"TileBatch::set_tile"`.
    pub location: &'static str,
}

type DebugCallback = Box<dyn Fn(&DebugReport) + Send + Sync>;

static DEBUG_CALLBACK: Lazy<RwLock<Option<DebugCallback>>> = Lazy::new(|| RwLock::new(None));

/// Installs the process-wide debug callback, replacing any previous one.
///
/// The callback runs synchronously on the thread that hit the error.
pub fn set_debug_callback<F>(callback: F)
where
    F: Fn(&DebugReport) + Send + Sync + 'static,
{
    match DEBUG_CALLBACK.write() {
        Ok(mut slot) => *slot = Some(Box::new(callback)),
        Err(poisoned) => *poisoned.into_inner() = Some(Box::new(callback)),
    }
}

/// Removes the debug callback. Errors are still logged.
pub fn clear_debug_callback() {
    match DEBUG_CALLBACK.write() {
        Ok(mut slot) => *slot = None,
        Err(poisoned) => *poisoned.into_inner() = None,
    }
}

/// Logs `error`, forwards it to the debug callback and hands it back so the
/// caller can return it: `return Err(report(err, "TileBatch::push_tile"))`.
pub(crate) fn report(error: TileError, location: &'static str) -> TileError {
    warn!("{}: {}", location, error);
    let debug_report = DebugReport {
        kind: error.kind(),
        location,
    };
    // A panicking callback poisons the lock; later reports still get logged.
    if let Ok(slot) = DEBUG_CALLBACK.read() {
        if let Some(callback) = slot.as_ref() {
            callback(&debug_report);
        }
    }
    error
}
