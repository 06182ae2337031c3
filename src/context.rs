// src/context.rs

//! Ownership registry for atlases, palettes and batches.
//!
//! A [`Context`] stands for one backend context. Resources inserted into it
//! are addressed through small `Copy` handles that remember which context
//! issued them and which generation of a slot they point at, so a handle
//! kept past `remove_*` or carried to another context is caught instead of
//! aliasing something else.

use crate::atlas::GlyphAtlas;
use crate::batch::TileBatch;
use crate::config::Config;
use crate::detail::DetailMode;
use crate::error::{report, TileError};
use crate::palette::Palette;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`Context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(u64);

impl ContextId {
    fn next() -> Self {
        ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Typed reference to a resource owned by a [`Context`].
pub struct Handle<T> {
    context: ContextId,
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

pub type AtlasHandle = Handle<GlyphAtlas>;
pub type PaletteHandle = Handle<Palette>;
pub type BatchHandle = Handle<TileBatch>;

impl<T> Handle<T> {
    pub fn context(&self) -> ContextId {
        self.context
    }
}

// Manual impls: derives would demand `T: Clone` and friends.
impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.context == other.context && self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Handle({}:{}@{})",
            self.context, self.index, self.generation
        )
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Generation-checked arena.
struct Slots<T> {
    entries: Vec<Slot<T>>,
    free: Vec<u32>,
}

impl<T> Slots<T> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            free: Vec::new(),
        }
    }

    fn insert(&mut self, context: ContextId, value: T) -> Handle<T> {
        let index = match self.free.pop() {
            Some(index) => {
                self.entries[index as usize].value = Some(value);
                index
            }
            None => {
                self.entries.push(Slot {
                    generation: 0,
                    value: Some(value),
                });
                (self.entries.len() - 1) as u32
            }
        };
        Handle {
            context,
            index,
            generation: self.entries[index as usize].generation,
            _marker: PhantomData,
        }
    }

    fn slot(&self, handle: Handle<T>) -> Option<&Slot<T>> {
        self.entries
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation && slot.value.is_some())
    }

    fn get(&self, handle: Handle<T>) -> Option<&T> {
        self.slot(handle).and_then(|slot| slot.value.as_ref())
    }

    fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.entries
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_mut())
    }

    fn remove(&mut self, handle: Handle<T>) -> Option<T> {
        self.slot(handle)?;
        let slot = &mut self.entries[handle.index as usize];
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        slot.value.take()
    }

    fn len(&self) -> usize {
        self.entries.len() - self.free.len()
    }
}

/// Owner of the atlases, palettes and batches drawn through one backend.
pub struct Context {
    id: ContextId,
    config: Config,
    atlases: Slots<GlyphAtlas>,
    palettes: Slots<Palette>,
    batches: Slots<TileBatch>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let id = ContextId::next();
        debug!("Created context {}", id);
        Self {
            id,
            config,
            atlases: Slots::new(),
            palettes: Slots::new(),
            batches: Slots::new(),
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn check_owner<T>(&self, handle: Handle<T>, location: &'static str) -> Result<(), TileError> {
        if handle.context != self.id {
            return Err(report(
                TileError::MismatchedContextOwnership {
                    owner: handle.context,
                    used: self.id,
                },
                location,
            ));
        }
        Ok(())
    }

    /// Takes ownership of `atlas`. The atlas adopts the configured
    /// out-of-range glyph policy; change it later through
    /// [`Context::atlas_mut`].
    pub fn insert_atlas(&mut self, atlas: GlyphAtlas) -> AtlasHandle {
        let atlas = atlas.with_out_of_range(self.config.atlas.out_of_range_glyph);
        self.atlases.insert(self.id, atlas)
    }

    pub fn atlas(&self, handle: AtlasHandle) -> Result<&GlyphAtlas, TileError> {
        const LOCATION: &str = "Context::atlas";
        self.check_owner(handle, LOCATION)?;
        self.atlases
            .get(handle)
            .ok_or_else(|| report(TileError::NullAtlas, LOCATION))
    }

    pub fn atlas_mut(&mut self, handle: AtlasHandle) -> Result<&mut GlyphAtlas, TileError> {
        const LOCATION: &str = "Context::atlas_mut";
        self.check_owner(handle, LOCATION)?;
        self.atlases
            .get_mut(handle)
            .ok_or_else(|| report(TileError::NullAtlas, LOCATION))
    }

    pub fn remove_atlas(&mut self, handle: AtlasHandle) -> Result<GlyphAtlas, TileError> {
        const LOCATION: &str = "Context::remove_atlas";
        self.check_owner(handle, LOCATION)?;
        self.atlases
            .remove(handle)
            .ok_or_else(|| report(TileError::NullAtlas, LOCATION))
    }

    pub fn insert_palette(&mut self, palette: Palette) -> PaletteHandle {
        self.palettes.insert(self.id, palette)
    }

    /// Inserts the standard terminal palette of the configured size.
    pub fn insert_terminal_palette(&mut self) -> PaletteHandle {
        let palette = Palette::terminal(self.config.palette.default_terminal_size);
        self.insert_palette(palette)
    }

    pub fn palette(&self, handle: PaletteHandle) -> Result<&Palette, TileError> {
        const LOCATION: &str = "Context::palette";
        self.check_owner(handle, LOCATION)?;
        self.palettes
            .get(handle)
            .ok_or_else(|| report(TileError::NullPalette, LOCATION))
    }

    pub fn palette_mut(&mut self, handle: PaletteHandle) -> Result<&mut Palette, TileError> {
        const LOCATION: &str = "Context::palette_mut";
        self.check_owner(handle, LOCATION)?;
        self.palettes
            .get_mut(handle)
            .ok_or_else(|| report(TileError::NullPalette, LOCATION))
    }

    pub fn remove_palette(&mut self, handle: PaletteHandle) -> Result<Palette, TileError> {
        const LOCATION: &str = "Context::remove_palette";
        self.check_owner(handle, LOCATION)?;
        self.palettes
            .remove(handle)
            .ok_or_else(|| report(TileError::NullPalette, LOCATION))
    }

    /// Creates a batch using the configured batch settings.
    pub fn create_batch(
        &mut self,
        mode: DetailMode,
        tiles_wide: u32,
        tiles_tall: u32,
    ) -> Result<BatchHandle, TileError> {
        let batch = TileBatch::with_config(mode, tiles_wide, tiles_tall, &self.config.batch)?;
        Ok(self.insert_batch(batch))
    }

    pub fn insert_batch(&mut self, batch: TileBatch) -> BatchHandle {
        self.batches.insert(self.id, batch)
    }

    pub fn batch(&self, handle: BatchHandle) -> Result<&TileBatch, TileError> {
        const LOCATION: &str = "Context::batch";
        self.check_owner(handle, LOCATION)?;
        self.batches
            .get(handle)
            .ok_or_else(|| report(TileError::NullBatch, LOCATION))
    }

    pub fn batch_mut(&mut self, handle: BatchHandle) -> Result<&mut TileBatch, TileError> {
        const LOCATION: &str = "Context::batch_mut";
        self.check_owner(handle, LOCATION)?;
        self.batches
            .get_mut(handle)
            .ok_or_else(|| report(TileError::NullBatch, LOCATION))
    }

    pub fn remove_batch(&mut self, handle: BatchHandle) -> Result<TileBatch, TileError> {
        const LOCATION: &str = "Context::remove_batch";
        self.check_owner(handle, LOCATION)?;
        self.batches
            .remove(handle)
            .ok_or_else(|| report(TileError::NullBatch, LOCATION))
    }

    /// Live `(atlases, palettes, batches)`.
    pub fn resource_counts(&self) -> (usize, usize, usize) {
        (self.atlases.len(), self.palettes.len(), self.batches.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::{AtlasImage, OutOfRangeGlyph};
    use crate::blend::BlendMode;
    use crate::detail::{ColorEncoding, GlyphWidth, Layout};
    use crate::error::ErrorKind;
    use crate::palette::TerminalPaletteSize;
    use crate::tile::Tile;
    use test_log::test;

    fn atlas() -> GlyphAtlas {
        let image = AtlasImage::new(16, 16, 1, vec![255; 256]).unwrap();
        GlyphAtlas::grid(image, 8, 8, BlendMode::Normal).unwrap()
    }

    #[test]
    fn test_contexts_have_distinct_ids() {
        assert_ne!(Context::new().id(), Context::new().id());
    }

    #[test]
    fn test_removed_handle_is_null() {
        let mut ctx = Context::new();
        let handle = ctx.insert_atlas(atlas());
        assert_eq!(ctx.atlas(handle).unwrap().glyph_count(), 4);

        ctx.remove_atlas(handle).unwrap();
        assert_eq!(ctx.atlas(handle).unwrap_err().kind(), ErrorKind::NullAtlas);
        assert_eq!(ctx.remove_atlas(handle).unwrap_err().kind(), ErrorKind::NullAtlas);
    }

    // Contract: a recycled slot does not revive handles to its old occupant.
    #[test]
    fn test_recycled_slot_rejects_stale_handle() {
        let mut ctx = Context::new();
        let first = ctx.insert_palette(Palette::terminal(TerminalPaletteSize::Ansi16));
        ctx.remove_palette(first).unwrap();
        let second = ctx.insert_palette(Palette::terminal(TerminalPaletteSize::Xterm88));

        assert_ne!(first, second);
        assert_eq!(ctx.palette(first).unwrap_err().kind(), ErrorKind::NullPalette);
        assert!(ctx.palette_mut(first).is_err());
        assert_eq!(ctx.palette(second).unwrap().color_count(), 88);
        assert_eq!(ctx.resource_counts(), (0, 1, 0));
    }

    #[test]
    fn test_foreign_handle_is_mismatched() {
        let mut ours = Context::new();
        let theirs = Context::new();
        let handle = ours.insert_atlas(atlas());
        let err = theirs.atlas(handle).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MismatchedContextOwnership);
        assert_eq!(
            err,
            TileError::MismatchedContextOwnership {
                owner: ours.id(),
                used: theirs.id()
            }
        );
    }

    #[test]
    fn test_config_flows_into_resources() {
        let mut config = Config::default();
        config.atlas.out_of_range_glyph = OutOfRangeGlyph::Transparent;
        config.batch.sparse_dedupe = true;
        config.palette.default_terminal_size = TerminalPaletteSize::Ansi16;
        let mut ctx = Context::with_config(config);

        let atlas = ctx.insert_atlas(atlas());
        assert_eq!(ctx.atlas(atlas).unwrap().glyph_uv(99), None);

        let palette = ctx.insert_terminal_palette();
        assert_eq!(ctx.palette(palette).unwrap().color_count(), 16);

        let mode = DetailMode::new(GlyphWidth::G8, ColorEncoding::C0, Layout::Sparse);
        let batch = ctx.create_batch(mode, 4, 4).unwrap();
        assert!(ctx.batch(batch).unwrap().is_deduplicating());
    }

    #[test]
    fn test_batch_handles_allow_mutation() {
        let mut ctx = Context::new();
        let mode = DetailMode::new(GlyphWidth::G8, ColorEncoding::C0, Layout::Full);
        let handle = ctx.create_batch(mode, 2, 2).unwrap();
        ctx.batch_mut(handle).unwrap().set_tile(1, 1, Tile::plain(5)).unwrap();
        assert_eq!(ctx.batch(handle).unwrap().tile(1, 1).unwrap(), Tile::plain(5));

        let batch = ctx.remove_batch(handle).unwrap();
        assert_eq!(batch.tile_count(), 4);
        assert_eq!(ctx.batch(handle).unwrap_err().kind(), ErrorKind::NullBatch);
        assert!(ctx.create_batch(mode, 0, 2).is_err());
    }
}
