// src/draw/mock.rs

use crate::context::ContextId;
use crate::detail::DetailMode;
use crate::draw::{DestRect, DrawBackend, DrawCall};
use anyhow::Result;

/// What a [`MockBackend`] saw for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub mode: DetailMode,
    pub tiles_wide: u32,
    pub tiles_tall: u32,
    pub tile_count: usize,
    pub data: Vec<u8>,
    pub dest: DestRect,
    pub had_palette: bool,
    pub atlas_glyphs: usize,
}

pub struct MockBackend {
    context: ContextId,
    calls: Vec<RecordedCall>,
}

impl MockBackend {
    pub fn new(context: ContextId) -> Self {
        Self {
            context,
            calls: Vec::new(),
        }
    }

    pub fn calls(&self) -> &[RecordedCall] {
        &self.calls
    }
}

impl DrawBackend for MockBackend {
    fn context_id(&self) -> ContextId {
        self.context
    }

    fn target_size(&self) -> (u32, u32) {
        (800, 600) // Default 800x600 target
    }

    fn draw_batch_data(&mut self, call: &DrawCall<'_>) -> Result<()> {
        self.calls.push(RecordedCall {
            mode: call.mode,
            tiles_wide: call.tiles_wide,
            tiles_tall: call.tiles_tall,
            tile_count: call.tile_count,
            data: call.data.to_vec(),
            dest: call.dest,
            had_palette: call.palette.is_some(),
            atlas_glyphs: call.atlas.glyph_count(),
        });
        Ok(())
    }
}
