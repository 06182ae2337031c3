// src/batch.rs

//! The tile batch: encoded tile records for one draw.
//!
//! A batch owns a flat byte buffer whose layout is fixed by its
//! [`DetailMode`]:
//!
//! - **Full**: `tiles_wide * tiles_tall` records, row-major, no position
//!   field. Written with [`TileBatch::set_tile`].
//! - **Sparse**: a growing list of records carrying `u16` grid coordinates.
//!   Written with [`TileBatch::push_tile`]. Duplicate coordinates are kept
//!   and the later record wins when drawn, unless the batch was created with
//!   dedupe enabled, in which case a push to an occupied cell overwrites the
//!   earlier record in place.
//! - **Free**: a growing list of records carrying `i32` pixel coordinates.
//!   Written with [`TileBatch::push_tile_free`]. `tiles_wide`/`tiles_tall`
//!   are the pixel size of each glyph, not a grid.
//!
//! The buffer is plain data with no tie to any atlas, palette or backend,
//! so batches can be built on one thread and drawn on another.

use crate::config::BatchConfig;
use crate::detail::{DetailMode, Layout};
use crate::error::{report, TileError};
use crate::tile::{decode_position, encode_position, Tile, TilePosition, TileRecord};
use log::{debug, trace};
use std::collections::HashMap;

/// Largest Sparse grid side; coordinates are stored as `u16`.
const MAX_SPARSE_EXTENT: u32 = u16::MAX as u32 + 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileBatch {
    mode: DetailMode,
    /// Cached `mode.bytes_per_tile()`; all offsets are multiples of it.
    bytes_per_tile: usize,
    tiles_wide: u32,
    tiles_tall: u32,
    data: Vec<u8>,
    /// Sparse dedupe only: occupied cell index to its record index. Grows
    /// with the number of distinct cells written, not with the grid.
    stencil: Option<HashMap<usize, usize>>,
    retain_capacity_on_clear: bool,
}

impl TileBatch {
    pub fn new(mode: DetailMode, tiles_wide: u32, tiles_tall: u32) -> Result<Self, TileError> {
        Self::with_config(mode, tiles_wide, tiles_tall, &BatchConfig::default())
    }

    /// Like [`TileBatch::new`], taking the mode as raw [`crate::DetailFlags`] bits.
    pub fn from_bits(bits: u32, tiles_wide: u32, tiles_tall: u32) -> Result<Self, TileError> {
        let mode = DetailMode::from_bits(bits)?;
        Self::new(mode, tiles_wide, tiles_tall)
    }

    pub fn with_config(
        mode: DetailMode,
        tiles_wide: u32,
        tiles_tall: u32,
        config: &BatchConfig,
    ) -> Result<Self, TileError> {
        const LOCATION: &str = "TileBatch::new";
        check_dimensions(mode.layout, tiles_wide, tiles_tall, LOCATION)?;
        let bytes_per_tile = mode.bytes_per_tile();

        let data = match mode.layout {
            Layout::Full => vec![0u8; full_len(tiles_wide, tiles_tall, bytes_per_tile, LOCATION)?],
            Layout::Sparse | Layout::Free => {
                Vec::with_capacity(config.sparse_reserve_tiles.saturating_mul(bytes_per_tile))
            }
        };
        let stencil = (mode.layout == Layout::Sparse && config.sparse_dedupe)
            .then(HashMap::new);

        debug!(
            "Created {} batch {}x{}, {} bytes per tile{}",
            mode,
            tiles_wide,
            tiles_tall,
            bytes_per_tile,
            if stencil.is_some() { ", dedupe" } else { "" }
        );
        Ok(Self {
            mode,
            bytes_per_tile,
            tiles_wide,
            tiles_tall,
            data,
            stencil,
            retain_capacity_on_clear: config.retain_capacity_on_clear,
        })
    }

    pub fn mode(&self) -> DetailMode {
        self.mode
    }

    pub fn bytes_per_tile(&self) -> usize {
        self.bytes_per_tile
    }

    /// Grid width, or glyph pixel width for Free batches.
    pub fn tiles_wide(&self) -> u32 {
        self.tiles_wide
    }

    /// Grid height, or glyph pixel height for Free batches.
    pub fn tiles_tall(&self) -> u32 {
        self.tiles_tall
    }

    /// Number of records in [`TileBatch::data`]. For Full batches this is
    /// always the grid area.
    pub fn tile_count(&self) -> usize {
        self.data.len() / self.bytes_per_tile
    }

    /// Records the buffer can hold without reallocating.
    pub fn capacity_tiles(&self) -> usize {
        self.data.capacity() / self.bytes_per_tile
    }

    pub fn is_deduplicating(&self) -> bool {
        self.stencil.is_some()
    }

    /// The encoded records, exactly as handed to a backend.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Reserves room for `additional` more records. No effect on Full batches.
    pub fn reserve(&mut self, additional: usize) {
        if self.mode.layout != Layout::Full {
            self.data
                .reserve(additional.saturating_mul(self.bytes_per_tile));
        }
    }

    /// Overwrites the tile at `(x, y)` of a Full batch.
    pub fn set_tile(&mut self, x: u32, y: u32, tile: Tile) -> Result<(), TileError> {
        const LOCATION: &str = "TileBatch::set_tile";
        self.expect_layout(Layout::Full, LOCATION)?;
        self.check_cell(x, y, LOCATION)?;
        tile.check(self.mode, LOCATION)?;

        let start = self.cell_index(x, y) * self.bytes_per_tile;
        tile.encode(self.mode, &mut self.data[start..start + self.bytes_per_tile]);
        trace!("set_tile ({}, {}) = {:?}", x, y, tile);
        Ok(())
    }

    /// Reads back the tile at `(x, y)` of a Full batch.
    pub fn tile(&self, x: u32, y: u32) -> Result<Tile, TileError> {
        const LOCATION: &str = "TileBatch::tile";
        self.expect_layout(Layout::Full, LOCATION)?;
        self.check_cell(x, y, LOCATION)?;
        let start = self.cell_index(x, y) * self.bytes_per_tile;
        Ok(Tile::decode(
            self.mode,
            &self.data[start..start + self.bytes_per_tile],
        ))
    }

    /// Appends a tile at grid cell `(x, y)` of a Sparse batch.
    pub fn push_tile(&mut self, x: u32, y: u32, tile: Tile) -> Result<(), TileError> {
        const LOCATION: &str = "TileBatch::push_tile";
        self.expect_layout(Layout::Sparse, LOCATION)?;
        self.check_cell(x, y, LOCATION)?;
        tile.check(self.mode, LOCATION)?;

        let cell = self.cell_index(x, y);
        let existing = self
            .stencil
            .as_ref()
            .and_then(|stencil| stencil.get(&cell).copied());
        let record = match existing {
            Some(record) => record,
            None => self.append_record(),
        };
        if let Some(stencil) = self.stencil.as_mut() {
            stencil.insert(cell, record);
        }
        self.write_record(record, tile, TilePosition::Cell { x, y });
        trace!("push_tile ({}, {}) = {:?} as record {}", x, y, tile, record);
        Ok(())
    }

    /// Appends a tile at pixel `(x, y)` of a Free batch. Any coordinate is
    /// accepted; clipping is the backend's job.
    pub fn push_tile_free(&mut self, x: i32, y: i32, tile: Tile) -> Result<(), TileError> {
        const LOCATION: &str = "TileBatch::push_tile_free";
        self.expect_layout(Layout::Free, LOCATION)?;
        tile.check(self.mode, LOCATION)?;

        let record = self.append_record();
        self.write_record(record, tile, TilePosition::Pixel { x, y });
        trace!("push_tile_free ({}, {}) = {:?}", x, y, tile);
        Ok(())
    }

    /// Decodes record `index`. Full batch records report their grid cell.
    pub fn record(&self, index: usize) -> Option<TileRecord> {
        let start = index.checked_mul(self.bytes_per_tile)?;
        let end = start.checked_add(self.bytes_per_tile)?;
        let bytes = self.data.get(start..end)?;
        let position = decode_position(self.mode, bytes).unwrap_or(TilePosition::Cell {
            x: (index % self.tiles_wide as usize) as u32,
            y: (index / self.tiles_wide as usize) as u32,
        });
        Some(TileRecord {
            position,
            tile: Tile::decode(self.mode, bytes),
        })
    }

    /// All records in draw order.
    pub fn records(&self) -> impl Iterator<Item = TileRecord> + '_ {
        (0..self.tile_count()).filter_map(move |i| self.record(i))
    }

    /// Full batches are zeroed in place; Sparse and Free batches drop every
    /// record.
    pub fn clear(&mut self) {
        match self.mode.layout {
            Layout::Full => self.data.fill(0),
            Layout::Sparse | Layout::Free => {
                self.data.clear();
                if !self.retain_capacity_on_clear {
                    self.data.shrink_to_fit();
                }
            }
        }
        if let Some(stencil) = self.stencil.as_mut() {
            stencil.clear();
        }
        debug!("Cleared {} batch", self.mode);
    }

    /// Changes the batch extent.
    ///
    /// - Full: the overlapping region is kept, new cells are zeroed.
    /// - Sparse: records outside the new grid are dropped.
    /// - Free: only the glyph pixel size changes; records are kept.
    ///
    /// With `retain_capacity == false` the buffer is shrunk to fit afterwards.
    pub fn resize(&mut self, tiles_wide: u32, tiles_tall: u32, retain_capacity: bool) -> Result<(), TileError> {
        const LOCATION: &str = "TileBatch::resize";
        check_dimensions(self.mode.layout, tiles_wide, tiles_tall, LOCATION)?;

        match self.mode.layout {
            Layout::Full => {
                let new_len = full_len(tiles_wide, tiles_tall, self.bytes_per_tile, LOCATION)?;
                let capacity = if retain_capacity {
                    new_len.max(self.data.capacity())
                } else {
                    new_len
                };
                let mut resized = Vec::with_capacity(capacity);
                resized.resize(new_len, 0);

                let row_bytes = tiles_wide.min(self.tiles_wide) as usize * self.bytes_per_tile;
                let old_stride = self.tiles_wide as usize * self.bytes_per_tile;
                let new_stride = tiles_wide as usize * self.bytes_per_tile;
                for y in 0..tiles_tall.min(self.tiles_tall) as usize {
                    let old_row = y * old_stride;
                    let new_row = y * new_stride;
                    resized[new_row..new_row + row_bytes]
                        .copy_from_slice(&self.data[old_row..old_row + row_bytes]);
                }
                self.data = resized;
            }
            Layout::Sparse => {
                let old = std::mem::take(&mut self.data);
                let mut kept = Vec::with_capacity(if retain_capacity { old.capacity() } else { old.len() });
                for record in old.chunks_exact(self.bytes_per_tile) {
                    if let Some(TilePosition::Cell { x, y }) = decode_position(self.mode, record) {
                        if x < tiles_wide && y < tiles_tall {
                            kept.extend_from_slice(record);
                        }
                    }
                }
                self.data = kept;
            }
            Layout::Free => {}
        }

        self.tiles_wide = tiles_wide;
        self.tiles_tall = tiles_tall;
        if !retain_capacity {
            self.data.shrink_to_fit();
        }
        if self.stencil.is_some() {
            self.rebuild_stencil();
        }
        debug!(
            "Resized {} batch to {}x{}, {} records",
            self.mode,
            tiles_wide,
            tiles_tall,
            self.tile_count()
        );
        Ok(())
    }

    fn rebuild_stencil(&mut self) {
        let mut stencil = HashMap::with_capacity(self.tile_count());
        for (index, record) in self.data.chunks_exact(self.bytes_per_tile).enumerate() {
            if let Some(TilePosition::Cell { x, y }) = decode_position(self.mode, record) {
                stencil.insert(self.cell_index(x, y), index);
            }
        }
        self.stencil = Some(stencil);
    }

    fn expect_layout(&self, expected: Layout, location: &'static str) -> Result<(), TileError> {
        if self.mode.layout != expected {
            return Err(report(
                TileError::WrongLayout {
                    expected,
                    actual: self.mode.layout,
                },
                location,
            ));
        }
        Ok(())
    }

    fn check_cell(&self, x: u32, y: u32, location: &'static str) -> Result<(), TileError> {
        if x >= self.tiles_wide || y >= self.tiles_tall {
            return Err(report(
                TileError::OutOfBoundsTileCoordinate {
                    x,
                    y,
                    tiles_wide: self.tiles_wide,
                    tiles_tall: self.tiles_tall,
                },
                location,
            ));
        }
        Ok(())
    }

    fn cell_index(&self, x: u32, y: u32) -> usize {
        y as usize * self.tiles_wide as usize + x as usize
    }

    /// Grows the live region by one zeroed record and returns its index.
    fn append_record(&mut self) -> usize {
        let index = self.tile_count();
        self.data.resize(self.data.len() + self.bytes_per_tile, 0);
        index
    }

    fn write_record(&mut self, index: usize, tile: Tile, position: TilePosition) {
        let start = index * self.bytes_per_tile;
        let record = &mut self.data[start..start + self.bytes_per_tile];
        tile.encode(self.mode, record);
        encode_position(self.mode, position, record);
    }
}

fn check_dimensions(layout: Layout, tiles_wide: u32, tiles_tall: u32, location: &'static str) -> Result<(), TileError> {
    if tiles_wide == 0 || tiles_tall == 0 {
        return Err(report(
            TileError::InvalidDimensions(format!("batch {}x{}", tiles_wide, tiles_tall)),
            location,
        ));
    }
    if layout == Layout::Sparse && (tiles_wide > MAX_SPARSE_EXTENT || tiles_tall > MAX_SPARSE_EXTENT) {
        return Err(report(
            TileError::InvalidDimensions(format!(
                "sparse batch {}x{} exceeds {} cells per side",
                tiles_wide, tiles_tall, MAX_SPARSE_EXTENT
            )),
            location,
        ));
    }
    Ok(())
}

fn full_len(tiles_wide: u32, tiles_tall: u32, bytes_per_tile: usize, location: &'static str) -> Result<usize, TileError> {
    (tiles_wide as usize)
        .checked_mul(tiles_tall as usize)
        .and_then(|cells| cells.checked_mul(bytes_per_tile))
        .ok_or_else(|| {
            report(
                TileError::InvalidDimensions(format!("batch {}x{} overflows", tiles_wide, tiles_tall)),
                location,
            )
        })
}
