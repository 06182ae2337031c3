// src/tile.rs

//! Tile values and their binary record encoding.
//!
//! A record is laid out as
//!
//! ```text
//! [glyph: 1 | 2 bytes LE][color fields][position: none | 2 x u16 LE | 2 x i32 LE]
//! ```
//!
//! Color fields come foreground first. `C4` is a single classic color byte
//! (foreground index in the high nibble). `C24` is `fg rgb, bg rgb`, `C32` is
//! `fg rgba, bg rgba`. The `Nfg`/`Nbg` encodings store only the side they keep.

use crate::blend::Rgba;
use crate::detail::{ColorEncoding, DetailMode, GlyphWidth, Layout};
use crate::error::{report, TileError};
use crate::palette::{split_classic_color, Palette};
use serde::{Deserialize, Serialize};

/// The color fields of one tile. Each variant matches one [`ColorEncoding`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TileColors {
    /// `C0`: no colors.
    #[default]
    None,
    /// `C4`: packed classic color byte, see [`crate::palette::combine_classic_color`].
    Classic(u8),
    /// `C8`: foreground and background palette indices.
    Indexed { fg: u8, bg: u8 },
    /// `C8NBG`: foreground palette index only.
    IndexedFg(u8),
    /// `C8NFG`: background palette index only.
    IndexedBg(u8),
    /// `C24`
    Rgb { fg: [u8; 3], bg: [u8; 3] },
    /// `C24NBG`
    RgbFg([u8; 3]),
    /// `C24NFG`
    RgbBg([u8; 3]),
    /// `C32`
    Rgba { fg: [u8; 4], bg: [u8; 4] },
    /// `C32NBG`
    RgbaFg([u8; 4]),
    /// `C32NFG`
    RgbaBg([u8; 4]),
}

impl TileColors {
    pub const fn encoding(&self) -> ColorEncoding {
        match self {
            TileColors::None => ColorEncoding::C0,
            TileColors::Classic(_) => ColorEncoding::C4,
            TileColors::Indexed { .. } => ColorEncoding::C8,
            TileColors::IndexedFg(_) => ColorEncoding::C8Nbg,
            TileColors::IndexedBg(_) => ColorEncoding::C8Nfg,
            TileColors::Rgb { .. } => ColorEncoding::C24,
            TileColors::RgbFg(_) => ColorEncoding::C24Nbg,
            TileColors::RgbBg(_) => ColorEncoding::C24Nfg,
            TileColors::Rgba { .. } => ColorEncoding::C32,
            TileColors::RgbaFg(_) => ColorEncoding::C32Nbg,
            TileColors::RgbaBg(_) => ColorEncoding::C32Nfg,
        }
    }

    /// Writes the color fields. `out` is exactly `encoding().bytes()` long.
    fn write(&self, out: &mut [u8]) {
        match self {
            TileColors::None => {}
            TileColors::Classic(v) | TileColors::IndexedFg(v) | TileColors::IndexedBg(v) => {
                out[0] = *v
            }
            TileColors::Indexed { fg, bg } => {
                out[0] = *fg;
                out[1] = *bg;
            }
            TileColors::Rgb { fg, bg } => {
                out[..3].copy_from_slice(fg);
                out[3..].copy_from_slice(bg);
            }
            TileColors::RgbFg(c) | TileColors::RgbBg(c) => out.copy_from_slice(c),
            TileColors::Rgba { fg, bg } => {
                out[..4].copy_from_slice(fg);
                out[4..].copy_from_slice(bg);
            }
            TileColors::RgbaFg(c) | TileColors::RgbaBg(c) => out.copy_from_slice(c),
        }
    }

    /// Reads color fields written by [`TileColors::write`].
    fn read(encoding: ColorEncoding, bytes: &[u8]) -> Self {
        let rgb = |at: usize| [bytes[at], bytes[at + 1], bytes[at + 2]];
        let rgba = |at: usize| [bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]];
        match encoding {
            ColorEncoding::C0 => TileColors::None,
            ColorEncoding::C4 => TileColors::Classic(bytes[0]),
            ColorEncoding::C8 => TileColors::Indexed {
                fg: bytes[0],
                bg: bytes[1],
            },
            ColorEncoding::C8Nbg => TileColors::IndexedFg(bytes[0]),
            ColorEncoding::C8Nfg => TileColors::IndexedBg(bytes[0]),
            ColorEncoding::C24 => TileColors::Rgb {
                fg: rgb(0),
                bg: rgb(3),
            },
            ColorEncoding::C24Nbg => TileColors::RgbFg(rgb(0)),
            ColorEncoding::C24Nfg => TileColors::RgbBg(rgb(0)),
            ColorEncoding::C32 => TileColors::Rgba {
                fg: rgba(0),
                bg: rgba(4),
            },
            ColorEncoding::C32Nbg => TileColors::RgbaFg(rgba(0)),
            ColorEncoding::C32Nfg => TileColors::RgbaBg(rgba(0)),
        }
    }

    /// Resolves to `(foreground, background)`. A side the encoding omits, or
    /// a palette index with no entry, comes back transparent.
    pub fn resolve(&self, palette: Option<&Palette>) -> (Rgba, Rgba) {
        let indexed = |index: u8| {
            palette
                .and_then(|p| p.color(index))
                .unwrap_or(Rgba::TRANSPARENT)
        };
        let none = Rgba::TRANSPARENT;
        match *self {
            TileColors::None => (none, none),
            TileColors::Classic(byte) => {
                let (fg, bg) = split_classic_color(byte);
                (indexed(fg), indexed(bg))
            }
            TileColors::Indexed { fg, bg } => (indexed(fg), indexed(bg)),
            TileColors::IndexedFg(fg) => (indexed(fg), none),
            TileColors::IndexedBg(bg) => (none, indexed(bg)),
            TileColors::Rgb { fg, bg } => (Rgba::from_rgb(fg), Rgba::from_rgb(bg)),
            TileColors::RgbFg(fg) => (Rgba::from_rgb(fg), none),
            TileColors::RgbBg(bg) => (none, Rgba::from_rgb(bg)),
            TileColors::Rgba { fg, bg } => (Rgba::from_bytes(fg), Rgba::from_bytes(bg)),
            TileColors::RgbaFg(fg) => (Rgba::from_bytes(fg), none),
            TileColors::RgbaBg(bg) => (none, Rgba::from_bytes(bg)),
        }
    }
}

/// A glyph and its colors, independent of where it is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Tile {
    pub glyph: u16,
    pub colors: TileColors,
}

impl Tile {
    pub const fn new(glyph: u16, colors: TileColors) -> Self {
        Self { glyph, colors }
    }

    /// An uncolored (`C0`) tile.
    pub const fn plain(glyph: u16) -> Self {
        Self::new(glyph, TileColors::None)
    }

    /// Checks that this tile can be stored under `mode`.
    pub(crate) fn check(&self, mode: DetailMode, location: &'static str) -> Result<(), TileError> {
        if self.colors.encoding() != mode.color {
            return Err(report(
                TileError::MismatchedColorEncoding {
                    expected: mode.color,
                    given: self.colors.encoding(),
                },
                location,
            ));
        }
        if self.glyph > mode.glyph.max_glyph() {
            return Err(report(
                TileError::GlyphOutOfRange {
                    glyph: self.glyph,
                    width: mode.glyph,
                },
                location,
            ));
        }
        Ok(())
    }

    /// Writes glyph and color fields into the front of `record`.
    /// The tile must already have passed [`Tile::check`] for `mode`.
    pub(crate) fn encode(&self, mode: DetailMode, record: &mut [u8]) {
        let glyph_bytes = mode.glyph_bytes();
        match mode.glyph {
            GlyphWidth::G8 => record[0] = self.glyph as u8,
            GlyphWidth::G16 => record[..2].copy_from_slice(&self.glyph.to_le_bytes()),
        }
        self.colors
            .write(&mut record[glyph_bytes..glyph_bytes + mode.color_bytes()]);
    }

    /// Reads glyph and color fields from the front of `record`.
    pub fn decode(mode: DetailMode, record: &[u8]) -> Self {
        let glyph = match mode.glyph {
            GlyphWidth::G8 => record[0] as u16,
            GlyphWidth::G16 => u16::from_le_bytes([record[0], record[1]]),
        };
        let start = mode.glyph_bytes();
        let colors = TileColors::read(mode.color, &record[start..start + mode.color_bytes()]);
        Self { glyph, colors }
    }
}

/// Where a stored tile sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TilePosition {
    /// Grid cell, for Full and Sparse layouts.
    Cell { x: u32, y: u32 },
    /// Top-left pixel, for the Free layout.
    Pixel { x: i32, y: i32 },
}

/// A decoded tile together with its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileRecord {
    pub position: TilePosition,
    pub tile: Tile,
}

/// Writes the trailing position field of a Sparse or Free record.
/// Sparse coordinates must already be known to fit `u16`.
pub(crate) fn encode_position(mode: DetailMode, position: TilePosition, record: &mut [u8]) {
    let start = mode.glyph_bytes() + mode.color_bytes();
    let field = &mut record[start..start + mode.position_bytes()];
    match (mode.layout, position) {
        (Layout::Sparse, TilePosition::Cell { x, y }) => {
            field[..2].copy_from_slice(&(x as u16).to_le_bytes());
            field[2..].copy_from_slice(&(y as u16).to_le_bytes());
        }
        (Layout::Free, TilePosition::Pixel { x, y }) => {
            field[..4].copy_from_slice(&x.to_le_bytes());
            field[4..].copy_from_slice(&y.to_le_bytes());
        }
        _ => {}
    }
}

/// Reads the trailing position field. `None` for Full records, whose
/// position is implied by their index.
pub fn decode_position(mode: DetailMode, record: &[u8]) -> Option<TilePosition> {
    let start = mode.glyph_bytes() + mode.color_bytes();
    let field = &record[start..start + mode.position_bytes()];
    match mode.layout {
        Layout::Full => None,
        Layout::Sparse => Some(TilePosition::Cell {
            x: u16::from_le_bytes([field[0], field[1]]) as u32,
            y: u16::from_le_bytes([field[2], field[3]]) as u32,
        }),
        Layout::Free => Some(TilePosition::Pixel {
            x: i32::from_le_bytes([field[0], field[1], field[2], field[3]]),
            y: i32::from_le_bytes([field[4], field[5], field[6], field[7]]),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detail::ColorEncoding;
    use crate::palette::{combine_classic_color, TerminalPaletteSize};
    use test_log::test;

    // Contract: record bytes follow the documented field order exactly.
    #[test]
    fn test_c24_sparse_record_bytes() {
        let mode = DetailMode::new(GlyphWidth::G16, ColorEncoding::C24, Layout::Sparse);
        let tile = Tile::new(
            0x1234,
            TileColors::Rgb {
                fg: [1, 2, 3],
                bg: [4, 5, 6],
            },
        );
        let mut record = vec![0u8; mode.bytes_per_tile()];
        tile.encode(mode, &mut record);
        encode_position(mode, TilePosition::Cell { x: 0x0102, y: 7 }, &mut record);
        assert_eq!(
            record,
            vec![0x34, 0x12, 1, 2, 3, 4, 5, 6, 0x02, 0x01, 7, 0]
        );
        assert_eq!(Tile::decode(mode, &record), tile);
        assert_eq!(
            decode_position(mode, &record),
            Some(TilePosition::Cell { x: 0x0102, y: 7 })
        );
    }

    #[test]
    fn test_free_record_keeps_negative_pixels() {
        let mode = DetailMode::new(GlyphWidth::G8, ColorEncoding::C8Nfg, Layout::Free);
        let mut record = vec![0u8; mode.bytes_per_tile()];
        Tile::new(9, TileColors::IndexedBg(200)).encode(mode, &mut record);
        encode_position(mode, TilePosition::Pixel { x: -3, y: 70_000 }, &mut record);
        assert_eq!(&record[..2], &[9, 200]);
        assert_eq!(&record[2..6], &(-3i32).to_le_bytes());
        assert_eq!(
            decode_position(mode, &record),
            Some(TilePosition::Pixel { x: -3, y: 70_000 })
        );
    }

    #[test]
    fn test_check_rejects_wrong_encoding_and_wide_glyph() {
        let mode = DetailMode::new(GlyphWidth::G8, ColorEncoding::C4, Layout::Full);
        assert!(Tile::new(3, TileColors::Classic(0x12)).check(mode, "test").is_ok());
        assert!(matches!(
            Tile::plain(3).check(mode, "test"),
            Err(TileError::MismatchedColorEncoding { .. })
        ));
        assert!(matches!(
            Tile::new(256, TileColors::Classic(0)).check(mode, "test"),
            Err(TileError::GlyphOutOfRange { glyph: 256, .. })
        ));
    }

    #[test]
    fn test_every_encoding_has_a_variant_of_matching_size() {
        let samples = [
            TileColors::None,
            TileColors::Classic(1),
            TileColors::Indexed { fg: 1, bg: 2 },
            TileColors::IndexedBg(1),
            TileColors::IndexedFg(1),
            TileColors::Rgb {
                fg: [1; 3],
                bg: [2; 3],
            },
            TileColors::RgbBg([1; 3]),
            TileColors::RgbFg([1; 3]),
            TileColors::Rgba {
                fg: [1; 4],
                bg: [2; 4],
            },
            TileColors::RgbaBg([1; 4]),
            TileColors::RgbaFg([1; 4]),
        ];
        let encodings: Vec<_> = samples.iter().map(|c| c.encoding()).collect();
        assert_eq!(encodings, ColorEncoding::ALL.to_vec());
        for colors in samples {
            let mut out = vec![0u8; colors.encoding().bytes()];
            colors.write(&mut out);
            assert_eq!(TileColors::read(colors.encoding(), &out), colors);
        }
    }

    #[test]
    fn test_resolve_through_palette() {
        let palette = Palette::terminal(TerminalPaletteSize::Ansi16);
        let classic = TileColors::Classic(combine_classic_color(9, 0));
        assert_eq!(
            classic.resolve(Some(&palette)),
            (Rgba::opaque(255, 0, 0), Rgba::opaque(0, 0, 0))
        );
        // Index past the palette end and the omitted side are transparent.
        assert_eq!(
            TileColors::IndexedFg(200).resolve(Some(&palette)),
            (Rgba::TRANSPARENT, Rgba::TRANSPARENT)
        );
        assert_eq!(
            TileColors::RgbaBg([1, 2, 3, 4]).resolve(None),
            (Rgba::TRANSPARENT, Rgba::new(1, 2, 3, 4))
        );
    }
}
