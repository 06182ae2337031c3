// src/detail.rs

//! Detail Mode: the three-axis description of a batch's binary tile format.
//!
//! A [`DetailMode`] picks one glyph width, one color encoding and one layout.
//! Together they fix the size and field order of every tile record:
//!
//! ```text
//! [glyph: 1 | 2 bytes LE][color: 0..=8 bytes][position: 0 | 4 | 8 bytes]
//! ```
//!
//! The struct form cannot hold an invalid combination. The raw integer form
//! used at API boundaries is [`DetailFlags`]; converting it with
//! [`DetailMode::from_bits`] is where bad combinations get rejected.

use crate::blend::BlendMode;
use crate::error::{report, TileError};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

bitflags! {
    /// Raw bitset form of a detail mode. One bit per axis value.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct DetailFlags: u32 {
        const G8 = 1 << 0;
        const G16 = 1 << 1;
        const C0 = 1 << 2;
        const C4 = 1 << 3;
        const C8 = 1 << 4;
        const C8NFG = 1 << 5;
        const C8NBG = 1 << 6;
        const C24 = 1 << 7;
        const C24NFG = 1 << 8;
        const C24NBG = 1 << 9;
        const C32 = 1 << 10;
        const C32NFG = 1 << 11;
        const C32NBG = 1 << 12;
        const FULL = 1 << 13;
        const SPARSE = 1 << 14;
        const FREE = 1 << 15;
    }
}

impl DetailFlags {
    pub const GLYPH_AXIS: Self = Self::G8.union(Self::G16);
    pub const COLOR_AXIS: Self = Self::C0
        .union(Self::C4)
        .union(Self::C8)
        .union(Self::C8NFG)
        .union(Self::C8NBG)
        .union(Self::C24)
        .union(Self::C24NFG)
        .union(Self::C24NBG)
        .union(Self::C32)
        .union(Self::C32NFG)
        .union(Self::C32NBG);
    pub const LAYOUT_AXIS: Self = Self::FULL.union(Self::SPARSE).union(Self::FREE);

    /// True iff exactly one flag from each axis is set and no unknown bit is.
    pub fn validate(self) -> bool {
        let known = Self::GLYPH_AXIS
            .union(Self::COLOR_AXIS)
            .union(Self::LAYOUT_AXIS);
        self.bits() & !known.bits() == 0
            && self.intersection(Self::GLYPH_AXIS).bits().count_ones() == 1
            && self.intersection(Self::COLOR_AXIS).bits().count_ones() == 1
            && self.intersection(Self::LAYOUT_AXIS).bits().count_ones() == 1
    }
}

/// Size of the glyph identifier stored in each tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GlyphWidth {
    G8,
    G16,
}

impl GlyphWidth {
    pub const ALL: [GlyphWidth; 2] = [GlyphWidth::G8, GlyphWidth::G16];

    pub const fn bytes(self) -> usize {
        match self {
            GlyphWidth::G8 => 1,
            GlyphWidth::G16 => 2,
        }
    }

    /// Largest glyph id a tile of this width can carry.
    pub const fn max_glyph(self) -> u16 {
        match self {
            GlyphWidth::G8 => u8::MAX as u16,
            GlyphWidth::G16 => u16::MAX,
        }
    }

    pub const fn flag(self) -> DetailFlags {
        match self {
            GlyphWidth::G8 => DetailFlags::G8,
            GlyphWidth::G16 => DetailFlags::G16,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            GlyphWidth::G8 => "G8",
            GlyphWidth::G16 => "G16",
        }
    }
}

/// How a tile carries its foreground and background colors.
///
/// `C4` packs two 4-bit palette indices into one byte (see
/// [`crate::palette::combine_classic_color`]). The `Nfg`/`Nbg` variants omit
/// the foreground or background field entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorEncoding {
    C0,
    C4,
    C8,
    C8Nfg,
    C8Nbg,
    C24,
    C24Nfg,
    C24Nbg,
    C32,
    C32Nfg,
    C32Nbg,
}

impl ColorEncoding {
    pub const ALL: [ColorEncoding; 11] = [
        ColorEncoding::C0,
        ColorEncoding::C4,
        ColorEncoding::C8,
        ColorEncoding::C8Nfg,
        ColorEncoding::C8Nbg,
        ColorEncoding::C24,
        ColorEncoding::C24Nfg,
        ColorEncoding::C24Nbg,
        ColorEncoding::C32,
        ColorEncoding::C32Nfg,
        ColorEncoding::C32Nbg,
    ];

    pub const fn bytes(self) -> usize {
        match self {
            ColorEncoding::C0 => 0,
            ColorEncoding::C4 | ColorEncoding::C8Nfg | ColorEncoding::C8Nbg => 1,
            ColorEncoding::C8 => 2,
            ColorEncoding::C24Nfg | ColorEncoding::C24Nbg => 3,
            ColorEncoding::C32Nfg | ColorEncoding::C32Nbg => 4,
            ColorEncoding::C24 => 6,
            ColorEncoding::C32 => 8,
        }
    }

    /// Indexed encodings, whose color fields are palette indices.
    pub const fn has_palette(self) -> bool {
        matches!(
            self,
            ColorEncoding::C4 | ColorEncoding::C8 | ColorEncoding::C8Nfg | ColorEncoding::C8Nbg
        )
    }

    pub const fn has_foreground(self) -> bool {
        !matches!(
            self,
            ColorEncoding::C0 | ColorEncoding::C8Nfg | ColorEncoding::C24Nfg | ColorEncoding::C32Nfg
        )
    }

    pub const fn has_background(self) -> bool {
        !matches!(
            self,
            ColorEncoding::C0 | ColorEncoding::C8Nbg | ColorEncoding::C24Nbg | ColorEncoding::C32Nbg
        )
    }

    pub const fn flag(self) -> DetailFlags {
        match self {
            ColorEncoding::C0 => DetailFlags::C0,
            ColorEncoding::C4 => DetailFlags::C4,
            ColorEncoding::C8 => DetailFlags::C8,
            ColorEncoding::C8Nfg => DetailFlags::C8NFG,
            ColorEncoding::C8Nbg => DetailFlags::C8NBG,
            ColorEncoding::C24 => DetailFlags::C24,
            ColorEncoding::C24Nfg => DetailFlags::C24NFG,
            ColorEncoding::C24Nbg => DetailFlags::C24NBG,
            ColorEncoding::C32 => DetailFlags::C32,
            ColorEncoding::C32Nfg => DetailFlags::C32NFG,
            ColorEncoding::C32Nbg => DetailFlags::C32NBG,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ColorEncoding::C0 => "C0",
            ColorEncoding::C4 => "C4",
            ColorEncoding::C8 => "C8",
            ColorEncoding::C8Nfg => "C8NFG",
            ColorEncoding::C8Nbg => "C8NBG",
            ColorEncoding::C24 => "C24",
            ColorEncoding::C24Nfg => "C24NFG",
            ColorEncoding::C24Nbg => "C24NBG",
            ColorEncoding::C32 => "C32",
            ColorEncoding::C32Nfg => "C32NFG",
            ColorEncoding::C32Nbg => "C32NBG",
        }
    }
}

/// Where a tile's position comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Layout {
    /// Dense grid; position is implied by the record index.
    Full,
    /// Explicit `u16` grid coordinates per record.
    Sparse,
    /// Explicit `i32` pixel coordinates per record.
    Free,
}

impl Layout {
    pub const ALL: [Layout; 3] = [Layout::Full, Layout::Sparse, Layout::Free];

    pub const fn position_bytes(self) -> usize {
        match self {
            Layout::Full => 0,
            Layout::Sparse => 2 * std::mem::size_of::<u16>(),
            Layout::Free => 2 * std::mem::size_of::<i32>(),
        }
    }

    pub const fn flag(self) -> DetailFlags {
        match self {
            Layout::Full => DetailFlags::FULL,
            Layout::Sparse => DetailFlags::SPARSE,
            Layout::Free => DetailFlags::FREE,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Layout::Full => "FULL",
            Layout::Sparse => "SPARSE",
            Layout::Free => "FREE",
        }
    }
}

/// A complete, valid detail mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DetailMode {
    pub glyph: GlyphWidth,
    pub color: ColorEncoding,
    pub layout: Layout,
}

impl DetailMode {
    pub const fn new(glyph: GlyphWidth, color: ColorEncoding, layout: Layout) -> Self {
        Self {
            glyph,
            color,
            layout,
        }
    }

    /// Decodes the raw bitset, rejecting anything [`DetailFlags::validate`]
    /// would reject.
    pub fn from_bits(bits: u32) -> Result<Self, TileError> {
        Self::from_flags(DetailFlags::from_bits_retain(bits))
    }

    pub fn from_flags(flags: DetailFlags) -> Result<Self, TileError> {
        if !flags.validate() {
            return Err(report(
                TileError::InvalidDetailMode(flags.bits()),
                "DetailMode::from_flags",
            ));
        }
        // validate() guarantees exactly one hit per axis.
        let glyph = GlyphWidth::ALL.into_iter().find(|g| flags.contains(g.flag()));
        let color = ColorEncoding::ALL.into_iter().find(|c| flags.contains(c.flag()));
        let layout = Layout::ALL.into_iter().find(|l| flags.contains(l.flag()));
        match (glyph, color, layout) {
            (Some(glyph), Some(color), Some(layout)) => Ok(Self::new(glyph, color, layout)),
            _ => Err(report(
                TileError::InvalidDetailMode(flags.bits()),
                "DetailMode::from_flags",
            )),
        }
    }

    pub fn flags(self) -> DetailFlags {
        self.glyph.flag() | self.color.flag() | self.layout.flag()
    }

    pub fn bits(self) -> u32 {
        self.flags().bits()
    }

    pub const fn glyph_bytes(self) -> usize {
        self.glyph.bytes()
    }

    pub const fn color_bytes(self) -> usize {
        self.color.bytes()
    }

    pub const fn position_bytes(self) -> usize {
        self.layout.position_bytes()
    }

    /// Size of one encoded tile record. Never zero.
    pub const fn bytes_per_tile(self) -> usize {
        self.glyph_bytes() + self.color_bytes() + self.position_bytes()
    }

    pub const fn has_palette(self) -> bool {
        self.color.has_palette()
    }

    /// Normal blending draws texels as-is and needs no tile colors, so it
    /// pairs only with `C0`; every channel-mixing mode needs colors.
    pub fn is_compatible_with(self, blend: BlendMode) -> bool {
        match blend {
            BlendMode::Normal => self.color == ColorEncoding::C0,
            _ => self.color != ColorEncoding::C0,
        }
    }
}

impl fmt::Display for GlyphWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for ColorEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for DetailMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.glyph, self.color, self.layout)
    }
}

fn unknown_name(s: &str, location: &'static str) -> TileError {
    report(TileError::UnknownName(s.to_string()), location)
}

impl FromStr for GlyphWidth {
    type Err = TileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GlyphWidth::ALL
            .into_iter()
            .find(|g| g.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| unknown_name(s, "GlyphWidth::from_str"))
    }
}

impl FromStr for ColorEncoding {
    type Err = TileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ColorEncoding::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| unknown_name(s, "ColorEncoding::from_str"))
    }
}

impl FromStr for Layout {
    type Err = TileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Layout::ALL
            .into_iter()
            .find(|l| l.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| unknown_name(s, "Layout::from_str"))
    }
}

/// Parses `G8_C4_FULL` style names. The three parts may come in any order.
impl FromStr for DetailMode {
    type Err = TileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut flags = DetailFlags::empty();
        for part in s.split('_') {
            let flag = GlyphWidth::ALL
                .iter()
                .map(|g| (g.name(), g.flag()))
                .chain(ColorEncoding::ALL.iter().map(|c| (c.name(), c.flag())))
                .chain(Layout::ALL.iter().map(|l| (l.name(), l.flag())))
                .find(|(name, _)| name.eq_ignore_ascii_case(part))
                .map(|(_, flag)| flag)
                .ok_or_else(|| unknown_name(s, "DetailMode::from_str"))?;
            if flags.contains(flag) {
                return Err(unknown_name(s, "DetailMode::from_str"));
            }
            flags |= flag;
        }
        DetailMode::from_flags(flags)
    }
}
