// src/palette.rs

//! Indexed color tables referenced by the compact tile color fields.
//!
//! Indexed encodings (`C4`, `C8*`) store palette indices instead of colors.
//! `C4` packs a foreground and background index into one "classic color"
//! byte, high nibble first.

use crate::blend::Rgba;
use crate::error::{report, TileError};
use log::debug;
use serde::{Deserialize, Serialize};

pub const MAX_PALETTE_COLORS: usize = 256;

const ANSI_NAMED_COLOR_COUNT: usize = 16;

const BASE_COLORS: [[u8; 3]; ANSI_NAMED_COLOR_COUNT] = [
    [0, 0, 0],       // Black
    [128, 0, 0],     // Red
    [0, 128, 0],     // Green
    [128, 128, 0],   // Yellow
    [0, 0, 128],     // Blue
    [128, 0, 128],   // Magenta
    [0, 128, 128],   // Cyan
    [192, 192, 192], // White
    [128, 128, 128], // BrightBlack
    [255, 0, 0],     // BrightRed
    [0, 255, 0],     // BrightGreen
    [255, 255, 0],   // BrightYellow
    [0, 0, 255],     // BrightBlue
    [255, 0, 255],   // BrightMagenta
    [0, 255, 255],   // BrightCyan
    [255, 255, 255], // BrightWhite
];

static XTERM_256: [[u8; 3]; 256] = generate_xterm_256();
static XTERM_88: [[u8; 3]; 88] = generate_xterm_88();

/// 16 base colors, a 6x6x6 cube, then a 24-step grey ramp.
const fn generate_xterm_256() -> [[u8; 3]; 256] {
    const CUBE_LEVELS: [u8; 6] = [0, 95, 135, 175, 215, 255];
    let mut table = [[0u8; 3]; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = if i < ANSI_NAMED_COLOR_COUNT {
            BASE_COLORS[i]
        } else if i < 232 {
            let cube = i - 16;
            [
                CUBE_LEVELS[cube / 36],
                CUBE_LEVELS[(cube / 6) % 6],
                CUBE_LEVELS[cube % 6],
            ]
        } else {
            let level = 8 + 10 * (i - 232) as u8;
            [level, level, level]
        };
        i += 1;
    }
    table
}

/// 16 base colors, a 4x4x4 cube, then an 8-step grey ramp.
const fn generate_xterm_88() -> [[u8; 3]; 88] {
    const CUBE_LEVELS: [u8; 4] = [0, 139, 205, 255];
    const GREYS: [u8; 8] = [46, 92, 115, 139, 162, 185, 208, 231];
    let mut table = [[0u8; 3]; 88];
    let mut i = 0;
    while i < 88 {
        table[i] = if i < ANSI_NAMED_COLOR_COUNT {
            BASE_COLORS[i]
        } else if i < 80 {
            let cube = i - 16;
            [
                CUBE_LEVELS[cube / 16],
                CUBE_LEVELS[(cube / 4) % 4],
                CUBE_LEVELS[cube % 4],
            ]
        } else {
            let level = GREYS[i - 80];
            [level, level, level]
        };
        i += 1;
    }
    table
}

/// The 16 base terminal colors addressable by a classic color nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ClassicColor {
    Black = 0,
    Red = 1,
    Green = 2,
    Yellow = 3,
    Blue = 4,
    Magenta = 5,
    Cyan = 6,
    White = 7,       // Also known as Grey
    BrightBlack = 8, // Also known as Dark Grey
    BrightRed = 9,
    BrightGreen = 10,
    BrightYellow = 11,
    BrightBlue = 12,
    BrightMagenta = 13,
    BrightCyan = 14,
    BrightWhite = 15,
}

impl ClassicColor {
    pub const ALL: [ClassicColor; 16] = [
        ClassicColor::Black,
        ClassicColor::Red,
        ClassicColor::Green,
        ClassicColor::Yellow,
        ClassicColor::Blue,
        ClassicColor::Magenta,
        ClassicColor::Cyan,
        ClassicColor::White,
        ClassicColor::BrightBlack,
        ClassicColor::BrightRed,
        ClassicColor::BrightGreen,
        ClassicColor::BrightYellow,
        ClassicColor::BrightBlue,
        ClassicColor::BrightMagenta,
        ClassicColor::BrightCyan,
        ClassicColor::BrightWhite,
    ];

    pub const fn index(self) -> u8 {
        self as u8
    }

    /// The color this entry has in every standard terminal palette.
    pub fn to_rgba(self) -> Rgba {
        Rgba::from_rgb(BASE_COLORS[self as usize])
    }
}

impl TryFrom<u8> for ClassicColor {
    type Error = TileError;

    fn try_from(idx: u8) -> Result<Self, Self::Error> {
        ClassicColor::ALL.get(idx as usize).copied().ok_or_else(|| {
            report(TileError::InvalidColorIndex(idx), "ClassicColor::try_from")
        })
    }
}

/// Packs two palette indices into a classic color byte.
/// Only the low nibble of each argument is used.
pub const fn combine_classic_color(fg: u8, bg: u8) -> u8 {
    ((fg & 0x0F) << 4) | (bg & 0x0F)
}

/// Unpacks a classic color byte into `(fg, bg)` palette indices.
pub const fn split_classic_color(fg_and_bg: u8) -> (u8, u8) {
    (fg_and_bg >> 4, fg_and_bg & 0x0F)
}

/// Sizes of the well-known terminal palettes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerminalPaletteSize {
    Ansi16,
    Xterm88,
    Xterm256,
}

impl TerminalPaletteSize {
    pub const fn color_count(self) -> usize {
        match self {
            TerminalPaletteSize::Ansi16 => 16,
            TerminalPaletteSize::Xterm88 => 88,
            TerminalPaletteSize::Xterm256 => 256,
        }
    }
}

impl TryFrom<usize> for TerminalPaletteSize {
    type Error = TileError;

    fn try_from(count: usize) -> Result<Self, Self::Error> {
        match count {
            16 => Ok(TerminalPaletteSize::Ansi16),
            88 => Ok(TerminalPaletteSize::Xterm88),
            256 => Ok(TerminalPaletteSize::Xterm256),
            _ => Err(report(
                TileError::InvalidColorCount(count),
                "TerminalPaletteSize::try_from",
            )),
        }
    }
}

/// A table of 1 to 256 RGB or RGBA colors.
///
/// Contents only change through [`Palette::replace`], which swaps the whole
/// table at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PaletteData", into = "PaletteData")]
pub struct Palette {
    channel_count: u8,
    color_count: usize,
    data: Vec<u8>,
}

/// Serialized form of a palette; validated on the way back in.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PaletteData {
    channel_count: u8,
    colors: Vec<u8>,
}

impl Palette {
    /// Copies `color_count` entries of `channel_count` bytes each out of
    /// `color_data`. Extra trailing bytes are ignored.
    pub fn new(channel_count: u8, color_count: usize, color_data: &[u8]) -> Result<Self, TileError> {
        let data = Self::validated_copy(channel_count, color_count, color_data, "Palette::new")?;
        debug!(
            "Created palette: {} colors, {} channels",
            color_count, channel_count
        );
        Ok(Self {
            channel_count,
            color_count,
            data,
        })
    }

    /// One of the standard xterm palettes, as RGB.
    pub fn terminal(size: TerminalPaletteSize) -> Self {
        let table: &[[u8; 3]] = match size {
            TerminalPaletteSize::Ansi16 => &BASE_COLORS,
            TerminalPaletteSize::Xterm88 => &XTERM_88,
            TerminalPaletteSize::Xterm256 => &XTERM_256,
        };
        debug!("Created standard {:?} terminal palette", size);
        Self {
            channel_count: 3,
            color_count: table.len(),
            data: table.iter().flatten().copied().collect(),
        }
    }

    /// Replaces the whole table. On error the palette is left as it was.
    pub fn replace(
        &mut self,
        channel_count: u8,
        color_count: usize,
        color_data: &[u8],
    ) -> Result<(), TileError> {
        self.data = Self::validated_copy(channel_count, color_count, color_data, "Palette::replace")?;
        self.channel_count = channel_count;
        self.color_count = color_count;
        Ok(())
    }

    fn validated_copy(
        channel_count: u8,
        color_count: usize,
        color_data: &[u8],
        location: &'static str,
    ) -> Result<Vec<u8>, TileError> {
        if channel_count != 3 && channel_count != 4 {
            return Err(report(TileError::InvalidChannelCount(channel_count), location));
        }
        if color_count == 0 || color_count > MAX_PALETTE_COLORS {
            return Err(report(TileError::InvalidColorCount(color_count), location));
        }
        let len = channel_count as usize * color_count;
        if color_data.len() < len {
            return Err(report(
                TileError::InvalidDimensions(format!(
                    "palette needs {} bytes of color data, got {}",
                    len,
                    color_data.len()
                )),
                location,
            ));
        }
        Ok(color_data[..len].to_vec())
    }

    pub fn channel_count(&self) -> u8 {
        self.channel_count
    }

    pub fn color_count(&self) -> usize {
        self.color_count
    }

    /// Flat color bytes, `channel_count` per entry.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Entry `index`, or `None` past the end. RGB entries are opaque.
    pub fn color(&self, index: u8) -> Option<Rgba> {
        let channels = self.channel_count as usize;
        let start = index as usize * channels;
        let entry = self.data.get(start..start + channels)?;
        Some(match entry {
            [r, g, b] => Rgba::opaque(*r, *g, *b),
            [r, g, b, a] => Rgba::new(*r, *g, *b, *a),
            _ => return None,
        })
    }
}

impl TryFrom<PaletteData> for Palette {
    type Error = TileError;

    fn try_from(raw: PaletteData) -> Result<Self, Self::Error> {
        let channels = raw.channel_count.max(1) as usize;
        if matches!(raw.channel_count, 3 | 4) && raw.colors.len() % channels != 0 {
            return Err(report(
                TileError::InvalidDimensions(format!(
                    "{} color bytes is not a whole number of {}-channel entries",
                    raw.colors.len(),
                    channels
                )),
                "Palette::deserialize",
            ));
        }
        Palette::new(raw.channel_count, raw.colors.len() / channels, &raw.colors)
    }
}

impl From<Palette> for PaletteData {
    fn from(palette: Palette) -> Self {
        PaletteData {
            channel_count: palette.channel_count,
            colors: palette.data,
        }
    }
}
