// src/blend.rs

//! Blend modes and the per-pixel compositing rule they describe.
//!
//! A backend composites every atlas texel with the tile's foreground and
//! background color. Which texel channel drives the mix, and in which
//! direction, is chosen by the atlas's [`BlendMode`]. [`BlendMode::composite`]
//! is the reference implementation of that rule; the software rasterizer uses
//! it directly and GPU backends are expected to match it.

use crate::error::{report, TileError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// RGBA color in 32-bit format (8 bits per channel)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn from_rgb(rgb: [u8; 3]) -> Self {
        Self::opaque(rgb[0], rgb[1], rgb[2])
    }

    pub const fn from_bytes(rgba: [u8; 4]) -> Self {
        Self::new(rgba[0], rgba[1], rgba[2], rgba[3])
    }

    /// Convert to RGBA byte array
    pub fn to_bytes(&self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Per-channel linear mix: `t == 0` yields `self`, `t == 255` yields `other`.
    pub fn lerp(self, other: Rgba, t: u8) -> Rgba {
        let mix = |a: u8, b: u8| -> u8 {
            let t = t as u32;
            ((a as u32 * (255 - t) + b as u32 * t + 127) / 255) as u8
        };
        Rgba::new(
            mix(self.r, other.r),
            mix(self.g, other.g),
            mix(self.b, other.b),
            mix(self.a, other.a),
        )
    }

    /// Source-over composition of `self` onto `dst`, straight alpha.
    pub fn over(self, dst: Rgba) -> Rgba {
        match self.a {
            255 => self,
            0 => dst,
            a => {
                let src_weight = a as u32 * 255;
                let dst_weight = dst.a as u32 * (255 - a as u32);
                let total = src_weight + dst_weight;
                let mix = |s: u8, d: u8| -> u8 {
                    ((s as u32 * src_weight + d as u32 * dst_weight + total / 2) / total) as u8
                };
                Rgba::new(
                    mix(self.r, dst.r),
                    mix(self.g, dst.g),
                    mix(self.b, dst.b),
                    ((total + 127) / 255) as u8,
                )
            }
        }
    }
}

/// Per-pixel compositing rule bound to a glyph atlas.
///
/// Numeric ids start at 1; 0 is never a valid blend mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum BlendMode {
    /// Texel drawn as-is; tile colors are ignored.
    #[default]
    Normal = 1,
    FgRed = 2,
    FgGreen = 3,
    FgBlue = 4,
    /// Texel alpha 0 shows the foreground, 255 the background.
    FgAlpha = 5,
    BgRed = 6,
    BgGreen = 7,
    BgBlue = 8,
    /// Texel alpha 0 shows the background, 255 the foreground.
    BgAlpha = 9,
}

impl BlendMode {
    pub const ALL: [BlendMode; 9] = [
        BlendMode::Normal,
        BlendMode::FgRed,
        BlendMode::FgGreen,
        BlendMode::FgBlue,
        BlendMode::FgAlpha,
        BlendMode::BgRed,
        BlendMode::BgGreen,
        BlendMode::BgBlue,
        BlendMode::BgAlpha,
    ];

    pub const fn id(self) -> u8 {
        self as u8
    }

    pub const fn name(self) -> &'static str {
        match self {
            BlendMode::Normal => "NORMAL",
            BlendMode::FgRed => "FG_RED",
            BlendMode::FgGreen => "FG_GREEN",
            BlendMode::FgBlue => "FG_BLUE",
            BlendMode::FgAlpha => "FG_ALPHA",
            BlendMode::BgRed => "BG_RED",
            BlendMode::BgGreen => "BG_GREEN",
            BlendMode::BgBlue => "BG_BLUE",
            BlendMode::BgAlpha => "BG_ALPHA",
        }
    }

    /// Combines one atlas texel with the tile's colors.
    ///
    /// Encodings without a foreground or background pass
    /// [`Rgba::TRANSPARENT`] for the missing side.
    pub fn composite(self, texel: Rgba, fg: Rgba, bg: Rgba) -> Rgba {
        match self {
            BlendMode::Normal => texel,
            BlendMode::FgRed => bg.lerp(fg, texel.r),
            BlendMode::FgGreen => bg.lerp(fg, texel.g),
            BlendMode::FgBlue => bg.lerp(fg, texel.b),
            BlendMode::FgAlpha => fg.lerp(bg, texel.a),
            BlendMode::BgRed => fg.lerp(bg, texel.r),
            BlendMode::BgGreen => fg.lerp(bg, texel.g),
            BlendMode::BgBlue => fg.lerp(bg, texel.b),
            BlendMode::BgAlpha => bg.lerp(fg, texel.a),
        }
    }
}

impl TryFrom<u8> for BlendMode {
    type Error = TileError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        BlendMode::ALL
            .into_iter()
            .find(|mode| mode.id() == id)
            .ok_or_else(|| report(TileError::InvalidBlendMode(id), "BlendMode::try_from"))
    }
}

impl fmt::Display for BlendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BlendMode {
    type Err = TileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BlendMode::ALL
            .into_iter()
            .find(|mode| mode.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| report(TileError::UnknownName(s.to_string()), "BlendMode::from_str"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use test_log::test;

    const FG: Rgba = Rgba::opaque(200, 100, 0);
    const BG: Rgba = Rgba::opaque(0, 0, 50);

    #[test]
    fn test_normal_ignores_tile_colors() {
        let texel = Rgba::new(1, 2, 3, 4);
        assert_eq!(BlendMode::Normal.composite(texel, FG, BG), texel);
    }

    // Contract: channel 0 selects the background, max selects the foreground.
    #[test]
    fn test_fg_channels_mix_towards_foreground() {
        let off = Rgba::new(0, 0, 0, 255);
        let on = Rgba::new(255, 255, 255, 255);
        for mode in [BlendMode::FgRed, BlendMode::FgGreen, BlendMode::FgBlue] {
            assert_eq!(mode.composite(off, FG, BG), BG, "{mode}");
            assert_eq!(mode.composite(on, FG, BG), FG, "{mode}");
        }
    }

    #[test]
    fn test_bg_channels_reverse_direction() {
        let off = Rgba::new(0, 0, 0, 255);
        let on = Rgba::new(255, 255, 255, 255);
        for mode in [BlendMode::BgRed, BlendMode::BgGreen, BlendMode::BgBlue] {
            assert_eq!(mode.composite(off, FG, BG), FG, "{mode}");
            assert_eq!(mode.composite(on, FG, BG), BG, "{mode}");
        }
    }

    // Contract: alpha 0 is fully foreground for FG_ALPHA and fully
    // background for BG_ALPHA.
    #[test]
    fn test_alpha_modes_are_asymmetric() {
        let clear = Rgba::new(255, 255, 255, 0);
        let solid = Rgba::new(255, 255, 255, 255);
        assert_eq!(BlendMode::FgAlpha.composite(clear, FG, BG), FG);
        assert_eq!(BlendMode::FgAlpha.composite(solid, FG, BG), BG);
        assert_eq!(BlendMode::BgAlpha.composite(clear, FG, BG), BG);
        assert_eq!(BlendMode::BgAlpha.composite(solid, FG, BG), FG);
    }

    #[test]
    fn test_only_the_named_channel_drives_the_mix() {
        let red_only = Rgba::new(255, 0, 0, 0);
        assert_eq!(BlendMode::FgRed.composite(red_only, FG, BG), FG);
        assert_eq!(BlendMode::FgGreen.composite(red_only, FG, BG), BG);
    }

    #[test]
    fn test_half_mix_rounds() {
        let half = Rgba::new(128, 0, 0, 255);
        let mixed = BlendMode::FgRed.composite(half, Rgba::opaque(255, 255, 255), Rgba::opaque(0, 0, 0));
        assert_eq!(mixed, Rgba::opaque(128, 128, 128));
    }

    #[test]
    fn test_ids_and_names() {
        assert_eq!(BlendMode::try_from(1), Ok(BlendMode::Normal));
        assert_eq!(BlendMode::try_from(9), Ok(BlendMode::BgAlpha));
        assert_eq!(
            BlendMode::try_from(0).unwrap_err().kind(),
            ErrorKind::InvalidBlendMode
        );
        assert!(BlendMode::try_from(10).is_err());
        assert_eq!("fg_alpha".parse::<BlendMode>(), Ok(BlendMode::FgAlpha));
        assert_eq!(BlendMode::BgGreen.to_string(), "BG_GREEN");
    }

    #[test]
    fn test_over_composition() {
        let dst = Rgba::opaque(10, 20, 30);
        assert_eq!(Rgba::TRANSPARENT.over(dst), dst);
        assert_eq!(FG.over(dst), FG);
        let half = Rgba::new(255, 255, 255, 128).over(Rgba::opaque(0, 0, 0));
        assert_eq!(half.a, 255);
        assert_eq!(half.r, 128);

        let grey = Rgba::new(128, 128, 128, 128);
        assert_eq!(grey.over(Rgba::TRANSPARENT), grey);
    }
}
