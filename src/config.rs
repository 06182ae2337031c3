// src/config.rs

//! Tunables for batches, atlases and palettes.
//!
//! Every section carries `#[serde(default)]`, so a configuration file only
//! needs to name the values it changes. JSON is read with
//! [`Config::from_json_str`].

use crate::atlas::OutOfRangeGlyph;
use crate::palette::TerminalPaletteSize;
use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub batch: BatchConfig,
    pub atlas: AtlasConfig,
    pub palette: PaletteConfig,
}

impl Config {
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Tile batch allocation behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Records reserved up front by Sparse and Free batches.
    pub sparse_reserve_tiles: usize,
    /// Whether `clear` keeps the allocation of a Sparse or Free batch.
    /// Resize takes its own flag.
    pub retain_capacity_on_clear: bool,
    /// Sparse pushes to an occupied cell overwrite that record in place.
    pub sparse_dedupe: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig {
            sparse_reserve_tiles: 64,
            retain_capacity_on_clear: true,
            sparse_dedupe: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AtlasConfig {
    pub out_of_range_glyph: OutOfRangeGlyph,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaletteConfig {
    pub default_terminal_size: TerminalPaletteSize,
}

impl Default for PaletteConfig {
    fn default() -> Self {
        PaletteConfig {
            default_terminal_size: TerminalPaletteSize::Xterm256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_empty_json_gives_defaults() {
        let config = Config::from_json_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.batch.sparse_reserve_tiles, 64);
        assert!(!config.batch.sparse_dedupe);
        assert_eq!(config.atlas.out_of_range_glyph, OutOfRangeGlyph::ClampToZero);
    }

    #[test]
    fn test_partial_sections_merge_with_defaults() {
        let config = Config::from_json_str(
            r#"{ "batch": { "sparse_dedupe": true }, "atlas": { "out_of_range_glyph": "Transparent" } }"#,
        )
        .unwrap();
        assert!(config.batch.sparse_dedupe);
        assert_eq!(config.batch.sparse_reserve_tiles, 64);
        assert_eq!(config.atlas.out_of_range_glyph, OutOfRangeGlyph::Transparent);
        assert_eq!(
            config.palette.default_terminal_size,
            TerminalPaletteSize::Xterm256
        );
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(Config::from_json_str("{ \"batch\": 3 }").is_err());
    }
}
