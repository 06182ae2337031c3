// src/atlas/tests.rs

use super::*;
use crate::error::ErrorKind;
use test_log::test;

fn blank(width: u32, height: u32) -> AtlasImage {
    AtlasImage::new(width, height, 1, vec![0; (width * height) as usize]).unwrap()
}

#[test]
fn test_grid_128_by_8_has_256_glyphs() {
    let atlas = GlyphAtlas::grid(blank(128, 128), 8, 8, BlendMode::Normal).unwrap();
    assert_eq!(atlas.glyph_count(), 256);
    assert_eq!(
        atlas.kind(),
        AtlasKind::Grid {
            cell_width: 8,
            cell_height: 8,
            columns: 16,
            rows: 16
        }
    );
}

// Contract: cells tile the image without gaps, row-major from the top left.
#[test]
fn test_grid_cells_are_contiguous() {
    let atlas = GlyphAtlas::grid(blank(128, 128), 8, 8, BlendMode::Normal).unwrap();
    let first = atlas.try_glyph_uv(0).unwrap();
    let second = atlas.try_glyph_uv(1).unwrap();
    assert_eq!((first.left, first.top), (0.0, 0.0));
    assert_eq!(second.left, first.right);
    assert_eq!(first.right, 8.0 / 128.0);

    let next_row = atlas.try_glyph_uv(16).unwrap();
    assert_eq!(next_row.left, 0.0);
    assert_eq!(next_row.top, first.bottom);

    let last = atlas.try_glyph_uv(255).unwrap();
    assert_eq!((last.right, last.bottom), (1.0, 1.0));
}

#[test]
fn test_grid_ignores_partial_cells() {
    let atlas = GlyphAtlas::grid(blank(20, 10), 8, 4, BlendMode::Normal).unwrap();
    // 2 full columns, 2 full rows.
    assert_eq!(atlas.glyph_count(), 4);
    assert_eq!(atlas.try_glyph_uv(1).unwrap().right, 16.0 / 20.0);
}

#[test]
fn test_grid_rejects_bad_cells() {
    assert_eq!(
        GlyphAtlas::grid(blank(16, 16), 0, 8, BlendMode::Normal)
            .unwrap_err()
            .kind(),
        ErrorKind::InvalidDimensions
    );
    assert_eq!(
        GlyphAtlas::grid(blank(16, 16), 32, 8, BlendMode::Normal)
            .unwrap_err()
            .kind(),
        ErrorKind::InvalidDimensions
    );
}

#[test]
fn test_codepage_requires_multiple_of_16() {
    let atlas = GlyphAtlas::codepage(blank(128, 256), BlendMode::FgRed).unwrap();
    assert_eq!(atlas.glyph_count(), 256);
    assert_eq!(atlas.try_glyph_uv(17).unwrap().top, 16.0 / 256.0);

    let err = GlyphAtlas::codepage(blank(100, 128), BlendMode::FgRed).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidCodepageDimensions);
}

// Contract: overlapping boxes are fine; each glyph keeps its own quad.
#[test]
fn test_bounding_boxes_may_overlap() {
    let boxes = [0, 10, 0, 20, 5, 15, 10, 30];
    let atlas = GlyphAtlas::from_bounding_boxes(blank(20, 40), 2, &boxes, BlendMode::FgAlpha).unwrap();
    assert_eq!(atlas.kind(), AtlasKind::Coordinate);
    assert_eq!(
        atlas.try_glyph_uv(0),
        Some(UvRect::new(0.0, 0.5, 0.0, 0.5))
    );
    assert_eq!(
        atlas.try_glyph_uv(1),
        Some(UvRect::new(0.25, 0.75, 0.25, 0.75))
    );
}

#[test]
fn test_bounding_boxes_length_checked() {
    let err = GlyphAtlas::from_bounding_boxes(blank(8, 8), 2, &[0; 7], BlendMode::Normal).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidGlyphCount);
    let err = GlyphAtlas::from_bounding_boxes(blank(8, 8), 0, &[], BlendMode::Normal).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidGlyphCount);
}

#[test]
fn test_raw_uvs_kept_verbatim() {
    let uvs = [0.1, 0.2, 0.3, 0.4];
    let atlas = GlyphAtlas::from_raw_uvs(blank(8, 8), 1, &uvs, BlendMode::Normal).unwrap();
    assert_eq!(atlas.uvs()[0].to_array(), uvs);
}

#[test]
fn test_out_of_range_policies() {
    let atlas = GlyphAtlas::grid(blank(16, 8), 8, 8, BlendMode::Normal).unwrap();
    let first = atlas.try_glyph_uv(0);
    let last = atlas.try_glyph_uv(1);
    assert_eq!(atlas.try_glyph_uv(2), None);

    assert_eq!(atlas.out_of_range(), OutOfRangeGlyph::ClampToZero);
    assert_eq!(atlas.glyph_uv(500), first);

    let atlas = atlas.with_out_of_range(OutOfRangeGlyph::ClampToLast);
    assert_eq!(atlas.glyph_uv(500), last);

    let mut atlas = atlas;
    atlas.set_out_of_range(OutOfRangeGlyph::Transparent);
    assert_eq!(atlas.glyph_uv(500), None);
    assert_eq!(atlas.glyph_uv(1), last);
}

#[test]
fn test_blend_mode_is_mutable() {
    let mut atlas = GlyphAtlas::grid(blank(8, 8), 8, 8, BlendMode::Normal).unwrap();
    atlas.set_blend_mode(BlendMode::BgBlue);
    assert_eq!(atlas.blend_mode(), BlendMode::BgBlue);
    assert_eq!(atlas.glyph_count(), 1);
}

#[test]
fn test_image_validation_and_sampling() {
    assert_eq!(
        AtlasImage::new(2, 2, 3, vec![0; 11]).unwrap_err().kind(),
        ErrorKind::InvalidDimensions
    );
    assert_eq!(
        AtlasImage::new(2, 2, 5, vec![0; 20]).unwrap_err().kind(),
        ErrorKind::InvalidChannelCount
    );

    let image = AtlasImage::new(2, 1, 2, vec![10, 20, 30, 40]).unwrap();
    assert_eq!(image.texel(0, 0), Rgba::new(10, 10, 10, 20));
    assert_eq!(image.sample(0.75, 0.5), Rgba::new(30, 30, 30, 40));
    // Clamped past the edge.
    assert_eq!(image.sample(1.0, 1.0), Rgba::new(30, 30, 30, 40));
}
