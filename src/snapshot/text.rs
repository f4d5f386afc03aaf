//! Label text for raster output, drawn from the embedded DejaVu Sans outline
//! font so accented Latin, Cyrillic and Greek names come out as written.
//! The bitmap glyphs only step in when the font data cannot be parsed.

use std::sync::OnceLock;

use ab_glyph::{point, Font, FontRef, Glyph, PxScale, ScaleFont};
use image::{Rgba, RgbaImage};

use super::glyphs;

const ENABLE_LOGS: bool = true;
use crate::log_error;

static FONT_DATA: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

fn font() -> Option<&'static FontRef<'static>> {
    static FONT: OnceLock<Option<FontRef<'static>>> = OnceLock::new();
    FONT.get_or_init(|| match FontRef::try_from_slice(FONT_DATA) {
        Ok(font) => Some(font),
        Err(err) => {
            log_error!("embedded label font is unusable, using bitmap glyphs: {err}");
            None
        }
    })
    .as_ref()
}

/// Glyphs positioned on a baseline `ascent` below the origin, plus the
/// total advance.
fn layout(font: &FontRef<'_>, text: &str, px: f32) -> (Vec<Glyph>, f32) {
    let scaled = font.as_scaled(PxScale::from(px));
    let mut caret = point(0.0, scaled.ascent());
    let mut previous = None;
    let mut glyphs = Vec::with_capacity(text.len());

    for ch in text.chars() {
        let id = scaled.glyph_id(ch);
        if let Some(previous) = previous {
            caret.x += scaled.kern(previous, id);
        }
        glyphs.push(id.with_scale_and_position(px, caret));
        caret.x += scaled.h_advance(id);
        previous = Some(id);
    }
    (glyphs, caret.x)
}

fn bitmap_scale(px: f32) -> u32 {
    (px / glyphs::GLYPH_HEIGHT as f32).floor().max(1.0) as u32
}

fn measure_with(font: Option<&FontRef<'_>>, text: &str, px: f32) -> (u32, u32) {
    let Some(font) = font else {
        let scale = bitmap_scale(px);
        return (glyphs::text_width(text, scale), glyphs::text_height(scale));
    };
    let scaled = font.as_scaled(PxScale::from(px));
    let height = (scaled.ascent() - scaled.descent()).ceil() as u32;
    if text.is_empty() {
        return (0, height);
    }
    let (_, advance) = layout(font, text, px);
    (advance.ceil() as u32, height)
}

fn draw_with(
    font: Option<&FontRef<'_>>,
    image: &mut RgbaImage,
    x: i64,
    y: i64,
    text: &str,
    px: f32,
    ink: Rgba<u8>,
) {
    let Some(font) = font else {
        glyphs::draw_text(image, x, y, text, bitmap_scale(px), ink);
        return;
    };

    let (width, height) = (image.width() as i64, image.height() as i64);
    let (positioned, _) = layout(font, text, px);
    for glyph in positioned {
        // Whitespace has no outline.
        let Some(outlined) = font.outline_glyph(glyph) else {
            continue;
        };
        let bounds = outlined.px_bounds();
        outlined.draw(|gx, gy, coverage| {
            let cx = x + bounds.min.x as i64 + gx as i64;
            let cy = y + bounds.min.y as i64 + gy as i64;
            if (0..width).contains(&cx) && (0..height).contains(&cy) {
                blend(image.get_pixel_mut(cx as u32, cy as u32), ink, coverage);
            }
        });
    }
}

fn blend(pixel: &mut Rgba<u8>, ink: Rgba<u8>, coverage: f32) {
    let alpha = coverage.clamp(0.0, 1.0) * ink[3] as f32 / 255.0;
    for channel in 0..3 {
        let mixed = ink[channel] as f32 * alpha + pixel[channel] as f32 * (1.0 - alpha);
        pixel[channel] = mixed.round() as u8;
    }
    pixel[3] = pixel[3].max((alpha * 255.0).round() as u8);
}

/// Width and line height in pixels of `text` set at `px`.
pub fn measure(text: &str, px: f32) -> (u32, u32) {
    measure_with(font(), text, px)
}

/// Draws `text` with the top-left of its line box at (`x`, `y`), clipped to
/// the image.
pub fn draw(image: &mut RgbaImage, x: i64, y: i64, text: &str, px: f32, ink: Rgba<u8>) {
    draw_with(font(), image, x, y, text, px, ink);
}
