//! Frame-rate text stamped into the bottom-left corner of each frame.

use image::Rgb;
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect as DrawRect;

use crate::redaction::{Frame, PixelRegion};

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
/// Glyph width plus one column of spacing.
const ADVANCE: u32 = GLYPH_WIDTH + 1;
const MARGIN_LEFT: usize = 2;
const MARGIN_BOTTOM: usize = 4;

/// Draws `NN fps: <rate>` with a 5x7 bitmap font.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FpsOverlay {
    scale: u32,
    /// Text color, channels in frame (BGR) order
    color: Rgb<u8>,
}

impl Default for FpsOverlay {
    fn default() -> Self {
        Self::new(1)
    }
}

impl FpsOverlay {
    /// White text, each font pixel drawn as a `scale x scale` square.
    pub fn new(scale: u32) -> Self {
        Self {
            scale: scale.max(1),
            color: Rgb([255, 255, 255]),
        }
    }

    pub fn label(fps: f64) -> String {
        format!("NN fps: {fps:.2}")
    }

    /// Pixels `text` occupies in a `width x height` frame, clipped to the
    /// frame. `None` when the frame is too small to hold any of it.
    pub fn region(&self, text: &str, width: usize, height: usize) -> Option<PixelRegion> {
        let scale = self.scale as usize;
        let text_width = text.chars().count() * (ADVANCE as usize) * scale;
        let bottom = height.checked_sub(MARGIN_BOTTOM)?;
        let region = PixelRegion {
            x0: MARGIN_LEFT.min(width),
            y0: bottom.saturating_sub(GLYPH_HEIGHT as usize * scale),
            x1: (MARGIN_LEFT + text_width).min(width),
            y1: bottom,
        };
        (region.x1 > region.x0 && region.y1 > region.y0).then_some(region)
    }

    /// Stamp the current rate into `frame`. Only pixels inside
    /// [`Self::region`] are written.
    pub fn draw(&self, frame: &mut Frame, fps: f64) {
        let text = Self::label(fps);
        let Some(region) = self.region(&text, frame.width(), frame.height()) else {
            return;
        };
        let mut patch = frame.crop(region);

        // Anchored on the bottom edge: a clipped region loses the top rows.
        let top = region.height() as i32 - (GLYPH_HEIGHT * self.scale) as i32;
        for (i, ch) in text.chars().enumerate() {
            let left = (i as u32 * ADVANCE * self.scale) as i32;
            for (row, bits) in glyph(ch).into_iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if (bits >> (GLYPH_WIDTH - 1 - col)) & 1 == 0 {
                        continue;
                    }
                    let x = left + (col * self.scale) as i32;
                    let y = top + (row as u32 * self.scale) as i32;
                    let dot = DrawRect::at(x, y).of_size(self.scale, self.scale);
                    draw_filled_rect_mut(&mut patch, dot, self.color);
                }
            }
        }
        frame.paste(region, &patch);
    }
}

/// Rows of a glyph, most significant of the five low bits leftmost.
fn glyph(ch: char) -> [u8; 7] {
    match ch.to_ascii_uppercase() {
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'N' => [0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001, 0b10001],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        ':' => [0b00000, 0b01100, 0b01100, 0b00000, 0b01100, 0b01100, 0b00000],
        '.' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b01100],
        _ => [0; 7],
    }
}
