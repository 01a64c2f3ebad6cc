//! Detection overlay drawn straight into an RGB24 buffer.
//!
//! Boxes are 2px outlines; captions use a 3x5 bitmap font (upper case,
//! digits and a little punctuation) scaled 2x, placed just above the box.

use crate::decision::DetectionSet;
use crate::observation::VisualFrame;

pub type Rgb = [u8; 3];

pub const GREEN: Rgb = [0, 255, 0];

const BOX_THICKNESS: u32 = 2;
const TEXT_SCALE: u32 = 2;
const GLYPH_W: u32 = 3;
const GLYPH_H: u32 = 5;

/// Copy of `frame` with every detection drawn on it.
pub fn annotate(frame: &VisualFrame, detections: &DetectionSet) -> VisualFrame {
    let mut out = frame.clone();
    if detections.is_empty() {
        return out;
    }
    let mut canvas = Canvas::new(&mut out.pixels, frame.width, frame.height);
    for det in detections.iter() {
        let (x1, y1) = (det.bbox.x1.max(0.0) as u32, det.bbox.y1.max(0.0) as u32);
        let (x2, y2) = (det.bbox.x2.max(0.0) as u32, det.bbox.y2.max(0.0) as u32);
        canvas.draw_rect(x1, y1, x2, y2, GREEN);
        let text_y = y1.saturating_sub(GLYPH_H * TEXT_SCALE + 4);
        canvas.draw_text(x1, text_y, &det.caption(), GREEN);
    }
    out
}

/// Mutable view over packed RGB24 pixels. Writes outside the frame are
/// clipped.
pub struct Canvas<'a> {
    pixels: &'a mut [u8],
    width: u32,
    height: u32,
}

impl<'a> Canvas<'a> {
    pub fn new(pixels: &'a mut [u8], width: u32, height: u32) -> Self {
        Self {
            pixels,
            width,
            height,
        }
    }

    pub fn put(&mut self, x: u32, y: u32, color: Rgb) {
        if x >= self.width || y >= self.height {
            return;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 3;
        if let Some(px) = self.pixels.get_mut(offset..offset + 3) {
            px.copy_from_slice(&color);
        }
    }

    fn fill(&mut self, x: u32, y: u32, w: u32, h: u32, color: Rgb) {
        for yy in y..y.saturating_add(h) {
            for xx in x..x.saturating_add(w) {
                self.put(xx, yy, color);
            }
        }
    }

    pub fn draw_rect(&mut self, x1: u32, y1: u32, x2: u32, y2: u32, color: Rgb) {
        let (x1, x2) = (x1.min(x2), x1.max(x2));
        let (y1, y2) = (y1.min(y2), y1.max(y2));
        let w = x2 - x1 + 1;
        let h = y2 - y1 + 1;
        let t = BOX_THICKNESS;
        self.fill(x1, y1, w, t, color);
        self.fill(x1, (y2 + 1).saturating_sub(t), w, t, color);
        self.fill(x1, y1, t, h, color);
        self.fill((x2 + 1).saturating_sub(t), y1, t, h, color);
    }

    pub fn draw_text(&mut self, x: u32, y: u32, text: &str, color: Rgb) {
        let advance = (GLYPH_W + 1) * TEXT_SCALE;
        for (i, ch) in text.chars().enumerate() {
            let gx = x + i as u32 * advance;
            for (row, bits) in glyph(ch).iter().enumerate() {
                for col in 0..GLYPH_W {
                    if bits & (0b100 >> col) != 0 {
                        self.fill(
                            gx + col * TEXT_SCALE,
                            y + row as u32 * TEXT_SCALE,
                            TEXT_SCALE,
                            TEXT_SCALE,
                            color,
                        );
                    }
                }
            }
        }
    }
}

fn glyph(ch: char) -> [u8; 5] {
    match ch.to_ascii_uppercase() {
        'A' => [0b010, 0b101, 0b111, 0b101, 0b101],
        'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'C' => [0b011, 0b100, 0b100, 0b100, 0b011],
        'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'E' => [0b111, 0b100, 0b110, 0b100, 0b111],
        'F' => [0b111, 0b100, 0b110, 0b100, 0b100],
        'G' => [0b011, 0b100, 0b101, 0b101, 0b011],
        'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'J' => [0b001, 0b001, 0b001, 0b101, 0b010],
        'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'M' => [0b101, 0b111, 0b111, 0b101, 0b101],
        'N' => [0b110, 0b101, 0b101, 0b101, 0b101],
        'O' => [0b010, 0b101, 0b101, 0b101, 0b010],
        'P' => [0b110, 0b101, 0b110, 0b100, 0b100],
        'Q' => [0b010, 0b101, 0b101, 0b110, 0b011],
        'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        'S' => [0b011, 0b100, 0b010, 0b001, 0b110],
        'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'V' => [0b101, 0b101, 0b101, 0b101, 0b010],
        'W' => [0b101, 0b101, 0b111, 0b111, 0b101],
        'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'Y' => [0b101, 0b101, 0b010, 0b010, 0b010],
        'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b110, 0b001, 0b010, 0b100, 0b111],
        '3' => [0b110, 0b001, 0b010, 0b001, 0b110],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b110, 0b001, 0b110],
        '6' => [0b011, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b010, 0b010, 0b010],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b110],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        ' ' => [0; 5],
        _ => [0b110, 0b001, 0b010, 0b000, 0b010],
    }
}
