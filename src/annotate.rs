//! Frame annotation and wire encoding.
//!
//! Draws bounding boxes and label tags for the kept detections onto the RGB
//! frame, then JPEG-encodes and base64-wraps it for the combined outbound
//! payload. Label text uses an embedded 8x12 bitmap face rendered in caps, so
//! no font assets ship with the daemon.

use std::io::Cursor;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, Rgb, RgbImage};

use crate::detect::Detection;
use crate::frame::VideoFrame;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const TAG_TEXT: Rgb<u8> = Rgb([0, 0, 0]);
const TAG_BACKGROUND: Rgb<u8> = Rgb([0, 255, 0]);
const BOX_THICKNESS: u32 = 2;

const GLYPH_W: u32 = 8;
const GLYPH_H: u32 = 12;

/// Draw detections, JPEG-encode, and base64-wrap one frame.
pub fn render(frame: &VideoFrame, detections: &[Detection], jpeg_quality: u8) -> Result<String> {
    let mut image = RgbImage::from_raw(frame.width, frame.height, frame.pixels.clone())
        .context("frame buffer does not match its dimensions")?;
    for det in detections {
        draw_detection(&mut image, det);
    }
    let jpeg = encode_jpeg(&image, jpeg_quality)?;
    Ok(STANDARD.encode(jpeg))
}

fn draw_detection(image: &mut RgbImage, det: &Detection) {
    let (width, height) = image.dimensions();
    let Some([x1, y1, x2, y2]) = clip_box(det, width, height) else {
        return;
    };
    draw_rect(image, [x1, y1, x2, y2], BOX_COLOR, BOX_THICKNESS);

    let tag = format!("{} {:.2}", det.label, det.confidence);
    let tag_y = y1.saturating_sub(GLYPH_H + 2);
    draw_tag(image, x1, tag_y, &tag);
}

/// Clamp a detection box into image bounds. Boxes entirely outside the image
/// are dropped rather than collapsed onto the border.
fn clip_box(det: &Detection, width: u32, height: u32) -> Option<[u32; 4]> {
    if width == 0 || height == 0 {
        return None;
    }
    if det.x2 < 0 || det.y2 < 0 || det.x1 >= width as i32 || det.y1 >= height as i32 {
        return None;
    }
    let clamp = |v: i32, max: u32| v.clamp(0, max as i32 - 1) as u32;
    let x1 = clamp(det.x1, width);
    let y1 = clamp(det.y1, height);
    let x2 = clamp(det.x2, width);
    let y2 = clamp(det.y2, height);
    if x2 < x1 || y2 < y1 {
        return None;
    }
    Some([x1, y1, x2, y2])
}

fn draw_rect(image: &mut RgbImage, [x1, y1, x2, y2]: [u32; 4], color: Rgb<u8>, thickness: u32) {
    for t in 0..thickness {
        let xa = x1.saturating_add(t);
        let ya = y1.saturating_add(t);
        let xb = x2.saturating_sub(t);
        let yb = y2.saturating_sub(t);
        if xa > xb || ya > yb {
            break;
        }
        for x in xa..=xb {
            image.put_pixel(x, ya, color);
            image.put_pixel(x, yb, color);
        }
        for y in ya..=yb {
            image.put_pixel(xa, y, color);
            image.put_pixel(xb, y, color);
        }
    }
}

/// Filled background bar with glyph text on top, clipped to the image.
fn draw_tag(image: &mut RgbImage, x: u32, y: u32, text: &str) {
    let (width, height) = image.dimensions();
    let tag_w = (text.chars().count() as u32 * GLYPH_W).min(width.saturating_sub(x));
    let tag_h = GLYPH_H.min(height.saturating_sub(y));
    if tag_w == 0 || tag_h == 0 {
        return;
    }
    for ty in y..y + tag_h {
        for tx in x..x + tag_w {
            image.put_pixel(tx, ty, TAG_BACKGROUND);
        }
    }

    let mut cx = x;
    for ch in text.chars() {
        if cx + GLYPH_W > width {
            break;
        }
        if let Some(rows) = glyph(ch) {
            for (row, bits) in rows.iter().enumerate() {
                let py = y + row as u32;
                if py >= height {
                    break;
                }
                for col in 0..GLYPH_W {
                    if (bits >> (GLYPH_W - 1 - col)) & 1 == 1 {
                        image.put_pixel(cx + col, py, TAG_TEXT);
                    }
                }
            }
        }
        cx += GLYPH_W;
    }
}

fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    encoder
        .encode(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgb8,
        )
        .context("jpeg encode failed")?;
    Ok(buffer.into_inner())
}

/// 8x12 bitmap rows for one character, most significant bit leftmost.
/// Letters render in caps; unknown characters leave a blank cell.
fn glyph(ch: char) -> Option<[u8; 12]> {
    let rows = match ch.to_ascii_uppercase() {
        'A' => [0x00, 0x18, 0x24, 0x42, 0x42, 0x7E, 0x42, 0x42, 0x42, 0x42, 0x00, 0x00],
        'B' => [0x00, 0x7C, 0x42, 0x42, 0x7C, 0x42, 0x42, 0x42, 0x42, 0x7C, 0x00, 0x00],
        'C' => [0x00, 0x3C, 0x42, 0x40, 0x40, 0x40, 0x40, 0x40, 0x42, 0x3C, 0x00, 0x00],
        'D' => [0x00, 0x78, 0x44, 0x42, 0x42, 0x42, 0x42, 0x42, 0x44, 0x78, 0x00, 0x00],
        'E' => [0x00, 0x7E, 0x40, 0x40, 0x40, 0x7C, 0x40, 0x40, 0x40, 0x7E, 0x00, 0x00],
        'F' => [0x00, 0x7E, 0x40, 0x40, 0x40, 0x7C, 0x40, 0x40, 0x40, 0x40, 0x00, 0x00],
        'G' => [0x00, 0x3C, 0x42, 0x40, 0x40, 0x4E, 0x42, 0x42, 0x46, 0x3A, 0x00, 0x00],
        'H' => [0x00, 0x42, 0x42, 0x42, 0x42, 0x7E, 0x42, 0x42, 0x42, 0x42, 0x00, 0x00],
        'I' => [0x00, 0x3E, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x3E, 0x00, 0x00],
        'J' => [0x00, 0x1E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x44, 0x44, 0x38, 0x00, 0x00],
        'K' => [0x00, 0x42, 0x44, 0x48, 0x50, 0x60, 0x50, 0x48, 0x44, 0x42, 0x00, 0x00],
        'L' => [0x00, 0x40, 0x40, 0x40, 0x40, 0x40, 0x40, 0x40, 0x40, 0x7E, 0x00, 0x00],
        'M' => [0x00, 0x42, 0x66, 0x5A, 0x42, 0x42, 0x42, 0x42, 0x42, 0x42, 0x00, 0x00],
        'N' => [0x00, 0x42, 0x62, 0x52, 0x4A, 0x46, 0x42, 0x42, 0x42, 0x42, 0x00, 0x00],
        'O' => [0x00, 0x3C, 0x42, 0x42, 0x42, 0x42, 0x42, 0x42, 0x42, 0x3C, 0x00, 0x00],
        'P' => [0x00, 0x7C, 0x42, 0x42, 0x42, 0x7C, 0x40, 0x40, 0x40, 0x40, 0x00, 0x00],
        'Q' => [0x00, 0x3C, 0x42, 0x42, 0x42, 0x42, 0x42, 0x4A, 0x44, 0x3A, 0x00, 0x00],
        'R' => [0x00, 0x7C, 0x42, 0x42, 0x42, 0x7C, 0x48, 0x44, 0x42, 0x42, 0x00, 0x00],
        'S' => [0x00, 0x3C, 0x42, 0x40, 0x30, 0x0C, 0x02, 0x42, 0x42, 0x3C, 0x00, 0x00],
        'T' => [0x00, 0x7F, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x00, 0x00],
        'U' => [0x00, 0x42, 0x42, 0x42, 0x42, 0x42, 0x42, 0x42, 0x42, 0x3C, 0x00, 0x00],
        'V' => [0x00, 0x41, 0x41, 0x41, 0x22, 0x22, 0x14, 0x14, 0x08, 0x08, 0x00, 0x00],
        'W' => [0x00, 0x42, 0x42, 0x42, 0x42, 0x5A, 0x5A, 0x66, 0x42, 0x42, 0x00, 0x00],
        'X' => [0x00, 0x42, 0x42, 0x24, 0x18, 0x18, 0x24, 0x42, 0x42, 0x42, 0x00, 0x00],
        'Y' => [0x00, 0x41, 0x22, 0x14, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x00, 0x00],
        'Z' => [0x00, 0x7E, 0x02, 0x04, 0x08, 0x10, 0x20, 0x40, 0x40, 0x7E, 0x00, 0x00],
        '0' => [0x00, 0x3C, 0x42, 0x46, 0x4A, 0x52, 0x62, 0x42, 0x42, 0x3C, 0x00, 0x00],
        '1' => [0x00, 0x08, 0x18, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x3E, 0x00, 0x00],
        '2' => [0x00, 0x3C, 0x42, 0x02, 0x04, 0x08, 0x10, 0x20, 0x40, 0x7E, 0x00, 0x00],
        '3' => [0x00, 0x3C, 0x42, 0x02, 0x1C, 0x02, 0x02, 0x02, 0x42, 0x3C, 0x00, 0x00],
        '4' => [0x00, 0x04, 0x0C, 0x14, 0x24, 0x44, 0x7E, 0x04, 0x04, 0x04, 0x00, 0x00],
        '5' => [0x00, 0x7E, 0x40, 0x40, 0x7C, 0x02, 0x02, 0x02, 0x42, 0x3C, 0x00, 0x00],
        '6' => [0x00, 0x1C, 0x20, 0x40, 0x7C, 0x42, 0x42, 0x42, 0x42, 0x3C, 0x00, 0x00],
        '7' => [0x00, 0x7E, 0x02, 0x04, 0x08, 0x08, 0x10, 0x10, 0x20, 0x20, 0x00, 0x00],
        '8' => [0x00, 0x3C, 0x42, 0x42, 0x3C, 0x42, 0x42, 0x42, 0x42, 0x3C, 0x00, 0x00],
        '9' => [0x00, 0x3C, 0x42, 0x42, 0x42, 0x3E, 0x02, 0x04, 0x08, 0x70, 0x00, 0x00],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x18, 0x18, 0x00, 0x00],
        ':' => [0x00, 0x00, 0x18, 0x18, 0x00, 0x00, 0x00, 0x18, 0x18, 0x00, 0x00, 0x00],
        '-' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x7E, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
        '_' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x7E, 0x00],
        '%' => [0x00, 0x62, 0x64, 0x08, 0x08, 0x10, 0x10, 0x20, 0x26, 0x46, 0x00, 0x00],
        _ => return None,
    };
    Some(rows)
}
