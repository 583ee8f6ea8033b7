//! Labelled screenshots: numbered bounding boxes over a capture.
//!
//! Labels use a built-in 3x5 digit font so no font file is needed at runtime.

use std::path::Path;

use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use tracing::{debug, instrument};

use crate::core::element::{BoundingBox, Capability, Element, Point};
use crate::core::grid::SubRegion;

const CLICKABLE_BOX: Rgb<u8> = Rgb([230, 30, 30]);
const FOCUSABLE_BOX: Rgb<u8> = Rgb([30, 90, 230]);
const GUIDE: Rgb<u8> = Rgb([40, 180, 60]);
const DARK: Rgb<u8> = Rgb([10, 10, 10]);
const LIGHT: Rgb<u8> = Rgb([255, 250, 250]);

#[rustfmt::skip]
static DIGITS: [[u8; 5]; 10] = [
    [0b111, 0b101, 0b101, 0b101, 0b111],
    [0b010, 0b110, 0b010, 0b010, 0b111],
    [0b111, 0b001, 0b111, 0b100, 0b111],
    [0b111, 0b001, 0b111, 0b001, 0b111],
    [0b101, 0b101, 0b111, 0b001, 0b001],
    [0b111, 0b100, 0b111, 0b001, 0b111],
    [0b111, 0b100, 0b111, 0b101, 0b111],
    [0b111, 0b001, 0b001, 0b001, 0b001],
    [0b111, 0b101, 0b111, 0b101, 0b111],
    [0b111, 0b101, 0b111, 0b001, 0b111],
];

#[derive(Debug, Clone, Copy, Default)]
pub struct AnnotateOptions {
    /// Light labels on dark backgrounds are swapped for dark UI themes.
    pub dark_mode: bool,
    /// Mark the nine sub-region points inside every box.
    pub grid: bool,
}

/// Draw every element's box and 1-based index onto `src` and save to `dest`.
#[instrument(skip_all, fields(src = %src.display(), elements = elements.len()))]
pub fn annotate_screenshot(
    src: &Path,
    dest: &Path,
    elements: &[Element],
    options: AnnotateOptions,
) -> Result<()> {
    let mut img = image::open(src)
        .with_context(|| format!("open screenshot {}", src.display()))?
        .to_rgb8();
    let scale = (img.width() / 270).max(2);
    let (fg, bg) = if options.dark_mode { (DARK, LIGHT) } else { (LIGHT, DARK) };

    for (idx, elem) in elements.iter().enumerate() {
        let Some(rect) = to_rect(&elem.bbox) else {
            debug!(id = %elem.id, "skipping degenerate box");
            continue;
        };
        let color = match elem.capability {
            Capability::Clickable => CLICKABLE_BOX,
            Capability::Focusable => FOCUSABLE_BOX,
        };
        draw_hollow_rect_mut(&mut img, rect, color);
        if let Some(inner) = shrink(rect) {
            draw_hollow_rect_mut(&mut img, inner, color);
        }
        if options.grid {
            for region in SubRegion::ALL {
                draw_dot(&mut img, region.point_in(&elem.bbox), scale, GUIDE);
            }
        }
        draw_label(&mut img, &(idx + 1).to_string(), elem.center(), scale, fg, bg);
    }

    img.save(dest)
        .with_context(|| format!("write labelled screenshot {}", dest.display()))?;
    Ok(())
}

fn to_rect(bbox: &BoundingBox) -> Option<Rect> {
    let width = u32::try_from(bbox.width()).ok().filter(|w| *w > 0)?;
    let height = u32::try_from(bbox.height()).ok().filter(|h| *h > 0)?;
    Some(Rect::at(bbox.top_left.0, bbox.top_left.1).of_size(width, height))
}

fn shrink(rect: Rect) -> Option<Rect> {
    (rect.width() > 2 && rect.height() > 2)
        .then(|| Rect::at(rect.left() + 1, rect.top() + 1).of_size(rect.width() - 2, rect.height() - 2))
}

fn draw_dot(img: &mut RgbImage, (x, y): Point, scale: u32, color: Rgb<u8>) {
    let half = i32::try_from(scale / 2).unwrap_or(0);
    draw_filled_rect_mut(img, Rect::at(x - half, y - half).of_size(scale, scale), color);
}

/// Draw `text` (digits only) centered on `center` over a filled background.
fn draw_label(img: &mut RgbImage, text: &str, center: Point, scale: u32, fg: Rgb<u8>, bg: Rgb<u8>) {
    let glyphs: Vec<&[u8; 5]> = text
        .chars()
        .filter_map(|c| c.to_digit(10))
        .map(|d| &DIGITS[d as usize])
        .collect();
    let cell = i32::try_from(scale).unwrap_or(2);
    let count = i32::try_from(glyphs.len()).unwrap_or(0);
    let width = (count * 4 + 1) * cell;
    let height = 7 * cell;
    let left = center.0 - width / 2;
    let top = center.1 - height / 2;

    draw_filled_rect_mut(
        img,
        Rect::at(left, top).of_size(width.unsigned_abs(), height.unsigned_abs()),
        bg,
    );
    for (i, glyph) in (0..).zip(glyphs) {
        let glyph_left = left + cell + i * 4 * cell;
        for (row, bits) in (0..).zip(glyph.iter()) {
            for col in 0..3 {
                if bits & (0b100 >> col) != 0 {
                    draw_filled_rect_mut(
                        img,
                        Rect::at(glyph_left + col * cell, top + cell + row * cell).of_size(scale, scale),
                        fg,
                    );
                }
            }
        }
    }
}
