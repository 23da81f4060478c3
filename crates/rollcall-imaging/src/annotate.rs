//! Face box annotation.
//!
//! Draws a green outline around every face and writes its label just above
//! the box: recognized names in green, "Unknown" in red.

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use rollcall_core::BoundingBox;
use std::path::Path;
use thiserror::Error;

use crate::font;

pub const KNOWN_COLOR: Rgb<u8> = Rgb([0, 128, 0]);
pub const UNKNOWN_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const BOX_THICKNESS: i32 = 2;
/// Vertical distance from the box top to the label origin.
const LABEL_OFFSET: i32 = 15;
const LABEL_SCALE: f32 = 14.0;
const UNKNOWN_TEXT: &str = "Unknown";

#[derive(Error, Debug)]
pub enum AnnotateError {
    #[error("cannot annotate an empty image")]
    EmptyImage,
    #[error("face {index} has a non-finite bounding box")]
    InvalidBox { index: usize },
}

/// What to write next to a face box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaceLabel {
    Known(String),
    Unknown,
}

impl FaceLabel {
    pub fn text(&self) -> &str {
        match self {
            FaceLabel::Known(name) => name,
            FaceLabel::Unknown => UNKNOWN_TEXT,
        }
    }

    pub fn color(&self) -> Rgb<u8> {
        match self {
            FaceLabel::Known(_) => KNOWN_COLOR,
            FaceLabel::Unknown => UNKNOWN_COLOR,
        }
    }
}

/// Draws face boxes and labels onto copies of images.
pub struct Annotator {
    font: Option<FontVec>,
}

impl Annotator {
    pub fn new(font: Option<FontVec>) -> Self {
        Self { font }
    }

    /// Annotator using the configured font or the first system font found.
    pub fn with_font_search(configured: Option<&Path>) -> Self {
        Self::new(font::find_font(configured))
    }

    /// Annotator that draws boxes only.
    pub fn without_font() -> Self {
        Self::new(None)
    }

    /// Return a copy of `image` with every face boxed and labelled.
    pub fn annotate(
        &self,
        image: &RgbImage,
        faces: &[(BoundingBox, FaceLabel)],
    ) -> Result<RgbImage, AnnotateError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(AnnotateError::EmptyImage);
        }

        let mut out = image.clone();
        for (index, (face, label)) in faces.iter().enumerate() {
            let (x, y, w, h) =
                pixel_rect(face, out.width(), out.height()).ok_or(AnnotateError::InvalidBox { index })?;

            for inset in 0..BOX_THICKNESS {
                let (iw, ih) = (w - 2 * inset, h - 2 * inset);
                if iw <= 0 || ih <= 0 {
                    break;
                }
                let rect = Rect::at(x + inset, y + inset).of_size(iw as u32, ih as u32);
                draw_hollow_rect_mut(&mut out, rect, KNOWN_COLOR);
            }

            if let Some(font) = &self.font {
                draw_text_mut(
                    &mut out,
                    label.color(),
                    x,
                    y - LABEL_OFFSET,
                    PxScale::from(LABEL_SCALE),
                    font,
                    label.text(),
                );
            }
        }

        Ok(out)
    }
}

/// Integer corner and size of a box, covering `x..=x+width`; at least one pixel each way.
///
/// Edges are clamped to just outside the image so that off-image edges stay
/// invisible and huge coordinates cannot overflow later arithmetic.
fn pixel_rect(face: &BoundingBox, img_w: u32, img_h: u32) -> Option<(i32, i32, i32, i32)> {
    let coords = [face.x, face.y, face.width, face.height];
    if coords.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let margin = BOX_THICKNESS as f32;
    let clamp_x = |v: f32| v.round().clamp(-margin, img_w as f32 + margin);
    let clamp_y = |v: f32| v.round().clamp(-margin, img_h as f32 + margin);

    let left = clamp_x(face.x);
    let top = clamp_y(face.y);
    let right = clamp_x(face.x + face.width.max(0.0));
    let bottom = clamp_y(face.y + face.height.max(0.0));

    let x = left as i32;
    let y = top as i32;
    Some((x, y, right as i32 - x + 1, bottom as i32 - y + 1))
}
