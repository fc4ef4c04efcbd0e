//! Rectifier.
//! Maps the located quadrilateral onto an axis-aligned `S x S` square with a
//! perspective transform and resamples the source through it.
//! `S` is always a multiple of 8 so every board square is `S / 8` pixels.

use crate::error::{NotFoundReason, RecognitionError};
use crate::locate::CornerSet;
use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use log::debug;
use std::time::Instant;

/// Square, axis-aligned board image with rank 8 at the top.
#[derive(Clone, Debug, PartialEq)]
pub struct RectifiedBoard {
    image: RgbImage,
}

impl RectifiedBoard {
    /// Wraps an image that is already rectified. `None` unless it is square
    /// with a side that is a non-zero multiple of 8.
    pub fn from_image(image: RgbImage) -> Option<Self> {
        let (w, h) = image.dimensions();
        (w == h && w > 0 && w % 8 == 0).then_some(Self { image })
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn side(&self) -> u32 {
        self.image.width()
    }

    pub fn square_size(&self) -> u32 {
        self.side() / 8
    }
}

/// Pixel extent of the board: the rounded mean of the top and bottom edge
/// extents, snapped to the nearest multiple of 8 (at least 8).
pub fn board_side(corners: &CornerSet) -> u32 {
    let extent = (corners.top_edge() + corners.bottom_edge()) / 2.0 + 1.0;
    ((extent / 8.0).round() as u32).max(1) * 8
}

pub fn rectify(image: &RgbImage, corners: &CornerSet) -> Result<RectifiedBoard, RecognitionError> {
    let start = Instant::now();
    let side = board_side(corners);
    let far = (side - 1) as f32;
    let target = [(0.0, 0.0), (far, 0.0), (far, far), (0.0, far)];
    let projection = Projection::from_control_points(corners.as_array(), target)
        .ok_or(RecognitionError::BoardNotFound(NotFoundReason::Degenerate))?;

    let mut out = RgbImage::new(side, side);
    warp_into(image, &projection, Interpolation::Bilinear, Rgb([0, 0, 0]), &mut out);
    debug!("rectified to {}x{} in {:?}", side, side, start.elapsed());
    Ok(RectifiedBoard { image: out })
}
