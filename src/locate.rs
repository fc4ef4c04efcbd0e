//! Geometry locator.
//! Finds the four corners of the board in an arbitrary photo or screenshot.
//! Marks local contrast against a box-filtered mean (robust to uneven
//! lighting and to either board/table polarity), fills whatever that contrast
//! encloses, traces the outer borders of the filled blobs with `imageproc`,
//! and keeps the largest one that simplifies to a convex, near-square
//! quadrilateral.
//! Fails loudly: a missing board is a `BoardNotFound`, never a guess.

use crate::config::LocatorParams;
use crate::error::{NotFoundReason, RecognitionError};
use image::{GrayImage, Luma, RgbImage};
use imageproc::contours::{BorderType, find_contours};
use imageproc::distance_transform::Norm;
use imageproc::filter::box_filter;
use imageproc::geometry::{approximate_polygon_dp, arc_length, min_area_rect};
use imageproc::morphology::{dilate, erode};
use imageproc::point::Point;
use imageproc::region_labelling::{Connectivity, connected_components};
use log::{debug, info};
use std::time::Instant;

/// Board corners in source-image pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CornerSet {
    pub top_left: (f32, f32),
    pub top_right: (f32, f32),
    pub bottom_right: (f32, f32),
    pub bottom_left: (f32, f32),
}

impl CornerSet {
    /// Corners of the whole `width x height` frame.
    pub fn full_frame(width: u32, height: u32) -> Self {
        let (r, b) = (width.saturating_sub(1) as f32, height.saturating_sub(1) as f32);
        Self {
            top_left: (0.0, 0.0),
            top_right: (r, 0.0),
            bottom_right: (r, b),
            bottom_left: (0.0, b),
        }
    }

    /// Clockwise from top-left.
    pub fn as_array(&self) -> [(f32, f32); 4] {
        [self.top_left, self.top_right, self.bottom_right, self.bottom_left]
    }

    pub fn top_edge(&self) -> f32 {
        distance(self.top_left, self.top_right)
    }

    pub fn bottom_edge(&self) -> f32 {
        distance(self.bottom_left, self.bottom_right)
    }

    pub fn left_edge(&self) -> f32 {
        distance(self.top_left, self.bottom_left)
    }

    pub fn right_edge(&self) -> f32 {
        distance(self.top_right, self.bottom_right)
    }

    /// Mean horizontal edge over mean vertical edge.
    pub fn aspect(&self) -> f32 {
        let vertical = self.left_edge() + self.right_edge();
        if vertical <= f32::EPSILON {
            return f32::INFINITY;
        }
        (self.top_edge() + self.bottom_edge()) / vertical
    }
}

fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

/// Orders four points: min(x+y) is top-left, max(x+y) bottom-right,
/// max(x-y) top-right, min(x-y) bottom-left.
pub fn order_corners(points: [(f32, f32); 4]) -> CornerSet {
    let pick = |key: &dyn Fn(&(f32, f32)) -> f32, largest: bool| {
        let mut best = points[0];
        for p in &points[1..] {
            let better = if largest { key(p) > key(&best) } else { key(p) < key(&best) };
            if better {
                best = *p;
            }
        }
        best
    };
    let sum = |p: &(f32, f32)| p.0 + p.1;
    let diff = |p: &(f32, f32)| p.0 - p.1;
    CornerSet {
        top_left: pick(&sum, false),
        bottom_right: pick(&sum, true),
        top_right: pick(&diff, true),
        bottom_left: pick(&diff, false),
    }
}

/// Local-contrast map. A pixel is marked (255) when it differs from the
/// mean of its `(2r+1)^2` window by more than `offset`, so flat regions stay
/// clear and both sides of every edge are marked. Polarity does not matter:
/// a dark board on a light table marks the same outline as a light one.
pub fn adaptive_threshold(gray: &GrayImage, block_radius: u32, offset: i16) -> GrayImage {
    let mean = box_filter(gray, block_radius, block_radius);
    let mut out = GrayImage::new(gray.width(), gray.height());
    for ((o, &v), &m) in out.iter_mut().zip(gray.iter()).zip(mean.iter()) {
        if (v as i16 - m as i16).abs() > offset {
            *o = 255;
        }
    }
    out
}

/// Fills every region the marked pixels of `edges` enclose.
///
/// Marks are first grown by `gap_radius` so hairline breaks in an outline
/// still close. Unmarked pixels 4-connected to the image frame are outside;
/// everything else (marks included) becomes 255. Pieces, square borders and
/// coordinates inside the board therefore vanish into one solid blob.
pub fn fill_enclosed(edges: &GrayImage, gap_radius: u8) -> GrayImage {
    let (width, height) = edges.dimensions();
    let closed = dilate(edges, Norm::LInf, gap_radius);
    if width == 0 || height == 0 {
        return closed;
    }
    let labels = connected_components(&closed, Connectivity::Four, Luma([255u8]));
    let max_label = labels.iter().copied().max().unwrap_or(0) as usize;
    let mut outside = vec![false; max_label + 1];
    for (x, y, label) in labels.enumerate_pixels() {
        if x == 0 || y == 0 || x == width - 1 || y == height - 1 {
            outside[label[0] as usize] = true;
        }
    }
    // label 0 is the marks themselves
    outside[0] = false;

    let mut filled = GrayImage::new(width, height);
    for (o, label) in filled.iter_mut().zip(labels.iter()) {
        if !outside[*label as usize] {
            *o = 255;
        }
    }
    filled
}

/// Solid mask of the enclosed regions, shrunk back by the contrast window
/// and the gap closing so its outline sits on the board's outer edge.
pub fn board_mask(gray: &GrayImage, params: &LocatorParams) -> GrayImage {
    let edges = adaptive_threshold(gray, params.block_radius, params.offset);
    let filled = fill_enclosed(&edges, params.gap_radius);
    let shrink = (params.block_radius + params.gap_radius as u32).min(u8::MAX as u32) as u8;
    erode(&filled, Norm::LInf, shrink)
}

/// Finds the board in `image`.
pub fn locate_board(image: &RgbImage, params: &LocatorParams) -> Result<CornerSet, RecognitionError> {
    let (width, height) = image.dimensions();
    if params.full_frame {
        debug!("full-frame mode: using the whole {}x{} image", width, height);
        return Ok(CornerSet::full_frame(width, height));
    }

    let start = Instant::now();
    let gray = image::imageops::grayscale(image);
    let mask = board_mask(&gray, params);
    let corners = locate_in_binary(&mask, params)?;
    debug!("locate latency: {:?}", start.elapsed());
    info!(
        "board corners: tl={:?} tr={:?} br={:?} bl={:?}",
        corners.top_left, corners.top_right, corners.bottom_right, corners.bottom_left
    );
    Ok(corners)
}

struct Candidate {
    points: Vec<Point<i32>>,
    area: f64,
}

/// Contour search over a filled board mask.
pub fn locate_in_binary(binary: &GrayImage, params: &LocatorParams) -> Result<CornerSet, RecognitionError> {
    let (width, height) = binary.dimensions();
    let image_area = (width as f64 * height as f64).max(1.0);

    let mut candidates: Vec<Candidate> = find_contours::<i32>(binary)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.points.len() >= 4)
        .filter(|c| !touches_border(&c.points, width, height))
        .map(|c| Candidate {
            area: polygon_area(&c.points),
            points: c.points,
        })
        .collect();
    debug!("{} candidate contours", candidates.len());
    if candidates.is_empty() {
        return Err(RecognitionError::BoardNotFound(NotFoundReason::NoContours));
    }
    candidates.sort_by(|a, b| b.area.total_cmp(&a.area));

    let mut first_rejection = None;
    for candidate in &candidates {
        let epsilon = (arc_length(&candidate.points, true) * params.epsilon_fraction).max(1.0);
        let quad = simplify_closed(approximate_polygon_dp(&candidate.points, epsilon, true), epsilon);
        if quad.len() != 4 || !is_convex(&quad) {
            continue;
        }

        let aspect = bounding_aspect(&candidate.points);
        let area_fraction = (candidate.area / image_area) as f32;
        let reason = if (aspect - 1.0).abs() > params.aspect_tolerance {
            Some(NotFoundReason::NotSquare { aspect })
        } else if area_fraction < params.min_area_fraction {
            Some(NotFoundReason::TooSmall { area_fraction })
        } else {
            None
        };
        if let Some(reason) = reason {
            debug!("rejected quadrilateral: {}", reason);
            first_rejection.get_or_insert(reason);
            continue;
        }

        let rect = min_area_rect(&candidate.points).map(|p| (p.x as f32, p.y as f32));
        let corners = order_corners(rect);
        let aspect = corners.aspect();
        if (aspect - 1.0).abs() > params.aspect_tolerance {
            first_rejection.get_or_insert(NotFoundReason::NotSquare { aspect });
            continue;
        }
        return Ok(corners);
    }

    let reason = first_rejection.unwrap_or(NotFoundReason::NoQuadrilateral {
        candidates: candidates.len(),
    });
    Err(RecognitionError::BoardNotFound(reason))
}

fn touches_border(points: &[Point<i32>], width: u32, height: u32) -> bool {
    let (r, b) = (width as i32 - 1, height as i32 - 1);
    points.iter().any(|p| p.x <= 0 || p.y <= 0 || p.x >= r || p.y >= b)
}

/// Shoelace area of a closed polygon.
fn polygon_area(points: &[Point<i32>]) -> f64 {
    let n = points.len();
    let twice: i64 = (0..n)
        .map(|i| {
            let (a, b) = (points[i], points[(i + 1) % n]);
            a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64
        })
        .sum();
    twice.abs() as f64 / 2.0
}

fn bounding_aspect(points: &[Point<i32>]) -> f32 {
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (i32::MAX, i32::MAX, i32::MIN, i32::MIN);
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    (max_x - min_x + 1) as f32 / (max_y - min_y + 1) as f32
}

/// Drops the closing duplicate and any vertex lying within `epsilon` of the
/// line through its neighbours, until nothing changes.
fn simplify_closed(mut poly: Vec<Point<i32>>, epsilon: f64) -> Vec<Point<i32>> {
    poly.dedup();
    if poly.len() > 1 && poly.first() == poly.last() {
        poly.pop();
    }
    loop {
        let n = poly.len();
        if n <= 3 {
            return poly;
        }
        let redundant = (0..n).find(|&i| {
            let (prev, cur, next) = (poly[(i + n - 1) % n], poly[i], poly[(i + 1) % n]);
            point_line_distance(cur, prev, next) < epsilon
        });
        match redundant {
            Some(i) => {
                poly.remove(i);
            }
            None => return poly,
        }
    }
}

fn point_line_distance(p: Point<i32>, a: Point<i32>, b: Point<i32>) -> f64 {
    let (dx, dy) = ((b.x - a.x) as f64, (b.y - a.y) as f64);
    let len = (dx * dx + dy * dy).sqrt();
    if len < f64::EPSILON {
        return (((p.x - a.x) as f64).powi(2) + ((p.y - a.y) as f64).powi(2)).sqrt();
    }
    (dy * (p.x - a.x) as f64 - dx * (p.y - a.y) as f64).abs() / len
}

fn is_convex(poly: &[Point<i32>]) -> bool {
    let n = poly.len();
    let mut sign = 0i64;
    for i in 0..n {
        let (a, b, c) = (poly[i], poly[(i + 1) % n], poly[(i + 2) % n]);
        let cross = (b.x - a.x) as i64 * (c.y - b.y) as i64 - (b.y - a.y) as i64 * (c.x - b.x) as i64;
        if cross != 0 {
            if sign != 0 && cross.signum() != sign {
                return false;
            }
            sign = cross.signum();
        }
    }
    sign != 0
}
