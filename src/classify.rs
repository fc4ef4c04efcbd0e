//! Square classifier.
//! Closed-form heuristics, one square at a time, no state shared between squares.
//!
//! Stage A measures the mean colour of a lower-middle band. Board squares
//! have a narrow chromatic signature (R/G and R/B ratios) that piece
//! material does not, so a dark square with the background signature is
//! empty; anything else is a piece, white if bright and warm enough.
//!
//! Stage B binarizes an upper-middle region and reads the silhouette's
//! per-column occupancy profile: its mean (`top_width`) and standard
//! deviation (`width_std`) pick the piece type in a fixed order:
//! king, queen, knight, bishop, rook, and pawn for whatever is left.

use crate::board::SquareClass;
use crate::config::{OccupancyThresholds, SilhouetteThresholds, Theme};
use crate::squares::{SquareImage, square_name};
use image::{Pixel, RgbImage};
use rayon::prelude::*;
use shakmaty::{Color, Role};

/// Measurements taken from one square.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SquareFeatures {
    /// Mean R, G, B of the occupancy band.
    pub mean_rgb: [f32; 3],
    pub brightness: f32,
    /// R / (G + 1).
    pub rg_ratio: f32,
    /// R / (B + 1).
    pub rb_ratio: f32,
    /// Mean of the silhouette column profile; only measured on occupied squares.
    pub top_width: Option<f32>,
    /// Standard deviation of the silhouette column profile.
    pub width_std: Option<f32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SquareReport {
    pub rank: u8,
    pub file: u8,
    pub class: SquareClass,
    pub features: SquareFeatures,
    /// How close the square came to a different class. The smallest of the
    /// occupancy, colour and piece-type margins; empty squares only carry the
    /// occupancy margin.
    pub margin: f32,
    /// The piece type came from the final catch-all branch.
    pub fallback: bool,
}

impl SquareReport {
    pub fn name(&self) -> String {
        square_name(self.rank, self.file)
    }

    pub fn index(&self) -> usize {
        self.rank as usize * 8 + self.file as usize
    }

    pub fn ambiguous(&self, min_margin: f32) -> bool {
        self.margin < min_margin
    }
}

/// Stage A measurements over the theme's occupancy band.
pub fn occupancy_features(image: &RgbImage, t: &OccupancyThresholds) -> SquareFeatures {
    let (x0, y0, x1, y1) = t.sample.pixel_bounds(image.width(), image.height());
    let mut sum = [0f64; 3];
    for y in y0..y1 {
        for x in x0..x1 {
            let px = image.get_pixel(x, y);
            for (s, &c) in sum.iter_mut().zip(px.0.iter()) {
                *s += c as f64;
            }
        }
    }
    let n = ((x1 - x0) * (y1 - y0)) as f64;
    let [r, g, b] = sum.map(|s| s / n);
    SquareFeatures {
        mean_rgb: [r as f32, g as f32, b as f32],
        brightness: ((r + g + b) / 3.0) as f32,
        rg_ratio: (r / (g + 1.0)) as f32,
        rb_ratio: (r / (b + 1.0)) as f32,
        top_width: None,
        width_std: None,
    }
}

pub fn is_empty(features: &SquareFeatures, t: &OccupancyThresholds) -> bool {
    features.brightness < t.empty_max_brightness
        && t.empty_rg.contains(features.rg_ratio)
        && t.empty_rb.contains(features.rb_ratio)
}

pub fn piece_color(features: &SquareFeatures, t: &OccupancyThresholds) -> Color {
    let white = features.brightness > t.white_min_brightness
        && features.rg_ratio > t.white_min_rg
        && features.rb_ratio > t.white_min_rb;
    if white { Color::White } else { Color::Black }
}

/// Distance to flipping a three-way conjunction, given each condition's
/// outcome and its gap to the threshold. A passing conjunction flips when any
/// one condition does; a failing one needs every failing condition to flip.
fn flip_distance(checks: [(bool, f32); 3]) -> f32 {
    if checks.iter().all(|&(pass, _)| pass) {
        checks.iter().map(|&(_, gap)| gap).fold(f32::INFINITY, f32::min)
    } else {
        checks
            .iter()
            .filter(|&&(pass, _)| !pass)
            .map(|&(_, gap)| gap)
            .fold(0.0, f32::max)
    }
}

/// Margin of the empty/occupied decision. Brightness gaps are scaled by
/// 1/255 so they weigh the same as the ratio gaps.
pub fn occupancy_margin(features: &SquareFeatures, t: &OccupancyThresholds) -> f32 {
    flip_distance([
        (
            features.brightness < t.empty_max_brightness,
            (features.brightness - t.empty_max_brightness).abs() / 255.0,
        ),
        (t.empty_rg.contains(features.rg_ratio), t.empty_rg.edge_distance(features.rg_ratio)),
        (t.empty_rb.contains(features.rb_ratio), t.empty_rb.edge_distance(features.rb_ratio)),
    ])
}

/// Margin of the white/black decision, scaled like [`occupancy_margin`].
pub fn color_margin(features: &SquareFeatures, t: &OccupancyThresholds) -> f32 {
    flip_distance([
        (
            features.brightness > t.white_min_brightness,
            (features.brightness - t.white_min_brightness).abs() / 255.0,
        ),
        (features.rg_ratio > t.white_min_rg, (features.rg_ratio - t.white_min_rg).abs()),
        (features.rb_ratio > t.white_min_rb, (features.rb_ratio - t.white_min_rb).abs()),
    ])
}

/// Fraction of piece-material pixels in each column of the silhouette region.
/// White material is brighter than `white_threshold`, black material darker
/// than `black_threshold`.
pub fn silhouette_profile(image: &RgbImage, t: &SilhouetteThresholds, color: Color) -> Vec<f32> {
    let (x0, y0, x1, y1) = t.sample.pixel_bounds(image.width(), image.height());
    let rows = (y1 - y0) as f32;
    (x0..x1)
        .map(|x| {
            let hits = (y0..y1)
                .filter(|&y| {
                    let luma = image.get_pixel(x, y).to_luma()[0];
                    match color {
                        Color::White => luma > t.white_threshold,
                        Color::Black => luma < t.black_threshold,
                    }
                })
                .count();
            hits as f32 / rows
        })
        .collect()
}

/// `(top_width, width_std)`: mean and population standard deviation.
pub fn profile_stats(profile: &[f32]) -> (f32, f32) {
    if profile.is_empty() {
        return (0.0, 0.0);
    }
    let n = profile.len() as f32;
    let mean = profile.iter().sum::<f32>() / n;
    let var = profile.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
    (mean, var.sqrt())
}

/// Piece type from the silhouette features, first match wins.
/// Returns `(role, margin, fallback)`.
pub fn decide_role(top_width: f32, width_std: f32, t: &SilhouetteThresholds) -> (Role, f32, bool) {
    let mut margin = (top_width - t.very_wide).abs();
    if top_width > t.very_wide {
        return (Role::King, margin, false);
    }
    margin = margin.min((top_width - t.wide).abs());
    if top_width > t.wide {
        return (Role::Queen, margin, false);
    }
    margin = margin.min((width_std - t.irregular).abs());
    if width_std > t.irregular {
        return (Role::Knight, margin, false);
    }
    margin = margin.min(t.bishop.edge_distance(top_width));
    if t.bishop.contains(top_width) {
        return (Role::Bishop, margin, false);
    }
    margin = margin.min((top_width - t.narrow).abs());
    if top_width < t.narrow {
        return (Role::Rook, margin, false);
    }
    (Role::Pawn, margin, true)
}

pub fn classify_square(square: &SquareImage, theme: &Theme) -> SquareReport {
    let mut features = occupancy_features(&square.image, &theme.occupancy);
    let mut report = SquareReport {
        rank: square.rank,
        file: square.file,
        class: SquareClass::Empty,
        features,
        margin: occupancy_margin(&features, &theme.occupancy),
        fallback: false,
    };
    if is_empty(&features, &theme.occupancy) {
        return report;
    }

    let color = piece_color(&features, &theme.occupancy);
    let profile = silhouette_profile(&square.image, &theme.silhouette, color);
    let (top_width, width_std) = profile_stats(&profile);
    let (role, margin, fallback) = decide_role(top_width, width_std, &theme.silhouette);
    features.top_width = Some(top_width);
    features.width_std = Some(width_std);

    report.class = SquareClass::occupied(color, role);
    report.features = features;
    report.margin = report
        .margin
        .min(color_margin(&features, &theme.occupancy))
        .min(margin);
    report.fallback = fallback;
    report
}

/// Classifies every square; the output order equals the input order.
pub fn classify_all(squares: &[SquareImage], theme: &Theme, parallel: bool) -> Vec<SquareReport> {
    if parallel {
        squares.par_iter().map(|s| classify_square(s, theme)).collect()
    } else {
        squares.iter().map(|s| classify_square(s, theme)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Band;
    use crate::synth::{Palette, render_square};
    use approx::assert_relative_eq;
    use image::Rgb;

    fn square(image: RgbImage) -> SquareImage {
        SquareImage { rank: 3, file: 4, image }
    }

    fn piece_square(color: Color, role: Role, light: bool, size: u32) -> SquareImage {
        square(render_square(SquareClass::occupied(color, role), light, &Palette::walnut(), size))
    }

    #[test]
    fn test_empty_squares_of_both_colors() {
        let theme = Theme::walnut();
        for light in [true, false] {
            let img = render_square(SquareClass::Empty, light, &Palette::walnut(), 80);
            let report = classify_square(&square(img), &theme);
            assert_eq!(report.class, SquareClass::Empty, "light={light}: {:?}", report.features);
            assert!(report.features.top_width.is_none());
            assert!(report.margin.is_finite());
            assert!(!report.ambiguous(0.02), "light={light}: margin {}", report.margin);
        }
    }

    #[test]
    fn test_every_piece_on_every_square_color() {
        let theme = Theme::walnut();
        for size in [64, 80] {
            for color in [Color::White, Color::Black] {
                for role in [Role::King, Role::Queen, Role::Rook, Role::Bishop, Role::Knight, Role::Pawn] {
                    for light in [true, false] {
                        let report = classify_square(&piece_square(color, role, light, size), &theme);
                        assert_eq!(
                            report.class,
                            SquareClass::occupied(color, role),
                            "size={size} light={light}: {:?}",
                            report.features
                        );
                        assert!(!report.ambiguous(0.02), "{role:?} margin {}", report.margin);
                    }
                }
            }
        }
    }

    #[test]
    fn test_brightness_at_threshold_is_occupied_every_time() {
        let mut theme = Theme::walnut();
        theme.occupancy.empty_max_brightness = 110.0;
        theme.occupancy.empty_rg = Band::new(1.0, 1.5);
        theme.occupancy.empty_rb = Band::new(1.0, 1.5);
        let img = RgbImage::from_pixel(40, 40, Rgb([130, 110, 90]));
        let first = classify_square(&square(img.clone()), &theme);
        assert_eq!(first.features.brightness, 110.0);
        assert_ne!(first.class, SquareClass::Empty);
        for _ in 0..20 {
            assert_eq!(classify_square(&square(img.clone()), &theme), first);
        }

        theme.occupancy.empty_max_brightness = 110.001;
        assert_eq!(classify_square(&square(img), &theme).class, SquareClass::Empty);
    }

    #[test]
    fn test_squares_near_the_occupancy_threshold_are_ambiguous() {
        let mut theme = Theme::walnut();
        theme.occupancy.empty_max_brightness = 110.0;
        theme.occupancy.empty_rg = Band::new(1.0, 1.5);
        theme.occupancy.empty_rb = Band::new(1.0, 1.5);
        let img = RgbImage::from_pixel(40, 40, Rgb([130, 110, 90]));

        let occupied = classify_square(&square(img.clone()), &theme);
        assert_ne!(occupied.class, SquareClass::Empty);
        assert_relative_eq!(occupied.margin, 0.0);
        assert!(occupied.ambiguous(0.02));

        theme.occupancy.empty_max_brightness = 111.0;
        let empty = classify_square(&square(img), &theme);
        assert_eq!(empty.class, SquareClass::Empty);
        assert_relative_eq!(empty.margin, 1.0 / 255.0, epsilon = 1e-6);
        assert!(empty.ambiguous(0.02));
        assert!(!empty.ambiguous(0.001));
    }

    #[test]
    fn test_flip_distance() {
        // all pass: the weakest condition decides
        assert_relative_eq!(flip_distance([(true, 0.3), (true, 0.1), (true, 0.2)]), 0.1);
        // some fail: every failing condition must flip
        assert_relative_eq!(flip_distance([(false, 0.3), (true, 0.01), (false, 0.2)]), 0.3);
    }

    #[test]
    fn test_color_margin_tracks_white_thresholds() {
        let t = Theme::walnut().occupancy;
        let features = SquareFeatures {
            brightness: t.white_min_brightness + 2.55,
            rg_ratio: t.white_min_rg + 0.5,
            rb_ratio: t.white_min_rb + 0.5,
            ..SquareFeatures::default()
        };
        assert_eq!(piece_color(&features, &t), Color::White);
        assert_relative_eq!(color_margin(&features, &t), 0.01, epsilon = 1e-5);

        let dark = SquareFeatures { brightness: 40.0, ..features };
        assert_eq!(piece_color(&dark, &t), Color::Black);
        assert_relative_eq!(color_margin(&dark, &t), (t.white_min_brightness - 40.0) / 255.0, epsilon = 1e-5);
    }

    #[test]
    fn test_color_ratios() {
        let img = RgbImage::from_pixel(16, 16, Rgb([120, 59, 39]));
        let f = occupancy_features(&img, &Theme::walnut().occupancy);
        assert_relative_eq!(f.rg_ratio, 2.0);
        assert_relative_eq!(f.rb_ratio, 3.0);
        assert_relative_eq!(f.brightness, 72.666_67, epsilon = 1e-3);
    }

    #[test]
    fn test_profile_stats() {
        let (mean, std) = profile_stats(&[1.0, 1.0, 0.0, 0.0]);
        assert_relative_eq!(mean, 0.5);
        assert_relative_eq!(std, 0.5);
        assert_eq!(profile_stats(&[]), (0.0, 0.0));
    }

    #[test]
    fn test_decision_order() {
        let t = Theme::walnut().silhouette;
        assert_eq!(decide_role(0.9, 0.5, &t).0, Role::King);
        assert_eq!(decide_role(0.6, 0.5, &t).0, Role::Queen);
        assert_eq!(decide_role(0.45, 0.49, &t).0, Role::Knight);
        assert_eq!(decide_role(0.40, 0.05, &t).0, Role::Bishop);
        assert_eq!(decide_role(0.05, 0.05, &t).0, Role::Rook);
        let (role, margin, fallback) = decide_role(0.25, 0.0, &t);
        assert_eq!(role, Role::Pawn);
        assert!(fallback);
        assert_relative_eq!(margin, 0.07, epsilon = 1e-6);
    }

    #[test]
    fn test_knight_beats_bishop_only_when_irregular() {
        let t = Theme::walnut().silhouette;
        assert_eq!(decide_role(0.4, 0.31, &t).0, Role::Knight);
        assert_eq!(decide_role(0.4, 0.29, &t).0, Role::Bishop);
    }

    #[test]
    fn test_black_silhouette_counts_dark_pixels() {
        let mut img = RgbImage::from_pixel(8, 8, Rgb([200, 200, 200]));
        for y in 0..8 {
            img.put_pixel(2, y, Rgb([10, 10, 10]));
        }
        let t = SilhouetteThresholds {
            sample: crate::config::Region { top: 0.0, bottom: 1.0, left: 0.0, right: 0.5 },
            ..Theme::walnut().silhouette
        };
        assert_eq!(silhouette_profile(&img, &t, Color::Black), vec![0.0, 0.0, 1.0, 0.0]);
        assert_eq!(silhouette_profile(&img, &t, Color::White), vec![1.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let theme = Theme::walnut();
        let squares: Vec<SquareImage> = [Role::King, Role::Pawn, Role::Knight, Role::Rook]
            .into_iter()
            .enumerate()
            .map(|(i, role)| SquareImage {
                rank: 0,
                file: i as u8,
                ..piece_square(Color::Black, role, i % 2 == 0, 64)
            })
            .collect();
        let sequential = classify_all(&squares, &theme, false);
        let parallel = classify_all(&squares, &theme, true);
        assert_eq!(sequential, parallel);
        assert_eq!(parallel.iter().map(|r| r.file).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    }
}
