//! Calibration module.
//! Derives Stage A colour thresholds for a new visual theme from one
//! rectified image of the standard starting position: ranks 3-6 show the
//! bare square colours, ranks 1-2 white material and ranks 7-8 black.
//! Silhouette thresholds are carried over from the base theme.

use crate::classify::occupancy_features;
use crate::config::{Band, Theme};
use crate::rectify::RectifiedBoard;
use log::{info, warn};

const BRIGHTNESS_PAD: f32 = 5.0;
const RATIO_PAD: f32 = 0.05;

/// Min/max of the Stage A features over a group of squares.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleStats {
    pub count: usize,
    pub brightness: (f32, f32),
    pub rg: (f32, f32),
    pub rb: (f32, f32),
}

impl SampleStats {
    fn new() -> Self {
        Self {
            count: 0,
            brightness: (f32::INFINITY, f32::NEG_INFINITY),
            rg: (f32::INFINITY, f32::NEG_INFINITY),
            rb: (f32::INFINITY, f32::NEG_INFINITY),
        }
    }

    fn add(&mut self, brightness: f32, rg: f32, rb: f32) {
        let widen = |range: &mut (f32, f32), v: f32| {
            range.0 = range.0.min(v);
            range.1 = range.1.max(v);
        };
        self.count += 1;
        widen(&mut self.brightness, brightness);
        widen(&mut self.rg, rg);
        widen(&mut self.rb, rb);
    }

    /// Whether two closed ranges intersect.
    fn overlaps(range: (f32, f32), other: (f32, f32)) -> bool {
        range.0 <= other.1 && other.0 <= range.1
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Calibration {
    pub theme: Theme,
    pub empty: SampleStats,
    pub white: SampleStats,
    pub black: SampleStats,
    /// Observations the new thresholds cannot fully separate.
    pub conflicts: Vec<String>,
}

pub fn calibrate_from_start_position(board: &RectifiedBoard, base: &Theme) -> Calibration {
    let (mut empty, mut white, mut black) = (SampleStats::new(), SampleStats::new(), SampleStats::new());
    for square in board.squares() {
        let f = occupancy_features(&square.image, &base.occupancy);
        let group = match square.rank {
            0 | 1 => &mut white,
            6 | 7 => &mut black,
            _ => &mut empty,
        };
        group.add(f.brightness, f.rg_ratio, f.rb_ratio);
    }

    let mut theme = base.clone();
    let occ = &mut theme.occupancy;
    occ.empty_max_brightness = empty.brightness.1 + BRIGHTNESS_PAD;
    occ.empty_rg = Band::new(empty.rg.0 - RATIO_PAD, empty.rg.1 + RATIO_PAD);
    occ.empty_rb = Band::new(empty.rb.0 - RATIO_PAD, empty.rb.1 + RATIO_PAD);
    occ.white_min_brightness = (white.brightness.0 + black.brightness.1) / 2.0;
    occ.white_min_rg = white.rg.0 - RATIO_PAD;
    occ.white_min_rb = white.rb.0 - RATIO_PAD;

    let mut conflicts = Vec::new();
    for (name, stats) in [("white", &white), ("black", &black)] {
        let looks_empty = stats.brightness.0 < occ.empty_max_brightness
            && SampleStats::overlaps(stats.rg, (occ.empty_rg.low, occ.empty_rg.high))
            && SampleStats::overlaps(stats.rb, (occ.empty_rb.low, occ.empty_rb.high));
        if looks_empty {
            conflicts.push(format!("{} material overlaps the empty-square signature", name));
        }
    }
    if black.brightness.1 >= white.brightness.0 {
        conflicts.push("black material is as bright as white material".to_string());
    }
    for conflict in &conflicts {
        warn!("calibration: {}", conflict);
    }
    info!(
        "calibrated empty band: brightness < {:.1}, R/G {:.2}..{:.2}, R/B {:.2}..{:.2}",
        occ.empty_max_brightness, occ.empty_rg.low, occ.empty_rg.high, occ.empty_rb.low, occ.empty_rb.high
    );

    Calibration {
        theme,
        empty,
        white,
        black,
        conflicts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{BoardState, SquareClass};
    use crate::classify::classify_all;
    use crate::synth::{Palette, RenderOptions, render_board};

    fn start_board(palette: &Palette) -> RectifiedBoard {
        let options = RenderOptions { square_size: 64, border: 0 };
        let image = render_board(&BoardState::starting_position(), palette, &options);
        RectifiedBoard::from_image(image).unwrap()
    }

    #[test]
    fn test_groups_have_expected_sizes() {
        let calibration = calibrate_from_start_position(&start_board(&Palette::walnut()), &Theme::walnut());
        assert_eq!(calibration.empty.count, 32);
        assert_eq!(calibration.white.count, 16);
        assert_eq!(calibration.black.count, 16);
        assert!(calibration.conflicts.is_empty(), "{:?}", calibration.conflicts);
    }

    #[test]
    fn test_recovers_broken_occupancy_thresholds() {
        let board = start_board(&Palette::walnut());
        let mut broken = Theme::walnut();
        broken.occupancy.empty_max_brightness = 0.0;
        broken.occupancy.white_min_brightness = 255.0;

        let squares: Vec<_> = board.squares().collect();
        let before = classify_all(&squares, &broken, false);
        assert!(before.iter().all(|r| r.class != SquareClass::Empty));

        let calibration = calibrate_from_start_position(&board, &broken);
        let after = classify_all(&squares, &calibration.theme, false);
        let mut classes = [SquareClass::Empty; 64];
        for report in &after {
            classes[report.index()] = report.class;
        }
        assert_eq!(BoardState::assemble(&classes), BoardState::starting_position());
    }

    #[test]
    fn test_reports_indistinguishable_material() {
        let mut palette = Palette::walnut();
        palette.black_piece = palette.dark_square;
        let calibration = calibrate_from_start_position(&start_board(&palette), &Theme::walnut());
        assert!(!calibration.conflicts.is_empty());
    }
}
