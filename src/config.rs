//! Config module.
//! Manages I/O for board_config.json (locator parameters, active theme, thresholds).
//! Uses serde for JSON serialization.
//! Every classifier threshold is theme data: a new board/piece set is a new
//! `themes` entry, not a code change.
//! Missing files fall back to the built-in defaults.

use crate::error::ConfigError;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "board_config.json";
pub const DEFAULT_THEME: &str = "walnut";

/// Rectangular sub-region of a square, as fractions of its width and height.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

impl Region {
    /// Half-open pixel bounds `(x0, y0, x1, y1)` inside a `width x height`
    /// image. Always at least one pixel wide and tall.
    pub fn pixel_bounds(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let span = |lo: f32, hi: f32, len: u32| {
            let start = ((lo.clamp(0.0, 1.0) * len as f32).floor() as u32).min(len.saturating_sub(1));
            let end = ((hi.clamp(0.0, 1.0) * len as f32).floor() as u32).clamp(start + 1, len.max(1));
            (start, end)
        };
        let (x0, x1) = span(self.left, self.right, width);
        let (y0, y1) = span(self.top, self.bottom, height);
        (x0, y0, x1, y1)
    }
}

/// Open interval `(low, high)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub low: f32,
    pub high: f32,
}

impl Band {
    pub const fn new(low: f32, high: f32) -> Self {
        Self { low, high }
    }

    #[inline]
    pub fn contains(&self, v: f32) -> bool {
        v > self.low && v < self.high
    }

    /// Distance from `v` to the nearer edge.
    #[inline]
    pub fn edge_distance(&self, v: f32) -> f32 {
        (v - self.low).abs().min((v - self.high).abs())
    }
}

/// Stage A thresholds: empty vs occupied, and piece colour.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OccupancyThresholds {
    /// Lower-middle band of the square whose mean colour is measured.
    pub sample: Region,
    /// Empty requires mean brightness strictly below this.
    pub empty_max_brightness: f32,
    /// Empty requires R/(G+1) inside this band.
    pub empty_rg: Band,
    /// Empty requires R/(B+1) inside this band.
    pub empty_rb: Band,
    pub white_min_brightness: f32,
    pub white_min_rg: f32,
    pub white_min_rb: f32,
}

/// Stage B thresholds: piece type from the silhouette's column profile.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SilhouetteThresholds {
    /// Upper-middle region of the square that is binarized.
    pub sample: Region,
    /// White material is luminance strictly above this.
    pub white_threshold: u8,
    /// Black material is luminance strictly below this.
    pub black_threshold: u8,
    /// `top_width` above this is a king.
    pub very_wide: f32,
    /// `top_width` above this is a queen.
    pub wide: f32,
    /// `width_std` above this is a knight.
    pub irregular: f32,
    /// `top_width` inside this band is a bishop.
    pub bishop: Band,
    /// `top_width` below this is a rook. Anything left over is a pawn.
    pub narrow: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub occupancy: OccupancyThresholds,
    pub silhouette: SilhouetteThresholds,
}

impl Theme {
    /// Brown board with ivory and charcoal pieces; matches `Palette::walnut`.
    pub fn walnut() -> Self {
        Self {
            occupancy: OccupancyThresholds {
                sample: Region { top: 0.78, bottom: 0.90, left: 0.25, right: 0.75 },
                empty_max_brightness: 130.0,
                empty_rg: Band::new(1.30, 1.50),
                empty_rb: Band::new(2.10, 2.45),
                white_min_brightness: 160.0,
                white_min_rg: 1.15,
                white_min_rb: 1.40,
            },
            silhouette: SilhouetteThresholds {
                sample: Region { top: 0.125, bottom: 0.375, left: 0.25, right: 0.75 },
                white_threshold: 160,
                black_threshold: 64,
                very_wide: 0.7,
                wide: 0.5,
                irregular: 0.3,
                bishop: Band::new(0.32, 0.5),
                narrow: 0.15,
            },
        }
    }

    /// Dark brown board sampled along the square's bottom rows. Black
    /// material is cut lower than white so dark squares do not read as piece.
    pub fn classic() -> Self {
        Self {
            occupancy: OccupancyThresholds {
                sample: Region { top: 0.94, bottom: 1.0, left: 0.25, right: 0.75 },
                empty_max_brightness: 100.0,
                empty_rg: Band::new(1.4, 1.6),
                empty_rb: Band::new(2.4, 2.6),
                white_min_brightness: 150.0,
                white_min_rg: 1.3,
                white_min_rb: 2.0,
            },
            silhouette: SilhouetteThresholds {
                sample: Region { top: 0.125, bottom: 0.375, left: 0.25, right: 0.75 },
                white_threshold: 128,
                black_threshold: 48,
                very_wide: 0.7,
                wide: 0.5,
                irregular: 0.3,
                bishop: Band::new(0.3, 0.5),
                narrow: 0.3,
            },
        }
    }
}

/// Geometry locator parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorParams {
    /// Radius of the box window used for the local mean.
    pub block_radius: u32,
    /// A pixel marks contrast when it differs from its local mean by more than this.
    pub offset: i16,
    /// Contrast marks are grown by this many pixels before the enclosed
    /// area is filled, closing hairline breaks in the board outline.
    pub gap_radius: u8,
    /// Polygon simplification tolerance as a fraction of contour perimeter.
    pub epsilon_fraction: f64,
    /// Accepted aspect ratios are `1 ± aspect_tolerance`.
    pub aspect_tolerance: f32,
    /// Smallest accepted board area as a fraction of the image area.
    pub min_area_fraction: f32,
    /// Treat the whole image as the board (pre-cropped screenshots).
    pub full_frame: bool,
}

impl Default for LocatorParams {
    fn default() -> Self {
        Self {
            block_radius: 1,
            offset: 5,
            gap_radius: 1,
            epsilon_fraction: 0.02,
            aspect_tolerance: 0.1,
            min_area_fraction: 0.05,
            full_frame: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Key into `themes`.
    pub theme: String,
    pub themes: BTreeMap<String, Theme>,
    pub locator: LocatorParams,
    /// Classify squares on the rayon pool.
    pub parallel: bool,
    /// Reject boards with ambiguous squares instead of guessing.
    pub strict: bool,
    /// Squares whose deciding feature sits closer than this to a threshold are ambiguous.
    pub ambiguity_margin: f32,
    /// Derive castling rights from king/rook placement instead of `KQkq`.
    pub infer_castling: bool,
}

impl Default for Config {
    fn default() -> Self {
        let mut themes = BTreeMap::new();
        themes.insert(DEFAULT_THEME.to_string(), Theme::walnut());
        themes.insert("classic".to_string(), Theme::classic());
        Self {
            theme: DEFAULT_THEME.to_string(),
            themes,
            locator: LocatorParams::default(),
            parallel: true,
            strict: false,
            ambiguity_margin: 0.02,
            infer_castling: false,
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads `path`, or returns the built-in defaults when it does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            info!("{} not found, using built-in defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(io_err)
    }

    pub fn active_theme(&self) -> Result<&Theme, ConfigError> {
        self.themes
            .get(&self.theme)
            .ok_or_else(|| ConfigError::UnknownTheme(self.theme.clone()))
    }

    /// Switches the active theme, failing if it is not defined.
    pub fn select_theme(&mut self, name: &str) -> Result<(), ConfigError> {
        if !self.themes.contains_key(name) {
            return Err(ConfigError::UnknownTheme(name.to_string()));
        }
        self.theme = name.to_string();
        Ok(())
    }
}
