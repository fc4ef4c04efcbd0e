//! Recognition facade.
//! Runs the whole pipeline: locate, rectify, extract, classify, assemble.
//! Every stage is a pure function of its input, so a `Recognizer` holds no
//! state besides its configuration and can be shared between threads.

use crate::board::{BoardState, PositionNotation, SquareClass, Trailer};
use crate::classify::{SquareReport, classify_all};
use crate::config::{Config, Theme};
use crate::error::{ConfigError, RecognitionError};
use crate::locate::{CornerSet, locate_board};
use crate::rectify::{RectifiedBoard, rectify};
use image::RgbImage;
use log::{debug, info, warn};
use std::path::Path;
use std::time::Instant;

/// Everything one run produced, intermediate stages included.
#[derive(Clone, Debug)]
pub struct Analysis {
    pub corners: CornerSet,
    pub board: RectifiedBoard,
    /// One per square, in extraction order.
    pub reports: Vec<SquareReport>,
    pub state: BoardState,
    pub notation: PositionNotation,
}

impl Analysis {
    pub fn classes(&self) -> [SquareClass; 64] {
        classes_of(&self.reports)
    }

    pub fn ambiguous_squares(&self, min_margin: f32) -> impl Iterator<Item = &SquareReport> {
        self.reports.iter().filter(move |r| r.ambiguous(min_margin))
    }
}

fn classes_of(reports: &[SquareReport]) -> [SquareClass; 64] {
    let mut classes = [SquareClass::Empty; 64];
    for report in reports {
        classes[report.index()] = report.class;
    }
    classes
}

/// Decodes any format `image` understands into RGB.
pub fn load_image(path: impl AsRef<Path>) -> Result<RgbImage, RecognitionError> {
    let path = path.as_ref();
    let decoded = image::open(path).map_err(|source| RecognitionError::ImageUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(decoded.to_rgb8())
}

#[derive(Clone, Debug)]
pub struct Recognizer {
    config: Config,
}

impl Recognizer {
    /// Fails if the configured theme is not defined.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        config.active_theme()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn theme(&self) -> Result<&Theme, RecognitionError> {
        Ok(self.config.active_theme()?)
    }

    pub fn analyze_image(&self, image: &RgbImage) -> Result<Analysis, RecognitionError> {
        let start = Instant::now();
        let theme = self.theme()?;
        let corners = locate_board(image, &self.config.locator)?;
        let board = rectify(image, &corners)?;
        let squares: Vec<_> = board.squares().collect();
        let reports = classify_all(&squares, theme, self.config.parallel);

        let margin = self.config.ambiguity_margin;
        for report in reports.iter().filter(|r| r.ambiguous(margin)) {
            warn!(
                "square {} is ambiguous: {:?} with margin {:.3}",
                report.name(),
                report.class,
                report.margin
            );
        }
        if self.config.strict {
            if let Some(report) = reports.iter().find(|r| r.ambiguous(margin)) {
                return Err(RecognitionError::ClassificationAmbiguous {
                    square: report.name(),
                    margin: report.margin,
                });
            }
        }

        let state = BoardState::assemble(&classes_of(&reports));
        for problem in state.plausibility_warnings() {
            warn!("implausible board: {}", problem);
        }

        let trailer = if self.config.infer_castling {
            Trailer::with_inferred_castling(&state)
        } else {
            Trailer::default()
        };
        let notation = state.to_notation(trailer);
        if let Err(e) = notation.check_syntax() {
            warn!("notation rejected by parser: {}", e);
        }
        debug!("pipeline latency: {:?}", start.elapsed());
        info!("recognized: {}", notation);

        Ok(Analysis {
            corners,
            board,
            reports,
            state,
            notation,
        })
    }

    pub fn analyze_path(&self, path: impl AsRef<Path>) -> Result<Analysis, RecognitionError> {
        let image = load_image(path)?;
        self.analyze_image(&image)
    }

    /// Position string for `image`.
    pub fn recognize(&self, image: &RgbImage) -> Result<String, RecognitionError> {
        Ok(self.analyze_image(image)?.notation.to_string())
    }
}

/// Main entry point for image-to-FEN conversion.
pub fn board_to_fen(image_path: impl AsRef<Path>, config: &Config) -> Result<String, RecognitionError> {
    let recognizer = Recognizer::new(config.clone())?;
    Ok(recognizer.analyze_path(image_path)?.notation.to_string())
}
