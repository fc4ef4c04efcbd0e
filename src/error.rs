//! Error types for the recognition pipeline.
//! Every failure is a deterministic function of the input image and the
//! configuration, so nothing here is retried internally.

use std::path::PathBuf;

/// Why the locator gave up on an image.
#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum NotFoundReason {
    /// No filled region away from the image border.
    #[error("no candidate contours")]
    NoContours,
    /// No candidate simplified to exactly four sides.
    #[error("none of {candidates} contours simplify to four sides")]
    NoQuadrilateral { candidates: usize },
    /// The best four-sided candidate was too far from square.
    #[error("best quadrilateral has aspect ratio {aspect:.3}")]
    NotSquare { aspect: f32 },
    /// The best four-sided, square candidate covered too little of the image.
    #[error("best quadrilateral covers only {:.1}% of the image", area_fraction * 100.0)]
    TooSmall { area_fraction: f32 },
    /// The corners do not admit a perspective transform.
    #[error("corners do not define a perspective transform")]
    Degenerate,
}

/// Errors returned by the board recognizer.
#[derive(thiserror::Error, Debug)]
pub enum RecognitionError {
    #[error("image unreadable: {}", path.display())]
    ImageUnreadable {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("board not found: {0}")]
    BoardNotFound(NotFoundReason),
    #[error("square {square} classification ambiguous (margin {margin:.3})")]
    ClassificationAmbiguous { square: String, margin: f32 },
    #[error("failed to encode diagnostic image {}", path.display())]
    Diagnostics {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to write diagnostics to {}", path.display())]
    DiagnosticsIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors raised while loading or resolving a configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to access config file {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unknown theme '{0}'")]
    UnknownTheme(String),
}

/// Errors raised while decoding a board-placement string.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum NotationError {
    #[error("expected 8 ranks, found {0}")]
    RankCount(usize),
    #[error("rank {rank} describes {width} squares instead of 8")]
    RankWidth { rank: usize, width: usize },
    #[error("unexpected character '{0}' in board placement")]
    BadChar(char),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_messages() {
        assert_eq!(NotFoundReason::NoContours.to_string(), "no candidate contours");
        assert_eq!(
            NotFoundReason::NoQuadrilateral { candidates: 3 }.to_string(),
            "none of 3 contours simplify to four sides"
        );
        assert_eq!(
            NotFoundReason::NotSquare { aspect: 2.0 }.to_string(),
            "best quadrilateral has aspect ratio 2.000"
        );
        assert_eq!(
            NotFoundReason::TooSmall { area_fraction: 0.25 }.to_string(),
            "best quadrilateral covers only 25.0% of the image"
        );
        let err = RecognitionError::BoardNotFound(NotFoundReason::Degenerate);
        assert_eq!(err.to_string(), "board not found: corners do not define a perspective transform");
    }
}
