//! Chess board recognition: a photograph or screenshot of a board in, a
//! board-notation (FEN) string out.
//!
//! The pipeline is a straight line of pure stages:
//! [`locate`] finds the board's corners, [`rectify`] warps it to a square,
//! [`squares`] cuts the 64 cells, [`classify`] labels each one with colour
//! heuristics and [`board`] assembles and serializes the result.
//! [`ocr::Recognizer`] runs them end to end.
//!
//! ```no_run
//! use zugzwang_vision::{Config, board_to_fen};
//!
//! let config = Config::load_or_default("board_config.json")?;
//! println!("{}", board_to_fen("board.png", &config)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod board;
pub mod calibrate;
pub mod classify;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod locate;
pub mod ocr;
pub mod rectify;
pub mod squares;
pub mod synth;

pub use board::{BoardState, PositionNotation, SquareClass, Trailer};
pub use classify::{SquareFeatures, SquareReport};
pub use config::{Config, LocatorParams, Theme};
pub use error::{ConfigError, NotFoundReason, NotationError, RecognitionError};
pub use locate::CornerSet;
pub use ocr::{Analysis, Recognizer, board_to_fen, load_image};
pub use rectify::RectifiedBoard;
pub use squares::SquareImage;
