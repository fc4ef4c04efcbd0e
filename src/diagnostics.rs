//! Diagnostics side channel.
//! Dumps the intermediate images and per-square measurements of one
//! recognition run into a directory, so thresholds can be tuned by eye.
//! Nothing here feeds back into the result.

use crate::classify::SquareReport;
use crate::config::LocatorParams;
use crate::error::RecognitionError;
use crate::locate::{adaptive_threshold, board_mask};
use crate::ocr::Analysis;
use image::{ImageError, RgbImage};
use log::debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

fn diag_err(path: &Path) -> impl FnOnce(ImageError) -> RecognitionError + '_ {
    move |source| RecognitionError::Diagnostics {
        path: path.to_path_buf(),
        source,
    }
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> RecognitionError + '_ {
    move |source| RecognitionError::DiagnosticsIo {
        path: path.to_path_buf(),
        source,
    }
}

fn write_text(path: PathBuf, text: &str) -> Result<(), RecognitionError> {
    fs::write(&path, text).map_err(io_err(&path))
}

fn describe(report: &SquareReport) -> String {
    let f = &report.features;
    let silhouette = match (f.top_width, f.width_std) {
        (Some(tw), Some(std)) => format!("top_width: {:.3}\nwidth_std: {:.3}", tw, std),
        _ => "top_width: -\nwidth_std: -".to_string(),
    };
    format!(
        "square: {}\nclass: {:?}\nmean_rgb: {:.1} {:.1} {:.1}\nbrightness: {:.2}\nrg_ratio: {:.3}\nrb_ratio: {:.3}\n{}\nmargin: {:.3}\nfallback: {}\n",
        report.name(),
        report.class,
        f.mean_rgb[0],
        f.mean_rgb[1],
        f.mean_rgb[2],
        f.brightness,
        f.rg_ratio,
        f.rb_ratio,
        silhouette,
        report.margin,
        report.fallback
    )
}

/// Writes `rectified.png`, `threshold.png`, `mask.png`, `summary.txt` and a
/// `square_{rank}_{file}.png` / `.txt` pair for every square into `dir`,
/// creating it if needed.
pub fn write_artifacts(
    dir: impl AsRef<Path>,
    source: &RgbImage,
    analysis: &Analysis,
    params: &LocatorParams,
) -> Result<(), RecognitionError> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).map_err(io_err(dir))?;

    let rectified = dir.join("rectified.png");
    analysis.board.image().save(&rectified).map_err(diag_err(&rectified))?;

    let gray = image::imageops::grayscale(source);
    let threshold = dir.join("threshold.png");
    adaptive_threshold(&gray, params.block_radius, params.offset)
        .save(&threshold)
        .map_err(diag_err(&threshold))?;
    let mask = dir.join("mask.png");
    board_mask(&gray, params).save(&mask).map_err(diag_err(&mask))?;

    for (square, report) in analysis.board.squares().zip(&analysis.reports) {
        let stem = format!("square_{}_{}", square.rank, square.file);
        let png = dir.join(format!("{}.png", stem));
        square.image.save(&png).map_err(diag_err(&png))?;
        write_text(dir.join(format!("{}.txt", stem)), &describe(report))?;
    }

    let c = &analysis.corners;
    let summary = format!(
        "corners: tl={:?} tr={:?} br={:?} bl={:?}\nside: {}\nfen: {}\n\n{}\n",
        c.top_left,
        c.top_right,
        c.bottom_right,
        c.bottom_left,
        analysis.board.side(),
        analysis.notation,
        analysis.state
    );
    write_text(dir.join("summary.txt"), &summary)?;
    debug!("diagnostics written to {}", dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::BoardState;
    use crate::config::Config;
    use crate::ocr::Recognizer;
    use crate::synth::{Palette, RenderOptions, render_board};

    #[test]
    fn test_writes_every_artifact() {
        let image = render_board(&BoardState::starting_position(), &Palette::walnut(), &RenderOptions::default());
        let config = Config::default();
        let analysis = Recognizer::new(config.clone()).unwrap().analyze_image(&image).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("debug");
        write_artifacts(&out, &image, &analysis, &config.locator).unwrap();

        for name in ["rectified.png", "threshold.png", "mask.png", "summary.txt", "square_0_0.png", "square_7_7.txt"] {
            assert!(out.join(name).is_file(), "missing {}", name);
        }
        let pngs = fs::read_dir(&out)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("square_"))
            .count();
        assert_eq!(pngs, 128);

        let threshold = image::open(out.join("threshold.png")).unwrap();
        assert_eq!(threshold.width(), image.width());

        let e1 = fs::read_to_string(out.join("square_0_4.txt")).unwrap();
        assert!(e1.contains("square: e1"));
        assert!(e1.contains("top_width: 0."));
        let e4 = fs::read_to_string(out.join("square_3_4.txt")).unwrap();
        assert!(e4.contains("class: Empty"));
        assert!(e4.contains("top_width: -"));
        assert!(e4.ends_with("fallback: false\n"));

        let mask = image::open(out.join("mask.png")).unwrap().to_luma8();
        assert_eq!(mask.get_pixel(360, 360)[0], 255);
        assert_eq!(mask.get_pixel(10, 10)[0], 0);
    }

    #[test]
    fn test_unwritable_directory_is_reported() {
        let image = render_board(&BoardState::empty(), &Palette::walnut(), &RenderOptions::default());
        let config = Config::default();
        let analysis = Recognizer::new(config.clone()).unwrap().analyze_image(&image).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"x").unwrap();
        let result = write_artifacts(blocker.join("sub"), &image, &analysis, &config.locator);
        match result {
            Err(RecognitionError::DiagnosticsIo { path, .. }) => assert_eq!(path, blocker.join("sub")),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
