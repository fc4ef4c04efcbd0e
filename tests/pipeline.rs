use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};
use zugzwang_vision::synth::{Palette, RenderOptions, render_board};
use zugzwang_vision::{
    BoardState, Config, NotFoundReason, RecognitionError, Recognizer, board_to_fen,
};

const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR";
const EMPTY: &str = "8/8/8/8/8/8/8/8";

fn board(placement: &str) -> BoardState {
    placement.parse().unwrap()
}

fn placement_of(fen: &str) -> &str {
    fen.split_whitespace().next().unwrap()
}

fn recognize(image: &RgbImage, config: Config) -> Result<String, RecognitionError> {
    Recognizer::new(config).unwrap().recognize(image)
}

#[test]
fn starting_position_is_read_back() {
    let image = render_board(&BoardState::starting_position(), &Palette::walnut(), &RenderOptions::default());
    let fen = recognize(&image, Config::default()).unwrap();
    assert_eq!(placement_of(&fen), START);
}

#[test]
fn board_darker_than_its_surround() {
    let palette = Palette {
        surround: Rgb([250, 250, 250]),
        ..Palette::walnut()
    };
    let image = render_board(&BoardState::starting_position(), &palette, &RenderOptions::default());
    let analysis = Recognizer::new(Config::default()).unwrap().analyze_image(&image).unwrap();
    let expected_corners = [(40.0, 40.0), (679.0, 40.0), (679.0, 679.0), (40.0, 679.0)];
    for (found, expected) in analysis.corners.as_array().into_iter().zip(expected_corners) {
        assert!(
            (found.0 - expected.0).abs() <= 1.0 && (found.1 - expected.1).abs() <= 1.0,
            "expected {expected:?}, got {found:?}"
        );
    }
    assert_eq!(analysis.board.side(), 640);
    assert_eq!(placement_of(&analysis.notation.to_string()), START);
}

#[test]
fn slightly_rotated_photos() {
    let palette = Palette::walnut();
    let italian = "r1bqkbnr/pppp1ppp/2n5/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R";
    for placement in [START, italian] {
        let image = render_board(&board(placement), &palette, &RenderOptions::default());
        for angle in [0.06, -0.06] {
            let rotated = rotate_about_center(&image, angle, Interpolation::Bilinear, palette.surround);
            let fen = recognize(&rotated, Config::default()).unwrap();
            assert_eq!(placement_of(&fen), placement, "angle {angle}");
        }
    }
}

#[test]
fn empty_boards_in_both_themes() {
    let walnut = render_board(&BoardState::empty(), &Palette::walnut(), &RenderOptions::default());
    assert_eq!(placement_of(&recognize(&walnut, Config::default()).unwrap()), EMPTY);

    // classic samples the bottom edge of each square; use a pre-cropped board
    let mut config = Config::default();
    config.select_theme("classic").unwrap();
    config.locator.full_frame = true;
    let options = RenderOptions { square_size: 80, border: 0 };
    let classic = render_board(&BoardState::empty(), &Palette::classic(), &options);
    assert_eq!(placement_of(&recognize(&classic, config).unwrap()), EMPTY);
}

#[test]
fn lone_king_on_top_rank_lands_on_a8() {
    let image = render_board(&board("K7/8/8/8/8/8/8/8"), &Palette::walnut(), &RenderOptions::default());
    let fen = recognize(&image, Config::default()).unwrap();
    assert_eq!(placement_of(&fen), "K7/8/8/8/8/8/8/8");
}

#[test]
fn middlegame_position() {
    let italian = "r1bqkbnr/pppp1ppp/2n5/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R";
    let image = render_board(&board(italian), &Palette::walnut(), &RenderOptions::default());
    let fen = recognize(&image, Config::default()).unwrap();
    assert_eq!(placement_of(&fen), italian);
}

#[test]
fn smaller_board_with_thin_border() {
    let options = RenderOptions { square_size: 64, border: 24 };
    let image = render_board(&BoardState::starting_position(), &Palette::walnut(), &options);
    let fen = recognize(&image, Config::default()).unwrap();
    assert_eq!(placement_of(&fen), START);
}

#[test]
fn sequential_and_parallel_agree_and_repeat() {
    let image = render_board(&board(START), &Palette::walnut(), &RenderOptions::default());
    let parallel = recognize(&image, Config::default()).unwrap();
    let sequential = recognize(&image, Config { parallel: false, ..Config::default() }).unwrap();
    assert_eq!(parallel, sequential);
    assert_eq!(parallel, recognize(&image, Config::default()).unwrap());
}

#[test]
fn blank_image_reports_missing_board() {
    let blank = RgbImage::from_pixel(640, 480, Rgb([200, 200, 200]));
    let err = recognize(&blank, Config::default()).unwrap_err();
    assert!(matches!(err, RecognitionError::BoardNotFound(NotFoundReason::NoContours)));
}

#[test]
fn full_frame_mode_reads_cropped_screenshot() {
    let options = RenderOptions { square_size: 80, border: 0 };
    let image = render_board(&BoardState::starting_position(), &Palette::walnut(), &options);
    let mut config = Config::default();
    config.locator.full_frame = true;
    let fen = recognize(&image, config).unwrap();
    assert_eq!(placement_of(&fen), START);
}

#[test]
fn fen_from_png_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("board.png");
    render_board(&BoardState::starting_position(), &Palette::walnut(), &RenderOptions::default())
        .save(&path)
        .unwrap();

    let fen = board_to_fen(&path, &Config::default()).unwrap();
    assert_eq!(fen, format!("{} w KQkq - 0 1", START));
}

#[test]
fn unreadable_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("not-an-image.png");
    std::fs::write(&path, b"definitely not a png").unwrap();
    let err = board_to_fen(&path, &Config::default()).unwrap_err();
    assert!(matches!(err, RecognitionError::ImageUnreadable { .. }));
}
