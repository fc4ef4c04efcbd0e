//! Synthetic board renderer.
//! Draws a board position as flat-colour squares and block glyphs on a
//! plain surround, for calibration and for end-to-end tests of the
//! recognizer. Glyph silhouettes are drawn so that each piece type lands in
//! its own branch of the silhouette classifier.

use crate::board::{BoardState, SquareClass};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use shakmaty::{Color, Role};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Palette {
    pub light_square: Rgb<u8>,
    pub dark_square: Rgb<u8>,
    pub white_piece: Rgb<u8>,
    pub black_piece: Rgb<u8>,
    /// Everything outside the board.
    pub surround: Rgb<u8>,
}

impl Palette {
    /// Colours the `walnut` theme is calibrated for.
    pub fn walnut() -> Self {
        Self {
            light_square: Rgb([160, 113, 70]),
            dark_square: Rgb([120, 85, 52]),
            white_piece: Rgb([250, 205, 160]),
            black_piece: Rgb([40, 40, 40]),
            surround: Rgb([49, 46, 43]),
        }
    }

    /// Colours the `classic` theme is calibrated for.
    pub fn classic() -> Self {
        Self {
            light_square: Rgb([100, 66, 40]),
            dark_square: Rgb([88, 58, 35]),
            white_piece: Rgb([255, 190, 110]),
            black_piece: Rgb([30, 30, 30]),
            surround: Rgb([20, 20, 20]),
        }
    }

    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "walnut" => Some(Self::walnut()),
            "classic" => Some(Self::classic()),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderOptions {
    /// Side of one square in pixels.
    pub square_size: u32,
    /// Width of the surround on every side.
    pub border: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            square_size: 80,
            border: 40,
        }
    }
}

/// `(left, top, right, bottom)` as fractions of the square.
type Block = (f32, f32, f32, f32);

const BASE: Block = (0.18, 0.70, 0.82, 0.95);
const STEM: Block = (0.40, 0.40, 0.60, 0.70);

fn head(role: Role) -> Block {
    match role {
        Role::King => (0.22, 0.10, 0.78, 0.40),
        Role::Queen => (0.35, 0.10, 0.65, 0.40),
        Role::Knight => (0.20, 0.10, 0.47, 0.40),
        Role::Bishop => (0.20, 0.20, 0.80, 0.30),
        Role::Rook => (0.25, 0.40, 0.75, 0.55),
        Role::Pawn => (0.20, 0.29, 0.80, 0.35),
    }
}

fn fill_block(image: &mut RgbImage, origin: (u32, u32), size: u32, block: Block, color: Rgb<u8>) {
    let px = |f: f32| (f * size as f32).round() as u32;
    let (x0, y0, x1, y1) = (px(block.0), px(block.1), px(block.2), px(block.3));
    if x1 <= x0 || y1 <= y0 {
        return;
    }
    let rect = Rect::at((origin.0 + x0) as i32, (origin.1 + y0) as i32).of_size(x1 - x0, y1 - y0);
    draw_filled_rect_mut(image, rect, color);
}

fn draw_square(image: &mut RgbImage, origin: (u32, u32), size: u32, class: SquareClass, light: bool, palette: &Palette) {
    let background = if light { palette.light_square } else { palette.dark_square };
    fill_block(image, origin, size, (0.0, 0.0, 1.0, 1.0), background);
    if let SquareClass::Occupied(piece) = class {
        let material = match piece.color {
            Color::White => palette.white_piece,
            Color::Black => palette.black_piece,
        };
        for block in [BASE, STEM, head(piece.role)] {
            fill_block(image, origin, size, block, material);
        }
    }
}

/// One `size x size` square on its own.
pub fn render_square(class: SquareClass, light: bool, palette: &Palette, size: u32) -> RgbImage {
    let mut image = RgbImage::new(size, size);
    draw_square(&mut image, (0, 0), size, class, light, palette);
    image
}

/// Whole board, rank 8 at the top, a1 dark.
pub fn render_board(board: &BoardState, palette: &Palette, options: &RenderOptions) -> RgbImage {
    let size = options.square_size;
    let side = 8 * size + 2 * options.border;
    let mut image = RgbImage::from_pixel(side, side, palette.surround);
    for rank in 0..8 {
        for file in 0..8 {
            let origin = (
                options.border + file as u32 * size,
                options.border + (7 - rank as u32) * size,
            );
            let light = (rank + file) % 2 == 1;
            draw_square(&mut image, origin, size, board.get(rank, file), light, palette);
        }
    }
    image
}
