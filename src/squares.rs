//! Square extractor.
//! Slices a rectified board into its 64 squares. Rank 0 is the bottom row of
//! the image and is yielded first; files run left to right. The assembler
//! relies on this order.

use crate::rectify::RectifiedBoard;
use image::RgbImage;
use image::imageops::crop_imm;
use std::iter::FusedIterator;

/// One square of the board, cut out of the rectified image.
#[derive(Clone, Debug, PartialEq)]
pub struct SquareImage {
    /// 0 = rank 1 (bottom of the image).
    pub rank: u8,
    /// 0 = file a (left of the image).
    pub file: u8,
    pub image: RgbImage,
}

impl SquareImage {
    /// Algebraic name, e.g. `e4`.
    pub fn name(&self) -> String {
        square_name(self.rank, self.file)
    }

    /// Position in extraction order.
    pub fn index(&self) -> usize {
        self.rank as usize * 8 + self.file as usize
    }
}

pub fn square_name(rank: u8, file: u8) -> String {
    format!("{}{}", (b'a' + file) as char, rank + 1)
}

/// Lazy iterator over the 64 squares of a board.
#[derive(Clone, Debug)]
pub struct Squares<'a> {
    board: &'a RectifiedBoard,
    next: usize,
}

impl RectifiedBoard {
    /// Fresh iterator over the squares; can be called any number of times.
    pub fn squares(&self) -> Squares<'_> {
        Squares { board: self, next: 0 }
    }
}

impl Iterator for Squares<'_> {
    type Item = SquareImage;

    fn next(&mut self) -> Option<SquareImage> {
        if self.next >= 64 {
            return None;
        }
        let (rank, file) = ((self.next / 8) as u8, (self.next % 8) as u8);
        self.next += 1;

        let size = self.board.square_size();
        let x = file as u32 * size;
        let y = (7 - rank as u32) * size;
        let image = crop_imm(self.board.image(), x, y, size, size).to_image();
        Some(SquareImage { rank, file, image })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = 64 - self.next.min(64);
        (left, Some(left))
    }
}

impl ExactSizeIterator for Squares<'_> {}

impl FusedIterator for Squares<'_> {}
