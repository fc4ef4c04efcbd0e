//! Board assembler.
//! Folds the 64 per-square classifications into a `BoardState` and serializes
//! it to standard board notation (FEN). A single image says nothing about
//! side to move, castling, en passant or move counters, so those fields are
//! filled from a `Trailer` of defaults.

use crate::error::NotationError;
use shakmaty::{Color, Piece, Role};
use std::fmt;
use std::str::FromStr;

/// Result of classifying one square.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SquareClass {
    #[default]
    Empty,
    Occupied(Piece),
}

impl SquareClass {
    pub fn occupied(color: Color, role: Role) -> Self {
        SquareClass::Occupied(Piece { color, role })
    }

    pub fn piece(&self) -> Option<Piece> {
        match self {
            SquareClass::Empty => None,
            SquareClass::Occupied(piece) => Some(*piece),
        }
    }
}

/// 8x8 grid indexed `[rank][file]`, rank 0 = rank 1.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BoardState {
    squares: [[SquareClass; 8]; 8],
}

const BACK_RANK: [Role; 8] = [
    Role::Rook,
    Role::Knight,
    Role::Bishop,
    Role::Queen,
    Role::King,
    Role::Bishop,
    Role::Knight,
    Role::Rook,
];

impl BoardState {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn starting_position() -> Self {
        let mut board = Self::empty();
        for (file, &role) in BACK_RANK.iter().enumerate() {
            board.squares[0][file] = SquareClass::occupied(Color::White, role);
            board.squares[1][file] = SquareClass::occupied(Color::White, Role::Pawn);
            board.squares[6][file] = SquareClass::occupied(Color::Black, Role::Pawn);
            board.squares[7][file] = SquareClass::occupied(Color::Black, role);
        }
        board
    }

    /// Builds a board from classifications in extraction order
    /// (rank 0 first, files a..h within a rank).
    pub fn assemble(classes: &[SquareClass; 64]) -> Self {
        let mut board = Self::empty();
        for (i, class) in classes.iter().enumerate() {
            board.squares[i / 8][i % 8] = *class;
        }
        board
    }

    pub fn get(&self, rank: usize, file: usize) -> SquareClass {
        self.squares[rank][file]
    }

    pub fn set(&mut self, rank: usize, file: usize, class: SquareClass) {
        self.squares[rank][file] = class;
    }

    pub fn pieces(&self) -> impl Iterator<Item = (usize, usize, Piece)> + '_ {
        self.squares.iter().enumerate().flat_map(|(rank, row)| {
            row.iter()
                .enumerate()
                .filter_map(move |(file, class)| class.piece().map(|p| (rank, file, p)))
        })
    }

    pub fn count(&self, piece: Piece) -> usize {
        self.pieces().filter(|&(_, _, p)| p == piece).count()
    }

    /// Board-placement field: rank 8 first, empty runs as digits.
    pub fn placement(&self) -> String {
        let mut out = String::with_capacity(71);
        for rank in (0..8).rev() {
            let mut empty = 0;
            for class in &self.squares[rank] {
                match class {
                    SquareClass::Empty => empty += 1,
                    SquareClass::Occupied(piece) => {
                        if empty > 0 {
                            out.push(char::from(b'0' + empty));
                            empty = 0;
                        }
                        out.push(piece.char());
                    }
                }
            }
            if empty > 0 {
                out.push(char::from(b'0' + empty));
            }
            if rank > 0 {
                out.push('/');
            }
        }
        out
    }

    pub fn to_notation(&self, trailer: Trailer) -> PositionNotation {
        PositionNotation {
            board: *self,
            trailer,
        }
    }

    /// Count problems a rules engine would reject. The board itself is kept.
    pub fn plausibility_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        for color in [Color::White, Color::Black] {
            let name = if color == Color::White { "white" } else { "black" };
            let kings = self.count(Piece { color, role: Role::King });
            if kings != 1 {
                warnings.push(format!("{} has {} kings", name, kings));
            }
            let pawns = self.count(Piece { color, role: Role::Pawn });
            if pawns > 8 {
                warnings.push(format!("{} has {} pawns (max 8)", name, pawns));
            }
            let total = self.pieces().filter(|&(_, _, p)| p.color == color).count();
            if total > 16 {
                warnings.push(format!("{} has {} pieces (max 16)", name, total));
            }
        }
        let back_rank_pawns = self
            .pieces()
            .filter(|&(rank, _, p)| p.role == Role::Pawn && (rank == 0 || rank == 7))
            .count();
        if back_rank_pawns > 0 {
            warnings.push(format!("{} pawns on the first or last rank", back_rank_pawns));
        }
        warnings
    }
}

impl FromStr for BoardState {
    type Err = NotationError;

    /// Parses a board-placement field. Anything after the first whitespace
    /// (the remaining FEN fields) is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let placement = s.split_whitespace().next().unwrap_or("");
        let ranks: Vec<&str> = placement.split('/').collect();
        if ranks.len() != 8 {
            return Err(NotationError::RankCount(ranks.len()));
        }

        let mut board = Self::empty();
        for (i, text) in ranks.iter().enumerate() {
            let rank = 7 - i;
            let mut file = 0usize;
            for c in text.chars() {
                match c {
                    '1'..='8' => file += c as usize - '0' as usize,
                    _ => {
                        let piece = Piece::from_char(c).ok_or(NotationError::BadChar(c))?;
                        if file < 8 {
                            board.squares[rank][file] = SquareClass::Occupied(piece);
                        }
                        file += 1;
                    }
                }
            }
            if file != 8 {
                return Err(NotationError::RankWidth { rank: rank + 1, width: file });
            }
        }
        Ok(board)
    }
}

impl fmt::Display for BoardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rank in (0..8).rev() {
            write!(f, "{}", rank + 1)?;
            for class in &self.squares[rank] {
                let c = class.piece().map_or('.', |p| p.char());
                write!(f, " {}", c)?;
            }
            writeln!(f)?;
        }
        write!(f, "  a b c d e f g h")
    }
}

/// The non-visual FEN fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Trailer {
    pub side_to_move: Color,
    pub castling: String,
    pub en_passant: String,
    pub halfmove_clock: u32,
    pub fullmove_number: u32,
}

impl Default for Trailer {
    /// `w KQkq - 0 1`.
    fn default() -> Self {
        Self {
            side_to_move: Color::White,
            castling: "KQkq".to_string(),
            en_passant: "-".to_string(),
            halfmove_clock: 0,
            fullmove_number: 1,
        }
    }
}

impl Trailer {
    /// Default fields with castling rights limited to kings and rooks that
    /// still stand on their home squares.
    pub fn with_inferred_castling(board: &BoardState) -> Self {
        let at = |rank: usize, file: usize, color: Color, role: Role| {
            board.get(rank, file) == SquareClass::occupied(color, role)
        };
        let mut castling = String::new();
        if at(0, 4, Color::White, Role::King) {
            if at(0, 7, Color::White, Role::Rook) {
                castling.push('K');
            }
            if at(0, 0, Color::White, Role::Rook) {
                castling.push('Q');
            }
        }
        if at(7, 4, Color::Black, Role::King) {
            if at(7, 7, Color::Black, Role::Rook) {
                castling.push('k');
            }
            if at(7, 0, Color::Black, Role::Rook) {
                castling.push('q');
            }
        }
        if castling.is_empty() {
            castling.push('-');
        }
        Self {
            castling,
            ..Self::default()
        }
    }
}

/// A board plus its trailing FEN fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PositionNotation {
    pub board: BoardState,
    pub trailer: Trailer,
}

impl PositionNotation {
    /// Parses the string with shakmaty, as a downstream rules engine would.
    pub fn check_syntax(&self) -> Result<(), shakmaty::fen::ParseFenError> {
        shakmaty::fen::Fen::from_ascii(self.to_string().as_bytes()).map(|_| ())
    }
}

impl fmt::Display for PositionNotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = match self.trailer.side_to_move {
            Color::White => 'w',
            Color::Black => 'b',
        };
        write!(
            f,
            "{} {} {} {} {} {}",
            self.board.placement(),
            side,
            self.trailer.castling,
            self.trailer.en_passant,
            self.trailer.halfmove_clock,
            self.trailer.fullmove_number
        )
    }
}
