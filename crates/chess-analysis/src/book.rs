//! Opening book lookup.

/// Decides whether a played move counts as a book move.
pub trait OpeningBook: Send + Sync {
    fn is_book_move(&self, ply: usize, fen_before: &str, uci: &str) -> bool;
}

/// No move is ever a book move.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBook;

impl OpeningBook for NoBook {
    fn is_book_move(&self, _ply: usize, _fen_before: &str, _uci: &str) -> bool {
        false
    }
}

/// Treats the first `plies` plies of every game as book moves.
#[derive(Debug, Clone, Copy)]
pub struct PlyCountBook {
    plies: usize,
}

impl PlyCountBook {
    pub fn new(plies: usize) -> Self {
        Self { plies }
    }
}

impl OpeningBook for PlyCountBook {
    fn is_book_move(&self, ply: usize, _fen_before: &str, _uci: &str) -> bool {
        ply < self.plies
    }
}
