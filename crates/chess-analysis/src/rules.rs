//! Chess rules used by the analyzer.
//!
//! Positions cross this boundary as FEN strings and moves as UCI
//! coordinates, the same forms the engine protocol uses.

use serde::{Deserialize, Serialize};
use shakmaty::fen::Fen;
use shakmaty::san::San;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Move, Position, Role};

/// How a game ended in a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalState {
    /// The side to move is mated.
    Checkmate,
    Stalemate,
    InsufficientMaterial,
    FiftyMoveRule,
}

/// Rules queries on FEN positions.
///
/// Queries on an invalid FEN or an illegal move return `None` (or the
/// neutral value for counts) rather than failing.
pub trait ChessRules: Send + Sync {
    fn is_valid_fen(&self, fen: &str) -> bool;

    /// How the game has ended in this position, if it has.
    fn terminal_state(&self, fen: &str) -> Option<TerminalState>;

    fn side_to_move(&self, fen: &str) -> Option<Color>;

    fn legal_move_count(&self, fen: &str) -> usize;

    /// Standard algebraic notation for a legal move, with check suffix.
    fn to_san(&self, fen: &str, uci: &str) -> Option<String>;

    /// Plays a legal move and returns the resulting FEN.
    fn play_uci(&self, fen: &str, uci: &str) -> Option<String>;

    /// Material of White minus material of Black, in centipawns.
    fn material_balance(&self, fen: &str) -> Option<i32>;
}

/// Material values used for sacrifice detection.
const PIECE_VALUES: [(Role, i32); 5] = [
    (Role::Pawn, 100),
    (Role::Knight, 300),
    (Role::Bishop, 300),
    (Role::Rook, 500),
    (Role::Queen, 900),
];

/// [`ChessRules`] backed by `shakmaty`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShakmatyRules;

impl ShakmatyRules {
    fn position(fen: &str) -> Option<Chess> {
        let fen: Fen = fen.parse().ok()?;
        fen.into_position(CastlingMode::Standard).ok()
    }

    fn legal_move(pos: &Chess, uci: &str) -> Option<Move> {
        let uci: UciMove = uci.parse().ok()?;
        uci.to_move(pos).ok()
    }
}

impl ChessRules for ShakmatyRules {
    fn is_valid_fen(&self, fen: &str) -> bool {
        Self::position(fen).is_some()
    }

    fn terminal_state(&self, fen: &str) -> Option<TerminalState> {
        let pos = Self::position(fen)?;
        if pos.is_checkmate() {
            Some(TerminalState::Checkmate)
        } else if pos.is_stalemate() {
            Some(TerminalState::Stalemate)
        } else if pos.is_insufficient_material() {
            Some(TerminalState::InsufficientMaterial)
        } else if pos.halfmoves() >= 100 {
            Some(TerminalState::FiftyMoveRule)
        } else {
            None
        }
    }

    fn side_to_move(&self, fen: &str) -> Option<Color> {
        Self::position(fen).map(|pos| pos.turn())
    }

    fn legal_move_count(&self, fen: &str) -> usize {
        Self::position(fen).map_or(0, |pos| pos.legal_moves().len())
    }

    fn to_san(&self, fen: &str, uci: &str) -> Option<String> {
        let pos = Self::position(fen)?;
        let mv = Self::legal_move(&pos, uci)?;
        let san = San::from_move(&pos, mv.clone()).to_string();
        let after = pos.play(mv).ok()?;
        let suffix = if after.is_checkmate() {
            "#"
        } else if after.is_check() {
            "+"
        } else {
            ""
        };
        Some(format!("{}{}", san, suffix))
    }

    fn play_uci(&self, fen: &str, uci: &str) -> Option<String> {
        let pos = Self::position(fen)?;
        let mv = Self::legal_move(&pos, uci)?;
        let after = pos.play(mv).ok()?;
        Some(Fen::from_position(&after, EnPassantMode::Legal).to_string())
    }

    fn material_balance(&self, fen: &str) -> Option<i32> {
        let pos = Self::position(fen)?;
        let board = pos.board();
        let balance = PIECE_VALUES
            .iter()
            .map(|&(role, value)| {
                let pieces = board.by_role(role);
                let white = (pieces & board.by_color(Color::White)).count() as i32;
                let black = (pieces & board.by_color(Color::Black)).count() as i32;
                value * (white - black)
            })
            .sum();
        Some(balance)
    }
}
