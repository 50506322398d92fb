//! Move quality classification and game analysis.

use serde::{Deserialize, Serialize};
use shakmaty::Color;

use crate::accuracy;
use crate::evaluation::Evaluation;
use crate::rules::TerminalState;

/// Classification of a played move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveQuality {
    /// The engine's best move, giving up material without getting worse
    Brilliant,
    /// The engine's best move, clearly ahead of the alternatives
    Great,
    /// The best move in the position
    Best,
    /// Excellent move (minimal centipawn loss)
    Excellent,
    /// Good move (small centipawn loss)
    Good,
    /// Inaccuracy (noticeable centipawn loss)
    Inaccuracy,
    /// Mistake (significant centipawn loss)
    Mistake,
    /// Blunder (major centipawn loss)
    Blunder,
    /// Opening book move
    Book,
    /// Only legal move, or no evaluation was available
    Forced,
}

impl MoveQuality {
    /// Classifies a non-best move by its centipawn loss.
    pub fn from_cp_loss(cp_loss: i32) -> Self {
        match cp_loss {
            i32::MIN..=10 => MoveQuality::Excellent,
            11..=25 => MoveQuality::Good,
            26..=100 => MoveQuality::Inaccuracy,
            101..=350 => MoveQuality::Mistake,
            _ => MoveQuality::Blunder,
        }
    }

    /// Annotation symbol in the usual notation, if any.
    pub fn symbol(self) -> &'static str {
        match self {
            MoveQuality::Brilliant => "!!",
            MoveQuality::Great => "!",
            MoveQuality::Inaccuracy => "?!",
            MoveQuality::Mistake => "?",
            MoveQuality::Blunder => "??",
            _ => "",
        }
    }
}

/// The side that played a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl From<Color> for Side {
    fn from(color: Color) -> Self {
        match color {
            Color::White => Side::White,
            Color::Black => Side::Black,
        }
    }
}

/// Analysis result for a single move.
///
/// Evaluations are from White's perspective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveAnalysis {
    /// Zero-based ply index
    pub ply: usize,
    pub side: Side,
    /// The move that was played (in UCI notation)
    pub uci: String,
    pub san: Option<String>,
    pub quality: MoveQuality,
    /// Best evaluation available before the move
    pub eval_before: Option<Evaluation>,
    /// Evaluation after the move
    pub eval_after: Option<Evaluation>,
    /// The best move according to the engine
    pub best_move: Option<String>,
    pub engine_pv: Vec<String>,
    pub centipawn_loss: Option<i32>,
    /// Move accuracy (0-100) when both evaluations are known
    pub accuracy: Option<f64>,
    /// Set when the move ended the game
    pub terminal: Option<TerminalState>,
}

/// Statistics for a player's performance in a game.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    /// Total moves analyzed
    pub total_moves: u32,
    pub brilliant: u32,
    pub great: u32,
    /// Number of best moves
    pub best_moves: u32,
    /// Number of excellent moves
    pub excellent_moves: u32,
    /// Number of good moves
    pub good_moves: u32,
    /// Number of inaccuracies
    pub inaccuracies: u32,
    /// Number of mistakes
    pub mistakes: u32,
    /// Number of blunders
    pub blunders: u32,
    pub book_moves: u32,
    pub forced_moves: u32,
    /// Average centipawn loss over moves with a known loss
    pub avg_cp_loss: f64,
    /// Accuracy percentage (0-100)
    pub accuracy_percent: f64,
}

impl PlayerStats {
    pub fn from_moves<'a>(moves: impl IntoIterator<Item = &'a MoveAnalysis>) -> Self {
        let mut stats = PlayerStats::default();
        let mut losses = Vec::new();
        let mut accuracies = Vec::new();

        for mv in moves {
            stats.total_moves += 1;
            match mv.quality {
                MoveQuality::Brilliant => stats.brilliant += 1,
                MoveQuality::Great => stats.great += 1,
                MoveQuality::Best => stats.best_moves += 1,
                MoveQuality::Excellent => stats.excellent_moves += 1,
                MoveQuality::Good => stats.good_moves += 1,
                MoveQuality::Inaccuracy => stats.inaccuracies += 1,
                MoveQuality::Mistake => stats.mistakes += 1,
                MoveQuality::Blunder => stats.blunders += 1,
                MoveQuality::Book => stats.book_moves += 1,
                MoveQuality::Forced => stats.forced_moves += 1,
            }
            if let Some(loss) = mv.centipawn_loss {
                losses.push(f64::from(loss));
            }
            if let Some(acc) = mv.accuracy {
                accuracies.push(acc);
            }
        }

        stats.avg_cp_loss = if losses.is_empty() {
            0.0
        } else {
            losses.iter().sum::<f64>() / losses.len() as f64
        };
        stats.accuracy_percent = accuracy::side_accuracy(&accuracies);
        stats
    }
}

/// Complete analysis of a chess game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameAnalysis {
    /// Unique identifier for the game
    pub game_id: String,
    /// White player identifier
    pub white_player: String,
    /// Black player identifier
    pub black_player: String,
    /// Game result
    pub result: String,
    /// Analysis of each move
    pub moves: Vec<MoveAnalysis>,
    /// Statistics for white
    pub white_stats: PlayerStats,
    /// Statistics for black
    pub black_stats: PlayerStats,
    /// Plies that could not be evaluated by the engine
    pub unevaluated_positions: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis(quality: MoveQuality, loss: Option<i32>, acc: Option<f64>) -> MoveAnalysis {
        MoveAnalysis {
            ply: 0,
            side: Side::White,
            uci: "e2e4".to_string(),
            san: Some("e4".to_string()),
            quality,
            eval_before: Some(Evaluation::Centipawn(30)),
            eval_after: Some(Evaluation::Centipawn(25)),
            best_move: Some("e2e4".to_string()),
            engine_pv: vec![],
            centipawn_loss: loss,
            accuracy: acc,
            terminal: None,
        }
    }

    #[test]
    fn test_cp_loss_thresholds() {
        assert_eq!(MoveQuality::from_cp_loss(0), MoveQuality::Excellent);
        assert_eq!(MoveQuality::from_cp_loss(10), MoveQuality::Excellent);
        assert_eq!(MoveQuality::from_cp_loss(11), MoveQuality::Good);
        assert_eq!(MoveQuality::from_cp_loss(25), MoveQuality::Good);
        assert_eq!(MoveQuality::from_cp_loss(26), MoveQuality::Inaccuracy);
        assert_eq!(MoveQuality::from_cp_loss(100), MoveQuality::Inaccuracy);
        assert_eq!(MoveQuality::from_cp_loss(101), MoveQuality::Mistake);
        assert_eq!(MoveQuality::from_cp_loss(350), MoveQuality::Mistake);
        assert_eq!(MoveQuality::from_cp_loss(351), MoveQuality::Blunder);
        assert_eq!(MoveQuality::from_cp_loss(2000), MoveQuality::Blunder);
    }

    #[test]
    fn test_quality_serializes_lowercase() {
        let json = serde_json::to_string(&MoveQuality::Inaccuracy).unwrap();
        assert_eq!(json, "\"inaccuracy\"");
        let parsed: MoveQuality = serde_json::from_str("\"brilliant\"").unwrap();
        assert_eq!(parsed, MoveQuality::Brilliant);
    }

    #[test]
    fn test_symbols() {
        assert_eq!(MoveQuality::Blunder.symbol(), "??");
        assert_eq!(MoveQuality::Brilliant.symbol(), "!!");
        assert_eq!(MoveQuality::Best.symbol(), "");
    }

    #[test]
    fn test_player_stats_from_moves() {
        let moves = vec![
            analysis(MoveQuality::Best, Some(0), Some(100.0)),
            analysis(MoveQuality::Blunder, Some(400), Some(20.0)),
            analysis(MoveQuality::Book, Some(10), Some(90.0)),
            analysis(MoveQuality::Forced, None, None),
        ];

        let stats = PlayerStats::from_moves(&moves);
        assert_eq!(stats.total_moves, 4);
        assert_eq!(stats.best_moves, 1);
        assert_eq!(stats.blunders, 1);
        assert_eq!(stats.book_moves, 1);
        assert_eq!(stats.forced_moves, 1);
        assert!((stats.avg_cp_loss - 136.666).abs() < 0.01);
        assert!((stats.accuracy_percent - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_player_stats_without_evaluated_moves() {
        let moves = vec![analysis(MoveQuality::Forced, None, None)];
        let stats = PlayerStats::from_moves(&moves);
        assert_eq!(stats.avg_cp_loss, 0.0);
        assert_eq!(stats.accuracy_percent, 100.0);

        let empty = PlayerStats::from_moves(std::iter::empty());
        assert_eq!(empty.total_moves, 0);
        assert_eq!(empty.accuracy_percent, 100.0);
    }
}
