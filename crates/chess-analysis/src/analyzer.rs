//! Game analysis with move quality classification.
//!
//! This module provides the [`GameAnalyzer`] for analyzing complete chess games
//! and classifying each move's quality.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shakmaty::Color;
use thiserror::Error;
use tracing::{debug, info};

use crate::accuracy;
use crate::book::{OpeningBook, PlyCountBook};
use crate::engine::EngineError;
use crate::evaluation::Evaluation;
use crate::interpreter::{best_line, is_coordinate_move, EngineLine};
use crate::quality::{GameAnalysis, MoveAnalysis, MoveQuality, PlayerStats, Side};
use crate::rules::{ChessRules, ShakmatyRules, TerminalState};
use crate::scheduler::AnalysisScheduler;

/// Material the mover must be down after the best reply for a best move to
/// count as a sacrifice.
pub const SACRIFICE_THRESHOLD: i32 = 200;

/// How far ahead of the second line a best move must be to count as great.
pub const GREAT_MOVE_GAP: i32 = 150;

/// Standard starting position.
pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Errors that can occur during game analysis.
#[derive(Error, Debug)]
pub enum AnalyzerError {
    /// Error from the analysis engine.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
    /// Invalid game data was provided.
    #[error("Invalid game data: {0}")]
    InvalidGame(String),
}

/// One ply of a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlyInput {
    /// Position after the move.
    pub fen_after: String,
    /// The move in UCI notation (e.g., "e2e4").
    pub played_uci: String,
}

/// A game to analyze.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub game_id: String,
    pub white_player: String,
    pub black_player: String,
    /// Game result (e.g., "1-0", "0-1", "1/2-1/2", "*").
    pub result: String,
    pub initial_fen: String,
    pub plies: Vec<PlyInput>,
}

impl GameRecord {
    /// Builds a record by replaying UCI moves from `initial_fen`.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyzerError::InvalidGame`] if the FEN is invalid or a
    /// move is illegal.
    pub fn replay(
        rules: &dyn ChessRules,
        initial_fen: &str,
        moves: &[String],
    ) -> Result<Self, AnalyzerError> {
        if !rules.is_valid_fen(initial_fen) {
            return Err(AnalyzerError::InvalidGame(format!(
                "invalid initial FEN '{}'",
                initial_fen
            )));
        }

        let mut fen = initial_fen.to_string();
        let mut plies = Vec::with_capacity(moves.len());
        for (ply, uci) in moves.iter().enumerate() {
            fen = rules.play_uci(&fen, uci).ok_or_else(|| {
                AnalyzerError::InvalidGame(format!("ply {}: illegal move '{}'", ply + 1, uci))
            })?;
            plies.push(PlyInput {
                fen_after: fen.clone(),
                played_uci: uci.clone(),
            });
        }

        Ok(Self {
            game_id: "game".to_string(),
            white_player: "White".to_string(),
            black_player: "Black".to_string(),
            result: "*".to_string(),
            initial_fen: initial_fen.to_string(),
            plies,
        })
    }
}

/// Configuration for game analysis.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Maximum search depth for position analysis.
    pub depth: u32,
    /// Number of opening plies treated as book moves.
    pub opening_book_moves: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            depth: 15,
            opening_book_moves: 0,
        }
    }
}

/// What is known about one position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionEval {
    /// The game is over; the engine was not asked.
    Terminal(TerminalState),
    /// Engine lines, best first. Empty when the engine failed.
    Lines(Vec<EngineLine>),
}

impl PositionEval {
    pub fn lines(&self) -> &[EngineLine] {
        match self {
            PositionEval::Lines(lines) => lines,
            PositionEval::Terminal(_) => &[],
        }
    }

    pub fn terminal(&self) -> Option<TerminalState> {
        match self {
            PositionEval::Terminal(state) => Some(*state),
            PositionEval::Lines(_) => None,
        }
    }

    fn is_unevaluated(&self) -> bool {
        matches!(self, PositionEval::Lines(lines) if lines.is_empty())
    }
}

/// Analyzes chess games to classify move quality.
///
/// Every position is evaluated once through the scheduler. Engine trouble
/// never fails an analysis; positions that could not be evaluated leave
/// their moves classified as forced.
pub struct GameAnalyzer {
    scheduler: Arc<AnalysisScheduler>,
    rules: Box<dyn ChessRules>,
    book: Box<dyn OpeningBook>,
    config: AnalysisConfig,
}

impl GameAnalyzer {
    /// Creates an analyzer using `shakmaty` rules and a book covering the
    /// configured number of opening plies.
    pub fn new(scheduler: Arc<AnalysisScheduler>, config: AnalysisConfig) -> Self {
        Self {
            scheduler,
            rules: Box::new(ShakmatyRules),
            book: Box::new(PlyCountBook::new(config.opening_book_moves)),
            config,
        }
    }

    pub fn with_rules(mut self, rules: impl ChessRules + 'static) -> Self {
        self.rules = Box::new(rules);
        self
    }

    pub fn with_book(mut self, book: impl OpeningBook + 'static) -> Self {
        self.book = Box::new(book);
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn rules(&self) -> &dyn ChessRules {
        self.rules.as_ref()
    }

    /// Starts the engine ahead of the first request.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyzerError::Engine`] if the engine binary is missing or
    /// never becomes ready.
    pub async fn start(&self) -> Result<(), AnalyzerError> {
        self.scheduler.start().await?;
        Ok(())
    }

    /// Name reported by the engine during its handshake.
    pub async fn engine_name(&self) -> Option<String> {
        self.scheduler.engine_name().await
    }

    /// Stops the engine. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }

    /// Evaluates a single position at the configured depth.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyzerError::InvalidGame`] if the FEN is invalid.
    pub async fn evaluate_position(&self, fen: &str) -> Result<PositionEval, AnalyzerError> {
        if !self.rules.is_valid_fen(fen) {
            return Err(AnalyzerError::InvalidGame(format!("invalid FEN '{}'", fen)));
        }
        Ok(self.evaluate(fen).await)
    }

    /// Analyzes a complete chess game.
    ///
    /// For each move in the game:
    /// 1. Compares the best line before the move with the evaluation of
    ///    the position after it, both from the mover's perspective.
    /// 2. Classifies the move and computes its centipawn loss and accuracy.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyzerError::InvalidGame`] for an invalid FEN, a move
    /// that is not in UCI notation, or a move that is illegal.
    pub async fn analyze_game(&self, record: &GameRecord) -> Result<GameAnalysis, AnalyzerError> {
        self.validate(record)?;
        info!(
            game_id = %record.game_id,
            plies = record.plies.len(),
            depth = self.config.depth,
            "Analyzing game"
        );

        self.scheduler.new_game().await;

        let fens: Vec<&str> = std::iter::once(record.initial_fen.as_str())
            .chain(record.plies.iter().map(|p| p.fen_after.as_str()))
            .collect();

        let mut evals = Vec::with_capacity(fens.len());
        for (index, fen) in fens.iter().enumerate() {
            debug!(position = index, total = fens.len(), fen, "Evaluating position");
            evals.push(self.evaluate(fen).await);
        }

        let moves: Vec<MoveAnalysis> = record
            .plies
            .iter()
            .enumerate()
            .map(|(ply, input)| {
                self.analyze_move(ply, fens[ply], &input.played_uci, &evals[ply], &evals[ply + 1])
            })
            .collect();

        let white_stats =
            PlayerStats::from_moves(moves.iter().filter(|m| m.side == Side::White));
        let black_stats =
            PlayerStats::from_moves(moves.iter().filter(|m| m.side == Side::Black));
        let unevaluated_positions = evals.iter().filter(|e| e.is_unevaluated()).count();

        info!(
            game_id = %record.game_id,
            white_accuracy = white_stats.accuracy_percent,
            black_accuracy = black_stats.accuracy_percent,
            unevaluated_positions,
            "Game analysis complete"
        );

        Ok(GameAnalysis {
            game_id: record.game_id.clone(),
            white_player: record.white_player.clone(),
            black_player: record.black_player.clone(),
            result: record.result.clone(),
            moves,
            white_stats,
            black_stats,
            unevaluated_positions,
        })
    }

    fn validate(&self, record: &GameRecord) -> Result<(), AnalyzerError> {
        if !self.rules.is_valid_fen(&record.initial_fen) {
            return Err(AnalyzerError::InvalidGame(format!(
                "invalid initial FEN '{}'",
                record.initial_fen
            )));
        }

        let mut fen_before = record.initial_fen.as_str();
        for (index, ply) in record.plies.iter().enumerate() {
            let n = index + 1;
            if !is_coordinate_move(&ply.played_uci) {
                return Err(AnalyzerError::InvalidGame(format!(
                    "ply {}: '{}' is not a UCI move",
                    n, ply.played_uci
                )));
            }
            if !self.rules.is_valid_fen(&ply.fen_after) {
                return Err(AnalyzerError::InvalidGame(format!(
                    "ply {}: invalid FEN '{}'",
                    n, ply.fen_after
                )));
            }
            if self.rules.play_uci(fen_before, &ply.played_uci).is_none() {
                return Err(AnalyzerError::InvalidGame(format!(
                    "ply {}: illegal move '{}'",
                    n, ply.played_uci
                )));
            }
            fen_before = &ply.fen_after;
        }
        Ok(())
    }

    async fn evaluate(&self, fen: &str) -> PositionEval {
        if let Some(state) = self.rules.terminal_state(fen) {
            debug!(fen, ?state, "Terminal position, not sent to engine");
            return PositionEval::Terminal(state);
        }
        let max_attempts = self.scheduler.config().max_attempts;
        PositionEval::Lines(
            self.scheduler
                .evaluate_with_retry(fen, self.config.depth, max_attempts)
                .await,
        )
    }

    fn analyze_move(
        &self,
        ply: usize,
        fen_before: &str,
        uci: &str,
        before: &PositionEval,
        after: &PositionEval,
    ) -> MoveAnalysis {
        let mover = self.rules.side_to_move(fen_before).unwrap_or(Color::White);
        let white_pov = mover == Color::White;
        let best = best_line(before.lines()).ok();
        let played = played_evaluation(uci, before, after);

        let cp_loss = match (best, played) {
            (Some(best), Some(played)) => Some(
                (best.evaluation.clamped_centipawns() - played.clamped_centipawns()).max(0),
            ),
            _ => None,
        };

        let quality = if self.book.is_book_move(ply, fen_before, uci) {
            MoveQuality::Book
        } else if self.rules.legal_move_count(fen_before) == 1 {
            MoveQuality::Forced
        } else {
            match (best, played, cp_loss) {
                (Some(best), Some(played), _) if best.move_uci == uci => {
                    self.classify_best_move(fen_before, uci, mover, before.lines(), played, after)
                }
                (Some(_), Some(_), Some(loss)) => MoveQuality::from_cp_loss(loss),
                _ => MoveQuality::Forced,
            }
        };

        let move_accuracy = match (best, played) {
            (Some(best), Some(played)) => Some(accuracy::move_accuracy_cp(
                best.evaluation.clamped_centipawns(),
                played.clamped_centipawns(),
            )),
            _ => None,
        };

        MoveAnalysis {
            ply,
            side: Side::from(mover),
            uci: uci.to_string(),
            san: self.rules.to_san(fen_before, uci),
            quality,
            eval_before: best.map(|b| b.evaluation.flip_unless(white_pov)),
            eval_after: played.map(|p| p.flip_unless(white_pov)),
            best_move: best.map(|b| b.move_uci.clone()),
            engine_pv: best.map(|b| b.pv.clone()).unwrap_or_default(),
            centipawn_loss: cp_loss,
            accuracy: move_accuracy,
            terminal: after.terminal(),
        }
    }

    fn classify_best_move(
        &self,
        fen_before: &str,
        uci: &str,
        mover: Color,
        lines_before: &[EngineLine],
        played: Evaluation,
        after: &PositionEval,
    ) -> MoveQuality {
        if played.clamped_centipawns() >= 0 && self.is_sacrifice(fen_before, uci, mover, after) {
            return MoveQuality::Brilliant;
        }

        let best = lines_before.iter().find(|l| l.rank == 1);
        let second = lines_before.iter().find(|l| l.rank == 2);
        match (best, second) {
            (Some(best), Some(second))
                if best.evaluation.clamped_centipawns() - second.evaluation.clamped_centipawns()
                    >= GREAT_MOVE_GAP =>
            {
                MoveQuality::Great
            }
            _ => MoveQuality::Best,
        }
    }

    /// Whether the mover is down material after the engine's best reply.
    fn is_sacrifice(&self, fen_before: &str, uci: &str, mover: Color, after: &PositionEval) -> bool {
        let Ok(reply) = best_line(after.lines()) else {
            return false;
        };

        let balance_change = || -> Option<i32> {
            let before = self.rules.material_balance(fen_before)?;
            let fen_after = self.rules.play_uci(fen_before, uci)?;
            let fen_reply = self.rules.play_uci(&fen_after, &reply.move_uci)?;
            let after = self.rules.material_balance(&fen_reply)?;
            Some(after - before)
        };

        match balance_change() {
            Some(change) => {
                let mover_change = if mover == Color::White { change } else { -change };
                mover_change <= -SACRIFICE_THRESHOLD
            }
            None => false,
        }
    }
}

/// Evaluation of the played move from the mover's perspective.
fn played_evaluation(uci: &str, before: &PositionEval, after: &PositionEval) -> Option<Evaluation> {
    match after {
        PositionEval::Terminal(TerminalState::Checkmate) => Some(Evaluation::MateIn(0).flip()),
        PositionEval::Terminal(_) => Some(Evaluation::Centipawn(0)),
        PositionEval::Lines(lines) => best_line(lines)
            .ok()
            .map(|line| line.evaluation.flip())
            .or_else(|| {
                before
                    .lines()
                    .iter()
                    .find(|line| line.move_uci == uci)
                    .map(|line| line.evaluation)
            }),
    }
}
