//! Chess game analysis over a supervised UCI engine.
//!
//! This crate runs an external UCI engine such as Stockfish as a child
//! process, keeps it healthy across a whole game, and turns its output into
//! per-move quality classifications and accuracy scores.
//!
//! # Overview
//!
//! - [`EngineSession`] - One engine process: handshake, searches, stop, restart
//! - [`AnalysisScheduler`] - Depth-scaled timeouts and retries on top of a session
//! - [`interpreter`] - Parses `info` lines into ranked [`EngineLine`]s
//! - [`Evaluation`] - Position evaluation (centipawn or mate score)
//! - [`GameAnalyzer`] - Analyzes complete games with move quality classification
//! - [`AnalyzerConfig`] - TOML configuration
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use chess_analysis::{
//!     AnalysisScheduler, AnalyzerConfig, EngineSession, GameAnalyzer, GameRecord,
//!     ProcessLauncher, ShakmatyRules, START_FEN,
//! };
//!
//! let config = AnalyzerConfig::load(None)?;
//! let launcher = Arc::new(ProcessLauncher::new(config.engine.engine_path()));
//! let session = EngineSession::new(launcher, config.engine.session_config());
//! let scheduler = Arc::new(AnalysisScheduler::new(session, config.scheduler.scheduler_config()));
//! let analyzer = GameAnalyzer::new(scheduler, config.analysis.clone());
//!
//! let moves = vec!["e2e4".to_string(), "e7e5".to_string()];
//! let record = GameRecord::replay(&ShakmatyRules, START_FEN, &moves)?;
//! let analysis = analyzer.analyze_game(&record).await?;
//! println!("White accuracy: {:.1}%", analysis.white_stats.accuracy_percent);
//! analyzer.shutdown().await;
//! ```

pub mod accuracy;
pub mod analyzer;
pub mod book;
pub mod config;
pub mod engine;
pub mod evaluation;
pub mod interpreter;
pub mod launcher;
pub mod quality;
pub mod rules;
pub mod scheduler;

#[cfg(test)]
mod fake;

pub use analyzer::{
    AnalysisConfig, AnalyzerError, GameAnalyzer, GameRecord, PlyInput, PositionEval, START_FEN,
};
pub use book::{NoBook, OpeningBook, PlyCountBook};
pub use config::{AnalyzerConfig, ConfigError, EngineConfig, SchedulerSettings};
pub use engine::{EngineError, EngineSession, SessionConfig, SessionState};
pub use evaluation::Evaluation;
pub use interpreter::{EngineLine, InterpretError, LineCollector};
pub use launcher::{EngineIo, Launcher, ProcessLauncher};
pub use quality::{GameAnalysis, MoveAnalysis, MoveQuality, PlayerStats, Side};
pub use rules::{ChessRules, ShakmatyRules, TerminalState};
pub use scheduler::{AnalysisScheduler, SchedulerConfig};
