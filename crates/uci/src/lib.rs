//! UCI (Universal Chess Interface) protocol messages.
//!
//! This crate provides the text format of the UCI protocol as seen from the
//! analyzing side: commands written to an engine's stdin and the messages an
//! engine writes back on stdout. Both directions can be parsed and formatted,
//! so scripted engines for tests are built from the same types.
//!
//! # Commands sent to the engine
//!
//! - `uci` - Initialize engine, get id and options
//! - `setoption name <id> value <x>` - Configure the engine
//! - `isready` / `readyok` - Synchronization
//! - `ucinewgame` - Forget state from a previous game
//! - `position fen <fen> [moves <move>...]` - Set position
//! - `go [movetime <ms>] [depth <d>]` - Start search
//! - `stop` - Stop search
//! - `quit` - Exit engine
//!
//! # Messages from the engine
//!
//! - `id name <name>` / `id author <author>`
//! - `uciok`, `readyok`
//! - `info ...` - Search progress, see [`EngineInfo`]
//! - `bestmove <move> [ponder <move>]` - Search finished

mod command;
mod info;

pub use command::{GoOptions, GuiCommand};
pub use info::{Bound, EngineInfo, InfoBuilder, Score};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum UciError {
    #[error("Invalid command: {0}")]
    InvalidCommand(String),
    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Messages sent from engine to GUI.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineMessage {
    /// Engine identification.
    Id {
        name: Option<String>,
        author: Option<String>,
    },
    /// UCI initialization complete.
    UciOk,
    /// Engine is ready.
    ReadyOk,
    /// Search information.
    Info(EngineInfo),
    /// Search finished. `mv` is `(none)` when the position has no legal move.
    BestMove { mv: String, ponder: Option<String> },
    /// Anything else (`option ...`, banners, unknown tokens).
    Other(String),
}

impl EngineMessage {
    /// Parse one line of engine output.
    ///
    /// Never fails: lines that are not recognized become [`EngineMessage::Other`],
    /// and `info` lines whose fields cannot be read are reported the same way.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let mut parts = line.split_whitespace();

        match parts.next() {
            Some("uciok") => EngineMessage::UciOk,
            Some("readyok") => EngineMessage::ReadyOk,
            Some("id") => match parts.next() {
                Some("name") => EngineMessage::Id {
                    name: Some(parts.collect::<Vec<_>>().join(" ")),
                    author: None,
                },
                Some("author") => EngineMessage::Id {
                    name: None,
                    author: Some(parts.collect::<Vec<_>>().join(" ")),
                },
                _ => EngineMessage::Other(line.to_string()),
            },
            Some("bestmove") => match parts.next() {
                Some(mv) => {
                    let ponder = match parts.next() {
                        Some("ponder") => parts.next().map(str::to_string),
                        _ => None,
                    };
                    EngineMessage::BestMove {
                        mv: mv.to_string(),
                        ponder,
                    }
                }
                None => EngineMessage::Other(line.to_string()),
            },
            Some("info") => match EngineInfo::parse(line) {
                Some(info) => EngineMessage::Info(info),
                None => EngineMessage::Other(line.to_string()),
            },
            _ => EngineMessage::Other(line.to_string()),
        }
    }

    /// Format message for output.
    pub fn to_uci(&self) -> String {
        match self {
            EngineMessage::Id { name, author } => {
                let mut parts = Vec::new();
                if let Some(n) = name {
                    parts.push(format!("id name {}", n));
                }
                if let Some(a) = author {
                    parts.push(format!("id author {}", a));
                }
                parts.join("\n")
            }
            EngineMessage::UciOk => "uciok".to_string(),
            EngineMessage::ReadyOk => "readyok".to_string(),
            EngineMessage::Info(info) => info.to_uci(),
            EngineMessage::BestMove { mv, ponder } => match ponder {
                Some(p) => format!("bestmove {} ponder {}", mv, p),
                None => format!("bestmove {}", mv),
            },
            EngineMessage::Other(raw) => raw.clone(),
        }
    }

    /// True for the token that ends a search.
    pub fn is_bestmove(&self) -> bool {
        matches!(self, EngineMessage::BestMove { .. })
    }
}
