//! Turns raw engine output into ranked engine lines.
//!
//! Everything here is pure: a line of text goes in, structured data comes
//! out. Scores are kept exactly as the engine states them, relative to the
//! side to move in the analyzed position; callers that want a fixed
//! perspective flip them themselves.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uci::EngineInfo;

use crate::evaluation::Evaluation;

/// Largest centipawn magnitude accepted from an engine.
const MAX_SCORE_CP: i32 = 100_000;
/// Largest mate distance accepted from an engine.
const MAX_MATE_MOVES: i32 = 1_000;

/// Errors produced when reading results out of a set of engine lines.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InterpretError {
    /// The analysis produced no usable line.
    #[error("No engine lines available")]
    NoLinesAvailable,
}

/// One principal variation reported by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineLine {
    /// Principal variation index, 1 = best.
    pub rank: u32,
    /// Depth at which this line was reported.
    pub depth: u32,
    /// Score from the side to move's perspective.
    pub evaluation: Evaluation,
    /// First move of the variation in coordinate notation.
    pub move_uci: String,
    /// The full variation, starting with `move_uci`.
    pub pv: Vec<String>,
}

/// Parses one line of engine output.
///
/// Returns `None` for anything that is not an exact-score `info` line with a
/// depth, an in-range score and a variation starting with a coordinate move.
/// Bound scores from aspiration window fails are skipped since an exact line
/// follows them.
pub fn parse_line(line: &str) -> Option<EngineLine> {
    let info = EngineInfo::parse(line)?;
    if info.bound.is_some() {
        return None;
    }

    let depth = info.depth?;
    let rank = info.multipv.unwrap_or(1);
    if rank == 0 {
        return None;
    }
    let evaluation = match Evaluation::from(info.score?) {
        Evaluation::Centipawn(cp) if cp.unsigned_abs() > MAX_SCORE_CP as u32 => return None,
        Evaluation::MateIn(n) if n.unsigned_abs() > MAX_MATE_MOVES as u32 => return None,
        evaluation => evaluation,
    };
    let move_uci = info.pv.first().filter(|m| is_coordinate_move(m))?.clone();

    Some(EngineLine {
        rank,
        depth,
        evaluation,
        move_uci,
        pv: info.pv,
    })
}

/// Checks for a 4 or 5 character coordinate move such as `e2e4` or `e7e8q`.
pub fn is_coordinate_move(mv: &str) -> bool {
    let b = mv.as_bytes();
    let square = |f: u8, r: u8| (b'a'..=b'h').contains(&f) && (b'1'..=b'8').contains(&r);
    match b.len() {
        4 => square(b[0], b[1]) && square(b[2], b[3]),
        5 => square(b[0], b[1]) && square(b[2], b[3]) && b"qrbn".contains(&b[4]),
        _ => false,
    }
}

/// Accumulates `info` lines during one search.
///
/// Deeper lines supersede shallower ones of the same rank; a later line at
/// the same depth supersedes an earlier one.
#[derive(Debug, Default, Clone)]
pub struct LineCollector {
    by_rank: BTreeMap<u32, EngineLine>,
    discarded: usize,
}

impl LineCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one raw output line. Returns whether it was kept.
    pub fn feed(&mut self, raw: &str) -> bool {
        match parse_line(raw) {
            Some(line) => {
                self.push(line);
                true
            }
            None => {
                if raw.starts_with("info") {
                    self.discarded += 1;
                }
                false
            }
        }
    }

    pub fn push(&mut self, line: EngineLine) {
        match self.by_rank.get(&line.rank) {
            Some(existing) if existing.depth > line.depth => {}
            _ => {
                self.by_rank.insert(line.rank, line);
            }
        }
    }

    /// Number of `info` lines that could not be used.
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    pub fn is_empty(&self) -> bool {
        self.by_rank.is_empty()
    }

    /// The deepest line per rank, for the contiguous ranks starting at 1.
    pub fn lines(&self) -> Vec<EngineLine> {
        self.by_rank
            .values()
            .enumerate()
            .take_while(|(i, line)| line.rank as usize == i + 1)
            .map(|(_, line)| line.clone())
            .collect()
    }

    pub fn finish(self) -> Vec<EngineLine> {
        self.lines()
    }
}

/// The rank-1 line of an analysis.
pub fn best_line(lines: &[EngineLine]) -> Result<&EngineLine, InterpretError> {
    lines
        .iter()
        .find(|line| line.rank == 1)
        .ok_or(InterpretError::NoLinesAvailable)
}

/// The move of the rank-1 line.
pub fn best_move(lines: &[EngineLine]) -> Result<&str, InterpretError> {
    best_line(lines).map(|line| line.move_uci.as_str())
}
