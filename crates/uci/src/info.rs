//! UCI info command types.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Score in centipawns or mate distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Score {
    /// Centipawn score (100 = 1 pawn advantage).
    Cp(i32),
    /// Mate in N moves (positive = engine winning, negative = engine losing).
    Mate(i32),
}

/// Marks a score that is only a bound from an aspiration window fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bound {
    Lower,
    Upper,
}

/// Search information from engine.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EngineInfo {
    /// Search depth in plies.
    pub depth: Option<u32>,
    /// Selective search depth.
    pub seldepth: Option<u32>,
    /// Principal variation index (1 = best line).
    pub multipv: Option<u32>,
    /// Score evaluation.
    pub score: Option<Score>,
    /// Set when the score is a lower or upper bound rather than exact.
    pub bound: Option<Bound>,
    /// Nodes searched.
    pub nodes: Option<u64>,
    /// Nodes per second.
    pub nps: Option<u64>,
    /// Time spent in milliseconds.
    pub time: Option<u64>,
    /// Principal variation (best line found).
    pub pv: Vec<String>,
    /// Current move being searched.
    pub currmove: Option<String>,
    /// Current move number.
    pub currmovenumber: Option<u32>,
    /// Hash table usage (per mille).
    pub hashfull: Option<u32>,
    /// Arbitrary string info.
    pub string: Option<String>,
}

impl EngineInfo {
    /// Create a new empty info.
    pub fn new() -> Self {
        Self::default()
    }

    /// Format as UCI info string.
    pub fn to_uci(&self) -> String {
        let mut parts = vec!["info".to_string()];

        if let Some(d) = self.depth {
            parts.push(format!("depth {}", d));
        }
        if let Some(d) = self.seldepth {
            parts.push(format!("seldepth {}", d));
        }
        if let Some(m) = self.multipv {
            parts.push(format!("multipv {}", m));
        }
        if let Some(s) = self.score {
            match s {
                Score::Cp(cp) => parts.push(format!("score cp {}", cp)),
                Score::Mate(m) => parts.push(format!("score mate {}", m)),
            }
            match self.bound {
                Some(Bound::Lower) => parts.push("lowerbound".to_string()),
                Some(Bound::Upper) => parts.push("upperbound".to_string()),
                None => {}
            }
        }
        if let Some(n) = self.nodes {
            parts.push(format!("nodes {}", n));
        }
        if let Some(n) = self.nps {
            parts.push(format!("nps {}", n));
        }
        if let Some(t) = self.time {
            parts.push(format!("time {}", t));
        }
        if let Some(h) = self.hashfull {
            parts.push(format!("hashfull {}", h));
        }
        if let Some(ref m) = self.currmove {
            parts.push(format!("currmove {}", m));
        }
        if let Some(n) = self.currmovenumber {
            parts.push(format!("currmovenumber {}", n));
        }
        if !self.pv.is_empty() {
            parts.push(format!("pv {}", self.pv.join(" ")));
        }
        if let Some(ref s) = self.string {
            parts.push(format!("string {}", s));
        }

        parts.join(" ")
    }

    /// Parse UCI info line.
    ///
    /// Returns `None` if the line is not an `info` line, or if a numeric
    /// field is present but its value is missing or unreadable.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.first() != Some(&"info") {
            return None;
        }

        let mut info = EngineInfo::new();
        let mut i = 1; // Skip "info"

        while i < parts.len() {
            match parts[i] {
                "depth" => {
                    i += 1;
                    info.depth = Some(number(&parts, i)?);
                }
                "seldepth" => {
                    i += 1;
                    info.seldepth = Some(number(&parts, i)?);
                }
                "multipv" => {
                    i += 1;
                    info.multipv = Some(number(&parts, i)?);
                }
                "score" => {
                    i += 1;
                    match parts.get(i).copied() {
                        Some("cp") => {
                            i += 1;
                            info.score = Some(Score::Cp(number(&parts, i)?));
                        }
                        Some("mate") => {
                            i += 1;
                            info.score = Some(Score::Mate(number(&parts, i)?));
                        }
                        _ => return None,
                    }
                }
                "lowerbound" => info.bound = Some(Bound::Lower),
                "upperbound" => info.bound = Some(Bound::Upper),
                "nodes" => {
                    i += 1;
                    info.nodes = Some(number(&parts, i)?);
                }
                "nps" => {
                    i += 1;
                    info.nps = Some(number(&parts, i)?);
                }
                "time" => {
                    i += 1;
                    info.time = Some(number(&parts, i)?);
                }
                "pv" => {
                    i += 1;
                    // Collect all remaining moves until another keyword or end
                    while i < parts.len() && !is_info_keyword(parts[i]) {
                        info.pv.push(parts[i].to_string());
                        i += 1;
                    }
                    continue; // Don't increment i again
                }
                "currmove" => {
                    i += 1;
                    info.currmove = parts.get(i).map(|s| s.to_string());
                }
                "currmovenumber" => {
                    i += 1;
                    info.currmovenumber = Some(number(&parts, i)?);
                }
                "hashfull" => {
                    i += 1;
                    info.hashfull = Some(number(&parts, i)?);
                }
                "string" => {
                    // Rest of line is the string
                    info.string = Some(parts[i + 1..].join(" "));
                    break;
                }
                _ => {}
            }
            i += 1;
        }

        Some(info)
    }
}

fn number<T: FromStr>(parts: &[&str], i: usize) -> Option<T> {
    parts.get(i)?.parse().ok()
}

fn is_info_keyword(s: &str) -> bool {
    matches!(
        s,
        "depth"
            | "seldepth"
            | "multipv"
            | "score"
            | "nodes"
            | "nps"
            | "time"
            | "pv"
            | "currmove"
            | "currmovenumber"
            | "hashfull"
            | "tbhits"
            | "string"
    )
}

/// Builder for constructing EngineInfo.
#[derive(Default)]
pub struct InfoBuilder {
    info: EngineInfo,
}

impl InfoBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(mut self, d: u32) -> Self {
        self.info.depth = Some(d);
        self
    }

    pub fn seldepth(mut self, d: u32) -> Self {
        self.info.seldepth = Some(d);
        self
    }

    pub fn multipv(mut self, rank: u32) -> Self {
        self.info.multipv = Some(rank);
        self
    }

    pub fn score_cp(mut self, cp: i32) -> Self {
        self.info.score = Some(Score::Cp(cp));
        self
    }

    pub fn score_mate(mut self, moves: i32) -> Self {
        self.info.score = Some(Score::Mate(moves));
        self
    }

    pub fn bound(mut self, bound: Bound) -> Self {
        self.info.bound = Some(bound);
        self
    }

    pub fn nodes(mut self, n: u64) -> Self {
        self.info.nodes = Some(n);
        self
    }

    pub fn time(mut self, ms: u64) -> Self {
        self.info.time = Some(ms);
        self
    }

    pub fn pv(mut self, moves: Vec<String>) -> Self {
        self.info.pv = moves;
        self
    }

    pub fn currmove(mut self, mv: &str) -> Self {
        self.info.currmove = Some(mv.to_string());
        self
    }

    pub fn string(mut self, s: &str) -> Self {
        self.info.string = Some(s.to_string());
        self
    }

    pub fn build(self) -> EngineInfo {
        self.info
    }
}
