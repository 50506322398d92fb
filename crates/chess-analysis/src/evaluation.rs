//! Chess position evaluation types.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Centipawn value standing in for a mate score in arithmetic.
pub const MATE_VALUE: i32 = 10_000;

/// Bound applied to centipawn values before loss and accuracy math.
pub const EVAL_CLAMP: i32 = 1_000;

/// Represents a chess position evaluation.
///
/// Scores are relative to the side to move in the analyzed position.
/// `MateIn(n)` with `n > 0` means the side to move mates in `n`; `n < 0`
/// means it gets mated; `MateIn(0)` means it is already mated.
///
/// The ordering ranks any mate for the side to move above every centipawn
/// score, shorter mates above longer ones, and mates against the side to
/// move below every centipawn score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Evaluation {
    /// Centipawn evaluation
    Centipawn(i32),
    /// Mate in N moves
    MateIn(i32),
}

impl Evaluation {
    /// The same evaluation seen from the other side.
    ///
    /// `MateIn(0)` flips to `MateIn(1)`, the strongest mate that can be
    /// expressed, so the flip is not an exact involution for that value.
    pub fn flip(self) -> Self {
        match self {
            Evaluation::Centipawn(cp) => Evaluation::Centipawn(cp.saturating_neg()),
            Evaluation::MateIn(0) => Evaluation::MateIn(1),
            Evaluation::MateIn(n) => Evaluation::MateIn(n.saturating_neg()),
        }
    }

    /// Flips the evaluation unless `keep` is true.
    pub fn flip_unless(self, keep: bool) -> Self {
        if keep {
            self
        } else {
            self.flip()
        }
    }

    /// Centipawn value, mapping mate scores to `±(MATE_VALUE - |n|)`.
    pub fn to_centipawns(self) -> i32 {
        match self {
            Evaluation::Centipawn(cp) => cp,
            Evaluation::MateIn(0) => -MATE_VALUE,
            Evaluation::MateIn(n) if n > 0 => MATE_VALUE - n,
            Evaluation::MateIn(n) => -MATE_VALUE - n,
        }
    }

    /// Centipawn value bounded to `±EVAL_CLAMP`.
    pub fn clamped_centipawns(self) -> i32 {
        self.to_centipawns().clamp(-EVAL_CLAMP, EVAL_CLAMP)
    }

    pub fn is_mate(self) -> bool {
        matches!(self, Evaluation::MateIn(_))
    }

    fn sort_key(self) -> (u8, i64) {
        match self {
            Evaluation::MateIn(n) if n > 0 => (2, -i64::from(n)),
            Evaluation::Centipawn(cp) => (1, i64::from(cp)),
            Evaluation::MateIn(n) => (0, -i64::from(n)),
        }
    }
}

impl Ord for Evaluation {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for Evaluation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<uci::Score> for Evaluation {
    fn from(score: uci::Score) -> Self {
        match score {
            uci::Score::Cp(cp) => Evaluation::Centipawn(cp),
            uci::Score::Mate(m) => Evaluation::MateIn(m),
        }
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Evaluation::Centipawn(cp) => write!(f, "{:+.2}", f64::from(*cp) / 100.0),
            Evaluation::MateIn(n) => write!(f, "#{}", n),
        }
    }
}
