//! Output of a finished review: a plain-text summary and a JSON report.

use std::fmt::Write as _;
use std::path::Path;

use chess_analysis::{GameAnalysis, MoveAnalysis, PlayerStats, Side};
use serde::Serialize;

/// JSON representation of a reviewed game.
///
/// The analysis fields are flattened into the top level next to the
/// engine that produced them.
#[derive(Serialize)]
struct ReportJson<'a> {
    /// Name reported by the engine, if the handshake got that far.
    #[serde(skip_serializing_if = "Option::is_none")]
    engine: Option<&'a str>,
    /// Requested search depth per position.
    depth: u32,
    #[serde(flatten)]
    analysis: &'a GameAnalysis,
}

/// Writes the analysis to `path` as pretty-printed JSON.
pub fn write_json<P: AsRef<Path>>(
    path: P,
    engine: Option<&str>,
    depth: u32,
    analysis: &GameAnalysis,
) -> std::io::Result<()> {
    let json = ReportJson {
        engine,
        depth,
        analysis,
    };

    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(file, &json)?;
    Ok(())
}

/// Renders the move list and per-side statistics.
pub fn format_summary(analysis: &GameAnalysis) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} vs {} ({})",
        analysis.white_player, analysis.black_player, analysis.result
    );
    out.push('\n');

    for mv in &analysis.moves {
        let _ = writeln!(out, "{}", format_move(mv));
    }

    out.push('\n');
    out.push_str(&format_stats(&analysis.white_player, &analysis.white_stats));
    out.push_str(&format_stats(&analysis.black_player, &analysis.black_stats));

    if analysis.unevaluated_positions > 0 {
        let _ = writeln!(
            out,
            "\nWarning: {} position(s) could not be evaluated",
            analysis.unevaluated_positions
        );
    }
    out
}

fn format_move(mv: &MoveAnalysis) -> String {
    let number = mv.ply / 2 + 1;
    let prefix = match mv.side {
        Side::White => format!("{}.", number),
        Side::Black => format!("{}...", number),
    };
    let notation = format!(
        "{}{}",
        mv.san.as_deref().unwrap_or(&mv.uci),
        mv.quality.symbol()
    );

    let mut line = format!("{:>6} {:<9} {:<11}", prefix, notation, format!("{:?}", mv.quality));
    if let Some(eval) = mv.eval_after {
        let _ = write!(line, " {:>7}", eval.to_string());
    }
    if let Some(loss) = mv.centipawn_loss.filter(|&loss| loss > 0) {
        let _ = write!(line, "  -{}cp", loss);
    }
    if let Some(best) = mv.best_move.as_deref().filter(|&best| best != mv.uci) {
        let _ = write!(line, "  best {}", best);
    }
    line.trim_end().to_string()
}

fn format_stats(player: &str, stats: &PlayerStats) -> String {
    format!(
        "{}: accuracy {:.1}%, avg loss {:.1}cp, {} brilliant, {} great, {} best, {} excellent, \
         {} good, {} inaccuracies, {} mistakes, {} blunders, {} book, {} forced\n",
        player,
        stats.accuracy_percent,
        stats.avg_cp_loss,
        stats.brilliant,
        stats.great,
        stats.best_moves,
        stats.excellent_moves,
        stats.good_moves,
        stats.inaccuracies,
        stats.mistakes,
        stats.blunders,
        stats.book_moves,
        stats.forced_moves,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess_analysis::{Evaluation, MoveQuality};

    fn sample_analysis() -> GameAnalysis {
        let moves = vec![
            MoveAnalysis {
                ply: 0,
                side: Side::White,
                uci: "e2e4".to_string(),
                san: Some("e4".to_string()),
                quality: MoveQuality::Best,
                eval_before: Some(Evaluation::Centipawn(30)),
                eval_after: Some(Evaluation::Centipawn(30)),
                best_move: Some("e2e4".to_string()),
                engine_pv: vec!["e2e4".to_string(), "e7e5".to_string()],
                centipawn_loss: Some(0),
                accuracy: Some(100.0),
                terminal: None,
            },
            MoveAnalysis {
                ply: 1,
                side: Side::Black,
                uci: "f7f6".to_string(),
                san: Some("f6".to_string()),
                quality: MoveQuality::Inaccuracy,
                eval_before: Some(Evaluation::Centipawn(-30)),
                eval_after: Some(Evaluation::Centipawn(-90)),
                best_move: Some("e7e5".to_string()),
                engine_pv: vec!["e7e5".to_string()],
                centipawn_loss: Some(60),
                accuracy: Some(80.0),
                terminal: None,
            },
        ];
        let white_stats = PlayerStats::from_moves(moves.iter().filter(|m| m.side == Side::White));
        let black_stats = PlayerStats::from_moves(moves.iter().filter(|m| m.side == Side::Black));
        GameAnalysis {
            game_id: "test-game".to_string(),
            white_player: "Alice".to_string(),
            black_player: "Bob".to_string(),
            result: "*".to_string(),
            moves,
            white_stats,
            black_stats,
            unevaluated_positions: 1,
        }
    }

    #[test]
    fn test_summary_lists_moves_and_players() {
        let summary = format_summary(&sample_analysis());

        assert!(summary.starts_with("Alice vs Bob (*)"));
        assert!(summary.contains("1. e4"));
        assert!(summary.contains("1... f6?!"));
        assert!(summary.contains("Inaccuracy"));
        assert!(summary.contains("-60cp"));
        assert!(summary.contains("best e7e5"));
        assert!(summary.contains("Alice: accuracy 100.0%"));
        assert!(summary.contains("Bob: accuracy"));
        assert!(summary.contains("1 position(s) could not be evaluated"));
    }

    #[test]
    fn test_best_move_is_not_repeated_for_best_play() {
        let summary = format_summary(&sample_analysis());
        assert!(!summary.contains("best e2e4"));
    }

    #[test]
    fn test_write_json_creates_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("review.json");

        write_json(&path, Some("Stockfish 17"), 15, &sample_analysis()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed["engine"], "Stockfish 17");
        assert_eq!(parsed["depth"], 15);
        assert_eq!(parsed["game_id"], "test-game");
        assert_eq!(parsed["white_player"], "Alice");
        assert_eq!(parsed["moves"].as_array().unwrap().len(), 2);
        assert_eq!(parsed["moves"][1]["quality"], "inaccuracy");
        assert_eq!(parsed["unevaluated_positions"], 1);
    }

    #[test]
    fn test_write_json_without_engine_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("review.json");

        write_json(&path, None, 10, &sample_analysis()).unwrap();

        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(parsed.get("engine").is_none());
    }
}
