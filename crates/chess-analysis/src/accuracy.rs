//! Win probability and accuracy.
//!
//! Centipawn inputs are expected from one side's perspective and should
//! already be clamped; see [`Evaluation::clamped_centipawns`].
//!
//! [`Evaluation::clamped_centipawns`]: crate::Evaluation::clamped_centipawns

/// Winning chance in percent (0-100) for a centipawn score.
pub fn win_percent(cp: i32) -> f64 {
    let cp = f64::from(cp);
    50.0 + 50.0 * (2.0 / (1.0 + (-0.003_682_08 * cp).exp()) - 1.0)
}

/// Accuracy (0-100) of a move that moved the winning chance from
/// `win_before` to `win_after`.
pub fn move_accuracy(win_before: f64, win_after: f64) -> f64 {
    let drop = win_before - win_after;
    if drop <= 0.0 {
        return 100.0;
    }
    (103.1668 * (-0.04354 * drop).exp() - 3.1669).clamp(0.0, 100.0)
}

/// Accuracy of a move from the mover's best and played evaluations.
pub fn move_accuracy_cp(best_cp: i32, played_cp: i32) -> f64 {
    move_accuracy(win_percent(best_cp), win_percent(played_cp))
}

/// Mean of per-move accuracies; 100 when there are none.
pub fn side_accuracy(accuracies: &[f64]) -> f64 {
    if accuracies.is_empty() {
        return 100.0;
    }
    accuracies.iter().sum::<f64>() / accuracies.len() as f64
}
