//! Plain-text rendering of optimization output. Pure string builders; the
//! binary decides where they go.

use std::fmt::Write;

use itertools::izip;

use crate::evolution::EvolutionResult;
use crate::portfolio::PortfolioSummary;

/// Ticker / weight / nominal-amount table for the winning allocation.
pub fn allocation_table(tickers: &[String], weights: &[f64], initial_investment: f64) -> String {
    let mut out = String::from("ticker      weight        amount\n");
    for (ticker, weight) in izip!(tickers, weights) {
        let _ = writeln!(
            out,
            "{ticker:<8} {:>7.2}% {:>14.2}",
            weight * 100.0,
            weight * initial_investment
        );
    }
    let _ = writeln!(out, "{:<8} {:>7.2}% {:>14.2}", "total", 100.0, initial_investment);
    out
}

/// Generation-indexed fitness history, one row per generation.
pub fn history_table(result: &EvolutionResult) -> String {
    let mut out = String::from("gen       best        avg\n");
    for (generation, (best, average)) in result
        .best_fitness_per_generation
        .iter()
        .zip(&result.average_fitness_per_generation)
        .enumerate()
    {
        let _ = writeln!(out, "{:>3} {:>10.4} {:>10.4}", generation + 1, best, average);
    }
    out
}

/// The recorded best weights of one generation (1-based index, matching the
/// history table). `None` when the index is out of range.
pub fn weights_of_generation(result: &EvolutionResult, generation: usize) -> Option<String> {
    if generation == 0 {
        return None;
    }
    let weights = result.best_weights_per_generation.get(generation - 1)?;
    let rendered: Vec<String> = weights.iter().map(|w| format!("{w:.4}")).collect();
    Some(format!("generation {generation}: [{}]", rendered.join(", ")))
}

/// One labelled summary block, mirroring the per-window validation output.
pub fn summary_block(label: &str, summary: &PortfolioSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {label} ===");
    let _ = writeln!(out, "mean return    : {:.4}", summary.mean_return);
    let _ = writeln!(out, "volatility     : {:.4}", summary.volatility);
    let _ = writeln!(out, "sharpe ratio   : {:.4}", summary.sharpe_ratio);
    let _ = writeln!(out, "total return   : {:.2}%", summary.total_return * 100.0);
    let _ = writeln!(
        out,
        "final value    : {:.2} (from {:.2})",
        summary.final_value, summary.initial_investment
    );
    out
}
