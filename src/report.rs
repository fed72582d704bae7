//! Human-readable evolution report (§6 output (b)): a compact per-generation summary
//! suitable for a CLI operator or a log line.

use std::fmt::Write as _;

use crate::evolution::history::GenerationStats;

pub fn format_generation_report(population_name: &str, stats: &GenerationStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "population: {}", population_name);
    let _ = writeln!(out, "generation: {}", stats.generation);
    let _ = writeln!(out, "population size: {}", stats.population_size);
    let _ = writeln!(out, "best fitness: {:.4}", stats.best_fitness);
    let _ = writeln!(out, "mean fitness: {:.4}", stats.mean_fitness);
    let _ = writeln!(out, "diversity: {:.2}%", stats.diversity * 100.0);

    if let Some(metrics) = &stats.best_metrics {
        let _ = writeln!(out, "best chromosome metrics:");
        let _ = writeln!(out, "  total return: {:.2}%", metrics.total_return * 100.0);
        let _ = writeln!(out, "  win rate: {:.2}%", metrics.win_rate * 100.0);
        let _ = writeln!(out, "  sharpe ratio: {:.3}", metrics.sharpe_ratio);
        let _ = writeln!(out, "  max drawdown: {:.2}%", metrics.max_drawdown * 100.0);
        let _ = writeln!(out, "  profit factor: {:.3}", metrics.profit_factor);
        let _ = writeln!(out, "  trades: {}", metrics.trade_count);
    } else {
        let _ = writeln!(out, "best chromosome metrics: unavailable (not yet evaluated this run)");
    }

    out
}
