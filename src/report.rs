//! Plain-text rendering of an aggregate summary for the `summary` command

use crate::aggregate::AggregateSummary;
use std::fmt::Write;

const BAR_WIDTH: usize = 40;

pub fn format_summary(summary: &AggregateSummary, top: usize, source: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} events from {}", summary.total(), source);

    let _ = writeln!(out, "\nTop locations");
    let rows = summary.top_locations(top);
    if rows.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    let name_width = rows.iter().map(|(name, _)| name.chars().count()).max().unwrap_or(0);
    for (rank, (name, count)) in rows.iter().enumerate() {
        let _ = writeln!(out, "  {:>2}. {:<name_width$}  {:>6}", rank + 1, name, count);
    }

    let _ = writeln!(out, "\nTraffic per hour (local time)");
    let max = summary.hour_histogram.iter().copied().max().unwrap_or(0);
    for (hour, &count) in summary.hour_histogram.iter().enumerate() {
        let len = if max == 0 { 0 } else { count * BAR_WIDTH / max };
        let _ = writeln!(out, "  {:02}:00 {:>6} {}", hour, count, "█".repeat(len));
    }

    if let Some((hour, count)) = summary.peak_hour() {
        let _ = writeln!(out, "\nPeak hour {hour:02}:00 with {count} events");
    }
    out
}
