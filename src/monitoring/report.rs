use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::fmt::{self, Write as _};
use std::fs::OpenOptions;
use std::io::Write;
use crate::strategies::types::Opportunity;

pub const EMPTY_REPORT: &str = "No opportunities found.";

/// Render opportunities as text.
///
/// The heartbeat parser reads this back line by line, so the line shapes
/// (`N. TYPE - Edge: E%`, `Event:`, `Total Probability:`,
/// `Combined Volume: $V`, `- question: P%`) must not change.
pub fn render_text(opportunities: &[Opportunity]) -> String {
    if opportunities.is_empty() {
        return format!("{}\n", EMPTY_REPORT);
    }

    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_opportunities(&mut out, opportunities);
    out
}

fn write_opportunities(out: &mut String, opportunities: &[Opportunity]) -> fmt::Result {
    writeln!(out, "Found {} opportunities", opportunities.len())?;

    for (i, opp) in opportunities.iter().enumerate() {
        writeln!(out)?;
        write_opportunity(out, i + 1, opp)?;
    }

    Ok(())
}

fn write_opportunity(out: &mut String, rank: usize, opp: &Opportunity) -> fmt::Result {
    writeln!(out, "{}. {} - Edge: {:.2}%", rank, opp.kind, opp.edge)?;
    writeln!(out, "   Event: {}", opp.event)?;
    writeln!(out, "   Total Probability: {:.2}%", opp.total_probability)?;
    writeln!(out, "   Combined Volume: ${:.0}", opp.combined_volume)?;
    writeln!(out, "   Markets:")?;
    for leg in &opp.markets {
        writeln!(
            out,
            "   - {}: {:.2}%",
            leg.question,
            leg.yes_price * Decimal::ONE_HUNDRED
        )?;
    }
    Ok(())
}

pub fn render_json(opportunities: &[Opportunity]) -> Result<String> {
    serde_json::to_string_pretty(opportunities).context("Failed to serialize opportunities")
}

/// Write a rendered report, replacing any previous one.
pub fn write_report(path: &str, body: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .with_context(|| format!("Failed to open report file: {}", path))?;

    file.write_all(body.as_bytes())
        .with_context(|| format!("Failed to write report file: {}", path))?;

    Ok(())
}
