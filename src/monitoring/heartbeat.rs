//! Alert digest built from a rendered text report.
//!
//! The heartbeat job only sees the text the `scan` command printed, so it
//! recovers opportunities by matching the report's line shapes.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;
use crate::config::AlertConfig;

static HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\. ([A-Z]+) - Edge: (-?[\d.]+)%$").unwrap());
static EVENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^Event: (.*)$").unwrap());
static TOTAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Total Probability: (-?[\d.]+)%$").unwrap());
static VOLUME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Combined Volume: \$([\d,.]+)$").unwrap());
static LEG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^- (.+): ([\d.]+)%$").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub struct ReportedOpportunity {
    pub rank: usize,
    pub kind: String,
    pub edge: f64,
    pub event: String,
    pub total_probability: f64,
    pub combined_volume: f64,
    /// (question, YES probability in percent)
    pub markets: Vec<(String, f64)>,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ReportParseError {
    #[error("line {0}: detail line before any opportunity header")]
    Orphan(usize),

    #[error("line {line}: bad number '{value}'")]
    BadNumber { line: usize, value: String },
}

fn number(line: usize, value: &str) -> Result<f64, ReportParseError> {
    value
        .replace(',', "")
        .parse::<f64>()
        .map_err(|_| ReportParseError::BadNumber {
            line,
            value: value.to_string(),
        })
}

/// Recover opportunities from `render_text` output. Lines that match no
/// known shape are ignored.
pub fn parse_report(text: &str) -> Result<Vec<ReportedOpportunity>, ReportParseError> {
    let mut parsed: Vec<ReportedOpportunity> = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();

        if let Some(caps) = HEADER.captures(line) {
            parsed.push(ReportedOpportunity {
                rank: caps[1].parse().map_err(|_| ReportParseError::BadNumber {
                    line: line_no,
                    value: caps[1].to_string(),
                })?,
                kind: caps[2].to_string(),
                edge: number(line_no, &caps[3])?,
                event: String::new(),
                total_probability: 0.0,
                combined_volume: 0.0,
                markets: Vec::new(),
            });
            continue;
        }

        let is_detail = EVENT.is_match(line)
            || TOTAL.is_match(line)
            || VOLUME.is_match(line)
            || LEG.is_match(line);
        if !is_detail {
            continue;
        }

        let current = parsed.last_mut().ok_or(ReportParseError::Orphan(line_no))?;

        if let Some(caps) = EVENT.captures(line) {
            current.event = caps[1].to_string();
        } else if let Some(caps) = TOTAL.captures(line) {
            current.total_probability = number(line_no, &caps[1])?;
        } else if let Some(caps) = VOLUME.captures(line) {
            current.combined_volume = number(line_no, &caps[1])?;
        } else if let Some(caps) = LEG.captures(line) {
            current
                .markets
                .push((caps[1].to_string(), number(line_no, &caps[2])?));
        }
    }

    Ok(parsed)
}

/// Opportunities worth alerting on, in report order.
pub fn select_alerts<'a>(
    reported: &'a [ReportedOpportunity],
    config: &AlertConfig,
) -> Vec<&'a ReportedOpportunity> {
    reported
        .iter()
        .filter(|o| o.edge >= config.min_edge && o.combined_volume >= config.min_volume)
        .take(config.max_alerts)
        .collect()
}

/// Plain-text digest, or `None` when nothing clears the thresholds.
pub fn format_alert(
    reported: &[ReportedOpportunity],
    config: &AlertConfig,
    now: DateTime<Utc>,
) -> Option<String> {
    let selected = select_alerts(reported, config);
    if selected.is_empty() {
        return None;
    }

    let mut lines = vec![format!(
        "[{}] {} alert(s) at {}",
        config.session_label,
        selected.len(),
        now.format("%Y-%m-%d %H:%M UTC")
    )];
    for opp in selected {
        lines.push(format!(
            "#{} {} {:.2}% edge (total {:.2}%, vol ${:.0}, {} markets): {}",
            opp.rank,
            opp.kind,
            opp.edge,
            opp.total_probability,
            opp.combined_volume,
            opp.markets.len(),
            opp.event
        ));
    }

    Some(lines.join("\n"))
}
