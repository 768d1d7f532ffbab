use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{debug, info};
use crate::data::types::Market;
use crate::grouping::grouper::{filter_markets, group_markets, MarketGroup};
use crate::strategies::types::{MarketLeg, Opportunity, OpportunityKind};

/// Sums inside [98, 102] are treated as consistent (bid/ask noise).
const UNDERBOOK_BELOW: Decimal = dec!(98);
const OVERBOOK_ABOVE: Decimal = dec!(102);

/// Minimum token overlap for two questions to count as negations.
const INVERSE_SIMILARITY: f64 = 0.5;

// "no" only counts when another word follows it, so "yes or no?" stays positive.
static NEGATIVE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:not|won't|won’t|doesn't|doesn’t|less than|under)\b|\bno\s").unwrap()
});

/// Run both detection strategies over a listing snapshot.
///
/// Denylisted markets are dropped first. Grouped-outcome and pairwise
/// contradiction results are merged and sorted by descending edge; the
/// sort is stable so identical input always yields identical output.
pub fn scan(markets: &[Market]) -> Vec<Opportunity> {
    let filtered = filter_markets(markets);
    let groups = group_markets(&filtered);

    let mut opportunities: Vec<Opportunity> = groups
        .iter()
        .filter(|g| g.markets.len() >= 2)
        .filter_map(check_group)
        .collect();
    let grouped_count = opportunities.len();

    opportunities.extend(find_contradictions(&filtered));

    opportunities.sort_by(|a, b| b.edge.cmp(&a.edge));

    info!(
        "Scanned {} markets ({} excluded): {} groups, {} grouped opportunities, {} contradictions",
        markets.len(),
        markets.len() - filtered.len(),
        groups.len(),
        grouped_count,
        opportunities.len() - grouped_count
    );

    opportunities
}

/// Grouped-outcome sum check for one event-key group.
pub fn check_group(group: &MarketGroup<'_>) -> Option<Opportunity> {
    let mut legs = Vec::with_capacity(group.markets.len());
    let mut combined_volume = 0.0;
    for market in &group.markets {
        if let Some(leg) = priced_leg(market) {
            combined_volume += market.volume_24hr;
            legs.push(leg);
        }
    }
    if legs.len() < 2 {
        return None;
    }

    let Some(total) = total_percent(&legs) else {
        debug!("Skipping group '{}': probability sum overflowed", group.key);
        return None;
    };

    let (kind, edge) = if total < UNDERBOOK_BELOW {
        (OpportunityKind::Underbook, Decimal::ONE_HUNDRED - total)
    } else if total > OVERBOOK_ABOVE {
        (OpportunityKind::Overbook, total - Decimal::ONE_HUNDRED)
    } else {
        return None;
    };

    // Degenerate keys still group; name the event after its first member.
    let event = if group.key.is_empty() {
        legs[0].question.clone()
    } else {
        group.key.clone()
    };

    Some(Opportunity {
        kind,
        event,
        markets: legs,
        total_probability: total,
        edge,
        combined_volume,
    })
}

/// What the inverse check needs from one question, computed once per market.
pub struct QuestionProfile {
    negated: bool,
    tokens: HashSet<String>,
}

impl QuestionProfile {
    pub fn new(question: &str) -> Self {
        Self {
            negated: has_negative_marker(question),
            tokens: tokenize(question),
        }
    }
}

/// Pairwise inverse-question check over the filtered set.
pub fn find_contradictions(markets: &[&Market]) -> Vec<Opportunity> {
    let profiles: Vec<QuestionProfile> = markets
        .iter()
        .map(|m| QuestionProfile::new(&m.question))
        .collect();

    let mut found = Vec::new();
    for i in 0..markets.len() {
        for j in i + 1..markets.len() {
            if !are_inverse(&profiles[i], &profiles[j]) {
                continue;
            }
            if let Some(opportunity) = check_pair(markets[i], markets[j]) {
                found.push(opportunity);
            }
        }
    }
    found
}

/// Exactly one of the two questions carries a negative marker and their
/// token sets overlap by more than half.
pub fn are_inverse(q1: &QuestionProfile, q2: &QuestionProfile) -> bool {
    q1.negated != q2.negated && jaccard_similarity(&q1.tokens, &q2.tokens) > INVERSE_SIMILARITY
}

fn check_pair(m1: &Market, m2: &Market) -> Option<Opportunity> {
    let legs = vec![priced_leg(m1)?, priced_leg(m2)?];

    let Some(total) = total_percent(&legs) else {
        debug!("Skipping pair {} / {}: probability sum overflowed", m1.slug, m2.slug);
        return None;
    };

    // Only the under-100 direction is reported for inverse pairs.
    if total >= UNDERBOOK_BELOW {
        return None;
    }

    Some(Opportunity {
        kind: OpportunityKind::Contradiction,
        event: format!("{} | {}", m1.question, m2.question),
        markets: legs,
        total_probability: total,
        edge: Decimal::ONE_HUNDRED - total,
        combined_volume: m1.volume_24hr + m2.volume_24hr,
    })
}

fn priced_leg(market: &Market) -> Option<MarketLeg> {
    match market.yes_price() {
        Ok(yes_price) => Some(MarketLeg {
            question: market.question.clone(),
            yes_price,
            slug: market.slug.clone(),
        }),
        Err(e) => {
            debug!("Skipping market '{}': {}", market.slug, e);
            None
        }
    }
}

/// Sum of YES prices in percent, `None` on overflow.
fn total_percent(legs: &[MarketLeg]) -> Option<Decimal> {
    legs.iter()
        .try_fold(Decimal::ZERO, |acc, leg| acc.checked_add(leg.yes_price))?
        .checked_mul(Decimal::ONE_HUNDRED)
}

fn has_negative_marker(question: &str) -> bool {
    NEGATIVE_MARKER.is_match(question)
}

fn tokenize(question: &str) -> HashSet<String> {
    question
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn jaccard_similarity(left: &HashSet<String>, right: &HashSet<String>) -> f64 {
    let union = left.union(right).count();
    if union == 0 {
        return 0.0;
    }
    left.intersection(right).count() as f64 / union as f64
}
