use std::collections::HashMap;
use crate::data::types::Market;
use crate::grouping::normalizer::normalize;

/// Question fragments whose "outcomes" are not mutually exclusive
/// (several acts can all perform).
pub const EXCLUDED_TERMS: &[&str] = &[
    "performer",
    "halftime show",
    "headline",
    "lineup",
    "opening act",
    "surprise guest",
];

/// Markets sharing one event key, in first-seen order.
#[derive(Debug, Clone)]
pub struct MarketGroup<'a> {
    pub key: String,
    pub markets: Vec<&'a Market>,
}

/// Check if a question falls in a known-noisy category
pub fn should_exclude(question: &str) -> bool {
    let question_lower = question.to_lowercase();
    EXCLUDED_TERMS.iter().any(|term| question_lower.contains(term))
}

/// Drop denylisted markets; the survivors feed both detection strategies.
pub fn filter_markets(markets: &[Market]) -> Vec<&Market> {
    markets
        .iter()
        .filter(|m| !should_exclude(&m.question))
        .collect()
}

/// Partition markets by event key.
///
/// Keys keep the order in which they were first seen, and so do the
/// markets inside each group.
pub fn group_markets<'a>(markets: &[&'a Market]) -> Vec<MarketGroup<'a>> {
    let mut groups: Vec<MarketGroup<'a>> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for &market in markets {
        let key = normalize(&market.question);
        match index.get(&key) {
            Some(&i) => groups[i].markets.push(market),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(MarketGroup {
                    key,
                    markets: vec![market],
                });
            }
        }
    }

    groups
}
