use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OpportunityKind {
    Underbook,
    Overbook,
    Contradiction,
}

impl fmt::Display for OpportunityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpportunityKind::Underbook => write!(f, "UNDERBOOK"),
            OpportunityKind::Overbook => write!(f, "OVERBOOK"),
            OpportunityKind::Contradiction => write!(f, "CONTRADICTION"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketLeg {
    pub question: String,
    /// YES price in [0, 1].
    pub yes_price: Decimal,
    pub slug: String,
}

/// An inconsistency found in one scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Opportunity {
    #[serde(rename = "type")]
    pub kind: OpportunityKind,
    pub event: String,
    pub markets: Vec<MarketLeg>,
    /// Sum of YES prices, in percent.
    pub total_probability: Decimal,
    /// |100 - total_probability|, in percentage points.
    pub edge: Decimal,
    pub combined_volume: f64,
}
