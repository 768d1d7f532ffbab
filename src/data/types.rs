use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

/// One row of a market listing snapshot.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Market {
    pub question: String,
    /// Raw `[YES, NO]` price pair exactly as the listing returns it.
    pub outcome_prices: String,
    #[serde(default, rename = "volume24hr")]
    pub volume_24hr: f64,
    #[serde(default)]
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PriceError {
    #[error("missing outcome prices")]
    Missing,

    #[error("unparseable outcome prices: {0}")]
    Unparseable(String),

    #[error("expected 2 outcome prices, got {0}")]
    WrongArity(usize),

    #[error("outcome price out of range: {0}")]
    OutOfRange(String),
}

impl Market {
    #[cfg(test)]
    pub fn new(question: &str, yes: &str, no: &str, volume_24hr: f64, slug: &str) -> Self {
        Self {
            question: question.to_string(),
            outcome_prices: format!("[\"{}\", \"{}\"]", yes, no),
            volume_24hr,
            slug: slug.to_string(),
        }
    }

    /// Parse the `[YES, NO]` pair.
    ///
    /// Accepts a JSON array of decimal strings (the listing's usual shape)
    /// or a JSON array of numbers. Both values must lie in [0, 1].
    pub fn parse_outcome_prices(&self) -> Result<(Decimal, Decimal), PriceError> {
        let raw = self.outcome_prices.trim();
        if raw.is_empty() {
            return Err(PriceError::Missing);
        }

        let values: Vec<serde_json::Value> = serde_json::from_str(raw)
            .map_err(|_| PriceError::Unparseable(raw.to_string()))?;

        if values.len() != 2 {
            return Err(PriceError::WrongArity(values.len()));
        }

        let yes = parse_price(&values[0])?;
        let no = parse_price(&values[1])?;
        Ok((yes, no))
    }

    pub fn yes_price(&self) -> Result<Decimal, PriceError> {
        self.parse_outcome_prices().map(|(yes, _)| yes)
    }
}

fn parse_price(value: &serde_json::Value) -> Result<Decimal, PriceError> {
    let text = match value {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        other => return Err(PriceError::Unparseable(other.to_string())),
    };

    let price = Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| PriceError::Unparseable(text.clone()))?;

    if price < Decimal::ZERO || price > Decimal::ONE {
        return Err(PriceError::OutOfRange(text));
    }

    Ok(price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn with_prices(raw: &str) -> Market {
        Market {
            question: "Will it rain?".to_string(),
            outcome_prices: raw.to_string(),
            volume_24hr: 0.0,
            slug: "rain".to_string(),
        }
    }

    #[test]
    fn test_parse_string_prices() {
        let market = with_prices("[\"0.35\", \"0.65\"]");
        assert_eq!(market.parse_outcome_prices(), Ok((dec!(0.35), dec!(0.65))));
        assert_eq!(market.yes_price(), Ok(dec!(0.35)));
    }

    #[test]
    fn test_parse_numeric_prices() {
        let market = with_prices("[0.4, 0.6]");
        assert_eq!(market.parse_outcome_prices(), Ok((dec!(0.4), dec!(0.6))));
    }

    #[test]
    fn test_malformed_prices() {
        assert_eq!(with_prices("").parse_outcome_prices(), Err(PriceError::Missing));
        assert!(matches!(
            with_prices("not json").parse_outcome_prices(),
            Err(PriceError::Unparseable(_))
        ));
        assert!(matches!(
            with_prices("[\"abc\", \"0.5\"]").parse_outcome_prices(),
            Err(PriceError::Unparseable(_))
        ));
        assert_eq!(
            with_prices("[\"0.2\", \"0.3\", \"0.5\"]").parse_outcome_prices(),
            Err(PriceError::WrongArity(3))
        );
        assert!(matches!(
            with_prices("[\"1.5\", \"-0.5\"]").parse_outcome_prices(),
            Err(PriceError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_deserialize_listing_row() {
        let json = r#"{
            "question": "Will BTC hit $150k?",
            "outcomePrices": "[\"0.12\", \"0.88\"]",
            "volume24hr": 15234.5,
            "slug": "btc-150k"
        }"#;
        let market: Market = serde_json::from_str(json).unwrap();
        assert_eq!(market.slug, "btc-150k");
        assert!((market.volume_24hr - 15234.5).abs() < 1e-9);
        assert_eq!(market.yes_price(), Ok(dec!(0.12)));
    }

    #[test]
    fn test_missing_volume_defaults_to_zero() {
        let json = r#"{"question": "Q?", "outcomePrices": "[\"0.5\", \"0.5\"]"}"#;
        let market: Market = serde_json::from_str(json).unwrap();
        assert_eq!(market.volume_24hr, 0.0);
        assert_eq!(market.slug, "");
    }
}
