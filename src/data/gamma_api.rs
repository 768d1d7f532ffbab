use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};
use crate::config::GammaConfig;
use crate::data::types::Market;

pub struct GammaApiClient {
    client: Client,
    base_url: String,
    page_size: usize,
    max_pages: usize,
    max_retries: u32,
    retry_backoff: Duration,
}

/// Listing row as returned by `/markets`. Only the fields the scan needs.
///
/// `outcomePrices` usually arrives as a JSON-encoded string but is sometimes
/// a plain array, and `volume24hr` is sometimes a numeric string, so both
/// stay loosely typed until conversion.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GammaMarket {
    #[serde(default)]
    question: Option<String>,
    #[serde(default)]
    outcome_prices: Option<Value>,
    #[serde(default)]
    volume24hr: Option<Value>,
    #[serde(default)]
    slug: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("page ceiling hit: {fetched} markets over {max_pages} full pages, listing not exhausted")]
    PageCeiling { max_pages: usize, fetched: usize },

    #[error("page at offset {offset} failed after {attempts} attempts: {source}")]
    Request {
        offset: usize,
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },
}

impl GammaApiClient {
    pub fn new(config: &GammaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            page_size: config.page_size.max(1),
            max_pages: config.max_pages,
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        })
    }

    /// Fetch every active, open market from the paginated listing.
    pub async fn fetch_active_markets(&self) -> Result<Vec<Market>> {
        let rows = paginate(self.page_size, self.max_pages, |offset| {
            self.fetch_page_with_retry(offset)
        })
        .await?;

        let total = rows.len();
        let markets = parse_rows(rows);

        info!(
            "Fetched {} listing rows, {} usable markets",
            total,
            markets.len()
        );

        Ok(markets)
    }

    async fn fetch_page_with_retry(&self, offset: usize) -> Result<Vec<Value>, FetchError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.fetch_page(offset).await {
                Ok(page) => return Ok(page),
                Err(e) if attempt <= self.max_retries => {
                    warn!(
                        "Page at offset {} failed (attempt {}): {:#}, retrying",
                        offset, attempt, e
                    );
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                Err(e) => {
                    return Err(FetchError::Request {
                        offset,
                        attempts: attempt,
                        source: e,
                    })
                }
            }
        }
    }

    async fn fetch_page(&self, offset: usize) -> Result<Vec<Value>> {
        let url = format!("{}/markets", self.base_url);
        debug!("GET {} offset={} limit={}", url, offset, self.page_size);

        let page = self
            .client
            .get(&url)
            .query(&[
                ("active", "true".to_string()),
                ("closed", "false".to_string()),
                ("limit", self.page_size.to_string()),
                ("offset", offset.to_string()),
            ])
            .send()
            .await
            .context("Failed to fetch markets")?
            .error_for_status()
            .context("Markets endpoint returned an error status")?
            .json()
            .await
            .context("Failed to parse markets response")?;

        Ok(page)
    }
}

/// Walk an offset-paginated listing until a short page arrives.
///
/// Fails with [`FetchError::PageCeiling`] if `max_pages` full pages were
/// read without reaching the end.
pub async fn paginate<T, F, Fut>(
    page_size: usize,
    max_pages: usize,
    mut fetch: F,
) -> Result<Vec<T>, FetchError>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<Vec<T>, FetchError>>,
{
    let mut rows = Vec::new();

    for page_index in 0..max_pages {
        let page = fetch(page_index * page_size).await?;
        let short_page = page.len() < page_size;
        rows.extend(page);

        if short_page {
            debug!("Listing exhausted after {} pages", page_index + 1);
            return Ok(rows);
        }
    }

    Err(FetchError::PageCeiling {
        max_pages,
        fetched: rows.len(),
    })
}

/// Decode raw listing rows one at a time. A row that does not fit
/// [`GammaMarket`] is dropped without affecting its neighbours.
fn parse_rows(rows: Vec<Value>) -> Vec<Market> {
    rows.into_iter()
        .enumerate()
        .filter_map(|(i, row)| match serde_json::from_value::<GammaMarket>(row) {
            Ok(gm) => convert_gamma_market(gm),
            Err(e) => {
                debug!("Skipping listing row {}: {}", i, e);
                None
            }
        })
        .collect()
}

/// Convert a listing row into our Market type. Rows missing a question or
/// a price field are dropped; price validity is checked later by the scan.
fn convert_gamma_market(gm: GammaMarket) -> Option<Market> {
    let question = gm.question.filter(|q| !q.trim().is_empty())?;
    let outcome_prices = match gm.outcome_prices? {
        Value::String(s) => s,
        array @ Value::Array(_) => array.to_string(),
        _ => return None,
    };

    Some(Market {
        question,
        outcome_prices,
        volume_24hr: gm.volume24hr.as_ref().map(volume_from_value).unwrap_or(0.0),
        slug: gm.slug.unwrap_or_default(),
    })
}

/// Volume as a non-negative finite number; anything else counts as zero.
fn volume_from_value(value: &Value) -> f64 {
    let volume = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    volume.filter(|v| v.is_finite() && *v >= 0.0).unwrap_or(0.0)
}

/// Load listing rows saved to disk (same shape as the `/markets` response).
pub fn markets_from_json(body: &str) -> Result<Vec<Market>> {
    let rows: Vec<Value> =
        serde_json::from_str(body).context("Failed to parse market listing JSON")?;
    Ok(parse_rows(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: String, page_size: usize, max_pages: usize) -> GammaConfig {
        GammaConfig {
            base_url,
            page_size,
            max_pages,
            max_retries: 1,
            retry_backoff_ms: 1,
            request_timeout_secs: 5,
        }
    }

    fn rows(offset: usize, count: usize) -> serde_json::Value {
        let rows: Vec<serde_json::Value> = (offset..offset + count)
            .map(|i| {
                serde_json::json!({
                    "question": format!("Will market {} resolve YES?", i),
                    "outcomePrices": "[\"0.5\", \"0.5\"]",
                    "volume24hr": 100.0,
                    "slug": format!("market-{}", i),
                })
            })
            .collect();
        serde_json::Value::Array(rows)
    }

    #[tokio::test]
    async fn test_paginate_stops_on_short_page() {
        let mut offsets = Vec::new();
        let result = paginate(2, 10, |offset| {
            offsets.push(offset);
            let page: Vec<usize> = match offset {
                0 => vec![1, 2],
                2 => vec![3, 4],
                _ => vec![5],
            };
            async move { Ok::<_, FetchError>(page) }
        })
        .await
        .unwrap();

        assert_eq!(result, vec![1, 2, 3, 4, 5]);
        assert_eq!(offsets, vec![0, 2, 4]);
    }

    #[tokio::test]
    async fn test_paginate_empty_listing() {
        let result = paginate(5, 3, |_| async { Ok::<Vec<u8>, FetchError>(Vec::new()) })
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_paginate_page_ceiling() {
        let result = paginate(2, 3, |_| async { Ok::<_, FetchError>(vec![0u8, 0u8]) }).await;
        match result {
            Err(FetchError::PageCeiling { max_pages, fetched }) => {
                assert_eq!(max_pages, 3);
                assert_eq!(fetched, 6);
            }
            other => panic!("expected page ceiling, got {:?}", other.map(|r| r.len())),
        }
    }

    #[test]
    fn test_convert_drops_incomplete_rows() {
        let body = r#"[
            {"question": "Will A win?", "outcomePrices": "[\"0.4\", \"0.6\"]", "volume24hr": 10.5, "slug": "a"},
            {"question": "Will B win?", "slug": "b"},
            {"outcomePrices": "[\"0.4\", \"0.6\"]", "slug": "c"},
            {"question": "Will D win?", "outcomePrices": "oops", "slug": "d"}
        ]"#;
        let markets = markets_from_json(body).unwrap();

        let slugs: Vec<&str> = markets.iter().map(|m| m.slug.as_str()).collect();
        assert_eq!(slugs, ["a", "d"]);
        assert!((markets[0].volume_24hr - 10.5).abs() < 1e-9);
        assert!(markets[1].yes_price().is_err());
    }

    #[test]
    fn test_row_shape_variants_are_tolerated() {
        let body = r#"[
            {"question": "Will A win?", "outcomePrices": "[\"0.4\", \"0.6\"]", "volume24hr": 10, "slug": "a"},
            {"question": "Will B win?", "outcomePrices": ["0.3", "0.7"], "slug": "b"},
            {"question": "Will C win?", "outcomePrices": [0.2, 0.8], "volume24hr": "12", "slug": "c"},
            {"question": "Will D win?", "outcomePrices": "[\"0.1\", \"0.9\"]", "volume24hr": "lots", "slug": "d"}
        ]"#;
        let markets = markets_from_json(body).unwrap();

        let slugs: Vec<&str> = markets.iter().map(|m| m.slug.as_str()).collect();
        assert_eq!(slugs, ["a", "b", "c", "d"]);
        assert_eq!(markets[1].yes_price().unwrap(), rust_decimal_macros::dec!(0.3));
        assert_eq!(markets[2].yes_price().unwrap(), rust_decimal_macros::dec!(0.2));
        assert!((markets[2].volume_24hr - 12.0).abs() < 1e-9);
        assert_eq!(markets[3].volume_24hr, 0.0);
    }

    #[test]
    fn test_undecodable_row_does_not_sink_neighbours() {
        let body = r#"[
            {"question": "Will A win?", "outcomePrices": "[\"0.4\", \"0.6\"]", "slug": "a"},
            {"question": 42, "outcomePrices": "[\"0.4\", \"0.6\"]", "slug": "b"},
            {"question": "Will C win?", "outcomePrices": {"yes": 0.4}, "slug": "c"},
            "not a row",
            {"question": "Will E win?", "outcomePrices": "[\"0.5\", \"0.5\"]", "slug": ["e"]},
            {"question": "Will F win?", "outcomePrices": "[\"0.5\", \"0.5\"]", "slug": "f"}
        ]"#;
        let markets = markets_from_json(body).unwrap();

        let slugs: Vec<&str> = markets.iter().map(|m| m.slug.as_str()).collect();
        assert_eq!(slugs, ["a", "f"]);
    }

    #[test]
    fn test_listing_must_be_an_array() {
        assert!(markets_from_json(r#"{"question": "Will A win?"}"#).is_err());
    }

    #[tokio::test]
    async fn test_fetch_page_with_mixed_rows() {
        let mock_server = MockServer::start().await;

        let page = serde_json::json!([
            {"question": "Will A win?", "outcomePrices": ["0.4", "0.6"], "volume24hr": "12", "slug": "a"},
            {"question": null, "outcomePrices": "[\"0.4\", \"0.6\"]", "slug": "b"},
            {"question": "Will C win?", "outcomePrices": "[\"0.5\", \"0.5\"]", "volume24hr": true, "slug": "c"}
        ]);
        Mock::given(method("GET"))
            .and(path("/markets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page))
            .expect(1)
            .mount(&mock_server)
            .await;

        // Three raw rows on a page of five is a short page even though only
        // two of them survive decoding.
        let client = GammaApiClient::new(&test_config(mock_server.uri(), 5, 3)).unwrap();
        let markets = client.fetch_active_markets().await.unwrap();

        let slugs: Vec<&str> = markets.iter().map(|m| m.slug.as_str()).collect();
        assert_eq!(slugs, ["a", "c"]);
        assert!((markets[0].volume_24hr - 12.0).abs() < 1e-9);
        assert_eq!(markets[1].volume_24hr, 0.0);
    }

    #[tokio::test]
    async fn test_fetch_active_markets_paginates() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/markets"))
            .and(query_param("offset", "0"))
            .and(query_param("limit", "3"))
            .and(query_param("active", "true"))
            .and(query_param("closed", "false"))
            .respond_with(ResponseTemplate::new(200).set_body_json(rows(0, 3)))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/markets"))
            .and(query_param("offset", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(rows(3, 1)))
            .mount(&mock_server)
            .await;

        let client = GammaApiClient::new(&test_config(mock_server.uri(), 3, 10)).unwrap();
        let markets = client.fetch_active_markets().await.unwrap();

        assert_eq!(markets.len(), 4);
        assert_eq!(markets[3].slug, "market-3");
    }

    #[tokio::test]
    async fn test_fetch_active_markets_hits_ceiling() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/markets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(rows(0, 2)))
            .mount(&mock_server)
            .await;

        let client = GammaApiClient::new(&test_config(mock_server.uri(), 2, 2)).unwrap();
        let err = client.fetch_active_markets().await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<FetchError>(),
            Some(FetchError::PageCeiling { max_pages: 2, fetched: 4 })
        ));
    }

    #[tokio::test]
    async fn test_fetch_gives_up_after_retries() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/markets"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&mock_server)
            .await;

        let client = GammaApiClient::new(&test_config(mock_server.uri(), 2, 2)).unwrap();
        let err = client.fetch_active_markets().await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<FetchError>(),
            Some(FetchError::Request { offset: 0, attempts: 2, .. })
        ));
    }
}
