//! CoinGecko-compatible market-data client.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::config::MarketConfig;
use crate::domain::PricePoint;
use crate::http_client::{HttpAuth, HttpClient, HttpRequest, HttpResponse};
use crate::retry::RetryConfig;
use crate::SourceError;

pub const API_KEY_HEADER: &str = "x-cg-demo-api-key";

/// Largest page the markets endpoint serves.
const MAX_PER_PAGE: usize = 250;

/// Inclusive time window for a price-history query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryRange {
    pub from: OffsetDateTime,
    pub to: OffsetDateTime,
}

impl HistoryRange {
    /// The `days` days leading up to now.
    pub fn trailing_days(days: u32) -> Self {
        let to = OffsetDateTime::now_utc();
        Self {
            from: to - time::Duration::days(i64::from(days)),
            to,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MarketEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MarketChart {
    #[serde(default)]
    prices: Option<Vec<Value>>,
}

#[derive(Clone)]
pub struct MarketDataClient {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    auth: HttpAuth,
    vs_currency: String,
    timeout_ms: u64,
    retry: RetryConfig,
}

impl MarketDataClient {
    pub fn new(http_client: Arc<dyn HttpClient>, config: &MarketConfig) -> Self {
        let auth = match config.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => HttpAuth::Header {
                name: API_KEY_HEADER.to_owned(),
                value: key.to_owned(),
            },
            _ => HttpAuth::None,
        };
        Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            auth,
            vs_currency: config.vs_currency.clone(),
            timeout_ms: config.timeout_ms,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Ids of the `limit` largest assets by market cap, largest first.
    pub async fn top_assets(&self, limit: usize) -> Result<Vec<String>, SourceError> {
        if limit == 0 {
            return Err(SourceError::invalid_request("top-N limit must be at least 1"));
        }
        let url = format!(
            "{}/coins/markets?vs_currency={}&order=market_cap_desc&per_page={}&page=1",
            self.base_url,
            urlencoding::encode(&self.vs_currency),
            limit.min(MAX_PER_PAGE)
        );

        let response = self.get_with_retry(&url, "coins/markets").await?;
        let entries: Vec<MarketEntry> = serde_json::from_str(&response.body).map_err(|error| {
            SourceError::invalid_response(format!("coins/markets payload did not parse: {error}"))
        })?;

        let ids: Vec<String> = entries
            .into_iter()
            .map(|entry| entry.id)
            .take(limit)
            .collect();
        debug!(count = ids.len(), "fetched top assets");
        Ok(ids)
    }

    /// Price observations for `coin_id` within `range`.
    ///
    /// Malformed pairs are dropped with a warning rather than failing the call.
    pub async fn price_history(
        &self,
        coin_id: &str,
        range: HistoryRange,
    ) -> Result<Vec<PricePoint>, SourceError> {
        let url = format!(
            "{}/coins/{}/market_chart/range?vs_currency={}&from={}&to={}",
            self.base_url,
            urlencoding::encode(coin_id),
            urlencoding::encode(&self.vs_currency),
            range.from.unix_timestamp(),
            range.to.unix_timestamp()
        );

        let response = self.get_with_retry(&url, coin_id).await?;
        let chart: MarketChart = serde_json::from_str(&response.body).map_err(|error| {
            SourceError::invalid_response(format!("{coin_id}: market chart did not parse: {error}"))
        })?;
        let pairs = chart.prices.ok_or_else(|| {
            SourceError::invalid_response(format!("{coin_id}: market chart has no prices"))
        })?;

        Ok(parse_price_pairs(coin_id, &pairs))
    }

    async fn get_with_retry(&self, url: &str, context: &str) -> Result<HttpResponse, SourceError> {
        let mut attempt = 0;
        loop {
            let request = HttpRequest::get(url)
                .with_header("accept", "application/json")
                .with_auth(&self.auth)
                .with_timeout_ms(self.timeout_ms);

            let (last_error, reason) = match self.http_client.execute(request).await {
                Ok(response) if response.is_success() => return Ok(response),
                Ok(response) => {
                    if !self.retry.should_retry_status(response.status) {
                        return Err(SourceError::from_status(response.status, context));
                    }
                    (SourceError::from_status(response.status, context), response.status.to_string())
                }
                Err(error) => {
                    let source_error =
                        SourceError::unavailable(format!("{context}: {}", error.message()));
                    if !self.retry.should_retry_error(&error) {
                        return Err(source_error);
                    }
                    (source_error, error.message().to_owned())
                }
            };

            if attempt >= self.retry.max_retries {
                return Err(last_error);
            }

            let delay = self.retry.delay_for_attempt(attempt);
            warn!(
                %context,
                attempt = attempt + 1,
                max_retries = self.retry.max_retries,
                delay_ms = delay.as_millis() as u64,
                %reason,
                "retrying market-data request"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

fn parse_price_pairs(coin_id: &str, pairs: &[Value]) -> Vec<PricePoint> {
    let mut points = Vec::with_capacity(pairs.len());
    let mut skipped = 0usize;
    for pair in pairs {
        match parse_pair(coin_id, pair) {
            Some(point) => points.push(point),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!(coin = coin_id, skipped, "ignored malformed price pairs");
    }
    points
}

fn parse_pair(coin_id: &str, pair: &Value) -> Option<PricePoint> {
    let [timestamp, price] = pair.as_array()?.as_slice() else {
        return None;
    };
    let timestamp_ms = timestamp
        .as_i64()
        .or_else(|| timestamp.as_f64().filter(|ms| ms.is_finite()).map(|ms| ms as i64))?;
    PricePoint::from_pair(coin_id, timestamp_ms, price.as_f64()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn malformed_pairs_are_dropped() {
        let pairs = vec![
            json!([1_709_251_200_000_i64, 61_000.5]),
            json!([1_709_337_600_000_i64]),
            json!(["yesterday", 1.0]),
            json!([1_709_424_000_000.0, null]),
            json!({"ts": 1, "price": 2}),
            json!([1_709_424_000_000.0, 62_000]),
        ];

        let points = parse_price_pairs("bitcoin", &pairs);

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].timestamp_ms, 1_709_251_200_000);
        assert_eq!(points[1].price, 62_000.0);
        assert_eq!(points[1].to_record().price_date, "2024-03-03");
    }

    #[test]
    fn trailing_range_spans_requested_days() {
        let range = HistoryRange::trailing_days(365);
        assert_eq!((range.to - range.from).whole_days(), 365);
    }
}
