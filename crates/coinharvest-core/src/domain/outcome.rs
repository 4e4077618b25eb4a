use coinharvest_warehouse::{MetadataRecord, PricePointRecord};
use serde::Serialize;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::price::normalize_price;

/// Marker for a field that could not be resolved. Distinct from an empty value.
pub const SENTINEL: &str = "N/A";

/// Result of scraping one asset page. Every field holds a real value or [`SENTINEL`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrapeOutcome {
    pub coin: String,
    pub description: String,
    pub category: String,
    pub price_text: String,
}

impl ScrapeOutcome {
    /// The all-sentinel outcome recorded when an asset page is unavailable.
    pub fn unavailable(coin: impl Into<String>) -> Self {
        Self {
            coin: coin.into(),
            description: SENTINEL.to_owned(),
            category: SENTINEL.to_owned(),
            price_text: SENTINEL.to_owned(),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        self.description == SENTINEL && self.category == SENTINEL && self.price_text == SENTINEL
    }

    /// Numeric price, or `None` when the text does not normalize.
    pub fn price(&self) -> Option<f64> {
        normalize_price(&self.price_text)
    }

    pub fn to_record(&self) -> MetadataRecord {
        MetadataRecord {
            coin: self.coin.clone(),
            description: self.description.clone(),
            category: self.category.clone(),
            price: self.price(),
        }
    }
}

/// One observation of an asset's price at a source timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricePoint {
    pub coin: String,
    pub timestamp_ms: i64,
    pub price: f64,
    pub price_date: Date,
}

impl PricePoint {
    /// Build a point from a raw `(timestamp_ms, price)` pair.
    ///
    /// Returns `None` for non-finite prices and for timestamps outside the
    /// representable calendar.
    pub fn from_pair(coin: &str, timestamp_ms: i64, price: f64) -> Option<Self> {
        if !price.is_finite() {
            return None;
        }
        let instant =
            OffsetDateTime::from_unix_timestamp_nanos(i128::from(timestamp_ms) * 1_000_000).ok()?;
        Some(Self {
            coin: coin.to_owned(),
            timestamp_ms,
            price,
            price_date: instant.date(),
        })
    }

    pub fn to_record(&self) -> PricePointRecord {
        PricePointRecord {
            timestamp_ms: self.timestamp_ms,
            price: self.price,
            price_date: format_date(self.price_date),
        }
    }
}

fn format_date(date: Date) -> String {
    date.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| date.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_outcome_is_all_sentinel() {
        let outcome = ScrapeOutcome::unavailable("tron");

        assert!(outcome.is_unavailable());
        assert_eq!(outcome.price(), None);
        assert_eq!(outcome.to_record().description, SENTINEL);
    }

    #[test]
    fn price_date_is_utc_calendar_day_of_timestamp() {
        // 2024-03-01T23:59:59.999Z and the following millisecond
        let late = PricePoint::from_pair("bitcoin", 1_709_337_599_999, 61_000.0).expect("point");
        let next = PricePoint::from_pair("bitcoin", 1_709_337_600_000, 61_100.0).expect("point");

        assert_eq!(late.to_record().price_date, "2024-03-01");
        assert_eq!(next.to_record().price_date, "2024-03-02");
    }

    #[test]
    fn non_finite_prices_are_not_points() {
        assert!(PricePoint::from_pair("bitcoin", 0, f64::NAN).is_none());
        assert!(PricePoint::from_pair("bitcoin", 0, f64::INFINITY).is_none());
    }
}
