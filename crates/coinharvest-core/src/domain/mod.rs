//! # Domain Models
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Asset`] | Canonical key plus the slug used on the scraped site |
//! | [`AssetCatalog`] | Ordered key → slug mapping, defaulting to the top-20 universe |
//! | [`ScrapeOutcome`] | Extracted description/category/price text for one asset |
//! | [`PricePoint`] | One `(timestamp, price)` observation with its UTC date |

mod asset;
mod outcome;

pub use asset::{Asset, AssetCatalog};
pub use outcome::{PricePoint, ScrapeOutcome, SENTINEL};
