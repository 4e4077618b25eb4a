use std::collections::HashSet;
use std::fmt::{Display, Formatter};

use serde::Serialize;
use tracing::warn;

use crate::ValidationError;

/// Canonical key → page slug pairs for the default top-20 universe.
const DEFAULT_COINS: [(&str, &str); 20] = [
    ("bitcoin", "bitcoin"),
    ("ethereum", "ethereum"),
    ("tether", "tether"),
    ("ripple", "xrp"),
    ("binancecoin", "bnb"),
    ("solana", "solana"),
    ("usd-coin", "usd-coin"),
    ("dogecoin", "dogecoin"),
    ("tron", "tron"),
    ("cardano", "cardano"),
    ("staked-ether", "lido-dao"),
    ("wrapped-bitcoin", "wrapped-bitcoin"),
    ("hyperliquid", "hyperliquid"),
    ("sui", "sui"),
    ("wrapped-steth", "axelar-wrapped-wsteth"),
    ("chainlink", "chainlink"),
    ("avalanche-2", "avalanche"),
    ("leo-token", "unus-sed-leo"),
    ("bitcoin-cash", "bitcoin-cash"),
    ("stellar", "stellar"),
];

/// A tradable unit, known internally by its canonical key and on the
/// scraped site by its source slug.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Asset {
    canonical_key: String,
    source_slug: String,
}

impl Asset {
    pub fn new(canonical_key: &str, source_slug: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            canonical_key: validate_key("canonical key", canonical_key)?,
            source_slug: validate_key("source slug", source_slug)?,
        })
    }

    /// An asset whose slug on the scraped site equals its canonical key.
    pub fn same_slug(key: &str) -> Result<Self, ValidationError> {
        Self::new(key, key)
    }

    pub fn canonical_key(&self) -> &str {
        &self.canonical_key
    }

    pub fn source_slug(&self) -> &str {
        &self.source_slug
    }
}

impl Display for Asset {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.canonical_key == self.source_slug {
            f.write_str(&self.canonical_key)
        } else {
            write!(f, "{} ({})", self.canonical_key, self.source_slug)
        }
    }
}

fn validate_key(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyAssetKey { field });
    }

    let valid = trimmed
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-');
    if !valid {
        return Err(ValidationError::InvalidAssetKey {
            field,
            value: trimmed.to_owned(),
        });
    }

    Ok(trimmed.to_owned())
}

/// Ordered, duplicate-free mapping from canonical keys to source slugs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetCatalog {
    assets: Vec<Asset>,
}

impl Default for AssetCatalog {
    fn default() -> Self {
        Self {
            assets: DEFAULT_COINS
                .iter()
                .filter_map(|(key, slug)| Asset::new(key, slug).ok())
                .collect(),
        }
    }
}

impl AssetCatalog {
    pub fn from_assets(assets: Vec<Asset>) -> Result<Self, ValidationError> {
        let mut keys = HashSet::with_capacity(assets.len());
        let mut slugs = HashSet::with_capacity(assets.len());
        for asset in &assets {
            if !keys.insert(asset.canonical_key()) {
                return Err(ValidationError::DuplicateAsset {
                    key: asset.canonical_key().to_owned(),
                });
            }
            if !slugs.insert(asset.source_slug()) {
                return Err(ValidationError::DuplicateSlug {
                    slug: asset.source_slug().to_owned(),
                });
            }
        }
        Ok(Self { assets })
    }

    pub fn from_pairs<'a>(
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, ValidationError> {
        let assets = pairs
            .into_iter()
            .map(|(key, slug)| Asset::new(key, slug))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_assets(assets)
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn get(&self, canonical_key: &str) -> Option<&Asset> {
        self.assets
            .iter()
            .find(|asset| asset.canonical_key() == canonical_key.trim())
    }

    /// Map market-data ids to assets, keeping their order.
    ///
    /// Ids missing from the catalog are assumed to share their slug. Ids that
    /// are not valid keys, or that land on a slug already taken, are skipped
    /// with a warning.
    pub fn resolve(&self, ids: &[String]) -> Vec<Asset> {
        let mut resolved = Vec::with_capacity(ids.len());
        let mut keys = HashSet::with_capacity(ids.len());
        let mut slugs = HashSet::with_capacity(ids.len());
        for id in ids {
            let asset = match self.get(id) {
                Some(asset) => asset.clone(),
                None => match Asset::same_slug(id) {
                    Ok(asset) => asset,
                    Err(error) => {
                        warn!(%id, %error, "skipping market id that is not a valid asset key");
                        continue;
                    }
                },
            };
            if !keys.insert(asset.canonical_key.clone()) {
                continue;
            }
            if !slugs.insert(asset.source_slug.clone()) {
                warn!(%id, slug = asset.source_slug(), "skipping market id whose page is already scheduled");
                continue;
            }
            resolved.push(asset);
        }
        resolved
    }
}
