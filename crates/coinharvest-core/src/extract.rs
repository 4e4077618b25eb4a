//! Field extraction from asset pages.
//!
//! Each output field is resolved by a [`FieldChain`]: an ordered list of
//! [`NamedStrategy`] values tried in turn until one yields non-empty text.
//! Extraction never fails; a field nobody resolves becomes [`SENTINEL`].

use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use tracing::debug;

use crate::domain::{Asset, ScrapeOutcome, SENTINEL};
use crate::ValidationError;

const DESCRIPTION_LEGACY_SELECTOR: &str = "p.sc-1eb5slv-0";
const CATEGORY_SECTION_MARKERS: [&str; 3] = ["tags", "category", "details"];
const CATEGORY_KEYWORDS: [&str; 6] = [
    "layer",
    "smart",
    "defi",
    "interoperability",
    "ecosystem",
    "contract",
];
const CATEGORY_EXCLUDED_KEYWORD: &str = "historical";
const PRICE_TEST_MARKER_SELECTOR: &str = r#"span[data-test="text-cdp-price-display"]"#;

/// A parsed asset page.
pub struct Document {
    html: Html,
}

impl Document {
    pub fn parse(html: &str) -> Self {
        Self {
            html: Html::parse_document(html),
        }
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    /// Text of the first element matching `selector`, if any.
    ///
    /// An unparseable selector matches nothing.
    pub fn first_text(&self, selector: &str) -> Option<String> {
        let selector = Selector::parse(selector).ok()?;
        self.html.select(&selector).next().map(element_text)
    }
}

type StrategyFn = dyn Fn(&Document, &Asset) -> Option<String> + Send + Sync;

/// One extraction heuristic with a stable name for logging.
#[derive(Clone)]
pub struct NamedStrategy {
    name: &'static str,
    run: Arc<StrategyFn>,
}

impl NamedStrategy {
    pub fn new(
        name: &'static str,
        run: impl Fn(&Document, &Asset) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            run: Arc::new(run),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Run the heuristic, treating whitespace-only text as no match.
    pub fn apply(&self, document: &Document, asset: &Asset) -> Option<String> {
        (self.run)(document, asset)
            .map(|text| text.trim().to_owned())
            .filter(|text| !text.is_empty())
    }
}

impl Debug for NamedStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("NamedStrategy").field(&self.name).finish()
    }
}

/// Ordered strategies for one field. Earlier entries take precedence.
#[derive(Debug, Clone, Default)]
pub struct FieldChain {
    strategies: Vec<NamedStrategy>,
}

impl FieldChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a strategy after the existing ones.
    pub fn push(&mut self, strategy: NamedStrategy) {
        self.strategies.push(strategy);
    }

    pub fn with(mut self, strategy: NamedStrategy) -> Self {
        self.push(strategy);
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(NamedStrategy::name).collect()
    }

    /// First non-empty value and the name of the strategy that produced it.
    pub fn resolve(&self, document: &Document, asset: &Asset) -> Option<(&'static str, String)> {
        self.strategies.iter().find_map(|strategy| {
            strategy
                .apply(document, asset)
                .map(|text| (strategy.name(), text))
        })
    }
}

/// Per-asset category selectors, keyed by source slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryOverrides {
    selectors: BTreeMap<String, String>,
}

impl Default for CategoryOverrides {
    fn default() -> Self {
        let mut selectors = BTreeMap::new();
        selectors.insert(
            String::from("unus-sed-leo"),
            String::from("div.sc-16r8icm-0"),
        );
        Self { selectors }
    }
}

impl CategoryOverrides {
    pub fn empty() -> Self {
        Self {
            selectors: BTreeMap::new(),
        }
    }

    pub fn insert(
        &mut self,
        source_slug: impl Into<String>,
        selector: impl Into<String>,
    ) -> Result<(), ValidationError> {
        let selector = selector.into();
        if Selector::parse(&selector).is_err() {
            return Err(ValidationError::InvalidSelector { selector });
        }
        self.selectors.insert(source_slug.into(), selector);
        Ok(())
    }

    pub fn selector_for(&self, source_slug: &str) -> Option<&str> {
        self.selectors.get(source_slug).map(String::as_str)
    }
}

/// Which strategy resolved each field; `None` means the sentinel was used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub description: Option<&'static str>,
    pub category: Option<&'static str>,
    pub price: Option<&'static str>,
}

/// Resolves description, category and price text from an asset page.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    description: FieldChain,
    category: FieldChain,
    price: FieldChain,
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::with_overrides(CategoryOverrides::default())
    }
}

impl FieldExtractor {
    pub fn new(description: FieldChain, category: FieldChain, price: FieldChain) -> Self {
        Self {
            description,
            category,
            price,
        }
    }

    /// The standard chains, with `overrides` consulted for category.
    pub fn with_overrides(overrides: CategoryOverrides) -> Self {
        Self::new(
            description_chain(),
            category_chain(overrides),
            price_chain(),
        )
    }

    pub fn description_chain_mut(&mut self) -> &mut FieldChain {
        &mut self.description
    }

    pub fn category_chain_mut(&mut self) -> &mut FieldChain {
        &mut self.category
    }

    pub fn price_chain_mut(&mut self) -> &mut FieldChain {
        &mut self.price
    }

    pub fn extract(&self, document: &Document, asset: &Asset) -> ScrapeOutcome {
        self.extract_with_resolution(document, asset).0
    }

    pub fn extract_with_resolution(
        &self,
        document: &Document,
        asset: &Asset,
    ) -> (ScrapeOutcome, Resolution) {
        let (description_by, description) = resolve_or_sentinel(&self.description, document, asset);
        let (category_by, category) = resolve_or_sentinel(&self.category, document, asset);
        let (price_by, price_text) = resolve_or_sentinel(&self.price, document, asset);

        let resolution = Resolution {
            description: description_by,
            category: category_by,
            price: price_by,
        };
        debug!(
            coin = asset.canonical_key(),
            description = ?resolution.description,
            category = ?resolution.category,
            price = ?resolution.price,
            "resolved page fields"
        );

        (
            ScrapeOutcome {
                coin: asset.canonical_key().to_owned(),
                description,
                category,
                price_text,
            },
            resolution,
        )
    }
}

fn resolve_or_sentinel(
    chain: &FieldChain,
    document: &Document,
    asset: &Asset,
) -> (Option<&'static str>, String) {
    match chain.resolve(document, asset) {
        Some((name, text)) => (Some(name), text),
        None => (None, SENTINEL.to_owned()),
    }
}

pub fn description_chain() -> FieldChain {
    FieldChain::new()
        .with(NamedStrategy::new("about_container_paragraph", |document, _| {
            container_paragraph(document, &["about"])
        }))
        .with(NamedStrategy::new("content_container_paragraph", |document, _| {
            container_paragraph(document, &["content"])
        }))
        .with(NamedStrategy::new("legacy_paragraph", |document, _| {
            document.first_text(DESCRIPTION_LEGACY_SELECTOR)
        }))
}

pub fn category_chain(overrides: CategoryOverrides) -> FieldChain {
    let overrides = Arc::new(overrides);
    FieldChain::new()
        .with(NamedStrategy::new("tagged_section_link", |document, _| {
            tagged_section_link(document)
        }))
        .with(NamedStrategy::new("asset_override", move |document, asset| {
            let selector = overrides.selector_for(asset.source_slug())?;
            document.first_text(selector)
        }))
        .with(NamedStrategy::new("keyword_link", |document, _| {
            keyword_link(document)
        }))
}

pub fn price_chain() -> FieldChain {
    FieldChain::new()
        .with(NamedStrategy::new("price_test_marker", |document, _| {
            document.first_text(PRICE_TEST_MARKER_SELECTOR)
        }))
        .with(NamedStrategy::new("currency_symbol_span", |document, _| {
            currency_symbol_span(document)
        }))
}

/// First paragraph inside the first `div` with a class token containing a marker.
fn container_paragraph(document: &Document, markers: &[&str]) -> Option<String> {
    let divs = Selector::parse("div").ok()?;
    let paragraphs = Selector::parse("p").ok()?;
    document
        .html()
        .select(&divs)
        .filter(|div| has_class_containing(div, markers))
        .find_map(|div| div.select(&paragraphs).next())
        .map(element_text)
}

fn tagged_section_link(document: &Document) -> Option<String> {
    let divs = Selector::parse("div").ok()?;
    let links = Selector::parse("a").ok()?;
    document
        .html()
        .select(&divs)
        .filter(|div| has_class_containing(div, &CATEGORY_SECTION_MARKERS))
        .find_map(|div| div.select(&links).find(is_cmc_link))
        .map(element_text)
}

fn keyword_link(document: &Document) -> Option<String> {
    let links = Selector::parse("a").ok()?;
    document
        .html()
        .select(&links)
        .filter(is_cmc_link)
        .map(element_text)
        .find(|text| {
            let lowered = text.to_lowercase();
            CATEGORY_KEYWORDS
                .iter()
                .any(|keyword| lowered.contains(keyword))
                && !lowered.contains(CATEGORY_EXCLUDED_KEYWORD)
        })
}

/// First `span` whose own text contains a dollar sign.
fn currency_symbol_span(document: &Document) -> Option<String> {
    let spans = Selector::parse("span").ok()?;
    document
        .html()
        .select(&spans)
        .map(own_text)
        .find(|text| text.contains('$'))
}

fn is_cmc_link(element: &ElementRef<'_>) -> bool {
    element
        .value()
        .classes()
        .any(|class| class.eq_ignore_ascii_case("cmc-link"))
}

fn has_class_containing(element: &ElementRef<'_>, markers: &[&str]) -> bool {
    element.value().classes().any(|class| {
        let class = class.to_ascii_lowercase();
        markers.iter().any(|marker| class.contains(marker))
    })
}

/// All descendant text, concatenated as-is, with whitespace runs collapsed.
fn element_text(element: ElementRef<'_>) -> String {
    let joined = element.text().collect::<String>();
    joined.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text of the element's direct text children only.
fn own_text(element: ElementRef<'_>) -> String {
    let text = element
        .children()
        .filter_map(|child| child.value().as_text().map(|text| &**text))
        .collect::<String>();
    text.trim().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bitcoin() -> Asset {
        Asset::same_slug("bitcoin").expect("valid asset")
    }

    #[test]
    fn description_prefers_about_container() {
        let document = Document::parse(
            r#"<div class="Content-Block"><p>Content text</p></div>
               <div class="sc-x ABOUT-section"><p>  About   text </p></div>"#,
        );

        let (outcome, resolution) =
            FieldExtractor::default().extract_with_resolution(&document, &bitcoin());

        assert_eq!(outcome.description, "About text");
        assert_eq!(resolution.description, Some("about_container_paragraph"));
    }

    #[test]
    fn inline_markup_does_not_add_spaces() {
        let document = Document::parse(
            r#"<div class="about"><p>Read the <a href="/w">whitepaper</a>. It is <b>fast</b>, cheap.</p></div>
               <span data-test="text-cdp-price-display">$<!-- -->64,321.10</span>"#,
        );

        let outcome = FieldExtractor::default().extract(&document, &bitcoin());

        assert_eq!(outcome.description, "Read the whitepaper. It is fast, cheap.");
        assert_eq!(outcome.price_text, "$64,321.10");
    }

    #[test]
    fn empty_paragraph_falls_through_to_next_strategy() {
        let document = Document::parse(
            r#"<div class="about"><p>   </p></div>
               <p class="sc-1eb5slv-0">Legacy description</p>"#,
        );

        let (outcome, resolution) =
            FieldExtractor::default().extract_with_resolution(&document, &bitcoin());

        assert_eq!(outcome.description, "Legacy description");
        assert_eq!(resolution.description, Some("legacy_paragraph"));
    }

    #[test]
    fn keyword_link_skips_historical_links() {
        let document = Document::parse(
            r#"<a class="cmc-link" href="/h">Historical Layer 1 data</a>
               <a class="cmc-link" href="/c">Smart Contract Platform</a>"#,
        );

        let outcome = FieldExtractor::default().extract(&document, &bitcoin());

        assert_eq!(outcome.category, "Smart Contract Platform");
    }

    #[test]
    fn override_only_applies_to_its_slug() {
        let html = r#"<div class="sc-16r8icm-0">Exchange Token</div>"#;
        let document = Document::parse(html);
        let leo = Asset::new("leo-token", "unus-sed-leo").expect("valid asset");

        let extractor = FieldExtractor::default();

        assert_eq!(extractor.extract(&document, &leo).category, "Exchange Token");
        assert_eq!(extractor.extract(&document, &bitcoin()).category, SENTINEL);
    }

    #[test]
    fn invalid_override_selector_is_rejected() {
        let mut overrides = CategoryOverrides::empty();
        let error = overrides
            .insert("bitcoin", "div[[")
            .expect_err("selector should not parse");
        assert!(matches!(error, ValidationError::InvalidSelector { .. }));
        assert_eq!(overrides.selector_for("bitcoin"), None);
    }

    #[test]
    fn currency_span_uses_own_text_only() {
        let document = Document::parse(
            r#"<span class="wrapper"><span>Price</span><span>$1.00</span></span>"#,
        );

        let outcome = FieldExtractor::default().extract(&document, &bitcoin());

        assert_eq!(outcome.price_text, "$1.00");
    }

    #[test]
    fn pushed_strategy_runs_after_builtins() {
        let mut extractor = FieldExtractor::default();
        extractor
            .price_chain_mut()
            .push(NamedStrategy::new("meta_price", |document, _| {
                let selector = Selector::parse(r#"meta[itemprop="price"]"#).ok()?;
                document
                    .html()
                    .select(&selector)
                    .next()?
                    .value()
                    .attr("content")
                    .map(str::to_owned)
            }));
        let document = Document::parse(r#"<meta itemprop="price" content="42.5">"#);

        let (outcome, resolution) = extractor.extract_with_resolution(&document, &bitcoin());

        assert_eq!(outcome.price_text, "42.5");
        assert_eq!(resolution.price, Some("meta_price"));
        assert_eq!(
            extractor.price_chain_mut().names(),
            vec!["price_test_marker", "currency_symbol_span", "meta_price"]
        );
    }

    #[test]
    fn blank_page_resolves_to_sentinels() {
        let document = Document::parse("<html><body></body></html>");

        let (outcome, resolution) =
            FieldExtractor::default().extract_with_resolution(&document, &bitcoin());

        assert!(outcome.is_unavailable());
        assert_eq!(resolution, Resolution::default());
    }
}
