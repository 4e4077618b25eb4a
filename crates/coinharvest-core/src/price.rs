use crate::domain::SENTINEL;

/// Currency markers stripped from the front of a price. Longer markers first.
const CURRENCY_MARKERS: [&str; 6] = ["US$", "$", "€", "£", "¥", "₿"];

/// Convert scraped price text such as `"$64,321.10"` into a number.
///
/// Returns `None` for the sentinel, empty input, non-numeric residue and
/// non-finite results.
pub fn normalize_price(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == SENTINEL {
        return None;
    }

    let unmarked = CURRENCY_MARKERS
        .iter()
        .find_map(|marker| trimmed.strip_prefix(marker))
        .unwrap_or(trimmed);
    let digits: String = unmarked
        .chars()
        .filter(|ch| *ch != ',' && !ch.is_whitespace())
        .collect();

    let value = digits.parse::<f64>().ok()?;
    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_currency_marker_and_thousands_separators() {
        assert_eq!(normalize_price("$64,321.10"), Some(64_321.10));
        assert_eq!(normalize_price("  US$1 234.5 "), Some(1_234.5));
        assert_eq!(normalize_price("€0.98"), Some(0.98));
        assert_eq!(normalize_price("1,000"), Some(1_000.0));
    }

    #[test]
    fn keeps_precision_of_tiny_prices() {
        assert_eq!(normalize_price("$0.000012"), Some(0.000_012));
    }

    #[test]
    fn unresolvable_text_yields_none() {
        assert_eq!(normalize_price(SENTINEL), None);
        assert_eq!(normalize_price(""), None);
        assert_eq!(normalize_price("   "), None);
        assert_eq!(normalize_price("abc"), None);
        assert_eq!(normalize_price("$"), None);
        assert_eq!(normalize_price("$12.3.4"), None);
    }

    #[test]
    fn non_finite_parses_are_rejected() {
        assert_eq!(normalize_price("inf"), None);
        assert_eq!(normalize_price("NaN"), None);
        assert_eq!(normalize_price("1e400"), None);
    }
}
