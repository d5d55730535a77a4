//! Optimistic variant selection for product pages.
//!
//! While a new option selection is in flight, the page shows the variant
//! that selection resolves to among the variants it already knows about,
//! instead of waiting for the server round trip. Known variants are the
//! selected-or-first-available variant plus the variants adjacent to it
//! (one option changed).

use crate::money::Money;
use serde::{Deserialize, Serialize};

/// One `name = value` option, e.g. `Size = M`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectedOption {
    pub name: String,
    pub value: String,
}

impl SelectedOption {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductVariant {
    pub id: String,
    pub title: String,
    pub available_for_sale: bool,
    pub selected_options: Vec<SelectedOption>,
    pub price: Money,
    pub compare_at_price: Option<Money>,
}

impl ProductVariant {
    /// Whether every option of this variant appears in `selection`.
    ///
    /// A subset test: extra options in `selection` are ignored, and a
    /// variant with no options matches any selection.
    pub fn matches(&self, selection: &[SelectedOption]) -> bool {
        self.selected_options
            .iter()
            .all(|option| selection.contains(option))
    }
}

/// Variant data for one product as returned by the catalog.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductVariants {
    pub selected_or_first_available: Option<ProductVariant>,
    /// The product's listed variants (usually only the first).
    pub listed: Vec<ProductVariant>,
    pub adjacent: Vec<ProductVariant>,
}

impl ProductVariants {
    /// Selected-or-first-available, else the first listed variant, else none.
    pub fn fallback(&self) -> Option<&ProductVariant> {
        self.selected_or_first_available
            .as_ref()
            .or_else(|| self.listed.first())
    }

    /// Adjacent variants followed by the selected-or-first-available one,
    /// without duplicate ids.
    pub fn candidates(&self) -> Vec<&ProductVariant> {
        let mut out: Vec<&ProductVariant> = Vec::new();
        for variant in self
            .adjacent
            .iter()
            .chain(self.selected_or_first_available.iter())
        {
            if !out.iter().any(|v| v.id == variant.id) {
                out.push(variant);
            }
        }
        out
    }

    /// The variant to display while `pending_selection` is in flight.
    ///
    /// Falls back to [`fallback`](Self::fallback) when nothing is pending or
    /// no known variant matches the pending selection.
    pub fn optimistic(&self, pending_selection: Option<&[SelectedOption]>) -> Option<&ProductVariant> {
        pending_selection
            .and_then(|selection| {
                self.candidates()
                    .into_iter()
                    .find(|variant| variant.matches(selection))
            })
            .or_else(|| self.fallback())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(id: &str, size: &str, color: &str, available: bool) -> ProductVariant {
        ProductVariant {
            id: id.to_string(),
            title: format!("{} / {}", size, color),
            available_for_sale: available,
            selected_options: vec![
                SelectedOption::new("Size", size),
                SelectedOption::new("Color", color),
            ],
            price: Money::from_minor(2500, "USD"),
            compare_at_price: None,
        }
    }

    fn variants() -> ProductVariants {
        ProductVariants {
            selected_or_first_available: Some(variant("v1", "M", "Red", true)),
            listed: vec![variant("v0", "S", "Red", false)],
            adjacent: vec![
                variant("v2", "L", "Red", true),
                variant("v3", "M", "Blue", true),
                variant("v1", "M", "Red", true),
            ],
        }
    }

    #[test]
    fn test_fallback_prefers_selected_or_first_available() {
        let mut v = variants();
        assert_eq!(v.fallback().map(|v| v.id.as_str()), Some("v1"));

        v.selected_or_first_available = None;
        assert_eq!(v.fallback().map(|v| v.id.as_str()), Some("v0"));

        v.listed.clear();
        assert!(v.fallback().is_none());
    }

    #[test]
    fn test_candidates_are_deduplicated() {
        let v = variants();
        let ids: Vec<_> = v.candidates().iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["v2", "v3", "v1"]);
    }

    #[test]
    fn test_optimistic_picks_matching_adjacent_variant() {
        let v = variants();
        let selection = vec![
            SelectedOption::new("Color", "Blue"),
            SelectedOption::new("Size", "M"),
        ];
        assert_eq!(
            v.optimistic(Some(&selection)).map(|v| v.id.as_str()),
            Some("v3")
        );
    }

    #[test]
    fn test_optimistic_without_match_uses_fallback() {
        let v = variants();
        let selection = vec![
            SelectedOption::new("Size", "XL"),
            SelectedOption::new("Color", "Green"),
        ];
        assert_eq!(
            v.optimistic(Some(&selection)).map(|v| v.id.as_str()),
            Some("v1")
        );
        assert_eq!(v.optimistic(None).map(|v| v.id.as_str()), Some("v1"));
    }

    #[test]
    fn test_variant_without_options_matches_any_selection() {
        let mut single = variant("default", "-", "-", true);
        single.selected_options.clear();
        assert!(single.matches(&[]));
        assert!(single.matches(&[SelectedOption::new("Size", "XL")]));

        let v = ProductVariants {
            selected_or_first_available: Some(variant("v1", "M", "Red", true)),
            listed: vec![],
            adjacent: vec![single],
        };
        let selection = vec![SelectedOption::new("Size", "XL")];
        assert_eq!(
            v.optimistic(Some(&selection)).map(|v| v.id.as_str()),
            Some("default")
        );
    }

    #[test]
    fn test_extra_selected_options_are_ignored() {
        let v = variants();
        let selection = vec![
            SelectedOption::new("Size", "L"),
            SelectedOption::new("Color", "Red"),
            SelectedOption::new("Material", "Wool"),
        ];
        assert_eq!(
            v.optimistic(Some(&selection)).map(|v| v.id.as_str()),
            Some("v2")
        );
    }
}
