use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use super::NULL_SENTINEL;

// NewType pattern for type safety
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductUrl(pub String);

impl ProductUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Text scraped from one product page, already persisted to `path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawProduct {
    pub url: ProductUrl,
    pub raw_text: String,
    pub path: PathBuf,
}

/// The seven schema fields, in CSV column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductField {
    Brand,
    Model,
    Flavor,
    PuffCount,
    NicotineStrength,
    BatteryCapacity,
    CoilType,
}

impl ProductField {
    pub const ALL: [ProductField; 7] = [
        ProductField::Brand,
        ProductField::Model,
        ProductField::Flavor,
        ProductField::PuffCount,
        ProductField::NicotineStrength,
        ProductField::BatteryCapacity,
        ProductField::CoilType,
    ];

    /// Key used in the LLM JSON response and in the CSV header.
    pub fn key(&self) -> &'static str {
        match self {
            ProductField::Brand => "brand",
            ProductField::Model => "model",
            ProductField::Flavor => "flavor",
            ProductField::PuffCount => "puff_count",
            ProductField::NicotineStrength => "nicotine_strength",
            ProductField::BatteryCapacity => "battery_capacity",
            ProductField::CoilType => "coil_type",
        }
    }

    /// Human label used in the extraction prompt.
    pub fn label(&self) -> &'static str {
        match self {
            ProductField::Brand => "Brand",
            ProductField::Model => "Model/Type",
            ProductField::Flavor => "Flavor",
            ProductField::PuffCount => "Puff Count",
            ProductField::NicotineStrength => "Nicotine Strength",
            ProductField::BatteryCapacity => "Battery Capacity",
            ProductField::CoilType => "Coil Type",
        }
    }
}

/// One normalized output row. Every field is always present, `None` meaning null.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructuredProduct {
    pub url: String,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub flavor: Option<String>,
    pub puff_count: Option<String>,
    pub nicotine_strength: Option<String>,
    pub battery_capacity: Option<String>,
    pub coil_type: Option<String>,
}

impl StructuredProduct {
    /// A row with every field null, used when extraction fails.
    pub fn all_null(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn get(&self, field: ProductField) -> Option<&str> {
        match field {
            ProductField::Brand => self.brand.as_deref(),
            ProductField::Model => self.model.as_deref(),
            ProductField::Flavor => self.flavor.as_deref(),
            ProductField::PuffCount => self.puff_count.as_deref(),
            ProductField::NicotineStrength => self.nicotine_strength.as_deref(),
            ProductField::BatteryCapacity => self.battery_capacity.as_deref(),
            ProductField::CoilType => self.coil_type.as_deref(),
        }
    }

    pub fn set(&mut self, field: ProductField, value: Option<String>) {
        let slot = match field {
            ProductField::Brand => &mut self.brand,
            ProductField::Model => &mut self.model,
            ProductField::Flavor => &mut self.flavor,
            ProductField::PuffCount => &mut self.puff_count,
            ProductField::NicotineStrength => &mut self.nicotine_strength,
            ProductField::BatteryCapacity => &mut self.battery_capacity,
            ProductField::CoilType => &mut self.coil_type,
        };
        *slot = value;
    }

    pub fn is_all_null(&self) -> bool {
        ProductField::ALL.iter().all(|f| self.get(*f).is_none())
    }

    /// CSV header: `url` followed by the seven field keys.
    pub fn header() -> Vec<&'static str> {
        std::iter::once("url")
            .chain(ProductField::ALL.iter().map(|f| f.key()))
            .collect()
    }

    /// CSV record matching [`StructuredProduct::header`], nulls rendered as the sentinel.
    pub fn to_record(&self) -> Vec<&str> {
        std::iter::once(self.url.as_str())
            .chain(ProductField::ALL.iter().map(|f| self.get(*f).unwrap_or(NULL_SENTINEL)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn header_has_url_then_fields_in_order() {
        assert_eq!(
            StructuredProduct::header(),
            vec![
                "url",
                "brand",
                "model",
                "flavor",
                "puff_count",
                "nicotine_strength",
                "battery_capacity",
                "coil_type"
            ]
        );
    }

    #[test]
    fn record_renders_nulls_with_sentinel() {
        let mut product = StructuredProduct::all_null("https://acme.test/product/a");
        product.set(ProductField::Brand, Some("Geek Bar".to_string()));
        product.set(ProductField::PuffCount, Some("15000".to_string()));

        assert_eq!(
            product.to_record(),
            vec!["https://acme.test/product/a", "Geek Bar", "N/A", "N/A", "15000", "N/A", "N/A", "N/A"]
        );
        assert!(!product.is_all_null());
    }

    #[test]
    fn all_null_keeps_url() {
        let product = StructuredProduct::all_null("https://acme.test/product/a");
        assert!(product.is_all_null());
        assert_eq!(product.url, "https://acme.test/product/a");
        assert_eq!(product.to_record().len(), StructuredProduct::header().len());
    }
}
