//! Shared domain value types for the product/tag/session data model.
//!
//! These are plain data carriers, not row structs: `karl-db` maps them to and
//! from SQL, `karl-similarity` consumes [`ProductSummary`], and `karl-facade`
//! re-exports them as its public vocabulary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ImageCitationId, ProductclassId, TagId, TagcategoryId};

/// Unit family of a product's `volume`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VolumeMeasure {
    Units,
    Millilitres,
    Milligrams,
    Millimetres,
}

impl std::fmt::Display for VolumeMeasure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            VolumeMeasure::Units => "units",
            VolumeMeasure::Millilitres => "millilitres",
            VolumeMeasure::Milligrams => "milligrams",
            VolumeMeasure::Millimetres => "millimetres",
        };
        write!(f, "{s}")
    }
}

/// Crawler-declared quality of a single price observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    Low,
    Neutral,
    High,
    Perfect,
}

/// The mutable identity of a product as the crawler sees it: name and
/// packaging, independent of price. Changes to these fields update the
/// `Product` row in place rather than producing a new `Productdetails`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductBase {
    pub identifier: String,
    pub name: String,
    pub volume: i64,
    pub volume_measure: VolumeMeasure,
}

/// Payload for a single crawler observation of a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddProduct {
    pub product_base: ProductBase,
    pub orig_price: i64,
    pub price: i64,
    pub discount_amount: i64,
    pub valid_on: DateTime<Utc>,
    pub retrieved_on: DateTime<Utc>,
    pub confidence: Confidence,
    #[serde(default)]
    pub problems: Vec<String>,
}

/// The merged view of a `Product` and its current `Productdetails`, as
/// returned by `get_product`/`get_products` and consumed by the similarity
/// engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub identifier: String,
    pub name: String,
    pub volume: i64,
    pub volume_measure: VolumeMeasure,
    pub orig_price: i64,
    pub price: i64,
    pub discount_amount: i64,
    pub image_citation: Option<ImageCitationId>,
    /// Read-time convenience: `price * canonical_volume(volume_measure) /
    /// volume` when `volume > 0`, matching the original's normalized-price
    /// derivation — price per canonical unit (per unit, per litre, per
    /// kilogram, or per metre) rather than a raw `price / volume`, so
    /// values are comparable across products with different
    /// `volume_measure`s.
    pub price_per_unit: Option<f64>,
}

impl ProductSummary {
    /// `canonical_volume` from the original's price-normalization
    /// derivation: the unit count a measure's base unit divides into
    /// (millilitres/millimetres per litre/metre, milligrams per kilogram;
    /// `units` is already its own canonical unit).
    fn canonical_volume(volume_measure: VolumeMeasure) -> i64 {
        match volume_measure {
            VolumeMeasure::Units => 1,
            VolumeMeasure::Millilitres | VolumeMeasure::Millimetres => 1_000,
            VolumeMeasure::Milligrams => 1_000_000,
        }
    }

    #[must_use]
    pub fn compute_price_per_unit(price: i64, volume: i64, volume_measure: VolumeMeasure) -> Option<f64> {
        if volume > 0 {
            let canonical = Self::canonical_volume(volume_measure);
            Some((price * canonical) as f64 / volume as f64)
        } else {
            None
        }
    }
}

/// One point of `get_product_history`: the effective timestamp
/// (`max(valid_on, retrieved_on)`) paired with the observed price at that
/// instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProductHistoryPoint {
    pub effective: DateTime<Utc>,
    pub price: i64,
}

/// Problems the crawler reported for a product, grouped by identifier, as
/// returned by `get_recent_productlog`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductLogEntry {
    pub identifier: String,
    pub messages: Vec<String>,
}

/// The bound view of a productclass: its name, the current details of every
/// member product (one per supermarket), and its bound tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductclassSummary {
    pub id: ProductclassId,
    pub name: String,
    pub members: Vec<ProductSummary>,
    pub tags: Vec<TagId>,
}

/// One node of the tag forest, as returned by `get_tags`. Roots have
/// `parent = None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub parent: Option<TagId>,
    pub tagcategory: Option<TagcategoryId>,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_per_unit_none_when_volume_zero() {
        assert_eq!(
            ProductSummary::compute_price_per_unit(500, 0, VolumeMeasure::Units),
            None
        );
    }

    #[test]
    fn price_per_unit_divides_for_units() {
        assert_eq!(
            ProductSummary::compute_price_per_unit(1000, 500, VolumeMeasure::Units),
            Some(2.0)
        );
    }

    #[test]
    fn price_per_unit_scales_by_canonical_volume_for_millilitres() {
        // 250ml at 150 cents -> 150 * 1000 / 250 = 600 cents per litre.
        assert_eq!(
            ProductSummary::compute_price_per_unit(150, 250, VolumeMeasure::Millilitres),
            Some(600.0)
        );
    }

    #[test]
    fn price_per_unit_scales_by_canonical_volume_for_milligrams() {
        // 500mg at 200 cents -> 200 * 1_000_000 / 500 = 400_000 cents per kilogram.
        assert_eq!(
            ProductSummary::compute_price_per_unit(200, 500, VolumeMeasure::Milligrams),
            Some(400_000.0)
        );
    }

    #[test]
    fn volume_measure_display() {
        assert_eq!(VolumeMeasure::Millilitres.to_string(), "millilitres");
    }
}
