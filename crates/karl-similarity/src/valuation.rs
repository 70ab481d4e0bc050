//! Combines the textual, numeric, and volume comparators into one
//! `Valuation`, and the fixed-weight scalar it collapses to.

use karl_core::ProductSummary;

use crate::hungarian::solve_max;
use crate::levenshtein::levenshtein;

const WEIGHTS: [f64; 3] = [0.6, 0.2, 0.2];

/// The three similarity components between two products, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Valuation {
    /// Textual similarity of the two names.
    pub t: f64,
    /// Numeric similarity of the two prices.
    pub p: f64,
    /// `1.0` if volume and volume measure match exactly, else `0.0`.
    pub v: f64,
}

impl Valuation {
    /// Weighted sum `0.6*t + 0.2*p + 0.2*v`.
    #[must_use]
    pub fn collapse(&self) -> f64 {
        WEIGHTS[0] * self.t + WEIGHTS[1] * self.p + WEIGHTS[2] * self.v
    }
}

/// Token-wise Hungarian assignment over Levenshtein-derived token
/// similarity. Tokenises on spaces; the longer token sequence becomes the
/// matrix's row dimension so the assignment always has at least as many
/// rows as columns.
fn textual_compare(x: &str, y: &str) -> f64 {
    let mut xs: Vec<&str> = x.split(' ').collect();
    let mut ys: Vec<&str> = y.split(' ').collect();

    if xs.len() > ys.len() {
        std::mem::swap(&mut xs, &mut ys);
    }

    if ys.is_empty() {
        return 0.0;
    }

    let sim: Vec<Vec<f64>> = ys
        .iter()
        .map(|ye| {
            xs.iter()
                .map(|xe| {
                    let longest = ye.chars().count().max(xe.chars().count());
                    if longest == 0 {
                        return 1.0;
                    }
                    let distance = levenshtein(ye, xe);
                    (longest - distance.min(longest)) as f64 / longest as f64
                })
                .collect()
        })
        .collect();

    let matching = solve_max(&sim, ys.len(), xs.len());
    let total: f64 = matching.iter().map(|&(yi, xi)| sim[yi][xi]).sum();

    let sim_min = xs.len().min(ys.len()) as f64;
    let sim_max = xs.len().max(ys.len()) as f64;

    0.9 * total / sim_min + 0.1 * total / sim_max
}

fn numeric_compare(x: f64, y: f64) -> f64 {
    let denom = x.max(y);
    if denom == 0.0 {
        return 1.0;
    }
    1.0 - (x - y).abs() / denom
}

/// Computes the similarity valuation between two product summaries.
#[must_use]
pub fn compare(x: &ProductSummary, y: &ProductSummary) -> Valuation {
    Valuation {
        t: textual_compare(&x.name.to_lowercase(), &y.name.to_lowercase()),
        p: numeric_compare(x.price as f64, y.price as f64),
        v: f64::from(u8::from(x.volume_measure == y.volume_measure && x.volume == y.volume)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use karl_core::VolumeMeasure;

    fn summary(name: &str, price: i64, volume: i64, measure: VolumeMeasure) -> ProductSummary {
        ProductSummary {
            identifier: "id".to_string(),
            name: name.to_string(),
            volume,
            volume_measure: measure,
            orig_price: price,
            price,
            discount_amount: 0,
            image_citation: None,
            price_per_unit: ProductSummary::compute_price_per_unit(price, volume, measure),
        }
    }

    #[test]
    fn identical_products_score_perfectly() {
        let a = summary("full cream milk", 189, 1000, VolumeMeasure::Millilitres);
        let b = summary("full cream milk", 189, 1000, VolumeMeasure::Millilitres);
        let v = compare(&a, &b);
        assert!((v.t - 1.0).abs() < 1e-9);
        assert!((v.p - 1.0).abs() < 1e-9);
        assert!((v.v - 1.0).abs() < 1e-9);
        assert!((v.collapse() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn differing_volume_measure_zeroes_v() {
        let a = summary("milk", 100, 1000, VolumeMeasure::Millilitres);
        let b = summary("milk", 100, 1000, VolumeMeasure::Milligrams);
        let v = compare(&a, &b);
        assert_eq!(v.v, 0.0);
    }

    #[test]
    fn numeric_component_reflects_relative_price_gap() {
        assert!((numeric_compare(100.0, 100.0) - 1.0).abs() < 1e-9);
        assert!((numeric_compare(100.0, 50.0) - 0.5).abs() < 1e-9);
        assert_eq!(numeric_compare(0.0, 0.0), 1.0);
    }

    #[test]
    fn textual_compare_rewards_shared_tokens() {
        let close = textual_compare("full cream milk", "full cream milk 1l");
        let far = textual_compare("full cream milk", "chocolate chip cookies");
        assert!(close > far);
    }

    /// Invariant 6: every component, and the collapsed score, stays within
    /// `[0, 1]`, and a product compared against itself scores at least 0.8.
    #[test]
    fn similarity_is_bounded_and_self_similarity_is_high() {
        let cases = [
            summary("full cream milk", 189, 1000, VolumeMeasure::Millilitres),
            summary("", 0, 0, VolumeMeasure::Units),
            summary("cheddar cheese block", 450, 200, VolumeMeasure::Milligrams),
        ];

        for a in &cases {
            for b in &cases {
                let v = compare(a, b);
                for component in [v.t, v.p, v.v] {
                    assert!((0.0..=1.0).contains(&component), "component out of range: {component}");
                }
                let score = v.collapse();
                assert!((0.0..=1.0).contains(&score), "collapsed score out of range: {score}");
            }
            let self_score = compare(a, a).collapse();
            assert!(self_score >= 0.8, "self-similarity below 0.8: {self_score}");
        }
    }

    /// S7: two differently-spelled cross-supermarket names for the same
    /// product, at the same volume and price, collapse above 0.5.
    #[test]
    fn s7_cross_supermarket_near_match_exceeds_threshold() {
        let a = summary("Appel sap 1L", 129, 1000, VolumeMeasure::Millilitres);
        let b = summary("Appelsap literpak", 129, 1000, VolumeMeasure::Millilitres);
        assert!(compare(&a, &b).collapse() > 0.5);
    }
}
