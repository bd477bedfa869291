use std::collections::HashMap;

use log::{debug, info};

use crate::config::*;
use crate::features::{FeatureSpace, FeatureVector};

/// Anything that can turn a completed indicator vector into a region prediction.
pub trait RegionClassifier {
    fn score(&self, space: &FeatureSpace, vector: &FeatureVector) -> Prediction;
}

pub const DEFAULT_SMOOTHING: f64 = 0.5;

pub const DEFAULT_REGIONS: [&str; 7] = [
    "The West",
    "North Central",
    "Northern New England",
    "The North",
    "Greater New York City",
    "Midland",
    "The South",
];

// Illustrative weights, hand-picked from the coefficients of a regression on the survey.
const DEFAULT_WEIGHTS: [(&str, &[(&str, f64)]); 20] = [
    ("303_frappe", &[("Northern New England", 3.5)]),
    ("303_cabinet", &[("Northern New England", 2.8)]),
    ("300_parking", &[("The West", 2.2)]),
    ("300_tree lawn", &[("The North", 2.1)]),
    ("300_terrace", &[("North Central", 2.0)]),
    (
        "335_New York City",
        &[("Greater New York City", 3.8), ("The North", 0.8)],
    ),
    ("335_LA", &[("The West", 3.5)]),
    ("335_Chicago", &[("North Central", 3.3)]),
    ("335_Boston", &[("Northern New England", 3.4)]),
    (
        "343_bubbler",
        &[("North Central", 3.2), ("Northern New England", 2.3)],
    ),
    (
        "343_water fountain",
        &[("The South", 1.2), ("Greater New York City", 0.9)],
    ),
    (
        "305_lightning bug",
        &[("The South", 2.1), ("Midland", 1.3), ("North Central", 0.8)],
    ),
    (
        "305_firefly",
        &[("The West", 1.1), ("Northern New England", 0.9)],
    ),
    ("319_freeway", &[("The West", 2.3)]),
    ("319_highway", &[("Midland", 1.1), ("The South", 0.9)]),
    ("350_devil's night", &[("North Central", 2.2)]),
    (
        "350_mischief night",
        &[("The North", 2.0), ("Greater New York City", 1.2)],
    ),
    ("316_kitty-corner", &[("North Central", 1.2), ("The West", 0.9)]),
    ("316_catercorner", &[("North Central", 1.1), ("The West", 0.9)]),
    ("302_neutral ground", &[("The South", 2.5)]),
];

/// A static table of feature contributions to each region.
///
/// The regions are kept in the order they are declared. This order breaks ties
/// between equal scores: the first region declared wins.
#[derive(PartialEq, Debug, Clone)]
pub struct WeightTable {
    regions: Vec<String>,
    // For each feature key, the contributions in declaration order.
    weights: HashMap<String, Vec<(usize, f64)>>,
    smoothing: f64,
}

impl WeightTable {
    pub fn new(
        regions: &[String],
        weights: &[(String, Vec<(String, f64)>)],
        smoothing: f64,
    ) -> Result<WeightTable, DialectError> {
        if regions.is_empty() {
            return Err(DialectError::EmptyRegionSet);
        }
        // Keeps every score positive, so the confidence stays a share of a positive total.
        if !(smoothing.is_finite() && smoothing > 0.0) {
            return Err(DialectError::InvalidSmoothing(smoothing.to_string()));
        }
        let region_ids: HashMap<&String, usize> = regions
            .iter()
            .enumerate()
            .map(|(idx, r)| (r, idx))
            .collect();
        let mut table: HashMap<String, Vec<(usize, f64)>> = HashMap::new();
        for (feature, contribs) in weights.iter() {
            let entry = table.entry(feature.clone()).or_default();
            for (region, w) in contribs.iter() {
                let rid = region_ids
                    .get(region)
                    .ok_or_else(|| DialectError::UnknownRegion {
                        feature: feature.clone(),
                        region: region.clone(),
                    })?;
                if !(w.is_finite() && *w >= 0.0) {
                    return Err(DialectError::InvalidWeight {
                        feature: feature.clone(),
                        region: region.clone(),
                        weight: w.to_string(),
                    });
                }
                entry.push((*rid, *w));
            }
        }
        debug!(
            "WeightTable::new: {} regions, {} weighted features",
            regions.len(),
            table.len()
        );
        Ok(WeightTable {
            regions: regions.to_vec(),
            weights: table,
            smoothing,
        })
    }

    /// The demonstration table shipped with the quiz.
    pub fn default_model() -> WeightTable {
        let mut weights: HashMap<String, Vec<(usize, f64)>> = HashMap::new();
        for (feature, contribs) in DEFAULT_WEIGHTS.iter() {
            let v = contribs
                .iter()
                .filter_map(|(region, w)| {
                    DEFAULT_REGIONS
                        .iter()
                        .position(|r| r == region)
                        .map(|rid| (rid, *w))
                })
                .collect();
            weights.insert(feature.to_string(), v);
        }
        WeightTable {
            regions: DEFAULT_REGIONS.iter().map(|s| s.to_string()).collect(),
            weights,
            smoothing: DEFAULT_SMOOTHING,
        }
    }

    pub fn regions(&self) -> &[String] {
        &self.regions
    }

    pub fn smoothing(&self) -> f64 {
        self.smoothing
    }

    pub fn num_weighted_features(&self) -> usize {
        self.weights.len()
    }
}

impl RegionClassifier for WeightTable {
    fn score(&self, space: &FeatureSpace, vector: &FeatureVector) -> Prediction {
        let mut acc: Vec<f64> = vec![0.0; self.regions.len()];
        for pos in vector.active() {
            let feature = match space.features().get(pos) {
                Some(f) => f,
                None => continue,
            };
            if let Some(contribs) = self.weights.get(&feature.key()) {
                debug!("score: feature {:?} -> {:?}", feature.key(), contribs);
                for (rid, w) in contribs.iter() {
                    acc[*rid] += w;
                }
            }
        }
        for s in acc.iter_mut() {
            *s += self.smoothing;
        }

        // Strict comparison: the first region wins ties.
        let mut best: usize = 0;
        for (idx, s) in acc.iter().enumerate() {
            if *s > acc[best] {
                best = idx;
            }
        }
        // Positive smoothing makes the total positive.
        let total: f64 = acc.iter().sum();
        let confidence = acc[best] / total * 100.0;
        let region = self.regions[best].clone();
        info!("score: predicted {} ({:.1}%)", region, confidence);
        Prediction {
            region,
            confidence,
            scores: self.regions.iter().cloned().zip(acc).collect(),
        }
    }
}
