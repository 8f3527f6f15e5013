//! Analysis result model and the aggregation policy.
//!
//! Qualitative (descriptive) fields are concatenated in input order, quantitative fields are
//! averaged. Applied both across chunks of one file and across files of one batch.

use crate::domain::DomainError;
use crate::domain::schema::CATEGORIES;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// A numeric score or a nested group of scores (e.g. `emotion_scores`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Metric {
    Score(f64),
    Group(BTreeMap<String, Metric>),
}

impl Metric {
    pub fn as_score(&self) -> Option<f64> {
        match self {
            Metric::Score(v) => Some(*v),
            Metric::Group(_) => None,
        }
    }
}

/// Qualitative + quantitative verdict for a chunk, a file or a whole batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default)]
    pub descriptive: BTreeMap<String, String>,
    #[serde(default)]
    pub quantitative: BTreeMap<String, Metric>,
}

impl AnalysisResult {
    pub fn is_empty(&self) -> bool {
        self.descriptive.is_empty() && self.quantitative.is_empty()
    }

    /// Top-level score by key.
    pub fn score(&self, key: &str) -> Option<f64> {
        self.quantitative.get(key).and_then(Metric::as_score)
    }

    /// Rounded mean per parameter category, over the keys present. Empty categories are omitted.
    pub fn category_scores(&self) -> BTreeMap<String, u32> {
        let mut out = BTreeMap::new();
        for (category, keys) in CATEGORIES {
            let scores: Vec<f64> = keys.iter().filter_map(|k| self.score(k)).collect();
            if scores.is_empty() {
                continue;
            }
            let mean = scores.iter().sum::<f64>() / scores.len() as f64;
            out.insert((*category).to_string(), mean.round().max(0.0) as u32);
        }
        out
    }
}

/// Combine ordered analyses into one.
///
/// Each descriptive key joins the non-empty values that carry it, in order, with a single space.
/// Each quantitative key (recursively, for groups) is the mean over the analyses that carry it.
/// Keys absent everywhere stay absent: callers read absence as "unknown", never as zero.
pub fn aggregate(analyses: &[AnalysisResult]) -> Result<AnalysisResult, DomainError> {
    if analyses.is_empty() {
        return Err(DomainError::NoAnalyses);
    }
    if analyses.len() == 1 {
        return Ok(analyses[0].clone());
    }

    let mut descriptive: BTreeMap<String, Vec<&str>> = BTreeMap::new();
    for analysis in analyses {
        for (key, value) in &analysis.descriptive {
            let parts = descriptive.entry(key.clone()).or_default();
            let value = value.trim();
            if !value.is_empty() {
                parts.push(value);
            }
        }
    }

    let groups: Vec<&BTreeMap<String, Metric>> = analyses.iter().map(|a| &a.quantitative).collect();

    Ok(AnalysisResult {
        descriptive: descriptive
            .into_iter()
            .map(|(key, parts)| (key, parts.join(" ")))
            .collect(),
        quantitative: mean_of(&groups),
    })
}

fn mean_of(groups: &[&BTreeMap<String, Metric>]) -> BTreeMap<String, Metric> {
    let mut keys: Vec<&String> = groups.iter().flat_map(|g| g.keys()).collect();
    keys.sort();
    keys.dedup();

    let mut out = BTreeMap::new();
    for key in keys {
        let values: Vec<&Metric> = groups.iter().filter_map(|g| g.get(key)).collect();
        // The first occurrence decides whether the key is a score or a group.
        match values[0] {
            Metric::Score(_) => {
                let scores: Vec<f64> = values.iter().filter_map(|m| m.as_score()).collect();
                if scores.len() < values.len() {
                    warn!(key = %key, "ignoring nested group where a score was expected");
                }
                let finite: Vec<f64> = scores.into_iter().filter(|v| v.is_finite()).collect();
                if finite.is_empty() {
                    warn!(key = %key, "no finite scores to average");
                    continue;
                }
                let mean = finite.iter().sum::<f64>() / finite.len() as f64;
                out.insert(key.clone(), Metric::Score(mean));
            }
            Metric::Group(_) => {
                let nested: Vec<&BTreeMap<String, Metric>> = values
                    .iter()
                    .filter_map(|m| match m {
                        Metric::Group(g) => Some(g),
                        Metric::Score(_) => None,
                    })
                    .collect();
                if nested.len() < values.len() {
                    warn!(key = %key, "ignoring score where a nested group was expected");
                }
                out.insert(key.clone(), Metric::Group(mean_of(&nested)));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quant(pairs: &[(&str, f64)]) -> AnalysisResult {
        AnalysisResult {
            descriptive: BTreeMap::new(),
            quantitative: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), Metric::Score(*v)))
                .collect(),
        }
    }

    fn desc(pairs: &[(&str, &str)]) -> AnalysisResult {
        AnalysisResult {
            descriptive: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            quantitative: BTreeMap::new(),
        }
    }

    #[test]
    fn test_aggregate_empty_fails() {
        assert!(matches!(aggregate(&[]), Err(DomainError::NoAnalyses)));
    }

    #[test]
    fn test_aggregate_averages_scores() {
        let out = aggregate(&[quant(&[("x", 80.0)]), quant(&[("x", 60.0)])]).unwrap();
        assert_eq!(out.score("x"), Some(70.0));
    }

    #[test]
    fn test_aggregate_skips_non_finite_scores() {
        let out = aggregate(&[
            quant(&[("x", f64::NAN), ("y", f64::INFINITY)]),
            quant(&[("x", 80.0)]),
        ])
        .unwrap();
        assert_eq!(out.score("x"), Some(80.0));
        assert_eq!(out.score("y"), None);
    }

    #[test]
    fn test_aggregate_joins_strings_in_order() {
        let out = aggregate(&[desc(&[("s", "a")]), desc(&[("s", "b")])]).unwrap();
        assert_eq!(out.descriptive["s"], "a b");
    }

    #[test]
    fn test_aggregate_partial_keys_use_only_carriers() {
        let out = aggregate(&[
            quant(&[("x", 90.0), ("y", 10.0)]),
            quant(&[("x", 70.0)]),
            quant(&[("x", 50.0)]),
        ])
        .unwrap();
        assert_eq!(out.score("x"), Some(70.0));
        assert_eq!(out.score("y"), Some(10.0));
        assert_eq!(out.score("z"), None);
    }

    #[test]
    fn test_aggregate_skips_blank_strings() {
        let out = aggregate(&[
            desc(&[("s", "first"), ("t", "")]),
            desc(&[("s", "  "), ("t", "")]),
            desc(&[("s", "third")]),
        ])
        .unwrap();
        assert_eq!(out.descriptive["s"], "first third");
        assert_eq!(out.descriptive["t"], "");
    }

    #[test]
    fn test_aggregate_nested_groups() {
        let group = |p: f64, n: f64| {
            let mut g = BTreeMap::new();
            g.insert("positive".to_string(), Metric::Score(p));
            g.insert("negative".to_string(), Metric::Score(n));
            let mut q = BTreeMap::new();
            q.insert("emotion_scores".to_string(), Metric::Group(g));
            AnalysisResult {
                descriptive: BTreeMap::new(),
                quantitative: q,
            }
        };
        let out = aggregate(&[group(60.0, 20.0), group(80.0, 40.0)]).unwrap();
        match &out.quantitative["emotion_scores"] {
            Metric::Group(g) => {
                assert_eq!(g["positive"], Metric::Score(70.0));
                assert_eq!(g["negative"], Metric::Score(30.0));
            }
            other => panic!("expected group, got {:?}", other),
        }
    }

    #[test]
    fn test_aggregate_single_is_identity() {
        let one = quant(&[("x", 42.0)]);
        assert_eq!(aggregate(std::slice::from_ref(&one)).unwrap(), one);
    }

    #[test]
    fn test_category_scores_use_present_keys() {
        let result = quant(&[
            ("trust_level", 80.0),
            ("respect_level", 61.0),
            ("playfulness", 50.0),
        ]);
        let cats = result.category_scores();
        assert_eq!(cats["trust"], 71); // 70.5 rounds up
        assert_eq!(cats["interaction"], 50);
        assert!(!cats.contains_key("emotional"));
    }

    #[test]
    fn test_metric_deserializes_untagged() {
        let json = r#"{"descriptive":{},"quantitative":{"a":5,"g":{"b":1.5}}}"#;
        let result: AnalysisResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.score("a"), Some(5.0));
        assert!(matches!(result.quantitative["g"], Metric::Group(_)));
    }
}
