//! Canonical analysis schema (versioned).
//!
//! Provider output is conformed to this key set: unknown keys are dropped, scores clamped to
//! 0..=100. Missing keys are reported but tolerated, since providers often omit some fields.

use crate::domain::{AnalysisResult, Metric};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

pub const SCHEMA_VERSION: u32 = 2;

pub const SCORE_MIN: f64 = 0.0;
pub const SCORE_MAX: f64 = 100.0;

/// Free-text fields with the guidance embedded in the prompt.
pub const DESCRIPTIVE_FIELDS: &[(&str, &str)] = &[
    (
        "personality_summary_sender",
        "Analysis of the first participant's personality based on their messages",
    ),
    (
        "personality_summary_receiver",
        "Analysis of the second participant's personality based on their messages",
    ),
    (
        "togetherness_outlook",
        "How well they complement each other and their relationship dynamics",
    ),
    (
        "communication_style_description",
        "Their communication patterns and styles",
    ),
    (
        "emotional_depth_description",
        "The emotional depth and connection in their conversations",
    ),
    (
        "intellectual_connection_description",
        "Their intellectual rapport and shared interests",
    ),
    (
        "relationship_growth_potential",
        "The relationship's potential for growth and development",
    ),
    (
        "long_term_stability_prediction",
        "The relationship's long-term stability and sustainability",
    ),
    (
        "dependency_balance_description",
        "Their level of interdependence and individual autonomy",
    ),
    (
        "friendship_layer_strength",
        "Their friendship foundation and shared experiences",
    ),
];

/// Parameter categories over the top-level scores.
pub const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "emotional",
        &[
            "emotional_intimacy",
            "emotional_vulnerability",
            "emotional_balance",
            "romantic_affection",
            "emotional_mirroring",
            "expressions_of_missing_or_longing",
            "feeling_of_home",
            "emotional_dependency",
            "empathy_signals",
        ],
    ),
    (
        "trust",
        &[
            "trust_level",
            "sense_of_security",
            "disclosure_depth",
            "willingness_to_reconcile",
            "respect_level",
        ],
    ),
    (
        "communication",
        &[
            "tone_consistency",
            "love_language_alignment",
            "nickname_frequency",
            "inside_jokes_present",
            "long_message_ratio",
            "response_speed",
            "frequency_of_check_ins",
        ],
    ),
    (
        "commitment",
        &[
            "future_commitment_signals",
            "imagining_shared_future",
            "planning_together",
            "sacrifices_mentioned",
        ],
    ),
    (
        "care",
        &[
            "mutual_care",
            "consistency_in_attention",
            "care_in_small_details",
            "message_prioritization",
            "expressed_needs",
            "attention_to_mood_swings",
        ],
    ),
    (
        "interaction",
        &[
            "effort_reciprocity",
            "playfulness",
            "conflict_handling",
            "daydreaming_references",
        ],
    ),
];

/// Nested score groups: `(group key, member keys)`.
pub const SCORE_GROUPS: &[(&str, &[&str])] =
    &[("emotion_scores", &["positive", "negative", "neutral"])];

/// All top-level scalar score keys, in category order.
pub fn score_keys() -> impl Iterator<Item = &'static str> {
    CATEGORIES.iter().flat_map(|(_, keys)| keys.iter().copied())
}

fn is_score_key(key: &str) -> bool {
    score_keys().any(|k| k == key)
}

fn group_members(key: &str) -> Option<&'static [&'static str]> {
    SCORE_GROUPS
        .iter()
        .find(|(group, _)| *group == key)
        .map(|(_, members)| *members)
}

/// JSON template shown to providers: every key with its expected value description.
pub fn prompt_template() -> Value {
    let descriptive: Map<String, Value> = DESCRIPTIVE_FIELDS
        .iter()
        .map(|(key, hint)| (key.to_string(), Value::String(hint.to_string())))
        .collect();

    let mut quantitative: Map<String, Value> = score_keys()
        .map(|key| (key.to_string(), Value::String("number (0-100)".to_string())))
        .collect();
    for (group, members) in SCORE_GROUPS {
        let nested: Map<String, Value> = members
            .iter()
            .map(|m| (m.to_string(), Value::String("number (0-100)".to_string())))
            .collect();
        quantitative.insert(group.to_string(), Value::Object(nested));
    }

    json!({
        "descriptive": descriptive,
        "quantitative": quantitative,
    })
}

/// Drop keys outside the schema and clamp scores. Returns the conformed result.
pub fn conform(mut result: AnalysisResult) -> AnalysisResult {
    result.descriptive.retain(|key, _| {
        let known = DESCRIPTIVE_FIELDS.iter().any(|(k, _)| *k == key.as_str());
        if !known {
            warn!(key = %key, "dropping unknown descriptive field");
        }
        known
    });

    result.quantitative.retain(|key, metric| match metric {
        Metric::Score(v) if !v.is_finite() => {
            warn!(key = %key, "dropping non-finite score");
            false
        }
        Metric::Score(_) if is_score_key(key) => true,
        Metric::Group(group) => match group_members(key) {
            Some(members) => {
                group.retain(|member, m| {
                    matches!(m, Metric::Score(v) if v.is_finite())
                        && members.contains(&member.as_str())
                });
                true
            }
            None => {
                warn!(key = %key, "dropping unknown score group");
                false
            }
        },
        Metric::Score(_) => {
            warn!(key = %key, "dropping unknown score");
            false
        }
    });

    for metric in result.quantitative.values_mut() {
        clamp(metric);
    }

    let missing = DESCRIPTIVE_FIELDS
        .iter()
        .filter(|(k, _)| !result.descriptive.contains_key(*k))
        .count()
        + score_keys()
            .filter(|k| !result.quantitative.contains_key(*k))
            .count();
    if missing > 0 {
        debug!(missing, "analysis omits schema fields");
    }

    result
}

fn clamp(metric: &mut Metric) {
    match metric {
        Metric::Score(v) => {
            if !(SCORE_MIN..=SCORE_MAX).contains(v) {
                warn!(value = *v, "clamping out-of-range score");
                *v = v.clamp(SCORE_MIN, SCORE_MAX);
            }
        }
        Metric::Group(group) => group.values_mut().for_each(clamp),
    }
}
