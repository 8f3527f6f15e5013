//! Provider reply parsing and structural validation.
//!
//! LLMs often wrap JSON in markdown code fences or prepend chatter. We strip that, parse,
//! require the `descriptive` and `quantitative` objects, and conform the rest to the schema.

use crate::domain::{AnalysisResult, DomainError, Metric, schema};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Remove code-fence markers (with or without a `json` tag) and stray backticks, then trim.
pub fn strip_code_fences(raw_text: &str) -> String {
    raw_text
        .replace("```json", "")
        .replace("```JSON", "")
        .replace('`', "")
        .trim()
        .to_string()
}

/// Parse a provider reply into a schema-conformed analysis.
///
/// Fails with `DomainError::Parse` (carrying the raw reply) when no JSON object can be read or
/// either required top-level object is missing.
pub fn parse_analysis(raw_text: &str) -> Result<AnalysisResult, DomainError> {
    let value = parse_json_object(raw_text)?;
    let obj = value.as_object().ok_or_else(|| parse_error("reply is not a JSON object", raw_text))?;

    let descriptive = obj
        .get("descriptive")
        .and_then(Value::as_object)
        .ok_or_else(|| parse_error("missing `descriptive` object", raw_text))?;
    let quantitative = obj
        .get("quantitative")
        .and_then(Value::as_object)
        .ok_or_else(|| parse_error("missing `quantitative` object", raw_text))?;

    let result = AnalysisResult {
        descriptive: read_descriptive(descriptive),
        quantitative: read_scores(quantitative),
    };
    debug!(
        descriptive = result.descriptive.len(),
        quantitative = result.quantitative.len(),
        "parsed analysis reply"
    );
    Ok(schema::conform(result))
}

fn parse_json_object(raw_text: &str) -> Result<Value, DomainError> {
    let clean = strip_code_fences(raw_text);
    match serde_json::from_str::<Value>(&clean) {
        Ok(v) => Ok(v),
        Err(first_err) => {
            // Chatter around the object: retry on the outermost braces
            if let (Some(start), Some(end)) = (clean.find('{'), clean.rfind('}')) {
                if start < end {
                    if let Ok(v) = serde_json::from_str::<Value>(&clean[start..=end]) {
                        return Ok(v);
                    }
                }
            }
            warn!(
                error = %first_err,
                json = %clean.chars().take(200).collect::<String>(),
                "JSON parse failed"
            );
            Err(parse_error(&first_err.to_string(), raw_text))
        }
    }
}

fn read_descriptive(obj: &Map<String, Value>) -> BTreeMap<String, String> {
    obj.iter()
        .filter_map(|(key, value)| match value {
            Value::String(s) => Some((key.clone(), s.clone())),
            other => {
                debug!(key = %key, kind = ?other, "ignoring non-string descriptive value");
                None
            }
        })
        .collect()
}

fn read_scores(obj: &Map<String, Value>) -> BTreeMap<String, Metric> {
    obj.iter()
        .filter_map(|(key, value)| read_metric(value).map(|m| (key.clone(), m)))
        .collect()
}

fn read_metric(value: &Value) -> Option<Metric> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()).map(Metric::Score),
        // "85" or "85%" from sloppier models; "NaN"/"inf" parse as f64 but are not scores
        Value::String(s) => s
            .trim()
            .trim_end_matches('%')
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Metric::Score),
        Value::Object(nested) => Some(Metric::Group(read_scores(nested))),
        _ => None,
    }
}

fn parse_error(message: &str, raw_text: &str) -> DomainError {
    DomainError::Parse {
        message: message.to_string(),
        raw: raw_text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BARE: &str = r#"{"descriptive":{},"quantitative":{}}"#;

    #[test]
    fn test_strip_fences_json_tag() {
        let input = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(input), r#"{"a": 1}"#);
    }

    #[test]
    fn test_strip_fences_no_lang() {
        let input = "```\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(input), r#"{"a": 1}"#);
    }

    #[test]
    fn test_fenced_parses_like_bare() {
        let fenced = format!("```json\n{}\n```", BARE);
        assert_eq!(parse_analysis(&fenced).unwrap(), parse_analysis(BARE).unwrap());
    }

    #[test]
    fn test_parse_with_leading_text() {
        let input = format!("Here is the analysis:\n{}", BARE);
        assert!(parse_analysis(&input).is_ok());
    }

    #[test]
    fn test_missing_required_key_is_parse_error() {
        let err = parse_analysis(r#"{"descriptive":{}}"#).unwrap_err();
        match err {
            DomainError::Parse { message, raw } => {
                assert!(message.contains("quantitative"));
                assert_eq!(raw, r#"{"descriptive":{}}"#);
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_not_json_is_parse_error_with_raw() {
        let err = parse_analysis("I cannot help with that.").unwrap_err();
        assert!(matches!(
            err,
            DomainError::Parse { ref raw, .. } if raw == "I cannot help with that."
        ));
    }

    #[test]
    fn test_non_numeric_score_strings_are_ignored() {
        let input = r#"{
            "descriptive": {},
            "quantitative": {"trust_level": "NaN", "playfulness": "inf", "mutual_care": "-Infinity"}
        }"#;
        let result = parse_analysis(input).unwrap();
        assert!(result.quantitative.is_empty());

        let mut other = AnalysisResult::default();
        other.quantitative.insert("trust_level".to_string(), Metric::Score(80.0));
        let merged = crate::domain::aggregate(&[result, other]).unwrap();
        assert_eq!(merged.score("trust_level"), Some(80.0));

        let json = serde_json::to_string(&merged).unwrap();
        assert!(!json.contains("null"));
    }

    #[test]
    fn test_values_read_and_conformed() {
        let input = r#"{
            "descriptive": {"togetherness_outlook": "bright", "relationship_health": 5},
            "quantitative": {
                "trust_level": "85",
                "mutual_care": 120,
                "emotion_scores": {"positive": 70, "negative": 10, "neutral": 20},
                "unknown_metric": 3
            }
        }"#;
        let result = parse_analysis(input).unwrap();
        assert_eq!(result.descriptive["togetherness_outlook"], "bright");
        assert!(!result.descriptive.contains_key("relationship_health"));
        assert_eq!(result.score("trust_level"), Some(85.0));
        assert_eq!(result.score("mutual_care"), Some(100.0));
        assert!(result.quantitative.contains_key("emotion_scores"));
        assert!(!result.quantitative.contains_key("unknown_metric"));
    }
}
