//! Response validation: the one place AI output is parsed and repaired.
//!
//! Only an unparseable payload is rejected. Everything else is coerced into
//! the canonical shape: scores are clamped, unknown decisions fall to
//! `no_match`, scalars become singleton lists, missing fields become empty.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::analysis::models::{AnalysisSource, Decision, MatchAnalysis, MAX_LIST_ITEMS};
use crate::llm_client::ScoringError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("response is not valid JSON")]
    NotJson,

    #[error("response JSON is not an object")]
    NotAnObject,

    #[error("match_score is not numeric: {0}")]
    ScoreNotNumeric(String),
}

impl ValidationFailure {
    pub fn reason(&self) -> &'static str {
        match self {
            ValidationFailure::NotJson => "not_json",
            ValidationFailure::NotAnObject => "not_an_object",
            ValidationFailure::ScoreNotNumeric(_) => "score_not_numeric",
        }
    }
}

/// What came back from the AI path, classified once.
#[derive(Debug)]
pub enum AiOutcome {
    /// Configured, answered, and the answer validated.
    Valid(MatchAnalysis),
    /// Configured and answered, but the answer could not be used.
    Malformed {
        failure: ValidationFailure,
        raw: String,
    },
    /// No credential or model: the AI path was never attempted.
    NotConfigured,
    /// Configured, but the call itself failed or timed out.
    ProviderFailed(ScoringError),
}

impl AiOutcome {
    pub fn class(&self) -> &'static str {
        match self {
            AiOutcome::Valid(_) => "configured_and_valid",
            AiOutcome::Malformed { .. } => "configured_but_malformed",
            AiOutcome::NotConfigured => "not_configured",
            AiOutcome::ProviderFailed(_) => "provider_failed",
        }
    }
}

/// Classifies a scoring-client result into an `AiOutcome`.
pub fn assess(response: Result<String, ScoringError>) -> AiOutcome {
    match response {
        Err(ScoringError::NotConfigured) => AiOutcome::NotConfigured,
        Err(e) => AiOutcome::ProviderFailed(e),
        Ok(raw) => match validate_response(&raw) {
            Ok(analysis) => AiOutcome::Valid(analysis),
            Err(failure) => AiOutcome::Malformed { failure, raw },
        },
    }
}

/// Parses and repairs a raw AI payload into a bounded `MatchAnalysis`.
pub fn validate_response(raw: &str) -> Result<MatchAnalysis, ValidationFailure> {
    let body = strip_json_fences(raw);
    let value: Value = serde_json::from_str(body).map_err(|_| ValidationFailure::NotJson)?;
    let object = value.as_object().ok_or(ValidationFailure::NotAnObject)?;

    let match_score = coerce_score(field(object, &["match_score", "score"]))?;

    let decision = field(object, &["decision"])
        .and_then(Value::as_str)
        .map(Decision::parse_lenient)
        .unwrap_or_default();

    let summary = field(object, &["summary"])
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let analysis = MatchAnalysis {
        match_score,
        decision,
        summary,
        strengths: coerce_list(field(object, &["strengths"])),
        gaps: coerce_list(field(object, &["gaps", "risks"])),
        recommendations: coerce_list(field(object, &["recommendations", "suggested_questions"])),
        source: AnalysisSource::Ai,
        raw_response: Some(raw.to_string()),
        fallback_reason: None,
    };

    Ok(analysis.bounded())
}

/// Strips a ```` ```json ```` or bare ```` ``` ```` wrapper from model output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };

    // Skip the info string ("json", "JSON", ...) on the opening fence.
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };

    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// First non-null value among the accepted names for a field.
fn field<'a>(object: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| object.get(*name))
        .find(|value| !value.is_null())
}

fn coerce_score(value: Option<&Value>) -> Result<u8, ValidationFailure> {
    let Some(value) = value else {
        return Ok(0);
    };

    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    };

    match number {
        Some(n) if n.is_finite() => Ok(n.round().clamp(0.0, 100.0) as u8),
        _ => Err(ValidationFailure::ScoreNotNumeric(value.to_string())),
    }
}

fn coerce_list(value: Option<&Value>) -> Vec<String> {
    match value {
        None => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(scalar_text)
            .filter(|item| !item.is_empty())
            .take(MAX_LIST_ITEMS)
            .collect(),
        Some(other) => scalar_text(other)
            .filter(|item| !item.is_empty())
            .into_iter()
            .collect(),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validate(value: Value) -> MatchAnalysis {
        validate_response(&value.to_string()).unwrap()
    }

    #[test]
    fn test_well_formed_response_passes_through() {
        let analysis = validate(json!({
            "match_score": 78,
            "decision": "match",
            "summary": "Solid backend profile.",
            "strengths": ["Python", "Django"],
            "gaps": ["No Kubernetes"],
            "recommendations": ["Ask about on-call experience"]
        }));
        assert_eq!(analysis.match_score, 78);
        assert_eq!(analysis.decision, Decision::Match);
        assert_eq!(analysis.summary, "Solid backend profile.");
        assert_eq!(analysis.strengths, vec!["Python", "Django"]);
        assert_eq!(analysis.gaps, vec!["No Kubernetes"]);
        assert_eq!(analysis.recommendations.len(), 1);
        assert_eq!(analysis.source, AnalysisSource::Ai);
        assert!(analysis.raw_response.is_some());
        assert!(analysis.fallback_reason.is_none());
    }

    #[test]
    fn test_score_above_range_is_clamped() {
        assert_eq!(validate(json!({"match_score": 150})).match_score, 100);
        assert_eq!(validate(json!({"match_score": 1e12})).match_score, 100);
    }

    #[test]
    fn test_score_below_range_is_clamped() {
        assert_eq!(validate(json!({"match_score": -20})).match_score, 0);
    }

    #[test]
    fn test_score_coercions() {
        assert_eq!(validate(json!({"match_score": 72.6})).match_score, 73);
        assert_eq!(validate(json!({"match_score": " 85 "})).match_score, 85);
        assert_eq!(validate(json!({"match_score": "64%"})).match_score, 64);
        assert_eq!(validate(json!({"score": 41})).match_score, 41);
    }

    #[test]
    fn test_missing_score_defaults_to_zero() {
        assert_eq!(validate(json!({"summary": "no score"})).match_score, 0);
        assert_eq!(validate(json!({"match_score": null})).match_score, 0);
    }

    #[test]
    fn test_non_numeric_score_is_rejected() {
        let err = validate_response(r#"{"match_score": "high"}"#).unwrap_err();
        assert_eq!(err.reason(), "score_not_numeric");
        let err = validate_response(r#"{"match_score": true}"#).unwrap_err();
        assert!(matches!(err, ValidationFailure::ScoreNotNumeric(_)));
    }

    #[test]
    fn test_unknown_decision_defaults_to_no_match() {
        let analysis = validate(json!({"match_score": 90, "decision": "definitely"}));
        assert_eq!(analysis.decision, Decision::NoMatch);
        assert_eq!(analysis.match_score, 90);
    }

    #[test]
    fn test_decision_spelling_variants_are_repaired() {
        assert_eq!(
            validate(json!({"decision": "Strong Match"})).decision,
            Decision::StrongMatch
        );
        assert_eq!(validate(json!({"decision": 3})).decision, Decision::NoMatch);
        assert_eq!(validate(json!({})).decision, Decision::NoMatch);
    }

    #[test]
    fn test_scalar_lists_become_singletons() {
        let analysis = validate(json!({
            "strengths": "Strong Python background",
            "gaps": 42,
            "recommendations": ""
        }));
        assert_eq!(analysis.strengths, vec!["Strong Python background"]);
        assert_eq!(analysis.gaps, vec!["42"]);
        assert!(analysis.recommendations.is_empty());
    }

    #[test]
    fn test_lists_are_truncated_and_cleaned() {
        let many: Vec<String> = (0..20).map(|i| format!("point {i}")).collect();
        let analysis = validate(json!({
            "strengths": many,
            "gaps": ["  ", {"nested": true}, null, "real gap"]
        }));
        assert_eq!(analysis.strengths.len(), MAX_LIST_ITEMS);
        assert_eq!(analysis.strengths[0], "point 0");
        assert_eq!(analysis.gaps, vec!["real gap"]);
    }

    #[test]
    fn test_legacy_field_names_are_accepted() {
        let analysis = validate(json!({
            "score": 55,
            "risks": ["Limited cloud exposure"],
            "suggested_questions": ["Which cloud providers have you used?"]
        }));
        assert_eq!(analysis.match_score, 55);
        assert_eq!(analysis.gaps, vec!["Limited cloud exposure"]);
        assert_eq!(analysis.recommendations.len(), 1);
    }

    #[test]
    fn test_missing_fields_are_empty_defaults() {
        let analysis = validate(json!({}));
        assert_eq!(analysis.match_score, 0);
        assert_eq!(analysis.summary, "");
        assert!(analysis.strengths.is_empty());
        assert!(analysis.gaps.is_empty());
        assert!(analysis.recommendations.is_empty());
    }

    #[test]
    fn test_fenced_json_is_accepted() {
        let raw = "```json\n{\"match_score\": 66, \"decision\": \"match\"}\n```";
        let analysis = validate_response(raw).unwrap();
        assert_eq!(analysis.match_score, 66);
        assert_eq!(analysis.raw_response.as_deref(), Some(raw));
    }

    #[test]
    fn test_prose_is_not_json() {
        let err = validate_response("The candidate looks like a great fit!").unwrap_err();
        assert_eq!(err, ValidationFailure::NotJson);
    }

    #[test]
    fn test_json_array_is_not_an_object() {
        let err = validate_response("[1, 2, 3]").unwrap_err();
        assert_eq!(err, ValidationFailure::NotAnObject);
    }

    #[test]
    fn test_strip_json_fences_variants() {
        assert_eq!(strip_json_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_json_fences("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_json_fences("```JSON {\"a\": 1}```"), "{\"a\": 1}");
        assert_eq!(strip_json_fences("  {\"a\": 1}  "), "{\"a\": 1}");
        assert_eq!(strip_json_fences("```json\n{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn test_assess_classifies_every_outcome() {
        assert_eq!(assess(Err(ScoringError::NotConfigured)).class(), "not_configured");
        assert_eq!(
            assess(Err(ScoringError::EmptyContent)).class(),
            "provider_failed"
        );
        assert_eq!(
            assess(Ok("not json".to_string())).class(),
            "configured_but_malformed"
        );
        assert_eq!(
            assess(Ok(r#"{"match_score": 10}"#.to_string())).class(),
            "configured_and_valid"
        );
    }

    #[test]
    fn test_any_claimed_score_stays_in_bounds() {
        for claimed in ["-1e9", "-1", "0", "37", "100", "101", "9999", "3.5e2", "\"250\""] {
            let raw = format!(r#"{{"match_score": {claimed}}}"#);
            let analysis = validate_response(&raw).unwrap();
            assert!(analysis.match_score <= 100, "{claimed} escaped the bound");
        }
    }
}
