//! Heuristic fallback: deterministic keyword-overlap scoring, no AI involved.
//!
//! Algorithm:
//! 1. Lowercase both texts and split them into alphanumeric words.
//! 2. Keep words longer than 4 characters (drops most stop words).
//! 3. match_score = round(100 × |cv ∩ vacancy| / max(1, |vacancy|))
//!
//! Same inputs, same output: no randomness, no external state.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::analysis::models::{AnalysisSource, Decision, MatchAnalysis, MAX_LIST_ITEMS};

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{N}]+").expect("static regex"));

/// Words of this length or shorter are ignored.
const SHORT_WORD_CHARS: usize = 4;

/// The fallback seam used by the match analyzer.
pub trait FallbackScorer: Send + Sync {
    fn score(&self, cv_text: &str, vacancy_text: &str) -> MatchAnalysis;
}

/// Keyword-overlap scorer. The default and only fallback backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordOverlapScorer;

impl FallbackScorer for KeywordOverlapScorer {
    fn score(&self, cv_text: &str, vacancy_text: &str) -> MatchAnalysis {
        compute_keyword_overlap(cv_text, vacancy_text)
    }
}

/// Distinct lowercase words longer than 4 characters, sorted.
pub fn keywords(text: &str) -> BTreeSet<String> {
    let lowered = text.to_lowercase();
    WORD.find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|word| word.chars().count() > SHORT_WORD_CHARS)
        .map(String::from)
        .collect()
}

fn compute_keyword_overlap(cv_text: &str, vacancy_text: &str) -> MatchAnalysis {
    let cv_words = keywords(cv_text);
    let vacancy_words = keywords(vacancy_text);

    let matched: Vec<&str> = vacancy_words
        .intersection(&cv_words)
        .map(String::as_str)
        .collect();
    let missing: Vec<&str> = vacancy_words
        .difference(&cv_words)
        .map(String::as_str)
        .collect();

    let match_score = overlap_score(matched.len(), vacancy_words.len());

    MatchAnalysis {
        match_score,
        decision: Decision::from_score(match_score),
        summary: format!(
            "Automatic keyword estimate without AI: {} of {} vacancy keywords appear in the CV.",
            matched.len(),
            vacancy_words.len()
        ),
        strengths: matched
            .iter()
            .take(MAX_LIST_ITEMS)
            .map(|word| format!("CV mentions \"{word}\""))
            .collect(),
        gaps: missing
            .iter()
            .take(MAX_LIST_ITEMS)
            .map(|word| format!("No mention of \"{word}\" in the CV"))
            .collect(),
        recommendations: build_recommendations(match_score, &missing),
        source: AnalysisSource::Heuristic,
        raw_response: None,
        fallback_reason: None,
    }
}

fn overlap_score(matched: usize, vacancy_total: usize) -> u8 {
    let ratio = matched as f64 / vacancy_total.max(1) as f64;
    (ratio * 100.0).round().clamp(0.0, 100.0) as u8
}

fn build_recommendations(score: u8, missing: &[&str]) -> Vec<String> {
    let mut recommendations =
        vec!["Review this estimate manually; it only compares keywords.".to_string()];

    if !missing.is_empty() {
        let top: Vec<&str> = missing.iter().take(3).copied().collect();
        recommendations.push(format!(
            "Ask the candidate about experience with: {}.",
            top.join(", ")
        ));
    }

    let next_step = match Decision::from_score(score) {
        Decision::StrongMatch | Decision::Match => {
            "Invite the candidate for an intake conversation to confirm the fit."
        }
        Decision::WeakMatch => {
            "Check whether the missing requirements are must-haves before proceeding."
        }
        Decision::NoMatch => "Consider whether another vacancy fits this candidate better.",
    };
    recommendations.push(next_step.to_string());

    recommendations
}
