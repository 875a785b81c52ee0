//! Canonical match-analysis types shared by every scorer backend.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::analysis::normalizer::truncate_chars;

/// Max entries kept in each of strengths / gaps / recommendations.
pub const MAX_LIST_ITEMS: usize = 8;
/// Max characters kept per list entry.
pub const MAX_ITEM_CHARS: usize = 300;
pub const MAX_SUMMARY_CHARS: usize = 1000;
pub const MAX_RAW_RESPONSE_CHARS: usize = 8000;

/// Coarse fit judgment. Ordered from most to least confident.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    StrongMatch,
    Match,
    WeakMatch,
    #[default]
    NoMatch,
}

impl Decision {
    pub const ALL: [Decision; 4] = [
        Decision::StrongMatch,
        Decision::Match,
        Decision::WeakMatch,
        Decision::NoMatch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::StrongMatch => "strong_match",
            Decision::Match => "match",
            Decision::WeakMatch => "weak_match",
            Decision::NoMatch => "no_match",
        }
    }

    /// Score bands: ≥80 strong, ≥60 match, ≥40 weak, otherwise no match.
    pub fn from_score(score: u8) -> Self {
        match score {
            80..=u8::MAX => Decision::StrongMatch,
            60..=79 => Decision::Match,
            40..=59 => Decision::WeakMatch,
            _ => Decision::NoMatch,
        }
    }

    /// Accepts case, space and hyphen variants of the four values
    /// ("Strong Match", "strong-match", "STRONGMATCH"). Anything else is `NoMatch`.
    pub fn parse_lenient(raw: &str) -> Self {
        let squashed: String = raw
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();

        Decision::ALL
            .into_iter()
            .find(|d| d.as_str().replace('_', "") == squashed)
            .unwrap_or(Decision::NoMatch)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which scorer produced an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSource {
    Ai,
    Heuristic,
}

impl AnalysisSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisSource::Ai => "ai",
            AnalysisSource::Heuristic => "heuristic",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ai" => Some(AnalysisSource::Ai),
            "heuristic" => Some(AnalysisSource::Heuristic),
            _ => None,
        }
    }
}

/// Why a heuristic result was produced instead of an AI one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    AiNotConfigured,
    ProviderError,
    ProviderTimeout,
    InvalidResponse,
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackReason::AiNotConfigured => "ai_not_configured",
            FallbackReason::ProviderError => "provider_error",
            FallbackReason::ProviderTimeout => "provider_timeout",
            FallbackReason::InvalidResponse => "invalid_response",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ai_not_configured" => Some(FallbackReason::AiNotConfigured),
            "provider_error" => Some(FallbackReason::ProviderError),
            "provider_timeout" => Some(FallbackReason::ProviderTimeout),
            "invalid_response" => Some(FallbackReason::InvalidResponse),
            _ => None,
        }
    }
}

/// One assessment of a CV against a vacancy, from either scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchAnalysis {
    pub match_score: u8,
    pub decision: Decision,
    pub summary: String,
    pub strengths: Vec<String>,
    pub gaps: Vec<String>,
    pub recommendations: Vec<String>,
    pub source: AnalysisSource,
    /// Debug copy of the provider payload. Never read back as data.
    pub raw_response: Option<String>,
    pub fallback_reason: Option<FallbackReason>,
}

impl MatchAnalysis {
    /// Enforces every size and range bound on the record.
    ///
    /// Both scorers already produce bounded output; this runs once more right
    /// before persistence so no path can store an out-of-range row.
    pub fn bounded(mut self) -> Self {
        self.match_score = self.match_score.min(100);
        self.summary = truncate_chars(self.summary.trim(), MAX_SUMMARY_CHARS).to_string();
        for list in [
            &mut self.strengths,
            &mut self.gaps,
            &mut self.recommendations,
        ] {
            bound_list(list);
        }
        self.raw_response = self
            .raw_response
            .map(|raw| truncate_chars(&raw, MAX_RAW_RESPONSE_CHARS).to_string());
        self
    }
}

fn bound_list(items: &mut Vec<String>) {
    let bounded: Vec<String> = items
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .take(MAX_LIST_ITEMS)
        .map(|item| truncate_chars(item, MAX_ITEM_CHARS).to_string())
        .collect();
    *items = bounded;
}
