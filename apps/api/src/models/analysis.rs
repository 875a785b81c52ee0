use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::analysis::models::{AnalysisSource, Decision, FallbackReason, MatchAnalysis};

/// A persisted analysis. Rows are appended, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAnalysis {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub vacancy_id: Uuid,
    pub application_id: Option<Uuid>,
    /// 1-based count of analyses for this candidate/vacancy pair at insert time.
    pub attempt: i32,
    #[serde(flatten)]
    pub analysis: MatchAnalysis,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct MatchAnalysisRow {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub vacancy_id: Uuid,
    pub application_id: Option<Uuid>,
    pub attempt: i32,
    pub match_score: i16,
    pub decision: String,
    pub summary: String,
    pub strengths: Vec<String>,
    pub gaps: Vec<String>,
    pub recommendations: Vec<String>,
    pub source: String,
    pub raw_response: Option<String>,
    pub fallback_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl MatchAnalysisRow {
    /// Maps the text columns back onto their enums. The table's CHECK
    /// constraints make a mismatch a schema drift, reported as an error.
    pub fn into_stored(self) -> Result<StoredAnalysis> {
        let decision = Decision::ALL
            .into_iter()
            .find(|d| d.as_str() == self.decision)
            .ok_or_else(|| anyhow!("row {} has unknown decision '{}'", self.id, self.decision))?;
        let source = AnalysisSource::parse(&self.source)
            .ok_or_else(|| anyhow!("row {} has unknown source '{}'", self.id, self.source))?;
        let fallback_reason = match self.fallback_reason.as_deref() {
            None => None,
            Some(raw) => Some(
                FallbackReason::parse(raw)
                    .ok_or_else(|| anyhow!("row {} has unknown fallback reason '{raw}'", self.id))?,
            ),
        };
        let match_score = u8::try_from(self.match_score.clamp(0, 100))?;

        Ok(StoredAnalysis {
            id: self.id,
            candidate_id: self.candidate_id,
            vacancy_id: self.vacancy_id,
            application_id: self.application_id,
            attempt: self.attempt,
            analysis: MatchAnalysis {
                match_score,
                decision,
                summary: self.summary,
                strengths: self.strengths,
                gaps: self.gaps,
                recommendations: self.recommendations,
                source,
                raw_response: self.raw_response,
                fallback_reason,
            },
            created_at: self.created_at,
        })
    }
}
