//! Match analysis pipeline: extract → normalize → prompt → AI → validate →
//! (fallback) → persist.
//!
//! Input problems (unsupported file, no text, empty vacancy) are returned
//! before any scorer runs. Every AI-side failure is absorbed here and turns
//! into a heuristic result tagged with a `fallback_reason`; only storage
//! failures escape as server errors.

use std::sync::Arc;

use anyhow::anyhow;
use bytes::Bytes;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analysis::extractor::{classify, DocumentExtractor, ExtractionError};
use crate::analysis::heuristic::FallbackScorer;
use crate::analysis::models::{AnalysisSource, FallbackReason, MatchAnalysis};
use crate::analysis::normalizer::{normalize, truncate_chars};
use crate::analysis::prompt_builder::{build_match_prompt, ResponseLanguage};
use crate::analysis::store::{AnalysisStore, NewAnalysis};
use crate::analysis::validator::{assess, AiOutcome};
use crate::errors::AppError;
use crate::llm_client::{ScoringClient, ScoringError};
use crate::models::analysis::StoredAnalysis;
use crate::models::cv::CvDocument;
use crate::models::vacancy::VacancyText;

const LOG_SNIPPET_CHARS: usize = 200;

/// Where the CV text comes from.
#[derive(Debug, Clone)]
pub enum CvSource {
    /// Text the caller already extracted.
    Text(String),
    /// An uploaded document, extracted on the blocking pool.
    Document {
        bytes: Bytes,
        filename: Option<String>,
        media_type: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub candidate_id: Uuid,
    pub vacancy_id: Uuid,
    pub application_id: Option<Uuid>,
    pub cv: CvSource,
    pub vacancy: VacancyText,
    pub language: ResponseLanguage,
}

/// The single analysis pipeline. Every collaborator is injected.
pub struct MatchAnalyzer {
    extractor: Arc<dyn DocumentExtractor>,
    client: Arc<dyn ScoringClient>,
    fallback: Arc<dyn FallbackScorer>,
    store: Arc<dyn AnalysisStore>,
}

impl MatchAnalyzer {
    pub fn new(
        extractor: Arc<dyn DocumentExtractor>,
        client: Arc<dyn ScoringClient>,
        fallback: Arc<dyn FallbackScorer>,
        store: Arc<dyn AnalysisStore>,
    ) -> Self {
        Self {
            extractor,
            client,
            fallback,
            store,
        }
    }

    pub fn store(&self) -> &dyn AnalysisStore {
        self.store.as_ref()
    }

    /// Extracts and normalizes an uploaded CV.
    pub async fn extract_document(
        &self,
        bytes: Bytes,
        filename: Option<String>,
        media_type: Option<String>,
    ) -> Result<CvDocument, AppError> {
        let kind = classify(filename.as_deref(), media_type.as_deref())?;

        let extractor = Arc::clone(&self.extractor);
        let (name, mime) = (filename.clone(), media_type.clone());
        // Parsing is CPU-bound; keep it off the async executor.
        let raw = tokio::task::spawn_blocking(move || {
            extractor.extract(&bytes, name.as_deref(), mime.as_deref())
        })
        .await
        .map_err(|e| AppError::Internal(anyhow!("spawn_blocking failed in extraction: {e}")))??;

        let extracted_text = non_empty(normalize(&raw))?;
        debug!(
            "Extracted {} characters from {kind} document {:?}",
            extracted_text.chars().count(),
            filename
        );

        Ok(CvDocument {
            char_count: extracted_text.chars().count(),
            filename,
            media_type,
            kind,
            extracted_text,
        })
    }

    async fn extract_cv(&self, source: CvSource) -> Result<String, AppError> {
        match source {
            CvSource::Text(text) => Ok(non_empty(normalize(&text))?),
            CvSource::Document {
                bytes,
                filename,
                media_type,
            } => Ok(self
                .extract_document(bytes, filename, media_type)
                .await?
                .extracted_text),
        }
    }

    /// Scores one CV against one vacancy. Never fails: any AI-side problem
    /// yields a heuristic result carrying the reason.
    ///
    /// `vacancy_text` is the labelled form sent to the model;
    /// `vacancy_keywords` holds the bare field values used by the fallback.
    pub async fn assess_match(
        &self,
        cv_text: &str,
        vacancy_text: &str,
        vacancy_keywords: &str,
        language: ResponseLanguage,
    ) -> MatchAnalysis {
        let prompt = build_match_prompt(cv_text, vacancy_text, language);
        let outcome = assess(self.client.score(&prompt).await);
        debug!("AI outcome: {}", outcome.class());

        let (reason, raw_response) = match outcome {
            AiOutcome::Valid(analysis) => return analysis,
            AiOutcome::NotConfigured => {
                debug!("AI scoring not configured; using keyword fallback");
                (FallbackReason::AiNotConfigured, None)
            }
            AiOutcome::ProviderFailed(error) => {
                warn!("AI provider call failed, using keyword fallback: {error}");
                let reason = match error {
                    ScoringError::Timeout(_) => FallbackReason::ProviderTimeout,
                    _ => FallbackReason::ProviderError,
                };
                (reason, None)
            }
            AiOutcome::Malformed { failure, raw } => {
                warn!(
                    "AI response rejected ({}), using keyword fallback. Response starts: {:?}",
                    failure.reason(),
                    truncate_chars(&raw, LOG_SNIPPET_CHARS)
                );
                (FallbackReason::InvalidResponse, Some(raw))
            }
        };

        MatchAnalysis {
            source: AnalysisSource::Heuristic,
            fallback_reason: Some(reason),
            raw_response,
            ..self.fallback.score(cv_text, vacancy_keywords)
        }
    }

    /// Runs the full pipeline and persists the result as a new row.
    pub async fn analyze(&self, request: AnalysisRequest) -> Result<StoredAnalysis, AppError> {
        let cv_text = self.extract_cv(request.cv).await?;

        let vacancy_text = normalize(&request.vacancy.comparable_text());
        if vacancy_text.is_empty() {
            return Err(AppError::Validation(
                "The vacancy has no text to compare against".to_string(),
            ));
        }

        let vacancy_keywords = normalize(&request.vacancy.keyword_text());

        let analysis = self
            .assess_match(&cv_text, &vacancy_text, &vacancy_keywords, request.language)
            .await
            .bounded();

        let stored = self
            .store
            .insert(NewAnalysis {
                candidate_id: request.candidate_id,
                vacancy_id: request.vacancy_id,
                application_id: request.application_id,
                analysis,
            })
            .await?;

        info!(
            analysis_id = %stored.id,
            candidate_id = %stored.candidate_id,
            vacancy_id = %stored.vacancy_id,
            attempt = stored.attempt,
            "Stored {} analysis: score {} ({})",
            stored.analysis.source.as_str(),
            stored.analysis.match_score,
            stored.analysis.decision
        );
        Ok(stored)
    }
}

fn non_empty(text: String) -> Result<String, ExtractionError> {
    if text.is_empty() {
        Err(ExtractionError::NoExtractableText)
    } else {
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use docx_rs::{Docx, Paragraph, Run};

    use super::*;
    use crate::analysis::extractor::FileTextExtractor;
    use crate::analysis::heuristic::KeywordOverlapScorer;
    use crate::analysis::models::{Decision, MAX_LIST_ITEMS};
    use crate::analysis::store::InMemoryAnalysisStore;
    use crate::llm_client::PromptPayload;

    const CV: &str = "Python Django backend engineer 5 years";
    const VACANCY: &str = "Senior Python Backend Engineer required";

    enum Reply {
        Payload(String),
        NotConfigured,
        Timeout,
        ApiError,
    }

    struct StubClient {
        reply: Reply,
        calls: AtomicUsize,
    }

    impl StubClient {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ScoringClient for StubClient {
        async fn score(&self, _prompt: &PromptPayload) -> Result<String, ScoringError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Reply::Payload(text) => Ok(text.clone()),
                Reply::NotConfigured => Err(ScoringError::NotConfigured),
                Reply::Timeout => Err(ScoringError::Timeout(Duration::from_secs(30))),
                Reply::ApiError => Err(ScoringError::Api {
                    status: 500,
                    message: "upstream exploded".to_string(),
                }),
            }
        }
    }

    #[derive(Default)]
    struct CountingScorer {
        calls: AtomicUsize,
    }

    impl FallbackScorer for CountingScorer {
        fn score(&self, cv_text: &str, vacancy_text: &str) -> MatchAnalysis {
            self.calls.fetch_add(1, Ordering::SeqCst);
            KeywordOverlapScorer.score(cv_text, vacancy_text)
        }
    }

    struct Harness {
        analyzer: MatchAnalyzer,
        client: Arc<StubClient>,
        fallback: Arc<CountingScorer>,
    }

    fn harness(reply: Reply) -> Harness {
        let client = StubClient::new(reply);
        let fallback = Arc::new(CountingScorer::default());
        let analyzer = MatchAnalyzer::new(
            Arc::new(FileTextExtractor),
            client.clone(),
            fallback.clone(),
            Arc::new(InMemoryAnalysisStore::new()),
        );
        Harness {
            analyzer,
            client,
            fallback,
        }
    }

    fn request(cv: CvSource) -> AnalysisRequest {
        AnalysisRequest {
            candidate_id: Uuid::new_v4(),
            vacancy_id: Uuid::new_v4(),
            application_id: None,
            cv,
            vacancy: VacancyText {
                description: Some(VACANCY.to_string()),
                ..VacancyText::default()
            },
            language: ResponseLanguage::English,
        }
    }

    fn text_request() -> AnalysisRequest {
        request(CvSource::Text(CV.to_string()))
    }

    #[tokio::test]
    async fn test_empty_cv_fails_before_any_scorer() {
        let h = harness(Reply::NotConfigured);
        let err = h
            .analyzer
            .analyze(request(CvSource::Text(" \n\t ".to_string())))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NoExtractableText(_)));
        assert_eq!(h.client.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.fallback.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unconfigured_ai_uses_keyword_fallback() {
        let h = harness(Reply::NotConfigured);
        let stored = h.analyzer.analyze(text_request()).await.unwrap();

        assert_eq!(stored.analysis.source, AnalysisSource::Heuristic);
        assert_eq!(stored.analysis.match_score, 60);
        assert_eq!(stored.analysis.decision, Decision::Match);
        assert_eq!(
            stored.analysis.fallback_reason,
            Some(FallbackReason::AiNotConfigured)
        );
        assert_eq!(stored.attempt, 1);
        assert_eq!(h.fallback.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_out_of_range_ai_score_is_clamped() {
        let h = harness(Reply::Payload(
            r#"{"match_score": 150, "decision": "strong_match", "summary": "Great"}"#.to_string(),
        ));
        let stored = h.analyzer.analyze(text_request()).await.unwrap();

        assert_eq!(stored.analysis.source, AnalysisSource::Ai);
        assert_eq!(stored.analysis.match_score, 100);
        assert_eq!(stored.analysis.fallback_reason, None);
        assert_eq!(h.fallback.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_decision_becomes_no_match() {
        let h = harness(Reply::Payload(
            r#"{"match_score": 70, "decision": "definitely"}"#.to_string(),
        ));
        let stored = h.analyzer.analyze(text_request()).await.unwrap();

        assert_eq!(stored.analysis.source, AnalysisSource::Ai);
        assert_eq!(stored.analysis.decision, Decision::NoMatch);
    }

    #[tokio::test]
    async fn test_prose_answer_falls_back_and_is_kept_raw_only() {
        let prose = "I think this candidate is a great fit for the role!";
        let h = harness(Reply::Payload(prose.to_string()));
        let stored = h.analyzer.analyze(text_request()).await.unwrap();

        assert_eq!(stored.analysis.source, AnalysisSource::Heuristic);
        assert_eq!(
            stored.analysis.fallback_reason,
            Some(FallbackReason::InvalidResponse)
        );
        assert_eq!(stored.analysis.raw_response.as_deref(), Some(prose));
        assert!(!stored.analysis.summary.contains("great fit"));
        assert_eq!(stored.analysis.match_score, 60);
    }

    #[tokio::test]
    async fn test_provider_failures_are_tagged() {
        let timeout = harness(Reply::Timeout);
        let stored = timeout.analyzer.analyze(text_request()).await.unwrap();
        assert_eq!(
            stored.analysis.fallback_reason,
            Some(FallbackReason::ProviderTimeout)
        );
        assert!(stored.analysis.raw_response.is_none());

        let api = harness(Reply::ApiError);
        let stored = api.analyzer.analyze(text_request()).await.unwrap();
        assert_eq!(
            stored.analysis.fallback_reason,
            Some(FallbackReason::ProviderError)
        );
        assert_eq!(stored.analysis.source, AnalysisSource::Heuristic);
    }

    #[tokio::test]
    async fn test_score_bound_holds_for_any_claimed_score() {
        for claimed in ["-40", "0", "99.6", "100", "101", "1e9", "\"250%\"", "\"abc\""] {
            let payload = format!(r#"{{"match_score": {claimed}, "decision": "match"}}"#);
            let h = harness(Reply::Payload(payload));
            let stored = h.analyzer.analyze(text_request()).await.unwrap();
            assert!(stored.analysis.match_score <= 100, "claimed {claimed}");
            assert!(Decision::ALL.contains(&stored.analysis.decision));
            assert!(stored.analysis.strengths.len() <= MAX_LIST_ITEMS);
        }
    }

    #[tokio::test]
    async fn test_unsupported_upload_is_rejected_before_scoring() {
        let h = harness(Reply::NotConfigured);
        let err = h
            .analyzer
            .analyze(request(CvSource::Document {
                bytes: Bytes::from_static(b"\x89PNG\r\n\x1a\n"),
                filename: Some("photo.png".to_string()),
                media_type: Some("image/png".to_string()),
            }))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::UnsupportedDocumentType(_)));
        assert_eq!(h.client.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.fallback.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_docx_upload_flows_through_pipeline() {
        let mut cursor = Cursor::new(Vec::new());
        Docx::new()
            .add_paragraph(Paragraph::new().add_run(Run::new().add_text("Python   Django")))
            .add_paragraph(Paragraph::new().add_run(Run::new().add_text("backend engineer")))
            .build()
            .pack(&mut cursor)
            .unwrap();

        let h = harness(Reply::NotConfigured);
        let document = h
            .analyzer
            .extract_document(
                Bytes::from(cursor.into_inner()),
                Some("cv.docx".to_string()),
                None,
            )
            .await
            .unwrap();
        assert_eq!(document.extracted_text, "Python Django\nbackend engineer");
        assert_eq!(document.char_count, document.extracted_text.chars().count());
    }

    #[tokio::test]
    async fn test_vacancy_field_labels_are_not_counted_as_requirements() {
        let h = harness(Reply::NotConfigured);
        let mut req = request(CvSource::Text(
            "Python engineer based in Amsterdam".to_string(),
        ));
        req.vacancy = VacancyText {
            title: "Python Engineer".to_string(),
            location: Some("Amsterdam".to_string()),
            hours_per_week: Some("40".to_string()),
            salary_range: Some("5000".to_string()),
            description: Some("Python engineer".to_string()),
        };

        let stored = h.analyzer.analyze(req).await.unwrap();
        assert_eq!(stored.analysis.source, AnalysisSource::Heuristic);
        assert_eq!(stored.analysis.match_score, 100);
        assert_eq!(stored.analysis.decision, Decision::StrongMatch);
        assert!(stored.analysis.gaps.is_empty(), "{:?}", stored.analysis.gaps);
    }

    #[tokio::test]
    async fn test_empty_vacancy_is_a_validation_error() {
        let h = harness(Reply::NotConfigured);
        let mut req = text_request();
        req.vacancy = VacancyText::default();

        let err = h.analyzer.analyze(req).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(h.client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reanalysis_appends_a_new_attempt() {
        let h = harness(Reply::NotConfigured);
        let first = h.analyzer.analyze(text_request()).await.unwrap();

        let mut again = text_request();
        again.candidate_id = first.candidate_id;
        again.vacancy_id = first.vacancy_id;
        let second = h.analyzer.analyze(again).await.unwrap();

        assert_eq!(second.attempt, 2);
        let history = h
            .analyzer
            .store()
            .list_for_pair(first.candidate_id, first.vacancy_id)
            .await
            .unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, second.id);
    }
}
