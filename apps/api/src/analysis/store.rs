//! Append-only persistence for match analyses.
//!
//! Every analysis is a new row; re-analysing a pair never updates an older
//! one. `attempt` numbers the rows of one candidate/vacancy pair from 1.

use std::sync::Mutex;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::analysis::models::MatchAnalysis;
use crate::errors::AppError;
use crate::models::analysis::{MatchAnalysisRow, StoredAnalysis};

/// An analysis ready to persist, with the identities it belongs to.
#[derive(Debug, Clone)]
pub struct NewAnalysis {
    pub candidate_id: Uuid,
    pub vacancy_id: Uuid,
    pub application_id: Option<Uuid>,
    pub analysis: MatchAnalysis,
}

#[async_trait]
pub trait AnalysisStore: Send + Sync {
    async fn insert(&self, new: NewAnalysis) -> Result<StoredAnalysis, AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<StoredAnalysis>, AppError>;

    /// All analyses of one pair, newest first.
    async fn list_for_pair(
        &self,
        candidate_id: Uuid,
        vacancy_id: Uuid,
    ) -> Result<Vec<StoredAnalysis>, AppError>;
}

pub struct PgAnalysisStore {
    pool: PgPool,
}

impl PgAnalysisStore {
    /// Opens a PostgreSQL pool and applies pending migrations.
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        info!("Connecting to PostgreSQL...");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("failed to connect to PostgreSQL")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to apply migrations")?;

        info!("PostgreSQL connection pool established (max {max_connections} connections)");
        Ok(Self { pool })
    }
}

#[async_trait]
impl AnalysisStore for PgAnalysisStore {
    async fn insert(&self, new: NewAnalysis) -> Result<StoredAnalysis, AppError> {
        let analysis = new.analysis;
        let fallback_reason = analysis.fallback_reason.map(|r| r.as_str());

        // The attempt number is derived in the same statement as the insert.
        let row: MatchAnalysisRow = sqlx::query_as(
            r#"
            INSERT INTO match_analyses
                (id, candidate_id, vacancy_id, application_id, attempt,
                 match_score, decision, summary, strengths, gaps, recommendations,
                 source, raw_response, fallback_reason)
            SELECT $1, $2, $3, $4, (COUNT(*) + 1)::int,
                   $5, $6, $7, $8, $9, $10, $11, $12, $13
            FROM match_analyses
            WHERE candidate_id = $2 AND vacancy_id = $3
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.candidate_id)
        .bind(new.vacancy_id)
        .bind(new.application_id)
        .bind(i16::from(analysis.match_score))
        .bind(analysis.decision.as_str())
        .bind(&analysis.summary)
        .bind(&analysis.strengths)
        .bind(&analysis.gaps)
        .bind(&analysis.recommendations)
        .bind(analysis.source.as_str())
        .bind(&analysis.raw_response)
        .bind(fallback_reason)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_stored()?)
    }

    async fn get(&self, id: Uuid) -> Result<Option<StoredAnalysis>, AppError> {
        let row: Option<MatchAnalysisRow> =
            sqlx::query_as("SELECT * FROM match_analyses WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(MatchAnalysisRow::into_stored).transpose()?)
    }

    async fn list_for_pair(
        &self,
        candidate_id: Uuid,
        vacancy_id: Uuid,
    ) -> Result<Vec<StoredAnalysis>, AppError> {
        let rows: Vec<MatchAnalysisRow> = sqlx::query_as(
            r#"
            SELECT * FROM match_analyses
            WHERE candidate_id = $1 AND vacancy_id = $2
            ORDER BY created_at DESC, attempt DESC
            "#,
        )
        .bind(candidate_id)
        .bind(vacancy_id)
        .fetch_all(&self.pool)
        .await?;

        let stored = rows
            .into_iter()
            .map(MatchAnalysisRow::into_stored)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(stored)
    }
}

/// Process-local store, used when no database is configured and in tests.
#[derive(Default)]
pub struct InMemoryAnalysisStore {
    rows: Mutex<Vec<StoredAnalysis>>,
}

impl InMemoryAnalysisStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<StoredAnalysis>>, AppError> {
        self.rows
            .lock()
            .map_err(|_| AppError::Internal(anyhow!("analysis store lock poisoned")))
    }
}

#[async_trait]
impl AnalysisStore for InMemoryAnalysisStore {
    async fn insert(&self, new: NewAnalysis) -> Result<StoredAnalysis, AppError> {
        let mut rows = self.lock()?;
        let previous = rows
            .iter()
            .filter(|r| r.candidate_id == new.candidate_id && r.vacancy_id == new.vacancy_id)
            .count();

        let stored = StoredAnalysis {
            id: Uuid::new_v4(),
            candidate_id: new.candidate_id,
            vacancy_id: new.vacancy_id,
            application_id: new.application_id,
            attempt: i32::try_from(previous + 1).context("attempt counter overflow")?,
            analysis: new.analysis,
            created_at: Utc::now(),
        };
        rows.push(stored.clone());
        Ok(stored)
    }

    async fn get(&self, id: Uuid) -> Result<Option<StoredAnalysis>, AppError> {
        Ok(self.lock()?.iter().find(|r| r.id == id).cloned())
    }

    async fn list_for_pair(
        &self,
        candidate_id: Uuid,
        vacancy_id: Uuid,
    ) -> Result<Vec<StoredAnalysis>, AppError> {
        // Insertion order is chronological; reverse it for newest first.
        Ok(self
            .lock()?
            .iter()
            .rev()
            .filter(|r| r.candidate_id == candidate_id && r.vacancy_id == vacancy_id)
            .cloned()
            .collect())
    }
}
