use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::Deserialize;
use uuid::Uuid;

use crate::analysis::orchestrator::{AnalysisRequest, CvSource};
use crate::analysis::prompt_builder::ResponseLanguage;
use crate::errors::AppError;
use crate::models::analysis::StoredAnalysis;
use crate::models::cv::CvDocument;
use crate::models::vacancy::VacancyText;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateAnalysisRequest {
    pub candidate_id: Uuid,
    pub vacancy_id: Uuid,
    #[serde(default)]
    pub application_id: Option<Uuid>,
    pub cv_text: String,
    pub vacancy: VacancyText,
    #[serde(default)]
    pub language: ResponseLanguage,
}

/// The `request` part of an upload: everything except the CV text.
#[derive(Debug, Deserialize)]
pub struct UploadAnalysisRequest {
    pub candidate_id: Uuid,
    pub vacancy_id: Uuid,
    #[serde(default)]
    pub application_id: Option<Uuid>,
    pub vacancy: VacancyText,
    #[serde(default)]
    pub language: ResponseLanguage,
}

#[derive(Debug, Deserialize)]
pub struct PairQuery {
    pub candidate_id: Uuid,
    pub vacancy_id: Uuid,
}

struct UploadedFile {
    bytes: Bytes,
    filename: Option<String>,
    media_type: Option<String>,
}

#[derive(Default)]
struct UploadParts {
    file: Option<UploadedFile>,
    request: Option<String>,
}

/// POST /api/v1/cv/extract
pub async fn handle_extract_cv(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<CvDocument>, AppError> {
    let file = read_upload(multipart, state.config.max_upload_bytes)
        .await?
        .file
        .ok_or_else(|| AppError::Validation("Missing multipart field 'file'".to_string()))?;

    let document = state
        .analyzer
        .extract_document(file.bytes, file.filename, file.media_type)
        .await?;
    Ok(Json(document))
}

/// POST /api/v1/analyses
pub async fn handle_create_analysis(
    State(state): State<AppState>,
    Json(req): Json<CreateAnalysisRequest>,
) -> Result<(StatusCode, Json<StoredAnalysis>), AppError> {
    let stored = state
        .analyzer
        .analyze(AnalysisRequest {
            candidate_id: req.candidate_id,
            vacancy_id: req.vacancy_id,
            application_id: req.application_id,
            cv: CvSource::Text(req.cv_text),
            vacancy: req.vacancy,
            language: req.language,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// POST /api/v1/analyses/upload
pub async fn handle_upload_analysis(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<StoredAnalysis>), AppError> {
    let parts = read_upload(multipart, state.config.max_upload_bytes).await?;
    let file = parts
        .file
        .ok_or_else(|| AppError::Validation("Missing multipart field 'file'".to_string()))?;
    let raw_request = parts
        .request
        .ok_or_else(|| AppError::Validation("Missing multipart field 'request'".to_string()))?;
    let req: UploadAnalysisRequest = serde_json::from_str(&raw_request)
        .map_err(|e| AppError::Validation(format!("Invalid 'request' field: {e}")))?;

    let stored = state
        .analyzer
        .analyze(AnalysisRequest {
            candidate_id: req.candidate_id,
            vacancy_id: req.vacancy_id,
            application_id: req.application_id,
            cv: CvSource::Document {
                bytes: file.bytes,
                filename: file.filename,
                media_type: file.media_type,
            },
            vacancy: req.vacancy,
            language: req.language,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// GET /api/v1/analyses/:id
pub async fn handle_get_analysis(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StoredAnalysis>, AppError> {
    let stored = state
        .analyzer
        .store()
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Analysis {id} not found")))?;
    Ok(Json(stored))
}

/// GET /api/v1/analyses?candidate_id=&vacancy_id=
pub async fn handle_list_analyses(
    State(state): State<AppState>,
    Query(params): Query<PairQuery>,
) -> Result<Json<Vec<StoredAnalysis>>, AppError> {
    let history = state
        .analyzer
        .store()
        .list_for_pair(params.candidate_id, params.vacancy_id)
        .await?;
    Ok(Json(history))
}

/// Collects the `file` and `request` parts; other fields are ignored.
async fn read_upload(mut multipart: Multipart, limit: usize) -> Result<UploadParts, AppError> {
    let mut parts = UploadParts::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit, "Invalid multipart body"))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().map(String::from);
                let media_type = field.content_type().map(String::from);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error(e, limit, "Could not read upload"))?;
                parts.file = Some(UploadedFile {
                    bytes,
                    filename,
                    media_type,
                });
            }
            "request" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| multipart_error(e, limit, "Could not read 'request'"))?;
                parts.request = Some(text);
            }
            _ => {}
        }
    }

    Ok(parts)
}

/// A body cut off by the upload limit is a 413; anything else is a bad request.
fn multipart_error(error: MultipartError, limit: usize, context: &str) -> AppError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(limit)
    } else {
        AppError::Validation(format!("{context}: {error}"))
    }
}
