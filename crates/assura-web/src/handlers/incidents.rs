//! Incident routes.
//! POST /incident - create from multipart story + files
//! GET /incident/{id} - owner-scoped decrypted view with timeline
//! POST /incident/{id}/close - external close action
//! DELETE /incident/{id} - cascade delete

use axum::extract::{Multipart, Path, State};
use axum::http::request::Parts;
use axum::http::{header::AUTHORIZATION, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use assura_analysis::RawAttachment;
use assura_common::{
    AnalysisOutcome, AssuraError, Attachment, ExtractionRecord, Incident, IncidentStatus,
    TimelineEvent,
};
use assura_pipeline::{protected_fields, Submission};

use crate::error::ApiError;
use crate::state::SharedState;

// ── MVP auth ──────────────────────────────────────────────────────────────────

/// Owner identity from the bearer token; requests without one fall back to
/// the configured default owner. Not a security boundary.
pub struct Owner(pub String);

impl axum::extract::FromRequestParts<SharedState> for Owner {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let owner = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .unwrap_or_else(|| state.default_owner.clone());
        Ok(Owner(owner))
    }
}

// ── Response types ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct CreateIncidentResponse {
    pub incident_id: Uuid,
    pub status: IncidentStatus,
    pub extracted_data: ExtractionRecord,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct IncidentView {
    pub id: Uuid,
    pub status: IncidentStatus,
    pub story_text: String,
    pub extracted_data: ExtractionRecord,
    pub attachments: Vec<Attachment>,
    pub timeline: Vec<TimelineEvent>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub incident_id: Uuid,
    pub status: IncidentStatus,
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// POST /incident - accept a story plus optional attachments, return the
/// best-effort extraction record immediately.
pub async fn create_incident(
    State(state): State<SharedState>,
    owner: Owner,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut story_text = String::new();
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AssuraError::Validation(format!("invalid multipart body: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("story_text") => {
                story_text = field
                    .text()
                    .await
                    .map_err(|e| AssuraError::Validation(format!("invalid story_text: {e}")))?;
            }
            Some("files") => {
                let filename = field.file_name().unwrap_or("unknown").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AssuraError::Validation(format!("invalid file upload: {e}")))?
                    .to_vec();
                files.push(RawAttachment { filename, content_type, data });
            }
            _ => {}
        }
    }

    let outcome = state
        .pipeline
        .submit(Submission { owner_id: owner.0, story_text, files })
        .await?;

    state.scheduler.schedule(outcome.incident_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateIncidentResponse {
            incident_id: outcome.incident_id,
            status: outcome.status,
            extracted_data: outcome.extraction,
            message: "Incident created successfully. Processing in background.".to_string(),
        }),
    ))
}

/// GET /incident/{id} - full incident with fields decrypted for the owner.
pub async fn get_incident(
    State(state): State<SharedState>,
    owner: Owner,
    Path(id): Path<Uuid>,
) -> Result<Json<IncidentView>, ApiError> {
    let incident = load_owned(&state, &owner, id).await?;
    let timeline = state.store.events(id).await?;

    let fields = protected_fields(&incident.extraction);
    let extracted_data = state
        .gate
        .decrypt_fields(&incident.extraction, &fields)
        .map_err(|e| AssuraError::Crypto(e.to_string()))?;
    let story_text = state
        .gate
        .decrypt_field(&incident.story_text)
        .map_err(|e| AssuraError::Crypto(e.to_string()))?;

    let mut attachments = incident.attachments;
    for attachment in &mut attachments {
        if attachment.encrypted {
            if let AnalysisOutcome::Analyzed(report) = &mut attachment.analysis {
                report.extracted_text = state
                    .gate
                    .decrypt_field(&report.extracted_text)
                    .map_err(|e| AssuraError::Crypto(e.to_string()))?;
            }
        }
    }

    Ok(Json(IncidentView {
        id: incident.id,
        status: incident.status,
        story_text,
        extracted_data,
        attachments,
        timeline,
        created_at: incident.created_at,
        updated_at: incident.updated_at,
    }))
}

/// POST /incident/{id}/close - human correction or operator action.
pub async fn close_incident(
    State(state): State<SharedState>,
    owner: Owner,
    Path(id): Path<Uuid>,
) -> Result<Json<StatusResponse>, ApiError> {
    load_owned(&state, &owner, id).await?;
    let status = state.pipeline.close(id).await?;
    Ok(Json(StatusResponse { incident_id: id, status }))
}

/// DELETE /incident/{id} - remove the incident and cascade to its events
/// and attachment metadata.
pub async fn delete_incident(
    State(state): State<SharedState>,
    owner: Owner,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    load_owned(&state, &owner, id).await?;
    state.store.delete(id).await?;
    tracing::info!(incident_id = %id, "incident deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Fetch an incident, presenting foreign owners with the same 404 as an
/// unknown id.
async fn load_owned(state: &SharedState, owner: &Owner, id: Uuid) -> Result<Incident, ApiError> {
    let incident = state.store.load(id).await?;
    if incident.owner_id != owner.0 {
        return Err(AssuraError::NotFound(format!("incident {id}")).into());
    }
    Ok(incident)
}
