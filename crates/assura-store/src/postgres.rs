//! Postgres persistence gateway (sqlx).
//!
//! Schema is created on startup when missing. Transient connection errors
//! are retried with backoff here at the gateway boundary; callers see a
//! `StoreError` only once retries are exhausted.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{info, warn};
use uuid::Uuid;

use assura_common::{
    AnalysisOutcome, Attachment, EventKind, ExtractionRecord, Incident, IncidentStatus,
    TimelineEvent,
};

use crate::gateway::{IncidentStore, StoreError};

const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the tables when they do not exist yet.
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS incidents (
                id              UUID PRIMARY KEY,
                owner_id        TEXT NOT NULL,
                status          TEXT NOT NULL,
                story_text      TEXT NOT NULL,
                redacted_story  TEXT NOT NULL,
                pseudonym_map   JSONB NOT NULL DEFAULT '{}',
                extraction      JSONB NOT NULL,
                created_at      TIMESTAMPTZ NOT NULL,
                updated_at      TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS timeline_events (
                id          UUID PRIMARY KEY,
                incident_id UUID NOT NULL REFERENCES incidents(id) ON DELETE CASCADE,
                seq         BIGSERIAL,
                kind        TEXT NOT NULL,
                description TEXT NOT NULL,
                metadata    JSONB,
                created_at  TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS attachments (
                id           UUID PRIMARY KEY,
                incident_id  UUID NOT NULL REFERENCES incidents(id) ON DELETE CASCADE,
                filename     TEXT NOT NULL,
                content_type TEXT NOT NULL,
                size         BIGINT NOT NULL,
                analysis     JSONB NOT NULL,
                encrypted    BOOLEAN NOT NULL DEFAULT FALSE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("postgres schema ready");
        Ok(())
    }

    async fn load_attachments(&self, incident_id: Uuid) -> Result<Vec<Attachment>, StoreError> {
        let rows = with_retry(|| async {
            sqlx::query(
                "SELECT id, incident_id, filename, content_type, size, analysis, encrypted
                 FROM attachments WHERE incident_id = $1 ORDER BY filename",
            )
            .bind(incident_id)
            .fetch_all(&self.pool)
            .await
        })
        .await?;

        rows.into_iter()
            .map(|row| {
                let analysis: AnalysisOutcome =
                    serde_json::from_value(row.try_get::<serde_json::Value, _>("analysis")?)?;
                Ok(Attachment {
                    id: row.try_get("id")?,
                    incident_id: row.try_get("incident_id")?,
                    filename: row.try_get("filename")?,
                    content_type: row.try_get("content_type")?,
                    size: row.try_get::<i64, _>("size")? as u64,
                    analysis,
                    encrypted: row.try_get("encrypted")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl IncidentStore for PgStore {
    async fn create(&self, incident: &Incident, first_event: &TimelineEvent) -> Result<(), StoreError> {
        let pseudonym_map = serde_json::to_value(&incident.pseudonym_map)?;
        let extraction = serde_json::to_value(&incident.extraction)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO incidents
                 (id, owner_id, status, story_text, redacted_story, pseudonym_map,
                  extraction, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(incident.id)
        .bind(&incident.owner_id)
        .bind(incident.status.as_str())
        .bind(&incident.story_text)
        .bind(&incident.redacted_story)
        .bind(pseudonym_map)
        .bind(extraction)
        .bind(incident.created_at)
        .bind(incident.updated_at)
        .execute(&mut *tx)
        .await?;

        for attachment in &incident.attachments {
            sqlx::query(
                "INSERT INTO attachments
                     (id, incident_id, filename, content_type, size, analysis, encrypted)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(attachment.id)
            .bind(attachment.incident_id)
            .bind(&attachment.filename)
            .bind(&attachment.content_type)
            .bind(attachment.size as i64)
            .bind(serde_json::to_value(&attachment.analysis)?)
            .bind(attachment.encrypted)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "INSERT INTO timeline_events (id, incident_id, kind, description, metadata, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(first_event.id)
        .bind(first_event.incident_id)
        .bind(first_event.kind.as_str())
        .bind(&first_event.description)
        .bind(&first_event.metadata)
        .bind(first_event.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<Incident, StoreError> {
        let row = with_retry(|| async {
            sqlx::query(
                "SELECT id, owner_id, status, story_text, redacted_story, pseudonym_map,
                        extraction, created_at, updated_at
                 FROM incidents WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await
        })
        .await?
        .ok_or(StoreError::NotFound(id))?;

        let status: IncidentStatus = row
            .try_get::<String, _>("status")?
            .parse()
            .map_err(StoreError::Corrupt)?;
        let pseudonym_map =
            serde_json::from_value(row.try_get::<serde_json::Value, _>("pseudonym_map")?)?;
        let extraction: ExtractionRecord =
            serde_json::from_value(row.try_get::<serde_json::Value, _>("extraction")?)?;

        let attachments = self.load_attachments(id).await?;

        Ok(Incident {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            status,
            story_text: row.try_get("story_text")?,
            redacted_story: row.try_get("redacted_story")?,
            pseudonym_map,
            extraction,
            attachments,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        })
    }

    async fn update(
        &self,
        id: Uuid,
        status: IncidentStatus,
        extraction: Option<&ExtractionRecord>,
    ) -> Result<(), StoreError> {
        let extraction = extraction.map(serde_json::to_value).transpose()?;
        let result = with_retry(|| async {
            sqlx::query(
                "UPDATE incidents
                 SET status = $2,
                     extraction = COALESCE($3, extraction),
                     updated_at = NOW()
                 WHERE id = $1",
            )
            .bind(id)
            .bind(status.as_str())
            .bind(&extraction)
            .execute(&self.pool)
            .await
        })
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn append_event(&self, event: &TimelineEvent) -> Result<(), StoreError> {
        with_retry(|| async {
            sqlx::query(
                "INSERT INTO timeline_events (id, incident_id, kind, description, metadata, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(event.id)
            .bind(event.incident_id)
            .bind(event.kind.as_str())
            .bind(&event.description)
            .bind(&event.metadata)
            .bind(event.created_at)
            .execute(&self.pool)
            .await
        })
        .await?;
        Ok(())
    }

    async fn events(&self, incident_id: Uuid) -> Result<Vec<TimelineEvent>, StoreError> {
        let rows = with_retry(|| async {
            sqlx::query(
                "SELECT id, incident_id, kind, description, metadata, created_at
                 FROM timeline_events WHERE incident_id = $1 ORDER BY seq",
            )
            .bind(incident_id)
            .fetch_all(&self.pool)
            .await
        })
        .await?;

        rows.into_iter()
            .map(|row| {
                let kind: EventKind = row
                    .try_get::<String, _>("kind")?
                    .parse()
                    .map_err(StoreError::Corrupt)?;
                Ok(TimelineEvent {
                    id: row.try_get("id")?,
                    incident_id: row.try_get("incident_id")?,
                    kind,
                    description: row.try_get("description")?,
                    metadata: row.try_get("metadata")?,
                    created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
                })
            })
            .collect()
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        // events and attachments cascade via foreign keys
        let result = with_retry(|| async {
            sqlx::query("DELETE FROM incidents WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await
        })
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let row = with_retry(|| async {
            sqlx::query("SELECT COUNT(*) AS n FROM incidents")
                .fetch_one(&self.pool)
                .await
        })
        .await?;
        Ok(row.try_get::<i64, _>("n")? as u64)
    }
}

// ── Retry ─────────────────────────────────────────────────────────────────────

fn is_transient(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut)
}

async fn with_retry<T, Fut>(op: impl Fn() -> Fut) -> Result<T, sqlx::Error>
where
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let mut delay = RETRY_BASE_DELAY;
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt + 1 < RETRY_ATTEMPTS && is_transient(&err) => {
                attempt += 1;
                warn!(attempt, error = %err, "transient storage error, retrying");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(is_transient(&sqlx::Error::PoolTimedOut));
        assert!(!is_transient(&sqlx::Error::RowNotFound));
    }
}
