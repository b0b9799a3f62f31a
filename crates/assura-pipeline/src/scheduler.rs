//! Background execution of the Process transition.
//!
//! Two modes behind one trait: inline execution on the submitting task
//! (degraded mode, no queue) and a queued mode with worker tasks. Both
//! guarantee Process is invoked at least once per scheduled incident;
//! overlap and redelivery are safe because Process is idempotent.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use assura_common::{AssuraError, Result};

use crate::pipeline::IncidentPipeline;

#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Ensure Process runs for this incident, eventually.
    async fn schedule(&self, incident_id: Uuid) -> Result<()>;
}

/// Degraded mode: Process runs inline before `schedule` returns. A failed
/// run is logged, not surfaced; the incident is already persisted and the
/// pipeline has marked it for escalation.
pub struct InlineScheduler {
    pipeline: Arc<IncidentPipeline>,
}

impl InlineScheduler {
    pub fn new(pipeline: Arc<IncidentPipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl Scheduler for InlineScheduler {
    async fn schedule(&self, incident_id: Uuid) -> Result<()> {
        if let Err(err) = self.pipeline.process(incident_id).await {
            warn!(incident_id = %incident_id, error = %err, "inline processing failed");
        }
        Ok(())
    }
}

/// Queued mode: worker tasks drain an unbounded channel. A per-incident
/// in-flight set keeps at most one Process execution per incident id;
/// duplicate deliveries while a run is in flight are dropped, which is safe
/// because the running pass settles the incident.
pub struct QueuedScheduler {
    tx: mpsc::UnboundedSender<Uuid>,
}

impl QueuedScheduler {
    pub fn start(pipeline: Arc<IncidentPipeline>, workers: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<Uuid>();
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let in_flight: Arc<Mutex<HashSet<Uuid>>> = Arc::new(Mutex::new(HashSet::new()));

        let workers = workers.max(1);
        for worker in 0..workers {
            let rx = rx.clone();
            let pipeline = pipeline.clone();
            let in_flight = in_flight.clone();
            tokio::spawn(async move {
                loop {
                    let next = { rx.lock().await.recv().await };
                    let Some(incident_id) = next else { break };

                    let acquired = in_flight.lock().unwrap().insert(incident_id);
                    if !acquired {
                        debug!(worker, incident_id = %incident_id, "process already in flight, dropping duplicate");
                        continue;
                    }

                    if let Err(err) = pipeline.process(incident_id).await {
                        warn!(worker, incident_id = %incident_id, error = %err, "background processing failed");
                    }
                    in_flight.lock().unwrap().remove(&incident_id);
                }
                debug!(worker, "scheduler worker stopped");
            });
        }

        info!(workers, "queued scheduler started");
        Self { tx }
    }
}

#[async_trait]
impl Scheduler for QueuedScheduler {
    async fn schedule(&self, incident_id: Uuid) -> Result<()> {
        self.tx
            .send(incident_id)
            .map_err(|_| AssuraError::Other(anyhow::anyhow!("task queue is closed")))
    }
}
