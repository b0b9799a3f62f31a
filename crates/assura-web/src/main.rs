//! Assura Web Server
//!
//! Run with: cargo run -p assura-web

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use secrecy::ExposeSecret;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use assura_analysis::AnalyzerRegistry;
use assura_config::{Config, SchedulerMode, StorageMode};
use assura_llm::{AnthropicBackend, IncidentExtractor, LlmBackend, OpenAiCompatibleBackend};
use assura_pipeline::{
    ConfidenceFloorPolicy, CoveredTypeList, EscalationPolicy, IncidentPipeline, InlineScheduler,
    QueuedScheduler, Scheduler,
};
use assura_security::{AesGcmCipher, EncryptionGate};
use assura_store::{IncidentStore, MemoryStore, PgStore};
use assura_web::router::build_router;
use assura_web::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load()?;
    info!("Starting Assura backend");

    // Persistence gateway, selected once at startup.
    let store: Arc<dyn IncidentStore> = match config.database.mode {
        StorageMode::Memory => {
            warn!("in-memory storage selected: all data is lost on restart");
            Arc::new(MemoryStore::new())
        }
        StorageMode::Postgres => {
            let pg = PgStore::connect(&config.database.url, config.database.max_connections)
                .await
                .context("connecting to postgres")?;
            pg.init_schema().await.context("initialising schema")?;
            Arc::new(pg)
        }
    };

    // Encryption policy, resolved once.
    let gate = if config.encryption.enabled {
        let key = config.encryption.key().with_context(|| {
            format!("encryption enabled but {} is not set", config.encryption.key_env)
        })?;
        EncryptionGate::new(Arc::new(AesGcmCipher::from_base64_key(key.expose_secret())?))
    } else {
        warn!("field encryption disabled: records are stored in plaintext");
        EncryptionGate::disabled()
    };

    // Extraction backend.
    let api_key = config.llm.api_key();
    let backend: Arc<dyn LlmBackend> = match config.llm.backend.as_str() {
        "anthropic" => {
            let key = api_key
                .as_ref()
                .map(|k| k.expose_secret().to_string())
                .with_context(|| format!("{} is not set", config.llm.api_key_env))?;
            Arc::new(AnthropicBackend::new(key, config.llm.model.clone()))
        }
        "openai_compatible" => Arc::new(OpenAiCompatibleBackend::new(
            config.llm.base_url.clone(),
            config.llm.model.clone(),
            api_key.as_ref().map(|k| k.expose_secret().to_string()),
        )),
        other => anyhow::bail!("unknown llm backend: {other}"),
    };
    let extractor = Arc::new(
        IncidentExtractor::new(backend, Duration::from_secs(config.llm.timeout_secs))
            .with_max_tokens(config.llm.max_tokens),
    );

    let registry = Arc::new(AnalyzerRegistry::resolve(
        config.analysis.pdf,
        config.analysis.image,
        config.analysis.video,
    ));

    let pipeline = Arc::new(IncidentPipeline::new(
        store.clone(),
        extractor,
        registry,
        gate.clone(),
        EscalationPolicy::new(config.pipeline.min_confidence),
        Arc::new(CoveredTypeList::new(config.pipeline.covered_types.clone())),
        Arc::new(ConfidenceFloorPolicy::new(config.pipeline.severity_floor_confidence)),
    ));

    let scheduler: Arc<dyn Scheduler> = match config.pipeline.mode {
        SchedulerMode::Inline => {
            info!("inline scheduler: processing runs on the submitting task");
            Arc::new(InlineScheduler::new(pipeline.clone()))
        }
        SchedulerMode::Queued => Arc::new(QueuedScheduler::start(
            pipeline.clone(),
            config.pipeline.workers,
        )),
    };

    let state = AppState {
        pipeline,
        scheduler,
        store,
        gate,
        default_owner: config.server.default_owner.clone(),
    };
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{addr}");

    axum::serve(listener, app).await?;
    Ok(())
}
