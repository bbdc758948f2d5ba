//! Orchestrator server binary.
//!
//! Wires the pipeline's core callable interfaces (spec §6: `orchestrator.run`,
//! `audit.stream_events`) behind the three HTTP/WebSocket endpoints the
//! external API layer is documented to expose. The transport plumbing
//! itself is out of scope (spec §1) — this binary is a thin adapter, not
//! the production gateway.

use agents::{Generator, Planner, StaticModelResolver, Validator};
use audit::{AuditLog, InMemoryAuditSink, SqliteAuditSink};
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path as AxumPath, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use llm::{AgentModelRegistry, AgentRole, ModelSpec, RemoteLlmConfig};
use llm::remote::{ClaudeClient, OpenAiClient};
use orchestrator::config::{OrchestratorConfig, StoreBackend};
use orchestrator::pipeline::PipelineContext;
use orchestrator::run::Orchestrator;
use orchestrator::cancellation::CancellationRegistry;
use prompts::PromptRegistry;
use run_store::{InMemoryRunStateStore, RunStateStore, SqliteRunStateStore};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(rust_log).init();

    let config_path = std::env::var("CONFIG_PATH").ok().map(std::path::PathBuf::from);
    let config = OrchestratorConfig::load(config_path.as_deref())?;
    tracing::info!(bind_addr = %config.bind_addr, "loaded orchestrator configuration");

    std::fs::create_dir_all(&config.scratch_dir)?;
    std::fs::create_dir_all(&config.outputs_dir)?;

    let store: Arc<dyn RunStateStore> = match &config.store_backend {
        StoreBackend::Memory => Arc::new(InMemoryRunStateStore::new()),
        StoreBackend::Sqlite { path } => {
            let url = format!("sqlite://{}?mode=rwc", path.display());
            let pool = sqlx::sqlite::SqlitePool::connect(&url).await?;
            let store = SqliteRunStateStore::new(pool);
            store.migrate().await?;
            Arc::new(store)
        }
    };

    let audit = match &config.store_backend {
        StoreBackend::Memory => Arc::new(AuditLog::new(Arc::new(InMemoryAuditSink::new()))),
        StoreBackend::Sqlite { path } => {
            let url = format!("sqlite://{}?mode=rwc", path.display());
            let pool = sqlx::sqlite::SqlitePool::connect(&url).await?;
            let sink = SqliteAuditSink::new(pool);
            sink.migrate().await?;
            Arc::new(AuditLog::new(Arc::new(sink)))
        }
    };

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let _reaper = run_store::spawn_reaper(store.clone(), config.stale_threshold_seconds, shutdown_rx);

    let registry = Arc::new(build_model_registry());
    let resolver = Arc::new(build_resolver());
    let prompts = Arc::new(PromptRegistry::load());

    let planner = Arc::new(Planner::new(registry.clone(), resolver.clone(), prompts.clone()));
    let generator = Arc::new(Generator::new(registry.clone(), resolver.clone(), prompts.clone()));
    let validator = Arc::new(Validator::new(registry, resolver, prompts));

    let sandbox_config = sandbox::SandboxConfig::new(&config.freecad_engine_path, &config.freecad_headless_flag);
    let cad_runner = Arc::new(cad_runner::CadRunner::with_concurrency_limit(
        sandbox_config,
        &config.scratch_dir,
        config.sandbox_concurrent_limit,
    ));

    let ctx = Arc::new(PipelineContext {
        planner,
        generator,
        validator,
        cad_runner,
        store,
        audit,
        cancellation: Arc::new(CancellationRegistry::new()),
        scratch_dir: config.scratch_dir.clone(),
        cad_timeout_seconds: config.sandbox_execution_timeout_seconds,
        agent_timeouts: config.default_timeouts(),
    });

    let app_state = Arc::new(Orchestrator::new(ctx)?);

    let app = Router::new()
        .route("/design", post(create_design))
        .route("/design/:id", get(get_design))
        .route("/design/:id/stream", get(stream_design))
        .with_state(app_state);

    let addr: SocketAddr = config.bind_addr.parse()?;
    tracing::info!(%addr, "starting orchestrator server");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;

    tracing::info!("orchestrator server shut down gracefully");
    Ok(())
}

/// spec §4.1 "Per-agent model selection": the static role -> {primary,
/// fallback, temperature, max_tokens} defaults, overridable once at
/// startup from `LLM_AGENTS_<ROLE>_*` environment variables.
fn build_model_registry() -> AgentModelRegistry {
    let mut defaults = std::collections::HashMap::new();
    defaults.insert(
        AgentRole::Planner,
        ModelSpec::new("claude-sonnet", vec!["gpt-4o".to_string()]),
    );
    defaults.insert(
        AgentRole::Generator,
        ModelSpec::new("claude-sonnet", vec!["gpt-4o".to_string()]),
    );
    defaults.insert(
        AgentRole::Validator,
        ModelSpec::new("claude-sonnet", vec!["gpt-4o".to_string()]),
    );
    AgentModelRegistry::from_env_with_defaults(defaults)
}

/// spec §9 redesign flag: constructed once here, never a global singleton.
/// Vendor clients are only registered when their API key is present in the
/// environment, so a deployment missing a provider still starts — it just
/// exhausts that provider's fallback slot with `no_model_configured`.
fn build_resolver() -> StaticModelResolver {
    let mut resolver = StaticModelResolver::new();
    if let Ok(config) = RemoteLlmConfig::from_env("ANTHROPIC_API_KEY", "https://api.anthropic.com", "claude-sonnet") {
        resolver = resolver.with_model("claude-sonnet", Arc::new(ClaudeClient::new(config)));
    }
    if let Ok(config) = RemoteLlmConfig::from_env("OPENAI_API_KEY", "https://api.openai.com/v1", "gpt-4o") {
        resolver = resolver.with_model("gpt-4o", Arc::new(OpenAiClient::new(config)));
    }
    resolver
}

#[derive(Debug, Deserialize)]
struct CreateDesignRequest {
    prompt: String,
    #[serde(default)]
    max_iterations: Option<u32>,
}

#[derive(Debug, Serialize)]
struct CreateDesignResponse {
    run_id: Uuid,
}

/// `POST /design` (spec §6).
async fn create_design(
    State(orchestrator): State<Arc<Orchestrator>>,
    Json(request): Json<CreateDesignRequest>,
) -> impl IntoResponse {
    let max_iterations = request.max_iterations.unwrap_or(domain::DEFAULT_MAX_ITERATIONS);
    match orchestrator.start(request.prompt, max_iterations).await {
        Ok((run_id, mut stream)) => {
            tokio::spawn(async move { while stream.next().await.is_some() {} });
            Json(CreateDesignResponse { run_id }).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start run");
            (axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// `GET /design/{id}` (spec §6).
async fn get_design(State(orchestrator): State<Arc<Orchestrator>>, AxumPath(id): AxumPath<Uuid>) -> impl IntoResponse {
    match orchestrator.load(id).await {
        Ok(Some(state)) => Json(state).into_response(),
        Ok(None) => (axum::http::StatusCode::NOT_FOUND, "run not found").into_response(),
        Err(e) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// `WS /design/{id}/stream` (spec §6): forwards audit events as they land.
async fn stream_design(
    State(orchestrator): State<Arc<Orchestrator>>,
    AxumPath(id): AxumPath<Uuid>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| forward_audit_events(socket, orchestrator, id))
}

async fn forward_audit_events(mut socket: WebSocket, orchestrator: Arc<Orchestrator>, run_id: Uuid) {
    let events = orchestrator.subscribe(run_id);
    futures::pin_mut!(events);
    while let Some(event) = events.next().await {
        let payload = match serde_json::to_string(&event) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, %run_id, "failed to serialize audit event for websocket");
                continue;
            }
        };
        if socket.send(WsMessage::Text(payload)).await.is_err() {
            break;
        }
    }
}

async fn shutdown_signal(shutdown_tx: tokio::sync::watch::Sender<bool>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install CTRL-C signal handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received CTRL-C signal, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM signal, shutting down"),
    }
    let _ = shutdown_tx.send(true);
}
