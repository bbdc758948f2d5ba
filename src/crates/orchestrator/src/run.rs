//! Entry point that turns a user prompt into a running pipeline and a
//! stream of `RunState` snapshots (spec §4.10, §8).
//!
//! The graph itself is compiled once (it is stateless — every node closure
//! only captures `Arc<PipelineContext>`) and reused across every run that
//! flows through this `Orchestrator`.

use crate::error::{OrchestratorError, Result};
use crate::pipeline::{build_graph, PipelineContext};
use domain::{ErrorCategory, RunState};
use futures::Stream;
use langgraph_core::compiled::{CompiledGraph, ExecutionEvent};
use std::pin::Pin;
use std::sync::Arc;
use uuid::Uuid;

pub type RunStateStream = Pin<Box<dyn Stream<Item = RunState> + Send>>;

pub struct Orchestrator {
    ctx: Arc<PipelineContext>,
    graph: Arc<CompiledGraph>,
}

impl Orchestrator {
    pub fn new(ctx: Arc<PipelineContext>) -> Result<Self> {
        let graph = build_graph(ctx.clone())?;
        Ok(Self {
            ctx,
            graph: Arc::new(graph),
        })
    }

    /// Starts a new run for `user_prompt` and returns its id together with a
    /// stream of every `RunState` snapshot produced as the pipeline
    /// advances, ending once the run reaches a terminal status.
    ///
    /// An empty prompt is rejected as `input_error` inside the `plan` node,
    /// before any agent or LLM call is made (spec §8) — this function does
    /// not need to special-case it, it only needs to let that first node
    /// run.
    pub async fn start(&self, user_prompt: impl Into<String>, max_iterations: u32) -> Result<(Uuid, RunStateStream)> {
        let state = RunState::new(user_prompt, max_iterations);
        let run_id = state.run_id;

        self.ctx.cancellation.register(run_id);
        self.ctx.store.save(&state).await?;
        self.ctx
            .audit
            .log_event(
                run_id,
                domain::AuditEventType::RunCreated,
                serde_json::json!({ "max_iterations": max_iterations }),
                state.correlation_id.clone(),
            )
            .await;

        let input = serde_json::to_value(&state).map_err(|e| OrchestratorError::Config(e.to_string()))?;
        let events = self.graph.stream(input)?;
        let ctx = self.ctx.clone();

        let stream = async_stream::stream! {
            futures::pin_mut!(events);
            use futures::StreamExt;
            while let Some(event) = events.next().await {
                match event {
                    ExecutionEvent::NodeEnd { output, .. } | ExecutionEvent::Complete { final_state: output } => {
                        match serde_json::from_value::<RunState>(output) {
                            Ok(state) => yield state,
                            Err(e) => {
                                tracing::error!(error = %e, %run_id, "pipeline produced an undeserializable run state");
                            }
                        }
                    }
                    ExecutionEvent::Error { node, error } => {
                        if let Some(mut state) = recover_last_state(&ctx, run_id).await {
                            let _ = state.fail(
                                ErrorCategory::InternalError,
                                format!("node {node} failed: {error}"),
                            );
                            let _ = ctx.store.save(&state).await;
                            ctx.audit
                                .log_event(
                                    run_id,
                                    domain::AuditEventType::RunFailed,
                                    serde_json::json!({ "node": node, "error": error }),
                                    state.correlation_id.clone(),
                                )
                                .await;
                            ctx.cancellation.forget(run_id);
                            yield state;
                        }
                    }
                    ExecutionEvent::NodeStart { .. }
                    | ExecutionEvent::StateUpdate { .. }
                    | ExecutionEvent::Interrupted { .. } => {}
                }
            }
        };

        Ok((run_id, Box::pin(stream)))
    }

    /// Requests cancellation of an in-flight run (spec §5). Cooperative —
    /// the run stops at its next node boundary, not mid node.
    pub fn cancel(&self, run_id: Uuid) -> bool {
        self.ctx.cancellation.cancel(run_id)
    }

    /// Loads the most recently persisted snapshot of a run, for `GET
    /// /design/{id}`.
    pub async fn load(&self, run_id: Uuid) -> Result<Option<RunState>> {
        Ok(self.ctx.store.load(run_id).await?)
    }

    /// Tails the audit log for a run, for `WS /design/{id}/stream`.
    pub fn subscribe(&self, run_id: Uuid) -> impl Stream<Item = domain::AuditEvent> {
        self.ctx.audit.stream_events(run_id)
    }
}

async fn recover_last_state(ctx: &PipelineContext, run_id: Uuid) -> Option<RunState> {
    match ctx.store.load(run_id).await {
        Ok(Some(state)) => Some(state),
        Ok(None) => {
            tracing::error!(%run_id, "no persisted state to recover after a node error");
            None
        }
        Err(e) => {
            tracing::error!(error = %e, %run_id, "failed to load persisted state after a node error");
            None
        }
    }
}
