//! The pipeline state machine (spec §4.10, C10): a `StateGraph` over a
//! `serde_json`-encoded `RunState`, with one node per stage and conditional
//! edges that route purely on `RunState.status` after each node has already
//! applied the transition table's action for that stage.
//!
//! Folding the table's branching (REFINE vs FAIL, iteration bookkeeping,
//! replan-vs-refine) into the node bodies rather than the router keeps the
//! router itself a single generic function: "terminal status -> END,
//! otherwise -> the node named by the current status." That is the natural
//! fit for the teacher's Pregel-based conditional-routing engine described
//! in SPEC_FULL.md — no bespoke state machine on top of it.

use crate::cancellation::CancellationRegistry;
use crate::error::{category_for_agent_error, Stage};
use agents::{Agent, AgentOutcome, Generator, Planner, Validator};
use audit::AuditLog;
use cad_runner::CadRunner;
use domain::{AgentTimeouts, ErrorCategory, RunState, RunStatus};
use langgraph_core::builder::StateGraph;
use langgraph_core::compiled::CompiledGraph;
use langgraph_core::error::{GraphError, Result as GraphResult};
use langgraph_core::send::ConditionalEdgeResult;
use run_store::RunStateStore;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tooling::async_utils::timeout::{with_timeout, TimeoutError};

const PLAN: &str = "plan";
const GENERATE: &str = "generate";
const EXECUTE: &str = "execute";
const VALIDATE: &str = "validate";

/// Every shared service a pipeline node needs, constructed once at startup
/// and handed to every run (spec §9 redesign flag: "constructed LLM
/// provider passed explicitly ... no global singleton").
pub struct PipelineContext {
    pub planner: Arc<Planner>,
    pub generator: Arc<Generator>,
    pub validator: Arc<Validator>,
    pub cad_runner: Arc<CadRunner>,
    pub store: Arc<dyn RunStateStore>,
    pub audit: Arc<AuditLog>,
    pub cancellation: Arc<CancellationRegistry>,
    pub scratch_dir: std::path::PathBuf,
    pub cad_timeout_seconds: u64,
    pub agent_timeouts: AgentTimeouts,
}

type NodeFuture = Pin<Box<dyn Future<Output = GraphResult<Value>> + Send>>;

fn to_value(state: &RunState) -> GraphResult<Value> {
    serde_json::to_value(state).map_err(|e| GraphError::Execution(format!("serializing run state: {e}")))
}

fn from_value(value: Value) -> GraphResult<RunState> {
    serde_json::from_value(value).map_err(|e| GraphError::Execution(format!("deserializing run state: {e}")))
}

/// Checked at the top of every node body (spec §5: "checks a cancellation
/// flag at each state transition"). If set and the run is not already
/// terminal, transitions it to CANCELLED and persists/audits that instead
/// of doing the stage's real work.
async fn check_cancelled(ctx: &PipelineContext, state: &mut RunState, flag: &AtomicBool) -> bool {
    if !flag.load(Ordering::SeqCst) || state.is_terminal() {
        return false;
    }
    let _ = state.cancel();
    persist_and_audit(ctx, state, domain::AuditEventType::RunCancelled).await;
    true
}

async fn persist_and_audit(ctx: &PipelineContext, state: &RunState, event_type: domain::AuditEventType) {
    if let Err(e) = ctx.store.save(state).await {
        tracing::warn!(error = %e, run_id = %state.run_id, "failed to persist run state snapshot");
    }
    ctx.audit
        .log_event(
            state.run_id,
            event_type,
            serde_json::json!({ "status": format!("{:?}", state.status), "iteration": state.iteration }),
            state.correlation_id.clone(),
        )
        .await;
    if state.is_terminal() {
        ctx.cancellation.forget(state.run_id);
    }
}

fn cancellation_flag(ctx: &PipelineContext, run_id: uuid::Uuid) -> Arc<AtomicBool> {
    ctx.cancellation.register(run_id)
}

/// Wraps `future` in a per-call timeout (spec §4.10 "Timeouts"). A timeout
/// breach is reported as `ErrorCategory::InternalError` with a message
/// identifying the stage, per §7's "breaches produce FAIL, not retry."
async fn with_stage_timeout<T, E, F>(seconds: u64, stage: &str, future: F) -> Result<T, (ErrorCategory, String)>
where
    F: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    match with_timeout(Duration::from_secs(seconds), future).await {
        Ok(value) => Ok(value),
        Err(TimeoutError::OperationFailed(_)) => unreachable!("mapped below"),
        Err(TimeoutError::Timeout(d)) => Err((
            ErrorCategory::InternalError,
            format!("{stage} exceeded its {}s timeout", d.as_secs()),
        )),
    }
}

fn plan_node(ctx: Arc<PipelineContext>) -> impl Fn(Value) -> NodeFuture + Send + Sync + 'static {
    move |value: Value| {
        let ctx = ctx.clone();
        Box::pin(async move {
            let mut state = from_value(value)?;
            let flag = cancellation_flag(&ctx, state.run_id);
            if check_cancelled(&ctx, &mut state, &flag).await {
                return to_value(&state);
            }

            if state.status == RunStatus::Pending {
                state
                    .transition_to(RunStatus::Planning)
                    .map_err(|e| GraphError::Execution(e.to_string()))?;
            }

            if state.user_prompt.trim().is_empty() {
                let _ = state.fail(ErrorCategory::InputError, "user prompt is empty");
                persist_and_audit(&ctx, &state, domain::AuditEventType::RunFailed).await;
                return to_value(&state);
            }

            let timeout_seconds = ctx.agent_timeouts.planner_seconds;
            match with_timeout(Duration::from_secs(timeout_seconds), ctx.planner.run(&state)).await {
                Ok(Ok(AgentOutcome::Planned(graph))) => {
                    state.task_graph = Some(graph);
                    state
                        .transition_to(RunStatus::Generating)
                        .map_err(|e| GraphError::Execution(e.to_string()))?;
                    persist_and_audit(&ctx, &state, domain::AuditEventType::PlanGenerated).await;
                }
                Ok(Ok(_)) => unreachable!("Planner::run always returns AgentOutcome::Planned"),
                Ok(Err(err)) => {
                    let category = category_for_agent_error(Stage::Plan, &err);
                    let _ = state.fail(category, err.to_string());
                    persist_and_audit(&ctx, &state, domain::AuditEventType::RunFailed).await;
                }
                Err(TimeoutError::OperationFailed(_)) => unreachable!(),
                Err(TimeoutError::Timeout(d)) => {
                    let _ = state.fail(
                        ErrorCategory::PlanningError,
                        format!("planner exceeded its {}s timeout", d.as_secs()),
                    );
                    persist_and_audit(&ctx, &state, domain::AuditEventType::RunFailed).await;
                }
            }

            to_value(&state)
        })
    }
}

fn generate_node(ctx: Arc<PipelineContext>) -> impl Fn(Value) -> NodeFuture + Send + Sync + 'static {
    move |value: Value| {
        let ctx = ctx.clone();
        Box::pin(async move {
            let mut state = from_value(value)?;
            let flag = cancellation_flag(&ctx, state.run_id);
            if check_cancelled(&ctx, &mut state, &flag).await {
                return to_value(&state);
            }

            let timeout_seconds = ctx.agent_timeouts.generator_seconds;
            match with_timeout(Duration::from_secs(timeout_seconds), ctx.generator.run(&state)).await {
                Ok(Ok(AgentOutcome::Generated(script))) => {
                    state.current_script = Some(script);
                    state
                        .transition_to(RunStatus::Executing)
                        .map_err(|e| GraphError::Execution(e.to_string()))?;
                    persist_and_audit(&ctx, &state, domain::AuditEventType::ScriptGenerated).await;
                }
                Ok(Ok(_)) => unreachable!("Generator::run always returns AgentOutcome::Generated"),
                Ok(Err(err)) => {
                    let category = category_for_agent_error(Stage::Generate, &err);
                    let _ = state.fail(category, err.to_string());
                    persist_and_audit(&ctx, &state, domain::AuditEventType::RunFailed).await;
                }
                Err(TimeoutError::OperationFailed(_)) => unreachable!(),
                Err(TimeoutError::Timeout(d)) => {
                    let _ = state.fail(
                        ErrorCategory::GenerationError,
                        format!("generator exceeded its {}s timeout", d.as_secs()),
                    );
                    persist_and_audit(&ctx, &state, domain::AuditEventType::RunFailed).await;
                }
            }

            to_value(&state)
        })
    }
}

fn execute_node(ctx: Arc<PipelineContext>) -> impl Fn(Value) -> NodeFuture + Send + Sync + 'static {
    move |value: Value| {
        let ctx = ctx.clone();
        Box::pin(async move {
            let mut state = from_value(value)?;
            let flag = cancellation_flag(&ctx, state.run_id);
            if check_cancelled(&ctx, &mut state, &flag).await {
                return to_value(&state);
            }

            persist_and_audit(&ctx, &state, domain::AuditEventType::ExecutionStarted).await;

            let script = state
                .current_script
                .as_ref()
                .ok_or_else(|| GraphError::Execution("execute node reached with no current_script".into()))?;
            let script_path = cad_runner::stage_script(&ctx.scratch_dir, &state.run_id.to_string(), &script.source_text)
                .await
                .map_err(|e| GraphError::Execution(e.to_string()))?;

            let result = ctx.cad_runner.run_script(&script_path, ctx.cad_timeout_seconds).await;
            state.execution_result = Some(result);
            state
                .transition_to(RunStatus::Validating)
                .map_err(|e| GraphError::Execution(e.to_string()))?;
            persist_and_audit(&ctx, &state, domain::AuditEventType::ExecutionCompleted).await;

            to_value(&state)
        })
    }
}

fn validate_node(ctx: Arc<PipelineContext>) -> impl Fn(Value) -> NodeFuture + Send + Sync + 'static {
    move |value: Value| {
        let ctx = ctx.clone();
        Box::pin(async move {
            let mut state = from_value(value)?;
            let flag = cancellation_flag(&ctx, state.run_id);
            if check_cancelled(&ctx, &mut state, &flag).await {
                return to_value(&state);
            }

            let timeout_seconds = ctx.agent_timeouts.validator_seconds;
            match with_timeout(Duration::from_secs(timeout_seconds), ctx.validator.run(&state)).await {
                Ok(Ok(AgentOutcome::Validated(result))) => {
                    apply_validation_decision(&mut state, result);
                }
                Ok(Ok(_)) => unreachable!("Validator::run always returns AgentOutcome::Validated"),
                Ok(Err(err)) => {
                    let category = category_for_agent_error(Stage::Validate, &err);
                    let _ = state.fail(category, err.to_string());
                }
                Err(TimeoutError::OperationFailed(_)) => unreachable!(),
                Err(TimeoutError::Timeout(d)) => {
                    let _ = state.fail(
                        ErrorCategory::ValidationError,
                        format!("validator exceeded its {}s timeout", d.as_secs()),
                    );
                }
            }

            let event_type = match state.status {
                RunStatus::Succeeded => domain::AuditEventType::RunSucceeded,
                RunStatus::Failed => domain::AuditEventType::RunFailed,
                RunStatus::Generating | RunStatus::Planning => domain::AuditEventType::RefinementStarted,
                _ => domain::AuditEventType::ValidationCompleted,
            };
            persist_and_audit(&ctx, &state, event_type).await;

            to_value(&state)
        })
    }
}

/// Applies the VALIDATING row of the spec §4.10 transition table: PASS ends
/// the run successfully; REFINE loops to the Generator while iteration
/// budget remains, else FAILED with `iteration_exhausted`; FAIL replans
/// through the Planner while under half the iteration budget, else FAILED.
fn apply_validation_decision(state: &mut RunState, result: domain::ValidationResult) {
    use domain::ValidationDecision::*;
    let decision = result.decision;
    state.validation_result = Some(result);

    match decision {
        Pass => {
            let _ = state.succeed();
        }
        Refine => {
            if state.iteration < state.max_iterations {
                state.iteration += 1;
                let _ = state.transition_to(RunStatus::Generating);
            } else {
                let _ = state.fail(ErrorCategory::IterationExhausted, "refine loop reached max_iterations");
            }
        }
        Fail => {
            if state.iteration < state.max_iterations / 2 {
                state.iteration += 1;
                // Replanning starts over from a fresh task graph, so the
                // Generator must not mistake this for a REFINE re-entry and
                // try to patch the stale script against a validation result
                // from the plan being discarded (spec §4.6 scopes refinement
                // mode to REFINE re-entry only).
                state.validation_result = None;
                let _ = state.transition_to(RunStatus::Planning);
            } else {
                let _ = state.fail(
                    ErrorCategory::ValidationError,
                    "validator decided FAIL at or past half the iteration budget",
                );
            }
        }
    }
}

/// Routes purely on the current `RunStatus`: terminal statuses end the
/// graph, non-terminal statuses route to the node named after the status
/// (every node already performed its own transition before returning).
fn route_by_status(value: &Value) -> ConditionalEdgeResult {
    let status = value
        .get("status")
        .and_then(|v| v.as_str())
        .unwrap_or("failed");
    match status {
        "planning" => PLAN.into(),
        "generating" => GENERATE.into(),
        "executing" => EXECUTE.into(),
        "validating" => VALIDATE.into(),
        _ => langgraph_core::graph::END.into(),
    }
}

fn status_branches() -> HashMap<String, String> {
    let mut branches = HashMap::new();
    branches.insert("plan".to_string(), PLAN.to_string());
    branches.insert("generate".to_string(), GENERATE.to_string());
    branches.insert("execute".to_string(), EXECUTE.to_string());
    branches.insert("validate".to_string(), VALIDATE.to_string());
    branches.insert("end".to_string(), langgraph_core::graph::END.to_string());
    branches
}

/// Builds the compiled pipeline graph (spec §4.10): `plan -> generate ->
/// execute -> validate`, with `validate` able to loop back to `generate`
/// (REFINE) or `plan` (FAIL/replan), every edge's routing driven by
/// `route_by_status` since each node already applied its own transition.
pub fn build_graph(ctx: Arc<PipelineContext>) -> GraphResult<CompiledGraph> {
    let mut graph = StateGraph::new();

    graph.add_node(PLAN, plan_node(ctx.clone()));
    graph.add_node(GENERATE, generate_node(ctx.clone()));
    graph.add_node(EXECUTE, execute_node(ctx.clone()));
    graph.add_node(VALIDATE, validate_node(ctx));

    graph.set_entry(PLAN);
    graph.add_conditional_edge(PLAN, route_by_status, status_branches());
    graph.add_conditional_edge(GENERATE, route_by_status, status_branches());
    graph.add_conditional_edge(EXECUTE, route_by_status, status_branches());
    graph.add_conditional_edge(VALIDATE, route_by_status, status_branches());

    graph.compile()
}
