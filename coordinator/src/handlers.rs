use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use common::{
    JobDoneResponse, JobResults, JobStatus, TaskAssignment, TaskCompleteRequest,
    TaskCompleteResponse, TaskRequest, TaskRequeueRequest, TaskRequeueResponse,
};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::SchedulerError;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/tasks/next", post(assign_task))
        .route("/api/v1/tasks/complete", post(complete_task))
        .route("/api/v1/tasks/requeue", post(requeue_task))
        .route("/api/v1/job", get(get_job))
        .route("/api/v1/job/done", get(job_done))
        .route("/api/v1/job/results", get(get_job_results))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/* ---------------- handlers HTTP ---------------- */

async fn health() -> &'static str {
    "ok"
}

// Asigna la siguiente tarea de la fase actual (si hay)
async fn assign_task(
    State(state): State<AppState>,
    Json(req): Json<TaskRequest>,
) -> Result<Json<TaskAssignment>, SchedulerError> {
    let assignment = state.scheduler.request_task(req.worker_id.as_deref())?;
    Ok(Json(assignment))
}

// Worker reporta que terminó una tarea
async fn complete_task(
    State(state): State<AppState>,
    Json(req): Json<TaskCompleteRequest>,
) -> Result<Json<TaskCompleteResponse>, SchedulerError> {
    if let Some(worker) = &req.worker_id {
        info!("worker {} reporta tarea {} {}", worker, req.phase, req.seq);
    }
    let resp = state
        .scheduler
        .report_task(req.phase, req.seq, req.outputs)?;
    Ok(Json(resp))
}

// Reencola una tarea en vuelo sin esperar al timeout
async fn requeue_task(
    State(state): State<AppState>,
    Json(req): Json<TaskRequeueRequest>,
) -> Result<Json<TaskRequeueResponse>, SchedulerError> {
    let resp = state
        .scheduler
        .force_requeue(req.phase, req.seq, &req.inputs)?;
    Ok(Json(resp))
}

async fn get_job(State(state): State<AppState>) -> Result<Json<JobStatus>, SchedulerError> {
    Ok(Json(state.scheduler.status()?))
}

async fn job_done(State(state): State<AppState>) -> Result<Json<JobDoneResponse>, SchedulerError> {
    let done = state.scheduler.is_done()?;
    Ok(Json(JobDoneResponse { done }))
}

async fn get_job_results(
    State(state): State<AppState>,
) -> Result<Json<JobResults>, SchedulerError> {
    Ok(Json(state.scheduler.results()?))
}
