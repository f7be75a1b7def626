use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::{Phase, TaskSeq};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("tarea {phase} {seq} desconocida")]
    UnknownTask { phase: Phase, seq: TaskSeq },

    #[error("las entradas de la tarea {phase} {seq} no coinciden con las asignadas")]
    InputMismatch { phase: Phase, seq: TaskSeq },

    #[error("job vacío: {0}")]
    EmptyJob(&'static str),

    #[error("lock del estado envenenado")]
    LockPoisoned,
}

impl IntoResponse for SchedulerError {
    fn into_response(self) -> Response {
        let status = match self {
            SchedulerError::UnknownTask { .. } => StatusCode::NOT_FOUND,
            SchedulerError::InputMismatch { .. } => StatusCode::CONFLICT,
            SchedulerError::EmptyJob(_) => StatusCode::BAD_REQUEST,
            SchedulerError::LockPoisoned => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
