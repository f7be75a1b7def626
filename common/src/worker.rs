use serde::{Deserialize, Serialize};

use crate::task::{Phase, Task, TaskSeq};

pub type WorkerId = String;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskRequest {
    /// Solo para logs; el coordinador no asigna por identidad.
    #[serde(default)]
    pub worker_id: Option<WorkerId>,
}

/// Respuesta a un pedido de tarea.
///
/// `WaitRetry` significa que la fase sigue abierta pero no hay nada pendiente
/// ahora mismo; `NoWorkLeft` que el job terminó.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskAssignment {
    Assigned { task: Task },
    WaitRetry,
    NoWorkLeft,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCompleteRequest {
    pub phase: Phase,
    pub seq: TaskSeq,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub worker_id: Option<WorkerId>,
}

/// Qué hizo el coordinador con un reporte de finalización.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompletionOutcome {
    /// Primera finalización de la tarea: contada y salidas agregadas.
    Accepted,
    /// La tarea ya estaba completada por otro worker.
    Duplicate,
    /// El reporte es de una fase que ya terminó.
    Stale,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCompleteResponse {
    pub ok: bool,
    pub outcome: CompletionOutcome,
    pub phase: Phase,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequeueRequest {
    pub phase: Phase,
    pub seq: TaskSeq,
    /// Entradas originales de la tarea, tal como las recibió el worker
    pub inputs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequeueResponse {
    pub ok: bool,
    /// false si la tarea ya estaba en cola, completada o reencolada por el watchdog
    pub requeued: bool,
}
