use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::Phase;

/// Foto del estado del job en el coordinador.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub phase: Phase,

    /// -------- Tamaños fijos del job --------
    pub n_map: usize,
    pub n_reduce: usize,
    pub task_timeout_secs: u64,

    /// -------- Progreso --------
    pub completed_map: usize,
    pub completed_reduce: usize,
    pub pending: usize,
    pub in_flight: usize,
    /// Tareas devueltas a la cola (watchdog o requeue manual)
    pub requeued: u64,
    /// Reportes descartados por duplicados o tardíos
    pub discarded_reports: u64,

    pub started_at: DateTime<Utc>,
    pub reduce_started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDoneResponse {
    pub done: bool,
}
