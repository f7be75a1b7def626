use serde::{Deserialize, Serialize};

/// Número de secuencia de una tarea dentro de su fase (denso, 0..n-1).
pub type TaskSeq = usize;

/// Fase global del job. Solo avanza: Map -> Reduce -> Done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Map,
    Reduce,
    Done,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Map => write!(f, "map"),
            Phase::Reduce => write!(f, "reduce"),
            Phase::Done => write!(f, "done"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapTask {
    pub seq: TaskSeq,
    /// Ruta del archivo de entrada
    pub input: String,
    /// Cantidad de particiones reduce (para repartir la salida intermedia)
    pub n_reduce: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReduceTask {
    /// Índice de partición reduce
    pub seq: TaskSeq,
    /// Cantidad de tareas map del job
    pub n_map: usize,
    /// Salidas intermedias acumuladas en la fase map
    pub inputs: Vec<String>,
}

/// Unidad de trabajo que el coordinador entrega a un worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Task {
    Map(MapTask),
    Reduce(ReduceTask),
}

impl Task {
    pub fn phase(&self) -> Phase {
        match self {
            Task::Map(_) => Phase::Map,
            Task::Reduce(_) => Phase::Reduce,
        }
    }

    pub fn seq(&self) -> TaskSeq {
        match self {
            Task::Map(t) => t.seq,
            Task::Reduce(t) => t.seq,
        }
    }

    /// Referencias de entrada tal como se entregaron al worker.
    pub fn inputs(&self) -> Vec<String> {
        match self {
            Task::Map(t) => vec![t.input.clone()],
            Task::Reduce(t) => t.inputs.clone(),
        }
    }
}
