use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResults {
    pub done: bool,
    /// Salidas intermedias en orden de aceptación (entrada de la fase reduce)
    pub map_outputs: Vec<String>,
    /// Archivos finales producidos por las tareas reduce
    pub outputs: Vec<String>,
}
