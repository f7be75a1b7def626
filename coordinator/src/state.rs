// coordinator/src/state.rs

use std::sync::Arc;

use crate::scheduler::Scheduler;

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<Scheduler>,
}

impl AppState {
    pub fn new(scheduler: Scheduler) -> Self {
        Self {
            scheduler: Arc::new(scheduler),
        }
    }
}
