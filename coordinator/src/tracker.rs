use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    },
};

use common::{Task, TaskSeq};
use tokio::{sync::Notify, time::Instant};

const RUNNING: u8 = 0;
const COMPLETED: u8 = 1;
const RECLAIMED: u8 = 2;

/// Estado en vuelo de un despacho concreto de una tarea.
///
/// Cada despacho crea un record nuevo; un record que ya salió de `RUNNING`
/// no vuelve a usarse.
#[derive(Debug)]
pub struct TaskRecord {
    pub task: Task,
    pub dispatched_at: Instant,
    state: AtomicU8,
    done: Notify,
}

impl TaskRecord {
    fn new(task: Task) -> Self {
        Self {
            task,
            dispatched_at: Instant::now(),
            state: AtomicU8::new(RUNNING),
            done: Notify::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::Acquire) == RUNNING
    }

    fn transition(&self, to: u8) -> bool {
        let won = self
            .state
            .compare_exchange(RUNNING, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            // notify_one guarda el permiso si el watchdog todavía no espera
            self.done.notify_one();
        }
        won
    }

    /// RUNNING -> COMPLETED. Despierta al watchdog.
    pub fn complete(&self) -> bool {
        self.transition(COMPLETED)
    }

    /// RUNNING -> RECLAIMED. Solo uno de watchdog / requeue manual gana.
    pub fn reclaim(&self) -> bool {
        self.transition(RECLAIMED)
    }

    /// Se resuelve cuando el record sale de `RUNNING` por cualquier camino.
    pub async fn finished(&self) {
        self.done.notified().await
    }
}

/// Records en vuelo de una fase, indexados por número de secuencia.
#[derive(Debug, Default)]
pub struct TaskTracker {
    records: HashMap<TaskSeq, Arc<TaskRecord>>,
}

impl TaskTracker {
    /// Registra un despacho nuevo y devuelve el record para su watchdog.
    pub fn record(&mut self, task: Task) -> Arc<TaskRecord> {
        let record = Arc::new(TaskRecord::new(task));
        self.records.insert(record.task.seq(), Arc::clone(&record));
        record
    }

    pub fn get(&self, seq: TaskSeq) -> Option<&Arc<TaskRecord>> {
        self.records.get(&seq)
    }

    /// Marca como completado el despacho vivo de `seq`. Si el watchdog ya lo
    /// reclamó (o no hay record) no hace nada.
    pub fn signal_done(&self, seq: TaskSeq) -> bool {
        self.records
            .get(&seq)
            .map(|record| record.complete())
            .unwrap_or(false)
    }

    pub fn in_flight(&self) -> usize {
        self.records.values().filter(|r| r.is_running()).count()
    }

    /// Detiene todos los watchdogs de la fase. Devuelve cuántos seguían vivos.
    pub fn finish_all(&self) -> usize {
        self.records.values().filter(|r| r.complete()).count()
    }
}
