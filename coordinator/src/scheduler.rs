use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use common::{
    CompletionOutcome, JobResults, JobStatus, MapTask, Phase, ReduceTask, Task, TaskAssignment,
    TaskCompleteResponse, TaskRequeueResponse, TaskSeq,
};
use tracing::{debug, info, warn};

use crate::{error::SchedulerError, queue::TaskQueue, tracker::TaskTracker, watchdog};

/// Parámetros fijos del job, capturados al arrancar.
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub inputs: Vec<String>,
    pub n_reduce: usize,
    pub task_timeout: Duration,
}

/// Progreso de una fase: cuántas tareas terminaron, cuáles, y qué produjeron.
#[derive(Debug)]
struct PhaseProgress {
    total: usize,
    completed: usize,
    // primera aceptación por número de secuencia
    done: Vec<bool>,
    tracker: TaskTracker,
    outputs: Vec<String>,
}

impl PhaseProgress {
    fn new(total: usize) -> Self {
        Self {
            total,
            completed: 0,
            done: vec![false; total],
            tracker: TaskTracker::default(),
            outputs: Vec::new(),
        }
    }

    fn is_done(&self, seq: TaskSeq) -> bool {
        self.done.get(seq).copied().unwrap_or(false)
    }
}

#[derive(Debug)]
struct JobState {
    phase: Phase,
    map: PhaseProgress,
    reduce: PhaseProgress,
    discarded_reports: u64,
    reduce_started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl JobState {
    fn progress(&self, phase: Phase) -> Option<&PhaseProgress> {
        match phase {
            Phase::Map => Some(&self.map),
            Phase::Reduce => Some(&self.reduce),
            Phase::Done => None,
        }
    }

    fn progress_mut(&mut self, phase: Phase) -> Option<&mut PhaseProgress> {
        match phase {
            Phase::Map => Some(&mut self.map),
            Phase::Reduce => Some(&mut self.reduce),
            Phase::Done => None,
        }
    }
}

/// Controlador de fases del job.
///
/// Fase, contadores, trackers y acumuladores viven detrás de un único mutex.
/// Las colas tienen su propio lock para que el watchdog reencole sin tomarlo.
/// Orden de locks: estado -> cola, nunca al revés.
#[derive(Debug)]
pub struct Scheduler {
    n_map: usize,
    n_reduce: usize,
    task_timeout: Duration,
    started_at: DateTime<Utc>,

    state: Mutex<JobState>,
    map_queue: Arc<TaskQueue>,
    reduce_queue: Arc<TaskQueue>,
    requeued: Arc<AtomicU64>,
}

impl Scheduler {
    pub fn new(config: JobConfig) -> Result<Self, SchedulerError> {
        if config.inputs.is_empty() {
            return Err(SchedulerError::EmptyJob("no hay archivos de entrada"));
        }
        if config.n_reduce == 0 {
            return Err(SchedulerError::EmptyJob("n_reduce debe ser mayor que cero"));
        }

        let n_map = config.inputs.len();
        let n_reduce = config.n_reduce;

        let map_queue = TaskQueue::with_capacity(n_map);
        for (seq, input) in config.inputs.into_iter().enumerate() {
            map_queue.push(Task::Map(MapTask {
                seq,
                input,
                n_reduce,
            }));
        }

        Ok(Self {
            n_map,
            n_reduce,
            task_timeout: config.task_timeout,
            started_at: Utc::now(),
            state: Mutex::new(JobState {
                phase: Phase::Map,
                map: PhaseProgress::new(n_map),
                reduce: PhaseProgress::new(n_reduce),
                discarded_reports: 0,
                reduce_started_at: None,
                finished_at: None,
            }),
            map_queue: Arc::new(map_queue),
            reduce_queue: Arc::new(TaskQueue::with_capacity(n_reduce)),
            requeued: Arc::new(AtomicU64::new(0)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, JobState>, SchedulerError> {
        self.state.lock().map_err(|_| SchedulerError::LockPoisoned)
    }

    fn queue(&self, phase: Phase) -> Option<&Arc<TaskQueue>> {
        match phase {
            Phase::Map => Some(&self.map_queue),
            Phase::Reduce => Some(&self.reduce_queue),
            Phase::Done => None,
        }
    }

    /// Entrega la siguiente tarea pendiente de la fase actual.
    pub fn request_task(&self, worker_id: Option<&str>) -> Result<TaskAssignment, SchedulerError> {
        let worker = worker_id.unwrap_or("-");
        let mut state = self.lock()?;
        let phase = state.phase;

        let (Some(queue), Some(progress)) = (self.queue(phase), state.progress_mut(phase)) else {
            debug!("worker {} pidió tarea pero el job terminó", worker);
            return Ok(TaskAssignment::NoWorkLeft);
        };

        let task = loop {
            match queue.pop() {
                None => {
                    debug!(
                        "worker {} pidió tarea {} pero no hay en cola ({} en vuelo)",
                        worker,
                        phase,
                        progress.tracker.in_flight()
                    );
                    return Ok(TaskAssignment::WaitRetry);
                }
                // quedó en cola tras un timeout pero un rezagado la terminó
                Some(task) if progress.is_done(task.seq()) => {
                    debug!("descartando entrada obsoleta {} {}", phase, task.seq());
                }
                Some(task) => break task,
            }
        };

        let record = progress.tracker.record(task.clone());
        watchdog::spawn(
            record,
            Arc::clone(queue),
            self.task_timeout,
            Arc::clone(&self.requeued),
        );

        debug!(
            "asignando tarea {} {} (input={:?}) al worker {}",
            phase,
            task.seq(),
            task.inputs(),
            worker
        );
        Ok(TaskAssignment::Assigned { task })
    }

    /// Registra la finalización de una tarea. Solo la primera finalización de
    /// cada número de secuencia cuenta y agrega salidas.
    pub fn report_task(
        &self,
        phase: Phase,
        seq: TaskSeq,
        outputs: Vec<String>,
    ) -> Result<TaskCompleteResponse, SchedulerError> {
        let mut state = self.lock()?;
        let current = state.phase;

        if phase == Phase::Done || phase > current {
            return Err(SchedulerError::UnknownTask { phase, seq });
        }

        if phase < current {
            state.discarded_reports += 1;
            info!("reporte tardío de tarea {} {} (fase actual {}), descartado", phase, seq, current);
            return Ok(TaskCompleteResponse {
                ok: true,
                outcome: CompletionOutcome::Stale,
                phase: current,
            });
        }

        let Some(progress) = state.progress_mut(phase) else {
            return Err(SchedulerError::UnknownTask { phase, seq });
        };
        if seq >= progress.total {
            return Err(SchedulerError::UnknownTask { phase, seq });
        }

        if progress.done[seq] {
            state.discarded_reports += 1;
            info!("tarea {} {} ya estaba completada, reporte duplicado descartado", phase, seq);
            return Ok(TaskCompleteResponse {
                ok: true,
                outcome: CompletionOutcome::Duplicate,
                phase: current,
            });
        }

        progress.done[seq] = true;
        progress.completed += 1;
        progress.tracker.signal_done(seq);
        progress.outputs.extend(outputs);
        info!(
            "tarea {} {} completada ({}/{})",
            phase, seq, progress.completed, progress.total
        );

        if progress.completed == progress.total {
            self.advance(&mut state);
        }

        Ok(TaskCompleteResponse {
            ok: true,
            outcome: CompletionOutcome::Accepted,
            phase: state.phase,
        })
    }

    /// Map -> Reduce materializa las tareas reduce; Reduce -> Done cierra el job.
    fn advance(&self, state: &mut JobState) {
        match state.phase {
            Phase::Map => {
                let stopped = state.map.tracker.finish_all();
                let stale = self.map_queue.drain().len();
                debug!(
                    "cerrando fase map: {} watchdogs detenidos, {} entradas obsoletas descartadas",
                    stopped, stale
                );

                for seq in 0..self.n_reduce {
                    self.reduce_queue.push(Task::Reduce(ReduceTask {
                        seq,
                        n_map: self.n_map,
                        inputs: state.map.outputs.clone(),
                    }));
                }
                state.phase = Phase::Reduce;
                state.reduce_started_at = Some(Utc::now());
                info!(
                    "fase map completa ({} salidas intermedias), encoladas {} tareas reduce",
                    state.map.outputs.len(),
                    self.n_reduce
                );
            }
            Phase::Reduce => {
                let stopped = state.reduce.tracker.finish_all();
                let stale = self.reduce_queue.drain().len();
                debug!(
                    "cerrando fase reduce: {} watchdogs detenidos, {} entradas obsoletas descartadas",
                    stopped, stale
                );

                state.phase = Phase::Done;
                state.finished_at = Some(Utc::now());
                info!("job terminado, salidas: {:?}", state.reduce.outputs);
            }
            Phase::Done => {}
        }
    }

    /// Devuelve una tarea en vuelo a su cola sin esperar al watchdog.
    /// Si la tarea ya no está en vuelo (completada, en cola o reclamada por
    /// el watchdog) no hace nada.
    pub fn force_requeue(
        &self,
        phase: Phase,
        seq: TaskSeq,
        inputs: &[String],
    ) -> Result<TaskRequeueResponse, SchedulerError> {
        let state = self.lock()?;
        let not_requeued = TaskRequeueResponse {
            ok: true,
            requeued: false,
        };

        if phase == Phase::Done || phase > state.phase {
            return Err(SchedulerError::UnknownTask { phase, seq });
        }
        if phase < state.phase {
            return Ok(not_requeued);
        }

        let (Some(queue), Some(progress)) = (self.queue(phase), state.progress(phase)) else {
            return Err(SchedulerError::UnknownTask { phase, seq });
        };
        if seq >= progress.total {
            return Err(SchedulerError::UnknownTask { phase, seq });
        }
        if progress.is_done(seq) {
            return Ok(not_requeued);
        }

        let Some(record) = progress.tracker.get(seq) else {
            return Ok(not_requeued);
        };
        if !record.is_running() {
            return Ok(not_requeued);
        }
        if record.task.inputs() != inputs {
            return Err(SchedulerError::InputMismatch { phase, seq });
        }
        if !record.reclaim() {
            return Ok(not_requeued);
        }

        self.requeued.fetch_add(1, Ordering::Relaxed);
        queue.push(record.task.clone());
        warn!("tarea {} {} reencolada manualmente", phase, seq);

        Ok(TaskRequeueResponse {
            ok: true,
            requeued: true,
        })
    }

    pub fn is_done(&self) -> Result<bool, SchedulerError> {
        Ok(self.lock()?.phase == Phase::Done)
    }

    pub fn status(&self) -> Result<JobStatus, SchedulerError> {
        let state = self.lock()?;
        let phase = state.phase;

        let progress = state.progress(phase);
        // las copias reencoladas de tareas que un rezagado ya completó no cuentan
        let pending = match (self.queue(phase), progress) {
            (Some(q), Some(p)) => q.count_where(|t| !p.is_done(t.seq())),
            _ => 0,
        };
        let in_flight = progress.map(|p| p.tracker.in_flight()).unwrap_or(0);

        Ok(JobStatus {
            phase,
            n_map: self.n_map,
            n_reduce: self.n_reduce,
            task_timeout_secs: self.task_timeout.as_secs(),
            completed_map: state.map.completed,
            completed_reduce: state.reduce.completed,
            pending,
            in_flight,
            requeued: self.requeued.load(Ordering::Relaxed),
            discarded_reports: state.discarded_reports,
            started_at: self.started_at,
            reduce_started_at: state.reduce_started_at,
            finished_at: state.finished_at,
        })
    }

    pub fn results(&self) -> Result<JobResults, SchedulerError> {
        let state = self.lock()?;
        Ok(JobResults {
            done: state.phase == Phase::Done,
            map_outputs: state.map.outputs.clone(),
            outputs: state.reduce.outputs.clone(),
        })
    }
}
