use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{task::JoinHandle, time::timeout_at};
use tracing::{debug, warn};

use crate::{queue::TaskQueue, tracker::TaskRecord};

/// Lanza el watchdog de un despacho:
/// - si la tarea termina (o alguien más la reclama) antes del deadline, sale
/// - si vence el deadline, reclama la tarea y la devuelve al final de su cola
///
/// Espera bloqueado sobre la señal del record con el tiempo restante como
/// límite; no hace polling.
pub fn spawn(
    record: Arc<TaskRecord>,
    queue: Arc<TaskQueue>,
    timeout: Duration,
    requeued: Arc<AtomicU64>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let deadline = record.dispatched_at + timeout;

        if record.is_running() && timeout_at(deadline, record.finished()).await.is_err() {
            if record.reclaim() {
                let task = &record.task;
                warn!(
                    "tarea {} {} sin respuesta tras {:?} (¿worker caído?), reencolando input={:?}",
                    task.phase(),
                    task.seq(),
                    timeout,
                    task.inputs(),
                );
                requeued.fetch_add(1, Ordering::Relaxed);
                queue.push(record.task.clone());
                return;
            }
        }

        debug!(
            "watchdog de tarea {} {} terminado",
            record.task.phase(),
            record.task.seq()
        );
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::TaskTracker;
    use common::{MapTask, Task};

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn map_task(seq: usize) -> Task {
        Task::Map(MapTask {
            seq,
            input: format!("in-{}", seq),
            n_reduce: 1,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn requeues_after_deadline() {
        let mut tracker = TaskTracker::default();
        let queue = Arc::new(TaskQueue::with_capacity(1));
        let requeued = Arc::new(AtomicU64::new(0));

        let record = tracker.record(map_task(0));
        let handle = spawn(record, Arc::clone(&queue), TIMEOUT, Arc::clone(&requeued));

        handle.await.unwrap();

        assert_eq!(queue.pop(), Some(map_task(0)));
        assert_eq!(queue.len(), 0);
        assert_eq!(requeued.load(Ordering::Relaxed), 1);
        assert_eq!(tracker.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn exits_without_requeue_on_completion() {
        let mut tracker = TaskTracker::default();
        let queue = Arc::new(TaskQueue::with_capacity(1));
        let requeued = Arc::new(AtomicU64::new(0));

        let record = tracker.record(map_task(0));
        let handle = spawn(record, Arc::clone(&queue), TIMEOUT, Arc::clone(&requeued));

        tokio::time::sleep(TIMEOUT / 2).await;
        assert!(tracker.signal_done(0));
        handle.await.unwrap();

        tokio::time::sleep(TIMEOUT * 2).await;
        assert_eq!(queue.len(), 0);
        assert_eq!(requeued.load(Ordering::Relaxed), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn does_not_requeue_a_task_already_reclaimed() {
        let mut tracker = TaskTracker::default();
        let queue = Arc::new(TaskQueue::with_capacity(1));
        let requeued = Arc::new(AtomicU64::new(0));

        let record = tracker.record(map_task(0));
        let handle = spawn(
            Arc::clone(&record),
            Arc::clone(&queue),
            TIMEOUT,
            Arc::clone(&requeued),
        );

        // requeue manual gana la carrera
        assert!(record.reclaim());
        queue.push(record.task.clone());

        handle.await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(requeued.load(Ordering::Relaxed), 0);
    }
}
