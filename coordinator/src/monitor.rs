use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info};

use crate::state::AppState;

pub const DONE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Consulta periódicamente si el job terminó. Cuando termina espera `grace`
/// para que los workers que siguen pidiendo tareas reciban `NO_WORK_LEFT`
/// y recién ahí retorna.
pub async fn wait_for_job_done(state: AppState, poll: Duration, grace: Duration) {
    loop {
        sleep(poll).await;

        match state.scheduler.is_done() {
            Ok(true) => break,
            Ok(false) => {}
            Err(e) => {
                // sin estado consistente no hay forma de seguir el job
                error!("no se pudo leer el estado del job: {}", e);
                return;
            }
        }
    }

    info!("job terminado, apagando el coordinador en {:?}", grace);
    sleep(grace).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{JobConfig, Scheduler};
    use common::TaskAssignment;

    fn state() -> AppState {
        AppState::new(
            Scheduler::new(JobConfig {
                inputs: vec!["pg-0.txt".into()],
                n_reduce: 1,
                task_timeout: Duration::from_secs(10),
            })
            .unwrap(),
        )
    }

    fn run_task(state: &AppState, output: &str) {
        let TaskAssignment::Assigned { task } = state.scheduler.request_task(None).unwrap() else {
            panic!("esperaba una tarea");
        };
        state
            .scheduler
            .report_task(task.phase(), task.seq(), vec![output.to_string()])
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_waiting_while_job_is_running() {
        let state = state();
        let waited = tokio::time::timeout(
            Duration::from_secs(60),
            wait_for_job_done(state, DONE_POLL_INTERVAL, Duration::ZERO),
        )
        .await;
        assert!(waited.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn returns_after_job_is_done() {
        let state = state();
        run_task(&state, "mr-0-0");
        run_task(&state, "mr-out-0");

        tokio::time::timeout(
            Duration::from_secs(10),
            wait_for_job_done(state, DONE_POLL_INTERVAL, Duration::from_secs(3)),
        )
        .await
        .unwrap();
    }
}
