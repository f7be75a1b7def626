use anyhow::{Context, Result};
use clap::Parser;
use common::wordcount;
use common::{
    Phase, Task, TaskAssignment, TaskCompleteRequest, TaskCompleteResponse, TaskRequest,
    TaskRequeueRequest, TaskRequeueResponse,
};
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::time::sleep;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "worker")]
#[command(about = "Worker WordCount: pide tareas al coordinador, las ejecuta y reporta")]
pub struct Args {
    /// URL base del coordinador
    #[arg(long, env = "MASTER_URL", default_value = "http://localhost:8080")]
    pub master_url: String,

    /// Directorio donde se escriben archivos intermedios y de salida
    #[arg(long, env = "WORKER_DIR", default_value = "mr-tmp")]
    pub work_dir: PathBuf,

    /// Espera entre pedidos cuando no hay tareas disponibles
    #[arg(long, default_value_t = 1000)]
    pub poll_interval_ms: u64,

    /// Nombre para los logs (por defecto el hostname)
    #[arg(long, env = "WORKER_ID")]
    pub worker_id: Option<String>,
}

async fn post_json<B, R>(client: &Client, url: &str, body: &B) -> Result<R>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let resp = client
        .post(url)
        .json(body)
        .send()
        .await
        .with_context(|| format!("POST {}", url))?
        .error_for_status()?;
    Ok(resp.json().await?)
}

/// Corre la función map/reduce que corresponda. Devuelve las rutas producidas.
pub fn execute(task: &Task, work_dir: &Path) -> io::Result<Vec<String>> {
    match task {
        Task::Map(t) => wordcount::map_file(&t.input, t.seq, t.n_reduce, work_dir),
        Task::Reduce(t) => wordcount::reduce_files(&t.inputs, t.seq, work_dir).map(|out| vec![out]),
    }
}

/// Loop principal del worker.
/// - Pide tareas mientras haya.
/// - Si la fase está abierta pero no hay nada pendiente, espera y reintenta.
/// - Si la ejecución falla, devuelve la tarea a la cola del coordinador.
pub async fn run(args: Args) -> Result<()> {
    let client = Client::new();
    let base_url = args.master_url.trim_end_matches('/').to_string();
    let poll_interval = Duration::from_millis(args.poll_interval_ms);

    let worker_id = args.worker_id.unwrap_or_else(|| {
        hostname::get()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string()
    });

    fs::create_dir_all(&args.work_dir)
        .with_context(|| format!("no se pudo crear {}", args.work_dir.display()))?;

    info!("worker {} trabajando contra {}", worker_id, base_url);

    let next_url = format!("{}/api/v1/tasks/next", base_url);
    let complete_url = format!("{}/api/v1/tasks/complete", base_url);
    let requeue_url = format!("{}/api/v1/tasks/requeue", base_url);
    let mut tasks_done: u64 = 0;

    loop {
        let request = TaskRequest {
            worker_id: Some(worker_id.clone()),
        };
        let assignment: TaskAssignment = match post_json(&client, &next_url, &request).await {
            Ok(a) => a,
            // el coordinador se apaga al terminar el job
            Err(e) if tasks_done > 0 => {
                info!("coordinador no disponible ({:#}), asumo job terminado", e);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let task = match assignment {
            TaskAssignment::Assigned { task } => task,
            TaskAssignment::WaitRetry => {
                sleep(poll_interval).await;
                continue;
            }
            TaskAssignment::NoWorkLeft => {
                info!("job terminado, worker {} sale tras {} tareas", worker_id, tasks_done);
                return Ok(());
            }
        };

        let phase: Phase = task.phase();
        let seq = task.seq();
        info!("tengo tarea {} {} (input={:?})", phase, seq, task.inputs());

        let work_dir = args.work_dir.clone();
        let job_task = task.clone();
        let result = tokio::task::spawn_blocking(move || execute(&job_task, &work_dir)).await;

        let outputs = match result {
            Ok(Ok(outputs)) => outputs,
            Ok(Err(e)) => {
                warn!("error procesando tarea {} {}: {}", phase, seq, e);
                give_back(&client, &requeue_url, &task, poll_interval).await;
                continue;
            }
            Err(e) => {
                warn!("panic o join error en tarea {} {}: {:?}", phase, seq, e);
                give_back(&client, &requeue_url, &task, poll_interval).await;
                continue;
            }
        };

        let report = TaskCompleteRequest {
            phase,
            seq,
            outputs,
            worker_id: Some(worker_id.clone()),
        };
        // si el reporte se pierde, el watchdog del coordinador recupera la tarea
        match post_json::<_, TaskCompleteResponse>(&client, &complete_url, &report).await {
            Ok(resp) => {
                tasks_done += 1;
                info!("terminé tarea {} {} ({:?})", phase, seq, resp.outcome);
            }
            Err(e) => warn!("no se pudo reportar tarea {} {}: {:#}", phase, seq, e),
        }
    }
}

/// Devuelve la tarea y espera `backoff` antes del próximo pedido: si es la
/// única pendiente, volvería a este mismo worker enseguida.
async fn give_back(client: &Client, url: &str, task: &Task, backoff: Duration) {
    requeue(client, url, task).await;
    sleep(backoff).await;
}

async fn requeue(client: &Client, url: &str, task: &Task) {
    let req = TaskRequeueRequest {
        phase: task.phase(),
        seq: task.seq(),
        inputs: task.inputs(),
    };
    match post_json::<_, TaskRequeueResponse>(client, url, &req).await {
        Ok(resp) => info!(
            "tarea {} {} devuelta al coordinador (requeued={})",
            req.phase, req.seq, resp.requeued
        ),
        Err(e) => warn!("no se pudo devolver la tarea {} {}: {:#}", req.phase, req.seq, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{MapTask, ReduceTask};

    fn temp_dir(sub: &str) -> PathBuf {
        let base = std::env::temp_dir().join("worker_tests").join(sub);
        let _ = fs::remove_dir_all(&base);
        fs::create_dir_all(&base).unwrap();
        base
    }

    #[test]
    fn executes_map_then_reduce_tasks() {
        let tmp = temp_dir("execute");
        let input = tmp.join("pg-0.txt");
        fs::write(&input, "uno dos dos\n").unwrap();

        let map = Task::Map(MapTask {
            seq: 0,
            input: input.to_string_lossy().to_string(),
            n_reduce: 1,
        });
        let intermediate = execute(&map, &tmp).unwrap();
        assert_eq!(intermediate.len(), 1);

        let reduce = Task::Reduce(ReduceTask {
            seq: 0,
            n_map: 1,
            inputs: intermediate,
        });
        let outputs = execute(&reduce, &tmp).unwrap();
        assert_eq!(outputs.len(), 1);

        let content = fs::read_to_string(&outputs[0]).unwrap();
        assert_eq!(content, "dos,2\nuno,1\n");
    }

    #[test]
    fn map_of_missing_input_fails() {
        let tmp = temp_dir("missing");
        let map = Task::Map(MapTask {
            seq: 0,
            input: tmp.join("no_existe.txt").to_string_lossy().to_string(),
            n_reduce: 2,
        });
        assert!(execute(&map, &tmp).is_err());
    }

    #[tokio::test]
    async fn give_back_waits_even_if_coordinator_is_unreachable() {
        let client = Client::new();
        let task = Task::Map(MapTask {
            seq: 3,
            input: "pg-3.txt".to_string(),
            n_reduce: 2,
        });
        let backoff = Duration::from_millis(50);

        let start = std::time::Instant::now();
        give_back(&client, "http://127.0.0.1:1/api/v1/tasks/requeue", &task, backoff).await;

        assert!(start.elapsed() >= backoff);
    }

    #[test]
    fn args_parse_master_url_and_defaults() {
        let args = Args::try_parse_from(["worker", "--master-url", "http://localhost:8080"]).unwrap();
        assert_eq!(args.master_url, "http://localhost:8080");
        assert_eq!(args.poll_interval_ms, 1000);
    }
}
