use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use common::{JobDoneResponse, JobResults, JobStatus, Phase, TaskRequeueRequest, TaskRequeueResponse};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

#[derive(Parser)]
#[command(name = "client")]
#[command(about = "CLI simple para hablar con el coordinador")]
struct Cli {
    /// URL base del coordinador
    #[arg(long, env = "MASTER_URL", default_value = "http://localhost:8080")]
    master_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Consulta el estado del job
    Status,
    /// Lista las salidas del job
    Results,
    /// Indica si el job terminó
    Done,
    /// Devuelve a la cola una tarea en vuelo cuyo worker no va a terminar
    Requeue {
        #[arg(long, value_enum)]
        phase: PhaseArg,

        #[arg(long)]
        seq: usize,

        /// Entradas originales de la tarea
        #[arg(long = "input", value_name = "PATH", required = true)]
        inputs: Vec<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PhaseArg {
    Map,
    Reduce,
}

impl From<PhaseArg> for Phase {
    fn from(p: PhaseArg) -> Self {
        match p {
            PhaseArg::Map => Phase::Map,
            PhaseArg::Reduce => Phase::Reduce,
        }
    }
}

async fn parse<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        bail!("el coordinador respondió {}: {}", status, body);
    }
    Ok(resp.json().await?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = Client::new();
    let base_url = cli.master_url.trim_end_matches('/');

    match cli.command {
        Commands::Status => {
            let url = format!("{}/api/v1/job", base_url);
            let job: JobStatus = parse(client.get(&url).send().await?).await?;

            println!("Job:");
            println!("  fase: {:?}", job.phase);
            println!("  map: {}/{}", job.completed_map, job.n_map);
            println!("  reduce: {}/{}", job.completed_reduce, job.n_reduce);
            println!("  pendientes: {}  en vuelo: {}", job.pending, job.in_flight);
            println!(
                "  reencoladas: {}  reportes descartados: {}",
                job.requeued, job.discarded_reports
            );
            println!("  timeout por tarea: {}s", job.task_timeout_secs);
            println!("  inicio: {}", job.started_at);
            if let Some(t) = job.reduce_started_at {
                println!("  inicio reduce: {}", t);
            }
            if let Some(t) = job.finished_at {
                println!("  fin: {}", t);
            }
        }
        Commands::Results => {
            let url = format!("{}/api/v1/job/results", base_url);
            let results: JobResults = parse(client.get(&url).send().await?).await?;

            if !results.done {
                println!("(el job todavía no terminó)");
            }
            println!("Salidas intermedias ({}):", results.map_outputs.len());
            for f in &results.map_outputs {
                println!("  {}", f);
            }
            println!("Salidas finales ({}):", results.outputs.len());
            for f in &results.outputs {
                println!("  {}", f);
            }
        }
        Commands::Done => {
            let url = format!("{}/api/v1/job/done", base_url);
            let resp: JobDoneResponse = parse(client.get(&url).send().await?).await?;
            println!("{}", resp.done);
        }
        Commands::Requeue { phase, seq, inputs } => {
            let url = format!("{}/api/v1/tasks/requeue", base_url);
            let req = TaskRequeueRequest {
                phase: phase.into(),
                seq,
                inputs,
            };
            let resp: TaskRequeueResponse = parse(client.post(&url).json(&req).send().await?).await?;

            if resp.requeued {
                println!("Tarea {} {} reencolada", req.phase, req.seq);
            } else {
                println!(
                    "La tarea {} {} no estaba en vuelo (ya en cola o completada)",
                    req.phase, req.seq
                );
            }
        }
    }

    Ok(())
}
