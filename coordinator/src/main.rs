mod config;
mod error;
mod handlers;
mod monitor;
mod queue;
mod scheduler;
mod state;
mod tracker;
mod watchdog;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Args;
use crate::scheduler::Scheduler;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("coordinator=debug,tower_http=info")),
        )
        .init();

    let args = Args::parse();
    let job = args.job_config()?;
    info!(
        "job con {} archivos de entrada, n_reduce={}, timeout por tarea {:?}",
        job.inputs.len(),
        job.n_reduce,
        job.task_timeout
    );

    let state = AppState::new(Scheduler::new(job)?);

    // router HTTP
    let app = handlers::build_router(state.clone());

    let listener = TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("no se pudo escuchar en {}", args.bind))?;
    info!("coordinador escuchando en {}", listener.local_addr()?);

    let grace = args.shutdown_grace();
    let interrupted = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("no se pudo escuchar ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = monitor::wait_for_job_done(state, monitor::DONE_POLL_INTERVAL, grace) => {}
                _ = interrupted => warn!("interrumpido, el job se pierde"),
            }
        })
        .await?;

    info!("coordinador detenido");
    Ok(())
}
