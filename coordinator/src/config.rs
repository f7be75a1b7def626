use std::{collections::HashSet, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use glob::glob;
use tracing::warn;

use crate::scheduler::JobConfig;

#[derive(Parser, Debug)]
#[command(name = "coordinator")]
#[command(about = "Coordinador de un job map/reduce")]
pub struct Args {
    /// Dirección donde escucha el servidor HTTP
    #[arg(long, env = "COORDINATOR_BIND", default_value = "0.0.0.0:8080")]
    pub bind: String,

    /// Cantidad de particiones reduce (fija durante todo el job)
    #[arg(long, default_value_t = 10)]
    pub n_reduce: usize,

    /// Segundos sin reporte tras los cuales una tarea se reasigna
    #[arg(long, default_value_t = 10)]
    pub task_timeout_secs: u64,

    /// Segundos que se sigue respondiendo tras terminar el job
    #[arg(long, default_value_t = 3)]
    pub shutdown_grace_secs: u64,

    /// Archivos de entrada o patrones glob, ej: "data/pg-*.txt"
    #[arg(value_name = "INPUT", required = true)]
    pub inputs: Vec<String>,
}

impl Args {
    pub fn job_config(&self) -> Result<JobConfig> {
        Ok(JobConfig {
            inputs: expand_inputs(&self.inputs)?,
            n_reduce: self.n_reduce,
            task_timeout: Duration::from_secs(self.task_timeout_secs),
        })
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Expande los patrones a archivos, en orden y sin repetidos. Cada archivo
/// será una tarea map.
pub fn expand_inputs(patterns: &[String]) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for pattern in patterns {
        let mut matched = 0;
        for entry in glob(pattern).with_context(|| format!("patrón inválido: {}", pattern))? {
            let path = entry.with_context(|| format!("no se pudo leer {}", pattern))?;
            if !path.is_file() {
                continue;
            }
            matched += 1;
            let path = path.to_string_lossy().to_string();
            if seen.insert(path.clone()) {
                files.push(path);
            }
        }
        if matched == 0 {
            warn!("el patrón {} no coincide con ningún archivo", pattern);
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs, path::PathBuf};

    fn temp_dir(sub: &str) -> PathBuf {
        let base = std::env::temp_dir().join("coordinator_config_tests").join(sub);
        let _ = fs::remove_dir_all(&base);
        fs::create_dir_all(&base).unwrap();
        base
    }

    #[test]
    fn expands_globs_in_order_without_duplicates() {
        let tmp = temp_dir("globs");
        for name in ["pg-b.txt", "pg-a.txt", "notas.md"] {
            fs::write(tmp.join(name), "x").unwrap();
        }
        fs::create_dir_all(tmp.join("pg-dir.txt")).unwrap();

        let patterns = vec![
            format!("{}/pg-*.txt", tmp.display()),
            format!("{}/pg-a.txt", tmp.display()),
        ];
        let files = expand_inputs(&patterns).unwrap();

        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("pg-a.txt"));
        assert!(files[1].ends_with("pg-b.txt"));
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        assert!(expand_inputs(&["data/[".to_string()]).is_err());
    }

    #[test]
    fn args_parse_with_defaults() {
        let args = Args::try_parse_from(["coordinator", "a.txt", "b.txt"]).unwrap();
        assert_eq!(args.n_reduce, 10);
        assert_eq!(args.task_timeout_secs, 10);
        assert_eq!(args.inputs, vec!["a.txt", "b.txt"]);
        assert_eq!(args.shutdown_grace(), Duration::from_secs(3));
    }

    #[test]
    fn args_require_inputs() {
        assert!(Args::try_parse_from(["coordinator"]).is_err());
    }
}
