//! Rolling file logging for the worker process. The gateway only logs to
//! stdout, but the worker's HTTP surface has to serve `GET /api/logs`
//! (spec.md §6), so it also needs a file a request handler can read back.

use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;

pub fn log_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".scalyclaw/logs")
}

pub fn log_file_path() -> PathBuf {
    log_dir().join("worker.log")
}

/// Installs a combined stdout + rolling-file tracing subscriber. The
/// returned guard must be kept alive for the process lifetime or the
/// non-blocking writer drops pending log lines on exit.
pub fn init_logging() -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir())?;
    let file_appender = tracing_appender::rolling::never(log_dir(), "worker.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "scalyclaw_worker=info,tower_http=debug".into());

    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();

    Ok(guard)
}

/// Returns the last `lines` lines of the worker's log file, oldest first.
pub fn tail_lines(lines: usize) -> std::io::Result<Vec<String>> {
    let path = log_file_path();
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);
    let all: Vec<String> = reader.lines().collect::<std::io::Result<_>>()?;
    let start = all.len().saturating_sub(lines);
    Ok(all[start..].to_vec())
}
