use anyhow::{Context, Result};
use axum::Router;
use crash_collector::services::{pipeline, pipeline::WorkerConfig, report_store::ReportStore};
use crash_collector::{AppState, config, routes};
use std::{fs, io::ErrorKind, path::Path, sync::Mutex};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Parse config ---
    let cfg = config::AppConfig::from_env_and_args()?;

    // --- Logging setup ---
    init_logging(cfg.error_logfile.as_deref())?;

    tracing::info!("Starting crash-collector with config: {:?}", cfg);

    // --- Ensure dump directory exists ---
    if !Path::new(&cfg.dump_dir).exists() {
        fs::create_dir_all(&cfg.dump_dir)?;
        tracing::info!("Created dump directory at {}", cfg.dump_dir);
    }

    // --- Initialize core services ---
    let store = ReportStore::new(&cfg.dump_dir);
    let pipeline = pipeline::start(
        store.clone(),
        WorkerConfig {
            symbols_dir: cfg.symbols_dir.clone().into(),
            stackwalk_tool: cfg.stackwalk_tool.clone().into(),
            stackwalk_timeout: cfg.stackwalk_timeout,
        },
    );

    // --- Build router ---
    let app: Router = routes::routes::routes().with_state(AppState { store, pipeline });

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Initialize the tracing subscriber, appending to the configured error log
/// file when one is set, stderr otherwise.
fn init_logging(error_logfile: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match error_logfile {
        Some(path) => {
            let file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening error log `{}`", path))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.init(),
    }
    Ok(())
}
