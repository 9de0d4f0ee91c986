mod args;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{error, info};

use args::Args;
use gis_map_server::buffer::Buffer;
use gis_map_server::config::Config;
use gis_map_server::frontend::{self, AppState, Templates};
use gis_map_server::logging;
use gis_map_server::scheduler::Scheduler;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match Config::load(&args.config_path) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("Config parsing error: {error}");
            return ExitCode::FAILURE;
        },
    };

    if let Err(error) = recreate_log_dir(&config) {
        eprintln!("Could not create log folder: {error}");
        return ExitCode::FAILURE;
    }

    let _log_guard = match logging::init(&config.log_file(), args.debug) {
        Ok(guard) => guard,
        Err(error) => {
            eprintln!("Failed to initialize logging: {error}");
            return ExitCode::FAILURE;
        },
    };

    if let Err(error) = prepare_shared_memory(&config.gis_shid).await {
        error!(%error, "could not make data request for shared memory id");
        return ExitCode::FAILURE;
    }

    let templates = match Templates::load(&config.html_pages_path) {
        Ok(templates) => templates,
        Err(error) => {
            error!(%error, path = %config.html_pages_path.display(), "failed to load HTML templates");
            return ExitCode::FAILURE;
        },
    };

    let base_url = config.base_url();
    let scheduler = Scheduler::spawn(
        config.slots_number,
        config.renderer_path(),
        base_url,
        config.gis_shid.clone(),
    );
    let buffer = Arc::new(Mutex::new(Buffer::new(config.storage_max_size)));

    let state = AppState {
        scheduler,
        buffer,
        templates,
        server_address: config.server_address.to_string(),
        server_port: config.server_port,
    };
    let app = frontend::app(state);

    let listener = match TcpListener::bind((config.server_address, config.server_port)).await {
        Ok(listener) => listener,
        Err(error) => {
            error!(%error, "failed to bind listening socket");
            return ExitCode::from(111);
        },
    };

    info!(addr = %config.base_url(), "gis-map-server listening");

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(%error, "server exited with an error");
            ExitCode::FAILURE
        },
    }
}

/// Removes and recreates `$GIS_ROOT/data/logs/gis-map-server/`. A missing
/// directory is not an error; any other failure is fatal.
fn recreate_log_dir(config: &Config) -> std::io::Result<()> {
    let log_dir = config.log_dir();
    match std::fs::remove_dir_all(&log_dir) {
        Ok(()) => {},
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {},
        Err(error) => return Err(error),
    }
    std::fs::create_dir_all(&log_dir)
}

/// Invokes `gis-control -s<shared-memory-id>` once before serving, to
/// prepare renderer shared memory. Only a failure to spawn the process at
/// all (missing binary, OS error) is fatal here; its exit status is not
/// inspected, since `gis-control` reporting a nonzero code doesn't mean the
/// shared memory it already prepared is unusable.
async fn prepare_shared_memory(shared_memory_id: &str) -> anyhow::Result<()> {
    tokio::process::Command::new("gis-control")
        .arg(format!("-s{shared_memory_id}"))
        .status()
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(%error, "something strange with ctrl-c handling!");
    }
}
