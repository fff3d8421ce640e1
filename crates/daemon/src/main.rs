// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! hived, the Hive orchestration daemon.

use hive_daemon::{env, lifecycle, Config};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn main() -> std::process::ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("hived: {e}");
            return std::process::ExitCode::FAILURE;
        }
    };

    if let Err(e) = std::fs::create_dir_all(&config.logs_dir) {
        eprintln!("hived: cannot create log dir: {e}");
        return std::process::ExitCode::FAILURE;
    }
    let file_appender = tracing_appender::rolling::daily(&config.logs_dir, "hived.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(EnvFilter::new(env::log_filter()))
        .with(tracing_subscriber::fmt::layer().with_writer(file_writer).with_ansi(false))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("hived: runtime init failed: {e}");
            return std::process::ExitCode::FAILURE;
        }
    };

    runtime.block_on(async {
        let daemon = match lifecycle::startup(config).await {
            Ok(daemon) => daemon,
            Err(e) => {
                tracing::error!(error = %e, "startup failed");
                return std::process::ExitCode::FAILURE;
            }
        };

        wait_for_shutdown_signal().await;
        daemon.shutdown().await;
        std::process::ExitCode::SUCCESS
    })
}

async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            tracing::error!(error = %e, "cannot install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = term.recv() => tracing::info!("SIGTERM received"),
        result = tokio::signal::ctrl_c() => {
            if result.is_ok() {
                tracing::info!("interrupt received");
            }
        }
    }
}
