mod app;
mod events;
mod strings;
mod terminal;
mod theme;
mod ui;

use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use terminal::TerminalGuard;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> Result<()> {
    let _log_guard = init_tracing();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("aesthetic-net")
        .enable_all()
        .build()
        .context("build tokio runtime")?;

    let backend = app::Backend::from_env();
    let mut app = app::App::new(runtime.handle().clone(), backend);
    info!(target: "tui", "starting: model={}", app.model_label);

    let result = {
        let mut term = TerminalGuard::new()?;
        events::run(&mut term.terminal, &mut app)
    };

    app.shutdown();
    runtime.shutdown_timeout(Duration::from_millis(500));
    info!(target: "tui", "exit");
    result
}

// The terminal is in raw mode, so logs go to <data_dir>/aesthetic.log only.
fn init_tracing() -> Option<WorkerGuard> {
    let dirs = ProjectDirs::from("", "", "aesthetic")?;
    let log_dir = dirs.data_dir();
    std::fs::create_dir_all(log_dir).ok()?;

    let appender = tracing_appender::rolling::never(log_dir, "aesthetic.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(non_blocking),
        )
        .try_init();
    Some(guard)
}
