use anyhow::{Context, Result};
use inky_refresh::config::Config;
use inky_refresh::display::{DisplayRenderer, EpdProcessRenderer, SerializedDisplay};
use inky_refresh::scheduler::{ControlLoop, LoopOptions, Scheduler};
use inky_refresh::tui;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "config.toml";
const LOG_FILE: &str = "inky-refresh.log";

fn config_path(args: &[String]) -> PathBuf {
    args.iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[tokio::main]
async fn main() -> Result<()> {
    let log_file = std::fs::File::create(LOG_FILE).with_context(|| format!("failed to create {}", LOG_FILE))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("inky_refresh=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(log_file)
        .with_ansi(false)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let tui_mode = args.iter().any(|a| a == "--tui");
    let path = config_path(&args);

    // Missing file means defaults; .env values never override real env vars.
    let config = Config::resolve(&path)?;
    tracing::info!(config = %path.display(), feed_url = ?config.feed_url(), "starting");

    let display: Arc<dyn DisplayRenderer> = Arc::new(SerializedDisplay::new(
        Arc::new(EpdProcessRenderer::new(&config.display)),
        Duration::from_millis(config.display.render_timeout_ms),
    ));

    match display.boot_message(&config.display.boot_message).await {
        Ok(()) => {
            tracing::info!(delay_s = config.display.boot_delay_s, "boot message shown");
            tokio::time::sleep(Duration::from_secs(config.display.boot_delay_s)).await;
        }
        Err(e) => tracing::warn!(error = %e, "boot message failed, starting scheduler now"),
    }

    let scheduler = Arc::new(Scheduler::from_config(&config, display).context("failed to build scheduler")?);
    let options = LoopOptions {
        config_path: Some(path),
        ..LoopOptions::default()
    };
    let (handle, control) = ControlLoop::spawn(scheduler, config, options);

    if tui_mode {
        tui::run_tui(handle.clone()).await?;
    } else {
        tokio::signal::ctrl_c().await?;
        tracing::info!("shutdown requested");
    }

    handle.stop().await?;
    control.await?;
    Ok(())
}
