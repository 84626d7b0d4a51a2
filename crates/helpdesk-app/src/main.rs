use std::path::Path;

use anyhow::Result;
use clap::Parser;
use helpdesk_app::cli::{self, Cli};
use helpdesk_app::{AppError, HelpdeskRuntime};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = helpdesk_config::load_from_env()?;
    init_file_logging(&config.log_path())?;

    let runtime = HelpdeskRuntime::from_config(&config)?;
    if let Err(error) = cli::run(cli, &runtime).await {
        tracing::error!(error = %error, "helpdesk command failed");
        return Err(error);
    }
    Ok(())
}

fn init_file_logging(log_path: &Path) -> Result<(), AppError> {
    if let Some(parent) = log_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|error| {
                AppError::configuration(format!(
                    "failed to create helpdesk log directory '{}': {error}",
                    parent.display()
                ))
            })?;
        }
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .map_err(|error| {
            AppError::configuration(format!(
                "failed to open helpdesk log file '{}': {error}",
                log_path.display()
            ))
        })?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(log_file))
        .init();

    Ok(())
}
