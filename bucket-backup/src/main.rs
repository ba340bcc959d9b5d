use bucket_backup::cli::{run, Cli};
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    tracing::debug!(?cli, "CLI arguments parsed, invoking run");

    match run(cli).await {
        Ok(report) => {
            // Failed syncs were already logged one by one; they do not change the exit code.
            tracing::info!(
                run_id = %report.run_id,
                syncs = report.tasks.len(),
                failed = report.failures(),
                "Backup run complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(severity = "critical", error = %format!("{e:#}"), "Backup aborted");
            ExitCode::FAILURE
        }
    }
}
