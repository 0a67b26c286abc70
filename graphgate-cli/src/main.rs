use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use graphgate_cli::{output, App, Cli, CliConfig, CliError, Format};
use tracing_subscriber::EnvFilter;

fn init_logging(filter: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(filter).with_context(|| format!("invalid log filter {filter:?}"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install logger: {e}"))
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = CliConfig::load_or_default(cli.config.as_deref()).await?;
    let app = App::new(config)?;
    let mut stdout = std::io::stdout();
    app.run(cli.command, Format::from_flag(cli.json), &mut stdout).await
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = init_logging(&cli.log_level) {
        eprintln!("error: {err:#}");
        return ExitCode::from(2);
    }

    let json = cli.json;
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::debug!("exiting with {}", err.status());
            // stdout only carries results; failures go to stderr in either format
            if json {
                eprintln!(
                    "{}",
                    serde_json::to_string_pretty(&output::error_json(&err))
                        .unwrap_or_else(|_| err.to_string())
                );
            } else {
                eprintln!("error: {err}");
            }
            ExitCode::from(err.exit_code())
        }
    }
}
