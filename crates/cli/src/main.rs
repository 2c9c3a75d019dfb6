use crate::{
    commands::{Commands, OffsetCommand},
    error::CliError,
    output::ValidationReport,
    shutdown::{ExitCode, ShutdownCoordinator},
};
use clap::Parser;
use connectors::adapter::{Adapter, DataFormat};
use engine_config::settings::SourceSettings;
use engine_core::state::StateStore;
use engine_runtime::{
    factory::{create_source, open_state_store},
    runner::{RunnerOptions, SourceRunner},
    sink::JsonLinesSink,
};
use std::{path::Path, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod commands;
mod env;
mod error;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(
    name = "tableflow",
    version = "0.1.0",
    about = "Incremental multi-table extraction"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    // Records go to stdout, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let coordinator = ShutdownCoordinator::new(CancellationToken::new());

    let code = match execute(cli.command, &coordinator).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Command failed");
            ExitCode::GeneralError
        }
    };
    std::process::exit(code.as_i32());
}

async fn execute(command: Commands, coordinator: &ShutdownCoordinator) -> Result<ExitCode, CliError> {
    match command {
        Commands::Run {
            config,
            env_file,
            state_dir,
            max_batch_size,
            max_batches,
            once,
        } => {
            let mut settings = load_settings(&config, env_file.as_deref()).await?;
            if let Some(max_batch_size) = max_batch_size {
                settings.max_batch_size = max_batch_size;
            }

            let mut options = RunnerOptions::from_settings(&settings);
            options.max_batches = max_batches;
            options.stop_when_idle = once;

            let store: Arc<dyn StateStore> = Arc::new(open_state_store(state_dir.as_deref())?);
            let source = create_source(settings).await?;

            coordinator.register_handlers();
            let runner = SourceRunner::new(
                source,
                store,
                JsonLinesSink::stdout(),
                options,
                coordinator.cancel_token(),
            );
            let summary = runner.run().await?;
            info!(
                batches = summary.batches,
                records = summary.records,
                error_records = summary.error_records,
                "Run finished"
            );

            if coordinator.is_shutdown_requested() {
                Ok(ExitCode::ShutdownRequested)
            } else {
                Ok(ExitCode::Success)
            }
        }
        Commands::Validate {
            config,
            env_file,
            output,
        } => {
            info!(config = %config.display(), output = ?output, "Validating source settings");

            let settings = load_settings(&config, env_file.as_deref()).await?;
            let name = settings.name.clone();
            let source = create_source(settings).await?;
            let issues = source.validate().await;
            let report = ValidationReport::new(&name, &issues);

            match &output {
                Some(path) => output::write_report(&report, path).await?,
                None => output::print_report(&report)?,
            }

            if report.valid {
                Ok(ExitCode::Success)
            } else {
                Ok(ExitCode::InvalidConfig)
            }
        }
        Commands::Offset { command } => match command {
            OffsetCommand::Show {
                source,
                state_dir,
                json,
            } => {
                let store = open_state_store(state_dir.as_deref())?;
                let checkpoints = match source {
                    Some(source) => match store.load_checkpoint(&source).await? {
                        Some(cp) => vec![cp],
                        None => return Err(CliError::NoCheckpoint(source)),
                    },
                    None => store.list_checkpoints().await?,
                };
                output::print_checkpoints(&checkpoints, json)?;
                Ok(ExitCode::Success)
            }
            OffsetCommand::Reset { source, state_dir } => {
                let store = open_state_store(state_dir.as_deref())?;
                if !store.delete_checkpoint(&source).await? {
                    return Err(CliError::NoCheckpoint(source));
                }
                info!(source = %source, "Checkpoint removed, next run starts from the initial offsets");
                Ok(ExitCode::Success)
            }
        },
        Commands::TestConn { format, conn_str } => {
            let format: DataFormat = format
                .parse()
                .map_err(|_| CliError::InvalidConnectionFormat(format.clone()))?;

            info!(format = %format, "Pinging database");
            let adapter = Adapter::connect(format, &conn_str).await?;
            adapter
                .sql()
                .ping()
                .await
                .map_err(|e| CliError::Connection(e.into()))?;
            info!(format = %format, "Ping succeeded");
            Ok(ExitCode::Success)
        }
    }
}

async fn load_settings(config: &Path, env_file: Option<&Path>) -> Result<SourceSettings, CliError> {
    let env = env::load_env(env_file)?;
    Ok(SourceSettings::from_file(config, &env).await?)
}
