use activity_track::cli::{Cli, Command};
use activity_track::error::exit_code;
use anyhow::Context;
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::from(exit_code::SUCCESS as u8),
        Err(e) => {
            eprintln!("Error: {e:#}");
            if let Some(track_err) = e.downcast_ref::<activity_track::Error>() {
                ExitCode::from(track_err.exit_code() as u8)
            } else {
                ExitCode::from(exit_code::GENERAL_ERROR as u8)
            }
        }
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Validate CLI arguments
    cli.validate()
        .map_err(activity_track::Error::InvalidArgument)
        .context("Invalid arguments")?;

    match cli.command {
        Some(Command::Events { limit, json }) => {
            activity_track::commands::events::run(&cli.db, limit, json)?;
        }
        Some(Command::Summary { json }) => {
            activity_track::commands::summary::run(&cli.db, json)?;
        }
        Some(Command::Query { ref sql }) => {
            activity_track::commands::query::run(&cli.db, sql)?;
        }
        Some(Command::Completions { shell }) => {
            use clap::CommandFactory;
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "activity-track", &mut std::io::stdout());
        }
        None => {
            setup_logging(cli.debug);
            serve(&cli)?;
        }
    }

    Ok(())
}

fn serve(cli: &Cli) -> anyhow::Result<()> {
    let config = cli.server_config();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(activity_track::server::run(&config))?;
    Ok(())
}

fn setup_logging(debug: bool) {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    let level = if debug { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_target(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {e}");
    }
}
