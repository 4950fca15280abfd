//! Redline CLI entry point.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use redline::cli::{Cli, Commands};
use redline::domain::models::LoggingConfig;

/// Install the tracing subscriber. Returns the file appender guard,
/// which must stay alive for the process lifetime.
fn init_tracing(logging: &LoggingConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(logging.level.clone()));
    let registry = tracing_subscriber::registry().with(filter);

    let file_layer = logging.log_dir.as_ref().map(|dir| {
        let appender = tracing_appender::rolling::daily(dir, "redline.log");
        tracing_appender::non_blocking(appender)
    });

    match (&file_layer, logging.format.as_str()) {
        (Some((writer, _)), "json") => {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_ansi(false)
                        .with_writer(writer.clone()),
                )
                .init();
        }
        (Some((writer, _)), _) => {
            registry
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer.clone()),
                )
                .init();
        }
        (None, "json") => {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        (None, _) => {
            registry
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    file_layer.map(|(_, guard)| guard)
}

#[tokio::main]
async fn main() {
    // Logging configuration is needed before any command runs; fall back
    // to defaults when no project config exists yet (e.g. before init).
    let logging = redline::ConfigLoader::load()
        .map(|c| c.logging)
        .unwrap_or_default();
    let _guard = init_tracing(&logging);

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init(args) => redline::cli::commands::init::execute(args, cli.json).await,
        Commands::Trigger(args) => redline::cli::commands::trigger::execute(args, cli.json).await,
        Commands::Worker(args) => redline::cli::commands::worker::execute(args, cli.json).await,
        Commands::Queue(args) => redline::cli::commands::queue::execute(args, cli.json).await,
        Commands::Audit(args) => redline::cli::commands::audit::execute(args, cli.json).await,
        Commands::Status(args) => redline::cli::commands::status::execute(args, cli.json).await,
    };

    if let Err(err) = result {
        redline::cli::handle_error(err, cli.json);
    }
}
