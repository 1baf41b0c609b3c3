//! Titanic CLI
//!
//! `titanic train` trains and promotes a model, `titanic serve` runs the
//! inference service, `titanic predict` queries it.

use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use titanic_mlops::cli::{run_cli_mode, Args};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries command output
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "titanic=info,tower_http=info".into());
    tracing_subscriber::registry()
        .with(filter)
        .with(
            args.json_logs
                .then(|| fmt::layer().json().with_writer(std::io::stderr)),
        )
        .with(
            (!args.json_logs).then(|| fmt::layer().with_writer(std::io::stderr)),
        )
        .init();

    run_cli_mode(args).await
}
