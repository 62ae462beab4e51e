use anyhow::Result;
use clap::{Parser, Subcommand};
use social_backend::config::SocialConfig;
use social_backend::node::SocialNode;
use social_backend::telemetry;
use social_backend::utils::APP_NAME;

#[derive(Parser)]
#[command(author, version, about = "Social backend: co-authored posts with per-post sharing")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (Axum) for REST/API access
    Serve,
    /// Create the data directory and apply database migrations, then exit
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing();

    let args = Args::parse();

    let config = SocialConfig::from_env()?;
    let node = SocialNode::start(config)?;
    tracing::info!(app = APP_NAME, "bootstrap complete");

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => node.run_http_server().await,
        Command::Migrate => Ok(()),
    }
}
