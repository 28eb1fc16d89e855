use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tillbot::application::Services;
use tillbot::application::router::Router;
use tillbot::config::Config;
use tillbot::domain::event::Contact;
use tillbot::domain::ports::ShopStore;
use tillbot::infrastructure::catalog::StaticCatalog;
use tillbot::infrastructure::in_memory::InMemoryStore;
use tillbot::interfaces::console::{ConsoleTransport, parse_line};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Engine configuration file (JSON)
    #[arg(long)]
    config: PathBuf,

    /// User id granted all admin permissions on startup
    #[arg(long)]
    owner: Option<i64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config).into_diagnostic()?;

    let store = Arc::new(InMemoryStore::new());
    if let Some(owner) = cli.owner {
        store
            .upsert_admin(tillbot::domain::admin::Admin::owner(owner))
            .await
            .into_diagnostic()?;
    }
    let services = Services {
        store,
        transport: Arc::new(ConsoleTransport::new()),
        catalog: Arc::new(StaticCatalog::english()),
        config: Arc::new(config),
    };
    let mut router = Router::new(services);

    let operator = Contact::new(1, "Console");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.into_diagnostic()? else {
                    break;
                };
                let Some(event) = parse_line(&line, &operator) else {
                    continue;
                };
                if let Err(err) = router.route(event).await {
                    eprintln!("Error routing event: {err}");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    router.shutdown().await;
    Ok(())
}
