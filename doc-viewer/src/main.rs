use anyhow::Result;
use clap::Parser;
use doc_viewer::api;
use doc_viewer::config::{dotenv_failure, Cli, Settings};
use doc_viewer_core::archive::build_archiver;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    // loaded before tracing so RUST_LOG from .env applies
    let dotenv = (!cli.no_dotenv).then(dotenvy::dotenv);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Some(err) = dotenv.and_then(dotenv_failure) {
        tracing::warn!(error = %err, "ignoring malformed .env");
    }

    let settings = cli.apply(Settings::from_env()?);
    let archiver = build_archiver(&settings.archive);
    info!(
        environment = %settings.environment,
        archive = archiver.name(),
        "starting doc-viewer"
    );

    let addr = settings.bind_addr();
    let app = api::router(api::AppState::new(settings, archiver));

    let listener = TcpListener::bind(&addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down");
}
