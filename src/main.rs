use tracing_subscriber::EnvFilter;

use decision_graph::api;
use decision_graph::config::Config;
use decision_graph::state::AppState;
use decision_graph::workspace::resolve_repository;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("Data directory: {}", config.data_dir.display());
    match &config.llm {
        Some(llm) => tracing::info!("LLM provider: {} ({})", llm.provider, llm.base_url),
        None => tracing::info!("LLM provider: none"),
    }

    let state = AppState::new(config.clone())?;

    if let Some(repo) = &config.repo_path {
        let input = repo.to_string_lossy();
        match resolve_repository(&config, &input).await {
            Ok(path) => {
                if let Err(e) = state.open_repository(&path, false).await {
                    tracing::error!("Failed to open startup repository {input}: {e}");
                }
            }
            Err(e) => tracing::error!("Startup repository {input} is unusable: {e}"),
        }
    } else {
        tracing::info!("No REPO_PATH set, waiting for POST /repo");
    }

    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
