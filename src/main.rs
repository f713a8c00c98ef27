use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the RadTrack application
///
/// Resolves configuration once from the environment (and `.env`), then serves the REST API
/// with its live study feed and Swagger UI until interrupted.
///
/// # Environment Variables
/// - `RADTRACK_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `RADTRACK_DATA_DIR`: Directory for persisted records (default: "radtrack_data")
/// - `RADTRACK_STORE`: `file` or `memory` (default: "file")
/// - `RADTRACK_ACCOUNTS_FILE`: YAML list of accounts and their bearer tokens
/// - `GEMINI_API_KEY`: enables order extraction
///
/// # Returns
/// * `Ok(())` - If the server starts and shuts down cleanly
/// * `Err(anyhow::Error)` - If configuration is invalid or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("radtrack=info".parse()?)
                .add_directive("api_rest=info".parse()?)
                .add_directive("extraction=info".parse()?)
                .add_directive("documents=info".parse()?)
                .add_directive("orders=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr =
        std::env::var("RADTRACK_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let ctx = api_rest::context_from_env()?;
    let cfg = ctx.config();
    tracing::info!(
        data_dir = %cfg.data_dir().display(),
        store = ?cfg.store_backend(),
        default_service = cfg.default_service(),
        extraction = ctx.extraction().is_some(),
        "configuration resolved"
    );
    tracing::info!("++ Starting RadTrack REST on {}", rest_addr);

    let app = api_rest::router(ctx);
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("-- Shutting down RadTrack REST");
        })
        .await?;

    Ok(())
}
