use anyhow::Context;
use foodlens_service_rs::{
    config::ServerConfig,
    labels::LabelTable,
    logging::{self, LogFormat},
    model::ModelState,
    routes::{router, AppState},
    utils::ensure_model_file,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init(LogFormat::from_env())?;
    let config = ServerConfig::from_env()?;
    let addr = config.listen_addr()?;
    tracing::info!(
        service.name = env!("CARGO_PKG_NAME"),
        service.version = env!("CARGO_PKG_VERSION"),
        "starting"
    );

    let labels = LabelTable::food_classes();
    // The server comes up either way; without a model /analyze answers 500.
    let model = match ensure_model_file(&config).await {
        Ok(()) => ModelState::load(&config.model_path, &labels),
        Err(err) => {
            tracing::error!(error = %err, "model artifact unavailable");
            ModelState::failed(err.to_string())
        }
    };

    let state = AppState::new(model, labels, config.nutrition.clone());
    if !state.nutrition.has_api_key() {
        tracing::warn!("CALORIE_NINJAS_API_KEY not set; nutrition comes from the fallback table");
    }
    let app = router(state, config.body_limit_bytes);

    tracing::info!("Listening on http://{addr}");
    axum::Server::try_bind(&addr)
        .with_context(|| format!("failed to bind {addr}"))?
        .serve(app.into_make_service())
        .await?;
    Ok(())
}
