use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::NutritionClientConfig,
    errors::{AppError, InferenceError},
    labels::{LabelTable, NutritionRecord},
    model::{run_inference, ModelState},
    nutrition::NutritionResolver,
    preprocess,
};

const FILE_FIELD: &str = "file";

/// Everything a request needs, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub model: ModelState,
    pub labels: Arc<LabelTable>,
    pub nutrition: Arc<NutritionResolver>,
}

impl AppState {
    pub fn new(model: ModelState, labels: LabelTable, nutrition: NutritionClientConfig) -> Self {
        let labels = Arc::new(labels);
        let nutrition = Arc::new(NutritionResolver::new(nutrition, labels.clone()));
        Self {
            model,
            labels,
            nutrition,
        }
    }
}

pub fn router(state: AppState, body_limit_bytes: usize) -> Router {
    Router::new()
        .route("/analyze", post(analyze_handler))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Classifies the uploaded photo and returns its nutrition as a one-item list.
async fn analyze_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Vec<NutritionRecord>>, AppError> {
    // Checked before touching the upload.
    let classifier = match &state.model {
        ModelState::Ready(classifier) => classifier.clone(),
        ModelState::LoadFailed { reason } => {
            return Err(AppError::ModelUnavailable(reason.clone()))
        }
    };

    let image_data = read_file_field(multipart?).await?;
    let input = tokio::task::spawn_blocking(move || {
        let image = preprocess::decode_rgb(&image_data)
            .map_err(|err| AppError::InvalidImage(err.to_string()))?;
        Ok::<_, AppError>(preprocess::preprocess(&image)?)
    })
    .await
    .map_err(|err| InferenceError::Aborted(err.to_string()))??;
    let prediction = run_inference(classifier, input).await?;

    let raw = state
        .labels
        .index_to_label(prediction.index)
        .map_err(InferenceError::from)?
        .to_string();
    let display = state.labels.raw_to_display(&raw);
    tracing::info!(
        label = %raw,
        confidence = prediction.confidence,
        "classified upload"
    );

    let nutrition = state.nutrition.resolve(&raw).await;
    Ok(Json(vec![nutrition.renamed(display)]))
}

async fn read_file_field(mut multipart: Multipart) -> Result<Vec<u8>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::BadUpload(err.to_string()))?
    {
        if field.name() == Some(FILE_FIELD) {
            let bytes = field
                .bytes()
                .await
                .map_err(|err| AppError::BadUpload(err.to_string()))?;
            return Ok(bytes.to_vec());
        }
    }
    Err(AppError::MissingFile)
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::BadUpload(rejection.to_string())
    }
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let model = if state.model.is_ready() {
        "ready"
    } else {
        "unavailable"
    };
    Json(json!({ "status": "OK", "model": model }))
}
