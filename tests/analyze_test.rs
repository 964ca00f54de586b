//! End-to-end tests for `/analyze` and `/health` with a mock classifier.

mod helpers;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use foodlens_service_rs::{
    labels::LabelTable,
    model::ModelState,
    routes::{router, AppState},
};
use helpers::{
    body_bytes, body_json, nutrition_config, png_bytes, upload_request, MockClassifier,
    NUTRITION_PATH,
};
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BODY_LIMIT: usize = 10 * 1024 * 1024;
const PIZZA: usize = 6;

/// App whose nutrition service always answers 500, so every lookup falls
/// back. The mock server must outlive the router.
async fn offline_app(model: ModelState) -> (Router, MockServer) {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(NUTRITION_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;
    let state = AppState::new(
        model,
        LabelTable::food_classes(),
        nutrition_config(&mock_server.uri(), Some("test-key")),
    );
    (router(state, BODY_LIMIT), mock_server)
}

#[tokio::test]
async fn pizza_with_failing_nutrition_service_uses_fallback() {
    let classifier = MockClassifier::predicting(PIZZA);
    let (app, _nutrition) = offline_app(ModelState::ready(classifier.clone())).await;

    let response = app
        .oneshot(upload_request("file", &png_bytes(640, 480)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        String::from_utf8(body_bytes(response).await).unwrap(),
        r#"[{"name":"Pizza","calories":285,"carbs":36,"protein":12,"fat":10}]"#
    );
    assert_eq!(classifier.call_count(), 1);
}

#[tokio::test]
async fn external_nutrition_is_returned_under_display_name() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(NUTRITION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{
                "name": "pizza",
                "calories": 262.9,
                "carbohydrates_total_g": 32.9,
                "protein_g": 11.4,
                "fat_total_g": 9.8
            }]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    let state = AppState::new(
        ModelState::ready(MockClassifier::predicting(PIZZA)),
        LabelTable::food_classes(),
        nutrition_config(&mock_server.uri(), Some("test-key")),
    );

    let response = router(state, BODY_LIMIT)
        .oneshot(upload_request("file", &png_bytes(300, 300)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!([{ "name": "Pizza", "calories": 262.9, "carbs": 32.9, "protein": 11.4, "fat": 9.8 }])
    );
}

#[tokio::test]
async fn non_image_upload_is_rejected_without_inference() {
    let classifier = MockClassifier::predicting(PIZZA);
    let (app, _nutrition) = offline_app(ModelState::ready(classifier.clone())).await;

    let response = app
        .oneshot(upload_request("file", b"%PDF-1.4 not a picture"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("cannot open image"));
    assert_eq!(classifier.call_count(), 0);
}

#[tokio::test]
async fn extreme_aspect_ratio_is_rejected_without_inference() {
    let classifier = MockClassifier::predicting(PIZZA);
    let (app, _nutrition) = offline_app(ModelState::ready(classifier.clone())).await;

    // Resizing 1x400 to a 256 shorter side would need a 256x102400 buffer.
    let response = app
        .oneshot(upload_request("file", &png_bytes(1, 400)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("cannot open image"));
    assert_eq!(classifier.call_count(), 0);
}

#[tokio::test]
async fn missing_file_field_is_a_client_error() {
    let classifier = MockClassifier::predicting(PIZZA);
    let (app, _nutrition) = offline_app(ModelState::ready(classifier.clone())).await;

    let response = app
        .oneshot(upload_request("photo", &png_bytes(32, 32)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(classifier.call_count(), 0);
}

#[tokio::test]
async fn non_multipart_body_is_a_client_error() {
    let classifier = MockClassifier::predicting(PIZZA);
    let (app, _nutrition) = offline_app(ModelState::ready(classifier)).await;

    let request = Request::post("/analyze")
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn failed_model_load_is_a_server_error() {
    let (app, _nutrition) = offline_app(ModelState::failed("weights not found")).await;

    // Not an image either: the model check comes first.
    let response = app
        .oneshot(upload_request("file", b"garbage"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("weights not found"));
}

#[tokio::test]
async fn out_of_range_prediction_is_a_server_error() {
    let classifier = MockClassifier::predicting(42);
    let (app, _nutrition) = offline_app(ModelState::ready(classifier)).await;

    let response = app
        .oneshot(upload_request("file", &png_bytes(64, 64)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn repeated_uploads_give_identical_responses() {
    let classifier = MockClassifier::predicting(2);
    let (app, _nutrition) = offline_app(ModelState::ready(classifier.clone())).await;
    let image = png_bytes(512, 384);

    let first = app
        .clone()
        .oneshot(upload_request("file", &image))
        .await
        .unwrap();
    let second = app.oneshot(upload_request("file", &image)).await.unwrap();

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(body_bytes(first).await, body_bytes(second).await);
    assert_eq!(classifier.call_count(), 2);
}

#[tokio::test]
async fn health_reports_model_state() {
    let classifier = MockClassifier::predicting(0);
    let (ready, _ready_nutrition) = offline_app(ModelState::ready(classifier)).await;
    let (failed, _failed_nutrition) = offline_app(ModelState::failed("missing")).await;

    for (app, expected) in [(ready, "ready"), (failed, "unavailable")] {
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({ "status": "OK", "model": expected })
        );
    }
}
