//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::{
    io::Cursor,
    net::TcpListener,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::{
    body::Body,
    http::{header, Method, Request, Response},
};
use foodlens_service_rs::{
    config::NutritionClientConfig,
    errors::InferenceError,
    model::{Classifier, Prediction},
    preprocess::ImageTensor,
};
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};

pub const BOUNDARY: &str = "foodlens-test-boundary";
pub const NUTRITION_PATH: &str = "/v1/nutrition";

/// Base URL of a local port nothing is listening on.
pub fn closed_uri() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("address");
    format!("http://{addr}")
}

/// Client config pointed at `uri`, e.g. a `MockServer::uri()`.
pub fn nutrition_config(uri: &str, api_key: Option<&str>) -> NutritionClientConfig {
    NutritionClientConfig {
        api_key: api_key.map(str::to_string),
        base_url: format!("{uri}{NUTRITION_PATH}"),
        timeout: Duration::from_secs(2),
    }
}

/// Classifier that always predicts `index` and counts its calls.
#[derive(Clone)]
pub struct MockClassifier {
    pub index: usize,
    pub calls: Arc<AtomicUsize>,
}

impl MockClassifier {
    pub fn predicting(index: usize) -> Self {
        Self {
            index,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Classifier for MockClassifier {
    fn infer(&self, input: &ImageTensor) -> Result<Prediction, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(input.shape(), [3, 224, 224]);
        Ok(Prediction {
            index: self.index,
            confidence: 0.93,
        })
    }
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 200])
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageOutputFormat::Png)
        .expect("encode png");
    out.into_inner()
}

/// `multipart/form-data` body with a single file field.
pub fn multipart_body(field: &str, filename: &str, contents: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn upload_request(field: &str, contents: &[u8]) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/analyze")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(field, "upload.bin", contents)))
        .expect("request")
}

pub async fn body_bytes(response: Response<axum::body::BoxBody>) -> Vec<u8> {
    hyper::body::to_bytes(response.into_body())
        .await
        .expect("read body")
        .to_vec()
}

pub async fn body_json(response: Response<axum::body::BoxBody>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).expect("json body")
}
