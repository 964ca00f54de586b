use std::path::Path;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};

use crate::{config::ServerConfig, errors::ModelError};

async fn download_file(url: &str, path: &Path, token: Option<&str>) -> Result<(), ModelError> {
    tracing::info!(url, path = %path.display(), "downloading model");
    let failed = |reason: String| ModelError::Download {
        url: url.to_string(),
        reason,
    };

    let mut header_map = HeaderMap::new();
    if let Some(token) = token {
        let auth_value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| failed("GITHUB_TOKEN is not a valid header value".into()))?;
        header_map.insert(AUTHORIZATION, auth_value);
    }
    header_map.insert(ACCEPT, HeaderValue::from_static("application/octet-stream"));

    let response = reqwest::Client::new()
        .get(url)
        .headers(header_map)
        .send()
        .await
        .map_err(|e| failed(e.to_string()))?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, &bytes).await?;
    tracing::info!(bytes = bytes.len(), "model downloaded");
    Ok(())
}

/// Makes sure the weights exist locally, fetching them from `MODEL_URL` if not.
pub async fn ensure_model_file(config: &ServerConfig) -> Result<(), ModelError> {
    let path = config.model_path.as_path();
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Ok(());
    }
    match config.model_url.as_deref() {
        Some(url) => download_file(url, path, config.model_download_token.as_deref()).await,
        None => Err(ModelError::MissingArtifact {
            path: path.display().to_string(),
        }),
    }
}
