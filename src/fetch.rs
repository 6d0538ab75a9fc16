use std::path::Path;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("model file {0} is missing and MODEL_URL is not set")]
    Missing(String),
    #[error("invalid model token")]
    InvalidToken,
    #[error("failed to download {url}: {source}")]
    Request { url: String, source: reqwest::Error },
    #[error("failed to download {url}: status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

async fn download_file(url: &str, path: &Path, token: Option<&str>) -> Result<(), FetchError> {
    tracing::info!(url, path = %path.display(), "downloading model");

    let mut header_map = HeaderMap::new();
    if let Some(token) = token {
        let auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| FetchError::InvalidToken)?;
        header_map.insert(AUTHORIZATION, auth_value);
    }
    header_map.insert(ACCEPT, HeaderValue::from_static("application/octet-stream"));

    let request_error = |source| FetchError::Request {
        url: url.to_string(),
        source,
    };

    let client = reqwest::Client::new();
    let response = client
        .get(url)
        .headers(header_map)
        .send()
        .await
        .map_err(request_error)?;

    if !response.status().is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: response.status(),
        });
    }

    let bytes = response.bytes().await.map_err(request_error)?;

    let write_error = |source| FetchError::Write {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_error)?;
    }
    tokio::fs::write(path, &bytes).await.map_err(write_error)?;

    tracing::info!(bytes = bytes.len(), "model downloaded");
    Ok(())
}

/// Makes sure the model artifact exists locally, downloading it from `url`
/// when it does not.
pub async fn ensure_model_exists(
    model_path: &Path,
    url: Option<&str>,
    token: Option<&str>,
) -> Result<(), FetchError> {
    tracing::info!(path = %model_path.display(), "checking model");
    if model_path.exists() {
        return Ok(());
    }

    match url {
        Some(url) => download_file(url, model_path, token).await,
        None => Err(FetchError::Missing(model_path.display().to_string())),
    }
}
