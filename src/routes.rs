use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::{header::CONTENT_LENGTH, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::detect::{self, Detection};
use crate::error::{DetectError, ProcessingError};
use crate::model::Classifier;
use crate::render;
use crate::upload::{UploadStore, UploadedImage};

pub struct AppState {
    pub classifier: Arc<dyn Classifier>,
    pub store: UploadStore,
    pub body_limit_bytes: usize,
}

#[derive(Serialize)]
struct DetectResponse {
    prediction: &'static str,
    confidence: Option<f32>,
    description: Option<&'static str>,
    filename: String,
}

impl From<Detection> for DetectResponse {
    fn from(detection: Detection) -> Self {
        DetectResponse {
            prediction: detection.prediction.label_name(),
            confidence: detection.prediction.confidence(),
            description: detection.prediction.description(),
            filename: detection.filename,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    let uploads = ServeDir::new(state.store.root());

    Router::new()
        .route("/", get(home))
        .route("/detect", get(detect_form).post(detect_submit))
        .route("/api/detect", post(api_detect))
        .route("/health", get(health_check))
        .nest_service("/uploads", uploads)
        .layer(DefaultBodyLimit::max(state.body_limit_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn home() -> Html<String> {
    Html(render::home_page())
}

async fn detect_form() -> Html<String> {
    Html(render::detect_page(None))
}

async fn detect_submit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> (StatusCode, Html<String>) {
    let outcome = run_detection(&state, &headers, multipart).await;

    // Only an oversized body escapes the page; every other failure is shown inline.
    let status = match &outcome {
        Err(err @ DetectError::PayloadTooLarge { .. }) => err.status(),
        _ => StatusCode::OK,
    };
    (status, Html(render::detect_page(Some(&outcome))))
}

async fn api_detect(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    match run_detection(&state, &headers, multipart).await {
        Ok(detection) => Json(DetectResponse::from(detection)).into_response(),
        Err(err) => (
            err.status(),
            Json(ErrorResponse {
                error: err.to_string(),
            }),
        )
            .into_response(),
    }
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "OK" }))
}

async fn run_detection(
    state: &Arc<AppState>,
    headers: &HeaderMap,
    multipart: Multipart,
) -> Result<Detection, DetectError> {
    let outcome = detect_upload(state, headers, multipart).await;
    if let Err(err) = &outcome {
        tracing::warn!(error = %err, "detection failed");
    }
    outcome
}

async fn detect_upload(
    state: &Arc<AppState>,
    headers: &HeaderMap,
    multipart: Multipart,
) -> Result<Detection, DetectError> {
    let limit = state.body_limit_bytes;
    if content_length(headers).is_some_and(|len| len > limit) {
        return Err(too_large(limit));
    }

    let upload = detect::validate(read_image_field(multipart, limit).await?)?;

    let state = Arc::clone(state);
    let detection = tokio::task::spawn_blocking(move || {
        detect::process(upload, &state.store, state.classifier.as_ref())
    })
    .await
    .map_err(ProcessingError::from)??;

    Ok(detection)
}

fn content_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// Pulls the `image` file out of the form. Parts without a `filename`
/// parameter are plain form fields and never count as the upload.
async fn read_image_field(
    mut multipart: Multipart,
    limit: usize,
) -> Result<Option<UploadedImage>, DetectError> {
    let upload_error = |err: MultipartError| {
        // chunked bodies carry no Content-Length and only hit the limit mid-stream
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            too_large(limit)
        } else {
            DetectError::Malformed(err.to_string())
        }
    };

    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        if field.name() != Some("image") {
            continue;
        }
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let data = field.bytes().await.map_err(upload_error)?.to_vec();
        return Ok(Some(UploadedImage { filename, data }));
    }
    Ok(None)
}

fn too_large(limit_bytes: usize) -> DetectError {
    DetectError::PayloadTooLarge {
        limit_mb: limit_bytes / (1024 * 1024),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::tests::FixedClassifier;
    use crate::preprocess::tests::encode_png;
    use crate::upload::tests::scratch_dir;
    use axum::body::Body;
    use axum::http::{header::CONTENT_TYPE, Request};
    use image::Rgb;
    use tower::ServiceExt;

    const BOUNDARY: &str = "plastic-detect-boundary";

    struct Part<'a> {
        name: &'a str,
        filename: Option<&'a str>,
        data: Vec<u8>,
    }

    fn multipart_body(parts: &[Part]) -> Vec<u8> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part.filename {
                Some(filename) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        part.name, filename
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                        part.name
                    )
                    .as_bytes(),
                ),
            }
            body.extend_from_slice(&part.data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(uri: &str, parts: &[Part]) -> Request<Body> {
        let body = multipart_body(parts);
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .header(CONTENT_LENGTH, body.len())
            .body(Body::from(body))
            .unwrap()
    }

    fn image_part(filename: &str, data: Vec<u8>) -> Part<'_> {
        Part {
            name: "image",
            filename: Some(filename),
            data,
        }
    }

    fn app(name: &str, scores: [f32; 7], body_limit_bytes: usize) -> (Router, UploadStore) {
        let store = UploadStore::new(scratch_dir(name));
        store.ensure_dir().unwrap();
        let state = Arc::new(AppState {
            classifier: Arc::new(FixedClassifier::new(scores)),
            store: store.clone(),
            body_limit_bytes,
        });
        (router(state), store)
    }

    const PET: [f32; 7] = [0.95, 0.01, 0.01, 0.01, 0.01, 0.005, 0.005];
    const TEN_MB: usize = 10 * 1024 * 1024;

    async fn body_text(response: Response) -> String {
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        serde_json::from_str(&body_text(response).await).unwrap()
    }

    #[tokio::test]
    async fn landing_page_and_empty_form() {
        let (app, store) = app("routes-pages", PET, TEN_MB);

        let response = app
            .clone()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Deteksi Jenis Plastik"));

        let response = app
            .oneshot(Request::get("/detect").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains(r#"enctype="multipart/form-data""#));
        assert!(!html.contains(r#"class="error""#));
        let _ = std::fs::remove_dir_all(store.root());
    }

    #[tokio::test]
    async fn missing_image_field_reports_no_file() {
        let (app, store) = app("routes-nofile", PET, TEN_MB);
        let request = upload_request(
            "/detect",
            &[Part {
                name: "note",
                filename: None,
                data: b"hello".to_vec(),
            }],
        );

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response)
            .await
            .contains("Tidak ada file yang diunggah"));
        let _ = std::fs::remove_dir_all(store.root());
    }

    #[tokio::test]
    async fn empty_filename_reports_no_selection() {
        let (app, store) = app("routes-noselect", PET, TEN_MB);
        let request = upload_request("/detect", &[image_part("", Vec::new())]);

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response)
            .await
            .contains("Tidak ada file yang dipilih"));
        let _ = std::fs::remove_dir_all(store.root());
    }

    #[tokio::test]
    async fn bmp_reports_unsupported_format() {
        let (app, store) = app("routes-bmp", PET, TEN_MB);
        let request = upload_request("/detect", &[image_part("photo.bmp", vec![0x42, 0x4d])]);

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response)
            .await
            .contains("Format file tidak didukung"));
        let _ = std::fs::remove_dir_all(store.root());
    }

    #[tokio::test]
    async fn corrupt_image_is_reported_inline() {
        let (app, store) = app("routes-corrupt", PET, TEN_MB);
        let request = upload_request("/detect", &[image_part("x.jpg", b"garbage".to_vec())]);

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response)
            .await
            .contains("Terjadi kesalahan saat memproses gambar"));
        let _ = std::fs::remove_dir_all(store.root());
    }

    #[tokio::test]
    async fn valid_upload_renders_prediction_and_is_served_back() {
        let (app, store) = app("routes-ok", PET, TEN_MB);
        let png = encode_png(40, 30, |_, _| Rgb([12, 34, 56]));
        let request = upload_request(
            "/detect",
            &[
                Part {
                    name: "note",
                    filename: None,
                    data: b"ignored".to_vec(),
                },
                image_part("botol air.png", png.clone()),
            ],
        );

        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("Hasil: PET"));
        assert!(html.contains("95.00%"));
        assert!(html.contains(r#"src="/uploads/botol_air.png""#));

        let response = app
            .oneshot(
                Request::get("/uploads/botol_air.png")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let served = hyper::body::to_bytes(response.into_body()).await.unwrap();
        assert_eq!(served.to_vec(), png);
        let _ = std::fs::remove_dir_all(store.root());
    }

    #[tokio::test]
    async fn low_confidence_renders_undefined() {
        let (app, store) = app(
            "routes-undefined",
            [0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.4],
            TEN_MB,
        );
        let png = encode_png(8, 8, |_, _| Rgb([0, 0, 0]));
        let request = upload_request("/detect", &[image_part("a.jpeg", png)]);

        let response = app.oneshot(request).await.unwrap();
        let html = body_text(response).await;
        assert!(html.contains("Hasil: Undefined"));
        assert!(!html.contains("Tingkat keyakinan: "));
        let _ = std::fs::remove_dir_all(store.root());
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let (app, store) = app("routes-large", PET, 1024);
        let request = upload_request("/detect", &[image_part("big.png", vec![0u8; 4096])]);

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(std::fs::read_dir(store.root()).unwrap().next().is_none());
        let _ = std::fs::remove_dir_all(store.root());
    }

    fn chunked_upload_request(uri: &str, parts: &[Part]) -> Request<Body> {
        let payload = multipart_body(parts);
        let (mut sender, body) = Body::channel();
        tokio::spawn(async move {
            for chunk in payload.chunks(512) {
                let chunk = hyper::body::Bytes::copy_from_slice(chunk);
                if sender.send_data(chunk).await.is_err() {
                    break;
                }
            }
        });
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(body)
            .unwrap()
    }

    #[tokio::test]
    async fn oversized_chunked_body_is_rejected_on_both_endpoints() {
        let (app, store) = app("routes-large-chunked", PET, 1024);

        let request = chunked_upload_request("/detect", &[image_part("big.png", vec![0u8; 4096])]);
        assert!(request.headers().get(CONTENT_LENGTH).is_none());
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(body_text(response).await.contains("Ukuran file melebihi batas"));

        let request =
            chunked_upload_request("/api/detect", &[image_part("big.png", vec![0u8; 4096])]);
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let json = body_json(response).await;
        assert!(json["error"]
            .as_str()
            .unwrap()
            .starts_with("Ukuran file melebihi batas"));

        assert!(std::fs::read_dir(store.root()).unwrap().next().is_none());
        let _ = std::fs::remove_dir_all(store.root());
    }

    #[tokio::test]
    async fn image_field_without_filename_reports_no_file() {
        let (app, store) = app("routes-image-no-filename", PET, TEN_MB);
        let png = encode_png(8, 8, |_, _| Rgb([1, 2, 3]));
        let request = upload_request(
            "/api/detect",
            &[Part {
                name: "image",
                filename: None,
                data: png,
            }],
        );

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Tidak ada file yang diunggah");
        assert!(std::fs::read_dir(store.root()).unwrap().next().is_none());
        let _ = std::fs::remove_dir_all(store.root());
    }

    #[tokio::test]
    async fn image_field_with_empty_filename_reports_no_selection() {
        let (app, store) = app("routes-image-empty-filename", PET, TEN_MB);
        let request = upload_request("/api/detect", &[image_part("", b"abc".to_vec())]);

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Tidak ada file yang dipilih");
        let _ = std::fs::remove_dir_all(store.root());
    }

    #[tokio::test]
    async fn api_returns_json_prediction() {
        let (app, store) = app("routes-api-ok", PET, TEN_MB);
        let png = encode_png(16, 16, |_, _| Rgb([255, 255, 255]));
        let request = upload_request("/api/detect", &[image_part("cup.jpg", png)]);

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["prediction"], "PET");
        assert_eq!(json["filename"], "cup.jpg");
        let confidence = json["confidence"].as_f64().unwrap();
        assert!((confidence - 95.0).abs() < 1e-3);
        assert!(json["description"]
            .as_str()
            .unwrap()
            .contains("botol air mineral"));
        let _ = std::fs::remove_dir_all(store.root());
    }

    #[tokio::test]
    async fn api_uses_status_codes_for_errors() {
        let (app, store) = app("routes-api-err", PET, TEN_MB);

        let response = app
            .clone()
            .oneshot(upload_request(
                "/api/detect",
                &[image_part("photo.bmp", vec![1])],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["error"]
            .as_str()
            .unwrap()
            .starts_with("Format file tidak didukung"));

        let response = app
            .oneshot(upload_request(
                "/api/detect",
                &[image_part("x.png", b"not a png".to_vec())],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let _ = std::fs::remove_dir_all(store.root());
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (app, store) = app("routes-health", PET, TEN_MB);
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "status": "OK" }));
        let _ = std::fs::remove_dir_all(store.root());
    }
}
