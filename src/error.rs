use axum::http::StatusCode;
use thiserror::Error;

use crate::model::InferenceError;
use crate::preprocess::PreprocessError;

/// Failure of the work done after an upload has been accepted.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("nama file tidak valid")]
    InvalidFilename,
    #[error("gagal menyimpan file: {0}")]
    Storage(#[from] std::io::Error),
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error("worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Everything a detect request can end in besides a prediction. The
/// `Display` text is what the user sees.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("Tidak ada file yang diunggah")]
    NoFile,
    #[error("Tidak ada file yang dipilih")]
    NoSelection,
    #[error("Format file tidak didukung. Harap unggah gambar (PNG, JPG, JPEG)")]
    UnsupportedFormat,
    #[error("Ukuran file melebihi batas {limit_mb} MB")]
    PayloadTooLarge { limit_mb: usize },
    #[error("Unggahan tidak valid: {0}")]
    Malformed(String),
    #[error("Terjadi kesalahan saat memproses gambar: {0}")]
    Processing(#[from] ProcessingError),
}

impl DetectError {
    pub fn status(&self) -> StatusCode {
        match self {
            DetectError::NoFile
            | DetectError::NoSelection
            | DetectError::UnsupportedFormat
            | DetectError::Malformed(_) => StatusCode::BAD_REQUEST,
            DetectError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            DetectError::Processing(ProcessingError::Preprocess(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            DetectError::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
