use crate::error::{DetectError, ProcessingError};
use crate::model::Classifier;
use crate::policy::{decide, Prediction};
use crate::preprocess::preprocess;
use crate::upload::{allowed_file, secure_filename, UploadStore, UploadedImage};

/// Outcome of a successful detect request.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Sanitized name the upload was stored under.
    pub filename: String,
    pub prediction: Prediction,
}

/// Checks the form field before any work is done.
pub fn validate(upload: Option<UploadedImage>) -> Result<UploadedImage, DetectError> {
    let upload = upload.ok_or(DetectError::NoFile)?;
    if upload.filename.is_empty() {
        return Err(DetectError::NoSelection);
    }
    if !allowed_file(&upload.filename) {
        return Err(DetectError::UnsupportedFormat);
    }
    Ok(upload)
}

/// Stores an accepted upload and classifies it.
pub fn process(
    upload: UploadedImage,
    store: &UploadStore,
    classifier: &dyn Classifier,
) -> Result<Detection, ProcessingError> {
    let filename = secure_filename(&upload.filename);
    if filename.is_empty() {
        return Err(ProcessingError::InvalidFilename);
    }
    store.save(&filename, &upload.data)?;

    let input = preprocess(&upload.data)?;
    let probabilities = classifier.predict(&input)?;
    let prediction = decide(&probabilities);

    tracing::info!(
        filename = %filename,
        label = prediction.label_name(),
        confidence = prediction.confidence(),
        "image classified"
    );

    Ok(Detection {
        filename,
        prediction,
    })
}
