use std::path::Path;
use std::sync::Mutex;

use tensorflow::{Graph, ImportGraphDefOptions, Session, SessionOptions, SessionRunArgs, Tensor};
use thiserror::Error;

use crate::labels::PlasticType;
use crate::preprocess::ModelInput;

#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("failed to read model file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to import graph: {0}")]
    Graph(#[from] tensorflow::Status),
    #[error("operation '{0}' not found in graph")]
    MissingOperation(String),
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("model execution failed: {0}")]
    Graph(#[from] tensorflow::Status),
    #[error("operation '{0}' not found in graph")]
    MissingOperation(String),
    #[error("expected {expected} class scores, model returned {actual}")]
    OutputShape { expected: usize, actual: usize },
    #[error("model session is unavailable")]
    Poisoned,
}

/// Softmax output of the classifier, one score per [`PlasticType`] in index order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Probabilities([f32; PlasticType::COUNT]);

impl Probabilities {
    pub fn new(scores: [f32; PlasticType::COUNT]) -> Self {
        Probabilities(scores)
    }

    pub fn scores(&self) -> &[f32; PlasticType::COUNT] {
        &self.0
    }

    /// Index and value of the highest score. The first index wins on ties and
    /// NaN scores are never selected.
    pub fn top(&self) -> (usize, f32) {
        self.0
            .iter()
            .copied()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |best, (i, p)| {
                if p > best.1 {
                    (i, p)
                } else {
                    best
                }
            })
    }

    pub fn sum(&self) -> f32 {
        self.scores().iter().sum()
    }
}

impl TryFrom<Vec<f32>> for Probabilities {
    type Error = InferenceError;

    fn try_from(scores: Vec<f32>) -> Result<Self, Self::Error> {
        let actual = scores.len();
        let scores: [f32; PlasticType::COUNT] =
            scores.try_into().map_err(|_| InferenceError::OutputShape {
                expected: PlasticType::COUNT,
                actual,
            })?;
        Ok(Probabilities(scores))
    }
}

/// An opaque pre-trained classifier: one image tensor in, one probability
/// vector out. Implementations must not retry or cache.
pub trait Classifier: Send + Sync {
    fn predict(&self, input: &ModelInput) -> Result<Probabilities, InferenceError>;
}

struct Loaded {
    session: Session,
    graph: Graph,
}

/// Frozen TensorFlow graph loaded once at startup.
pub struct TensorFlowModel {
    inner: Mutex<Loaded>,
    input_op: String,
    output_op: String,
}

impl TensorFlowModel {
    pub fn load(
        model_path: &Path,
        input_op: &str,
        output_op: &str,
    ) -> Result<Self, ModelLoadError> {
        let model_bytes = std::fs::read(model_path).map_err(|source| ModelLoadError::Io {
            path: model_path.display().to_string(),
            source,
        })?;

        let mut graph = Graph::new();
        graph.import_graph_def(&model_bytes, &ImportGraphDefOptions::new())?;

        for name in [input_op, output_op] {
            if graph.operation_by_name(name).map_err(tensorflow::Status::from)?.is_none() {
                return Err(ModelLoadError::MissingOperation(name.to_string()));
            }
        }

        let session = Session::new(&SessionOptions::new(), &graph)?;

        tracing::info!(
            path = %model_path.display(),
            input_op,
            output_op,
            "model loaded"
        );

        Ok(TensorFlowModel {
            inner: Mutex::new(Loaded { session, graph }),
            input_op: input_op.to_string(),
            output_op: output_op.to_string(),
        })
    }
}

impl Classifier for TensorFlowModel {
    fn predict(&self, input: &ModelInput) -> Result<Probabilities, InferenceError> {
        let dims: Vec<u64> = input.shape().iter().map(|&d| d as u64).collect();
        let input_tensor = Tensor::new(&dims).with_values(&input.to_flat_vec())?;

        let loaded = self.inner.lock().map_err(|_| InferenceError::Poisoned)?;

        let input_operation = loaded
            .graph
            .operation_by_name(&self.input_op)
            .map_err(tensorflow::Status::from)?
            .ok_or_else(|| InferenceError::MissingOperation(self.input_op.clone()))?;
        let output_operation = loaded
            .graph
            .operation_by_name(&self.output_op)
            .map_err(tensorflow::Status::from)?
            .ok_or_else(|| InferenceError::MissingOperation(self.output_op.clone()))?;

        let mut args = SessionRunArgs::new();
        args.add_feed(&input_operation, 0, &input_tensor);
        let output_token = args.request_fetch(&output_operation, 0);
        loaded.session.run(&mut args)?;
        let output_tensor: Tensor<f32> = args.fetch(output_token)?;

        let probabilities = Probabilities::try_from(output_tensor.to_vec())?;
        let sum = probabilities.sum();
        if (sum - 1.0).abs() > 1e-3 {
            tracing::warn!(sum, "classifier output does not sum to 1");
        }
        Ok(probabilities)
    }
}
