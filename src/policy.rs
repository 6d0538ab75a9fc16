use crate::labels::PlasticType;
use crate::model::Probabilities;

/// Minimum top score for a prediction to be reported.
pub const CONFIDENCE_THRESHOLD: f32 = 0.7;

#[derive(Debug, Clone, PartialEq)]
pub enum Prediction {
    Identified {
        label: PlasticType,
        /// Percentage in [70, 100].
        confidence: f32,
        description: &'static str,
    },
    Undefined,
}

impl Prediction {
    pub fn label_name(&self) -> &'static str {
        match self {
            Prediction::Identified { label, .. } => label.name(),
            Prediction::Undefined => "Undefined",
        }
    }

    pub fn confidence(&self) -> Option<f32> {
        match self {
            Prediction::Identified { confidence, .. } => Some(*confidence),
            Prediction::Undefined => None,
        }
    }

    pub fn description(&self) -> Option<&'static str> {
        match self {
            Prediction::Identified { description, .. } => Some(*description),
            Prediction::Undefined => None,
        }
    }
}

pub fn decide(probabilities: &Probabilities) -> Prediction {
    let (index, confidence) = probabilities.top();
    if confidence < CONFIDENCE_THRESHOLD {
        return Prediction::Undefined;
    }
    match PlasticType::from_index(index) {
        Some(label) => Prediction::Identified {
            label,
            confidence: confidence * 100.0,
            description: label.description(),
        },
        None => Prediction::Undefined,
    }
}
