use crate::detection::domain::confidence_map::ConfidenceMap;
use crate::shared::frame::Frame;

/// One model the detector must load before it can run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelStep {
    pub name: String,
    /// Download location used when the model is not found locally.
    pub url: Option<String>,
}

impl ModelStep {
    pub fn new(name: impl Into<String>, url: Option<&str>) -> Self {
        Self {
            name: name.into(),
            url: url.map(str::to_string),
        }
    }
}

/// Expression scores for one located face.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FaceExpressions {
    /// `[x1, y1, x2, y2]` in frame pixels, when the detector reports one.
    pub bbox: Option<[f64; 4]>,
    pub expressions: ConfidenceMap,
}

/// Everything a detector found in one frame. Never empty: a frame without
/// faces is reported as `None` from [`ExpressionDetector::detect`].
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionResult {
    pub faces: Vec<FaceExpressions>,
}

impl DetectionResult {
    /// The face the sampling loop reports on. Additional faces are ignored.
    pub fn primary(&self) -> Option<&FaceExpressions> {
        self.faces.first()
    }
}

/// Domain interface for the face/expression detector.
///
/// Loading is split into ordered steps; a later step may depend on an
/// earlier one having completed. `detect` is only called once every step
/// has succeeded.
pub trait ExpressionDetector: Send {
    fn load(&mut self, step: &ModelStep) -> Result<(), Box<dyn std::error::Error>>;

    fn detect(
        &mut self,
        frame: &Frame,
    ) -> Result<Option<DetectionResult>, Box<dyn std::error::Error>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(label: &str, confidence: f64) -> FaceExpressions {
        FaceExpressions {
            bbox: None,
            expressions: [(label, confidence)].into_iter().collect(),
        }
    }

    #[test]
    fn test_primary_is_first_face() {
        let result = DetectionResult {
            faces: vec![face("happy", 0.9), face("sad", 0.8)],
        };
        let primary = result.primary().unwrap();
        assert_eq!(primary.expressions.get("happy"), Some(0.9));
    }

    #[test]
    fn test_model_step_owns_url() {
        let step = ModelStep::new("face.onnx", Some("https://example.com/face.onnx"));
        assert_eq!(step.name, "face.onnx");
        assert_eq!(step.url.as_deref(), Some("https://example.com/face.onnx"));
        assert_eq!(ModelStep::new("local.onnx", None).url, None);
    }
}
