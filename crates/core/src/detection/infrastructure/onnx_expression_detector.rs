/// Face + expression detector using ONNX Runtime via `ort`.
///
/// Two models, loaded in order: a YOLO face localizer, then a FER+ style
/// expression classifier that runs on grayscale crops of each located face.
use std::path::Path;

use crate::detection::domain::confidence_map::ConfidenceMap;
use crate::detection::domain::expression_detector::{
    DetectionResult, ExpressionDetector, FaceExpressions, ModelStep,
};
use crate::shared::constants::{
    EXPRESSION_MODEL_NAME, EXPRESSION_MODEL_URL, FACE_MODEL_NAME, FACE_MODEL_URL,
};
use crate::shared::frame::Frame;
use crate::shared::model_resolver::ModelResolver;

use super::execution_provider::preferred_execution_providers;
use super::math::{nms, softmax, ScoredBox};

/// Fallback YOLO model input resolution when the model doesn't specify dimensions.
const DEFAULT_FACE_INPUT_SIZE: u32 = 640;

/// Default confidence threshold for face localization.
pub const DEFAULT_FACE_CONFIDENCE: f64 = 0.5;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.45;

/// Side of the square grayscale crop fed to the expression classifier.
const EXPRESSION_INPUT_SIZE: usize = 64;

/// Classifier output order, mapped onto display labels.
const EXPRESSION_OUTPUT_LABELS: &[&str] = &[
    "neutral",
    "happy",
    "surprised",
    "sad",
    "angry",
    "disgusted",
    "fearful",
    "contempt",
];

struct FaceLocator {
    session: ort::session::Session,
    input_size: u32,
}

pub struct OnnxExpressionDetector {
    resolver: ModelResolver,
    face_model: String,
    expression_model: String,
    face_confidence: f64,
    face: Option<FaceLocator>,
    expression: Option<ort::session::Session>,
}

impl OnnxExpressionDetector {
    pub fn new(resolver: ModelResolver, face_confidence: f64) -> Self {
        Self {
            resolver,
            face_model: FACE_MODEL_NAME.to_string(),
            expression_model: EXPRESSION_MODEL_NAME.to_string(),
            face_confidence,
            face: None,
            expression: None,
        }
    }

    /// Load order for this detector. The expression step needs the face step.
    pub fn model_steps() -> Vec<ModelStep> {
        vec![
            ModelStep::new(FACE_MODEL_NAME, Some(FACE_MODEL_URL)),
            ModelStep::new(EXPRESSION_MODEL_NAME, Some(EXPRESSION_MODEL_URL)),
        ]
    }

    fn locate_faces(&mut self, frame: &Frame) -> Result<Vec<ScoredBox>, Box<dyn std::error::Error>> {
        let locator = self.face.as_mut().ok_or("face model not loaded")?;
        let (input_tensor, scale, pad_x, pad_y) = letterbox(frame, locator.input_size);

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = locator.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("face model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        if shape.len() != 3 {
            return Err(format!("Unexpected face model output shape: {shape:?}").into());
        }

        // [1, features, detections] when transposed, else [1, detections, features]
        let transposed = shape[1] < shape[2];
        let (num_dets, num_feats) = if transposed {
            (shape[2], shape[1])
        } else {
            (shape[1], shape[2])
        };
        if num_feats < 5 {
            return Err(format!("Face model output has {num_feats} features, need 5").into());
        }
        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;
        let at = |det: usize, feat: usize| -> f64 {
            if transposed {
                data[feat * num_dets + det] as f64
            } else {
                data[det * num_feats + feat] as f64
            }
        };

        let mut candidates = Vec::new();
        for i in 0..num_dets {
            let conf = at(i, 4);
            if conf < self.face_confidence {
                continue;
            }
            let (cx, cy, w, h) = (at(i, 0), at(i, 1), at(i, 2), at(i, 3));
            let bbox = [
                ((cx - w / 2.0) - pad_x as f64) / scale,
                ((cy - h / 2.0) - pad_y as f64) / scale,
                ((cx + w / 2.0) - pad_x as f64) / scale,
                ((cy + h / 2.0) - pad_y as f64) / scale,
            ];
            candidates.push(ScoredBox { bbox, score: conf });
        }

        Ok(nms(candidates, NMS_IOU_THRESH))
    }

    fn classify(&mut self, frame: &Frame, bbox: &[f64; 4]) -> Result<ConfidenceMap, Box<dyn std::error::Error>> {
        let session = self.expression.as_mut().ok_or("expression model not loaded")?;
        let input = grayscale_crop(frame, bbox, EXPRESSION_INPUT_SIZE);
        let input_value = ort::value::Tensor::from_array(input)?;
        let outputs = session.run(ort::inputs![input_value])?;
        let logits = outputs[0].try_extract_array::<f32>()?;
        let logits = logits.as_slice().ok_or("Cannot get expression logits")?;

        Ok(EXPRESSION_OUTPUT_LABELS
            .iter()
            .copied()
            .zip(softmax(logits))
            .collect())
    }
}

impl ExpressionDetector for OnnxExpressionDetector {
    fn load(&mut self, step: &ModelStep) -> Result<(), Box<dyn std::error::Error>> {
        let is_face = step.name == self.face_model;
        let is_expression = step.name == self.expression_model;
        if !is_face && !is_expression {
            return Err(format!("unknown model: {}", step.name).into());
        }
        if is_expression && self.face.is_none() {
            return Err("face model must be loaded before the expression model".into());
        }

        let path = self.resolver.resolve(&step.name, step.url.as_deref())?;
        log::info!("Loading {} from {}", step.name, path.display());
        let session = open_session(&path)?;

        if is_face {
            let input_size = square_input_size(&session).unwrap_or(DEFAULT_FACE_INPUT_SIZE);
            self.face = Some(FaceLocator {
                session,
                input_size,
            });
            // A reloaded localizer invalidates whatever classifier sat on top of it.
            self.expression = None;
        } else {
            self.expression = Some(session);
        }
        Ok(())
    }

    fn detect(
        &mut self,
        frame: &Frame,
    ) -> Result<Option<DetectionResult>, Box<dyn std::error::Error>> {
        if self.expression.is_none() {
            return Err("detector used before all models were loaded".into());
        }
        if !frame.is_decodable() {
            return Err(format!("frame {} has no decodable pixels", frame.index()).into());
        }

        let boxes = self.locate_faces(frame)?;
        if boxes.is_empty() {
            return Ok(None);
        }

        let mut faces = Vec::with_capacity(boxes.len());
        for b in &boxes {
            let expressions = self.classify(frame, &b.bbox)?;
            faces.push(FaceExpressions {
                bbox: Some(b.bbox),
                expressions,
            });
        }
        Ok(Some(DetectionResult { faces }))
    }
}

fn open_session(path: &Path) -> Result<ort::session::Session, Box<dyn std::error::Error>> {
    let session = ort::session::Session::builder()?
        .with_execution_providers(preferred_execution_providers())?
        .commit_from_file(path)?;
    Ok(session)
}

/// Reads H from an NCHW input shape, if the model declares a fixed one.
fn square_input_size(session: &ort::session::Session) -> Option<u32> {
    session.inputs().first().and_then(|input| {
        if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
            if shape.len() >= 4 && shape[2] > 0 {
                Some(shape[2] as u32)
            } else {
                None
            }
        } else {
            None
        }
    })
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Letterbox-resize a frame to `target_size` × `target_size`.
///
/// Returns `(NCHW float32 tensor, scale, pad_x, pad_y)`.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, f64, u32, u32) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = (fw * scale).round() as u32;
    let new_h = (fh * scale).round() as u32;
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    // Padding is 114/255 gray, the YOLO convention
    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    (tensor, scale, pad_x, pad_y)
}

/// Crops `bbox` (clamped to the frame), converts to luma and resizes to a
/// `size` × `size` NCHW tensor with raw 0-255 intensities.
fn grayscale_crop(frame: &Frame, bbox: &[f64; 4], size: usize) -> ndarray::Array4<f32> {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let x1 = bbox[0].clamp(0.0, fw - 1.0);
    let y1 = bbox[1].clamp(0.0, fh - 1.0);
    let x2 = bbox[2].clamp(x1 + 1.0, fw);
    let y2 = bbox[3].clamp(y1 + 1.0, fh);
    let step_x = (x2 - x1) / size as f64;
    let step_y = (y2 - y1) / size as f64;

    let src = frame.as_ndarray();
    let mut tensor = ndarray::Array4::<f32>::zeros((1, 1, size, size));
    for y in 0..size {
        let sy = ((y1 + (y as f64 + 0.5) * step_y) as usize).min(frame.height() as usize - 1);
        for x in 0..size {
            let sx = ((x1 + (x as f64 + 0.5) * step_x) as usize).min(frame.width() as usize - 1);
            let r = src[[sy, sx, 0]] as f32;
            let g = src[[sy, sx, 1]] as f32;
            let b = src[[sy, sx, 2]] as f32;
            tensor[[0, 0, y, x]] = 0.299 * r + 0.587 * g + 0.114 * b;
        }
    }
    tensor
}
