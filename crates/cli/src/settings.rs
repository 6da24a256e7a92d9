use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use expression_reader_core::detection::infrastructure::onnx_expression_detector::DEFAULT_FACE_CONFIDENCE;
use expression_reader_core::shared::constants::{SAMPLE_INTERVAL, TOP_EXPRESSIONS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub interval_ms: u64,
    pub top_n: usize,
    pub face_confidence: f64,
    pub model_dir: Option<PathBuf>,
    /// Automatic retries after a failed model load.
    pub load_retries: u32,
    pub output: OutputFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interval_ms: SAMPLE_INTERVAL.as_millis() as u64,
            top_n: TOP_EXPRESSIONS,
            face_confidence: DEFAULT_FACE_CONFIDENCE,
            model_dir: None,
            load_retries: 2,
            output: OutputFormat::Text,
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("ExpressionReader").join("settings.json"))
    }

    /// Loads settings from `path`, or from the user config directory when no
    /// path is given.
    ///
    /// An explicit path must exist and parse. The default file is optional;
    /// if it is missing or malformed the built-in defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self, Box<dyn std::error::Error>> {
        if let Some(path) = path {
            let json = fs::read_to_string(path)
                .map_err(|e| format!("Cannot read settings {}: {e}", path.display()))?;
            return serde_json::from_str(&json)
                .map_err(|e| format!("Invalid settings {}: {e}", path.display()).into());
        }

        let Some(path) = Self::config_path() else {
            return Ok(Self::default());
        };
        let Ok(json) = fs::read_to_string(&path) else {
            return Ok(Self::default());
        };
        match serde_json::from_str(&json) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                log::warn!("Ignoring invalid settings {}: {e}", path.display());
                Ok(Self::default())
            }
        }
    }

    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.interval_ms == 0 {
            return Err("Interval must be at least 1 ms".into());
        }
        if self.top_n == 0 {
            return Err("Top-N must be at least 1".into());
        }
        if !(0.0..=1.0).contains(&self.face_confidence) {
            return Err(format!(
                "Face confidence must be between 0.0 and 1.0, got {}",
                self.face_confidence
            )
            .into());
        }
        if let Some(ref dir) = self.model_dir {
            if !dir.is_dir() {
                return Err(format!("Model directory not found: {}", dir.display()).into());
            }
        }
        Ok(())
    }
}
