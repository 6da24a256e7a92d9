use thiserror::Error;

use crate::detection::domain::expression_detector::{ExpressionDetector, ModelStep};

/// Model-loading lifecycle. Inference is only admitted in `Ready`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReadinessState {
    Unloaded,
    Loading,
    Ready,
    LoadFailed(String),
}

impl ReadinessState {
    pub fn is_ready(&self) -> bool {
        matches!(self, ReadinessState::Ready)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ReadinessState::LoadFailed(_))
    }
}

/// A load step failed; the whole load is reported as failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to load model {model} (step {step}): {reason}")]
pub struct LoadError {
    /// 1-based position of the failing step.
    pub step: usize,
    pub model: String,
    pub reason: String,
}

/// Owns the [`ReadinessState`] and enforces its legal transitions:
///
/// ```text
/// Unloaded ──begin_load──▶ Loading ──finish_load──▶ Ready
///                             ▲            └──────▶ LoadFailed
///                             └────────retry────────────┘
/// ```
#[derive(Debug)]
pub struct ReadinessMachine {
    state: ReadinessState,
}

impl ReadinessMachine {
    pub fn new() -> Self {
        Self {
            state: ReadinessState::Unloaded,
        }
    }

    pub fn state(&self) -> &ReadinessState {
        &self.state
    }

    /// `Unloaded → Loading`. Returns false from any other state.
    pub fn begin_load(&mut self) -> bool {
        if self.state != ReadinessState::Unloaded {
            return false;
        }
        self.state = ReadinessState::Loading;
        true
    }

    /// `LoadFailed → Loading`. A no-op (returning false) while loading or ready.
    pub fn retry(&mut self) -> bool {
        if !self.state.is_failed() {
            return false;
        }
        self.state = ReadinessState::Loading;
        true
    }

    /// Settles a load attempt. Ignored unless a load is in progress.
    pub fn finish_load(&mut self, result: Result<(), LoadError>) {
        if self.state != ReadinessState::Loading {
            log::warn!("Ignoring load completion in state {:?}", self.state);
            return;
        }
        self.state = match result {
            Ok(()) => ReadinessState::Ready,
            Err(e) => ReadinessState::LoadFailed(e.to_string()),
        };
    }
}

impl Default for ReadinessMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs every load step in order, stopping at the first failure.
///
/// Steps are strictly sequential: a step only starts once the previous one
/// has returned.
pub fn load_models(
    detector: &mut dyn ExpressionDetector,
    steps: &[ModelStep],
) -> Result<(), LoadError> {
    for (i, step) in steps.iter().enumerate() {
        log::info!("Loading model {}/{}: {}", i + 1, steps.len(), step.name);
        detector.load(step).map_err(|e| LoadError {
            step: i + 1,
            model: step.name.clone(),
            reason: e.to_string(),
        })?;
    }
    Ok(())
}
