use std::time::Instant;

use thiserror::Error;

use crate::detection::domain::expression_detector::ExpressionDetector;
use crate::detection::domain::expression_ranker::ExpressionRanker;
use crate::media::domain::frame_source::FrameSource;

use super::cycle_logger::CycleLogger;
use super::result_publisher::{DetectionCycleResult, ResultPublisher};

/// A single cycle failed. The loop logs it and carries on with the next tick.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CycleError {
    #[error("frame capture failed: {0}")]
    Capture(String),
    #[error("detection failed on frame {frame}: {reason}")]
    Detect { frame: usize, reason: String },
}

/// What a cycle that did not fail amounted to.
#[derive(Clone, Debug, PartialEq)]
pub enum CycleOutcome {
    Published(DetectionCycleResult),
    /// The source had no decodable picture yet. Nothing was published.
    FrameNotReady,
    /// The cycle completed after teardown and its result was dropped.
    Discarded,
}

/// capture → readiness check → detect → rank → publish.
pub struct DetectionCycle {
    ranker: ExpressionRanker,
}

impl DetectionCycle {
    pub fn new(ranker: ExpressionRanker) -> Self {
        Self { ranker }
    }

    pub fn run(
        &self,
        source: &mut dyn FrameSource,
        detector: &mut dyn ExpressionDetector,
        publisher: &ResultPublisher,
        logger: &mut dyn CycleLogger,
    ) -> Result<CycleOutcome, CycleError> {
        let frame = source
            .capture()
            .map_err(|e| CycleError::Capture(e.to_string()))?;
        if !frame.is_decodable() {
            return Ok(CycleOutcome::FrameNotReady);
        }

        let t0 = Instant::now();
        let detection = detector.detect(&frame).map_err(|e| CycleError::Detect {
            frame: frame.index(),
            reason: e.to_string(),
        })?;
        logger.timing("detect", t0.elapsed().as_secs_f64() * 1000.0);

        let result = match detection.as_ref().and_then(|d| d.primary()) {
            Some(face) => {
                logger.metric("faces", detection.as_ref().map_or(0, |d| d.faces.len()) as f64);
                let t1 = Instant::now();
                let ranked = self.ranker.rank(&face.expressions);
                logger.timing("rank", t1.elapsed().as_secs_f64() * 1000.0);
                DetectionCycleResult::face(ranked)
            }
            None => {
                logger.metric("faces", 0.0);
                DetectionCycleResult::no_face()
            }
        };

        if publisher.publish(result.clone()) {
            Ok(CycleOutcome::Published(result))
        } else {
            Ok(CycleOutcome::Discarded)
        }
    }
}

impl Default for DetectionCycle {
    fn default() -> Self {
        Self::new(ExpressionRanker::default())
    }
}
