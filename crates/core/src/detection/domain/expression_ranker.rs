use std::cmp::Ordering;
use std::ops::Deref;

use crate::detection::domain::confidence_map::ConfidenceMap;
use crate::shared::constants::TOP_EXPRESSIONS;

/// One label with its detector score, as delivered to consumers.
#[derive(Clone, Debug, PartialEq)]
pub struct ExpressionSample {
    pub label: String,
    pub confidence: f64,
}

/// Top-N expressions of one cycle, highest confidence first.
///
/// Built only by [`ExpressionRanker`]; each cycle produces a fresh list that
/// replaces the previous one wholesale.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RankedExpressionList {
    samples: Vec<ExpressionSample>,
}

impl RankedExpressionList {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn top(&self) -> Option<&ExpressionSample> {
        self.samples.first()
    }
}

impl Deref for RankedExpressionList {
    type Target = [ExpressionSample];

    fn deref(&self) -> &[ExpressionSample] {
        &self.samples
    }
}

/// Turns a raw confidence map into a stable top-N list.
///
/// Sorting is descending by confidence and stable, so equal scores keep the
/// detector's emission order. Scores are passed through untouched and labels
/// are not checked against any vocabulary.
#[derive(Clone, Copy, Debug)]
pub struct ExpressionRanker {
    top_n: usize,
}

impl ExpressionRanker {
    pub fn new(top_n: usize) -> Self {
        Self { top_n }
    }

    pub fn rank(&self, scores: &ConfidenceMap) -> RankedExpressionList {
        let mut samples: Vec<ExpressionSample> = scores
            .iter()
            .map(|(label, confidence)| ExpressionSample {
                label: label.to_string(),
                confidence,
            })
            .collect();

        // `sort_by` is stable; NaN sinks to the bottom instead of poisoning
        // the ordering.
        samples.sort_by(|a, b| descending(a.confidence, b.confidence));
        samples.truncate(self.top_n);

        RankedExpressionList { samples }
    }
}

impl Default for ExpressionRanker {
    fn default() -> Self {
        Self::new(TOP_EXPRESSIONS)
    }
}

fn descending(a: f64, b: f64) -> Ordering {
    sort_key(b).total_cmp(&sort_key(a))
}

fn sort_key(confidence: f64) -> f64 {
    if confidence.is_nan() {
        f64::NEG_INFINITY
    } else {
        confidence
    }
}
