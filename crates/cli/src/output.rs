use serde::Serialize;

use expression_reader_core::detection::domain::expression_display::{
    confidence_percent, emoji_for,
};
use expression_reader_core::detection::domain::expression_ranker::RankedExpressionList;

#[derive(Serialize)]
struct CycleLine<'a> {
    face_detected: bool,
    expressions: Vec<ExpressionEntry<'a>>,
}

#[derive(Serialize)]
struct ExpressionEntry<'a> {
    label: &'a str,
    confidence: f64,
}

/// One human-readable line per cycle, e.g. `😀 happy 71%  😐 neutral 20%`.
pub fn format_text(face_detected: bool, expressions: &RankedExpressionList) -> String {
    if !face_detected {
        return "no face".to_string();
    }
    if expressions.is_empty() {
        return "face detected".to_string();
    }
    expressions
        .iter()
        .enumerate()
        .map(|(rank, sample)| {
            format!(
                "{} {} {}%",
                emoji_for(&sample.label, rank),
                sample.label,
                confidence_percent(sample.confidence)
            )
        })
        .collect::<Vec<_>>()
        .join("  ")
}

pub fn format_json(
    face_detected: bool,
    expressions: &RankedExpressionList,
) -> Result<String, serde_json::Error> {
    let line = CycleLine {
        face_detected,
        expressions: expressions
            .iter()
            .map(|s| ExpressionEntry {
                label: &s.label,
                confidence: s.confidence,
            })
            .collect(),
    };
    serde_json::to_string(&line)
}
