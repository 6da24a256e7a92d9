use crate::shared::constants::EXPRESSION_LABELS;

/// Emoji variants per display rank, in [`EXPRESSION_LABELS`] order.
const EMOJIS: [[&str; 3]; 7] = [
    ["😐", "🙂", "😶"],
    ["😀", "😄", "😊"],
    ["😢", "😭", "😞"],
    ["😡", "🤬", "😤"],
    ["😨", "😱", "😰"],
    ["🤢", "🤮", "😒"],
    ["😲", "😯", "😮"],
];

pub const UNKNOWN_EMOJI: &str = "❓";

/// Emoji for `label` at display position `rank` (0-based), cycling through
/// the variants. Matching is case-insensitive.
pub fn emoji_for(label: &str, rank: usize) -> &'static str {
    EXPRESSION_LABELS
        .iter()
        .position(|known| known.eq_ignore_ascii_case(label))
        .map(|i| EMOJIS[i][rank % EMOJIS[i].len()])
        .unwrap_or(UNKNOWN_EMOJI)
}

/// Confidence rendered as a whole percentage.
pub fn confidence_percent(confidence: f64) -> u32 {
    (confidence.clamp(0.0, 1.0) * 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emoji_by_rank() {
        assert_eq!(emoji_for("happy", 0), "😀");
        assert_eq!(emoji_for("happy", 1), "😄");
        assert_eq!(emoji_for("happy", 3), "😀");
    }

    #[test]
    fn test_emoji_case_insensitive() {
        assert_eq!(emoji_for("Neutral", 0), "😐");
    }

    #[test]
    fn test_every_vocabulary_label_has_distinct_emojis() {
        for label in EXPRESSION_LABELS {
            let first = emoji_for(label, 0);
            assert_ne!(first, UNKNOWN_EMOJI, "{label} has no emoji");
            let others = EXPRESSION_LABELS
                .iter()
                .filter(|other| *other != label)
                .map(|other| emoji_for(other, 0));
            for other in others {
                assert_ne!(first, other, "{label} shares its emoji");
            }
        }
    }

    #[test]
    fn test_unknown_label() {
        assert_eq!(emoji_for("contempt", 0), UNKNOWN_EMOJI);
    }

    #[test]
    fn test_confidence_percent_rounds_and_clamps() {
        assert_eq!(confidence_percent(0.625), 63);
        assert_eq!(confidence_percent(0.0), 0);
        assert_eq!(confidence_percent(1.4), 100);
    }
}
