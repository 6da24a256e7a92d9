/// Per-class expression scores for one face, in the detector's emission order.
///
/// Emission order is preserved because the ranker uses it to break ties.
/// Scores are independent per class and are not normalized to sum to one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConfidenceMap {
    entries: Vec<(String, f64)>,
}

impl ConfidenceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the score for `label`. A label seen before keeps its original
    /// position and takes the new score.
    pub fn insert(&mut self, label: impl Into<String>, confidence: f64) {
        let label = label.into();
        match self.entries.iter_mut().find(|(l, _)| *l == label) {
            Some(entry) => entry.1 = confidence,
            None => self.entries.push((label, confidence)),
        }
    }

    pub fn get(&self, label: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|&(_, c)| c)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.entries.iter().map(|(l, c)| (l.as_str(), *c))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<L: Into<String>> FromIterator<(L, f64)> for ConfidenceMap {
    fn from_iter<I: IntoIterator<Item = (L, f64)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (label, confidence) in iter {
            map.insert(label, confidence);
        }
        map
    }
}
