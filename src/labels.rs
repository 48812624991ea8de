/// Ordered mapping from unique display label to value. Two assets can
/// produce the same label; the later one gets a numeric suffix.
#[derive(Debug, Clone, PartialEq)]
pub struct Labeled<T> {
    entries: Vec<(String, T)>,
}

impl<T> Default for Labeled<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> Labeled<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert under `label`, disambiguating on collision. Returns the label used.
    pub fn insert(&mut self, label: impl Into<String>, value: T) -> String {
        let base = label.into();
        let mut label = base.clone();
        let mut suffix = 2;
        while self.contains(&label) {
            label = format!("{base} ({suffix})");
            suffix += 1;
        }
        if label != base {
            tracing::warn!(label = %base, disambiguated = %label, "duplicate display label");
        }
        self.entries.push((label.clone(), value));
        label
    }

    pub fn get(&self, label: &str) -> Option<&T> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == label)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.entries.iter().any(|(existing, _)| existing == label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(label, _)| label.as_str())
    }

    /// Label at a zero-based position, in insertion order.
    pub fn label_at(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|(label, _)| label.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
