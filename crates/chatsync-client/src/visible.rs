use std::collections::HashSet;

/// Rows currently on screen, keyed by message unique id.
#[derive(Debug, Default)]
pub struct VisibleRangeTracker {
    visible: HashSet<String>,
}

impl VisibleRangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the row was not visible before.
    pub fn appeared(&mut self, unique_id: &str) -> bool {
        self.visible.insert(unique_id.to_string())
    }

    /// Returns true if the row was visible before.
    pub fn disappeared(&mut self, unique_id: &str) -> bool {
        self.visible.remove(unique_id)
    }

    pub fn is_visible(&self, unique_id: &str) -> bool {
        self.visible.contains(unique_id)
    }

    pub fn unique_ids(&self) -> impl Iterator<Item = &str> {
        self.visible.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.visible.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }

    pub fn clear(&mut self) {
        self.visible.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appear_disappear() {
        let mut tracker = VisibleRangeTracker::new();
        assert!(tracker.appeared("a"));
        assert!(!tracker.appeared("a"));
        assert!(tracker.is_visible("a"));
        assert!(tracker.disappeared("a"));
        assert!(!tracker.disappeared("a"));
        assert!(tracker.is_empty());
    }
}
