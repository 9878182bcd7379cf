use std::collections::HashSet;

/// Distinct track ids seen during the current session.
///
/// Grows monotonically until [`TrackRegistry::reset`]. Untracked detections never
/// reach it.
#[derive(Debug, Default, Clone)]
pub struct TrackRegistry {
    seen: HashSet<u64>,
}

impl TrackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `track_id`; true on its first sighting this session.
    pub fn observe(&mut self, track_id: u64) -> bool {
        self.seen.insert(track_id)
    }

    pub fn count(&self) -> usize {
        self.seen.len()
    }

    pub fn reset(&mut self) {
        self.seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observe_is_true_once_per_id() {
        let mut registry = TrackRegistry::new();
        assert!(registry.observe(7));
        assert!(!registry.observe(7));
        assert!(registry.observe(0));
        assert!(registry.observe(u64::MAX));
        assert!(!registry.observe(0));
        assert_eq!(registry.count(), 3);
    }

    #[test]
    fn reset_is_idempotent() {
        let mut registry = TrackRegistry::new();
        registry.reset();
        assert_eq!(registry.count(), 0);

        for id in [1, 2, 2, 3, 1] {
            registry.observe(id);
        }
        assert_eq!(registry.count(), 3);

        registry.reset();
        registry.reset();
        assert_eq!(registry.count(), 0);
        assert!(registry.observe(1));
    }
}
