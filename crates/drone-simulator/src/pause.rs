//! Per-fleet set of frozen drones.

use std::collections::HashSet;

/// State of a drone after a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseState {
    Paused,
    Resumed,
}

impl PauseState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Paused => "paused",
            Self::Resumed => "resumed",
        }
    }
}

/// Drone ids excluded from movement. Owned and mutated only by its fleet.
#[derive(Debug, Clone, Default)]
pub struct PauseRegistry {
    paused: HashSet<String>,
}

impl PauseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pause `drone_id` if it is moving, resume it if it is paused.
    pub fn toggle(&mut self, drone_id: &str) -> PauseState {
        if self.paused.remove(drone_id) {
            PauseState::Resumed
        } else {
            self.paused.insert(drone_id.to_string());
            PauseState::Paused
        }
    }

    pub fn is_paused(&self, drone_id: &str) -> bool {
        self.paused.contains(drone_id)
    }

    pub fn len(&self) -> usize {
        self.paused.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paused.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paused.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_round_trip() {
        let mut registry = PauseRegistry::new();
        assert!(registry.is_empty());

        assert_eq!(registry.toggle("air1-0"), PauseState::Paused);
        assert!(registry.is_paused("air1-0"));
        assert!(!registry.is_paused("air1-1"));

        assert_eq!(registry.toggle("air1-0"), PauseState::Resumed);
        assert!(!registry.is_paused("air1-0"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_independent_ids() {
        let mut registry = PauseRegistry::new();
        registry.toggle("air1-0");
        registry.toggle("air1-2");

        assert_eq!(registry.len(), 2);
        let mut ids: Vec<_> = registry.iter().collect();
        ids.sort_unstable();
        assert_eq!(ids, ["air1-0", "air1-2"]);
    }
}
