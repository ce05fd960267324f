use serde::{Deserialize, Serialize};

use crate::{BeatCoachError, Result};

/// Keys that must never be bound to a target; they are reserved for the
/// host application (pause, dismiss, confirm).
const FORBIDDEN_KEYS: &[&str] = &["space", "escape", "return"];

/// How a routed target name is matched against candidate action names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Exact match only. The safe choice when target names can overlap.
    Exact,
    /// Three-stage resolution: exact, then case-insensitive, then
    /// substring in either direction.
    #[default]
    Fuzzy,
}

/// A raw key identifier bound to a logical target name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBinding {
    pub key: String,
    pub target: String,
}

/// A deduplicated, mapped input ready for judgment.
#[derive(Debug, Clone, PartialEq)]
pub struct InputEvent {
    pub target: String,
    pub timestamp: f32,
}

/// Maps raw key events to logical targets before they reach the session.
///
/// The router is deliberately dumb: it knows nothing about beats or actions,
/// only about which key belongs to which target.
#[derive(Debug, Default)]
pub struct InputRouter {
    bindings: Vec<KeyBinding>,
}

impl InputRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a key-to-target binding. Forbidden keys are rejected;
    /// a key that is already bound keeps its first target.
    pub fn bind(&mut self, key: impl Into<String>, target: impl Into<String>) -> Result<()> {
        let key = key.into();
        if FORBIDDEN_KEYS
            .iter()
            .any(|forbidden| key.eq_ignore_ascii_case(forbidden))
        {
            return Err(BeatCoachError::InvalidInput(
                "key is reserved and cannot be bound",
            ));
        }

        if self.bindings.iter().any(|binding| binding.key == key) {
            tracing::warn!(key, "duplicate key binding ignored; first one wins");
            return Ok(());
        }

        self.bindings.push(KeyBinding {
            key,
            target: target.into(),
        });
        Ok(())
    }

    /// Resolves a raw key press into an input event, or `None` when the key
    /// is unbound.
    pub fn route(&self, key: &str, timestamp: f32) -> Option<InputEvent> {
        self.bindings
            .iter()
            .find(|binding| binding.key == key)
            .map(|binding| InputEvent {
                target: binding.target.clone(),
                timestamp,
            })
    }

    pub fn bindings(&self) -> &[KeyBinding] {
        &self.bindings
    }

    pub fn clear(&mut self) {
        self.bindings.clear();
    }
}

/// Resolves `wanted` against a list of candidate names, returning the index
/// of the first match per stage. Substring matching can pick an unintended
/// target when names overlap; use [`MatchMode::Exact`] to rule that out.
pub fn resolve_index(wanted: &str, candidates: &[&str], mode: MatchMode) -> Option<usize> {
    if let Some(index) = candidates.iter().position(|name| *name == wanted) {
        return Some(index);
    }
    if mode == MatchMode::Exact {
        return None;
    }

    if let Some(index) = candidates
        .iter()
        .position(|name| name.eq_ignore_ascii_case(wanted))
    {
        return Some(index);
    }

    candidates
        .iter()
        .position(|name| name.contains(wanted) || wanted.contains(*name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_bound_keys_and_ignores_unbound() {
        let mut router = InputRouter::new();
        router.bind("j", "drummer").unwrap();

        let event = router.route("j", 1.5).expect("bound key should route");
        assert_eq!(event.target, "drummer");
        assert_eq!(event.timestamp, 1.5);
        assert!(router.route("k", 1.5).is_none());
    }

    #[test]
    fn rejects_forbidden_keys() {
        let mut router = InputRouter::new();
        assert!(router.bind("space", "drummer").is_err());
        assert!(router.bind("Escape", "drummer").is_err());
        assert!(router.bindings().is_empty());
    }

    #[test]
    fn first_binding_wins_on_duplicates() {
        let mut router = InputRouter::new();
        router.bind("j", "drummer").unwrap();
        router.bind("j", "bassist").unwrap();

        assert_eq!(router.route("j", 0.0).unwrap().target, "drummer");
        assert_eq!(router.bindings().len(), 1);
    }

    #[test]
    fn resolution_prefers_exact_over_loose_matches() {
        let candidates = ["Drummer", "drummer", "drummer_left"];
        // Exact beats case-insensitive even though "Drummer" comes first.
        assert_eq!(
            resolve_index("drummer", &candidates, MatchMode::Fuzzy),
            Some(1)
        );
        assert_eq!(
            resolve_index("DRUMMER", &candidates, MatchMode::Fuzzy),
            Some(0)
        );
        // Substring fallback in either direction; the first overlapping
        // name wins, which is exactly the ambiguity exact mode avoids.
        assert_eq!(
            resolve_index("drummer_left_hand", &candidates, MatchMode::Fuzzy),
            Some(1)
        );
        assert_eq!(resolve_index("pianist", &candidates, MatchMode::Fuzzy), None);
    }

    #[test]
    fn exact_mode_skips_the_fallback_stages() {
        let candidates = ["drummer_left"];
        assert_eq!(
            resolve_index("drummer", &candidates, MatchMode::Exact),
            None
        );
        assert_eq!(
            resolve_index("drummer_left", &candidates, MatchMode::Exact),
            Some(0)
        );
    }
}
