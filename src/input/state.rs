//! Pressed keys and action lookup

use std::collections::{BTreeMap, HashSet};

/// Keyboard state for one running simulation
#[derive(Debug, Clone, Default)]
pub struct InputState {
    /// Action name -> key codes that trigger it
    bindings: BTreeMap<String, Vec<String>>,
    pressed: HashSet<String>,
}

impl InputState {
    pub fn new(bindings: BTreeMap<String, Vec<String>>) -> Self {
        Self { bindings, pressed: HashSet::new() }
    }

    pub fn key_down(&mut self, code: &str) {
        self.pressed.insert(code.to_string());
    }

    pub fn key_up(&mut self, code: &str) {
        self.pressed.remove(code);
    }

    pub fn is_key_down(&self, code: &str) -> bool {
        self.pressed.contains(code)
    }

    /// Whether any key bound to `action` is held.
    ///
    /// An action with no binding is looked up as a raw key code, so
    /// `down("Space")` works without declaring a binding.
    pub fn action_down(&self, action: &str) -> bool {
        match self.bindings.get(action) {
            Some(codes) => codes.iter().any(|c| self.pressed.contains(c)),
            None => self.pressed.contains(action),
        }
    }

    /// Names of bound actions currently held, sorted
    pub fn actions_down(&self) -> Vec<&str> {
        self.bindings
            .keys()
            .filter(|a| self.action_down(a))
            .map(String::as_str)
            .collect()
    }

    /// Release every key (focus loss, scene stop)
    pub fn release_all(&mut self) {
        self.pressed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings() -> BTreeMap<String, Vec<String>> {
        let mut b = BTreeMap::new();
        b.insert("left".to_string(), vec!["ArrowLeft".to_string(), "KeyA".to_string()]);
        b.insert("jump".to_string(), vec!["Space".to_string()]);
        b
    }

    #[test]
    fn test_action_follows_any_bound_key() {
        let mut input = InputState::new(bindings());
        assert!(!input.action_down("left"));
        input.key_down("KeyA");
        assert!(input.action_down("left"));
        input.key_down("ArrowLeft");
        input.key_up("KeyA");
        assert!(input.action_down("left"));
        input.key_up("ArrowLeft");
        assert!(!input.action_down("left"));
    }

    #[test]
    fn test_unbound_action_reads_raw_code() {
        let mut input = InputState::new(bindings());
        input.key_down("KeyZ");
        assert!(input.action_down("KeyZ"));
        assert!(!input.action_down("fire"));
    }

    #[test]
    fn test_actions_down_and_release() {
        let mut input = InputState::new(bindings());
        input.key_down("Space");
        input.key_down("KeyA");
        assert_eq!(input.actions_down(), vec!["jump", "left"]);
        input.release_all();
        assert!(input.actions_down().is_empty());
    }
}
