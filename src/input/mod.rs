//! Input handling
//!
//! Hosts report physical keys by their `KeyboardEvent.code` names
//! ("ArrowLeft", "KeyA", "Space"). The project's input bindings map action
//! names onto those codes, and scripts ask for actions.

mod keys;
mod state;

pub use keys::key_code_name;
pub use state::InputState;
