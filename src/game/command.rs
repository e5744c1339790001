//! Deferred effects
//!
//! Scripts and interactables never touch the world directly. They emit
//! `Command`s which the runtime applies in order once the handler (or the
//! action list) has finished.

use crate::project::InteractAction;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Translate the issuing entity
    MoveBy { dx: f32, dy: f32 },
    PlayAudio { asset_id: String, volume: f32 },
    /// Cross-fade the issuing entity's animation
    BlendTo { animation: String, duration: f32 },
    /// Switch scenes after the script stage
    GotoScene(String),
    /// Forward text to the host's onMessage
    Message(String),
}

impl From<&InteractAction> for Command {
    fn from(action: &InteractAction) -> Self {
        match action {
            InteractAction::MoveBy { dx, dy } => Command::MoveBy { dx: *dx, dy: *dy },
            InteractAction::GotoScene { scene_id } => Command::GotoScene(scene_id.clone()),
            InteractAction::ShowMessage { text } => Command::Message(text.clone()),
        }
    }
}
