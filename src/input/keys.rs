//! macroquad key codes as `KeyboardEvent.code` names

use macroquad::input::KeyCode;

/// The web `code` name for a macroquad key, None for keys with no mapping
pub fn key_code_name(key: KeyCode) -> Option<&'static str> {
    let name = match key {
        KeyCode::Space => "Space",
        KeyCode::Apostrophe => "Quote",
        KeyCode::Comma => "Comma",
        KeyCode::Minus => "Minus",
        KeyCode::Period => "Period",
        KeyCode::Slash => "Slash",
        KeyCode::Key0 => "Digit0",
        KeyCode::Key1 => "Digit1",
        KeyCode::Key2 => "Digit2",
        KeyCode::Key3 => "Digit3",
        KeyCode::Key4 => "Digit4",
        KeyCode::Key5 => "Digit5",
        KeyCode::Key6 => "Digit6",
        KeyCode::Key7 => "Digit7",
        KeyCode::Key8 => "Digit8",
        KeyCode::Key9 => "Digit9",
        KeyCode::Semicolon => "Semicolon",
        KeyCode::Equal => "Equal",
        KeyCode::A => "KeyA",
        KeyCode::B => "KeyB",
        KeyCode::C => "KeyC",
        KeyCode::D => "KeyD",
        KeyCode::E => "KeyE",
        KeyCode::F => "KeyF",
        KeyCode::G => "KeyG",
        KeyCode::H => "KeyH",
        KeyCode::I => "KeyI",
        KeyCode::J => "KeyJ",
        KeyCode::K => "KeyK",
        KeyCode::L => "KeyL",
        KeyCode::M => "KeyM",
        KeyCode::N => "KeyN",
        KeyCode::O => "KeyO",
        KeyCode::P => "KeyP",
        KeyCode::Q => "KeyQ",
        KeyCode::R => "KeyR",
        KeyCode::S => "KeyS",
        KeyCode::T => "KeyT",
        KeyCode::U => "KeyU",
        KeyCode::V => "KeyV",
        KeyCode::W => "KeyW",
        KeyCode::X => "KeyX",
        KeyCode::Y => "KeyY",
        KeyCode::Z => "KeyZ",
        KeyCode::LeftBracket => "BracketLeft",
        KeyCode::Backslash => "Backslash",
        KeyCode::RightBracket => "BracketRight",
        KeyCode::GraveAccent => "Backquote",
        KeyCode::Escape => "Escape",
        KeyCode::Enter => "Enter",
        KeyCode::Tab => "Tab",
        KeyCode::Backspace => "Backspace",
        KeyCode::Insert => "Insert",
        KeyCode::Delete => "Delete",
        KeyCode::Right => "ArrowRight",
        KeyCode::Left => "ArrowLeft",
        KeyCode::Down => "ArrowDown",
        KeyCode::Up => "ArrowUp",
        KeyCode::PageUp => "PageUp",
        KeyCode::PageDown => "PageDown",
        KeyCode::Home => "Home",
        KeyCode::End => "End",
        KeyCode::F1 => "F1",
        KeyCode::F2 => "F2",
        KeyCode::F3 => "F3",
        KeyCode::F4 => "F4",
        KeyCode::F5 => "F5",
        KeyCode::F6 => "F6",
        KeyCode::F7 => "F7",
        KeyCode::F8 => "F8",
        KeyCode::F9 => "F9",
        KeyCode::F10 => "F10",
        KeyCode::F11 => "F11",
        KeyCode::F12 => "F12",
        KeyCode::Kp0 => "Numpad0",
        KeyCode::Kp1 => "Numpad1",
        KeyCode::Kp2 => "Numpad2",
        KeyCode::Kp3 => "Numpad3",
        KeyCode::Kp4 => "Numpad4",
        KeyCode::Kp5 => "Numpad5",
        KeyCode::Kp6 => "Numpad6",
        KeyCode::Kp7 => "Numpad7",
        KeyCode::Kp8 => "Numpad8",
        KeyCode::Kp9 => "Numpad9",
        KeyCode::KpEnter => "NumpadEnter",
        KeyCode::LeftShift => "ShiftLeft",
        KeyCode::LeftControl => "ControlLeft",
        KeyCode::LeftAlt => "AltLeft",
        KeyCode::RightShift => "ShiftRight",
        KeyCode::RightControl => "ControlRight",
        KeyCode::RightAlt => "AltRight",
        _ => return None,
    };
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_names() {
        assert_eq!(key_code_name(KeyCode::Left), Some("ArrowLeft"));
        assert_eq!(key_code_name(KeyCode::A), Some("KeyA"));
        assert_eq!(key_code_name(KeyCode::Key3), Some("Digit3"));
        assert_eq!(key_code_name(KeyCode::Space), Some("Space"));
        assert_eq!(key_code_name(KeyCode::Menu), None);
    }
}
