//! CSS color strings used by the project document

use macroquad::color::Color;

/// Parse a CSS color: `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`,
/// `rgb(r,g,b)`, `rgba(r,g,b,a)` or one of a few named colors.
pub fn parse_color(input: &str) -> Option<Color> {
    let s = input.trim();
    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex);
    }
    let lower = s.to_ascii_lowercase();
    if let Some(args) = lower.strip_prefix("rgba(").or_else(|| lower.strip_prefix("rgb(")) {
        return parse_rgb_fn(args.strip_suffix(')')?);
    }
    match lower.as_str() {
        "black" => Some(Color::new(0.0, 0.0, 0.0, 1.0)),
        "white" => Some(Color::new(1.0, 1.0, 1.0, 1.0)),
        "red" => Some(Color::new(1.0, 0.0, 0.0, 1.0)),
        "green" => Some(Color::new(0.0, 128.0 / 255.0, 0.0, 1.0)),
        "blue" => Some(Color::new(0.0, 0.0, 1.0, 1.0)),
        "yellow" => Some(Color::new(1.0, 1.0, 0.0, 1.0)),
        "transparent" => Some(Color::new(0.0, 0.0, 0.0, 0.0)),
        _ => None,
    }
}

/// Parse a color, falling back to `fallback` when the string is unusable
pub fn color_or(input: &str, fallback: Color) -> Color {
    parse_color(input).unwrap_or(fallback)
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    let (r, g, b, a) = match hex.len() {
        3 => (nibble(0)?, nibble(1)?, nibble(2)?, 255),
        4 => (nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?),
        6 => (byte(0)?, byte(2)?, byte(4)?, 255),
        8 => (byte(0)?, byte(2)?, byte(4)?, byte(6)?),
        _ => return None,
    };
    Some(Color::from_rgba(r, g, b, a))
}

fn parse_rgb_fn(args: &str) -> Option<Color> {
    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    let channel = |s: &str| s.parse::<f32>().ok().map(|v| v.clamp(0.0, 255.0) / 255.0);
    let alpha = match parts.get(3) {
        Some(a) => a.parse::<f32>().ok()?.clamp(0.0, 1.0),
        None => 1.0,
    };
    Some(Color::new(channel(parts[0])?, channel(parts[1])?, channel(parts[2])?, alpha))
}
