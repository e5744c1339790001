//! Player
//!
//! Runs a `Simulation` inside a macroquad window: the canvas and audio
//! backends, host input translated to key codes and scene clicks, and the
//! bridge to the page hosting an exported document.

mod audio;
mod canvas;
pub mod web;

pub use audio::MacroquadAudio;
pub use canvas::MacroquadCanvas;

use macroquad::prelude::*;

use crate::asset::AssetSource;
use crate::config::RuntimeConfig;
use crate::game::{Callbacks, Simulation, StartError};
use crate::input::key_code_name;
use crate::project::Project;

/// Play `project` until the window closes (or Escape on native).
pub async fn play(project: Project, source: Box<dyn AssetSource>, config: RuntimeConfig) -> Result<(), StartError> {
    let audio = MacroquadAudio::new();
    let callbacks = Callbacks::new(web::post_message).with_audio(audio.clone());
    let mut sim = Simulation::start_with_source(MacroquadCanvas::new(1, 1), &project, callbacks, config, source)?;
    log::info!("playing '{}' ({} scenes)", project.name, project.scenes.len());

    loop {
        #[cfg(not(target_arch = "wasm32"))]
        if is_key_pressed(KeyCode::Escape) {
            sim.stop();
        }

        sim.canvas_mut().begin_frame();
        feed_input(&mut sim);
        if !sim.frame(get_time() * 1000.0) {
            break;
        }
        sim.canvas_mut().end_frame();

        for failure in audio.pump().await {
            sim.report(&failure);
        }
        next_frame().await;
    }

    let mut canvas = sim.destroy();
    canvas.forget_textures();
    Ok(())
}

fn feed_input(sim: &mut Simulation<MacroquadCanvas>) {
    for key in get_keys_pressed() {
        if let Some(code) = key_code_name(key) {
            sim.key_down(code);
        }
    }
    for key in get_keys_released() {
        if let Some(code) = key_code_name(key) {
            sim.key_up(code);
        }
    }
    if is_mouse_button_pressed(MouseButton::Left) {
        let (x, y) = mouse_position();
        if let Some(point) = sim.canvas().screen_to_scene(x, y) {
            sim.click(point.x, point.y);
        }
    }
}

/// Show a fatal error until the user dismisses it
pub async fn show_error(text: &str) {
    web::post_message(text);
    loop {
        clear_background(Color::from_rgba(24, 24, 28, 255));
        draw_text_ex(
            "playframe could not start",
            24.0,
            48.0,
            TextParams { font_size: 28, color: Color::from_rgba(230, 90, 90, 255), ..Default::default() },
        );
        let mut y = 88.0;
        for line in text.lines() {
            draw_text_ex(line, 24.0, y, TextParams { font_size: 18, color: LIGHTGRAY, ..Default::default() });
            y += 24.0;
        }
        #[cfg(not(target_arch = "wasm32"))]
        if is_key_pressed(KeyCode::Escape) || is_mouse_button_pressed(MouseButton::Left) {
            return;
        }
        next_frame().await;
    }
}
