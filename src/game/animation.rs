//! Spritesheet Animation
//!
//! Play-head advance and cross-fades for entities carrying both an
//! `Animation` and a sprite with a spritesheet.
//!
//! A play-head is (frame_index, time): `time` accumulates scaled dt and each
//! full `1/fps` step moves one position along the clip's frame list,
//! wrapping for looped clips and holding on the last frame otherwise.
//! A blend runs a second, shadow play-head on the target clip and promotes
//! it once `elapsed` reaches `duration`.

use macroquad::math::Rect;
use thiserror::Error;

use super::world::World;
use crate::project::{Animation, AnimationClip, Blend, Spritesheet};

/// Tolerance so that exact multiples of the frame step advance
const EPS: f32 = 1e-5;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnimationError {
    #[error("unknown animation '{0}'")]
    UnknownClip(String),
}

/// Move one play-head forward by `dt` seconds of clip time.
///
/// Whole steps are taken at once so a large `dt` costs the same as a small one.
fn advance(frame_index: &mut usize, time: &mut f32, clip: &AnimationClip, dt: f32) {
    if clip.frames.is_empty() || !(clip.fps > 0.0) || !clip.fps.is_finite() {
        return;
    }
    let step = 1.0 / clip.fps;
    let len = clip.frames.len();
    *frame_index = (*frame_index).min(len - 1);
    *time += dt;
    if !time.is_finite() {
        *time = 0.0;
        return;
    }
    if *time + EPS < step {
        *time = time.max(0.0);
        return;
    }

    let steps = ((*time + EPS) / step).floor();
    let rest = *time - steps * step;
    *time = if rest.is_finite() && rest < step { rest.max(0.0) } else { 0.0 };

    let steps = steps as u64;
    *frame_index = if clip.looped {
        ((*frame_index as u64 + steps % len as u64) % len as u64) as usize
    } else {
        (*frame_index as u64).saturating_add(steps).min(len as u64 - 1) as usize
    };
}

/// Advance one animation by `dt` seconds.
pub fn tick(anim: &mut Animation, sheet: &Spritesheet, dt: f32) {
    let scaled = dt * anim.speed;
    if let Some(clip) = sheet.animations.get(&anim.current) {
        advance(&mut anim.frame_index, &mut anim.time, clip, scaled);
    }

    let Some(blend) = anim.blend.as_mut() else {
        return;
    };
    if let Some(clip) = sheet.animations.get(&blend.target) {
        advance(&mut blend.frame_index, &mut blend.time, clip, scaled);
    }
    blend.elapsed += dt;
    if blend.elapsed + EPS >= blend.duration {
        promote(anim);
    }
}

fn promote(anim: &mut Animation) {
    if let Some(blend) = anim.blend.take() {
        anim.current = blend.target;
        anim.frame_index = blend.frame_index;
        anim.time = blend.time;
    }
}

/// Start a cross-fade to `target`. A non-positive or NaN duration switches at once.
pub fn blend_to(anim: &mut Animation, sheet: &Spritesheet, target: &str, duration: f32) -> Result<(), AnimationError> {
    if !sheet.animations.contains_key(target) {
        return Err(AnimationError::UnknownClip(target.to_string()));
    }
    if !(duration > 0.0) {
        anim.blend = None;
        anim.current = target.to_string();
        anim.frame_index = 0;
        anim.time = 0.0;
        return Ok(());
    }
    anim.blend = Some(Blend {
        target: target.to_string(),
        duration,
        elapsed: 0.0,
        frame_index: 0,
        time: 0.0,
    });
    Ok(())
}

fn frame_of(sheet: &Spritesheet, clip: &str, index: usize) -> Option<u32> {
    let frames = &sheet.animations.get(clip)?.frames;
    frames.get(index.min(frames.len().checked_sub(1)?)).copied()
}

/// Spritesheet frame number shown for the current clip
pub fn current_frame(anim: &Animation, sheet: &Spritesheet) -> Option<u32> {
    frame_of(sheet, &anim.current, anim.frame_index)
}

/// Target frame and cross-fade weight in [0, 1] while a blend is active
pub fn blend_frame(anim: &Animation, sheet: &Spritesheet) -> Option<(u32, f32)> {
    let blend = anim.blend.as_ref()?;
    let frame = frame_of(sheet, &blend.target, blend.frame_index)?;
    let weight = if blend.duration > 0.0 {
        (blend.elapsed / blend.duration).clamp(0.0, 1.0)
    } else {
        1.0
    };
    Some((frame, weight))
}

/// Pixel rectangle of a frame inside an image, row-major over
/// `floor(image_width / frame_width)` columns. None when out of range.
pub fn frame_source_rect(sheet: &Spritesheet, frame: u32, image_width: u32, image_height: u32) -> Option<Rect> {
    let (cols, rows) = sheet.grid(image_width, image_height)?;
    if frame >= cols * rows {
        return None;
    }
    let col = frame % cols;
    let row = frame / cols;
    Some(Rect::new(
        (col * sheet.frame_width) as f32,
        (row * sheet.frame_height) as f32,
        sheet.frame_width as f32,
        sheet.frame_height as f32,
    ))
}

/// Advance every animated sprite in the world.
pub fn update(world: &mut World, dt: f32) {
    let World { animations, sprites, .. } = world;
    for (entity, anim) in animations.iter_mut() {
        let sheet = sprites.get(entity).and_then(|s| s.spritesheet.as_ref());
        if let Some(sheet) = sheet {
            tick(anim, sheet, dt);
        }
    }
}
