//! macroquad-backed `Canvas2d`
//!
//! The scene is drawn in its own pixel space and fitted into the window
//! (uniform scale, letterboxed). Entity transforms are only ever
//! translate, rotate and uniform scale, so every draw call decomposes the
//! current affine into a center, a size factor and an angle that
//! macroquad's `*_ex` draw functions take directly.

use std::collections::HashMap;

use macroquad::math::Affine2;
use macroquad::prelude::*;

use crate::asset::ImageData;
use crate::game::{Canvas2d, ImageStyle, TextStyle};
use crate::project::TextAlign;

#[derive(Debug, Clone, Copy)]
struct State {
    transform: Affine2,
    alpha: f32,
}

pub struct MacroquadCanvas {
    width: u32,
    height: u32,
    /// Scene space to screen space
    view: Affine2,
    state: State,
    stack: Vec<State>,
    textures: HashMap<String, Texture2D>,
}

impl MacroquadCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            view: Affine2::IDENTITY,
            state: State { transform: Affine2::IDENTITY, alpha: 1.0 },
            stack: Vec::new(),
            textures: HashMap::new(),
        }
    }

    /// Fit the scene into the current window. Call once per frame before drawing.
    pub fn begin_frame(&mut self) {
        let (sw, sh) = (screen_width(), screen_height());
        let (w, h) = (self.width.max(1) as f32, self.height.max(1) as f32);
        let fit = (sw / w).min(sh / h);
        let offset = vec2((sw - w * fit) / 2.0, (sh - h * fit) / 2.0);
        self.view = Affine2::from_scale_angle_translation(vec2(fit, fit), 0.0, offset);
        self.stack.clear();
        self.state = State { transform: self.view, alpha: 1.0 };
    }

    /// Black out everything outside the scene rectangle
    pub fn end_frame(&mut self) {
        let (sw, sh) = (screen_width(), screen_height());
        let origin = self.view.transform_point2(Vec2::ZERO);
        let corner = self.view.transform_point2(vec2(self.width as f32, self.height as f32));
        draw_rectangle(0.0, 0.0, sw, origin.y, BLACK);
        draw_rectangle(0.0, corner.y, sw, sh - corner.y, BLACK);
        draw_rectangle(0.0, 0.0, origin.x, sh, BLACK);
        draw_rectangle(corner.x, 0.0, sw - corner.x, sh, BLACK);
    }

    /// Window position to scene position, None outside the scene
    pub fn screen_to_scene(&self, x: f32, y: f32) -> Option<Vec2> {
        let p = self.view.inverse().transform_point2(vec2(x, y));
        let inside = p.x >= 0.0 && p.y >= 0.0 && p.x <= self.width as f32 && p.y <= self.height as f32;
        inside.then_some(p)
    }

    /// Drop cached GPU textures (after the asset cache was released)
    pub fn forget_textures(&mut self) {
        self.textures.clear();
    }

    fn texture(&mut self, image: &ImageData) -> Texture2D {
        if let Some(texture) = self.textures.get(&image.id) {
            if texture.width() as u32 == image.width && texture.height() as u32 == image.height {
                return texture.clone();
            }
        }
        let texture = Texture2D::from_rgba8(image.width as u16, image.height as u16, &image.pixels);
        texture.set_filter(FilterMode::Nearest);
        self.textures.insert(image.id.clone(), texture.clone());
        texture
    }

    /// Screen center, scale factor and angle for a local rect
    fn place(&self, rect: Rect) -> (Vec2, f32, f32) {
        let t = self.state.transform;
        let axis = t.matrix2.x_axis;
        let center = t.transform_point2(rect.center());
        (center, axis.length(), axis.y.atan2(axis.x))
    }

    fn faded(&self, color: Color) -> Color {
        Color { a: color.a * self.state.alpha, ..color }
    }
}

impl Canvas2d for MacroquadCanvas {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        #[cfg(not(target_arch = "wasm32"))]
        request_new_screen_size(width as f32, height as f32);
    }

    fn clear(&mut self) {
        clear_background(BLACK);
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        let (center, scale, angle) = self.place(rect);
        draw_rectangle_ex(
            center.x,
            center.y,
            rect.w * scale,
            rect.h * scale,
            DrawRectangleParams { offset: vec2(0.5, 0.5), rotation: angle, color: self.faded(color) },
        );
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color, width: f32) {
        let (center, scale, angle) = self.place(rect);
        draw_rectangle_lines_ex(
            center.x,
            center.y,
            rect.w * scale,
            rect.h * scale,
            width * scale,
            DrawRectangleParams { offset: vec2(0.5, 0.5), rotation: angle, color: self.faded(color) },
        );
    }

    fn draw_image(&mut self, image: &ImageData, src: Rect, dst: Rect, style: &ImageStyle) {
        let texture = self.texture(image);
        let (center, scale, angle) = self.place(dst);
        let size = vec2(dst.w * scale, dst.h * scale);
        draw_texture_ex(
            &texture,
            center.x - size.x / 2.0,
            center.y - size.y / 2.0,
            self.faded(style.tint),
            DrawTextureParams {
                dest_size: Some(size),
                source: Some(src),
                rotation: angle,
                flip_x: style.flip_x,
                flip_y: style.flip_y,
                pivot: None,
            },
        );
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, style: &TextStyle) {
        let font_size = style.size.round().clamp(1.0, u16::MAX as f32) as u16;
        let dims = measure_text(text, None, font_size, 1.0);
        // Anchor on the alignment edge, vertically middle
        let anchor_x = match style.align {
            TextAlign::Left => x,
            TextAlign::Center => x - dims.width / 2.0,
            TextAlign::Right => x - dims.width,
        };
        let baseline = vec2(anchor_x, y + dims.offset_y / 2.0);

        let t = self.state.transform;
        let axis = t.matrix2.x_axis;
        let pos = t.transform_point2(baseline);
        draw_text_ex(
            text,
            pos.x,
            pos.y,
            TextParams {
                font: None,
                font_size,
                font_scale: axis.length(),
                rotation: axis.y.atan2(axis.x),
                color: self.faded(style.color),
                ..Default::default()
            },
        );
    }

    fn save(&mut self) {
        self.stack.push(self.state);
    }

    fn restore(&mut self) {
        if let Some(state) = self.stack.pop() {
            self.state = state;
        }
    }

    fn translate(&mut self, x: f32, y: f32) {
        self.state.transform = self.state.transform * Affine2::from_translation(vec2(x, y));
    }

    fn rotate(&mut self, radians: f32) {
        self.state.transform = self.state.transform * Affine2::from_angle(radians);
    }

    fn scale(&mut self, factor: f32) {
        self.state.transform = self.state.transform * Affine2::from_scale(vec2(factor, factor));
    }

    fn set_alpha(&mut self, alpha: f32) {
        self.state.alpha = alpha.clamp(0.0, 1.0);
    }
}
