//! 2D Canvas Seam
//!
//! The renderer draws through `Canvas2d`, a small subset of a 2D canvas
//! context: a save/restore state stack holding the current transform and
//! global alpha, plus rect, image and text primitives. The player backs it
//! with macroquad; tests use `RecordingCanvas`, which keeps the calls.

use macroquad::color::Color;
use macroquad::math::{Rect, Vec2};

use crate::asset::ImageData;
use crate::project::TextAlign;

/// How an image is drawn
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageStyle {
    pub flip_x: bool,
    pub flip_y: bool,
    /// Multiplied into every pixel
    pub tint: Color,
}

impl Default for ImageStyle {
    fn default() -> Self {
        Self { flip_x: false, flip_y: false, tint: Color::new(1.0, 1.0, 1.0, 1.0) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub size: f32,
    pub color: Color,
    pub align: TextAlign,
}

/// A 2D drawing context.
pub trait Canvas2d {
    /// False when the backend could not provide a 2D context; start() refuses such canvases
    fn has_context(&self) -> bool {
        true
    }
    fn size(&self) -> (u32, u32);
    fn resize(&mut self, width: u32, height: u32);

    /// Clear the whole surface to transparent, ignoring the current transform
    fn clear(&mut self);
    fn fill_rect(&mut self, rect: Rect, color: Color);
    fn stroke_rect(&mut self, rect: Rect, color: Color, width: f32);
    /// Draw the `src` pixel region of an image into `dst`
    fn draw_image(&mut self, image: &ImageData, src: Rect, dst: Rect, style: &ImageStyle);
    fn fill_text(&mut self, text: &str, x: f32, y: f32, style: &TextStyle);

    fn save(&mut self);
    fn restore(&mut self);
    fn translate(&mut self, x: f32, y: f32);
    /// Radians, clockwise in screen space (y down)
    fn rotate(&mut self, radians: f32);
    fn scale(&mut self, factor: f32);
    /// Multiplied into every later draw until restore
    fn set_alpha(&mut self, alpha: f32);
}

/// A recorded canvas call
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Resize(u32, u32),
    Clear,
    FillRect { rect: Rect, color: Color },
    StrokeRect { rect: Rect, color: Color, width: f32 },
    Image { image_id: String, src: Rect, dst: Rect, style: ImageStyle, alpha: f32 },
    Text { text: String, pos: Vec2, style: TextStyle, alpha: f32 },
    Save,
    Restore,
    Translate(f32, f32),
    Rotate(f32),
    Scale(f32),
    Alpha(f32),
}

/// Canvas that records every call, for tests and headless runs.
#[derive(Debug, Clone)]
pub struct RecordingCanvas {
    width: u32,
    height: u32,
    has_context: bool,
    alpha: f32,
    alpha_stack: Vec<f32>,
    pub commands: Vec<DrawCommand>,
}

impl RecordingCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            has_context: true,
            alpha: 1.0,
            alpha_stack: Vec::new(),
            commands: Vec::new(),
        }
    }

    /// A canvas that reports no 2D context
    pub fn without_context() -> Self {
        Self { has_context: false, ..Self::new(0, 0) }
    }

    /// Forget the commands recorded so far
    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Effective alpha at the current point of recording
    pub fn alpha(&self) -> f32 {
        self.alpha
    }
}

impl Canvas2d for RecordingCanvas {
    fn has_context(&self) -> bool {
        self.has_context
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.commands.push(DrawCommand::Resize(width, height));
    }

    fn clear(&mut self) {
        self.commands.push(DrawCommand::Clear);
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        let color = Color { a: color.a * self.alpha, ..color };
        self.commands.push(DrawCommand::FillRect { rect, color });
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color, width: f32) {
        let color = Color { a: color.a * self.alpha, ..color };
        self.commands.push(DrawCommand::StrokeRect { rect, color, width });
    }

    fn draw_image(&mut self, image: &ImageData, src: Rect, dst: Rect, style: &ImageStyle) {
        self.commands.push(DrawCommand::Image {
            image_id: image.id.clone(),
            src,
            dst,
            style: *style,
            alpha: self.alpha,
        });
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, style: &TextStyle) {
        self.commands.push(DrawCommand::Text {
            text: text.to_string(),
            pos: Vec2::new(x, y),
            style: *style,
            alpha: self.alpha,
        });
    }

    fn save(&mut self) {
        self.alpha_stack.push(self.alpha);
        self.commands.push(DrawCommand::Save);
    }

    fn restore(&mut self) {
        if let Some(alpha) = self.alpha_stack.pop() {
            self.alpha = alpha;
        }
        self.commands.push(DrawCommand::Restore);
    }

    fn translate(&mut self, x: f32, y: f32) {
        self.commands.push(DrawCommand::Translate(x, y));
    }

    fn rotate(&mut self, radians: f32) {
        self.commands.push(DrawCommand::Rotate(radians));
    }

    fn scale(&mut self, factor: f32) {
        self.commands.push(DrawCommand::Scale(factor));
    }

    fn set_alpha(&mut self, alpha: f32) {
        self.alpha = alpha.clamp(0.0, 1.0);
        self.commands.push(DrawCommand::Alpha(self.alpha));
    }
}
