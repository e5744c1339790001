//! Scene Renderer
//!
//! Draws one frame of a scene from the session world:
//! clear, background, then every shown entity in update order. Each entity
//! is drawn in its own local frame (translate to center, rotate, scale) in
//! the fixed order tilemap → sprite → text.
//!
//! Assets that are not decoded yet never block a frame: sprites fall back
//! to their fill color and tilemaps to a faint grid.

use macroquad::color::Color;
use macroquad::math::Rect;

use super::animation::{blend_frame, current_frame, frame_source_rect};
use super::canvas::{Canvas2d, ImageStyle, TextStyle};
use super::entity::Entity;
use super::world::World;
use crate::asset::{AssetCache, ImageData};
use crate::config::RuntimeConfig;
use crate::project::color::color_or;
use crate::project::{Scene, Sprite, Text, TextAlign, Tilemap, Transform};

const WHITE: Color = Color::new(1.0, 1.0, 1.0, 1.0);
const BLACK: Color = Color::new(0.0, 0.0, 0.0, 1.0);

/// Render the scene into `ctx`.
///
/// Sprite opacity and blend weights apply to the sprite alone; text drawn
/// on the same entity keeps full alpha.
pub fn draw<C: Canvas2d + ?Sized>(ctx: &mut C, scene: &Scene, world: &World, assets: &AssetCache, config: &RuntimeConfig) {
    ctx.clear();
    ctx.fill_rect(
        Rect::new(0.0, 0.0, scene.width as f32, scene.height as f32),
        color_or(&scene.background, BLACK),
    );

    for &entity in world.ordered() {
        if !world.is_shown(entity) {
            continue;
        }
        let Some(transform) = world.transforms.get(entity) else {
            continue;
        };
        ctx.save();
        ctx.translate(transform.x, transform.y);
        ctx.rotate(transform.rotation.to_radians());
        ctx.scale(transform.scale);

        if let Some(tilemap) = world.tilemaps.get(entity) {
            draw_tilemap(ctx, tilemap, assets, config.placeholder_grid_alpha);
        }
        if let Some(sprite) = world.sprites.get(entity) {
            ctx.save();
            draw_sprite(ctx, world, entity, sprite, transform, assets);
            ctx.restore();
        }
        if let Some(text) = world.texts.get(entity) {
            draw_text(ctx, text, transform);
        }

        ctx.restore();
    }
}

fn local_rect(transform: &Transform) -> Rect {
    Rect::new(-transform.w / 2.0, -transform.h / 2.0, transform.w, transform.h)
}

fn draw_tilemap<C: Canvas2d + ?Sized>(ctx: &mut C, tilemap: &Tilemap, assets: &AssetCache, grid_alpha: f32) {
    let (pw, ph) = tilemap.pixel_size();
    let (tw, th) = (tilemap.tile_width as f32, tilemap.tile_height as f32);
    let (ox, oy) = (-pw / 2.0, -ph / 2.0);

    let tileset = tilemap.tileset_asset_id.as_deref().and_then(|id| assets.image(id));
    let Some(tileset) = tileset else {
        let grid = Color::new(1.0, 1.0, 1.0, grid_alpha);
        for row in 0..tilemap.rows {
            for col in 0..tilemap.cols {
                let cell = Rect::new(ox + col as f32 * tw, oy + row as f32 * th, tw, th);
                ctx.stroke_rect(cell, grid, 1.0);
            }
        }
        return;
    };

    let sheet_cols = if tilemap.tile_width == 0 { 0 } else { tileset.width / tilemap.tile_width };
    let sheet_rows = if tilemap.tile_height == 0 { 0 } else { tileset.height / tilemap.tile_height };
    if sheet_cols == 0 || sheet_rows == 0 {
        return;
    }
    for row in 0..tilemap.rows {
        for col in 0..tilemap.cols {
            let Some(tile) = tilemap.tile_at(col, row) else {
                continue;
            };
            if tile >= sheet_cols * sheet_rows {
                continue;
            }
            let src = Rect::new(
                ((tile % sheet_cols) * tilemap.tile_width) as f32,
                ((tile / sheet_cols) * tilemap.tile_height) as f32,
                tw,
                th,
            );
            let dst = Rect::new(ox + col as f32 * tw, oy + row as f32 * th, tw, th);
            ctx.draw_image(tileset, src, dst, &ImageStyle::default());
        }
    }
}

fn draw_sprite<C: Canvas2d + ?Sized>(
    ctx: &mut C,
    world: &World,
    entity: Entity,
    sprite: &Sprite,
    transform: &Transform,
    assets: &AssetCache,
) {
    let dst = local_rect(transform);
    let opacity = sprite.opacity.clamp(0.0, 1.0);
    let fill = color_or(&sprite.fill, WHITE);

    let image = sprite.asset_id.as_deref().and_then(|id| assets.image(id));
    let Some(image) = image else {
        ctx.set_alpha(opacity);
        ctx.fill_rect(dst, fill);
        return;
    };

    let style = ImageStyle {
        flip_x: sprite.flip_x,
        flip_y: sprite.flip_y,
        tint: sprite.tint.as_deref().map(|t| color_or(t, WHITE)).unwrap_or(WHITE),
    };

    let Some(sheet) = &sprite.spritesheet else {
        ctx.set_alpha(opacity);
        let src = Rect::new(0.0, 0.0, image.width as f32, image.height as f32);
        ctx.draw_image(image, src, dst, &style);
        return;
    };

    let animation = world.animations.get(entity);
    let frame = animation.and_then(|a| current_frame(a, sheet)).unwrap_or(0);
    let blend = animation.and_then(|a| blend_frame(a, sheet));
    let weight = blend.map(|(_, w)| w).unwrap_or(0.0);

    ctx.set_alpha(opacity * (1.0 - weight));
    draw_frame(ctx, image, sheet, frame, dst, &style, fill);
    if let Some((target, weight)) = blend {
        ctx.set_alpha(opacity * weight);
        draw_frame(ctx, image, sheet, target, dst, &style, fill);
    }
}

fn draw_frame<C: Canvas2d + ?Sized>(
    ctx: &mut C,
    image: &ImageData,
    sheet: &crate::project::Spritesheet,
    frame: u32,
    dst: Rect,
    style: &ImageStyle,
    fill: Color,
) {
    match frame_source_rect(sheet, frame, image.width, image.height) {
        Some(src) => ctx.draw_image(image, src, dst, style),
        None => ctx.fill_rect(dst, fill),
    }
}

fn draw_text<C: Canvas2d + ?Sized>(ctx: &mut C, text: &Text, transform: &Transform) {
    if text.text.is_empty() {
        return;
    }
    let x = match text.align {
        TextAlign::Left => -transform.w / 2.0,
        TextAlign::Center => 0.0,
        TextAlign::Right => transform.w / 2.0,
    };
    let style = TextStyle { size: text.size, color: color_or(&text.color, WHITE), align: text.align };
    ctx.fill_text(&text.text, x, 0.0, &style);
}
