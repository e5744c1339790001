//! Entity Components
//!
//! The closed set of component kinds an entity can carry. Each kind is a
//! plain serde struct; `Components` holds at most one of each and rejects
//! any key outside the set when a project is parsed.
//!
//! Components are plain data - behavior lives in the `game` systems.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

fn one() -> f32 {
    1.0
}

fn yes() -> bool {
    true
}

fn white() -> String {
    "#ffffff".to_string()
}

/// Every component kind an entity may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentKind {
    Transform,
    Sprite,
    Text,
    Collider,
    Rigidbody,
    Script,
    AudioSource,
    Ui,
    Animation,
    Tilemap,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 10] = [
        ComponentKind::Transform,
        ComponentKind::Sprite,
        ComponentKind::Text,
        ComponentKind::Collider,
        ComponentKind::Rigidbody,
        ComponentKind::Script,
        ComponentKind::AudioSource,
        ComponentKind::Ui,
        ComponentKind::Animation,
        ComponentKind::Tilemap,
    ];

    /// The JSON key used for this kind in an entity's component map
    pub fn key(self) -> &'static str {
        match self {
            ComponentKind::Transform => "transform",
            ComponentKind::Sprite => "sprite",
            ComponentKind::Text => "text",
            ComponentKind::Collider => "collider",
            ComponentKind::Rigidbody => "rigidbody",
            ComponentKind::Script => "script",
            ComponentKind::AudioSource => "audioSource",
            ComponentKind::Ui => "ui",
            ComponentKind::Animation => "animation",
            ComponentKind::Tilemap => "tilemap",
        }
    }
}

/// The component set of one entity.
///
/// Typed fields rather than a string-keyed map: every subsystem tests for
/// the presence of the field it drives, and unknown keys fail to parse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Components {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sprite: Option<Sprite>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<Text>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collider: Option<Collider>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rigidbody: Option<Rigidbody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<Script>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_source: Option<AudioSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui: Option<Ui>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation: Option<Animation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tilemap: Option<Tilemap>,
}

impl Components {
    /// Check whether a component of the given kind is present
    pub fn has(&self, kind: ComponentKind) -> bool {
        match kind {
            ComponentKind::Transform => self.transform.is_some(),
            ComponentKind::Sprite => self.sprite.is_some(),
            ComponentKind::Text => self.text.is_some(),
            ComponentKind::Collider => self.collider.is_some(),
            ComponentKind::Rigidbody => self.rigidbody.is_some(),
            ComponentKind::Script => self.script.is_some(),
            ComponentKind::AudioSource => self.audio_source.is_some(),
            ComponentKind::Ui => self.ui.is_some(),
            ComponentKind::Animation => self.animation.is_some(),
            ComponentKind::Tilemap => self.tilemap.is_some(),
        }
    }

    /// Kinds present on this entity, in canonical order
    pub fn kinds(&self) -> Vec<ComponentKind> {
        ComponentKind::ALL.into_iter().filter(|k| self.has(*k)).collect()
    }
}

// =============================================================================
// Spatial
// =============================================================================

/// Position, size, rotation and scale. Origin is the entity center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transform {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub w: f32,
    #[serde(default)]
    pub h: f32,
    /// Degrees, visual and polygon-collider only
    #[serde(default)]
    pub rotation: f32,
    #[serde(default = "one")]
    pub scale: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0, w: 0.0, h: 0.0, rotation: 0.0, scale: 1.0 }
    }
}

// =============================================================================
// Visuals
// =============================================================================

/// Solid or image-backed rectangle, optionally sliced into a spritesheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sprite {
    #[serde(default = "white")]
    pub fill: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tint: Option<String>,
    #[serde(default = "one")]
    pub opacity: f32,
    #[serde(default)]
    pub flip_x: bool,
    #[serde(default)]
    pub flip_y: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spritesheet: Option<Spritesheet>,
}

impl Default for Sprite {
    fn default() -> Self {
        Self {
            fill: white(),
            asset_id: None,
            tint: None,
            opacity: 1.0,
            flip_x: false,
            flip_y: false,
            spritesheet: None,
        }
    }
}

/// Grid slicing of a sprite image plus named clips
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spritesheet {
    pub frame_width: u32,
    pub frame_height: u32,
    #[serde(default)]
    pub animations: BTreeMap<String, AnimationClip>,
}

impl Spritesheet {
    /// Columns and rows of the frame grid for an image of the given size.
    ///
    /// Returns None when the image is smaller than one frame.
    pub fn grid(&self, image_width: u32, image_height: u32) -> Option<(u32, u32)> {
        if self.frame_width == 0 || self.frame_height == 0 {
            return None;
        }
        let cols = image_width / self.frame_width;
        let rows = image_height / self.frame_height;
        if cols == 0 || rows == 0 {
            None
        } else {
            Some((cols, rows))
        }
    }

    /// Frame numbers referenced by any clip that fall outside the image grid.
    pub fn invalid_frames(&self, image_width: u32, image_height: u32) -> Vec<(String, u32)> {
        let capacity = self
            .grid(image_width, image_height)
            .map(|(cols, rows)| cols * rows)
            .unwrap_or(0);
        let mut out = Vec::new();
        for (name, clip) in &self.animations {
            for &frame in &clip.frames {
                if frame >= capacity {
                    out.push((name.clone(), frame));
                }
            }
        }
        out
    }
}

/// A named sequence of spritesheet frames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationClip {
    pub frames: Vec<u32>,
    pub fps: f32,
    #[serde(rename = "loop", default = "yes")]
    pub looped: bool,
}

/// Horizontal anchoring of a text component
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
}

/// A single line of text drawn centered on the entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Text {
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_text_size")]
    pub size: f32,
    #[serde(default = "white")]
    pub color: String,
    #[serde(default)]
    pub align: TextAlign,
}

fn default_text_size() -> f32 {
    16.0
}

impl Default for Text {
    fn default() -> Self {
        Self { text: String::new(), size: default_text_size(), color: white(), align: TextAlign::Center }
    }
}

/// Visibility switch for HUD-style entities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ui {
    #[serde(default = "yes")]
    pub visible: bool,
}

impl Default for Ui {
    fn default() -> Self {
        Self { visible: true }
    }
}

/// Grid of tile indices drawn from a tileset image (-1 = empty)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tilemap {
    pub tile_width: u32,
    pub tile_height: u32,
    pub cols: u32,
    pub rows: u32,
    #[serde(default)]
    pub data: Vec<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tileset_asset_id: Option<String>,
    #[serde(default)]
    pub paint_index: i32,
}

impl Tilemap {
    /// Largest accepted `cols` or `rows`
    pub const MAX_CELLS_PER_AXIS: u32 = 1024;
    /// Largest accepted `tileWidth` or `tileHeight`
    pub const MAX_TILE_SIZE: u32 = 4096;

    /// Number of cells in the grid
    pub fn cell_count(&self) -> u64 {
        self.cols as u64 * self.rows as u64
    }

    /// Tile index at a cell, None for empty or out-of-range cells
    pub fn tile_at(&self, col: u32, row: u32) -> Option<u32> {
        if col >= self.cols || row >= self.rows {
            return None;
        }
        let idx = usize::try_from(row as u64 * self.cols as u64 + col as u64).ok()?;
        match self.data.get(idx) {
            Some(&tile) if tile >= 0 => Some(tile as u32),
            _ => None,
        }
    }

    pub fn pixel_size(&self) -> (f32, f32) {
        (
            self.cols as f32 * self.tile_width as f32,
            self.rows as f32 * self.tile_height as f32,
        )
    }
}

// =============================================================================
// Physics
// =============================================================================

/// Collision shape kinds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColliderShape {
    #[default]
    Aabb,
    Circle,
    Polygon,
}

/// A point in an entity's local, pre-rotation frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// Overlap volume. Dimensions fall back to the transform when unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collider {
    #[serde(rename = "type", default)]
    pub shape: ColliderShape,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub points: Vec<Point>,
    #[serde(default)]
    pub is_trigger: bool,
    /// Informational bucket, not used for filtering
    #[serde(default)]
    pub layer: i32,
}

/// Linear motion state. No angular velocity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rigidbody {
    #[serde(default)]
    pub vx: f32,
    #[serde(default)]
    pub vy: f32,
    #[serde(default)]
    pub ax: f32,
    #[serde(default)]
    pub ay: f32,
    #[serde(default)]
    pub gravity: f32,
    #[serde(default)]
    pub friction: f32,
    #[serde(default)]
    pub bounce: f32,
    #[serde(default = "one")]
    pub mass: f32,
}

impl Default for Rigidbody {
    fn default() -> Self {
        Self { vx: 0.0, vy: 0.0, ax: 0.0, ay: 0.0, gravity: 0.0, friction: 0.0, bounce: 0.0, mass: 1.0 }
    }
}

// =============================================================================
// Behavior
// =============================================================================

/// Script source defining onUpdate / onClick / onCollision
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub code: String,
}

/// Sound attached to an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioSource {
    pub asset_id: String,
    #[serde(default = "one")]
    pub volume: f32,
    #[serde(rename = "loop", default)]
    pub looped: bool,
    #[serde(default)]
    pub autoplay: bool,
}

/// Spritesheet playback state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Animation {
    pub current: String,
    #[serde(default = "one")]
    pub speed: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blend: Option<Blend>,
    /// Position within the current clip's frame list
    #[serde(default)]
    pub frame_index: usize,
    /// Seconds accumulated toward the next frame
    #[serde(default)]
    pub time: f32,
}

impl Animation {
    pub fn new(current: impl Into<String>) -> Self {
        Self { current: current.into(), speed: 1.0, blend: None, frame_index: 0, time: 0.0 }
    }
}

/// Cross-fade toward `target` with its own shadow play-head
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blend {
    pub target: String,
    pub duration: f32,
    #[serde(default)]
    pub elapsed: f32,
    #[serde(default)]
    pub frame_index: usize,
    #[serde(default)]
    pub time: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_component_key_rejected() {
        let json = r#"{ "transform": { "x": 1 }, "physics": {} }"#;
        let result: Result<Components, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_defaults_applied() {
        let json = r#"{ "transform": { "x": 4 }, "rigidbody": {}, "sprite": {} }"#;
        let c: Components = serde_json::from_str(json).unwrap();
        let t = c.transform.unwrap();
        assert_eq!(t.x, 4.0);
        assert_eq!(t.scale, 1.0);
        assert_eq!(c.rigidbody.unwrap().mass, 1.0);
        assert_eq!(c.sprite.as_ref().unwrap().fill, "#ffffff");
        assert_eq!(c.kinds(), vec![ComponentKind::Transform, ComponentKind::Sprite, ComponentKind::Rigidbody]);
    }

    #[test]
    fn test_spritesheet_grid() {
        let mut sheet = Spritesheet { frame_width: 16, frame_height: 16, animations: BTreeMap::new() };
        sheet.animations.insert("run".into(), AnimationClip { frames: vec![0, 1, 7, 8], fps: 8.0, looped: true });
        assert_eq!(sheet.grid(64, 32), Some((4, 2)));
        assert_eq!(sheet.grid(8, 8), None);
        assert_eq!(sheet.invalid_frames(64, 32), vec![("run".to_string(), 8)]);
    }

    #[test]
    fn test_tilemap_lookup() {
        let map = Tilemap {
            tile_width: 8,
            tile_height: 8,
            cols: 2,
            rows: 2,
            data: vec![0, -1, 3],
            tileset_asset_id: None,
            paint_index: 0,
        };
        assert_eq!(map.tile_at(0, 0), Some(0));
        assert_eq!(map.tile_at(1, 0), None);
        assert_eq!(map.tile_at(0, 1), Some(3));
        // Short data array reads as empty
        assert_eq!(map.tile_at(1, 1), None);
        assert_eq!(map.tile_at(5, 0), None);
    }

    #[test]
    fn test_tilemap_sizes_do_not_overflow() {
        let map = Tilemap {
            tile_width: u32::MAX,
            tile_height: 2,
            cols: u32::MAX,
            rows: 3,
            data: Vec::new(),
            tileset_asset_id: None,
            paint_index: 0,
        };
        let (w, h) = map.pixel_size();
        assert!(w > 1.0e18);
        assert_eq!(h, 6.0);
        assert_eq!(map.tile_at(u32::MAX - 1, 2), None);
        assert_eq!(map.cell_count(), u32::MAX as u64 * 3);
    }
}
