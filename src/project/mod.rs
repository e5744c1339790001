//! Project Document
//!
//! The declarative description of a game: scenes, their entities and
//! components, the asset list and input bindings. The editor owns and
//! mutates this document; the runtime only reads it and works on a clone.
//!
//! Loading goes through `Project::from_json`, which parses and then checks
//! the invariants serde cannot express (unique ids, references between
//! entities/layers/scenes, sane spritesheets).

pub mod color;
pub mod components;

use std::collections::{BTreeMap, HashMap, HashSet};
use serde::{Serialize, Deserialize};
use thiserror::Error;

pub use components::*;

fn one() -> f32 {
    1.0
}

fn yes() -> bool {
    true
}

fn black() -> String {
    "#000000".to_string()
}

/// Errors produced while loading a project document
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("invalid project JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("project has no scenes")]
    NoScenes,
    #[error("duplicate scene id '{0}'")]
    DuplicateScene(String),
    #[error("duplicate asset id '{0}'")]
    DuplicateAsset(String),
    #[error("scene '{scene}': duplicate entity id '{entity}'")]
    DuplicateEntity { scene: String, entity: String },
    #[error("startSceneId '{0}' does not name a scene")]
    UnknownStartScene(String),
    #[error("scene '{scene}', entity '{entity}': unknown layer '{layer}'")]
    UnknownLayer { scene: String, entity: String, layer: String },
    #[error("scene '{scene}', entity '{entity}': unknown parent '{parent}'")]
    UnknownParent { scene: String, entity: String, parent: String },
    #[error("scene '{scene}': bgm '{asset}' does not name an audio asset")]
    UnknownBgm { scene: String, asset: String },
    #[error("scene '{scene}', entity '{entity}': {field} '{asset}' does not name an {kind} asset")]
    UnknownAsset { scene: String, entity: String, field: &'static str, asset: String, kind: AssetKind },
    #[error("scene '{scene}', entity '{entity}': {message}")]
    InvalidComponent { scene: String, entity: String, message: String },
}

/// Upper bound for `animation.speed`
pub const MAX_ANIMATION_SPEED: f32 = 1000.0;
/// Upper bound for a clip's `fps`
pub const MAX_ANIMATION_FPS: f32 = 1000.0;

/// Kind of a project asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
    Audio,
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetKind::Image => write!(f, "image"),
            AssetKind::Audio => write!(f, "audio"),
        }
    }
}

/// An image or sound referenced by id from components and scenes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AssetKind,
    /// Data URI, path relative to the project file, or URL
    pub src: String,
}

/// Draw/update bucket. Scenes list layers back to front.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "yes")]
    pub visible: bool,
}

/// Action executed by an interactable entity, without any script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InteractAction {
    MoveBy {
        #[serde(default)]
        dx: f32,
        #[serde(default)]
        dy: f32,
    },
    #[serde(rename_all = "camelCase")]
    GotoScene { scene_id: String },
    ShowMessage { text: String },
}

/// Declarative reactions to overlap and click
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interactable {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_overlap: Vec<InteractAction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_click: Vec<InteractAction>,
}

/// An entity as authored in a scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneEntity {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub layer_id: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub components: Components,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interactable: Option<Interactable>,
}

impl SceneEntity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            layer_id: None,
            parent_id: None,
            components: Components::default(),
            interactable: None,
        }
    }
}

/// One playable scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub width: u32,
    pub height: u32,
    #[serde(default = "black")]
    pub background: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bgm: Option<String>,
    #[serde(default = "one")]
    pub bgm_volume: f32,
    #[serde(default)]
    pub entities: Vec<SceneEntity>,
    #[serde(default)]
    pub layers: Vec<Layer>,
}

impl Scene {
    pub fn new(id: impl Into<String>, width: u32, height: u32) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            width,
            height,
            background: black(),
            bgm: None,
            bgm_volume: 1.0,
            entities: Vec::new(),
            layers: Vec::new(),
        }
    }

    pub fn layer_index(&self, id: &str) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }

    pub fn entity(&self, id: &str) -> Option<&SceneEntity> {
        self.entities.iter().find(|e| e.id == id)
    }

    /// Color strings in this scene that don't parse, as human-readable notes
    pub fn color_warnings(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut check = |owner: &str, field: &str, value: &str| {
            if color::parse_color(value).is_none() {
                out.push(format!("scene '{}': {} {} '{}' is not a color", self.id, owner, field, value));
            }
        };
        check("scene", "background", &self.background);
        for entity in &self.entities {
            let owner = format!("entity '{}'", entity.id);
            if let Some(sprite) = &entity.components.sprite {
                check(&owner, "sprite.fill", &sprite.fill);
                if let Some(tint) = &sprite.tint {
                    check(&owner, "sprite.tint", tint);
                }
            }
            if let Some(text) = &entity.components.text {
                check(&owner, "text.color", &text.color);
            }
        }
        out
    }
}

/// The whole document handed to the runtime and the exporter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub scenes: Vec<Scene>,
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_scene_id: Option<String>,
    /// Action name -> physical key codes (`KeyboardEvent.code` names)
    #[serde(default)]
    pub input_bindings: BTreeMap<String, Vec<String>>,
}

impl Project {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            scenes: Vec::new(),
            assets: Vec::new(),
            start_scene_id: None,
            input_bindings: BTreeMap::new(),
        }
    }

    /// Parse and validate a project document
    pub fn from_json(json: &str) -> Result<Self, ProjectError> {
        let project: Project = serde_json::from_str(json)?;
        project.validate()?;
        Ok(project)
    }

    pub fn to_json(&self) -> Result<String, ProjectError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn scene(&self, id: &str) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.id == id)
    }

    pub fn scene_index(&self, id: &str) -> Option<usize> {
        self.scenes.iter().position(|s| s.id == id)
    }

    pub fn asset(&self, id: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.id == id)
    }

    /// The scene play starts in: `startSceneId`, else the first scene
    pub fn start_scene_index(&self) -> Option<usize> {
        match &self.start_scene_id {
            Some(id) => self.scene_index(id),
            None if self.scenes.is_empty() => None,
            None => Some(0),
        }
    }

    /// Check the invariants of the document
    pub fn validate(&self) -> Result<(), ProjectError> {
        if self.scenes.is_empty() {
            return Err(ProjectError::NoScenes);
        }

        let mut scene_ids = HashSet::new();
        for scene in &self.scenes {
            if !scene_ids.insert(scene.id.as_str()) {
                return Err(ProjectError::DuplicateScene(scene.id.clone()));
            }
        }

        let mut assets = HashMap::new();
        for asset in &self.assets {
            if assets.insert(asset.id.as_str(), asset.kind).is_some() {
                return Err(ProjectError::DuplicateAsset(asset.id.clone()));
            }
        }

        if let Some(start) = &self.start_scene_id {
            if !scene_ids.contains(start.as_str()) {
                return Err(ProjectError::UnknownStartScene(start.clone()));
            }
        }

        for scene in &self.scenes {
            validate_scene(scene, &assets)?;
        }
        Ok(())
    }
}

fn validate_scene(scene: &Scene, assets: &HashMap<&str, AssetKind>) -> Result<(), ProjectError> {
    if let Some(bgm) = &scene.bgm {
        if assets.get(bgm.as_str()) != Some(&AssetKind::Audio) {
            return Err(ProjectError::UnknownBgm { scene: scene.id.clone(), asset: bgm.clone() });
        }
    }

    let mut ids = HashSet::new();
    for entity in &scene.entities {
        if !ids.insert(entity.id.as_str()) {
            return Err(ProjectError::DuplicateEntity {
                scene: scene.id.clone(),
                entity: entity.id.clone(),
            });
        }
    }

    for entity in &scene.entities {
        let invalid = |message: String| ProjectError::InvalidComponent {
            scene: scene.id.clone(),
            entity: entity.id.clone(),
            message,
        };

        if let Some(layer) = &entity.layer_id {
            if scene.layer_index(layer).is_none() {
                return Err(ProjectError::UnknownLayer {
                    scene: scene.id.clone(),
                    entity: entity.id.clone(),
                    layer: layer.clone(),
                });
            }
        }
        if let Some(parent) = &entity.parent_id {
            if parent == &entity.id || !ids.contains(parent.as_str()) {
                return Err(ProjectError::UnknownParent {
                    scene: scene.id.clone(),
                    entity: entity.id.clone(),
                    parent: parent.clone(),
                });
            }
        }

        let components = &entity.components;
        let asset_refs = [
            ("sprite.assetId", AssetKind::Image, components.sprite.as_ref().and_then(|c| c.asset_id.as_ref())),
            ("tilemap.tilesetAssetId", AssetKind::Image, components.tilemap.as_ref().and_then(|c| c.tileset_asset_id.as_ref())),
            ("audioSource.assetId", AssetKind::Audio, components.audio_source.as_ref().map(|c| &c.asset_id)),
        ];
        for (field, kind, asset) in asset_refs {
            let Some(asset) = asset else {
                continue;
            };
            if assets.get(asset.as_str()) != Some(&kind) {
                return Err(ProjectError::UnknownAsset {
                    scene: scene.id.clone(),
                    entity: entity.id.clone(),
                    field,
                    asset: asset.clone(),
                    kind,
                });
            }
        }

        if let Some(collider) = &components.collider {
            if collider.shape == ColliderShape::Polygon && collider.points.len() < 3 {
                return Err(invalid(format!(
                    "polygon collider needs at least 3 points, has {}",
                    collider.points.len()
                )));
            }
        }

        let sheet = components.sprite.as_ref().and_then(|s| s.spritesheet.as_ref());
        if let Some(sheet) = sheet {
            if sheet.frame_width == 0 || sheet.frame_height == 0 {
                return Err(invalid("spritesheet frame size must be non-zero".into()));
            }
            for (name, clip) in &sheet.animations {
                if !(clip.fps > 0.0 && clip.fps <= MAX_ANIMATION_FPS) {
                    return Err(invalid(format!(
                        "animation '{}' needs 0 < fps <= {}, has {}",
                        name, MAX_ANIMATION_FPS, clip.fps
                    )));
                }
            }
        }

        if let Some(animation) = &components.animation {
            let clip_len = |name: &str| sheet.and_then(|s| s.animations.get(name)).map(|c| c.frames.len());
            let Some(len) = clip_len(&animation.current) else {
                return Err(invalid(format!(
                    "animation '{}' is not a clip of the entity's spritesheet",
                    animation.current
                )));
            };
            if !(animation.speed >= 0.0 && animation.speed <= MAX_ANIMATION_SPEED) {
                return Err(invalid(format!(
                    "animation speed must be within 0..={}, has {}",
                    MAX_ANIMATION_SPEED, animation.speed
                )));
            }
            check_play_head(animation.frame_index, animation.time, len).map_err(invalid)?;

            if let Some(blend) = &animation.blend {
                let Some(len) = clip_len(&blend.target) else {
                    return Err(invalid(format!(
                        "blend target '{}' is not a clip of the entity's spritesheet",
                        blend.target
                    )));
                };
                if blend.duration.is_nan() || !(blend.elapsed >= 0.0 && blend.elapsed.is_finite()) {
                    return Err(invalid("blend duration and elapsed must be numbers, elapsed >= 0".into()));
                }
                check_play_head(blend.frame_index, blend.time, len).map_err(invalid)?;
            }
        }

        if let Some(tilemap) = &components.tilemap {
            let axis = Tilemap::MAX_CELLS_PER_AXIS;
            let size = Tilemap::MAX_TILE_SIZE;
            if tilemap.cols > axis || tilemap.rows > axis {
                return Err(invalid(format!(
                    "tilemap is {}x{} cells, at most {}x{} allowed",
                    tilemap.cols, tilemap.rows, axis, axis
                )));
            }
            if tilemap.tile_width == 0 || tilemap.tile_height == 0 || tilemap.tile_width > size || tilemap.tile_height > size {
                return Err(invalid(format!(
                    "tilemap tile size {}x{} must be within 1..={}",
                    tilemap.tile_width, tilemap.tile_height, size
                )));
            }
            if tilemap.data.len() as u64 > tilemap.cell_count() {
                return Err(invalid(format!(
                    "tilemap data has {} entries for {} cells",
                    tilemap.data.len(),
                    tilemap.cell_count()
                )));
            }
        }
    }
    Ok(())
}

/// A stored play-head must sit inside its clip with a non-negative time.
fn check_play_head(frame_index: usize, time: f32, clip_len: usize) -> Result<(), String> {
    if frame_index >= clip_len.max(1) {
        return Err(format!("frameIndex {} is outside a clip of {} frames", frame_index, clip_len));
    }
    if !(time >= 0.0 && time.is_finite()) {
        return Err(format!("play-head time must be a finite number >= 0, has {}", time));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"{
        "id": "p1",
        "name": "Sample",
        "startSceneId": "level",
        "assets": [
            { "id": "hero", "name": "Hero", "type": "image", "src": "hero.png" }
        ],
        "inputBindings": { "left": ["ArrowLeft", "KeyA"] },
        "scenes": [
            {
                "id": "level",
                "name": "Level",
                "width": 320,
                "height": 240,
                "background": "#223344",
                "layers": [ { "id": "bg", "name": "Background" }, { "id": "fg", "name": "Foreground" } ],
                "entities": [
                    {
                        "id": "player",
                        "name": "Player",
                        "layerId": "fg",
                        "components": {
                            "transform": { "x": 100, "y": 100, "w": 16, "h": 16 },
                            "rigidbody": { "gravity": 500 },
                            "collider": { "type": "aabb" }
                        },
                        "interactable": { "onOverlap": [ { "type": "moveBy", "dx": 10 } ] }
                    },
                    { "id": "sword", "name": "Sword", "parentId": "player" }
                ]
            }
        ]
    }"##;

    #[test]
    fn test_parse_sample() {
        let project = Project::from_json(SAMPLE).unwrap();
        assert_eq!(project.start_scene_index(), Some(0));
        let scene = &project.scenes[0];
        assert_eq!(scene.layer_index("fg"), Some(1));
        let player = scene.entity("player").unwrap();
        assert_eq!(player.components.transform.unwrap().x, 100.0);
        let actions = &player.interactable.as_ref().unwrap().on_overlap;
        assert_eq!(actions[0], InteractAction::MoveBy { dx: 10.0, dy: 0.0 });
        assert_eq!(project.input_bindings["left"], vec!["ArrowLeft", "KeyA"]);
    }

    #[test]
    fn test_json_round_trip() {
        let project = Project::from_json(SAMPLE).unwrap();
        let json = project.to_json().unwrap();
        let again = Project::from_json(&json).unwrap();
        assert_eq!(project, again);
    }

    #[test]
    fn test_unknown_component_is_error() {
        let json = SAMPLE.replace("\"rigidbody\"", "\"physicsBody\"");
        assert!(matches!(Project::from_json(&json), Err(ProjectError::Json(_))));
    }

    #[test]
    fn test_duplicate_entity_rejected() {
        let json = SAMPLE.replace("\"id\": \"sword\"", "\"id\": \"player\"");
        assert!(matches!(
            Project::from_json(&json),
            Err(ProjectError::DuplicateEntity { .. })
        ));
    }

    #[test]
    fn test_unknown_start_scene() {
        let json = SAMPLE.replace("\"startSceneId\": \"level\"", "\"startSceneId\": \"nowhere\"");
        assert!(matches!(Project::from_json(&json), Err(ProjectError::UnknownStartScene(_))));
    }

    #[test]
    fn test_unknown_layer_and_parent() {
        let json = SAMPLE.replace("\"layerId\": \"fg\"", "\"layerId\": \"mid\"");
        assert!(matches!(Project::from_json(&json), Err(ProjectError::UnknownLayer { .. })));

        let json = SAMPLE.replace("\"parentId\": \"player\"", "\"parentId\": \"ghost\"");
        assert!(matches!(Project::from_json(&json), Err(ProjectError::UnknownParent { .. })));
    }

    #[test]
    fn test_polygon_needs_three_points() {
        let json = SAMPLE.replace(
            "\"collider\": { \"type\": \"aabb\" }",
            "\"collider\": { \"type\": \"polygon\", \"points\": [{\"x\":0,\"y\":0},{\"x\":1,\"y\":0}] }",
        );
        assert!(matches!(Project::from_json(&json), Err(ProjectError::InvalidComponent { .. })));
    }

    #[test]
    fn test_start_scene_defaults_to_first() {
        let mut project = Project::new("p", "P");
        assert_eq!(project.start_scene_index(), None);
        project.scenes.push(Scene::new("a", 10, 10));
        project.scenes.push(Scene::new("b", 10, 10));
        assert_eq!(project.start_scene_index(), Some(0));
        project.start_scene_id = Some("b".into());
        assert_eq!(project.start_scene_index(), Some(1));
    }

    #[test]
    fn test_color_warnings() {
        let mut scene = Scene::new("s", 10, 10);
        scene.background = "not-a-color".into();
        let mut e = SceneEntity::new("e", "E");
        e.components.sprite = Some(Sprite { fill: "#12".into(), ..Sprite::default() });
        scene.entities.push(e);
        assert_eq!(scene.color_warnings().len(), 2);
    }

    #[test]
    fn test_asset_references_checked() {
        let json = SAMPLE.replace("\"rigidbody\"", "\"sprite\": { \"assetId\": \"hero\" }, \"rigidbody\"");
        assert!(Project::from_json(&json).is_ok());

        let json = SAMPLE.replace("\"rigidbody\"", "\"sprite\": { \"assetId\": \"ghost\" }, \"rigidbody\"");
        assert!(matches!(
            Project::from_json(&json),
            Err(ProjectError::UnknownAsset { ref asset, kind: AssetKind::Image, .. }) if asset == "ghost"
        ));

        // An image asset cannot back a sound
        let json = SAMPLE.replace("\"rigidbody\"", "\"audioSource\": { \"assetId\": \"hero\" }, \"rigidbody\"");
        assert!(matches!(
            Project::from_json(&json),
            Err(ProjectError::UnknownAsset { kind: AssetKind::Audio, .. })
        ));

        let json = SAMPLE.replace("\"background\": \"#223344\",", "\"background\": \"#223344\", \"bgm\": \"ghost-bgm\",");
        assert!(matches!(Project::from_json(&json), Err(ProjectError::UnknownBgm { .. })));
    }

    fn animated(animation: Animation) -> Project {
        let mut sheet = Spritesheet { frame_width: 8, frame_height: 8, animations: BTreeMap::new() };
        sheet.animations.insert("idle".into(), AnimationClip { frames: vec![0, 1], fps: 10.0, looped: true });
        let mut e = SceneEntity::new("e", "E");
        e.components.sprite = Some(Sprite { spritesheet: Some(sheet), ..Sprite::default() });
        e.components.animation = Some(animation);
        let mut scene = Scene::new("s", 10, 10);
        scene.entities.push(e);
        let mut project = Project::new("p", "P");
        project.scenes.push(scene);
        project
    }

    #[test]
    fn test_animation_play_head_bounds() {
        assert!(animated(Animation::new("idle")).validate().is_ok());

        let invalid = |animation: Animation| {
            matches!(animated(animation).validate(), Err(ProjectError::InvalidComponent { .. }))
        };
        assert!(invalid(Animation { speed: 1.0e9, ..Animation::new("idle") }));
        assert!(invalid(Animation { speed: f32::NAN, ..Animation::new("idle") }));
        assert!(invalid(Animation { time: f32::INFINITY, ..Animation::new("idle") }));
        assert!(invalid(Animation { frame_index: 2, ..Animation::new("idle") }));
        assert!(invalid(Animation {
            blend: Some(Blend { target: "run".into(), duration: 1.0, elapsed: 0.0, frame_index: 0, time: 0.0 }),
            ..Animation::new("idle")
        }));

        let mut project = animated(Animation::new("idle"));
        let sprite = project.scenes[0].entities[0].components.sprite.as_mut().unwrap();
        sprite.spritesheet.as_mut().unwrap().animations.get_mut("idle").unwrap().fps = 1.0e7;
        assert!(matches!(project.validate(), Err(ProjectError::InvalidComponent { .. })));
    }

    #[test]
    fn test_tilemap_bounds() {
        let tilemap = Tilemap {
            tile_width: 16,
            tile_height: 16,
            cols: 4,
            rows: 2,
            data: vec![0; 8],
            tileset_asset_id: None,
            paint_index: 0,
        };
        let check = |tilemap: Tilemap| {
            let mut e = SceneEntity::new("map", "Map");
            e.components.tilemap = Some(tilemap);
            let mut project = Project::new("p", "P");
            project.scenes.push(Scene::new("s", 10, 10));
            project.scenes[0].entities.push(e);
            project.validate()
        };

        assert!(check(tilemap.clone()).is_ok());
        assert!(check(Tilemap { cols: 100_000, rows: 100_000, data: vec![], ..tilemap.clone() }).is_err());
        assert!(check(Tilemap { tile_width: u32::MAX, ..tilemap.clone() }).is_err());
        assert!(check(Tilemap { tile_height: 0, ..tilemap.clone() }).is_err());
        assert!(check(Tilemap { data: vec![0; 9], ..tilemap.clone() }).is_err());
        assert!(check(Tilemap { tileset_asset_id: Some("tiles".into()), ..tilemap }).is_err());
    }
}
