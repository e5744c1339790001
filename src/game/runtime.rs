//! Simulation Runtime
//!
//! Plays a project on a `Canvas2d`. The runtime owns a private clone of the
//! project and builds a `World` from the active scene; the caller's
//! document is never touched.
//!
//! The host drives it one frame at a time:
//!
//! ```text
//! start() ──▶ frame(ts) ──▶ frame(ts) ──▶ ... ──▶ stop()
//!               │
//!               └─ assets.poll → physics → collision → scripts
//!                  → scene switch → animation → render
//! ```
//!
//! Every recoverable failure (script errors, asset errors, bad scene
//! transitions) is logged and reported through `on_message`; none of them
//! interrupts the loop.

use std::collections::HashSet;

use thiserror::Error;

use super::animation;
use super::canvas::Canvas2d;
use super::collision;
use super::command::Command;
use super::entity::Entity;
use super::event::{ClickEvent, Events};
use super::physics;
use super::renderer;
use super::script::{self, HandlerKind, Invocation, ScriptSandbox};
use super::transform::Transform2d;
use super::world::World;
use crate::asset::{AssetCache, AssetEvent, AssetSource, AssetStatus, AudioClip, DataUriSource};
use crate::config::RuntimeConfig;
use crate::input::InputState;
use crate::project::{Project, ProjectError, Scene};

/// Fatal problems that keep a simulation from starting
#[derive(Debug, Error)]
pub enum StartError {
    #[error("canvas has no 2D rendering context")]
    NoContext,
    #[error("project has no scenes")]
    NoScenes,
    #[error(transparent)]
    InvalidProject(#[from] ProjectError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SceneTransitionError {
    #[error("cannot go to scene '{0}': no such scene")]
    UnknownScene(String),
}

/// Sound output used by the runtime
pub trait AudioSink {
    fn play(&mut self, clip: &AudioClip, volume: f32, looped: bool);
    fn stop_all(&mut self);
}

/// Host hooks passed to `Simulation::start`
pub struct Callbacks {
    on_message: Box<dyn FnMut(&str)>,
    audio: Option<Box<dyn AudioSink>>,
}

impl Callbacks {
    pub fn new(on_message: impl FnMut(&str) + 'static) -> Self {
        Self { on_message: Box::new(on_message), audio: None }
    }

    pub fn with_audio(mut self, sink: impl AudioSink + 'static) -> Self {
        self.audio = Some(Box::new(sink));
        self
    }
}

impl Default for Callbacks {
    fn default() -> Self {
        Self::new(|_| {})
    }
}

/// Scene audio that waits for its asset to decode
#[derive(Debug, Clone)]
struct PendingAudio {
    asset_id: String,
    volume: f32,
    looped: bool,
}

/// A running (or stopped) play session.
pub struct Simulation<C: Canvas2d> {
    canvas: C,
    project: Project,
    config: RuntimeConfig,
    callbacks: Callbacks,
    assets: AssetCache,
    scripts: ScriptSandbox,
    input: InputState,
    events: Events,
    world: World,
    scene_index: usize,
    pending_scene: Option<usize>,
    pending_audio: Vec<PendingAudio>,
    running: bool,
    frame_requested: bool,
    last_timestamp: Option<f64>,
}

impl<C: Canvas2d> Simulation<C> {
    /// Start playing with assets read from inline data URIs only.
    pub fn start(canvas: C, project: &Project, callbacks: Callbacks, config: RuntimeConfig) -> Result<Self, StartError> {
        Self::start_with_source(canvas, project, callbacks, config, Box::new(DataUriSource))
    }

    pub fn start_with_source(
        canvas: C,
        project: &Project,
        callbacks: Callbacks,
        config: RuntimeConfig,
        source: Box<dyn AssetSource>,
    ) -> Result<Self, StartError> {
        if !canvas.has_context() {
            return Err(StartError::NoContext);
        }
        if project.scenes.is_empty() {
            return Err(StartError::NoScenes);
        }
        project.validate()?;
        let scene_index = project.start_scene_index().ok_or(StartError::NoScenes)?;

        let mut sim = Self {
            canvas,
            project: project.clone(),
            scripts: ScriptSandbox::new(&config),
            input: InputState::new(project.input_bindings.clone()),
            config,
            callbacks,
            assets: AssetCache::new(source),
            events: Events::new(),
            world: World::new(),
            scene_index,
            pending_scene: None,
            pending_audio: Vec::new(),
            running: true,
            frame_requested: true,
            last_timestamp: None,
        };
        sim.assets.preload(&sim.project.assets);
        log::debug!("starting '{}' at scene '{}'", sim.project.name, sim.project.scenes[scene_index].id);
        sim.load_scene(scene_index);
        Ok(sim)
    }

    // =========================================================================
    // Host interface
    // =========================================================================

    /// Run one frame if one was requested. Returns whether another frame is
    /// wanted. `timestamp_ms` is the host's monotonic frame time.
    pub fn frame(&mut self, timestamp_ms: f64) -> bool {
        if !self.running || !self.frame_requested {
            return false;
        }
        let dt = match self.last_timestamp {
            Some(prev) => (((timestamp_ms - prev) / 1000.0) as f32).clamp(0.0, self.config.max_dt),
            None => 0.0,
        };
        self.last_timestamp = Some(timestamp_ms);
        self.step(dt);
        self.frame_requested = self.running;
        self.frame_requested
    }

    /// Run the fixed pipeline once with an explicit `dt` (no clamping).
    pub fn step(&mut self, dt: f32) {
        if !self.running {
            return;
        }
        self.poll_assets();
        physics::integrate(&mut self.world, dt);
        self.run_collisions();
        self.run_scripts(dt);
        if let Some(index) = self.pending_scene.take() {
            self.load_scene(index);
        }
        animation::update(&mut self.world, dt);
        renderer::draw(
            &mut self.canvas,
            &self.project.scenes[self.scene_index],
            &self.world,
            &self.assets,
            &self.config,
        );
    }

    pub fn key_down(&mut self, code: &str) {
        self.input.key_down(code);
    }

    pub fn key_up(&mut self, code: &str) {
        self.input.key_up(code);
    }

    /// Queue a click in scene coordinates for the next frame
    pub fn click(&mut self, x: f32, y: f32) {
        if self.running {
            self.events.click.send(ClickEvent { x, y });
        }
    }

    /// Cancel the pending frame and release assets and audio. Idempotent.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        log::debug!("stopping '{}'", self.project.name);
        self.running = false;
        self.frame_requested = false;
        self.pending_scene = None;
        self.pending_audio.clear();
        self.events.clear_all();
        self.input.release_all();
        self.scripts.unload();
        self.assets.release();
        if let Some(audio) = self.callbacks.audio.as_mut() {
            audio.stop_all();
        }
        self.world = World::new();
    }

    /// Stop and hand the canvas back.
    pub fn destroy(mut self) -> C {
        self.stop();
        self.canvas
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn active_scene(&self) -> &Scene {
        &self.project.scenes[self.scene_index]
    }

    pub fn active_scene_id(&self) -> &str {
        &self.active_scene().id
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut C {
        &mut self.canvas
    }

    pub fn assets(&self) -> &AssetCache {
        &self.assets
    }

    /// Deliver a message raised outside the frame (e.g. by an audio backend)
    /// through `onMessage`.
    pub fn report(&mut self, text: &str) {
        self.message(text);
    }

    // =========================================================================
    // Pipeline stages
    // =========================================================================

    fn message(&mut self, text: &str) {
        log::info!("{}", text);
        (self.callbacks.on_message)(text);
    }

    fn poll_assets(&mut self) {
        for event in self.assets.poll(self.config.asset_decode_budget) {
            match event {
                AssetEvent::Loaded(id) => self.check_spritesheets(Some(&id)),
                AssetEvent::Failed { id, error } => {
                    self.message(&format!("asset '{}' failed to load: {}", id, error));
                }
            }
        }

        let pending = std::mem::take(&mut self.pending_audio);
        for audio in pending {
            match self.assets.status(&audio.asset_id) {
                AssetStatus::Ready => {
                    self.play_audio(&audio.asset_id, audio.volume, audio.looped);
                }
                AssetStatus::Pending => self.pending_audio.push(audio),
                AssetStatus::Failed => log::debug!("audio '{}' failed earlier, not played", audio.asset_id),
                AssetStatus::Unknown => self.message(&format!("audio '{}' is not a project asset", audio.asset_id)),
            }
        }
    }

    /// Report clip frames that fall outside their decoded sheet image.
    /// With `only` set, just the sprites using that image are checked.
    fn check_spritesheets(&mut self, only: Option<&str>) {
        let mut problems = Vec::new();
        for (entity, sprite) in self.world.sprites.iter() {
            let (Some(asset_id), Some(sheet)) = (sprite.asset_id.as_deref(), sprite.spritesheet.as_ref()) else {
                continue;
            };
            if only.is_some_and(|id| id != asset_id) {
                continue;
            }
            let Some(image) = self.assets.image(asset_id) else {
                continue;
            };
            for (clip, frame) in sheet.invalid_frames(image.width, image.height) {
                problems.push(format!(
                    "entity '{}': animation '{}' frame {} is outside the {}x{} image '{}'",
                    self.world.id(entity),
                    clip,
                    frame,
                    image.width,
                    image.height,
                    asset_id
                ));
            }
        }
        for problem in problems {
            self.message(&problem);
        }
    }

    fn run_collisions(&mut self) {
        for event in collision::detect_overlaps(&self.world) {
            for entity in [event.entity_a, event.entity_b] {
                let actions = self.interactable_actions(entity, false);
                self.apply(entity, actions);
            }
            self.events.collision.send(event);
        }
    }

    fn interactable_actions(&self, entity: Entity, click: bool) -> Vec<Command> {
        match self.world.interactables.get(entity) {
            Some(i) => {
                let list = if click { &i.on_click } else { &i.on_overlap };
                list.iter().map(Command::from).collect()
            }
            None => Vec::new(),
        }
    }

    fn run_scripts(&mut self, dt: f32) {
        self.scripts.set_input(&self.input);

        let order: Vec<Entity> = self.world.ordered().to_vec();
        for &entity in &order {
            if !self.scripts.has_handler(&self.world, entity, HandlerKind::Update) {
                continue;
            }
            let payload = script::update_payload(dt, self.world.id(entity));
            let result = self.scripts.invoke(&self.world, entity, HandlerKind::Update, payload);
            self.finish(entity, result);
        }

        for click in self.events.click.take() {
            let Some(target) = self.click_target(click.x, click.y) else {
                continue;
            };
            let actions = self.interactable_actions(target, true);
            self.apply(target, actions);
            let payload = script::click_payload(click.x, click.y, self.world.id(target));
            let result = self.scripts.invoke(&self.world, target, HandlerKind::Click, payload);
            self.finish(target, result);
        }

        for event in self.events.collision.take() {
            for (entity, other) in [(event.entity_a, event.entity_b), (event.entity_b, event.entity_a)] {
                if !self.scripts.has_handler(&self.world, entity, HandlerKind::Collision) {
                    continue;
                }
                let snapshot = self.world.snapshot(other);
                let payload = script::collision_payload(&snapshot, self.world.id(entity));
                let result = self.scripts.invoke(&self.world, entity, HandlerKind::Collision, payload);
                self.finish(entity, result);
            }
        }
    }

    /// Topmost shown entity under the point that reacts to clicks
    fn click_target(&self, x: f32, y: f32) -> Option<Entity> {
        let point = macroquad::math::Vec2::new(x, y);
        self.world.ordered().iter().rev().copied().find(|&entity| {
            let reacts = self.world.interactables.get(entity).is_some_and(|i| !i.on_click.is_empty())
                || self.scripts.has_handler(&self.world, entity, HandlerKind::Click);
            reacts
                && self.world.is_shown(entity)
                && self.world.transforms.get(entity).is_some_and(|t| t.contains(point))
        })
    }

    fn finish(&mut self, entity: Entity, result: Invocation) {
        self.apply(entity, result.commands);
        if let Some(error) = result.error {
            log::warn!("{}", error);
            self.message(&error.to_string());
        }
    }

    fn apply(&mut self, entity: Entity, commands: Vec<Command>) {
        for command in commands {
            match command {
                Command::MoveBy { dx, dy } => self.world.move_by(entity, dx, dy),
                Command::PlayAudio { asset_id, volume } => {
                    if !self.play_audio(&asset_id, volume, false) {
                        log::debug!("audio '{}' not ready, skipped", asset_id);
                    }
                }
                Command::BlendTo { animation, duration } => self.blend(entity, &animation, duration),
                Command::GotoScene(scene_id) => match self.project.scene_index(&scene_id) {
                    Some(index) => self.pending_scene = Some(index),
                    None => {
                        let error = SceneTransitionError::UnknownScene(scene_id);
                        log::warn!("{}", error);
                        self.message(&error.to_string());
                    }
                },
                Command::Message(text) => self.message(&text),
            }
        }
    }

    fn blend(&mut self, entity: Entity, target: &str, duration: f32) {
        let sheet = self.world.sprites.get(entity).and_then(|s| s.spritesheet.as_ref());
        let outcome = match (self.world.animations.get_mut(entity), sheet) {
            (Some(anim), Some(sheet)) => animation::blend_to(anim, sheet, target, duration).map_err(|e| e.to_string()),
            _ => Err("no animated spritesheet".to_string()),
        };
        if let Err(reason) = outcome {
            let text = format!("entity '{}' blendTo('{}'): {}", self.world.id(entity), target, reason);
            self.message(&text);
        }
    }

    /// Returns false when there is no sink or the clip is not decoded
    fn play_audio(&mut self, asset_id: &str, volume: f32, looped: bool) -> bool {
        match (self.callbacks.audio.as_mut(), self.assets.audio(asset_id)) {
            (Some(sink), Some(clip)) => {
                sink.play(clip, volume, looped);
                true
            }
            _ => false,
        }
    }

    // =========================================================================
    // Scene loading
    // =========================================================================

    fn load_scene(&mut self, index: usize) {
        if let Some(audio) = self.callbacks.audio.as_mut() {
            audio.stop_all();
        }
        self.pending_audio.clear();
        self.events.clear_all();
        self.scripts.unload();

        self.scene_index = index;
        let scene = &self.project.scenes[index];
        log::debug!("loading scene '{}'", scene.id);
        self.world = World::from_scene(scene);
        self.canvas.resize(scene.width, scene.height);

        let mut notes = scene.color_warnings();
        let (errors, warnings) = self.scripts.load_scene(&scene.id, &self.world);
        notes.extend(warnings);
        for error in &errors {
            log::warn!("{}", error);
        }
        notes.extend(errors.iter().map(|e| e.to_string()));

        let mut audio = Vec::new();
        if let Some(bgm) = &scene.bgm {
            audio.push(PendingAudio { asset_id: bgm.clone(), volume: scene.bgm_volume, looped: true });
        }
        for (_, source) in self.world.audio_sources.iter() {
            if source.autoplay {
                audio.push(PendingAudio {
                    asset_id: source.asset_id.clone(),
                    volume: source.volume,
                    looped: source.looped,
                });
            }
        }
        self.pending_audio = audio;

        let mut seen = HashSet::new();
        notes.retain(|n| seen.insert(n.clone()));
        for note in notes {
            self.message(&note);
        }
        self.check_spritesheets(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{image_asset, to_data_uri};
    use crate::game::canvas::{DrawCommand, RecordingCanvas};
    use crate::project::{
        Asset, AssetKind, AnimationClip, AudioSource, Collider, InteractAction, Interactable, Rigidbody, SceneEntity,
        Script, Sprite, Spritesheet, Transform,
    };
    use std::collections::BTreeMap;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn boxed(id: &str, x: f32, y: f32) -> SceneEntity {
        let mut e = SceneEntity::new(id, id);
        e.components.transform = Some(Transform { x, y, w: 20.0, h: 20.0, ..Transform::default() });
        e
    }

    fn project_with(entities: Vec<SceneEntity>) -> Project {
        let mut project = Project::new("p", "Test");
        let mut scene = Scene::new("scene-1", 320, 240);
        scene.entities = entities;
        project.scenes.push(scene);
        project.scenes.push(Scene::new("scene-2", 640, 480));
        project
    }

    fn recorder() -> (Callbacks, Rc<RefCell<Vec<String>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        (Callbacks::new(move |m| sink.borrow_mut().push(m.to_string())), log)
    }

    fn start(project: &Project) -> (Simulation<RecordingCanvas>, Rc<RefCell<Vec<String>>>) {
        let (callbacks, log) = recorder();
        let sim = Simulation::start(RecordingCanvas::new(1, 1), project, callbacks, RuntimeConfig::default()).unwrap();
        (sim, log)
    }

    fn x_of(sim: &Simulation<RecordingCanvas>, id: &str) -> f32 {
        let e = sim.world().find(id).unwrap();
        sim.world().transforms.get(e).unwrap().x
    }

    #[test]
    fn test_start_errors() {
        let project = project_with(vec![]);
        let result = Simulation::start(RecordingCanvas::without_context(), &project, Callbacks::default(), RuntimeConfig::default());
        assert!(matches!(result, Err(StartError::NoContext)));

        let empty = Project::new("p", "Empty");
        let result = Simulation::start(RecordingCanvas::new(1, 1), &empty, Callbacks::default(), RuntimeConfig::default());
        assert!(matches!(result, Err(StartError::NoScenes)));

        let mut bad = project_with(vec![]);
        bad.start_scene_id = Some("nope".into());
        let result = Simulation::start(RecordingCanvas::new(1, 1), &bad, Callbacks::default(), RuntimeConfig::default());
        assert!(matches!(result, Err(StartError::InvalidProject(_))));
    }

    #[test]
    fn test_start_sizes_canvas_to_start_scene() {
        let mut project = project_with(vec![]);
        project.start_scene_id = Some("scene-2".into());
        let (sim, _) = start(&project);
        assert_eq!(sim.active_scene_id(), "scene-2");
        assert_eq!(sim.canvas().size(), (640, 480));
    }

    #[test]
    fn test_gravity_scenario() {
        let mut player = boxed("player", 100.0, 100.0);
        player.name = "Player".into();
        player.components.rigidbody = Some(Rigidbody { gravity: 500.0, ..Rigidbody::default() });
        let (mut sim, _) = start(&project_with(vec![player]));

        let dt = 1.0f32 / 60.0;
        let (mut vy, mut y) = (0.0f32, 100.0f32);
        for _ in 0..60 {
            sim.step(dt);
            vy += 500.0 * dt;
            y += vy * dt;
        }
        let e = sim.world().find("player").unwrap();
        let body = sim.world().rigidbodies.get(e).unwrap();
        let t = sim.world().transforms.get(e).unwrap();
        assert!((body.vy - 500.0).abs() < 0.01);
        assert!((t.y - y).abs() < 1e-3);
        // Semi-implicit Euler: 100 + 500 * dt^2 * (1 + 2 + ... + 60)
        assert!((t.y - (100.0 + 500.0 * dt * dt * 1830.0)).abs() < 0.01);
    }

    #[test]
    fn test_overlap_move_by_scenario() {
        let mut a = boxed("a", 50.0, 50.0);
        a.components.collider = Some(Collider::default());
        a.interactable = Some(Interactable {
            on_overlap: vec![InteractAction::MoveBy { dx: 10.0, dy: 0.0 }],
            on_click: vec![],
        });
        let mut b = boxed("b", 60.0, 50.0);
        b.components.collider = Some(Collider::default());
        let (mut sim, _) = start(&project_with(vec![a, b]));

        assert!(sim.frame(0.0));
        assert_eq!(x_of(&sim, "a"), 60.0);
        assert_eq!(x_of(&sim, "b"), 60.0);
    }

    #[test]
    fn test_click_goto_scene_scenario() {
        let mut button = boxed("button", 100.0, 100.0);
        button.components.script = Some(Script {
            code: r#"fn onClick(event, payload, api) { api.gotoScene("scene-2"); }"#.into(),
        });
        let (mut sim, _) = start(&project_with(vec![button]));
        sim.frame(0.0);
        assert_eq!(sim.active_scene_id(), "scene-1");

        // Outside the button: nothing happens
        sim.click(5.0, 5.0);
        sim.frame(16.0);
        assert_eq!(sim.active_scene_id(), "scene-1");

        sim.canvas_mut().take_commands();
        sim.click(105.0, 95.0);
        sim.frame(32.0);
        assert_eq!(sim.active_scene_id(), "scene-2");
        assert_eq!(sim.canvas().size(), (640, 480));
        assert!(sim.canvas().commands.contains(&DrawCommand::Resize(640, 480)));
        assert!(sim.world().find("button").is_none());
    }

    #[test]
    fn test_click_hits_topmost_reacting_entity() {
        let mut under = boxed("under", 50.0, 50.0);
        under.interactable = Some(Interactable {
            on_overlap: vec![],
            on_click: vec![InteractAction::ShowMessage { text: "under".into() }],
        });
        let mut over = boxed("over", 55.0, 50.0);
        over.interactable = Some(Interactable {
            on_overlap: vec![],
            on_click: vec![InteractAction::ShowMessage { text: "over".into() }],
        });
        // Decoration on top with no click reaction
        let deco = boxed("deco", 52.0, 50.0);
        let (mut sim, log) = start(&project_with(vec![under, over, deco]));
        sim.click(52.0, 50.0);
        sim.frame(0.0);
        assert_eq!(*log.borrow(), vec!["over".to_string()]);
    }

    #[test]
    fn test_unknown_scene_keeps_current() {
        let mut e = boxed("e", 0.0, 0.0);
        e.components.script = Some(Script { code: r#"fn onUpdate(e, p, api) { api.gotoScene("missing"); }"#.into() });
        let (mut sim, log) = start(&project_with(vec![e]));
        sim.frame(0.0);
        assert_eq!(sim.active_scene_id(), "scene-1");
        assert!(log.borrow().iter().any(|m| m.contains("missing")));
    }

    #[test]
    fn test_failing_handler_reported_once() {
        let mut bad = boxed("bad", 0.0, 0.0);
        bad.components.script = Some(Script { code: r#"fn onUpdate(e, p, api) { throw "nope"; }"#.into() });
        let mut good = boxed("good", 0.0, 0.0);
        good.components.script = Some(Script { code: "fn onUpdate(e, p, api) { api.moveBy(1, 0); }".into() });
        let (mut sim, log) = start(&project_with(vec![bad, good]));
        for i in 0..5 {
            sim.step(1.0 / 60.0);
            assert_eq!(x_of(&sim, "good"), (i + 1) as f32);
        }
        let reports: Vec<_> = log.borrow().iter().filter(|m| m.contains("bad")).cloned().collect();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].contains("onUpdate"));
    }

    #[test]
    fn test_collision_without_handler_is_quiet() {
        let mut a = boxed("a", 0.0, 0.0);
        a.components.collider = Some(Collider::default());
        a.components.script = Some(Script { code: "fn onUpdate(e, p, api) { }".into() });
        let mut b = boxed("b", 5.0, 0.0);
        b.components.collider = Some(Collider::default());
        b.components.script = Some(Script {
            code: "fn onCollision(e, p, api) { api.message(e + \" with \" + p.other.id); }".into(),
        });
        let (mut sim, log) = start(&project_with(vec![a, b]));
        sim.frame(0.0);
        assert_eq!(*log.borrow(), vec!["collision with a".to_string()]);
    }

    #[test]
    fn test_first_frame_zero_dt_then_clamped() {
        let mut e = boxed("mover", 0.0, 0.0);
        e.components.rigidbody = Some(Rigidbody { vx: 30.0, ..Rigidbody::default() });
        let (mut sim, _) = start(&project_with(vec![e]));
        sim.frame(5000.0);
        assert_eq!(x_of(&sim, "mover"), 0.0);
        // A two second stall is clamped to max_dt
        sim.frame(7000.0);
        assert!((x_of(&sim, "mover") - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_stop_is_idempotent_and_final() {
        let (mut sim, _) = start(&project_with(vec![boxed("e", 0.0, 0.0)]));
        assert!(sim.frame(0.0));
        sim.stop();
        sim.stop();
        assert!(!sim.is_running());
        sim.canvas_mut().take_commands();
        assert!(!sim.frame(16.0));
        assert!(sim.canvas().commands.is_empty());
        assert_eq!(sim.world().entity_count(), 0);
        let canvas = sim.destroy();
        assert!(canvas.commands.is_empty());
    }

    #[test]
    fn test_caller_project_untouched() {
        let mut e = boxed("e", 10.0, 10.0);
        e.components.rigidbody = Some(Rigidbody { vx: 100.0, gravity: 50.0, ..Rigidbody::default() });
        let project = project_with(vec![e]);
        let before = project.clone();
        let (mut sim, _) = start(&project);
        for i in 0..10 {
            sim.frame(i as f64 * 16.0);
        }
        assert!(x_of(&sim, "e") > 10.0);
        assert_eq!(project, before);
        assert_eq!(sim.project(), &before);
    }

    #[test]
    fn test_runs_are_deterministic() {
        let mut e = boxed("e", 10.0, 10.0);
        e.components.rigidbody = Some(Rigidbody { vx: 13.0, gravity: 98.0, friction: 0.3, ..Rigidbody::default() });
        e.components.script = Some(Script {
            code: r#"fn onUpdate(e, p, api) { if api.input.down("ArrowRight") { api.moveBy(p.dt * 60, 0); } }"#.into(),
        });
        let project = project_with(vec![e]);

        let run = || {
            let (mut sim, _) = start(&project);
            for i in 0..30 {
                if i == 10 {
                    sim.key_down("ArrowRight");
                }
                if i == 20 {
                    sim.key_up("ArrowRight");
                }
                sim.frame(i as f64 * 16.7);
            }
            let id = sim.world().find("e").unwrap();
            *sim.world().transforms.get(id).unwrap()
        };
        let first = run();
        let second = run();
        assert_eq!(first.x.to_bits(), second.x.to_bits());
        assert_eq!(first.y.to_bits(), second.y.to_bits());
        assert!(first.x > 10.0);
    }

    #[derive(Clone, Default)]
    struct FakeAudio {
        log: Rc<RefCell<Vec<String>>>,
    }

    impl AudioSink for FakeAudio {
        fn play(&mut self, clip: &AudioClip, volume: f32, looped: bool) {
            self.log.borrow_mut().push(format!("play {} {} {}", clip.id, volume, looped));
        }

        fn stop_all(&mut self) {
            self.log.borrow_mut().push("stop".into());
        }
    }

    #[test]
    fn test_autoplay_waits_for_decode_and_stops_on_switch() {
        let mut e = boxed("speaker", 0.0, 0.0);
        e.components.audio_source = Some(AudioSource {
            asset_id: "tune".into(),
            volume: 0.5,
            looped: true,
            autoplay: true,
        });
        e.components.script = Some(Script {
            code: r#"fn onUpdate(e, p, api) { if p.dt > 0.0 { api.gotoScene("scene-2"); } }"#.into(),
        });
        let mut project = project_with(vec![e]);
        project.assets.push(Asset {
            id: "tune".into(),
            name: "Tune".into(),
            kind: AssetKind::Audio,
            src: to_data_uri("audio/ogg", b"OggS-data"),
        });

        let audio = FakeAudio::default();
        let log = audio.log.clone();
        let callbacks = Callbacks::default().with_audio(audio);
        let mut sim = Simulation::start(RecordingCanvas::new(1, 1), &project, callbacks, RuntimeConfig::default()).unwrap();
        assert_eq!(*log.borrow(), vec!["stop"]);

        sim.frame(0.0);
        assert_eq!(*log.borrow(), vec!["stop", "play tune 0.5 true"]);

        sim.frame(16.0);
        assert_eq!(sim.active_scene_id(), "scene-2");
        assert_eq!(log.borrow().last().map(String::as_str), Some("stop"));
    }

    fn overlapping_pair(actions: Vec<InteractAction>) -> Vec<SceneEntity> {
        let mut door = boxed("door", 50.0, 50.0);
        door.components.collider = Some(Collider::default());
        door.interactable = Some(Interactable { on_overlap: actions, on_click: vec![] });
        let mut player = boxed("player", 55.0, 50.0);
        player.components.collider = Some(Collider::default());
        vec![door, player]
    }

    #[test]
    fn test_overlap_goto_known_scene() {
        let actions = vec![InteractAction::GotoScene { scene_id: "scene-2".into() }];
        let (mut sim, log) = start(&project_with(overlapping_pair(actions)));
        sim.frame(0.0);
        assert_eq!(sim.active_scene_id(), "scene-2");
        assert_eq!(sim.canvas().size(), (640, 480));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_overlap_goto_unknown_scene_reported() {
        let actions = vec![InteractAction::GotoScene { scene_id: "nowhere".into() }];
        let (mut sim, log) = start(&project_with(overlapping_pair(actions)));
        sim.frame(0.0);
        assert_eq!(sim.active_scene_id(), "scene-1");
        assert!(log.borrow().iter().any(|m| m.contains("nowhere")));
    }

    #[test]
    fn test_sheet_frame_outside_image_reported() {
        let mut animations = BTreeMap::new();
        animations.insert("walk".to_string(), AnimationClip { frames: vec![0, 5], fps: 8.0, looped: true });
        let mut hero = boxed("hero", 10.0, 10.0);
        hero.components.sprite = Some(Sprite {
            asset_id: Some("sheet".into()),
            spritesheet: Some(Spritesheet { frame_width: 16, frame_height: 16, animations }),
            ..Sprite::default()
        });
        let mut project = project_with(vec![hero]);
        // 32x16 holds frames 0 and 1 only
        project.assets.push(image_asset("sheet", 32, 16));

        let (mut sim, log) = start(&project);
        sim.frame(0.0);
        sim.frame(16.0);
        let reports: Vec<_> = log.borrow().iter().filter(|m| m.contains("frame 5")).cloned().collect();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].contains("hero") && reports[0].contains("walk"));
    }

    #[test]
    fn test_undecodable_asset_reported() {
        let mut project = project_with(vec![]);
        project.assets.push(Asset {
            id: "broken".into(),
            name: "Broken".into(),
            kind: AssetKind::Image,
            src: to_data_uri("image/png", b"nope"),
        });
        let (mut sim, log) = start(&project);
        sim.frame(0.0);
        assert_eq!(sim.assets().status("broken"), AssetStatus::Failed);
        assert!(log.borrow().iter().any(|m| m.contains("'broken' failed to load")));
    }

    #[test]
    fn test_bgm_starts_looped_once_decoded() {
        let mut project = project_with(vec![]);
        project.scenes[0].bgm = Some("music".into());
        project.scenes[0].bgm_volume = 0.5;
        project.assets.push(Asset {
            id: "music".into(),
            name: "Music".into(),
            kind: AssetKind::Audio,
            src: to_data_uri("audio/ogg", b"OggS-data"),
        });

        let audio = FakeAudio::default();
        let log = audio.log.clone();
        let callbacks = Callbacks::default().with_audio(audio);
        let mut sim = Simulation::start(RecordingCanvas::new(1, 1), &project, callbacks, RuntimeConfig::default()).unwrap();
        sim.frame(0.0);
        sim.frame(16.0);
        assert_eq!(*log.borrow(), vec!["stop", "play music 0.5 true"]);
    }

    #[test]
    fn test_report_reaches_on_message() {
        let (mut sim, log) = start(&project_with(vec![]));
        sim.report("audio 'jump' (audio/ogg) failed to load: bad header");
        assert_eq!(log.borrow().last().map(String::as_str), Some("audio 'jump' (audio/ogg) failed to load: bad header"));
    }
}
