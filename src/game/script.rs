//! Script Sandbox
//!
//! Entity behavior written in rhai. A script declares up to three handlers:
//!
//! ```text
//! fn onUpdate(event, payload, api) { ... }     // every frame
//! fn onClick(event, payload, api) { ... }      // when the entity is clicked
//! fn onCollision(event, payload, api) { ... }  // per overlap, payload.other
//! ```
//!
//! Top-level statements never run. Handlers see only their arguments: the
//! `api` object queues commands (moveBy, blendTo, gotoScene, message,
//! input.down, audio.play) that the runtime applies after the call.
//!
//! A handler that fails to compile or throws is disabled for the rest of
//! the session and reported once; other handlers and entities keep going.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use rhai::{CallFnOptions, Dynamic, Engine, EvalAltResult, Map, Scope, AST};
use thiserror::Error;

use super::command::Command;
use super::entity::Entity;
use super::world::{EntitySnapshot, World};
use crate::config::RuntimeConfig;
use crate::input::InputState;

/// The three handler entry points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    Update,
    Click,
    Collision,
}

impl HandlerKind {
    pub const ALL: [HandlerKind; 3] = [HandlerKind::Update, HandlerKind::Click, HandlerKind::Collision];

    /// Function name in script source
    pub fn fn_name(self) -> &'static str {
        match self {
            HandlerKind::Update => "onUpdate",
            HandlerKind::Click => "onClick",
            HandlerKind::Collision => "onCollision",
        }
    }

    /// Value of the handler's `event` argument
    pub fn event_name(self) -> &'static str {
        match self {
            HandlerKind::Update => "update",
            HandlerKind::Click => "click",
            HandlerKind::Collision => "collision",
        }
    }

    fn from_fn_name(name: &str) -> Option<Self> {
        HandlerKind::ALL.into_iter().find(|k| k.fn_name() == name)
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.fn_name())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    /// `handler` is the declared handler name, or "script" when none is declared
    #[error("entity '{entity}' {handler}: compile error: {message}")]
    Compile { entity: String, handler: String, message: String },
    #[error("entity '{entity}' {handler}: {message}")]
    Runtime { entity: String, handler: HandlerKind, message: String },
}

/// Result of one handler call. Commands queued before a failure are kept.
#[derive(Debug, Default)]
pub struct Invocation {
    pub commands: Vec<Command>,
    pub error: Option<ScriptError>,
}

// =============================================================================
// Script-facing API
// =============================================================================

#[derive(Default)]
struct Shared {
    commands: Vec<Command>,
    input: InputState,
}

/// The `api` argument of every handler
#[derive(Clone)]
pub struct ScriptApi {
    shared: Rc<RefCell<Shared>>,
}

/// `api.input`
#[derive(Clone)]
pub struct InputApi {
    shared: Rc<RefCell<Shared>>,
}

/// `api.audio`
#[derive(Clone)]
pub struct AudioApi {
    shared: Rc<RefCell<Shared>>,
}

type RhaiResult<T> = Result<T, Box<EvalAltResult>>;

fn to_number(value: &Dynamic, what: &str) -> RhaiResult<f32> {
    if let Ok(f) = value.as_float() {
        return Ok(f as f32);
    }
    if let Ok(i) = value.as_int() {
        return Ok(i as f32);
    }
    Err(format!("{} must be a number, got {}", what, value.type_name()).into())
}

impl ScriptApi {
    fn push(&self, command: Command) {
        self.shared.borrow_mut().commands.push(command);
    }

    fn move_by(&mut self, dx: Dynamic, dy: Dynamic) -> RhaiResult<()> {
        let dx = to_number(&dx, "moveBy dx")?;
        let dy = to_number(&dy, "moveBy dy")?;
        self.push(Command::MoveBy { dx, dy });
        Ok(())
    }

    fn blend_to(&mut self, animation: &str, duration: Dynamic) -> RhaiResult<()> {
        let duration = to_number(&duration, "blendTo duration")?;
        self.push(Command::BlendTo { animation: animation.to_string(), duration });
        Ok(())
    }

    fn goto_scene(&mut self, scene_id: &str) {
        self.push(Command::GotoScene(scene_id.to_string()));
    }

    fn message(&mut self, text: Dynamic) {
        self.push(Command::Message(text.to_string()));
    }

    fn input(&mut self) -> InputApi {
        InputApi { shared: self.shared.clone() }
    }

    fn audio(&mut self) -> AudioApi {
        AudioApi { shared: self.shared.clone() }
    }
}

impl InputApi {
    fn down(&mut self, action: &str) -> bool {
        self.shared.borrow().input.action_down(action)
    }
}

impl AudioApi {
    fn play(&mut self, asset_id: &str) {
        self.push_play(asset_id, 1.0);
    }

    fn play_with(&mut self, asset_id: &str, options: Map) -> RhaiResult<()> {
        let volume = match options.get("volume") {
            Some(v) => to_number(v, "volume")?,
            None => 1.0,
        };
        self.push_play(asset_id, volume);
        Ok(())
    }

    fn push_play(&self, asset_id: &str, volume: f32) {
        self.shared.borrow_mut().commands.push(Command::PlayAudio {
            asset_id: asset_id.to_string(),
            volume: volume.clamp(0.0, 1.0),
        });
    }
}

fn register_api(engine: &mut Engine) {
    engine.register_type_with_name::<ScriptApi>("Api");
    engine.register_fn("moveBy", ScriptApi::move_by);
    engine.register_fn("blendTo", ScriptApi::blend_to);
    engine.register_fn("gotoScene", ScriptApi::goto_scene);
    engine.register_fn("message", ScriptApi::message);
    engine.register_get("input", ScriptApi::input);
    engine.register_get("audio", ScriptApi::audio);

    engine.register_type_with_name::<InputApi>("Input");
    engine.register_fn("down", InputApi::down);

    engine.register_type_with_name::<AudioApi>("Audio");
    engine.register_fn("play", AudioApi::play);
    engine.register_fn("play", AudioApi::play_with);
}

// =============================================================================
// Payloads
// =============================================================================

pub fn update_payload(dt: f32, entity_id: &str) -> Map {
    let mut map = Map::new();
    map.insert("dt".into(), Dynamic::from_float(dt as rhai::FLOAT));
    map.insert("entity".into(), entity_id.into());
    map
}

pub fn click_payload(x: f32, y: f32, entity_id: &str) -> Map {
    let mut map = Map::new();
    map.insert("x".into(), Dynamic::from_float(x as rhai::FLOAT));
    map.insert("y".into(), Dynamic::from_float(y as rhai::FLOAT));
    map.insert("entity".into(), entity_id.into());
    map
}

pub fn collision_payload(other: &EntitySnapshot, entity_id: &str) -> Map {
    let mut snapshot = Map::new();
    snapshot.insert("id".into(), other.id.clone().into());
    snapshot.insert("name".into(), other.name.clone().into());
    for (key, value) in [
        ("x", other.x),
        ("y", other.y),
        ("w", other.w),
        ("h", other.h),
        ("rotation", other.rotation),
    ] {
        snapshot.insert(key.into(), Dynamic::from_float(value as rhai::FLOAT));
    }
    snapshot.insert("isTrigger".into(), other.is_trigger.into());
    snapshot.insert("layer".into(), Dynamic::from_int(other.layer as rhai::INT));

    let mut map = Map::new();
    map.insert("other".into(), Dynamic::from_map(snapshot));
    map.insert("entity".into(), entity_id.into());
    map
}

// =============================================================================
// Sandbox
// =============================================================================

struct CompiledScript {
    ast: AST,
    handlers: HashSet<HandlerKind>,
}

/// Compiles the scripts of the active scene and dispatches handler calls.
pub struct ScriptSandbox {
    engine: Engine,
    shared: Rc<RefCell<Shared>>,
    scripts: HashMap<Entity, CompiledScript>,
    /// (scene id, entity id, handler), kept across scene loads
    disabled: HashSet<(String, String, HandlerKind)>,
    scene_id: String,
}

impl ScriptSandbox {
    pub fn new(config: &RuntimeConfig) -> Self {
        let shared = Rc::new(RefCell::new(Shared::default()));
        let mut engine = Engine::new();
        engine.set_max_operations(config.script_max_operations);
        engine.set_max_call_levels(config.script_max_call_depth);
        engine.set_max_string_size(config.script_max_string_size);
        engine.set_max_array_size(config.script_max_array_size);
        engine.set_max_map_size(config.script_max_array_size);
        engine.disable_symbol("eval");

        let print_shared = shared.clone();
        engine.on_print(move |text| {
            print_shared.borrow_mut().commands.push(Command::Message(text.to_string()));
        });
        let debug_shared = shared.clone();
        engine.on_debug(move |text, _source, _pos| {
            debug_shared.borrow_mut().commands.push(Command::Message(text.to_string()));
        });

        register_api(&mut engine);

        Self {
            engine,
            shared,
            scripts: HashMap::new(),
            disabled: HashSet::new(),
            scene_id: String::new(),
        }
    }

    /// Compile every script of a freshly built world.
    ///
    /// Returns compile errors for handlers not already disabled, plus lint
    /// warnings. Previously disabled handlers stay disabled.
    pub fn load_scene(&mut self, scene_id: &str, world: &World) -> (Vec<ScriptError>, Vec<String>) {
        self.scene_id = scene_id.to_string();
        self.scripts.clear();

        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        for (entity, script) in world.scripts.iter() {
            let entity_id = world.id(entity);
            for warning in lint(&script.code) {
                warnings.push(format!("entity '{}': {}", entity_id, warning));
            }

            match self.engine.compile(&script.code) {
                Ok(ast) => {
                    let handlers = ast
                        .iter_functions()
                        .filter(|f| f.params.len() == 3)
                        .filter_map(|f| HandlerKind::from_fn_name(f.name))
                        .collect();
                    self.scripts.insert(entity, CompiledScript { ast, handlers });
                }
                Err(err) => {
                    let message = err.to_string();
                    let declared = declared_handlers(&script.code);
                    let names: Vec<String> = if declared.is_empty() {
                        vec!["script".to_string()]
                    } else {
                        declared.iter().map(|k| k.fn_name().to_string()).collect()
                    };
                    let mut fresh = false;
                    for kind in HandlerKind::ALL {
                        fresh |= self.disable(entity_id, kind);
                    }
                    if fresh {
                        for handler in names {
                            errors.push(ScriptError::Compile {
                                entity: entity_id.to_string(),
                                handler,
                                message: message.clone(),
                            });
                        }
                    }
                }
            }
        }
        (errors, warnings)
    }

    /// Returns true when the handler was not disabled before
    fn disable(&mut self, entity_id: &str, kind: HandlerKind) -> bool {
        self.disabled.insert((self.scene_id.clone(), entity_id.to_string(), kind))
    }

    pub fn is_disabled(&self, entity_id: &str, kind: HandlerKind) -> bool {
        self.disabled.contains(&(self.scene_id.clone(), entity_id.to_string(), kind))
    }

    /// Whether calling `kind` on `entity` would run script code
    pub fn has_handler(&self, world: &World, entity: Entity, kind: HandlerKind) -> bool {
        match self.scripts.get(&entity) {
            Some(script) => script.handlers.contains(&kind) && !self.is_disabled(world.id(entity), kind),
            None => false,
        }
    }

    /// Input seen by `api.input.down` during this frame
    pub fn set_input(&mut self, input: &InputState) {
        self.shared.borrow_mut().input = input.clone();
    }

    /// Call one handler. Missing or disabled handlers are a silent no-op.
    pub fn invoke(&mut self, world: &World, entity: Entity, kind: HandlerKind, payload: Map) -> Invocation {
        if !self.has_handler(world, entity, kind) {
            return Invocation::default();
        }
        let Some(script) = self.scripts.get(&entity) else {
            return Invocation::default();
        };

        self.shared.borrow_mut().commands.clear();
        let api = ScriptApi { shared: self.shared.clone() };
        let options = CallFnOptions::new().eval_ast(false).rewind_scope(true);
        let mut scope = Scope::new();
        let result = self.engine.call_fn_with_options::<Dynamic>(
            options,
            &mut scope,
            &script.ast,
            kind.fn_name(),
            (kind.event_name().to_string(), payload, api),
        );
        let commands = std::mem::take(&mut self.shared.borrow_mut().commands);

        let error = match result {
            Ok(_) => None,
            Err(err) => {
                let entity_id = world.id(entity).to_string();
                self.disable(&entity_id, kind);
                Some(ScriptError::Runtime { entity: entity_id, handler: kind, message: err.to_string() })
            }
        };
        Invocation { commands, error }
    }

    /// Forget the compiled scripts of the current scene
    pub fn unload(&mut self) {
        self.scripts.clear();
        self.shared.borrow_mut().commands.clear();
    }
}

/// Handler names a source declares, found textually so that sources which
/// fail to parse still report per handler.
fn declared_handlers(code: &str) -> Vec<HandlerKind> {
    let compact: String = code.split_whitespace().collect::<Vec<_>>().join(" ");
    HandlerKind::ALL
        .into_iter()
        .filter(|k| {
            let name = k.fn_name();
            compact.contains(&format!("fn {}(", name)) || compact.contains(&format!("fn {} (", name))
        })
        .collect()
}

/// Advisory warnings about loops that can never end
pub fn lint(code: &str) -> Vec<String> {
    let compact: String = code.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut warnings = Vec::new();
    if compact.contains("while true") {
        warnings.push("`while true` never ends unless it breaks; the operation limit will stop it".to_string());
    }
    if (compact.contains("loop {") || compact.contains("loop{")) && !compact.contains("break") {
        warnings.push("`loop` without `break` never ends; the operation limit will stop it".to_string());
    }
    warnings
}
