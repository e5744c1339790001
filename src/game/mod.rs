//! Scene Runtime
//!
//! Everything needed to play one scene of a project: a small ECS-style world
//! built from the scene document, the per-frame systems, the script sandbox
//! and a renderer that draws through the `Canvas2d` seam.
//!
//! Key concepts:
//! - Entity: index into the world's component storages
//! - World: runtime clone of the active scene, never written back
//! - Command: what scripts and interactables ask the runtime to do
//! - Simulation: the frame loop tying the systems together
//!
//! Frame order is fixed: assets, physics, collision, scripts, scene switch,
//! animation, render.

pub mod animation;
pub mod canvas;
pub mod collision;
pub mod command;
pub mod component;
pub mod entity;
pub mod event;
pub mod physics;
pub mod renderer;
pub mod runtime;
pub mod script;
pub mod transform;
pub mod world;

pub use canvas::{Canvas2d, DrawCommand, ImageStyle, RecordingCanvas, TextStyle};
pub use command::Command;
pub use entity::Entity;
pub use event::Events;
pub use runtime::{AudioSink, Callbacks, SceneTransitionError, Simulation, StartError};
pub use script::{HandlerKind, ScriptError};
pub use world::{EntitySnapshot, World};
