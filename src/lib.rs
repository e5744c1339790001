//! playframe: a 2D scene runtime
//!
//! Plays declarative JSON projects (scenes of entities with transform,
//! sprite, collider, rigidbody, script, animation and audio components) and
//! packs them into standalone HTML documents that play offline.

/// Version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod asset;
pub mod config;
pub mod export;
pub mod game;
pub mod input;
pub mod player;
pub mod project;
