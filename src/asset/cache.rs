//! Cooperative asset cache
//!
//! `preload` only queues work. Each frame the runtime calls `poll` with a
//! decode budget; finished assets become visible through `image`/`audio`,
//! failures are remembered and reported once. Nothing here blocks and
//! nothing runs on another thread.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use super::source::{sniff_mime, AssetLoadError, AssetSource};
use crate::project::{Asset, AssetKind};

/// A decoded RGBA8 image
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub id: String,
    pub width: u32,
    pub height: u32,
    /// width * height * 4 bytes, row-major
    pub pixels: Arc<[u8]>,
}

/// Encoded sound bytes, handed to the audio backend as-is
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub id: String,
    pub mime: &'static str,
    pub bytes: Arc<[u8]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetStatus {
    /// Not part of this cache
    Unknown,
    Pending,
    Ready,
    Failed,
}

/// Outcome of one decode during `poll`
#[derive(Debug)]
pub enum AssetEvent {
    Loaded(String),
    Failed { id: String, error: AssetLoadError },
}

pub struct AssetCache {
    source: Box<dyn AssetSource>,
    queue: VecDeque<Asset>,
    images: HashMap<String, ImageData>,
    audio: HashMap<String, AudioClip>,
    failed: HashMap<String, String>,
}

impl AssetCache {
    pub fn new(source: Box<dyn AssetSource>) -> Self {
        Self {
            source,
            queue: VecDeque::new(),
            images: HashMap::new(),
            audio: HashMap::new(),
            failed: HashMap::new(),
        }
    }

    /// Queue assets for decoding. Already known ids are skipped.
    pub fn preload<'a>(&mut self, assets: impl IntoIterator<Item = &'a Asset>) {
        for asset in assets {
            if self.status(&asset.id) == AssetStatus::Unknown {
                self.queue.push_back(asset.clone());
            }
        }
    }

    /// Decode up to `budget` queued assets.
    pub fn poll(&mut self, budget: usize) -> Vec<AssetEvent> {
        let mut events = Vec::new();
        for _ in 0..budget {
            let Some(asset) = self.queue.pop_front() else {
                break;
            };
            match self.load(&asset) {
                Ok(()) => {
                    log::debug!("asset '{}' ready", asset.id);
                    events.push(AssetEvent::Loaded(asset.id));
                }
                Err(error) => {
                    log::warn!("asset '{}' failed: {}", asset.id, error);
                    self.failed.insert(asset.id.clone(), error.to_string());
                    events.push(AssetEvent::Failed { id: asset.id, error });
                }
            }
        }
        events
    }

    fn load(&mut self, asset: &Asset) -> Result<(), AssetLoadError> {
        let bytes = self.source.read(&asset.src)?;
        match asset.kind {
            AssetKind::Image => {
                let image = decode_image(&asset.id, &bytes)?;
                self.images.insert(asset.id.clone(), image);
            }
            AssetKind::Audio => {
                if bytes.is_empty() {
                    return Err(AssetLoadError::Decode {
                        id: asset.id.clone(),
                        message: "empty audio data".into(),
                    });
                }
                let clip = AudioClip {
                    id: asset.id.clone(),
                    mime: sniff_mime(&bytes, &asset.src),
                    bytes: bytes.into(),
                };
                self.audio.insert(asset.id.clone(), clip);
            }
        }
        Ok(())
    }

    pub fn status(&self, id: &str) -> AssetStatus {
        if self.images.contains_key(id) || self.audio.contains_key(id) {
            AssetStatus::Ready
        } else if self.failed.contains_key(id) {
            AssetStatus::Failed
        } else if self.queue.iter().any(|a| a.id == id) {
            AssetStatus::Pending
        } else {
            AssetStatus::Unknown
        }
    }

    pub fn image(&self, id: &str) -> Option<&ImageData> {
        self.images.get(id)
    }

    pub fn audio(&self, id: &str) -> Option<&AudioClip> {
        self.audio.get(id)
    }

    pub fn error(&self, id: &str) -> Option<&str> {
        self.failed.get(id).map(String::as_str)
    }

    /// Number of assets still waiting to be decoded
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Drop every decoded asset and all queued work
    pub fn release(&mut self) {
        self.queue.clear();
        self.images.clear();
        self.audio.clear();
        self.failed.clear();
    }
}

fn decode_image(id: &str, bytes: &[u8]) -> Result<ImageData, AssetLoadError> {
    let decoded = image::load_from_memory(bytes).map_err(|e| AssetLoadError::Decode {
        id: id.to_string(),
        message: e.to_string(),
    })?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(ImageData {
        id: id.to_string(),
        width,
        height,
        pixels: rgba.into_raw().into(),
    })
}
