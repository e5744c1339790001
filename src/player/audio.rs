//! macroquad-backed `AudioSink`
//!
//! macroquad decodes sounds asynchronously, while the simulation asks for
//! playback from inside a frame. Requests are queued and `pump()` (awaited
//! once per frame by the player loop) loads and starts them. The handle is
//! cheap to clone: one copy goes into `Callbacks`, the loop keeps another.
//!
//! A clip macroquad cannot decode is reported once and never retried.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use macroquad::audio::{load_sound_from_bytes, play_sound, stop_sound, PlaySoundParams, Sound};

use crate::asset::AudioClip;
use crate::game::AudioSink;

struct Request {
    clip: AudioClip,
    volume: f32,
    looped: bool,
}

#[derive(Default)]
struct Mixer {
    queue: Vec<Request>,
    sounds: HashMap<String, Sound>,
    failed: HashSet<String>,
}

impl Mixer {
    /// Remember a clip that failed to decode. Returns the message to report
    /// the first time a clip fails, None after that.
    fn note_failure(&mut self, clip: &AudioClip, error: impl std::fmt::Display) -> Option<String> {
        if !self.failed.insert(clip.id.clone()) {
            return None;
        }
        Some(format!("audio '{}' ({}) failed to load: {}", clip.id, clip.mime, error))
    }
}

#[derive(Clone, Default)]
pub struct MacroquadAudio {
    mixer: Rc<RefCell<Mixer>>,
}

impl MacroquadAudio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start every queued sound, loading clips seen for the first time.
    /// Returns one message per clip that failed to decode.
    pub async fn pump(&self) -> Vec<String> {
        let mut failures = Vec::new();
        let requests = std::mem::take(&mut self.mixer.borrow_mut().queue);
        for request in requests {
            if self.mixer.borrow().failed.contains(&request.clip.id) {
                continue;
            }
            let cached = self.mixer.borrow().sounds.get(&request.clip.id).cloned();
            let sound = match cached {
                Some(sound) => sound,
                None => match load_sound_from_bytes(&request.clip.bytes).await {
                    Ok(sound) => {
                        self.mixer.borrow_mut().sounds.insert(request.clip.id.clone(), sound.clone());
                        sound
                    }
                    Err(e) => {
                        if let Some(message) = self.mixer.borrow_mut().note_failure(&request.clip, e) {
                            log::warn!("{}", message);
                            failures.push(message);
                        }
                        continue;
                    }
                },
            };
            play_sound(&sound, PlaySoundParams { looped: request.looped, volume: request.volume });
        }
        failures
    }
}

impl AudioSink for MacroquadAudio {
    fn play(&mut self, clip: &AudioClip, volume: f32, looped: bool) {
        self.mixer.borrow_mut().queue.push(Request { clip: clip.clone(), volume, looped });
    }

    fn stop_all(&mut self) {
        let mut mixer = self.mixer.borrow_mut();
        mixer.queue.clear();
        for sound in mixer.sounds.values() {
            stop_sound(sound);
        }
    }
}
