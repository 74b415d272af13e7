// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Voice tracking on the engine side.
//!
//! The mixer owns the audio of a voice; the engine keeps a handle so every
//! voice that is still sounding can be released together.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

/// Global voice ID counter.
static NEXT_VOICE_ID: AtomicU64 = AtomicU64::new(1);

/// Returns a new, process-unique voice ID.
pub fn next_voice_id() -> u64 {
    NEXT_VOICE_ID.fetch_add(1, Ordering::Relaxed)
}

/// A handle to a scheduled voice.
#[derive(Debug)]
pub struct Voice {
    /// The mixer source ID.
    id: u64,
    /// The sample location being played.
    location: String,
    /// Start time on the output clock.
    start_time: f64,
    /// Sustain gain of this voice.
    gain: f32,
    /// Set by the mixer once the voice has stopped.
    finished: Arc<AtomicBool>,
}

impl Voice {
    pub fn new(
        id: u64,
        location: String,
        start_time: f64,
        gain: f32,
        finished: Arc<AtomicBool>,
    ) -> Voice {
        Voice {
            id,
            location,
            start_time,
            gain,
            finished,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

/// The set of voices that may still be sounding.
#[derive(Debug, Default)]
pub struct VoiceSet {
    voices: Vec<Voice>,
}

impl VoiceSet {
    pub fn new() -> VoiceSet {
        VoiceSet::default()
    }

    pub fn add(&mut self, voice: Voice) {
        self.prune();
        self.voices.push(voice);
    }

    /// Forgets voices that ended naturally.
    pub fn prune(&mut self) {
        let before = self.voices.len();
        self.voices.retain(|voice| !voice.is_finished());
        let removed = before - self.voices.len();
        if removed > 0 {
            debug!(removed, "Pruned finished voices");
        }
    }

    /// Returns the current number of active voices.
    pub fn active_count(&mut self) -> usize {
        self.prune();
        self.voices.len()
    }

    /// Removes and returns every active voice.
    pub fn drain(&mut self) -> Vec<Voice> {
        self.prune();
        std::mem::take(&mut self.voices)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Voice> {
        self.voices.iter()
    }
}
