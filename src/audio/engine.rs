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

//! The audio engine: lazily opens the output graph, loads a chord's samples
//! and schedules one enveloped voice per pitch.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use super::envelope::Envelope;
use super::mixer::{MixerCommand, ScheduledVoice};
use super::voice::{next_voice_id, Voice, VoiceSet};
use super::{AudioError, Device, GraphSettings, Mixer, OutputGraph};
use crate::chord::{Chord, Pitch};
use crate::config::{self, ConfigError};
use crate::round::Playback;
use crate::samples::{self, SampleStore};

/// Timing of a played chord, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChordTiming {
    /// Length of the chord window.
    pub chord_length: f64,
    /// Fade-out at the end of the window.
    pub fade_out: f64,
    /// Delay between "now" and the scheduled start.
    pub lead: f64,
    /// Fade used when cutting off previous voices.
    pub stop_fade: f64,
}

impl Default for ChordTiming {
    fn default() -> Self {
        ChordTiming {
            chord_length: 4.6,
            fade_out: 0.12,
            lead: 0.02,
            stop_fade: 0.04,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub graph: GraphSettings,
    /// Total gain of a chord, split equally between its voices.
    pub chord_gain: f32,
    pub timing: ChordTiming,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            graph: GraphSettings::default(),
            chord_gain: 0.75,
            timing: ChordTiming::default(),
        }
    }
}

impl EngineSettings {
    /// Builds engine settings from the audio and quiz configuration.
    pub fn from_config(
        audio: &config::Audio,
        quiz: &config::Quiz,
    ) -> Result<EngineSettings, ConfigError> {
        Ok(EngineSettings {
            graph: GraphSettings {
                master_gain: audio.master_gain(),
                limiter: audio.limiter()?,
            },
            chord_gain: audio.chord_gain(),
            timing: ChordTiming {
                chord_length: quiz.chord_length()?.as_secs_f64(),
                fade_out: quiz.fade_out()?.as_secs_f64(),
                lead: quiz.schedule_lead()?.as_secs_f64(),
                stop_fade: quiz.stop_fade()?.as_secs_f64(),
            },
        })
    }
}

enum GraphState {
    Uninitialized,
    Ready(Arc<OutputGraph>),
    /// Opening failed. Not retried.
    Failed(String),
    Disposed,
}

/// Plays chords through an output device.
pub struct AudioEngine {
    device: Arc<dyn Device>,
    store: Arc<SampleStore>,
    settings: EngineSettings,
    graph: Mutex<GraphState>,
    voices: Mutex<VoiceSet>,
}

impl AudioEngine {
    /// Creates a new engine. The device is not opened until it is needed.
    pub fn new(
        device: Arc<dyn Device>,
        store: Arc<SampleStore>,
        settings: EngineSettings,
    ) -> AudioEngine {
        AudioEngine {
            device,
            store,
            settings,
            graph: Mutex::new(GraphState::Uninitialized),
            voices: Mutex::new(VoiceSet::new()),
        }
    }

    pub fn store(&self) -> &Arc<SampleStore> {
        &self.store
    }

    /// Opens the output graph on first use. The graph starts suspended.
    pub fn ensure_graph(&self) -> Result<Arc<OutputGraph>, AudioError> {
        let mut graph = self.graph.lock();
        match &*graph {
            GraphState::Ready(output) => return Ok(output.clone()),
            GraphState::Failed(reason) => {
                return Err(AudioError::UnsupportedDevice(reason.clone()))
            }
            GraphState::Disposed => return Err(AudioError::Disposed),
            GraphState::Uninitialized => {}
        }

        match self.device.open(&self.settings.graph) {
            Ok(output) => {
                info!(device = %self.device, "Output graph ready.");
                let output = Arc::new(output);
                *graph = GraphState::Ready(output.clone());
                Ok(output)
            }
            Err(e) => {
                let reason = format!("{}: {}", self.device, e);
                error!(reason, "Unable to open audio output.");
                *graph = GraphState::Failed(reason.clone());
                Err(AudioError::UnsupportedDevice(reason))
            }
        }
    }

    fn resume_if_needed(&self, mixer: &Mixer) {
        if !mixer.is_running() {
            debug!("Resuming output.");
            mixer.resume();
        }
    }

    /// The output clock in seconds, or zero before the graph is open.
    pub fn now(&self) -> f64 {
        match &*self.graph.lock() {
            GraphState::Ready(output) => output.mixer().current_time(),
            _ => 0.0,
        }
    }

    /// Plays the pitches together starting at `start_at` on the output clock,
    /// ending exactly `duration` seconds later. Nothing sounds unless every
    /// sample loads.
    pub async fn play_windowed(
        &self,
        pitches: &[Pitch],
        start_at: f64,
        duration: f64,
        fade_out: f64,
    ) -> Result<(), AudioError> {
        let output = self.ensure_graph()?;
        self.resume_if_needed(output.mixer());
        if pitches.is_empty() {
            return Ok(());
        }

        let mut loaded = Vec::with_capacity(pitches.len());
        for (pitch, result) in pitches
            .iter()
            .zip(samples::load_all(&self.store, pitches).await)
        {
            match result {
                Ok(sample) => loaded.push((*pitch, sample)),
                Err(e) => {
                    warn!(pitch = pitch.value(), error = %e, "Aborting chord.");
                    return Err(e.into());
                }
            }
        }

        // The engine may have been disposed while the samples loaded.
        let output = self.ensure_graph()?;
        let mixer = output.mixer();
        let start = start_at.max(mixer.current_time());
        let gain = self.settings.chord_gain / loaded.len() as f32;

        let mut voices = self.voices.lock();
        for (pitch, sample) in loaded {
            let id = next_voice_id();
            let finished = Arc::new(AtomicBool::new(false));
            let envelope = Envelope::windowed(start, duration, fade_out, gain);
            mixer.send(MixerCommand::Add(ScheduledVoice::new(
                id,
                (*sample).clone(),
                envelope,
                mixer.sample_rate(),
                finished.clone(),
            )));
            voices.add(Voice::new(
                id,
                self.store.resolve(pitch).unwrap_or_default(),
                start,
                gain,
                finished,
            ));
        }
        debug!(
            start,
            duration,
            voices = voices.active_count(),
            "Scheduled chord."
        );
        Ok(())
    }

    /// Fades every active voice out starting now.
    pub fn stop_all(&self, fade: f64) {
        let stopped = self.voices.lock().drain();
        if stopped.is_empty() {
            return;
        }

        let output = match &*self.graph.lock() {
            GraphState::Ready(output) => output.clone(),
            _ => return,
        };
        let mixer = output.mixer();
        let at = mixer.current_time();
        debug!(
            voices = ?stopped.iter().map(Voice::location).collect::<Vec<_>>(),
            at,
            fade,
            "Stopping voices."
        );
        mixer.send(MixerCommand::Release {
            ids: stopped.iter().map(Voice::id).collect(),
            at,
            fade,
        });
    }

    pub fn active_voice_count(&self) -> usize {
        self.voices.lock().active_count()
    }

    /// Closes the output and drops every voice. Later playback fails with
    /// [`AudioError::Disposed`].
    pub fn dispose(&self) {
        let previous = std::mem::replace(&mut *self.graph.lock(), GraphState::Disposed);
        self.voices.lock().drain();
        if let GraphState::Ready(output) = previous {
            output.mixer().send(MixerCommand::Clear);
            output.close();
            info!("Audio engine disposed.");
        }
    }

    #[cfg(test)]
    fn mixer(&self) -> Option<Arc<Mixer>> {
        match &*self.graph.lock() {
            GraphState::Ready(output) => Some(output.mixer().clone()),
            _ => None,
        }
    }
}

impl Playback for AudioEngine {
    async fn play_chord(&self, chord: Chord) -> Result<(), AudioError> {
        let timing = self.settings.timing;
        let start_at = self.now() + timing.lead;
        self.play_windowed(
            chord.pitches(),
            start_at,
            timing.chord_length,
            timing.fade_out,
        )
        .await
    }

    fn stop_all(&self) {
        AudioEngine::stop_all(self, self.settings.timing.stop_fade);
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}
