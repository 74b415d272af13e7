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

//! Render side of the output graph: scheduled voices -> master gain -> limiter.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use super::envelope::Envelope;
use super::limiter::{Limiter, LimiterSettings};
use crate::samples::DecodedSample;

/// Commands sent from the engine to the render side.
pub enum MixerCommand {
    /// Starts tracking a voice. It sounds once the clock reaches its start frame.
    Add(ScheduledVoice),
    /// Releases the given voices starting at `at` seconds.
    Release { ids: Vec<u64>, at: f64, fade: f64 },
    /// Drops every voice immediately.
    Clear,
}

/// A voice as the mixer sees it.
pub struct ScheduledVoice {
    id: u64,
    sample: DecodedSample,
    envelope: Envelope,
    /// Source frames advanced per output frame.
    step: f64,
    start_frame: u64,
    stop_frame: u64,
    /// Shared with the engine's voice handle, set once the voice is done.
    finished: Arc<AtomicBool>,
}

impl ScheduledVoice {
    /// Schedules `sample` with the given envelope on a clock running at `output_rate`.
    pub fn new(
        id: u64,
        sample: DecodedSample,
        envelope: Envelope,
        output_rate: u32,
        finished: Arc<AtomicBool>,
    ) -> ScheduledVoice {
        let rate = f64::from(output_rate);
        ScheduledVoice {
            id,
            step: f64::from(sample.sample_rate()) / rate,
            sample,
            start_frame: to_frame(envelope.start(), rate),
            stop_frame: to_frame(envelope.natural_stop(), rate),
            envelope,
            finished,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn start_frame(&self) -> u64 {
        self.start_frame
    }

    /// Reads the source at `position` (in source frames) into `out`, one value
    /// per source channel. Returns false past the end of the sample.
    fn read(&self, position: f64, out: &mut [f32]) -> bool {
        let channels = self.sample.channel_count() as usize;
        let data = self.sample.data();
        let index = position.floor() as usize;
        if index >= self.sample.frames() {
            return false;
        }
        let frac = (position - index as f64) as f32;
        for (channel, value) in out.iter_mut().enumerate().take(channels) {
            let s0 = data[index * channels + channel];
            let s1 = data.get((index + 1) * channels + channel).copied().unwrap_or(s0);
            *value = s0 + (s1 - s0) * frac;
        }
        true
    }
}

fn to_frame(seconds: f64, rate: f64) -> u64 {
    (seconds.max(0.0) * rate).round() as u64
}

struct RenderState {
    voices: Vec<ScheduledVoice>,
    limiter: Limiter,
    /// Scratch space for one source frame.
    source_frame: Vec<f32>,
}

/// Mixes scheduled voices into interleaved output frames. Clone the sender to
/// schedule voices from any thread, and call [`Mixer::render`] from exactly one
/// thread (the device callback).
pub struct Mixer {
    num_channels: u16,
    sample_rate: u32,
    master_gain: f32,
    /// Frames rendered so far. This is the output clock.
    frames: AtomicU64,
    /// A suspended mixer outputs silence and does not advance the clock.
    running: AtomicBool,
    command_tx: Sender<MixerCommand>,
    command_rx: Receiver<MixerCommand>,
    state: Mutex<RenderState>,
}

impl Mixer {
    /// Creates a new, suspended mixer.
    pub fn new(
        num_channels: u16,
        sample_rate: u32,
        master_gain: f32,
        limiter: LimiterSettings,
    ) -> Mixer {
        let (command_tx, command_rx) = crossbeam_channel::unbounded();
        Mixer {
            num_channels: num_channels.max(1),
            sample_rate,
            master_gain,
            frames: AtomicU64::new(0),
            running: AtomicBool::new(false),
            command_tx,
            command_rx,
            state: Mutex::new(RenderState {
                voices: Vec::new(),
                limiter: Limiter::new(limiter, sample_rate),
                source_frame: Vec::new(),
            }),
        }
    }

    pub fn num_channels(&self) -> u16 {
        self.num_channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn current_frame(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    /// The output clock in seconds.
    pub fn current_time(&self) -> f64 {
        self.current_frame() as f64 / f64::from(self.sample_rate)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn resume(&self) {
        self.running.store(true, Ordering::Release);
    }

    /// Sends a command to the render side. Commands are applied at the start
    /// of the next render call.
    pub fn send(&self, command: MixerCommand) {
        // The receiver lives as long as the mixer, so this cannot fail.
        let _ = self.command_tx.send(command);
    }

    /// Number of voices the render side is still tracking.
    pub fn active_voices(&self) -> usize {
        self.state.lock().voices.len()
    }

    fn apply_commands(&self, state: &mut RenderState) {
        while let Ok(command) = self.command_rx.try_recv() {
            match command {
                MixerCommand::Add(voice) => state.voices.push(voice),
                MixerCommand::Release { ids, at, fade } => {
                    let rate = f64::from(self.sample_rate);
                    for voice in state.voices.iter_mut().filter(|v| ids.contains(&v.id)) {
                        let stop = voice.envelope.release(at, fade);
                        voice.stop_frame = voice.stop_frame.min(to_frame(stop, rate));
                    }
                }
                MixerCommand::Clear => {
                    for voice in state.voices.drain(..) {
                        voice.finished.store(true, Ordering::Release);
                    }
                }
            }
        }
    }

    /// Renders interleaved frames into `output`.
    pub fn render(&self, output: &mut [f32]) {
        let mut state = self.state.lock();
        self.apply_commands(&mut state);

        if !self.is_running() {
            output.fill(0.0);
            return;
        }

        let channels = self.num_channels as usize;
        let rate = f64::from(self.sample_rate);
        let first_frame = self.current_frame();
        let RenderState {
            voices,
            limiter,
            source_frame,
        } = &mut *state;

        for (offset, frame) in output.chunks_mut(channels).enumerate() {
            frame.fill(0.0);
            let frame_index = first_frame + offset as u64;
            let t = frame_index as f64 / rate;

            for voice in voices.iter_mut() {
                if frame_index < voice.start_frame || voice.finished.load(Ordering::Relaxed) {
                    continue;
                }
                if frame_index >= voice.stop_frame {
                    voice.finished.store(true, Ordering::Release);
                    continue;
                }

                let source_channels = voice.sample.channel_count() as usize;
                source_frame.resize(source_channels, 0.0);
                let position = (frame_index - voice.start_frame) as f64 * voice.step;
                if !voice.read(position, source_frame) {
                    voice.finished.store(true, Ordering::Release);
                    continue;
                }

                let gain = voice.envelope.gain_at(t);
                mix_frame(frame, source_frame, gain);
            }

            for sample in frame.iter_mut() {
                *sample *= self.master_gain;
            }
            limiter.process(frame);
        }

        voices.retain(|voice| !voice.finished.load(Ordering::Acquire));
        self.frames.fetch_add((output.len() / channels) as u64, Ordering::AcqRel);
    }
}

/// Maps a source frame onto the output frame. Mono sources feed every output
/// channel; a mono output gets the average of the source channels.
fn mix_frame(output: &mut [f32], source: &[f32], gain: f32) {
    if source.len() == 1 {
        for sample in output.iter_mut() {
            *sample += source[0] * gain;
        }
    } else if output.len() == 1 {
        output[0] += source.iter().sum::<f32>() / source.len() as f32 * gain;
    } else {
        for (out, value) in output.iter_mut().zip(source) {
            *out += value * gain;
        }
    }
}
