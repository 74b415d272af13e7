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
use std::{error::Error, fmt, sync::Arc};

use parking_lot::Mutex;

use crate::config;
use crate::samples::SampleError;

pub mod cpal;
pub mod engine;
pub mod envelope;
pub mod limiter;
pub mod mixer;
pub mod mock;
pub mod voice;

pub use engine::{AudioEngine, ChordTiming, EngineSettings};
pub use limiter::LimiterSettings;
pub use mixer::Mixer;

/// Errors surfaced by the audio engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AudioError {
    #[error("Audio output is unavailable: {0}")]
    UnsupportedDevice(String),

    #[error("Audio engine has been disposed")]
    Disposed,

    #[error(transparent)]
    Sample(#[from] SampleError),
}

/// Settings for building an output graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphSettings {
    pub master_gain: f32,
    pub limiter: LimiterSettings,
}

impl Default for GraphSettings {
    fn default() -> Self {
        GraphSettings {
            master_gain: 0.9,
            limiter: LimiterSettings::default(),
        }
    }
}

/// A running output stream.
pub trait OutputStream: Send {
    /// Stops the stream. Must be safe to call more than once.
    fn close(&mut self);
}

/// A mixer together with the stream that pulls from it.
pub struct OutputGraph {
    mixer: Arc<Mixer>,
    stream: Mutex<Option<Box<dyn OutputStream>>>,
}

impl OutputGraph {
    pub fn new(mixer: Arc<Mixer>, stream: Box<dyn OutputStream>) -> OutputGraph {
        OutputGraph {
            mixer,
            stream: Mutex::new(Some(stream)),
        }
    }

    pub fn mixer(&self) -> &Arc<Mixer> {
        &self.mixer
    }

    pub fn close(&self) {
        if let Some(mut stream) = self.stream.lock().take() {
            stream.close();
        }
    }
}

impl Drop for OutputGraph {
    fn drop(&mut self) {
        self.close();
    }
}

/// An audio output device.
pub trait Device: fmt::Display + Send + Sync {
    /// Opens the device and returns a graph whose mixer starts suspended.
    fn open(&self, settings: &GraphSettings) -> Result<OutputGraph, Box<dyn Error>>;
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, Box<dyn Error>> {
    cpal::Device::list()
}

/// Gets a device with the given configuration. Devices are not opened until
/// the engine first needs them.
pub fn get_device(config: &config::Audio) -> Arc<dyn Device> {
    let device = config.device();
    if device.starts_with("mock") {
        return Arc::new(mock::Device::get(device));
    };

    Arc::new(cpal::Device::get(device))
}
