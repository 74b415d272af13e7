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
use std::{
    error::Error,
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;
use tracing::info;

use super::{GraphSettings, Mixer, OutputGraph, OutputStream};

const MOCK_SAMPLE_RATE: u32 = 44100;
const MOCK_CHANNELS: u16 = 2;

/// Device name that fails to open, for exercising the unsupported path.
pub const UNSUPPORTED: &str = "mock-unsupported";

/// A mock device. Doesn't play anything; the clock only moves when
/// [`Device::render`] is called.
#[derive(Clone)]
pub struct Device {
    name: String,
    opens: Arc<AtomicUsize>,
    mixer: Arc<Mutex<Option<Arc<Mixer>>>>,
    closed: Arc<AtomicBool>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            opens: Arc::new(AtomicUsize::new(0)),
            mixer: Arc::new(Mutex::new(None)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Number of times open was attempted.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::Relaxed)
    }

    /// The mixer of the most recently opened graph.
    pub fn mixer(&self) -> Option<Arc<Mixer>> {
        self.mixer.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    /// Pulls `frames` frames through the mixer, as a device callback would.
    pub fn render(&self, frames: usize) -> Vec<f32> {
        let mut output = vec![0.0f32; frames * MOCK_CHANNELS as usize];
        if let Some(mixer) = self.mixer() {
            mixer.render(&mut output);
        }
        output
    }
}

struct Stream {
    closed: Arc<AtomicBool>,
}

impl OutputStream for Stream {
    fn close(&mut self) {
        self.closed.store(true, Ordering::Relaxed);
    }
}

impl super::Device for Device {
    fn open(&self, settings: &GraphSettings) -> Result<OutputGraph, Box<dyn Error>> {
        self.opens.fetch_add(1, Ordering::Relaxed);
        if self.name == UNSUPPORTED {
            return Err(format!("{} has no audio output", self.name).into());
        }

        info!(device = self.name, "Opening mock output.");
        let mixer = Arc::new(Mixer::new(
            MOCK_CHANNELS,
            MOCK_SAMPLE_RATE,
            settings.master_gain,
            settings.limiter,
        ));
        *self.mixer.lock() = Some(mixer.clone());
        self.closed.store(false, Ordering::Relaxed);

        Ok(OutputGraph::new(
            mixer,
            Box::new(Stream {
                closed: self.closed.clone(),
            }),
        ))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
