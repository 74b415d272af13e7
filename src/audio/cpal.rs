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
use std::{error::Error, fmt, sync::Arc, thread};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Sender;
use tracing::{error, info, span, Level};

use super::{Device as AudioDevice, GraphSettings, Mixer, OutputGraph, OutputStream};

/// Name that selects the default output device of the default host.
const DEFAULT_DEVICE: &str = "default";

/// A cpal output device, looked up by name when it is opened.
pub struct Device {
    /// The name of the device.
    name: String,
    /// Description shown when listing, if known.
    description: Option<String>,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(description) => write!(f, "{} ({})", self.name, description),
            None => write!(f, "{}", self.name),
        }
    }
}

impl Device {
    /// Lists cpal output devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn AudioDevice>>, Box<dyn Error>> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.output_devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let Ok(config) = device.default_output_config() else {
                    continue;
                };
                devices.push(Device {
                    name: device.name()?,
                    description: Some(format!(
                        "Channels={}, Rate={}, {}",
                        config.channels(),
                        config.sample_rate().0,
                        host_id.name()
                    )),
                });
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices
            .into_iter()
            .map(|device| {
                let device: Box<dyn AudioDevice> = Box::new(device);
                device
            })
            .collect())
    }

    /// Gets the given cpal device. Nothing is opened until the engine needs output.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            description: None,
        }
    }

    fn find(&self) -> Result<cpal::Device, Box<dyn Error>> {
        let host = cpal::default_host();
        if self.name == DEFAULT_DEVICE {
            return host
                .default_output_device()
                .ok_or_else(|| "no default output device".into());
        }

        let _shh_stderr = shh::stderr()?;
        for device in host.output_devices()? {
            if device.name()?.trim() == self.name {
                return Ok(device);
            }
        }
        Err(format!("no device found with name {}", self.name).into())
    }
}

impl AudioDevice for Device {
    fn open(&self, settings: &GraphSettings) -> Result<OutputGraph, Box<dyn Error>> {
        let span = span!(Level::INFO, "open output (cpal)");
        let _enter = span.enter();

        let device = self.find()?;
        let supported = device.default_output_config()?;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();

        let mixer = Arc::new(Mixer::new(
            config.channels,
            config.sample_rate.0,
            settings.master_gain,
            settings.limiter,
        ));

        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), String>>(1);
        let (close_tx, close_rx) = crossbeam_channel::bounded::<()>(1);
        let thread_mixer = mixer.clone();

        // cpal streams are not Send, so the stream lives and dies on its own thread.
        let thread = thread::spawn(move || {
            let stream = match sample_format {
                cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, thread_mixer),
                cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, thread_mixer),
                cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, thread_mixer),
                other => Err(format!("unsupported sample format {:?}", other)),
            };
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(e.to_string()));
                return;
            }
            let _ = ready_tx.send(Ok(()));

            // Blocks until the graph is closed or dropped.
            let _ = close_rx.recv();
            drop(stream);
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e.into());
            }
            Err(_) => {
                let _ = thread.join();
                return Err("output thread exited before the stream started".into());
            }
        }

        info!(
            device = self.name,
            channels = mixer.num_channels(),
            sample_rate = mixer.sample_rate(),
            "Output stream started."
        );

        Ok(OutputGraph::new(
            mixer,
            Box::new(Stream {
                close_tx: Some(close_tx),
                thread: Some(thread),
            }),
        ))
    }
}

/// Builds a stream that pulls from the mixer, converting from f32 where needed.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mixer: Arc<Mixer>,
) -> Result<cpal::Stream, String>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut scratch: Vec<f32> = Vec::new();
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                scratch.resize(data.len(), 0.0);
                mixer.render(&mut scratch);
                for (dst, src) in data.iter_mut().zip(scratch.iter()) {
                    *dst = T::from_sample(*src);
                }
            },
            |err| error!(err = err.to_string(), "CPAL output stream error"),
            None,
        )
        .map_err(|e| e.to_string())
}

struct Stream {
    close_tx: Option<Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl OutputStream for Stream {
    fn close(&mut self) {
        if let Some(close_tx) = self.close_tx.take() {
            let _ = close_tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Output thread panicked");
            }
        }
    }
}
