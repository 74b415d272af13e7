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
use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{crate_version, Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::info;

use triadquiz::audio::{self, AudioEngine, EngineSettings};
use triadquiz::chord::Pitch;
use triadquiz::config::Settings;
use triadquiz::round::{RoundMachine, RoundSettings};
use triadquiz::samples::{self, SampleStore};
use triadquiz::shell;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "Ear training with sampled major and minor triads."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs the quiz in the terminal.
    Play {
        /// The path to the configuration file.
        #[arg[short, long]]
        config: Option<PathBuf>,
        /// The audio device to play through. Overrides the configuration.
        #[arg[short, long]]
        device: Option<String>,
        /// The directory holding the samples. Overrides the configuration.
        #[arg[short, long]]
        samples: Option<PathBuf>,
    },
    /// Lists the available audio output devices.
    Devices {},
    /// Checks that every sample the configured register needs loads.
    Verify {
        /// The path to the configuration file.
        #[arg[short, long]]
        config: Option<PathBuf>,
        /// The directory holding the samples. Overrides the configuration.
        #[arg[short, long]]
        samples: Option<PathBuf>,
    },
}

fn load_settings(
    config: Option<PathBuf>,
    device: Option<String>,
    samples: Option<PathBuf>,
) -> Result<Settings, Box<dyn Error>> {
    let mut settings = match config {
        Some(path) => Settings::load(&path)?,
        None => Settings::default(),
    };
    if let Some(device) = device {
        settings.audio_mut().set_device(&device);
    }
    if let Some(samples) = samples {
        settings.samples_mut().set_directory(&samples);
    }
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play {
            config,
            device,
            samples,
        } => {
            let settings = load_settings(config, device, samples)?;
            let bounds = settings.quiz().register_bounds()?;
            let store = Arc::new(SampleStore::from_config(settings.samples()));
            let engine = Arc::new(AudioEngine::new(
                audio::get_device(settings.audio()),
                store,
                EngineSettings::from_config(settings.audio(), settings.quiz())?,
            ));

            // An unusable output ends the session before the quiz starts.
            engine.ensure_graph()?;

            let machine = RoundMachine::new(
                engine.clone(),
                bounds,
                RoundSettings::from_config(settings.quiz())?,
            );
            let (commands_tx, commands_rx) = mpsc::channel(8);
            let reader = shell::read_stdin(commands_tx);
            shell::run(machine, commands_rx, io::stdout()).await?;

            info!(store = ?engine.store(), "Session finished.");
            engine.dispose();
            reader.await??;
        }
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Verify { config, samples } => {
            let settings = load_settings(config, None, samples)?;
            let bounds = settings.quiz().register_bounds()?;
            let store = Arc::new(SampleStore::from_config(settings.samples()));
            let pitches: Vec<Pitch> = bounds.playable_pitches().collect();

            let missing = samples::verify(&store, &pitches).await;
            if missing.is_empty() {
                println!(
                    "All {} samples for {}..={} loaded ({} KB).",
                    pitches.len(),
                    bounds.low_root(),
                    bounds.high_root(),
                    store.total_memory_usage() / 1024
                );
                return Ok(());
            }

            println!("Unavailable samples (count: {}):", missing.len());
            for error in missing.iter() {
                println!("- {}", error);
            }
            return Err(format!(
                "{} of {} samples are unavailable",
                missing.len(),
                pitches.len()
            )
            .into());
        }
    }

    Ok(())
}
