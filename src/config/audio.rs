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
use serde::Deserialize;

use super::{parse_duration, ConfigError};
use crate::audio::LimiterSettings;

const DEFAULT_DEVICE: &str = "default";
const DEFAULT_MASTER_GAIN: f32 = 0.9;
const DEFAULT_CHORD_GAIN: f32 = 0.75;

fn default_device() -> String {
    DEFAULT_DEVICE.to_string()
}

/// A YAML representation of the audio configuration.
#[derive(Deserialize, Clone)]
pub struct Audio {
    /// The audio device. "default" picks the host's default output.
    #[serde(default = "default_device")]
    device: String,

    /// Gain applied to the whole mix before the limiter (default: 0.9).
    master_gain: Option<f32>,

    /// Total gain of a chord, split between its voices (default: 0.75).
    chord_gain: Option<f32>,

    /// Output limiter settings.
    limiter: Option<Limiter>,
}

impl Default for Audio {
    fn default() -> Self {
        Audio::new(DEFAULT_DEVICE)
    }
}

impl Audio {
    /// New will create a new Audio configuration.
    pub fn new(device: &str) -> Audio {
        Audio {
            device: device.to_string(),
            master_gain: None,
            chord_gain: None,
            limiter: None,
        }
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn set_device(&mut self, device: &str) {
        self.device = device.to_string();
    }

    pub fn master_gain(&self) -> f32 {
        self.master_gain.unwrap_or(DEFAULT_MASTER_GAIN)
    }

    pub fn chord_gain(&self) -> f32 {
        self.chord_gain.unwrap_or(DEFAULT_CHORD_GAIN)
    }

    /// Returns the limiter settings, with defaults for anything unset.
    pub fn limiter(&self) -> Result<LimiterSettings, ConfigError> {
        match &self.limiter {
            Some(limiter) => limiter.settings(),
            None => Ok(LimiterSettings::default()),
        }
    }
}

/// Limiter settings. Attack and release are duration strings.
#[derive(Deserialize, Clone, Default)]
pub struct Limiter {
    threshold_db: Option<f32>,
    ratio: Option<f32>,
    attack: Option<String>,
    release: Option<String>,
}

impl Limiter {
    fn settings(&self) -> Result<LimiterSettings, ConfigError> {
        let defaults = LimiterSettings::default();
        let ratio = self.ratio.unwrap_or(defaults.ratio);
        if ratio < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "limiter ratio must be at least 1, got {}",
                ratio
            )));
        }

        Ok(LimiterSettings {
            threshold_db: self.threshold_db.unwrap_or(defaults.threshold_db),
            ratio,
            attack: parse_duration("limiter.attack", &self.attack, defaults.attack)?,
            release: parse_duration("limiter.release", &self.release, defaults.release)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use config::{Config, File, FileFormat};

    use super::*;

    fn parse(yaml: &str) -> Audio {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let audio = parse("device: mock-device");
        assert_eq!(audio.device(), "mock-device");
        assert_eq!(audio.master_gain(), 0.9);
        assert_eq!(audio.chord_gain(), 0.75);
        assert_eq!(audio.limiter().unwrap(), LimiterSettings::default());
    }

    #[test]
    fn test_limiter() {
        let audio = parse(
            r#"
            device: default
            chord_gain: 0.6
            limiter:
              threshold_db: -3.0
              release: 250ms
            "#,
        );
        assert_eq!(audio.chord_gain(), 0.6);
        let limiter = audio.limiter().unwrap();
        assert_eq!(limiter.threshold_db, -3.0);
        assert_eq!(limiter.ratio, 20.0);
        assert_eq!(limiter.attack, Duration::from_millis(1));
        assert_eq!(limiter.release, Duration::from_millis(250));
    }

    #[test]
    fn test_invalid_limiter() {
        let audio = parse(
            r#"
            limiter:
              ratio: 0.5
            "#,
        );
        assert!(matches!(audio.limiter(), Err(ConfigError::Invalid(_))));

        let audio = parse(
            r#"
            limiter:
              attack: fast
            "#,
        );
        assert!(matches!(
            audio.limiter(),
            Err(ConfigError::Duration {
                field: "limiter.attack",
                ..
            })
        ));
    }
}
