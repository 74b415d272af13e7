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
use std::path::Path;
use std::time::Duration;

use config::{Config, File};
use duration_string::DurationString;
use serde::Deserialize;

mod audio;
mod error;
mod quiz;
mod samples;

pub use self::audio::{Audio, Limiter};
pub use self::error::ConfigError;
pub use self::quiz::Quiz;
pub use self::samples::Samples;

/// The top level configuration file.
#[derive(Deserialize, Clone, Default)]
pub struct Settings {
    /// Output device and mix settings.
    #[serde(default)]
    audio: Audio,
    /// Where the chord samples live.
    #[serde(default)]
    samples: Samples,
    /// Register and timing of the quiz.
    #[serde(default)]
    quiz: Quiz,
}

impl Settings {
    /// Parse settings from a YAML file.
    pub fn load(path: &Path) -> Result<Settings, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Settings>()?)
    }

    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    pub fn audio_mut(&mut self) -> &mut Audio {
        &mut self.audio
    }

    pub fn samples(&self) -> &Samples {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut Samples {
        &mut self.samples
    }

    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }
}

/// Parses an optional duration string, falling back to the default.
fn parse_duration(
    field: &'static str,
    value: &Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match value {
        Some(value) => DurationString::from_string(value.clone())
            .map(Duration::from)
            .map_err(|e| ConfigError::Duration {
                field,
                value: value.clone(),
                reason: e.to_string(),
            }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use config::FileFormat;

    use super::*;

    #[test]
    fn test_empty_settings_use_defaults() {
        let settings: Settings = Config::builder()
            .add_source(File::from_str("{}", FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.audio().device(), "default");
        assert_eq!(settings.samples().directory(), Path::new("audio"));
        assert_eq!(settings.samples().extension(), "mp3");
        assert_eq!(
            settings.quiz().pre_roll().unwrap(),
            Duration::from_millis(350)
        );
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("triadquiz.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"
audio:
  device: mock-device
  master_gain: 0.5
samples:
  directory: /srv/piano
  extension: wav
  retry_missing: true
quiz:
  root_range: easy-1oct
  pre_roll: 500ms
"#
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.audio().device(), "mock-device");
        assert_eq!(settings.audio().master_gain(), 0.5);
        assert_eq!(settings.samples().directory(), Path::new("/srv/piano"));
        assert_eq!(settings.samples().extension(), "wav");
        assert!(settings.samples().retry_missing());
        assert_eq!(
            settings.quiz().pre_roll().unwrap(),
            Duration::from_millis(500)
        );
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Settings::load(&dir.path().join("nope.yaml")),
            Err(ConfigError::Load(_))
        ));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(
            parse_duration("fade_out", &Some("120ms".to_string()), Duration::ZERO).unwrap(),
            Duration::from_millis(120)
        );
        assert_eq!(
            parse_duration("fade_out", &None, Duration::from_secs(1)).unwrap(),
            Duration::from_secs(1)
        );
        let err = parse_duration("fade_out", &Some("soon".to_string()), Duration::ZERO)
            .unwrap_err();
        assert!(err.to_string().contains("fade_out"), "{}", err);
    }
}
