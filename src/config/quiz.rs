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
use std::time::Duration;

use serde::Deserialize;

use super::{parse_duration, ConfigError};
use crate::chord::{Pitch, RegisterBounds, RootRange};

const DEFAULT_PRE_ROLL: Duration = Duration::from_millis(350);
const DEFAULT_CHORD_LENGTH: Duration = Duration::from_millis(4600);
const DEFAULT_FADE_OUT: Duration = Duration::from_millis(120);
const DEFAULT_STOP_FADE: Duration = Duration::from_millis(40);
const DEFAULT_SCHEDULE_LEAD: Duration = Duration::from_millis(20);

/// Register and timing of the quiz.
#[derive(Deserialize, Clone, Default)]
pub struct Quiz {
    /// Named register preset (default: hard-3oct).
    root_range: Option<RootRange>,

    /// Explicit lowest root pitch. Overrides root_range with high_root.
    low_root: Option<i32>,

    /// Explicit highest root pitch.
    high_root: Option<i32>,

    /// Delay before a new round's chord plays.
    pre_roll: Option<String>,

    /// How long a chord sounds.
    chord_length: Option<String>,

    /// Fade at the end of a chord.
    fade_out: Option<String>,

    /// Fade used to cut off a chord that is still sounding.
    stop_fade: Option<String>,

    /// Scheduling lead between "now" and a chord's start.
    schedule_lead: Option<String>,
}

impl Quiz {
    /// Returns the register roots are drawn from.
    pub fn register_bounds(&self) -> Result<RegisterBounds, ConfigError> {
        match (self.low_root, self.high_root) {
            (Some(low), Some(high)) => Ok(RegisterBounds::new(Pitch::new(low), Pitch::new(high))?),
            (None, None) => Ok(self.root_range.unwrap_or_default().bounds()),
            _ => Err(ConfigError::Invalid(
                "low_root and high_root must be set together".to_string(),
            )),
        }
    }

    pub fn pre_roll(&self) -> Result<Duration, ConfigError> {
        parse_duration("quiz.pre_roll", &self.pre_roll, DEFAULT_PRE_ROLL)
    }

    pub fn chord_length(&self) -> Result<Duration, ConfigError> {
        parse_duration("quiz.chord_length", &self.chord_length, DEFAULT_CHORD_LENGTH)
    }

    pub fn fade_out(&self) -> Result<Duration, ConfigError> {
        parse_duration("quiz.fade_out", &self.fade_out, DEFAULT_FADE_OUT)
    }

    pub fn stop_fade(&self) -> Result<Duration, ConfigError> {
        parse_duration("quiz.stop_fade", &self.stop_fade, DEFAULT_STOP_FADE)
    }

    pub fn schedule_lead(&self) -> Result<Duration, ConfigError> {
        parse_duration("quiz.schedule_lead", &self.schedule_lead, DEFAULT_SCHEDULE_LEAD)
    }
}
