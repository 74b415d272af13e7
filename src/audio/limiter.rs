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

/// Hard-knee limiter settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimiterSettings {
    pub threshold_db: f32,
    pub ratio: f32,
    pub attack: Duration,
    pub release: Duration,
}

impl Default for LimiterSettings {
    fn default() -> Self {
        LimiterSettings {
            threshold_db: -6.0,
            ratio: 20.0,
            attack: Duration::from_millis(1),
            release: Duration::from_millis(120),
        }
    }
}

/// A feed-forward peak limiter operating on interleaved frames. All channels
/// share one gain reduction so the stereo image does not shift.
#[derive(Debug)]
pub struct Limiter {
    threshold_db: f32,
    slope: f32,
    attack_coeff: f32,
    release_coeff: f32,
    /// Current gain reduction in dB, always >= 0.
    reduction_db: f32,
}

impl Limiter {
    pub fn new(settings: LimiterSettings, sample_rate: u32) -> Limiter {
        let coeff = |time: Duration| -> f32 {
            let samples = time.as_secs_f32() * sample_rate as f32;
            if samples <= 0.0 {
                0.0
            } else {
                (-1.0 / samples).exp()
            }
        };
        Limiter {
            threshold_db: settings.threshold_db,
            slope: 1.0 - 1.0 / settings.ratio.max(1.0),
            attack_coeff: coeff(settings.attack),
            release_coeff: coeff(settings.release),
            reduction_db: 0.0,
        }
    }

    /// Applies gain reduction to one frame in place.
    pub fn process(&mut self, frame: &mut [f32]) {
        let peak = frame.iter().fold(0.0f32, |peak, s| peak.max(s.abs()));
        let level_db = if peak > 0.0 {
            20.0 * peak.log10()
        } else {
            f32::NEG_INFINITY
        };
        let target = (level_db - self.threshold_db).max(0.0) * self.slope;

        let coeff = if target > self.reduction_db {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.reduction_db = target + coeff * (self.reduction_db - target);

        if self.reduction_db > 0.0 {
            let gain = 10f32.powf(-self.reduction_db / 20.0);
            for sample in frame.iter_mut() {
                *sample *= gain;
            }
        }
    }

    pub fn reduction_db(&self) -> f32 {
        self.reduction_db
    }
}
