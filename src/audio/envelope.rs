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

//! Per-voice gain automation. All times are seconds on the output clock.

/// Linear fade-in length.
pub const FADE_IN: f64 = 0.01;
/// Shortest playable window.
pub const MIN_WINDOW: f64 = 0.05;
/// Shortest fade-out at the end of a window.
pub const MIN_FADE_OUT: f64 = 0.06;
/// The fade-out never starts earlier than this after the start.
const MIN_FADE_OUT_START: f64 = 0.02;
/// How long the source keeps running after the envelope reaches zero.
pub const STOP_TAIL: f64 = 0.03;

/// Shortest fade accepted by a release.
pub const MIN_RELEASE_FADE: f64 = 0.02;
/// Fade used when a release is given a non-finite fade.
pub const DEFAULT_RELEASE_FADE: f64 = 0.06;
/// How long after the fade a released voice is hard stopped.
const RELEASE_TAIL: f64 = 0.02;

/// An exponential decay that overrides the scheduled envelope from `at` onwards.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Release {
    at: f64,
    from: f32,
    time_constant: f64,
}

/// Fade-in, sustain, fade-out envelope with an optional release.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    start: f64,
    peak: f32,
    fade_in_end: f64,
    fade_out_start: f64,
    end: f64,
    release: Option<Release>,
}

impl Envelope {
    /// An envelope that plays `gain` from `start` and reaches zero exactly at
    /// `start + duration`.
    pub fn windowed(start: f64, duration: f64, fade_out: f64, gain: f32) -> Envelope {
        let peak = if gain.is_finite() { gain.max(0.0) } else { 1.0 };
        let end = start + duration.max(MIN_WINDOW);
        let fade_out = if fade_out.is_finite() { fade_out } else { 0.0 };
        Envelope {
            start,
            peak,
            fade_in_end: start + FADE_IN,
            fade_out_start: (start + MIN_FADE_OUT_START).max(end - fade_out.max(MIN_FADE_OUT)),
            end,
            release: None,
        }
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn peak(&self) -> f32 {
        self.peak
    }

    /// When the source should be stopped if nothing releases it first.
    pub fn natural_stop(&self) -> f64 {
        self.end + STOP_TAIL
    }

    /// Gain at time `t`.
    pub fn gain_at(&self, t: f64) -> f32 {
        match self.release {
            Some(release) if t >= release.at => {
                let elapsed = t - release.at;
                release.from * (-elapsed / release.time_constant).exp() as f32
            }
            _ => self.scheduled_gain_at(t),
        }
    }

    fn scheduled_gain_at(&self, t: f64) -> f32 {
        if t < self.start || t >= self.end {
            0.0
        } else if t < self.fade_in_end {
            self.peak * ((t - self.start) / (self.fade_in_end - self.start)) as f32
        } else if t < self.fade_out_start {
            self.peak
        } else {
            self.peak * ((self.end - t) / (self.end - self.fade_out_start)) as f32
        }
    }

    /// Replaces everything scheduled after `at` with a decay toward zero.
    /// Returns the time at which the source should be hard stopped.
    pub fn release(&mut self, at: f64, fade: f64) -> f64 {
        let fade = if fade.is_finite() {
            fade.max(MIN_RELEASE_FADE)
        } else {
            DEFAULT_RELEASE_FADE
        };
        let from = self.gain_at(at);
        self.release = Some(Release {
            at,
            from,
            time_constant: fade / 6.0,
        });
        (at + fade).max(self.start + 0.001) + RELEASE_TAIL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_windowed_shape() {
        let envelope = Envelope::windowed(1.0, 4.6, 0.12, 0.25);

        assert_eq!(envelope.gain_at(0.5), 0.0);
        assert_eq!(envelope.gain_at(1.0), 0.0);
        assert!((envelope.gain_at(1.005) - 0.125).abs() < EPSILON);
        assert!((envelope.gain_at(1.01) - 0.25).abs() < EPSILON);
        assert!((envelope.gain_at(3.0) - 0.25).abs() < EPSILON);
        assert!((envelope.gain_at(5.48) - 0.25).abs() < EPSILON);
        assert!((envelope.gain_at(5.54) - 0.125).abs() < 1e-3);
        assert_eq!(envelope.gain_at(5.6), 0.0);
        assert_eq!(envelope.gain_at(6.0), 0.0);
        assert!((envelope.natural_stop() - 5.63).abs() < 1e-9);
    }

    #[test]
    fn test_short_windows_are_clamped() {
        let envelope = Envelope::windowed(0.0, 0.0, 0.0, 1.0);
        assert!((envelope.end() - MIN_WINDOW).abs() < 1e-9);
        // Fade-out never starts before 20ms.
        assert!((envelope.gain_at(0.015) - 1.0).abs() < EPSILON);
        assert!(envelope.gain_at(0.04) < 1.0);
    }

    #[test]
    fn test_bad_gain_is_sanitized() {
        assert_eq!(Envelope::windowed(0.0, 1.0, 0.1, -2.0).peak(), 0.0);
        assert_eq!(Envelope::windowed(0.0, 1.0, 0.1, f32::NAN).peak(), 1.0);
    }

    #[test]
    fn test_release_decays_from_current_value() {
        let mut envelope = Envelope::windowed(0.0, 4.6, 0.12, 0.5);
        let stop = envelope.release(2.0, 0.04);

        assert!((envelope.gain_at(2.0) - 0.5).abs() < EPSILON);
        // Six time constants into the fade is below 0.3% of the start.
        assert!(envelope.gain_at(2.04) < 0.5 * 0.003);
        assert!((stop - 2.06).abs() < 1e-9);
    }

    #[test]
    fn test_release_before_start() {
        let mut envelope = Envelope::windowed(1.0, 4.6, 0.12, 0.5);
        let stop = envelope.release(0.5, 0.0);

        assert_eq!(envelope.gain_at(1.5), 0.0);
        // The fade is clamped to 20ms, and the stop lands after the voice start.
        assert!((stop - (1.001 + 0.02)).abs() < 1e-9);
    }
}
