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
use std::fmt;

/// Score counters for a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreState {
    pub asked: u32,
    pub correct: u32,
    pub streak: u32,
    pub longest_streak: u32,
}

impl ScoreState {
    pub fn wrong(&self) -> u32 {
        self.asked - self.correct
    }

    /// Accuracy rounded to one decimal place, or 0 before any answers.
    pub fn accuracy_percent(&self) -> f64 {
        if self.asked == 0 {
            return 0.0;
        }
        (f64::from(self.correct) / f64::from(self.asked) * 1000.0).round() / 10.0
    }
}

impl fmt::Display for ScoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Correct: {} | Wrong: {} | Streak: {} | Best: {} | Total: {} | Accuracy: {:.1}%",
            self.correct,
            self.wrong(),
            self.streak,
            self.longest_streak,
            self.asked,
            self.accuracy_percent()
        )
    }
}

/// What a single resolution did to the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// The streak before this answer was applied.
    pub previous_streak: u32,
    /// True when this answer broke a streak as long as the longest one.
    pub ended_best: bool,
    pub score: ScoreState,
}

/// Reduces answer events into a [`ScoreState`].
#[derive(Debug, Default)]
pub struct ScoreTracker {
    state: ScoreState,
}

impl ScoreTracker {
    pub fn new() -> ScoreTracker {
        ScoreTracker::default()
    }

    pub fn record(&mut self, correct: bool) -> Resolution {
        let previous_streak = self.state.streak;

        self.state.asked += 1;
        if correct {
            self.state.correct += 1;
            self.state.streak += 1;
            self.state.longest_streak = self.state.longest_streak.max(self.state.streak);
        } else {
            self.state.streak = 0;
        }

        Resolution {
            previous_streak,
            ended_best: !correct
                && previous_streak > 0
                && previous_streak == self.state.longest_streak,
            score: self.state,
        }
    }

    pub fn reset(&mut self) {
        self.state = ScoreState::default();
    }

    pub fn state(&self) -> ScoreState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_then_incorrect() {
        let mut tracker = ScoreTracker::new();
        tracker.record(true);
        let resolution = tracker.record(false);

        assert_eq!(
            tracker.state(),
            ScoreState {
                asked: 2,
                correct: 1,
                streak: 0,
                longest_streak: 1,
            }
        );
        assert_eq!(resolution.previous_streak, 1);
        assert!(resolution.ended_best);
        assert_eq!(tracker.state().accuracy_percent(), 50.0);
        assert_eq!(tracker.state().wrong(), 1);
    }

    #[test]
    fn test_longest_streak_survives_reset_of_streak() {
        let mut tracker = ScoreTracker::new();
        for _ in 0..3 {
            tracker.record(true);
        }
        tracker.record(false);
        let resolution = tracker.record(true);

        assert_eq!(resolution.score.streak, 1);
        assert_eq!(resolution.score.longest_streak, 3);
        assert!(!resolution.ended_best);
    }

    #[test]
    fn test_best_reported_when_streak_ends() {
        let mut tracker = ScoreTracker::new();
        assert!(!tracker.record(true).ended_best);
        assert!(!tracker.record(true).ended_best);
        assert!(tracker.record(false).ended_best);

        // A shorter streak ending is not a best.
        tracker.record(true);
        assert!(!tracker.record(false).ended_best);

        // A miss with no streak is not a best either.
        assert!(!tracker.record(false).ended_best);
    }

    #[test]
    fn test_accuracy_rounding() {
        assert_eq!(ScoreState::default().accuracy_percent(), 0.0);

        let mut tracker = ScoreTracker::new();
        tracker.record(true);
        tracker.record(false);
        tracker.record(false);
        assert_eq!(tracker.state().accuracy_percent(), 33.3);

        tracker.record(true);
        tracker.record(true);
        tracker.record(true);
        // 4 of 6
        assert_eq!(tracker.state().accuracy_percent(), 66.7);
    }

    #[test]
    fn test_reset() {
        let mut tracker = ScoreTracker::new();
        tracker.record(true);
        tracker.reset();
        assert_eq!(tracker.state(), ScoreState::default());
    }
}
