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

//! The round state machine.
//!
//! A round moves Idle -> Listening -> AwaitingAnswer -> AwaitingNext. Every
//! playback request gets a new token; a playback only opens the answer gate if
//! its token is still current when it completes.

use std::{fmt, future::Future, sync::Arc, time::Duration};

use parking_lot::Mutex;
use rand::{rngs::StdRng, SeedableRng};
use tokio::sync::broadcast;
use tracing::{debug, info, span, warn, Instrument, Level};

use crate::audio::AudioError;
use crate::chord::{random_chord, Chord, Quality, RegisterBounds};
use crate::config::{self, ConfigError};
use crate::score::{ScoreState, ScoreTracker};

/// Something that can play a chord.
pub trait Playback: Send + Sync + 'static {
    /// Plays the chord, resolving once it has been scheduled.
    fn play_chord(&self, chord: Chord) -> impl Future<Output = Result<(), AudioError>> + Send;

    /// Fades out everything that is sounding.
    fn stop_all(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    Idle,
    Listening,
    AwaitingAnswer,
    AwaitingNext,
}

impl RoundState {
    pub fn can_answer(&self) -> bool {
        *self == RoundState::AwaitingAnswer
    }

    pub fn can_replay(&self) -> bool {
        *self != RoundState::Idle
    }

    pub fn can_next(&self) -> bool {
        *self == RoundState::AwaitingNext
    }
}

impl fmt::Display for RoundState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RoundState::Idle => "idle",
            RoundState::Listening => "listening",
            RoundState::AwaitingAnswer => "awaiting answer",
            RoundState::AwaitingNext => "awaiting next",
        };
        write!(f, "{}", label)
    }
}

/// The result of answering a round.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerOutcome {
    pub correct: bool,
    pub expected: Quality,
    pub chosen: Quality,
    pub root_name: String,
    pub notes_label: String,
    /// The streak before this answer, reported when an answer breaks it.
    pub previous_streak: u32,
    /// The broken streak matched the longest of the session.
    pub ended_best: bool,
    pub score: ScoreState,
}

/// Events published to observers of the machine.
#[derive(Debug, Clone)]
pub enum RoundEvent {
    RoundStarted { root_name: String },
    AnswerGateOpened,
    Answered(AnswerOutcome),
    PlaybackFailed(AudioError),
}

/// A point-in-time view of the machine.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundSnapshot {
    pub state: RoundState,
    pub root_name: Option<String>,
    pub last_outcome: Option<AnswerOutcome>,
    pub last_error: Option<String>,
    pub score: ScoreState,
    pub token: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundSettings {
    /// Delay between starting a round and playing its chord.
    pub pre_roll: Duration,
}

impl Default for RoundSettings {
    fn default() -> Self {
        RoundSettings {
            pre_roll: Duration::from_millis(350),
        }
    }
}

impl RoundSettings {
    pub fn from_config(quiz: &config::Quiz) -> Result<RoundSettings, ConfigError> {
        Ok(RoundSettings {
            pre_roll: quiz.pre_roll()?,
        })
    }
}

const EVENT_CAPACITY: usize = 32;

struct Round {
    state: RoundState,
    chord: Option<Chord>,
    token: u64,
    score: ScoreTracker,
    last_outcome: Option<AnswerOutcome>,
    last_error: Option<String>,
    bounds: RegisterBounds,
    rng: StdRng,
}

impl Round {
    fn issue_token(&mut self) -> u64 {
        self.token += 1;
        self.token
    }

    /// Draws a chord and enters Listening. Returns the play token.
    fn start(&mut self) -> (u64, Chord) {
        let chord = random_chord(&mut self.rng, &self.bounds);
        self.chord = Some(chord.clone());
        self.state = RoundState::Listening;
        self.last_outcome = None;
        self.last_error = None;
        (self.issue_token(), chord)
    }
}

struct Shared<P> {
    playback: Arc<P>,
    settings: RoundSettings,
    round: Mutex<Round>,
    events: broadcast::Sender<RoundEvent>,
}

impl<P: Playback> Shared<P> {
    fn publish(&self, event: RoundEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn is_current(&self, token: u64) -> bool {
        self.round.lock().token == token
    }

    fn complete(&self, token: u64, result: Result<(), AudioError>) {
        let mut round = self.round.lock();
        if round.token != token {
            debug!(token, current = round.token, "Ignoring stale playback.");
            return;
        }

        match result {
            Ok(()) => {
                round.last_error = None;
                if round.state == RoundState::Listening {
                    round.state = RoundState::AwaitingAnswer;
                    drop(round);
                    info!(token, "Answer gate opened.");
                    self.publish(RoundEvent::AnswerGateOpened);
                }
            }
            Err(e) => {
                round.last_error = Some(e.to_string());
                drop(round);
                warn!(token, error = %e, "Playback failed.");
                self.publish(RoundEvent::PlaybackFailed(e));
            }
        }
    }
}

/// Drives rounds of the quiz. Cheap to clone; clones share the same round.
pub struct RoundMachine<P> {
    shared: Arc<Shared<P>>,
}

impl<P> Clone for RoundMachine<P> {
    fn clone(&self) -> Self {
        RoundMachine {
            shared: self.shared.clone(),
        }
    }
}

impl<P: Playback> RoundMachine<P> {
    pub fn new(playback: Arc<P>, bounds: RegisterBounds, settings: RoundSettings) -> Self {
        Self::with_rng(playback, bounds, settings, StdRng::from_entropy())
    }

    /// Creates a machine that draws chords from the given random source.
    pub fn with_rng(
        playback: Arc<P>,
        bounds: RegisterBounds,
        settings: RoundSettings,
        rng: StdRng,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        RoundMachine {
            shared: Arc::new(Shared {
                playback,
                settings,
                round: Mutex::new(Round {
                    state: RoundState::Idle,
                    chord: None,
                    token: 0,
                    score: ScoreTracker::new(),
                    last_outcome: None,
                    last_error: None,
                    bounds,
                    rng,
                }),
                events,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoundEvent> {
        self.shared.events.subscribe()
    }

    pub fn state(&self) -> RoundState {
        self.shared.round.lock().state
    }

    pub fn current_chord(&self) -> Option<Chord> {
        self.shared.round.lock().chord.clone()
    }

    pub fn snapshot(&self) -> RoundSnapshot {
        let round = self.shared.round.lock();
        RoundSnapshot {
            state: round.state,
            root_name: round.chord.as_ref().map(Chord::root_name),
            last_outcome: round.last_outcome.clone(),
            last_error: round.last_error.clone(),
            score: round.score.state(),
            token: round.token,
        }
    }

    /// Starts a new game from any state: resets the score and starts a round.
    pub fn begin(&self) {
        let (token, chord) = {
            let mut round = self.shared.round.lock();
            round.score.reset();
            round.start()
        };
        self.round_started(token, chord);
    }

    /// Starts the next round. Only valid once the current round is answered.
    pub fn next(&self) -> bool {
        let (token, chord) = {
            let mut round = self.shared.round.lock();
            if !round.state.can_next() {
                debug!(state = %round.state, "Ignoring next.");
                return false;
            }
            round.start()
        };
        self.round_started(token, chord);
        true
    }

    fn round_started(&self, token: u64, chord: Chord) {
        let root_name = chord.root_name();
        info!(token, root = root_name, quality = %chord.quality(), "Round started.");
        self.shared.publish(RoundEvent::RoundStarted { root_name });
        self.play(token, chord, self.shared.settings.pre_roll);
    }

    /// Plays the current chord again without changing the round state.
    pub fn replay(&self) -> bool {
        let (token, chord) = {
            let mut round = self.shared.round.lock();
            let chord = match (&round.chord, round.state.can_replay()) {
                (Some(chord), true) => chord.clone(),
                _ => {
                    debug!(state = %round.state, "Ignoring replay.");
                    return false;
                }
            };
            (round.issue_token(), chord)
        };
        debug!(token, "Replaying chord.");
        self.play(token, chord, Duration::ZERO);
        true
    }

    /// Answers the current round. Returns None if no answer is accepted now.
    pub fn answer(&self, chosen: Quality) -> Option<AnswerOutcome> {
        let outcome = {
            let mut round = self.shared.round.lock();
            if !round.state.can_answer() {
                debug!(state = %round.state, "Ignoring answer.");
                return None;
            }
            let chord = round.chord.clone()?;
            let correct = chosen == chord.quality();
            let resolution = round.score.record(correct);
            let outcome = AnswerOutcome {
                correct,
                expected: chord.quality(),
                chosen,
                root_name: chord.root_name(),
                notes_label: chord.notes_label(),
                previous_streak: resolution.previous_streak,
                ended_best: resolution.ended_best,
                score: resolution.score,
            };
            round.state = RoundState::AwaitingNext;
            round.last_outcome = Some(outcome.clone());
            outcome
        };

        info!(
            correct = outcome.correct,
            asked = outcome.score.asked,
            streak = outcome.score.streak,
            "Round answered."
        );
        self.shared.publish(RoundEvent::Answered(outcome.clone()));
        Some(outcome)
    }

    /// Plays the current root with the given quality, for comparison after
    /// answering.
    pub fn compare(&self, quality: Quality) -> bool {
        let (token, chord) = {
            let mut round = self.shared.round.lock();
            if round.state != RoundState::AwaitingNext {
                debug!(state = %round.state, "Ignoring compare.");
                return false;
            }
            let Some(chord) = round.chord.as_ref().map(|c| c.with_quality(quality)) else {
                return false;
            };
            (round.issue_token(), chord)
        };
        debug!(token, quality = %quality, "Playing comparison chord.");
        self.play(token, chord, Duration::ZERO);
        true
    }

    /// Takes effect from the next drawn chord.
    pub fn set_register_bounds(&self, bounds: RegisterBounds) {
        info!(
            low = %bounds.low_root(),
            high = %bounds.high_root(),
            "Register bounds changed."
        );
        self.shared.round.lock().bounds = bounds;
    }

    fn play(&self, token: u64, chord: Chord, delay: Duration) {
        let shared = self.shared.clone();
        let span = span!(Level::DEBUG, "play", token);
        tokio::spawn(
            async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if !shared.is_current(token) {
                    debug!("Superseded before playback.");
                    return;
                }

                shared.playback.stop_all();
                let result = shared.playback.play_chord(chord).await;
                shared.complete(token, result);
            }
            .instrument(span),
        );
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::chord::Pitch;
    use crate::samples::SampleError;

    /// One scripted playback: how long it takes and whether it succeeds.
    #[derive(Clone, Copy)]
    struct Step {
        delay: Duration,
        ok: bool,
    }

    const OK: Step = Step {
        delay: Duration::ZERO,
        ok: true,
    };

    #[derive(Default)]
    struct FakePlayback {
        script: Mutex<VecDeque<Step>>,
        played: Mutex<Vec<Chord>>,
        stops: AtomicUsize,
    }

    impl FakePlayback {
        fn script(&self, steps: &[Step]) {
            self.script.lock().extend(steps.iter().copied());
        }

        fn played(&self) -> Vec<Chord> {
            self.played.lock().clone()
        }
    }

    impl Playback for FakePlayback {
        async fn play_chord(&self, chord: Chord) -> Result<(), AudioError> {
            let step = self.script.lock().pop_front().unwrap_or(OK);
            self.played.lock().push(chord);
            if !step.delay.is_zero() {
                tokio::time::sleep(step.delay).await;
            }
            if step.ok {
                Ok(())
            } else {
                Err(SampleError::Missing {
                    location: "audio/g4.mp3".to_string(),
                }
                .into())
            }
        }

        fn stop_all(&self) {
            self.stops.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn machine() -> (RoundMachine<FakePlayback>, Arc<FakePlayback>) {
        let playback = Arc::new(FakePlayback::default());
        let machine = RoundMachine::with_rng(
            playback.clone(),
            RegisterBounds::default(),
            RoundSettings::default(),
            StdRng::seed_from_u64(7),
        );
        (machine, playback)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_secs(2)).await;
    }

    async fn answered(machine: &RoundMachine<FakePlayback>) -> AnswerOutcome {
        machine.begin();
        settle().await;
        let quality = machine.current_chord().unwrap().quality();
        machine.answer(quality).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_begin_opens_gate_after_playback() {
        let (machine, playback) = machine();
        assert_eq!(machine.state(), RoundState::Idle);

        machine.begin();
        assert_eq!(machine.state(), RoundState::Listening);
        assert!(playback.played().is_empty());

        settle().await;
        assert_eq!(machine.state(), RoundState::AwaitingAnswer);
        assert_eq!(playback.played().len(), 1);
        assert_eq!(playback.stops.load(Ordering::Relaxed), 1);
        assert_eq!(playback.played()[0], machine.current_chord().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pre_roll_delays_playback() {
        let (machine, playback) = machine();
        machine.begin();

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(playback.played().is_empty());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(playback.played().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_answer_twice_scores_once() {
        let (machine, _) = machine();
        let outcome = answered(&machine).await;
        assert!(outcome.correct);
        assert_eq!(machine.state(), RoundState::AwaitingNext);

        let chord = machine.current_chord().unwrap();
        assert_eq!(outcome.root_name, chord.root_name());
        assert_eq!(outcome.notes_label, chord.notes_label());

        assert!(machine.answer(Quality::Major).is_none());
        assert!(machine.answer(Quality::Minor).is_none());
        let score = machine.snapshot().score;
        assert_eq!(score.asked, 1);
        assert_eq!(score.correct, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrong_answer() {
        let (machine, _) = machine();
        answered(&machine).await;
        machine.next();
        settle().await;

        let expected = machine.current_chord().unwrap().quality();
        let chosen = match expected {
            Quality::Major => Quality::Minor,
            Quality::Minor => Quality::Major,
        };
        let outcome = machine.answer(chosen).unwrap();
        assert!(!outcome.correct);
        assert_eq!(outcome.expected, expected);
        assert_eq!(outcome.previous_streak, 1);
        assert_eq!(outcome.score.asked, 2);
        assert_eq!(outcome.score.streak, 0);
        assert_eq!(outcome.score.longest_streak, 1);
        assert_eq!(machine.snapshot().last_outcome, Some(outcome));
    }

    #[tokio::test(start_paused = true)]
    async fn test_answer_before_gate_is_ignored() {
        let (machine, _) = machine();
        assert!(machine.answer(Quality::Major).is_none());

        machine.begin();
        assert!(machine.answer(Quality::Major).is_none());
        assert_eq!(machine.snapshot().score.asked, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_in_listening_is_noop() {
        let (machine, playback) = machine();
        machine.begin();
        let chord = machine.current_chord();
        let token = machine.snapshot().token;

        assert!(!machine.next());
        assert_eq!(machine.state(), RoundState::Listening);
        assert_eq!(machine.current_chord(), chord);
        assert_eq!(machine.snapshot().token, token);

        settle().await;
        assert_eq!(playback.played().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_starts_new_round_and_keeps_score() {
        let (machine, playback) = machine();
        answered(&machine).await;

        assert!(machine.next());
        assert_eq!(machine.state(), RoundState::Listening);
        assert!(machine.snapshot().last_outcome.is_none());
        settle().await;
        assert_eq!(machine.state(), RoundState::AwaitingAnswer);
        assert_eq!(playback.played().len(), 2);
        assert_eq!(machine.snapshot().score.asked, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_begin_resets_score() {
        let (machine, _) = machine();
        answered(&machine).await;
        assert_eq!(machine.snapshot().score.asked, 1);

        machine.begin();
        assert_eq!(machine.snapshot().score, ScoreState::default());
        assert_eq!(machine.state(), RoundState::Listening);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replays_issue_distinct_tokens_and_only_latest_opens_gate() {
        let (machine, playback) = machine();
        // The first round's playback fails, leaving the round in Listening.
        playback.script(&[Step {
            delay: Duration::ZERO,
            ok: false,
        }]);
        machine.begin();
        settle().await;
        assert_eq!(machine.state(), RoundState::Listening);

        // The first replay would succeed but finishes after being superseded.
        // The second one fails, so nothing may open the gate.
        playback.script(&[
            Step {
                delay: Duration::from_millis(50),
                ok: true,
            },
            Step {
                delay: Duration::from_millis(200),
                ok: false,
            },
        ]);
        assert!(machine.replay());
        let first = machine.snapshot().token;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(machine.replay());
        let second = machine.snapshot().token;
        assert!(second > first);

        settle().await;
        assert_eq!(playback.played().len(), 3);
        assert_eq!(machine.state(), RoundState::Listening);
        assert_eq!(machine.snapshot().token, second);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_pre_roll_never_plays() {
        let (machine, playback) = machine();
        machine.begin();
        machine.begin();

        settle().await;
        assert_eq!(playback.played().len(), 1);
        assert_eq!(playback.stops.load(Ordering::Relaxed), 1);
        assert_eq!(playback.played()[0], machine.current_chord().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_sample_then_replay_opens_gate() {
        let (machine, playback) = machine();
        let mut events = machine.subscribe();
        playback.script(&[Step {
            delay: Duration::ZERO,
            ok: false,
        }]);

        machine.begin();
        settle().await;
        let snapshot = machine.snapshot();
        assert_eq!(snapshot.state, RoundState::Listening);
        assert_eq!(
            snapshot.last_error.as_deref(),
            Some("Missing audio: audio/g4.mp3")
        );

        assert!(matches!(
            events.recv().await,
            Ok(RoundEvent::RoundStarted { .. })
        ));
        assert!(matches!(
            events.recv().await,
            Ok(RoundEvent::PlaybackFailed(AudioError::Sample(_)))
        ));

        assert!(machine.replay());
        settle().await;
        let snapshot = machine.snapshot();
        assert_eq!(snapshot.state, RoundState::AwaitingAnswer);
        assert!(snapshot.last_error.is_none());
        assert!(matches!(
            events.recv().await,
            Ok(RoundEvent::AnswerGateOpened)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_after_answer_never_reopens_answering() {
        let (machine, playback) = machine();
        answered(&machine).await;

        assert!(machine.replay());
        settle().await;
        assert_eq!(machine.state(), RoundState::AwaitingNext);
        assert_eq!(playback.played().len(), 2);
        assert!(machine.answer(Quality::Major).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_in_idle_is_ignored() {
        let (machine, playback) = machine();
        assert!(!machine.replay());
        settle().await;
        assert!(playback.played().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_compare_only_after_answer() {
        let (machine, playback) = machine();
        machine.begin();
        settle().await;
        assert!(!machine.compare(Quality::Major));

        let chord = machine.current_chord().unwrap();
        machine.answer(chord.quality()).unwrap();
        let other = match chord.quality() {
            Quality::Major => Quality::Minor,
            Quality::Minor => Quality::Major,
        };
        assert!(machine.compare(other));
        settle().await;

        let played = playback.played();
        assert_eq!(played.len(), 2);
        assert_eq!(played[1].root(), chord.root());
        assert_eq!(played[1].quality(), other);
        assert_eq!(machine.state(), RoundState::AwaitingNext);
        assert_eq!(machine.current_chord(), Some(chord));
    }

    #[tokio::test(start_paused = true)]
    async fn test_register_bounds_apply_to_next_chord() {
        let (machine, _) = machine();
        answered(&machine).await;

        let bounds = RegisterBounds::new(Pitch::new(60), Pitch::new(60)).unwrap();
        machine.set_register_bounds(bounds);
        machine.next();
        assert_eq!(machine.current_chord().unwrap().root(), Pitch::new(60));
    }
}
