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

//! Pitch arithmetic and triad generation.
//!
//! Pitches are absolute semitone indices where `octave = floor(pitch / 12)`, so
//! pitch 48 is the `c4` sample and pitch 60 is the `c5` sample.

use std::{fmt, str::FromStr};

use rand::Rng;
use serde::Deserialize;

const SHARP_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];
const FLAT_NAMES: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

/// An absolute semitone index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pitch(i32);

impl Pitch {
    pub const fn new(value: i32) -> Pitch {
        Pitch(value)
    }

    /// Builds a pitch from a pitch class and an octave number.
    pub fn from_class_and_octave(pitch_class: u8, octave: i32) -> Pitch {
        Pitch(octave * 12 + i32::from(pitch_class % 12))
    }

    pub fn value(&self) -> i32 {
        self.0
    }

    /// The pitch class, always in `0..12`.
    pub fn pitch_class(&self) -> u8 {
        self.0.rem_euclid(12) as u8
    }

    /// The octave number, rounding toward negative infinity.
    pub fn octave(&self) -> i32 {
        self.0.div_euclid(12)
    }

    pub fn transpose(&self, semitones: i32) -> Pitch {
        Pitch(self.0 + semitones)
    }

    /// The display name of this pitch's class.
    pub fn name(&self) -> String {
        note_name(self.pitch_class())
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", SHARP_NAMES[self.pitch_class() as usize], self.octave())
    }
}

/// Triad quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quality {
    Major,
    Minor,
}

impl Quality {
    /// The interval from the root to the third, in semitones.
    pub fn third(&self) -> i32 {
        match self {
            Quality::Major => 4,
            Quality::Minor => 3,
        }
    }

    /// Short label, e.g. `maj`.
    pub fn short(&self) -> &'static str {
        match self {
            Quality::Major => "maj",
            Quality::Minor => "min",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Quality::Major => "Major",
            Quality::Minor => "Minor",
        })
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "maj" | "major" => Ok(Quality::Major),
            "min" | "minor" => Ok(Quality::Minor),
            _ => Err(format!("unknown chord quality '{}'", s)),
        }
    }
}

/// A root-position triad. Constructed only through [`Chord::new`], so the
/// third and fifth always agree with the quality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chord {
    root: Pitch,
    quality: Quality,
    pitches: [Pitch; 3],
}

impl Chord {
    pub fn new(root: Pitch, quality: Quality) -> Chord {
        Chord {
            root,
            quality,
            pitches: [root, root.transpose(quality.third()), root.transpose(7)],
        }
    }

    pub fn root(&self) -> Pitch {
        self.root
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    /// Root, third and fifth, in that order.
    pub fn pitches(&self) -> &[Pitch; 3] {
        &self.pitches
    }

    /// The triad of the given quality on the same root.
    pub fn with_quality(&self, quality: Quality) -> Chord {
        Chord::new(self.root, quality)
    }

    pub fn root_name(&self) -> String {
        self.root.name()
    }

    pub fn notes_label(&self) -> String {
        notes_label(&self.pitches)
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.root.name(), self.quality)
    }
}

/// Errors from constructing register bounds.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegisterError {
    #[error("low root {low} is above high root {high}")]
    Inverted { low: i32, high: i32 },

    #[error("unknown root range '{0}'")]
    UnknownRange(String),
}

/// Inclusive bounds for randomly drawn root pitches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterBounds {
    low_root: Pitch,
    high_root: Pitch,
}

impl RegisterBounds {
    pub fn new(low_root: Pitch, high_root: Pitch) -> Result<RegisterBounds, RegisterError> {
        if low_root > high_root {
            return Err(RegisterError::Inverted {
                low: low_root.value(),
                high: high_root.value(),
            });
        }
        Ok(RegisterBounds {
            low_root,
            high_root,
        })
    }

    pub fn low_root(&self) -> Pitch {
        self.low_root
    }

    pub fn high_root(&self) -> Pitch {
        self.high_root
    }

    pub fn contains(&self, pitch: Pitch) -> bool {
        self.low_root <= pitch && pitch <= self.high_root
    }

    /// Every pitch a chord drawn from these bounds can contain.
    pub fn playable_pitches(&self) -> impl Iterator<Item = Pitch> {
        (self.low_root.value()..=self.high_root.value() + 7).map(Pitch::new)
    }
}

impl Default for RegisterBounds {
    fn default() -> Self {
        RootRange::default().bounds()
    }
}

/// Named root ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum RootRange {
    #[serde(rename = "easy-1oct")]
    OneOctave,
    #[serde(rename = "med-2oct")]
    TwoOctaves,
    #[default]
    #[serde(rename = "hard-3oct")]
    ThreeOctaves,
}

impl RootRange {
    /// Start octave and octave count.
    fn span(&self) -> (i32, i32) {
        match self {
            RootRange::OneOctave => (4, 1),
            RootRange::TwoOctaves => (3, 2),
            RootRange::ThreeOctaves => (3, 3),
        }
    }

    pub fn bounds(&self) -> RegisterBounds {
        let (start, octaves) = self.span();
        RegisterBounds {
            low_root: Pitch::from_class_and_octave(0, start),
            high_root: Pitch::from_class_and_octave(11, start + octaves - 1),
        }
    }
}

impl FromStr for RootRange {
    type Err = RegisterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy-1oct" => Ok(RootRange::OneOctave),
            "med-2oct" => Ok(RootRange::TwoOctaves),
            "hard-3oct" => Ok(RootRange::ThreeOctaves),
            _ => Err(RegisterError::UnknownRange(s.to_string())),
        }
    }
}

/// Draws a root uniformly from the bounds and a quality with equal probability.
pub fn random_chord<R: Rng + ?Sized>(rng: &mut R, bounds: &RegisterBounds) -> Chord {
    let root = rng.gen_range(bounds.low_root.value()..=bounds.high_root.value());
    let quality = if rng.gen_bool(0.5) {
        Quality::Major
    } else {
        Quality::Minor
    };
    Chord::new(Pitch::new(root), quality)
}

/// Natural names for the seven naturals, a sharp/flat pair for the accidentals.
pub fn note_name(pitch_class: u8) -> String {
    let pc = (pitch_class % 12) as usize;
    if SHARP_NAMES[pc] == FLAT_NAMES[pc] {
        SHARP_NAMES[pc].to_string()
    } else {
        format!("{}/{}", SHARP_NAMES[pc], FLAT_NAMES[pc])
    }
}

/// Unique pitch class names in first-seen order, comma separated.
pub fn notes_label(pitches: &[Pitch]) -> String {
    let mut classes: Vec<u8> = Vec::with_capacity(pitches.len());
    for pitch in pitches {
        let pc = pitch.pitch_class();
        if !classes.contains(&pc) {
            classes.push(pc);
        }
    }
    classes
        .into_iter()
        .map(note_name)
        .collect::<Vec<String>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn test_pitch_class_and_octave() {
        let pitch = Pitch::new(61);
        assert_eq!(pitch.pitch_class(), 1);
        assert_eq!(pitch.octave(), 5);

        let negative = Pitch::new(-1);
        assert_eq!(negative.pitch_class(), 11);
        assert_eq!(negative.octave(), -1);

        assert_eq!(Pitch::from_class_and_octave(9, 4), Pitch::new(57));
    }

    #[test]
    fn test_major_triad_on_sixty() {
        let chord = Chord::new(Pitch::new(60), Quality::Major);
        assert_eq!(
            chord.pitches(),
            &[Pitch::new(60), Pitch::new(64), Pitch::new(67)]
        );
        assert_eq!(chord.root_name(), "C");
        assert_eq!(chord.notes_label(), "C, E, G");
    }

    #[test]
    fn test_minor_triad() {
        let chord = Chord::new(Pitch::new(61), Quality::Minor);
        assert_eq!(
            chord.pitches(),
            &[Pitch::new(61), Pitch::new(64), Pitch::new(68)]
        );
        assert_eq!(chord.notes_label(), "C#/Db, E, G#/Ab");
        assert_eq!(chord.with_quality(Quality::Major).pitches()[1], Pitch::new(65));
    }

    #[test]
    fn test_note_names() {
        assert_eq!(note_name(0), "C");
        assert_eq!(note_name(1), "C#/Db");
        assert_eq!(note_name(3), "D#/Eb");
        assert_eq!(note_name(6), "F#/Gb");
        assert_eq!(note_name(8), "G#/Ab");
        assert_eq!(note_name(10), "A#/Bb");
        assert_eq!(note_name(11), "B");
    }

    #[test]
    fn test_random_chords_hold_invariants() {
        let mut rng = StdRng::seed_from_u64(7);
        let bounds = RegisterBounds::new(Pitch::new(36), Pitch::new(71)).unwrap();
        let mut seen_major = false;
        let mut seen_minor = false;

        for _ in 0..2000 {
            let chord = random_chord(&mut rng, &bounds);
            let [root, third, fifth] = *chord.pitches();
            let third_interval = third.value() - root.value();

            assert!(bounds.contains(root));
            assert!(third_interval == 3 || third_interval == 4);
            assert_eq!(fifth.value() - root.value(), 7);
            assert_eq!(chord.quality() == Quality::Major, third_interval == 4);

            match chord.quality() {
                Quality::Major => seen_major = true,
                Quality::Minor => seen_minor = true,
            }
        }

        assert!(seen_major && seen_minor);
    }

    #[test]
    fn test_single_root_bounds() {
        let mut rng = StdRng::seed_from_u64(1);
        let bounds = RegisterBounds::new(Pitch::new(60), Pitch::new(60)).unwrap();
        for _ in 0..20 {
            assert_eq!(random_chord(&mut rng, &bounds).root(), Pitch::new(60));
        }
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        assert_eq!(
            RegisterBounds::new(Pitch::new(50), Pitch::new(40)),
            Err(RegisterError::Inverted { low: 50, high: 40 })
        );
    }

    #[test]
    fn test_root_ranges() {
        let hard = RootRange::ThreeOctaves.bounds();
        assert_eq!(hard.low_root(), Pitch::new(36));
        assert_eq!(hard.high_root(), Pitch::new(71));

        let easy: RootRange = "easy-1oct".parse().unwrap();
        assert_eq!(easy.bounds().low_root(), Pitch::new(48));
        assert_eq!(easy.bounds().high_root(), Pitch::new(59));

        assert!("impossible".parse::<RootRange>().is_err());
        assert_eq!(RegisterBounds::default(), hard);
        assert_eq!(hard.playable_pitches().count(), 36 + 7);
    }

    #[test]
    fn test_quality_parsing() {
        assert_eq!("maj".parse::<Quality>(), Ok(Quality::Major));
        assert_eq!("Minor".parse::<Quality>(), Ok(Quality::Minor));
        assert!("diminished".parse::<Quality>().is_err());
        assert_eq!(Quality::Minor.to_string(), "Minor");
        assert_eq!(Quality::Major.short(), "maj");
    }
}
