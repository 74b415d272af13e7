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

//! Pitched sample lookup, decoding and caching.
//!
//! This module provides:
//! - The pitch class to file stem table
//! - Decoding of sample files into memory (symphonia)
//! - A memoized, async sample store shared by every round of a session

mod loader;
mod store;

pub use loader::DecodedSample;
pub use store::{load_all, verify, LoadResult, SampleStore};

/// File stems for each pitch class, indexed by pitch class.
pub const STEMS: [&str; 12] = [
    "c", "csharp", "d", "dsharp", "e", "f", "fsharp", "g", "gsharp", "a", "asharp", "b",
];

/// Errors from resolving or decoding a sample. Clone so failures can be cached.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SampleError {
    #[error("Missing audio: {location}")]
    Missing { location: String },

    #[error("Failed to decode {location}: {reason}")]
    Decode { location: String, reason: String },
}

impl SampleError {
    /// The sample location this error refers to.
    pub fn location(&self) -> &str {
        match self {
            SampleError::Missing { location } | SampleError::Decode { location, .. } => location,
        }
    }
}

/// Returns the file stem for a pitch class, or None outside of `0..12`.
pub fn stem_for_pitch_class(pitch_class: u8) -> Option<&'static str> {
    STEMS.get(pitch_class as usize).copied()
}

/// Inverse of [`stem_for_pitch_class`].
pub fn pitch_class_for_stem(stem: &str) -> Option<u8> {
    STEMS.iter().position(|s| *s == stem).map(|pc| pc as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stem_table_round_trips() {
        for pc in 0..12u8 {
            let stem = stem_for_pitch_class(pc).unwrap();
            assert_eq!(pitch_class_for_stem(stem), Some(pc));
        }
        assert_eq!(stem_for_pitch_class(12), None);
        assert_eq!(pitch_class_for_stem("h"), None);
    }

    #[test]
    fn test_error_location() {
        let err = SampleError::Decode {
            location: "audio/c4.mp3".to_string(),
            reason: "bad header".to_string(),
        };
        assert_eq!(err.location(), "audio/c4.mp3");
        assert_eq!(
            SampleError::Missing {
                location: "audio/d4.mp3".to_string()
            }
            .to_string(),
            "Missing audio: audio/d4.mp3"
        );
    }
}
