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

//! Memoized sample store.
//!
//! Each location maps to a cell that is initialized at most once. Concurrent
//! loads of the same location wait on the same in-flight decode, and later
//! loads get the cached result, including cached failures.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::loader::{decode_file, DecodedSample};
use super::{stem_for_pitch_class, SampleError};
use crate::chord::Pitch;
use crate::config;

/// The result of loading a sample.
pub type LoadResult = Result<Arc<DecodedSample>, SampleError>;

/// Resolves pitches to sample locations and caches decoded samples.
pub struct SampleStore {
    /// Directory that holds the sample files.
    directory: PathBuf,
    /// File extension, without the dot.
    extension: String,
    /// Drop cached failures on the next load instead of keeping them.
    retry_missing: bool,
    /// Cache of load results by location.
    cache: Mutex<HashMap<String, Arc<OnceCell<LoadResult>>>>,
    /// Number of decodes started, for logging and tests.
    decodes: AtomicUsize,
}

impl SampleStore {
    /// Creates a new sample store.
    pub fn new(directory: &Path, extension: &str, retry_missing: bool) -> SampleStore {
        SampleStore {
            directory: directory.to_path_buf(),
            extension: extension.trim_start_matches('.').to_string(),
            retry_missing,
            cache: Mutex::new(HashMap::new()),
            decodes: AtomicUsize::new(0),
        }
    }

    /// Creates a store from the samples configuration.
    pub fn from_config(config: &config::Samples) -> SampleStore {
        SampleStore::new(
            config.directory(),
            config.extension(),
            config.retry_missing(),
        )
    }

    /// Returns the location of the sample for the given pitch, or None if the
    /// pitch class has no stem.
    pub fn resolve(&self, pitch: Pitch) -> Option<String> {
        let stem = stem_for_pitch_class(pitch.pitch_class())?;
        let file_name = format!("{}{}.{}", stem, pitch.octave(), self.extension);
        Some(self.directory.join(file_name).to_string_lossy().to_string())
    }

    /// Loads the sample at the given location. Concurrent calls share one decode.
    pub async fn load(&self, location: &str) -> LoadResult {
        let cell = {
            let mut cache = self.cache.lock();
            if self.retry_missing {
                let failed = cache
                    .get(location)
                    .is_some_and(|cell| matches!(cell.get(), Some(Err(_))));
                if failed {
                    debug!(location, "Retrying previously failed sample");
                    cache.remove(location);
                }
            }
            cache
                .entry(location.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        if let Some(result) = cell.get() {
            debug!(location, "Using cached sample");
            return result.clone();
        }

        cell.get_or_init(|| self.decode(location.to_string()))
            .await
            .clone()
    }

    /// Resolves and loads the sample for a pitch.
    pub async fn load_pitch(&self, pitch: Pitch) -> LoadResult {
        match self.resolve(pitch) {
            Some(location) => self.load(&location).await,
            None => Err(SampleError::Missing {
                location: format!("<no stem for pitch {}>", pitch.value()),
            }),
        }
    }

    async fn decode(&self, location: String) -> LoadResult {
        self.decodes.fetch_add(1, Ordering::Relaxed);
        info!(location, "Loading sample into memory");

        let blocking_location = location.clone();
        let result = match tokio::task::spawn_blocking(move || decode_file(&blocking_location))
            .await
        {
            Ok(result) => result.map(Arc::new),
            Err(e) => Err(SampleError::Decode {
                location: location.clone(),
                reason: e.to_string(),
            }),
        };

        if let Err(e) = &result {
            warn!(location, error = %e, "Sample unavailable");
        }
        result
    }

    /// Number of decodes started over the lifetime of this store.
    pub fn decode_count(&self) -> usize {
        self.decodes.load(Ordering::Relaxed)
    }

    /// Number of cached entries, pending or resolved.
    pub fn cached_entries(&self) -> usize {
        self.cache.lock().len()
    }

    /// Returns the total memory used by decoded samples.
    pub fn total_memory_usage(&self) -> usize {
        self.cache
            .lock()
            .values()
            .filter_map(|cell| match cell.get() {
                Some(Ok(sample)) => Some(sample.memory_size()),
                _ => None,
            })
            .sum()
    }
}

impl std::fmt::Debug for SampleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleStore")
            .field("directory", &self.directory)
            .field("extension", &self.extension)
            .field("cached_samples", &self.cached_entries())
            .field("total_memory_kb", &(self.total_memory_usage() / 1024))
            .finish()
    }
}

/// Loads every pitch in parallel. Results are in the order of `pitches`.
pub async fn load_all(store: &Arc<SampleStore>, pitches: &[Pitch]) -> Vec<LoadResult> {
    let mut set = JoinSet::new();
    for (index, pitch) in pitches.iter().copied().enumerate() {
        let store = store.clone();
        set.spawn(async move { (index, store.load_pitch(pitch).await) });
    }

    let mut results: Vec<Option<LoadResult>> = vec![None; pitches.len()];
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, result)) => results[index] = Some(result),
            Err(e) => warn!(error = %e, "Sample load task failed"),
        }
    }

    results
        .into_iter()
        .zip(pitches)
        .map(|(result, pitch)| {
            result.unwrap_or_else(|| {
                Err(SampleError::Decode {
                    location: store
                        .resolve(*pitch)
                        .unwrap_or_else(|| pitch.value().to_string()),
                    reason: "load task did not complete".to_string(),
                })
            })
        })
        .collect()
}

/// Loads every pitch and returns the errors for the ones that are unavailable.
pub async fn verify(store: &Arc<SampleStore>, pitches: &[Pitch]) -> Vec<SampleError> {
    load_all(store, pitches)
        .await
        .into_iter()
        .filter_map(Result::err)
        .collect()
}
