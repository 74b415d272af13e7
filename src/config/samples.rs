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
use std::path::{Path, PathBuf};

use serde::Deserialize;

const DEFAULT_DIRECTORY: &str = "audio";
const DEFAULT_EXTENSION: &str = "mp3";

/// Where to find the chord samples.
#[derive(Deserialize, Clone, Default, Debug)]
pub struct Samples {
    /// Directory holding `{stem}{octave}.{extension}` files (default: "audio").
    directory: Option<PathBuf>,

    /// Sample file extension (default: "mp3").
    extension: Option<String>,

    /// Retry samples that previously failed to load (default: false).
    retry_missing: Option<bool>,
}

impl Samples {
    pub fn new(directory: &Path) -> Samples {
        Samples {
            directory: Some(directory.to_path_buf()),
            ..Default::default()
        }
    }

    pub fn directory(&self) -> &Path {
        self.directory
            .as_deref()
            .unwrap_or(Path::new(DEFAULT_DIRECTORY))
    }

    pub fn set_directory(&mut self, directory: &Path) {
        self.directory = Some(directory.to_path_buf());
    }

    pub fn extension(&self) -> &str {
        self.extension.as_deref().unwrap_or(DEFAULT_EXTENSION)
    }

    pub fn retry_missing(&self) -> bool {
        self.retry_missing.unwrap_or(false)
    }
}
