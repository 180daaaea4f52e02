use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{read_ron, snap_duration, write_ron, Error, NAME};

pub const STATE_FILE: &str = "state.ron";

/// Choices remembered between runs.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Setters)]
#[serde(default, deny_unknown_fields)]
#[must_use]
pub struct State {
    /// folder of the last selected slideshow
    pub slideshow_folder: Option<PathBuf>,
    /// seconds each slide stays up
    pub slideshow_interval: u64,
    /// whether slides are picked at random
    pub slideshow_random: bool,
}

impl Default for State {
    fn default() -> Self {
        Self {
            slideshow_folder: None,
            slideshow_interval: 30,
            slideshow_random: false,
        }
    }
}

impl State {
    /// # Errors
    ///
    /// Fails if the user has neither a state nor a local data directory.
    pub fn path() -> Result<PathBuf, Error> {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .map(|dir| dir.join(NAME).join(STATE_FILE))
            .ok_or(Error::NoDirectory("state"))
    }

    /// # Errors
    ///
    /// Fails if the state file exists but cannot be read or parsed.
    pub fn load() -> Result<Self, Error> {
        Self::load_from(&Self::path()?)
    }

    /// The stored slide interval is snapped to one of [`crate::SLIDE_DURATIONS`].
    ///
    /// # Errors
    ///
    /// Fails if the state file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self, Error> {
        let mut state: Self = read_ron(path)?.unwrap_or_default();
        state.slideshow_interval = snap_duration(state.slideshow_interval);
        Ok(state)
    }

    /// # Errors
    ///
    /// Fails if the state directory cannot be created or the file written.
    pub fn save(&self) -> Result<(), Error> {
        self.save_to(&Self::path()?)
    }

    /// # Errors
    ///
    /// Fails if the parent directory cannot be created or the file written.
    pub fn save_to(&self, path: &Path) -> Result<(), Error> {
        write_ron(path, self)
    }
}
