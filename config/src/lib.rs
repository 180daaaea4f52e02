// SPDX-License-Identifier: MPL-2.0-only

use derive_setters::Setters;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
};

pub mod state;

pub const NAME: &str = "livewall";
pub const CONFIG_FILE: &str = "config.ron";

/// Slide durations offered when picking a slideshow, in seconds.
pub const SLIDE_DURATIONS: [u64; 13] = [
    2, 4, 10, 30, 60, 120, 240, 600, 1800, 3600, 7200, 14400, 36000,
];

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no {0} directory available for this user")]
    NoDirectory(&'static str),
    #[error("failed to access {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
    #[error("failed to serialize")]
    Serialize(#[from] ron::Error),
}

/// Daemon configuration, read once at startup.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Setters)]
#[serde(default, deny_unknown_fields)]
#[must_use]
pub struct Config {
    /// ffmpeg binary used to decode video files
    pub ffmpeg: PathBuf,
    /// ffprobe binary used to read video dimensions and frame rate
    pub ffprobe: PathBuf,
    /// directory scanned for shared-texture senders
    pub sender_dir: Option<PathBuf>,
    /// upper bound on presented frames per second, 0 disables pacing
    pub frame_rate: u32,
    /// keep the last still image as wallpaper when exiting on a signal
    pub keep_on_exit: bool,
    /// sender to follow at startup, any sender when unset
    pub sender: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            sender_dir: None,
            frame_rate: 30,
            keep_on_exit: false,
            sender: None,
        }
    }
}

impl Config {
    /// Location of the config file.
    ///
    /// # Errors
    ///
    /// Fails if the user has no config directory.
    pub fn path() -> Result<PathBuf, Error> {
        dirs::config_dir()
            .map(|dir| dir.join(NAME).join(CONFIG_FILE))
            .ok_or(Error::NoDirectory("config"))
    }

    /// Load the config file, falling back to defaults when it does not exist.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self, Error> {
        Self::load_from(&Self::path()?)
    }

    /// # Errors
    ///
    /// Fails if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self, Error> {
        Ok(read_ron(path)?.unwrap_or_default())
    }

    /// The configured sender directory, or `$XDG_RUNTIME_DIR/livewall/senders`.
    #[must_use]
    pub fn sender_directory(&self) -> PathBuf {
        self.sender_dir
            .clone()
            .unwrap_or_else(|| runtime_dir().join("senders"))
    }
}

/// Per-user runtime directory of the daemon.
#[must_use]
pub fn runtime_dir() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(NAME)
}

/// Rounds an interval to the closest offered slide duration.
#[must_use]
pub fn snap_duration(seconds: u64) -> u64 {
    SLIDE_DURATIONS
        .iter()
        .copied()
        .min_by_key(|d| d.abs_diff(seconds))
        .unwrap_or(seconds)
}

pub(crate) fn read_ron<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, Error> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(why) if why.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no file, using defaults");
            return Ok(None);
        }
        Err(source) => {
            return Err(Error::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    ron::from_str(&text).map(Some).map_err(|source| Error::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn write_ron<T: Serialize>(path: &Path, value: &T) -> Result<(), Error> {
    let text = ron::ser::to_string_pretty(value, ron::ser::PrettyConfig::default())?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| Error::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    fs::write(path, text).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}
