// SPDX-License-Identifier: MPL-2.0

//! Daily images fetched by an external downloader.

use crate::{error::SourceError, sources::image_files};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};

/// A downloaded image of the day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DailyImage {
    pub image_url: String,
    pub title: String,
    pub copyright: String,
    /// Local copy of the image.
    #[serde(skip)]
    pub path: PathBuf,
}

impl DailyImage {
    /// Text shown alongside the image.
    #[must_use]
    pub fn description(&self) -> String {
        match (self.title.is_empty(), self.copyright.is_empty()) {
            (false, false) => format!("{} ({})", self.title, self.copyright),
            (false, true) => self.title.clone(),
            (true, false) => self.copyright.clone(),
            (true, true) => self
                .path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }
}

pub trait DailyImageProvider {
    /// # Errors
    ///
    /// Fails if no image of the day can be obtained.
    fn fetch(&mut self) -> Result<DailyImage, SourceError>;
}

/// Serves the newest image a downloader left in a cache directory.
///
/// Metadata is read from a `<image stem>.json` file next to the image, when present.
#[derive(Debug, Clone)]
pub struct CachedDaily {
    dir: PathBuf,
}

impl CachedDaily {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// `$XDG_CACHE_HOME/livewall/daily`
    #[must_use]
    pub fn default_dir() -> Option<PathBuf> {
        dirs::cache_dir().map(|dir| dir.join(livewall_config::NAME).join("daily"))
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DailyImageProvider for CachedDaily {
    fn fetch(&mut self) -> Result<DailyImage, SourceError> {
        let newest = image_files(&self.dir)
            .map_err(|_| SourceError::Download(format!("no image in {}", self.dir.display())))?
            .into_iter()
            .max_by_key(|path| {
                let modified = fs::metadata(path)
                    .and_then(|meta| meta.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                (modified, path.clone())
            })
            .ok_or_else(|| SourceError::Download(format!("no image in {}", self.dir.display())))?;

        let sidecar = newest.with_extension("json");
        let mut daily = match fs::read(&sidecar) {
            Ok(json) => serde_json::from_slice::<DailyImage>(&json).unwrap_or_else(|why| {
                tracing::warn!(?why, path = %sidecar.display(), "ignoring malformed daily metadata");
                DailyImage::default()
            }),
            Err(_) => DailyImage::default(),
        };

        daily.path = newest;
        tracing::debug!(path = %daily.path.display(), title = %daily.title, "found daily image");
        Ok(daily)
    }
}
