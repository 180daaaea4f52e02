// SPDX-License-Identifier: MPL-2.0

use crate::error::SourceError;
use image::ImageFormat;
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};
use walkdir::WalkDir;

const SLIDE_FORMATS: &[ImageFormat] = &[
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Gif,
    ImageFormat::Bmp,
    ImageFormat::Tga,
    ImageFormat::Tiff,
];

/// Image files directly inside `folder`, sorted by name.
///
/// # Errors
///
/// Fails if the folder holds no image files.
pub fn image_files(folder: &Path) -> Result<Vec<PathBuf>, SourceError> {
    tracing::debug!(folder = %folder.display(), "loading slideshow images");

    let mut files: Vec<PathBuf> = WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| {
            ImageFormat::from_path(path).is_ok_and(|format| SLIDE_FORMATS.contains(&format))
        })
        .collect();

    if files.is_empty() {
        return Err(SourceError::EmptyFolder(folder.to_path_buf()));
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Rotates through a fixed list of images on a wall-clock interval.
#[derive(Debug)]
pub struct SlideshowSource {
    folder: PathBuf,
    files: Vec<PathBuf>,
    interval: Duration,
    index: usize,
    randomize: bool,
    cycle_start: Option<Instant>,
    rng: StdRng,
}

impl SlideshowSource {
    /// Relative entries of `files` are taken to be inside `folder`.
    ///
    /// # Errors
    ///
    /// Fails if `files` is empty.
    pub fn new(
        folder: &Path,
        files: Vec<PathBuf>,
        interval_seconds: u64,
        randomize: bool,
    ) -> Result<Self, SourceError> {
        if files.is_empty() {
            return Err(SourceError::EmptyFolder(folder.to_path_buf()));
        }

        let files = files.into_iter().map(|file| folder.join(file)).collect();

        Ok(Self {
            folder: folder.to_path_buf(),
            files,
            interval: Duration::from_secs(interval_seconds.max(1)),
            index: 0,
            randomize,
            cycle_start: None,
            rng: StdRng::from_os_rng(),
        })
    }

    #[must_use]
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Returns the image to show if its turn has come, and moves on to the next one.
    pub fn poll(&mut self, now: Instant) -> Option<&Path> {
        let due = self
            .cycle_start
            .is_none_or(|start| now.saturating_duration_since(start) >= self.interval);

        if !due {
            return None;
        }

        let shown = self.index;
        self.index = if self.randomize {
            self.rng.random_range(0..self.files.len())
        } else {
            (self.index + 1) % self.files.len()
        };
        self.cycle_start = Some(now);

        tracing::debug!(index = shown, next = self.index, "slideshow advanced");
        Some(&self.files[shown])
    }

    #[must_use]
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    #[must_use]
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Index of the image shown on the next advance.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn is_random(&self) -> bool {
        self.randomize
    }
}
