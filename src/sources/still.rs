// SPDX-License-Identifier: MPL-2.0

use crate::error::SourceError;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StillKind {
    Image,
    Daily,
}

/// A single image already handed to the desktop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticImageSource {
    path: PathBuf,
    description: String,
    kind: StillKind,
}

impl StaticImageSource {
    /// # Errors
    ///
    /// Fails if the file is missing or is not a readable image.
    pub fn image(path: &Path) -> Result<Self, SourceError> {
        validate(path)?;

        let description = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            path: path.to_path_buf(),
            description,
            kind: StillKind::Image,
        })
    }

    /// # Errors
    ///
    /// Fails if the file is missing or is not a readable image.
    pub fn daily(path: &Path, description: &str) -> Result<Self, SourceError> {
        validate(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            description: description.to_owned(),
            kind: StillKind::Daily,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn kind(&self) -> StillKind {
        self.kind
    }
}

fn validate(path: &Path) -> Result<(), SourceError> {
    if !path.is_file() {
        return Err(SourceError::MissingFile(path.to_path_buf()));
    }

    let (width, height) =
        image::image_dimensions(path).map_err(|source| SourceError::BadImage {
            path: path.to_path_buf(),
            source,
        })?;

    tracing::debug!(path = %path.display(), width, height, "validated still image");
    Ok(())
}
