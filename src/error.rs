// SPDX-License-Identifier: MPL-2.0

use std::{io, path::PathBuf};

/// Failures raised while selecting or driving a content source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("no image files in {}", .0.display())]
    EmptyFolder(PathBuf),

    #[error("no sender named {0}")]
    NoSender(String),

    #[error("not a usable image: {}", path.display())]
    BadImage {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("could not probe {}: {reason}", path.display())]
    Probe { path: PathBuf, reason: String },

    #[error("failed to start {}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("daily image download failed: {0}")]
    Download(String),

    #[error(transparent)]
    Desktop(#[from] crate::desktop::DesktopError),
}

/// Coarse classes deciding how a failure is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Recovered locally by falling back to another source.
    SourceUnavailable,
    /// Reported to the user, the requested transition is aborted.
    StreamDecodeFailure,
    /// Silently aborts the daily transition.
    DownloadFailure,
}

impl SourceError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingFile(_)
            | Self::EmptyFolder(_)
            | Self::NoSender(_)
            | Self::BadImage { .. }
            | Self::Desktop(_) => ErrorKind::SourceUnavailable,
            Self::Probe { .. } | Self::Spawn { .. } => ErrorKind::StreamDecodeFailure,
            Self::Download(_) => ErrorKind::DownloadFailure,
        }
    }
}
