// SPDX-License-Identifier: MPL-2.0

//! Desktop wallpaper setting and the snapshot of the wallpaper we started with.

use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum DesktopError {
    #[error("failed to read the desktop wallpaper: {0}")]
    Get(String),
    #[error("failed to set the desktop wallpaper to {}: {reason}", path.display())]
    Set { path: PathBuf, reason: String },
    #[error("wallpaper path is not valid UTF-8: {}", .0.display())]
    InvalidPath(PathBuf),
}

/// Access to the wallpaper setting of the desktop environment.
pub trait DesktopBackground {
    fn get(&self) -> Result<PathBuf, DesktopError>;

    /// Sets the wallpaper. `persist` asks for the change to survive the session.
    fn set(&mut self, path: &Path, persist: bool) -> Result<(), DesktopError>;
}

/// The real desktop, through the `wallpaper` crate.
#[derive(Debug, Default)]
pub struct SystemBackground;

impl DesktopBackground for SystemBackground {
    fn get(&self) -> Result<PathBuf, DesktopError> {
        let current = wallpaper::get().map_err(|why| DesktopError::Get(why.to_string()))?;
        let current = current.trim().trim_matches('\'');
        // GNOME reports a URI
        let current = current.strip_prefix("file://").unwrap_or(current);
        Ok(PathBuf::from(current))
    }

    fn set(&mut self, path: &Path, persist: bool) -> Result<(), DesktopError> {
        let path_str = path
            .to_str()
            .ok_or_else(|| DesktopError::InvalidPath(path.to_path_buf()))?;

        // the desktop settings backends have no session-only mode
        tracing::debug!(path = path_str, persist, "setting desktop wallpaper");

        wallpaper::set_from_path(path_str).map_err(|why| DesktopError::Set {
            path: path.to_path_buf(),
            reason: why.to_string(),
        })
    }
}

/// Remembers the wallpaper found at startup so it can be put back.
#[derive(Debug)]
pub struct WallpaperRegistry<D> {
    desktop: D,
    original: Option<PathBuf>,
    showing_original: bool,
    current: Option<PathBuf>,
}

impl<D: DesktopBackground> WallpaperRegistry<D> {
    /// Captures the current wallpaper. Call once, at startup.
    pub fn snapshot(desktop: D) -> Self {
        let original = match desktop.get() {
            Ok(path) if !path.as_os_str().is_empty() => Some(path),
            Ok(_) => {
                tracing::warn!("desktop reports no wallpaper, nothing to restore on exit");
                None
            }
            Err(why) => {
                tracing::warn!(?why, "could not read the desktop wallpaper");
                None
            }
        };

        tracing::info!(original = ?original, "captured original wallpaper");

        Self {
            desktop,
            showing_original: original.is_some(),
            current: original.clone(),
            original,
        }
    }

    /// Puts the original wallpaper back unless it is already showing.
    ///
    /// Returns `true` if the desktop was changed.
    pub fn restore(&mut self) -> bool {
        if self.showing_original {
            return false;
        }

        let Some(original) = self.original.clone() else {
            return false;
        };

        match self.desktop.set(&original, true) {
            Ok(()) => {
                tracing::info!(path = %original.display(), "restored original wallpaper");
                self.showing_original = true;
                self.current = Some(original);
                true
            }
            Err(why) => {
                tracing::warn!(?why, "failed to restore original wallpaper");
                false
            }
        }
    }

    /// Pushes an image to the desktop.
    ///
    /// # Errors
    ///
    /// Fails if the desktop refuses the image.
    pub fn set_image(&mut self, path: &Path, permanent: bool) -> Result<(), DesktopError> {
        self.showing_original = false;
        self.desktop.set(path, permanent)?;
        self.current = Some(path.to_path_buf());
        Ok(())
    }

    /// Records that our own surface now covers the desktop.
    pub fn mark_covered(&mut self) {
        self.showing_original = false;
    }

    #[must_use]
    pub fn is_showing_original(&self) -> bool {
        self.showing_original
    }

    #[must_use]
    pub fn original(&self) -> Option<&Path> {
        self.original.as_deref()
    }

    /// The image most recently pushed to the desktop.
    #[must_use]
    pub fn current(&self) -> Option<&Path> {
        self.current.as_deref()
    }

    #[must_use]
    pub fn desktop(&self) -> &D {
        &self.desktop
    }
}
