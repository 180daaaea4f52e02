// SPDX-License-Identifier: MPL-2.0

//! Chooses the active content source and drives it once per tick.

#[cfg(test)]
mod tests;

use crate::{
    daily::DailyImageProvider,
    desktop::{DesktopBackground, WallpaperRegistry},
    error::SourceError,
    frame_buffer::FrameBuffer,
    presenter::{Canvas, Presenter},
    sources::{
        FileStreamSource, FrameProducer, SharedTextureSource, SlideshowSource, StaticImageSource,
        StillKind, StreamPoll, TexturePoll, TextureReceiver,
    },
};
use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

/// Tick period while streaming or waiting for a sender.
pub const STREAM_PERIOD: Duration = Duration::from_millis(30);
pub const SLIDESHOW_PERIOD: Duration = Duration::from_millis(1000);
pub const STILL_PERIOD: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuxState {
    Idle,
    SharedTexture,
    FileStream,
    Slideshow,
    StaticOrDaily,
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A frame was handed to the presenter.
    Drew,
    /// The frame size changed, drawing resumes next tick.
    Resized,
    /// The video decoder was started.
    Spawned,
    /// The video ended and restarted.
    Looped,
    /// The slideshow pushed its next image.
    SlideChanged,
    /// Nothing to do this tick.
    Unchanged,
    /// Idle with no sender to pick up.
    Waiting,
    /// The sender was lost and the image on record was put back.
    SwitchedToStill,
    /// The source failed and the original wallpaper was restored.
    FellBack,
}

/// Owns every source and the frame buffer they share; at most one source runs.
#[derive(Debug)]
pub struct SourceMultiplexer<R, P, D> {
    state: MuxState,
    texture: SharedTextureSource<R>,
    stream: FileStreamSource<P>,
    slideshow: Option<SlideshowSource>,
    still: Option<StaticImageSource>,
    frame: FrameBuffer,
    registry: WallpaperRegistry<D>,
}

impl<R, P, D> SourceMultiplexer<R, P, D>
where
    R: TextureReceiver,
    P: FrameProducer,
    D: DesktopBackground,
{
    /// Captures the current desktop wallpaper and starts idle.
    ///
    /// While idle, the sender called `sender`, or any sender, is picked up as
    /// soon as it delivers a frame.
    pub fn new(receiver: R, producer: P, desktop: D, sender: Option<String>) -> Self {
        Self {
            state: MuxState::Idle,
            texture: SharedTextureSource::new(receiver, sender),
            stream: FileStreamSource::new(producer),
            slideshow: None,
            still: None,
            frame: FrameBuffer::new(),
            registry: WallpaperRegistry::snapshot(desktop),
        }
    }

    #[must_use]
    pub fn tick_period(&self) -> Duration {
        match self.state {
            MuxState::Idle | MuxState::SharedTexture | MuxState::FileStream => STREAM_PERIOD,
            MuxState::Slideshow => SLIDESHOW_PERIOD,
            MuxState::StaticOrDaily => STILL_PERIOD,
        }
    }

    pub fn tick<C: Canvas>(&mut self, presenter: &mut Presenter<C>) -> TickOutcome {
        self.tick_at(Instant::now(), presenter)
    }

    pub fn tick_at<C: Canvas>(
        &mut self,
        now: Instant,
        presenter: &mut Presenter<C>,
    ) -> TickOutcome {
        let outcome = match self.state {
            MuxState::StaticOrDaily => TickOutcome::Unchanged,
            MuxState::Slideshow => self.tick_slideshow(now),
            MuxState::FileStream => self.tick_stream(),
            MuxState::SharedTexture => self.tick_texture(),
            MuxState::Idle => self.tick_idle(),
        };

        match outcome {
            TickOutcome::Drew => {
                if let Err(why) = presenter.draw(&self.frame) {
                    tracing::warn!(?why, "failed to draw frame");
                }
            }
            // the last frame stays up until the stream delivers again
            TickOutcome::Resized | TickOutcome::Spawned | TickOutcome::Looped => (),
            TickOutcome::SlideChanged
            | TickOutcome::Unchanged
            | TickOutcome::Waiting
            | TickOutcome::SwitchedToStill
            | TickOutcome::FellBack => presenter.hide(),
        }

        outcome
    }

    fn tick_slideshow(&mut self, now: Instant) -> TickOutcome {
        let Some(show) = self.slideshow.as_mut() else {
            return self.fall_back();
        };

        let Some(path) = show.poll(now).map(Path::to_path_buf) else {
            return TickOutcome::Unchanged;
        };

        match self.registry.set_image(&path, false) {
            Ok(()) => tracing::info!(path = %path.display(), "slideshow image"),
            Err(why) => tracing::warn!(?why, "slideshow image rejected by the desktop"),
        }

        TickOutcome::SlideChanged
    }

    fn tick_stream(&mut self) -> TickOutcome {
        match self.stream.poll(&mut self.frame) {
            StreamPoll::Frame => TickOutcome::Drew,
            StreamPoll::Spawned => {
                self.registry.mark_covered();
                TickOutcome::Spawned
            }
            StreamPoll::Looped => TickOutcome::Looped,
            StreamPoll::Failed(why) => {
                tracing::error!(?why, "video decoder could not be started");
                self.fall_back()
            }
        }
    }

    fn tick_texture(&mut self) -> TickOutcome {
        match self.texture.poll(&mut self.frame) {
            TexturePoll::Frame => TickOutcome::Drew,
            TexturePoll::Resized { .. } => {
                self.registry.mark_covered();
                TickOutcome::Resized
            }
            TexturePoll::Unavailable if self.still.is_some() => self.switch_to_still(),
            TexturePoll::Unavailable => self.fall_back(),
        }
    }

    fn tick_idle(&mut self) -> TickOutcome {
        match self.texture.poll(&mut self.frame) {
            TexturePoll::Unavailable if self.still.is_some() => self.switch_to_still(),
            TexturePoll::Unavailable => TickOutcome::Waiting,
            poll => {
                tracing::info!(name = ?self.texture.name(), "picked up shared texture sender");
                self.state = MuxState::SharedTexture;
                self.registry.mark_covered();
                if poll == TexturePoll::Frame {
                    TickOutcome::Drew
                } else {
                    TickOutcome::Resized
                }
            }
        }
    }

    /// Shows the still image on record again.
    fn switch_to_still(&mut self) -> TickOutcome {
        let Some(path) = self.still.as_ref().map(|still| still.path().to_path_buf()) else {
            return self.fall_back();
        };

        self.release_all();

        if self.registry.current() != Some(path.as_path()) {
            if let Err(why) = self.registry.set_image(&path, false) {
                tracing::warn!(?why, "could not put the still image back");
            }
        }

        tracing::info!(path = %path.display(), "no sender, showing the still image");
        self.state = MuxState::StaticOrDaily;
        TickOutcome::SwitchedToStill
    }

    fn fall_back(&mut self) -> TickOutcome {
        self.release_all();
        self.registry.restore();
        self.state = MuxState::Idle;
        tracing::info!("falling back to the desktop wallpaper");
        TickOutcome::FellBack
    }

    /// Tears down whichever source is running.
    fn release_all(&mut self) {
        self.stream.stop();
        self.texture.stop();
        self.slideshow = None;
        self.frame.release();
    }

    /// Follows the named sender, or whichever sender appears first.
    ///
    /// # Errors
    ///
    /// Fails if no sender has that name. The current source is kept.
    pub fn select_shared_texture(&mut self, name: Option<&str>) -> Result<(), SourceError> {
        if let Some(name) = name {
            if !self.texture.receiver().is_producer_live(name) {
                return Err(SourceError::NoSender(name.to_owned()));
            }
        }

        self.release_all();
        self.texture.start(name);
        self.state = MuxState::SharedTexture;
        tracing::info!(?name, "showing shared texture");
        Ok(())
    }

    /// Plays a video file in a loop.
    ///
    /// # Errors
    ///
    /// Fails if the file is missing or cannot be probed. The current source is kept.
    pub fn select_video(&mut self, path: &Path) -> Result<(), SourceError> {
        let info = self.stream.prepare(path)?;

        self.release_all();
        self.stream.start(path, info);
        self.state = MuxState::FileStream;
        tracing::info!(path = %path.display(), "showing video");
        Ok(())
    }

    /// # Errors
    ///
    /// Fails if the image is unreadable, keeping the current source, or if the
    /// desktop refuses it, leaving the original wallpaper.
    pub fn select_image(&mut self, path: &Path) -> Result<(), SourceError> {
        self.show_still(StaticImageSource::image(path)?)
    }

    /// # Errors
    ///
    /// Fails if the image is unreadable, keeping the current source, or if the
    /// desktop refuses it, leaving the original wallpaper.
    pub fn select_daily(&mut self, path: &Path, description: &str) -> Result<(), SourceError> {
        self.show_still(StaticImageSource::daily(path, description)?)
    }

    /// Fetches the image of the day and shows it.
    ///
    /// # Errors
    ///
    /// Fails if the provider has no image. The current source is kept.
    pub fn request_daily(
        &mut self,
        provider: &mut impl DailyImageProvider,
    ) -> Result<(), SourceError> {
        let daily = provider.fetch()?;
        self.select_daily(&daily.path, &daily.description())
    }

    /// The image was validated by the caller, so the running source is torn
    /// down first. If the desktop then refuses the image, the multiplexer is
    /// left idle with the original wallpaper.
    fn show_still(&mut self, still: StaticImageSource) -> Result<(), SourceError> {
        self.release_all();

        if let Err(why) = self.registry.set_image(still.path(), false) {
            self.still = None;
            self.registry.restore();
            self.state = MuxState::Idle;
            return Err(why.into());
        }

        tracing::info!(path = %still.path().display(), kind = ?still.kind(), "showing still image");
        self.still = Some(still);
        self.state = MuxState::StaticOrDaily;
        Ok(())
    }

    /// Rotates through `files`, relative to `folder`, every `interval_seconds`.
    ///
    /// # Errors
    ///
    /// Fails if `files` is empty. The current source is kept.
    pub fn select_slideshow(
        &mut self,
        folder: &Path,
        files: Vec<PathBuf>,
        interval_seconds: u64,
        randomize: bool,
    ) -> Result<(), SourceError> {
        let show = SlideshowSource::new(folder, files, interval_seconds, randomize)?;

        self.release_all();
        tracing::info!(
            folder = %folder.display(),
            images = show.files().len(),
            interval = interval_seconds,
            randomize,
            "showing slideshow"
        );
        self.still = None;
        self.slideshow = Some(show);
        self.state = MuxState::Slideshow;
        Ok(())
    }

    /// Stops every source, then keeps the last still image as the permanent
    /// wallpaper or restores the original.
    ///
    /// Returns the kept image, if any.
    pub fn shutdown(&mut self, keep_current_wallpaper: bool) -> Option<PathBuf> {
        let kept = if keep_current_wallpaper {
            self.still
                .as_ref()
                .map(|still| still.path().to_path_buf())
                .or_else(|| match self.state {
                    MuxState::Slideshow => self.registry.current().map(Path::to_path_buf),
                    _ => None,
                })
        } else {
            None
        };

        self.release_all();
        self.state = MuxState::Idle;

        if let Some(path) = kept {
            match self.registry.set_image(&path, true) {
                Ok(()) => {
                    tracing::info!(path = %path.display(), "keeping wallpaper");
                    return Some(path);
                }
                Err(why) => tracing::warn!(?why, "could not keep wallpaper"),
            }
        }

        self.registry.restore();
        None
    }

    /// One-line summary of what is showing.
    #[must_use]
    pub fn describe(&self) -> String {
        match self.state {
            MuxState::Idle => String::from("desktop wallpaper, waiting for a sender"),
            MuxState::SharedTexture => match self.texture.name() {
                Some(name) => format!("sender {name}"),
                None => String::from("first available sender"),
            },
            MuxState::FileStream => match (self.stream.path(), self.stream.info()) {
                (Some(path), Some(info)) => format!(
                    "video {} ({}x{} at {:.2} fps)",
                    path.display(),
                    info.width,
                    info.height,
                    info.frame_rate
                ),
                _ => String::from("video"),
            },
            MuxState::Slideshow => match self.slideshow.as_ref() {
                Some(show) => format!(
                    "slideshow of {} images in {}, {} s each{}",
                    show.files().len(),
                    show.folder().display(),
                    show.interval().as_secs(),
                    if show.is_random() { ", random" } else { "" }
                ),
                None => String::from("slideshow"),
            },
            MuxState::StaticOrDaily => match self.still.as_ref() {
                Some(still) => match still.kind() {
                    StillKind::Image => format!("image {}", still.description()),
                    StillKind::Daily => format!("daily image: {}", still.description()),
                },
                None => String::from("still image"),
            },
        }
    }

    #[must_use]
    pub fn state(&self) -> MuxState {
        self.state
    }

    /// The still image on record, kept as a fallback and for keep-on-exit.
    #[must_use]
    pub fn still(&self) -> Option<&StaticImageSource> {
        self.still.as_ref()
    }

    #[must_use]
    pub fn texture(&self) -> &SharedTextureSource<R> {
        &self.texture
    }

    #[must_use]
    pub fn stream(&self) -> &FileStreamSource<P> {
        &self.stream
    }

    #[must_use]
    pub fn slideshow(&self) -> Option<&SlideshowSource> {
        self.slideshow.as_ref()
    }

    #[must_use]
    pub fn frame(&self) -> &FrameBuffer {
        &self.frame
    }

    #[must_use]
    pub fn registry(&self) -> &WallpaperRegistry<D> {
        &self.registry
    }
}
