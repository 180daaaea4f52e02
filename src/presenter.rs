// SPDX-License-Identifier: MPL-2.0

//! Stretching frames onto the drawing surface at a bounded frame rate.

use crate::frame_buffer::FrameBuffer;
use fast_image_resize::{
    ImageBufferError, PixelType, ResizeAlg, ResizeError, ResizeOptions, Resizer,
    images::{Image, ImageRef},
};
use std::{
    thread,
    time::{Duration, Instant},
};

#[derive(Debug, thiserror::Error)]
pub enum DrawError {
    #[error("frame does not fit its dimensions")]
    Buffer(#[from] ImageBufferError),
    #[error("stretch failed")]
    Resize(#[from] ResizeError),
    #[error("target holds {actual} bytes, {expected} expected")]
    TargetSize { actual: usize, expected: usize },
    #[error("failed to allocate a surface buffer")]
    Allocate(#[from] sctk::shm::slot::CreateBufferError),
    #[error("failed to create a buffer pool")]
    Pool(#[from] sctk::shm::CreatePoolError),
}

/// A surface frames are drawn onto.
pub trait Canvas {
    /// Draws the frame on every ready surface and returns how many were drawn.
    ///
    /// # Errors
    ///
    /// Fails if a surface buffer cannot be allocated or filled.
    fn present(&mut self, frame: &FrameBuffer, stretcher: &mut Stretcher)
    -> Result<usize, DrawError>;

    /// Takes the surface off screen so the desktop background shows.
    fn hide(&mut self);
}

/// Nearest-neighbour stretch of BGRA frames.
pub struct Stretcher {
    resizer: Resizer,
    options: ResizeOptions,
}

impl Default for Stretcher {
    fn default() -> Self {
        Self {
            resizer: Resizer::new(),
            options: ResizeOptions::new().resize_alg(ResizeAlg::Nearest),
        }
    }
}

impl std::fmt::Debug for Stretcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stretcher").finish_non_exhaustive()
    }
}

impl Stretcher {
    /// Fills `target`, a `width` × `height` BGRA or XRGB8888 surface, with the frame.
    ///
    /// # Errors
    ///
    /// Fails if `target` has the wrong length or the frame is empty.
    pub fn stretch(
        &mut self,
        frame: &FrameBuffer,
        target: &mut [u8],
        width: u32,
        height: u32,
    ) -> Result<(), DrawError> {
        let expected = FrameBuffer::frame_len(width, height);
        if target.len() != expected {
            return Err(DrawError::TargetSize {
                actual: target.len(),
                expected,
            });
        }

        if frame.dimensions() == (width, height) {
            target.copy_from_slice(frame.as_bytes());
            return Ok(());
        }

        let src = ImageRef::new(frame.width(), frame.height(), frame.as_bytes(), PixelType::U8x4)?;
        let mut dst = Image::from_slice_u8(width, height, target, PixelType::U8x4)?;
        self.resizer.resize(&src, &mut dst, &self.options)?;
        Ok(())
    }
}

/// Keeps draws at least `1 / fps` apart.
#[derive(Debug)]
pub struct FramePacer {
    period: Option<Duration>,
    last: Option<Instant>,
}

impl FramePacer {
    /// An `fps` of zero disables pacing.
    #[must_use]
    pub fn new(fps: u32) -> Self {
        Self {
            period: (fps > 0).then(|| Duration::from_secs(1) / fps),
            last: None,
        }
    }

    /// Time left before the next draw may happen.
    #[must_use]
    pub fn remaining(&self, now: Instant) -> Duration {
        match (self.period, self.last) {
            (Some(period), Some(last)) => period.saturating_sub(now.saturating_duration_since(last)),
            _ => Duration::ZERO,
        }
    }

    pub fn mark(&mut self, at: Instant) {
        self.last = Some(at);
    }

    /// Sleeps off the rest of the frame period, then marks a draw.
    pub fn pace(&mut self) {
        let wait = self.remaining(Instant::now());
        if !wait.is_zero() {
            thread::sleep(wait);
        }
        self.mark(Instant::now());
    }
}

/// Draws frame buffers onto a [`Canvas`].
#[derive(Debug)]
pub struct Presenter<C> {
    canvas: C,
    stretcher: Stretcher,
    pacer: FramePacer,
    visible: bool,
}

impl<C: Canvas> Presenter<C> {
    pub fn new(canvas: C, fps: u32) -> Self {
        Self {
            canvas,
            stretcher: Stretcher::default(),
            pacer: FramePacer::new(fps),
            visible: false,
        }
    }

    /// Stretches the frame over the canvas, then paces if anything was drawn.
    ///
    /// # Errors
    ///
    /// Fails if the canvas cannot draw the frame.
    pub fn draw(&mut self, frame: &FrameBuffer) -> Result<usize, DrawError> {
        if !frame.is_allocated() {
            return Ok(0);
        }

        let drawn = self.canvas.present(frame, &mut self.stretcher)?;
        // surfaces may exist before their first configure
        self.visible = true;
        if drawn > 0 {
            self.pacer.pace();
        }
        Ok(drawn)
    }

    pub fn hide(&mut self) {
        if self.visible {
            tracing::debug!("hiding wallpaper surface");
            self.canvas.hide();
            self.visible = false;
        }
    }

    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    #[must_use]
    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut C {
        &mut self.canvas
    }
}
