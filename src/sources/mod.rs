// SPDX-License-Identifier: MPL-2.0

//! The five content sources and the capabilities they are built on.

mod file_stream;
mod shared_texture;
mod slideshow;
mod still;


pub use file_stream::{FileStreamSource, StreamPoll};
pub use shared_texture::{SharedTextureSource, TexturePoll};
pub use slideshow::{SlideshowSource, image_files};
pub use still::{StaticImageSource, StillKind};

use crate::error::SourceError;
use std::path::Path;

/// Dimensions reported by a shared-texture producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureFrame {
    pub width: u32,
    pub height: u32,
}

/// Receives frames from an external producer that publishes a named texture.
pub trait TextureReceiver {
    /// Connects to the named producer, or to any producer when `name` is `None`.
    fn attach(&mut self, name: Option<&str>);

    /// Requests the latest frame.
    ///
    /// Pixels are copied into `buf` only when it already has the producer's
    /// size. The producer's dimensions are reported either way.
    fn poll_frame(&mut self, buf: &mut [u8]) -> Option<TextureFrame>;

    /// Whether a producer with this name still exists.
    fn is_producer_live(&self, name: &str) -> bool;

    fn detach(&mut self);

    fn is_attached(&self) -> bool;

    /// Name of the producer currently attached to.
    fn sender_name(&self) -> Option<&str>;
}

/// Metadata read from a video file before playback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The buffer holds a complete frame.
    Frame,
    /// The stream ended or broke before a complete frame was read.
    EndOfStream,
}

/// A process decoding a video file to raw BGRA frames.
pub trait FrameProducer {
    /// # Errors
    ///
    /// Fails if the file is missing or holds no decodable video stream.
    fn probe(&self, path: &Path) -> Result<VideoInfo, SourceError>;

    /// # Errors
    ///
    /// Fails if the decoder cannot be started.
    fn open(&mut self, path: &Path, info: &VideoInfo) -> Result<(), SourceError>;

    /// Reads exactly one frame into `buf`.
    fn read_frame(&mut self, buf: &mut [u8]) -> ReadOutcome;

    /// Stops the decoder. Errors are swallowed.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}
