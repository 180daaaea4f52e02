// SPDX-License-Identifier: MPL-2.0

use super::{FrameProducer, ReadOutcome, VideoInfo};
use crate::{error::SourceError, frame_buffer::FrameBuffer};
use std::path::{Path, PathBuf};

/// What a file stream poll produced.
#[derive(Debug)]
pub enum StreamPoll {
    /// The frame buffer holds a new frame.
    Frame,
    /// The decoder was started, frames follow on the next tick.
    Spawned,
    /// The file ended and the decoder was restarted.
    Looped,
    /// The decoder could not be started.
    Failed(SourceError),
}

#[derive(Debug)]
struct Stream {
    path: PathBuf,
    info: VideoInfo,
}

/// Plays a video file in a loop through a [`FrameProducer`].
#[derive(Debug)]
pub struct FileStreamSource<P> {
    producer: P,
    stream: Option<Stream>,
}

impl<P: FrameProducer> FileStreamSource<P> {
    pub fn new(producer: P) -> Self {
        Self {
            producer,
            stream: None,
        }
    }

    /// Reads the metadata of `path` without touching the current stream.
    ///
    /// # Errors
    ///
    /// Fails if the file is missing or cannot be probed.
    pub fn prepare(&self, path: &Path) -> Result<VideoInfo, SourceError> {
        let info = self.producer.probe(path)?;
        tracing::debug!(path = %path.display(), ?info, "probed video");
        Ok(info)
    }

    /// Adopts a probed file. The decoder starts on the next poll.
    pub fn start(&mut self, path: &Path, info: VideoInfo) {
        self.stop();
        self.stream = Some(Stream {
            path: path.to_path_buf(),
            info,
        });
    }

    pub fn stop(&mut self) {
        if self.producer.is_open() {
            tracing::debug!(path = ?self.path(), "stopping video decoder");
        }
        self.producer.close();
        self.stream = None;
    }

    pub fn poll(&mut self, frame: &mut FrameBuffer) -> StreamPoll {
        let Some(stream) = self.stream.as_ref() else {
            return StreamPoll::Failed(SourceError::MissingFile(PathBuf::new()));
        };

        if !self.producer.is_open() {
            if let Err(why) = self.producer.open(&stream.path, &stream.info) {
                return StreamPoll::Failed(why);
            }

            frame.resize(stream.info.width, stream.info.height);
            tracing::info!(
                path = %stream.path.display(),
                width = stream.info.width,
                height = stream.info.height,
                frame_rate = stream.info.frame_rate,
                "video playback started"
            );
            return StreamPoll::Spawned;
        }

        match self.producer.read_frame(frame.as_bytes_mut()) {
            ReadOutcome::Frame => StreamPoll::Frame,
            ReadOutcome::EndOfStream => {
                tracing::debug!(path = %stream.path.display(), "end of video, looping");
                self.producer.close();
                match self.producer.open(&stream.path, &stream.info) {
                    Ok(()) => StreamPoll::Looped,
                    Err(why) => StreamPoll::Failed(why),
                }
            }
        }
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.stream.as_ref().map(|stream| stream.path.as_path())
    }

    #[must_use]
    pub fn info(&self) -> Option<&VideoInfo> {
        self.stream.as_ref().map(|stream| &stream.info)
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.producer.is_open()
    }

    #[must_use]
    pub fn producer(&self) -> &P {
        &self.producer
    }
}
