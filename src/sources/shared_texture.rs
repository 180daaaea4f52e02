// SPDX-License-Identifier: MPL-2.0

use super::{TextureFrame, TextureReceiver};
use crate::frame_buffer::FrameBuffer;

/// What a shared-texture poll produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TexturePoll {
    /// The frame buffer holds a new frame.
    Frame,
    /// The producer changed size and the frame buffer was reallocated.
    Resized { width: u32, height: u32 },
    /// No frame this tick.
    Unavailable,
}

/// Follows a named texture producer, or whichever producer appears first.
#[derive(Debug)]
pub struct SharedTextureSource<R> {
    receiver: R,
    name: Option<String>,
}

impl<R: TextureReceiver> SharedTextureSource<R> {
    pub fn new(receiver: R, name: Option<String>) -> Self {
        Self { receiver, name }
    }

    /// Remembers `name` and attaches to it.
    pub fn start(&mut self, name: Option<&str>) {
        self.receiver.detach();
        self.name = name.map(ToOwned::to_owned);
        self.receiver.attach(name);
    }

    pub fn stop(&mut self) {
        if self.receiver.is_attached() {
            tracing::debug!(name = ?self.name, "detaching shared texture receiver");
        }
        self.receiver.detach();
    }

    pub fn poll(&mut self, frame: &mut FrameBuffer) -> TexturePoll {
        if !self.receiver.is_attached() {
            self.receiver.attach(self.name.as_deref());
        }

        match self.receiver.poll_frame(frame.as_bytes_mut()) {
            Some(TextureFrame { width, height }) if FrameBuffer::accepts(width, height) => {
                if self.name.is_none() {
                    self.name = self.receiver.sender_name().map(ToOwned::to_owned);
                }

                if frame.resize(width, height) {
                    tracing::info!(name = ?self.name, width, height, "shared texture size changed");
                    TexturePoll::Resized { width, height }
                } else {
                    TexturePoll::Frame
                }
            }

            _ => {
                if let Some(name) = self.name.as_deref() {
                    if !self.receiver.is_producer_live(name) {
                        tracing::info!(name, "shared texture sender is gone");
                        self.name = None;
                    }
                }

                self.receiver.detach();
                frame.release();
                TexturePoll::Unavailable
            }
        }
    }

    /// The remembered producer name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.receiver.is_attached()
    }

    #[must_use]
    pub fn receiver(&self) -> &R {
        &self.receiver
    }
}
