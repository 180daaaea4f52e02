// SPDX-License-Identifier: MPL-2.0

//! Stand-ins for the external collaborators.

use crate::{
    desktop::{DesktopBackground, DesktopError},
    error::SourceError,
    frame_buffer::FrameBuffer,
    presenter::{Canvas, DrawError, Stretcher},
    sources::{FrameProducer, ReadOutcome, TextureFrame, TextureReceiver, VideoInfo},
};
use std::{
    cell::RefCell,
    collections::BTreeMap,
    path::{Path, PathBuf},
    rc::Rc,
};

#[derive(Debug, Default)]
pub struct FakeDesktop {
    pub wallpaper: PathBuf,
    pub sets: Vec<(PathBuf, bool)>,
    pub fail_sets: bool,
}

impl FakeDesktop {
    pub fn new(wallpaper: &str) -> Self {
        Self {
            wallpaper: PathBuf::from(wallpaper),
            ..Self::default()
        }
    }
}

impl DesktopBackground for FakeDesktop {
    fn get(&self) -> Result<PathBuf, DesktopError> {
        Ok(self.wallpaper.clone())
    }

    fn set(&mut self, path: &Path, persist: bool) -> Result<(), DesktopError> {
        if self.fail_sets {
            return Err(DesktopError::Set {
                path: path.to_path_buf(),
                reason: String::from("refused"),
            });
        }

        self.wallpaper = path.to_path_buf();
        self.sets.push((path.to_path_buf(), persist));
        Ok(())
    }
}

/// Senders visible to a [`FakeReceiver`], shared with the test body.
#[derive(Debug, Clone, Default)]
pub struct SenderBoard(Rc<RefCell<BTreeMap<String, (u32, u32)>>>);

impl SenderBoard {
    pub fn publish(&self, name: &str, width: u32, height: u32) {
        self.0.borrow_mut().insert(name.to_owned(), (width, height));
    }

    pub fn withdraw(&self, name: &str) {
        self.0.borrow_mut().remove(name);
    }
}

#[derive(Debug)]
pub struct FakeReceiver {
    board: SenderBoard,
    attached: Option<String>,
    pub fill: u8,
    /// Producers that exist but deliver no frames.
    pub stalled: bool,
}

impl FakeReceiver {
    pub fn new(board: &SenderBoard) -> Self {
        Self {
            board: board.clone(),
            attached: None,
            fill: 0x7F,
            stalled: false,
        }
    }
}

impl TextureReceiver for FakeReceiver {
    fn attach(&mut self, name: Option<&str>) {
        let senders = self.board.0.borrow();
        self.attached = match name {
            Some(name) => senders.contains_key(name).then(|| name.to_owned()),
            None => senders.keys().next().cloned(),
        };
    }

    fn poll_frame(&mut self, buf: &mut [u8]) -> Option<TextureFrame> {
        if self.stalled {
            return None;
        }

        let name = self.attached.as_ref()?;
        let (width, height) = *self.board.0.borrow().get(name)?;

        if buf.len() == FrameBuffer::frame_len(width, height) {
            buf.fill(self.fill);
        }

        Some(TextureFrame { width, height })
    }

    fn is_producer_live(&self, name: &str) -> bool {
        self.board.0.borrow().contains_key(name)
    }

    fn detach(&mut self) {
        self.attached = None;
    }

    fn is_attached(&self) -> bool {
        self.attached.is_some()
    }

    fn sender_name(&self) -> Option<&str> {
        self.attached.as_deref()
    }
}

/// Yields `frames_per_run` frames per open, then end of stream.
#[derive(Debug)]
pub struct FakeProducer {
    pub info: VideoInfo,
    pub frames_per_run: usize,
    pub fail_probe: bool,
    pub fail_open: bool,
    pub opens: usize,
    pub frames_read: usize,
    remaining: usize,
    open: bool,
}

impl FakeProducer {
    pub fn new(width: u32, height: u32, frames_per_run: usize) -> Self {
        Self {
            info: VideoInfo {
                width,
                height,
                frame_rate: 30.0,
            },
            frames_per_run,
            fail_probe: false,
            fail_open: false,
            opens: 0,
            frames_read: 0,
            remaining: 0,
            open: false,
        }
    }
}

impl FrameProducer for FakeProducer {
    fn probe(&self, path: &Path) -> Result<VideoInfo, SourceError> {
        if self.fail_probe {
            return Err(SourceError::Probe {
                path: path.to_path_buf(),
                reason: String::from("no video stream"),
            });
        }
        Ok(self.info)
    }

    fn open(&mut self, _path: &Path, _info: &VideoInfo) -> Result<(), SourceError> {
        if self.fail_open {
            return Err(SourceError::Spawn {
                program: PathBuf::from("ffmpeg"),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }
        self.opens += 1;
        self.remaining = self.frames_per_run;
        self.open = true;
        Ok(())
    }

    fn read_frame(&mut self, buf: &mut [u8]) -> ReadOutcome {
        if !self.open || self.remaining == 0 {
            return ReadOutcome::EndOfStream;
        }
        self.remaining -= 1;
        self.frames_read += 1;
        buf.fill(0x10);
        ReadOutcome::Frame
    }

    fn close(&mut self) {
        self.open = false;
        self.remaining = 0;
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

/// Records what would have been put on screen.
#[derive(Debug)]
pub struct MemoryCanvas {
    pub size: (u32, u32),
    pub presented: Vec<(u32, u32, usize)>,
    pub pixels: Vec<u8>,
    pub hides: usize,
    /// Surfaces still waiting for their first configure draw nothing.
    pub unconfigured: bool,
}

impl MemoryCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            presented: Vec::new(),
            pixels: vec![0; FrameBuffer::frame_len(width, height)],
            hides: 0,
            unconfigured: false,
        }
    }
}

impl Canvas for MemoryCanvas {
    fn present(
        &mut self,
        frame: &FrameBuffer,
        stretcher: &mut Stretcher,
    ) -> Result<usize, DrawError> {
        if self.unconfigured {
            return Ok(0);
        }

        let (width, height) = self.size;
        stretcher.stretch(frame, &mut self.pixels, width, height)?;
        self.presented
            .push((frame.width(), frame.height(), frame.as_bytes().len()));
        Ok(1)
    }

    fn hide(&mut self) {
        self.hides += 1;
    }
}
