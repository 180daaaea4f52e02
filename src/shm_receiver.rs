// SPDX-License-Identifier: MPL-2.0

//! Shared-texture transport over files in a sender directory.
//!
//! Every sender owns one `<name>.frame` file, usually on a tmpfs. The file
//! starts with a 32-byte little-endian header followed by the BGRA pixels of
//! the latest frame:
//!
//! | offset | size | field         |
//! |--------|------|---------------|
//! | 0      | 4    | magic `LWTX`  |
//! | 4      | 4    | version (1)   |
//! | 8      | 4    | width         |
//! | 12     | 4    | height        |
//! | 16     | 8    | frame counter |
//! | 24     | 8    | reserved      |

use crate::{
    frame_buffer::FrameBuffer,
    sources::{TextureFrame, TextureReceiver},
};
use std::{
    fs::File,
    io,
    os::unix::fs::{FileExt, MetadataExt},
    path::{Path, PathBuf},
};

const MAGIC: &[u8; 4] = b"LWTX";
const VERSION: u32 = 1;
const HEADER_LEN: usize = 32;
const EXTENSION: &str = "frame";

/// A sender found in the sender directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderInfo {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub frame: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Header {
    width: u32,
    height: u32,
    frame: u64,
}

impl Header {
    fn parse(bytes: &[u8; HEADER_LEN]) -> Option<Self> {
        if &bytes[0..4] != MAGIC {
            return None;
        }

        let word = |at: usize| {
            u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };

        if word(4) != VERSION {
            return None;
        }

        let (width, height) = (word(8), word(12));
        if !FrameBuffer::accepts(width, height) {
            return None;
        }

        let mut frame = [0; 8];
        frame.copy_from_slice(&bytes[16..24]);

        Some(Self {
            width,
            height,
            frame: u64::from_le_bytes(frame),
        })
    }

    /// Reads the header of a file that holds a whole frame.
    fn read(file: &File) -> Option<Self> {
        let mut bytes = [0; HEADER_LEN];
        file.read_exact_at(&mut bytes, 0).ok()?;
        let header = Self::parse(&bytes)?;

        let needed = (HEADER_LEN + FrameBuffer::frame_len(header.width, header.height)) as u64;
        if file.metadata().ok()?.len() < needed {
            return None;
        }

        Some(header)
    }
}

#[derive(Debug)]
struct Attached {
    name: String,
    path: PathBuf,
    file: File,
    inode: u64,
}

/// Receives frames published by senders in a directory.
#[derive(Debug)]
pub struct ShmReceiver {
    dir: PathBuf,
    attached: Option<Attached>,
}

impl ShmReceiver {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            attached: None,
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn sender_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{EXTENSION}"))
    }

    /// Sender names in the directory, sorted.
    fn sender_names(&self) -> Vec<String> {
        let Ok(entries) = self.dir.read_dir() else {
            return Vec::new();
        };

        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == EXTENSION))
            .filter_map(|path| path.file_stem()?.to_str().map(ToOwned::to_owned))
            .collect();

        names.sort();
        names
    }

    /// Senders currently publishing, with their frame sizes.
    #[must_use]
    pub fn list_senders(&self) -> Vec<SenderInfo> {
        self.sender_names()
            .into_iter()
            .filter_map(|name| {
                let file = File::open(self.sender_path(&name)).ok()?;
                let header = Header::read(&file)?;
                Some(SenderInfo {
                    name,
                    width: header.width,
                    height: header.height,
                    frame: header.frame,
                })
            })
            .collect()
    }

    fn open(&self, name: &str) -> io::Result<Attached> {
        let path = self.sender_path(name);
        let file = File::open(&path)?;
        let inode = file.metadata()?.ino();
        Ok(Attached {
            name: name.to_owned(),
            path,
            file,
            inode,
        })
    }

    /// Whether the attached file is still the one published under its name.
    fn is_current(attached: &Attached) -> bool {
        std::fs::metadata(&attached.path).is_ok_and(|meta| meta.ino() == attached.inode)
    }
}

impl TextureReceiver for ShmReceiver {
    fn attach(&mut self, name: Option<&str>) {
        let name = match name {
            Some(name) => Some(name.to_owned()),
            None => self.list_senders().into_iter().next().map(|sender| sender.name),
        };

        self.attached = name.and_then(|name| match self.open(&name) {
            Ok(attached) => {
                tracing::debug!(name = %name, "attached to sender");
                Some(attached)
            }
            Err(why) => {
                tracing::trace!(name = %name, ?why, "sender not available");
                None
            }
        });
    }

    fn poll_frame(&mut self, buf: &mut [u8]) -> Option<TextureFrame> {
        let attached = self.attached.as_ref()?;

        // the sender may have replaced its file
        if !Self::is_current(attached) {
            let name = attached.name.clone();
            self.attached = self.open(&name).ok();
        }

        let attached = self.attached.as_ref()?;
        let header = Header::read(&attached.file)?;

        if buf.len() == FrameBuffer::frame_len(header.width, header.height) {
            attached.file.read_exact_at(buf, HEADER_LEN as u64).ok()?;
        }

        Some(TextureFrame {
            width: header.width,
            height: header.height,
        })
    }

    fn is_producer_live(&self, name: &str) -> bool {
        self.sender_path(name).is_file()
    }

    fn detach(&mut self) {
        self.attached = None;
    }

    fn is_attached(&self) -> bool {
        self.attached.is_some()
    }

    fn sender_name(&self) -> Option<&str> {
        self.attached.as_ref().map(|attached| attached.name.as_str())
    }
}
