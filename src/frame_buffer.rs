// SPDX-License-Identifier: MPL-2.0

//! Reusable BGRA pixel buffer shared by the streaming sources.

/// Bytes per BGRA pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// Largest accepted width or height.
pub const MAX_DIMENSION: u32 = 16384;

/// Rows are stored top to bottom.
pub const TOP_DOWN: bool = true;

/// A single BGRA frame whose storage always matches its dimensions.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl FrameBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bytes a `width` × `height` frame occupies.
    #[must_use]
    pub fn frame_len(width: u32, height: u32) -> usize {
        (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(BYTES_PER_PIXEL)
    }

    /// Whether a frame of this size may be allocated.
    #[must_use]
    pub fn accepts(width: u32, height: u32) -> bool {
        (1..=MAX_DIMENSION).contains(&width) && (1..=MAX_DIMENSION).contains(&height)
    }

    /// Reallocates the storage for new dimensions.
    ///
    /// Returns `true` if the dimensions changed. The new storage is zeroed and
    /// holds no valid frame until the next write.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if self.is_allocated() && (self.width, self.height) == (width, height) {
            return false;
        }

        self.width = width;
        self.height = height;
        self.pixels = vec![0; Self::frame_len(width, height)];
        tracing::debug!(width, height, "frame buffer reallocated");
        true
    }

    /// Frees the storage and forgets the dimensions.
    pub fn release(&mut self) {
        self.width = 0;
        self.height = 0;
        self.pixels = Vec::new();
    }

    #[must_use]
    pub fn is_allocated(&self) -> bool {
        !self.pixels.is_empty()
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Bytes per row.
    #[must_use]
    pub fn stride(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }
}
