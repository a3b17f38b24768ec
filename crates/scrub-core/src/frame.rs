//! Rendered image payloads handed from workers to the display.
//!
//! A render produces one packed `FrameBuffer`. Buffers travel as
//! `SharedFrameBuffer` so the scheduler can hold on to a frame while the
//! display applies backpressure without copying pixels.

use std::sync::Arc;

/// Pixel layout of a rendered frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    /// 8-bit RGBA (32 bits per pixel)
    #[default]
    Rgba8,
}

impl PixelFormat {
    /// Bytes per pixel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8 => 4,
        }
    }
}

/// A plane of pixel data with stride information.
#[derive(Debug, Clone)]
pub struct FramePlane {
    /// Raw pixel data
    pub data: Vec<u8>,
    /// Bytes per row (may include padding)
    pub stride: usize,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    bytes_per_pixel: usize,
}

impl FramePlane {
    /// Create a new zeroed plane with the given dimensions.
    pub fn new(width: u32, height: u32, bytes_per_pixel: usize) -> Self {
        // Align stride to 64 bytes for SIMD and GPU upload
        let min_stride = (width as usize) * bytes_per_pixel;
        let stride = (min_stride + 63) & !63;
        Self {
            data: vec![0u8; stride * height as usize],
            stride,
            width,
            height,
            bytes_per_pixel,
        }
    }

    /// Get a row of pixel data (without padding).
    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.width as usize * self.bytes_per_pixel]
    }

    /// Get a mutable row of pixel data (without padding).
    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.stride;
        let end = start + self.width as usize * self.bytes_per_pixel;
        &mut self.data[start..end]
    }
}

/// A rendered frame in CPU memory.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    /// Pixel format
    pub format: PixelFormat,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel data
    pub plane: FramePlane,
}

impl FrameBuffer {
    /// Create a new frame buffer with the given dimensions and format.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            format,
            width,
            height,
            plane: FramePlane::new(width, height, format.bytes_per_pixel()),
        }
    }

    /// Total memory usage of this frame in bytes.
    pub fn memory_size(&self) -> usize {
        self.plane.data.len()
    }

    /// Create a colour-bars frame whose bars are rotated by `shift` positions.
    ///
    /// Consecutive frames of an animation use consecutive shifts so they are
    /// visually distinct.
    pub fn test_pattern(width: u32, height: u32, shift: u32) -> Self {
        let mut frame = Self::new(width, height, PixelFormat::Rgba8);
        for y in 0..height {
            fill_pattern_row(frame.plane.row_mut(y), width, shift);
        }
        frame
    }
}

const BARS: [[u8; 4]; 8] = [
    [255, 255, 255, 255], // White
    [255, 255, 0, 255],   // Yellow
    [0, 255, 255, 255],   // Cyan
    [0, 255, 0, 255],     // Green
    [255, 0, 255, 255],   // Magenta
    [255, 0, 0, 255],     // Red
    [0, 0, 255, 255],     // Blue
    [0, 0, 0, 255],       // Black
];

/// Fill one RGBA8 row with shifted colour bars.
pub fn fill_pattern_row(row: &mut [u8], width: u32, shift: u32) {
    if width == 0 {
        return;
    }
    for x in 0..width {
        let i = (x * 4) as usize;
        let bar = ((x as u64 * 8 / width as u64) as u32 + shift) % 8;
        row[i..i + 4].copy_from_slice(&BARS[bar as usize]);
    }
}

/// Arc-wrapped frame buffer for shared ownership.
pub type SharedFrameBuffer = Arc<FrameBuffer>;
