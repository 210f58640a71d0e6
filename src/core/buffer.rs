//! Pixel buffers.
//!
//! A [`PixelBuffer`] is the canonical, single-writer copy of a region's
//! pixels. A [`SharedBuffer`] is the transient working copy that many
//! workers write into at once while a job is live.
//!
//! Workers only ever write disjoint byte ranges of a shared buffer, so the
//! buffer is a plain slice of atomics and needs no lock. Relaxed ordering is
//! enough for the writes themselves: the worker hands its completion
//! notification over a channel after finishing its range, and that hand-off
//! orders the writes before anything the receiving side does next.

use crate::core::error::BufferError;
use crate::core::types::{Color, PixelFormat};
use image::{DynamicImage, RgbImage, RgbaImage};
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};

/// An owned pixel buffer with its dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    bytes: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl PixelBuffer {
    /// Create a buffer, checking that the byte length matches the dimensions.
    pub fn new(bytes: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Result<Self, BufferError> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(format.stride()))
            .ok_or(BufferError::TooLarge { width, height })?;

        if bytes.len() != expected {
            return Err(BufferError::SizeMismatch {
                width,
                height,
                stride: format.stride(),
                expected,
                actual: bytes.len(),
            });
        }

        Ok(Self {
            bytes,
            width,
            height,
            format,
        })
    }

    /// Create a buffer filled with a single color.
    pub fn filled(width: u32, height: u32, format: PixelFormat, color: Color) -> Result<Self, BufferError> {
        let pixel = color.to_array();
        let stride = format.stride();
        let pixels = (width as usize)
            .checked_mul(height as usize)
            .ok_or(BufferError::TooLarge { width, height })?;

        let mut bytes = Vec::with_capacity(pixels * stride);
        for _ in 0..pixels {
            bytes.extend_from_slice(&pixel[..stride]);
        }
        Self::new(bytes, width, height, format)
    }

    /// Convert a decoded image into an RGBA buffer.
    pub fn from_image(image: &DynamicImage) -> Self {
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self {
            bytes: rgba.into_raw(),
            width,
            height,
            format: PixelFormat::Rgba,
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Channel layout.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Number of pixels.
    pub fn pixel_count(&self) -> usize {
        self.bytes.len() / self.format.stride()
    }

    /// Whether the buffer holds no pixels.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Raw interleaved bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the buffer, returning the raw bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Read one pixel.
    pub fn pixel(&self, index: usize) -> Option<Color> {
        let stride = self.format.stride();
        let start = index.checked_mul(stride)?;
        self.bytes
            .get(start..start + stride)
            .and_then(Color::from_channels)
    }

    /// Convert into an `image` buffer for encoding.
    pub fn to_image(&self) -> DynamicImage {
        let image = match self.format {
            PixelFormat::Rgba => RgbaImage::from_raw(self.width, self.height, self.bytes.clone())
                .map(DynamicImage::ImageRgba8),
            PixelFormat::Rgb => RgbImage::from_raw(self.width, self.height, self.bytes.clone())
                .map(DynamicImage::ImageRgb8),
        };
        // Length is checked in `new`, so `from_raw` cannot reject the data.
        image.unwrap_or_else(|| DynamicImage::new_rgba8(self.width, self.height))
    }

    /// Encode to an image file; the format is chosen from the extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), image::ImageError> {
        self.to_image().save(path)
    }
}

/// A fixed-length byte buffer that many workers can write concurrently.
#[derive(Debug)]
pub struct SharedBuffer {
    bytes: Box<[AtomicU8]>,
}

impl SharedBuffer {
    /// Copy bytes into a new shared buffer.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.iter().map(|&b| AtomicU8::new(b)).collect(),
        }
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Read a byte.
    pub fn load(&self, index: usize) -> u8 {
        self.bytes[index].load(Ordering::Relaxed)
    }

    /// Write a byte.
    pub fn store(&self, index: usize, value: u8) {
        self.bytes[index].store(value, Ordering::Relaxed);
    }

    /// Copy the current contents out.
    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes.iter().map(|b| b.load(Ordering::Relaxed)).collect()
    }
}
