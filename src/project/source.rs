//! Backing stores a region loads its pixels from.

use crate::core::buffer::PixelBuffer;
use crate::core::error::SourceError;
use std::fmt;
use std::path::{Path, PathBuf};

/// Where a region's pixels come from.
pub trait BackingStore: Send {
    /// Produce the initial pixel buffer.
    fn load(&mut self) -> Result<PixelBuffer, SourceError>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// In-memory backing store.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    buffer: PixelBuffer,
}

impl MemoryStore {
    /// Wrap an existing buffer.
    pub fn new(buffer: PixelBuffer) -> Self {
        Self { buffer }
    }
}

impl BackingStore for MemoryStore {
    fn load(&mut self) -> Result<PixelBuffer, SourceError> {
        Ok(self.buffer.clone())
    }

    fn describe(&self) -> String {
        format!("memory {}x{}", self.buffer.width(), self.buffer.height())
    }
}

/// Image-file backing store. Decodes to RGBA8 on load.
#[derive(Debug, Clone)]
pub struct ImageFileStore {
    path: PathBuf,
}

impl ImageFileStore {
    /// Point at an image file. Nothing is read until [`BackingStore::load`].
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The image path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BackingStore for ImageFileStore {
    fn load(&mut self) -> Result<PixelBuffer, SourceError> {
        let image = image::open(&self.path).map_err(|error| SourceError::Decode {
            path: self.path.display().to_string(),
            error,
        })?;
        Ok(PixelBuffer::from_image(&image))
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

impl fmt::Debug for dyn BackingStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Color, PixelFormat};

    #[test]
    fn test_memory_store() {
        let buffer = PixelBuffer::filled(2, 1, PixelFormat::Rgb, Color::rgb(4, 5, 6)).unwrap();
        let mut store = MemoryStore::new(buffer.clone());
        assert_eq!(store.load().unwrap(), buffer);
        assert_eq!(store.describe(), "memory 2x1");
    }

    #[test]
    fn test_image_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tile.png");
        let buffer = PixelBuffer::filled(3, 2, PixelFormat::Rgba, Color::new(10, 20, 30, 40)).unwrap();
        buffer.save(&path).unwrap();

        let mut store = ImageFileStore::new(&path);
        let loaded = store.load().unwrap();
        assert_eq!(loaded, buffer);
        assert!(store.describe().contains("tile.png"));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ImageFileStore::new(dir.path().join("missing.png"));
        assert!(matches!(store.load(), Err(SourceError::Decode { .. })));
    }
}
