//! Applies a transform over one range of a shared buffer.

use crate::core::buffer::SharedBuffer;
use crate::core::types::{Color, PixelFormat};
use crate::pool::partition::PixelRange;
use crate::transforms::registry::TransformEntry;

/// Apply `transform` to every pixel of `range`, in place.
///
/// The range is in pixels; it is converted to bytes with the format's stride
/// here and nowhere earlier. Only whole pixels inside the buffer are touched,
/// so a range that runs past the end is clipped. Returns the number of pixels
/// written.
pub fn apply_range(
    buffer: &SharedBuffer,
    range: PixelRange,
    format: PixelFormat,
    transform: &TransformEntry,
    amount: f64,
) -> usize {
    let stride = format.stride();
    let bytes = range.bytes(stride);
    let end = bytes.end.min(buffer.len() - buffer.len() % stride);

    let mut channels = [0u8; 4];
    let mut written = 0;
    let mut offset = bytes.start;

    while offset + stride <= end {
        for (i, channel) in channels.iter_mut().take(stride).enumerate() {
            *channel = buffer.load(offset + i);
        }
        let color = Color::from_channels(&channels[..stride]).unwrap_or(Color::rgb(0, 0, 0));
        let output = transform.apply(color, amount).to_array();

        for (i, value) in output.iter().take(stride).enumerate() {
            buffer.store(offset + i, *value);
        }

        offset += stride;
        written += 1;
    }

    written
}
