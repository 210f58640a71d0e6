//! Pixel transforms.
//!
//! A transform is a pure function from one color and a numeric amount to one
//! color, registered under a name. The [`engine`] applies a transform over a
//! contiguous range of a shared buffer.

pub mod color;
pub mod engine;
pub mod registry;

pub use engine::apply_range;
pub use registry::{TransformEntry, TransformFn, TransformRegistry};
