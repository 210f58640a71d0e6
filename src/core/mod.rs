//! Core types shared across the crate.
//!
//! This module contains the foundational pieces the job pipeline is built on:
//! - Value types (colors, parameters, pixel formats)
//! - Canonical and shared pixel buffers
//! - Error types
//! - Scheduler configuration
//! - Per-component event emitters

pub mod types;
pub mod buffer;
pub mod error;
pub mod config;
pub mod events;

// Re-export commonly used types
pub use types::{Color, Parameter, PixelFormat};
pub use buffer::{PixelBuffer, SharedBuffer};
pub use error::{AssignmentId, JobError, PaintError, RegionId, WorkerId};
pub use config::SchedulerConfig;
pub use events::{DeliveryLimit, Event, EventEmitter};
