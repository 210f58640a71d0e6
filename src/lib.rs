//! # Paintbucket - Parallel Pixel Transforms
//!
//! Paintbucket applies per-pixel color transforms to image regions by fanning
//! each job out over a pool of worker threads. Every region snapshots its
//! buffer into a shared buffer, the workers write disjoint pixel ranges of it
//! in parallel, and the region folds the result back once every worker has
//! reported.
//!
//! ## Features
//!
//! - **Job lifecycle**: Each job is an assignment moving `Created → Working → Complete`
//! - **Disjoint writes**: Ranges never overlap, so workers never contend on pixels
//! - **Exactly-once completion**: Duplicate and stale notifications are absorbed
//! - **Deadlines**: A job whose worker died is force-completed and flagged partial
//! - **Extensible**: Register custom transforms by name
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use paintbucket::prelude::*;
//! use std::time::Duration;
//!
//! let mut scheduler = Scheduler::with_builtins(SchedulerConfig::default())?;
//! let region = scheduler.add_region(Region::from_file("input.png"))?;
//!
//! scheduler.apply(region, "lighten", 10)?;
//! scheduler.run_until_idle(Duration::from_secs(30));
//!
//! scheduler.region(region).unwrap().buffer().unwrap().save("output.png")?;
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: Value types, pixel buffers, errors, configuration and events
//! - [`transforms`]: Transform registry, built-in color transforms and the range engine
//! - [`pool`]: Work partitioning, worker threads and notification routing
//! - [`project`]: Assignments, regions, the scheduler and its poll loop
//!
//! ## Custom Transforms
//!
//! ```rust,ignore
//! use paintbucket::prelude::*;
//!
//! let mut registry = TransformRegistry::with_builtins();
//! registry.register("sepia", "Warm brown tone", |c: Color, _| {
//!     let r = 0.393 * c.r as f64 + 0.769 * c.g as f64 + 0.189 * c.b as f64;
//!     let g = 0.349 * c.r as f64 + 0.686 * c.g as f64 + 0.168 * c.b as f64;
//!     let b = 0.272 * c.r as f64 + 0.534 * c.g as f64 + 0.131 * c.b as f64;
//!     Color::from_f64(r, g, b, c.a as f64)
//! });
//!
//! let scheduler = Scheduler::new(SchedulerConfig::default(), registry)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod pool;
pub mod project;
pub mod transforms;

/// Prelude module for convenient imports.
///
/// Import everything commonly needed with:
/// ```rust,ignore
/// use paintbucket::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use crate::core::buffer::{PixelBuffer, SharedBuffer};
    pub use crate::core::types::{Color, Parameter, PixelFormat};

    // Errors
    pub use crate::core::error::{
        AssignmentId, BufferError, ConfigError, JobError, JobResult, NotificationError, PaintError,
        PaintResult, RegionId, SourceError, WorkerError, WorkerId,
    };

    // Configuration and events
    pub use crate::core::config::SchedulerConfig;
    pub use crate::core::events::{DeliveryLimit, Event, EventEmitter};

    // Transforms
    pub use crate::transforms::registry::{TransformEntry, TransformRegistry};

    // Pool
    pub use crate::pool::message::Slot;
    pub use crate::pool::partition::{partition, PixelRange};
    pub use crate::pool::pool::WorkerPool;

    // Project
    pub use crate::project::assignment::{Assignment, AssignmentState};
    pub use crate::project::poll::PollLoop;
    pub use crate::project::region::{ReclaimOutcome, Region, RegionEvent, RegionEventKind};
    pub use crate::project::scheduler::{Scheduler, SchedulerEvent, SchedulerEventKind, TickReport};
    pub use crate::project::source::{BackingStore, ImageFileStore, MemoryStore};
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
        assert_eq!(super::NAME, "paintbucket");
    }

    #[test]
    fn test_registry_with_builtins() {
        let registry = TransformRegistry::with_builtins();

        for name in ["lighten", "darken", "brightness", "contrast", "invert", "grayscale"] {
            assert!(registry.contains(name), "missing {}", name);
        }
    }

    #[test]
    fn test_partition_from_prelude() {
        let ranges = partition(10, 3);
        assert_eq!(ranges, vec![PixelRange::new(0, 4), PixelRange::new(4, 8), PixelRange::new(8, 10)]);
    }
}
