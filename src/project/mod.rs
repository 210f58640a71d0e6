//! Regions, their assignments, and the scheduler that drives them.

pub mod assignment;
pub mod poll;
pub mod region;
pub mod scheduler;
pub mod source;

pub use assignment::{Assignment, AssignmentState};
pub use poll::PollLoop;
pub use region::{DispatchReport, ReclaimOutcome, Region, RegionEvent, RegionEventKind};
pub use scheduler::{Scheduler, SchedulerEvent, SchedulerEventKind, TickReport};
pub use source::{BackingStore, ImageFileStore, MemoryStore};
