//! Error types for Paintbucket.
//!
//! Uses thiserror for structured errors with context. The taxonomy follows
//! the propagation policy of the job pipeline:
//! - [`JobError`] is surfaced synchronously to callers of `apply`/`cancel`
//! - [`NotificationError`] is discarded and logged, never surfaced
//! - [`WorkerError::WorkerUnavailable`] degrades dispatch instead of failing it

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random ID.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create an ID from a UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", &self.0.to_string()[..8])
            }
        }
    };
}

define_id!(
    /// Unique identifier for a region (one independent pixel buffer).
    RegionId
);

define_id!(
    /// Unique identifier for an assignment (one dispatched job).
    AssignmentId
);

define_id!(
    /// Unique identifier for a worker, stable for the lifetime of the pool.
    WorkerId
);

/// Top-level error type for Paintbucket.
#[derive(Error, Debug)]
pub enum PaintError {
    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Errors surfaced to the caller of a job operation.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JobError {
    #[error("Region {region_id} already has a live job")]
    ConflictingJob { region_id: RegionId },

    #[error("Unknown transform '{name}'")]
    UnknownTransform { name: String },

    #[error("Region {region_id} has no loaded buffer")]
    NotLoaded { region_id: RegionId },

    #[error("Transform '{name}' cannot use parameter '{value}'")]
    InvalidParameter { name: String, value: String },

    #[error("Region {0} not found")]
    RegionNotFound(RegionId),

    #[error("Assignment {assignment_id} not found on region {region_id}")]
    AssignmentNotFound {
        region_id: RegionId,
        assignment_id: AssignmentId,
    },
}

/// Errors from matching a completion notification to its assignment.
///
/// Late or duplicate delivery is expected, so these are only ever logged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotificationError {
    #[error("Stale notification from worker {worker_id} for job {job_id}: {reason}")]
    StaleNotification {
        worker_id: WorkerId,
        job_id: AssignmentId,
        reason: StaleReason,
    },
}

/// Why a notification was considered stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    /// No live assignment carries this job ID.
    UnknownJob,
    /// The assignment never dispatched to this worker.
    UnknownWorker,
    /// The assignment is not accepting completions (not yet working, or finished).
    NotWorking,
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StaleReason::UnknownJob => "unknown job",
            StaleReason::UnknownWorker => "worker was not dispatched",
            StaleReason::NotWorking => "assignment is not working",
        };
        f.write_str(text)
    }
}

/// Errors from the worker pool.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Only {live} of {expected} workers are alive")]
    WorkerUnavailable { expected: usize, live: usize },

    #[error("Failed to spawn worker thread: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("Worker {0} is disconnected")]
    Disconnected(WorkerId),
}

/// Errors from constructing pixel buffers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    #[error("Buffer holds {actual} bytes but {width}x{height} at {stride} bytes per pixel needs {expected}")]
    SizeMismatch {
        width: u32,
        height: u32,
        stride: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Buffer dimensions overflow: {width}x{height}")]
    TooLarge { width: u32, height: u32 },
}

/// Errors from loading a backing store.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to decode '{path}': {error}")]
    Decode {
        path: String,
        #[source]
        error: image::ImageError,
    },

    #[error(transparent)]
    Buffer(#[from] BufferError),
}

/// Errors from loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Failed to parse JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Error Utilities
// ============================================================================

impl JobError {
    /// Get the region this error concerns, if any.
    pub fn region_id(&self) -> Option<RegionId> {
        match self {
            JobError::ConflictingJob { region_id }
            | JobError::NotLoaded { region_id }
            | JobError::AssignmentNotFound { region_id, .. } => Some(*region_id),
            JobError::RegionNotFound(region_id) => Some(*region_id),
            _ => None,
        }
    }

    /// Check if retrying the same request later can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, JobError::ConflictingJob { .. } | JobError::NotLoaded { .. })
    }
}

/// Result type alias for Paintbucket operations.
pub type PaintResult<T> = Result<T, PaintError>;

/// Result type alias for job operations.
pub type JobResult<T> = Result<T, JobError>;
