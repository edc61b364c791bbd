//! Orchestration layer for sequential publishing
//!
//! This module drives a publish client over the ordered package list and
//! reports what happened to each package.

pub mod pacing;
pub mod report;
pub mod sequential_publisher;

// Re-export main types for convenience
pub use pacing::{Pacer, PausePhase, TokioPacer};
pub use report::{PackageReport, PackageStatus, SequenceReport};
pub use sequential_publisher::{SequenceOptions, SequentialPublisher};
