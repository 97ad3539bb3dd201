//! Competitive admission allocation and the asynchronous enrollment jobs wrapped around it.
//!
//! The allocation engine is a pure function over a program/application snapshot. Jobs run it
//! in the background, track progress in a shared [`JobStore`], and hand the roster to a
//! [`ReportRenderer`] once it is computed.

pub mod allocation;
pub mod domain;
pub mod jobs;
pub mod report;
pub mod router;
pub mod service;
pub mod snapshot;

pub use allocation::{
    compute, AllocationEngine, AllocationOptions, AllocationReport, AllocationStats, TieBreak,
};
pub use domain::{
    summarize, ApplicationId, ApplicationRecord, EnrollmentResult, EnrollmentResults, PersonKey,
    Program, ProgramSummary,
};
pub use jobs::{InMemoryJobStore, JobId, JobRecord, JobStage, JobStore, JobUpdate, UpdateOutcome};
pub use report::{CsvReportRenderer, ReportError, ReportRenderer};
pub use router::enrollment_router;
pub use service::{EnrollmentJobError, EnrollmentJobService, ReportLookupError, ReportSettings};
pub use snapshot::{CsvSnapshotSource, InMemorySnapshotSource, SnapshotError, SnapshotSource};

#[cfg(test)]
mod tests;
