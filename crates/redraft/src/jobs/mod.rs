//! Background job lifecycle tracking.
//!
//! Uploaded documents get a job record here while OCR runs elsewhere. The
//! manager owns every record, force-fails jobs that process for too long
//! and reclaims finished records after a retention window.

pub mod events;
pub mod manager;
pub mod record;

pub use events::{JobEvent, JobEventBroadcaster};
pub use manager::JobManager;
pub use record::{Job, JobCounts, JobStatus};
