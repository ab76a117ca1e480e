pub mod config;
pub mod error;
pub mod jobs;
pub mod logging;

pub use config::{load_settings, load_settings_from_str, JobSettings};
pub use error::{ConfigError, RedraftError, Result};
pub use jobs::{Job, JobCounts, JobEvent, JobEventBroadcaster, JobManager, JobStatus};
