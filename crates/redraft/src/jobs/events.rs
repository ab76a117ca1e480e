//! Job lifecycle event stream for real-time status delivery.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::jobs::record::Job;

/// Event emitted after every registry mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum JobEvent {
    /// A job entered the registry.
    Created { job: Job },
    /// A tracked job changed status, progress or failure details.
    Updated { job: Job },
    /// A job left the registry, either through cleanup expiry or manual
    /// removal.
    Removed {
        #[serde(rename = "jobId")]
        job_id: String,
    },
}

impl JobEvent {
    /// Creates a creation event carrying the job snapshot.
    pub fn created(job: &Job) -> Self {
        Self::Created { job: job.clone() }
    }

    /// Creates an update event carrying the post-transition snapshot.
    pub fn updated(job: &Job) -> Self {
        Self::Updated { job: job.clone() }
    }

    /// Creates a removal event.
    pub fn removed(job_id: &str) -> Self {
        Self::Removed {
            job_id: job_id.to_string(),
        }
    }

    /// Returns the id of the job this event concerns.
    pub fn job_id(&self) -> &str {
        match self {
            Self::Created { job } | Self::Updated { job } => &job.id,
            Self::Removed { job_id } => job_id,
        }
    }
}

/// Broadcasts job lifecycle events to any number of subscribers.
#[derive(Clone)]
pub struct JobEventBroadcaster {
    sender: Arc<broadcast::Sender<JobEvent>>,
}

impl JobEventBroadcaster {
    /// Creates a new broadcaster with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Sends an event to all subscribers.
    pub fn send(&self, event: JobEvent) {
        // Ignore errors - no active receivers is fine
        let _ = self.sender.send(event);
    }

    /// Creates a new subscriber for lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }
}

impl Default for JobEventBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcaster_creation() {
        let broadcaster = JobEventBroadcaster::new(10);
        let _rx = broadcaster.subscribe();
    }

    #[test]
    fn test_send_receive() {
        let broadcaster = JobEventBroadcaster::new(10);
        let mut rx = broadcaster.subscribe();

        let job = Job::new("/uploads/test.pdf");
        broadcaster.send(JobEvent::created(&job));

        let received = rx.try_recv().unwrap();
        assert!(matches!(received, JobEvent::Created { .. }));
        assert_eq!(received.job_id(), job.id);
    }

    #[test]
    fn test_send_without_receivers() {
        let broadcaster = JobEventBroadcaster::new(10);
        let job = Job::new("/uploads/test.pdf");

        // Must not panic or error when nobody is listening.
        broadcaster.send(JobEvent::updated(&job));
    }

    #[test]
    fn test_event_job_id() {
        let job = Job::new("/uploads/test.pdf");

        assert_eq!(JobEvent::created(&job).job_id(), job.id);
        assert_eq!(JobEvent::updated(&job).job_id(), job.id);
        assert_eq!(JobEvent::removed("job_x").job_id(), "job_x");
    }

    #[test]
    fn test_event_wire_shape() {
        let value = serde_json::to_value(JobEvent::removed("job_abc")).unwrap();
        assert_eq!(value["type"], "removed");
        assert_eq!(value["jobId"], "job_abc");

        let job = Job::new("/uploads/test.pdf");
        let value = serde_json::to_value(JobEvent::created(&job)).unwrap();
        assert_eq!(value["type"], "created");
        assert_eq!(value["job"]["status"], "queued");
    }

    #[test]
    fn test_default_capacity() {
        let broadcaster = JobEventBroadcaster::default();
        let _rx = broadcaster.subscribe();
    }
}
