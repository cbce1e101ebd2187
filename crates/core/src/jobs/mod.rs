//! Job orchestration.
//!
//! A [`Job`] is one unit of asynchronous transformation work, driven from
//! `queued` through `processing` to a terminal `completed` or `error` state
//! by its own background pipeline task. The [`JobOrchestrator`] owns the job
//! table and the subscriber registry behind a single lock, and fans every
//! state transition out to all live subscribers as immutable snapshots.

mod orchestrator;
mod types;

pub use orchestrator::{JobError, JobOrchestrator, JobSubscription, SubscriberId};
pub use types::{Job, JobSnapshot, JobStatus};
