//! Relay job model and persistence.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteJobStore;
pub use store::{
    CreateJobRequest, ErrorUpdate, JobFilter, JobStore, JobStoreError, TransitionUpdate,
    UpdateJobRequest,
};
pub use types::{Destination, EncodeParams, Job, JobStatus, Orientation, Schedule, SourceRef};
