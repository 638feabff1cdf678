pub mod config;
pub mod guard;
pub mod history;
pub mod job;
pub mod media;
pub mod metrics;
pub mod orchestrator;
pub mod platform;
pub mod scheduler;
pub mod supervisor;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use guard::{ActiveSlot, CapacityError, ConcurrencyGuard};
pub use job::{Job, JobStatus, JobStore, SqliteJobStore};
pub use orchestrator::{JobOrchestrator, OrchestratorError};
pub use scheduler::{Clock, SchedulerConfig, SchedulerLoop, SystemClock};
pub use supervisor::{ProcessSupervisor, SupervisorConfig, SupervisorError};
