//! Encoder process supervision: spawning, monitoring, graceful stop, and
//! startup reconciliation.

mod config;
mod encoder;
mod runner;

pub use config::SupervisorConfig;
pub use encoder::{
    build_encoder_args, EncodePlan, EncoderError, EncoderExit, EncoderLauncher, EncoderProcess,
    FfmpegLauncher, FfmpegProcess,
};
pub use runner::{ProcessSupervisor, SupervisorError};
