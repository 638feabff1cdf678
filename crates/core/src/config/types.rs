use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::scheduler::SchedulerConfig;
use crate::supervisor::SupervisorConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub uploads: UploadConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_port() -> u16 {
    8080
}

/// On-disk layout: databases, asset library, scratch space.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// SQLite database for jobs and history.
    #[serde(default = "default_db_path")]
    pub database_path: PathBuf,
    /// Directory holding uploaded media assets.
    #[serde(default = "default_library_dir")]
    pub library_dir: PathBuf,
    /// Scratch directory for generated playlist files.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_db_path(),
            library_dir: default_library_dir(),
            work_dir: default_work_dir(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("relaycast.db")
}

fn default_library_dir() -> PathBuf {
    PathBuf::from("library")
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("work")
}

/// Upload handling limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadConfig {
    /// Maximum concurrent uploads per owner.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: u32,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
        }
    }
}

fn default_max_concurrent() -> u32 {
    2
}

/// Sanitized config for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub supervisor: SupervisorConfig,
    pub scheduler: SchedulerConfig,
    pub uploads: UploadConfig,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            storage: config.storage.clone(),
            supervisor: config.supervisor.clone(),
            scheduler: config.scheduler.clone(),
            uploads: config.uploads.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.database_path, PathBuf::from("relaycast.db"));
        assert_eq!(config.supervisor.grace_period_secs, 5);
        assert_eq!(config.scheduler.tick_interval_secs, 10);
        assert!(config.scheduler.enabled);
        assert_eq!(config.uploads.max_concurrent, 2);
    }
}
