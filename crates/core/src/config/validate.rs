use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Scheduler tick interval is within the supported range
/// - Upload concurrency limit is non-zero
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.scheduler.enabled
        && !(5..=15).contains(&config.scheduler.tick_interval_secs)
    {
        return Err(ConfigError::ValidationError(format!(
            "scheduler.tick_interval_secs must be between 5 and 15, got {}",
            config.scheduler.tick_interval_secs
        )));
    }

    if config.uploads.max_concurrent == 0 {
        return Err(ConfigError::ValidationError(
            "uploads.max_concurrent cannot be 0".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = Config::default();
        config.server.port = 0;
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_tick_interval_out_of_range() {
        let mut config = Config::default();
        config.scheduler.tick_interval_secs = 60;
        assert!(validate_config(&config).is_err());

        // Out-of-range interval is fine when the loop is disabled.
        config.scheduler.enabled = false;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_zero_upload_limit() {
        let mut config = Config::default();
        config.uploads.max_concurrent = 0;
        assert!(validate_config(&config).is_err());
    }
}
