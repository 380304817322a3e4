use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

/// Loads `path` when it exists, otherwise returns the built-in defaults.
pub fn load_config_or_default<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::default())
    }
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    let scoring = &config.scoring;
    for (name, value) in [
        ("admission_threshold", scoring.admission_threshold),
        ("high_threshold", scoring.high_threshold),
    ] {
        if value > 100 {
            return Err(ConfigError::Validation {
                message: format!("scoring.{} must be within 0..=100, got {}", name, value),
            });
        }
    }

    if scoring.high_threshold < scoring.admission_threshold {
        return Err(ConfigError::Validation {
            message: format!(
                "scoring.high_threshold ({}) must not be below scoring.admission_threshold ({})",
                scoring.high_threshold, scoring.admission_threshold
            ),
        });
    }

    if scoring.domain_points_cap < scoring.domain_points_each {
        return Err(ConfigError::Validation {
            message: "scoring.domain_points_cap must be at least scoring.domain_points_each"
                .to_string(),
        });
    }

    if config.search.keywords.iter().all(|k| k.trim().is_empty()) {
        return Err(ConfigError::Validation {
            message: "search.keywords must contain at least one keyword".to_string(),
        });
    }

    if config.search.locations.iter().all(|l| l.trim().is_empty()) {
        return Err(ConfigError::Validation {
            message: "search.locations must contain at least one location".to_string(),
        });
    }

    if config.swarm.max_concurrent_workers == 0 {
        return Err(ConfigError::Validation {
            message: "swarm.max_concurrent_workers must be greater than zero".to_string(),
        });
    }

    Ok(())
}
