//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (header limits, grace period)
//! - Check that paths the binary will need are well formed
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::ServerConfig;

/// One semantic problem in a config file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check `config`, collecting every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.trim().is_empty() {
        errors.push(ValidationError::new("listener.bind_address", "must not be empty"));
    } else if !config.listener.bind_address.contains(':') {
        errors.push(ValidationError::new("listener.bind_address", "must be host:port or :port"));
    }

    if config.listener.max_header_bytes == Some(0) {
        errors.push(ValidationError::new("listener.max_header_bytes", "must be greater than zero"));
    }

    if config.shutdown.grace_period_secs == 0 {
        errors.push(ValidationError::new("shutdown.grace_period_secs", "must be greater than zero"));
    }

    if let Some(tls) = &config.tls {
        if tls.cert_path.is_empty() {
            errors.push(ValidationError::new("tls.cert_path", "must not be empty"));
        }
        if tls.key_path.is_empty() {
            errors.push(ValidationError::new("tls.key_path", "must not be empty"));
        }
    }

    let static_files = &config.static_files;
    if static_files.enabled {
        if !static_files.public_path.starts_with('/') {
            errors.push(ValidationError::new("static_files.public_path", "must start with '/'"));
        }
        if static_files.root.is_empty() {
            errors.push(ValidationError::new("static_files.root", "must not be empty"));
        }
    }

    if config.observability.log_level.trim().is_empty() {
        errors.push(ValidationError::new("observability.log_level", "must not be empty"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TlsConfig;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn go_style_port_only_address_is_valid() {
        let mut config = ServerConfig::default();
        config.listener.bind_address = ":8080".into();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn reports_every_error() {
        let mut config = ServerConfig::default();
        config.listener.bind_address = String::new();
        config.shutdown.grace_period_secs = 0;
        config.tls = Some(TlsConfig {
            cert_path: String::new(),
            key_path: "key.pem".into(),
        });

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec!["listener.bind_address", "shutdown.grace_period_secs", "tls.cert_path"]
        );
    }

    #[test]
    fn static_prefix_is_checked_only_when_enabled() {
        let mut config = ServerConfig::default();
        config.static_files.public_path = "assets".into();
        assert!(validate_config(&config).is_ok());

        config.static_files.enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].to_string(), "static_files.public_path: must start with '/'");
    }
}
