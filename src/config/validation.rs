//! Configuration validation.
//!
//! Serde handles the syntactic side; this module checks semantics: value
//! ranges, required cross-field combinations, and address syntax. All
//! errors are collected and returned together, not just the first.

use thiserror::Error;

use crate::config::schema::HubConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("node_name must not be empty")]
    EmptyNodeName,

    #[error("at least one remote server is required")]
    NoRemoteServers,

    #[error("remote server {0} must use http or https")]
    UnsupportedScheme(String),

    #[error("heartbeat_timeout_secs must be greater than zero")]
    ZeroHeartbeatTimeout,

    #[error("coordination is enabled but no server_url is configured")]
    MissingCoordinationServer,

    #[error("gc.frequency_mins must be greater than zero")]
    ZeroGcFrequency,

    #[error("health_check.interval_secs must be greater than zero")]
    ZeroHealthInterval,

    #[error("listener.bind_address {0} is not a valid socket address")]
    InvalidBindAddress(String),
}

/// Validate a configuration, returning every problem found.
pub fn validate_config(config: &HubConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.node_name.is_empty() {
        errors.push(ValidationError::EmptyNodeName);
    }

    if config.remote_servers.is_empty() {
        errors.push(ValidationError::NoRemoteServers);
    }
    for server in &config.remote_servers {
        if !matches!(server.scheme(), "http" | "https") {
            errors.push(ValidationError::UnsupportedScheme(server.to_string()));
        }
    }

    if config.heartbeat_timeout_secs == 0 {
        errors.push(ValidationError::ZeroHeartbeatTimeout);
    }

    if config.coordination.enabled && config.coordination.server_url.is_none() {
        errors.push(ValidationError::MissingCoordinationServer);
    }

    if config.gc.frequency_mins == 0 {
        errors.push(ValidationError::ZeroGcFrequency);
    }

    if config.health_check.interval_secs == 0 {
        errors.push(ValidationError::ZeroHealthInterval);
    }

    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
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
    use url::Url;

    fn valid_config() -> HubConfig {
        let mut config = HubConfig::default();
        config.node_name = "edge-0".into();
        config.remote_servers = vec![Url::parse("http://10.0.0.1:6443").unwrap()];
        config
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_empty_config_collects_all_errors() {
        let errors = validate_config(&HubConfig::default()).unwrap_err();
        assert!(errors.contains(&ValidationError::EmptyNodeName));
        assert!(errors.contains(&ValidationError::NoRemoteServers));
        assert!(errors.len() >= 2);
    }

    #[test]
    fn test_bad_scheme_rejected() {
        let mut config = valid_config();
        config.remote_servers = vec![Url::parse("ftp://10.0.0.1/").unwrap()];
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::UnsupportedScheme(_)));
    }

    #[test]
    fn test_coordination_requires_server_url() {
        let mut config = valid_config();
        config.coordination.enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::MissingCoordinationServer));

        config.coordination.server_url = Some(Url::parse("http://10.0.1.1:6444").unwrap());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_bad_bind_address_rejected() {
        let mut config = valid_config();
        config.listener.bind_address = "not-an-address".into();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidBindAddress(_))));
    }
}
