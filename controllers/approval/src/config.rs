//! Controller configuration.
//!
//! Read once at startup from environment variables.

use crate::error::ControllerError;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Runtime configuration for the Approval Controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Namespace to watch (`None` watches all namespaces)
    pub namespace: Option<String>,
    /// Requeue interval after a successful reconciliation
    pub resync_interval: Duration,
    /// Smallest retry delay after a failed reconciliation
    pub backoff_min: Duration,
    /// Largest retry delay after a failed reconciliation
    pub backoff_max: Duration,
    /// Consecutive failures before the failure is written to status conditions
    pub failure_condition_threshold: u32,
    /// Listen address for health probes and metrics
    pub probe_addr: SocketAddr,
    /// Field manager recorded on writes
    pub field_manager: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            resync_interval: Duration::from_secs(300),
            backoff_min: Duration::from_secs(5),
            backoff_max: Duration::from_secs(300),
            failure_condition_threshold: 3,
            probe_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            field_manager: "approval-controller".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, falling back to defaults for unset keys
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let defaults = Self::default();

        let namespace = lookup("WATCH_NAMESPACE").filter(|ns| !ns.trim().is_empty());
        let resync_interval = parse_or(&lookup, "RESYNC_INTERVAL_SECONDS", defaults.resync_interval.as_secs())?;
        let backoff_min = parse_or(&lookup, "BACKOFF_MIN_SECONDS", defaults.backoff_min.as_secs())?;
        let backoff_max = parse_or(&lookup, "BACKOFF_MAX_SECONDS", defaults.backoff_max.as_secs())?;
        let failure_condition_threshold =
            parse_or(&lookup, "FAILURE_CONDITION_THRESHOLD", defaults.failure_condition_threshold)?;
        let probe_addr = parse_or(&lookup, "PROBE_ADDR", defaults.probe_addr)?;

        if backoff_min == 0 {
            return Err(ControllerError::InvalidConfig(
                "BACKOFF_MIN_SECONDS must be greater than zero".to_string(),
            ));
        }
        if backoff_min > backoff_max {
            return Err(ControllerError::InvalidConfig(format!(
                "BACKOFF_MIN_SECONDS ({}) must not exceed BACKOFF_MAX_SECONDS ({})",
                backoff_min, backoff_max
            )));
        }

        Ok(Self {
            namespace,
            resync_interval: Duration::from_secs(resync_interval),
            backoff_min: Duration::from_secs(backoff_min),
            backoff_max: Duration::from_secs(backoff_max),
            failure_condition_threshold,
            probe_addr,
            field_manager: defaults.field_manager,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ControllerError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e| {
            ControllerError::InvalidConfig(format!("{} has invalid value {:?}: {}", key, raw, e))
        }),
    }
}
