//! Monitoring snapshot written by the external monitor.
//!
//! The top-level shape is checked when the document is parsed; individual
//! host and service entries are decoded lazily so one odd entry only affects
//! the services that look at it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ServiceState;
use crate::errors::AppError;

const STATE_OK: i64 = 0;
const STATE_WARNING: i64 = 1;

/// Whole monitoring document, replaced wholesale on every load.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MonitoringSnapshot {
    #[serde(default)]
    pub hosts: BTreeMap<String, Value>,
    #[serde(default)]
    pub services: BTreeMap<String, BTreeMap<String, Value>>,
}

/// Decoded `{current_state, is_flapping}` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitoredState {
    pub current_state: i64,
    pub is_flapping: bool,
}

impl MonitoredState {
    pub fn from_value(entry: &str, value: &Value) -> Result<Self, AppError> {
        let current_state = value
            .get("current_state")
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                AppError::SnapshotFormat(format!("{}: current_state is not an integer", entry))
            })?;

        let is_flapping = match value.get("is_flapping") {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::Number(n)) => n.as_i64() != Some(0),
            _ => {
                return Err(AppError::SnapshotFormat(format!(
                    "{}: is_flapping is neither integer nor boolean",
                    entry
                )))
            }
        };

        Ok(Self {
            current_state,
            is_flapping,
        })
    }
}

impl MonitoringSnapshot {
    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        serde_json::from_str(raw)
            .map_err(|e| AppError::SnapshotFormat(format!("Invalid monitoring snapshot: {}", e)))
    }

    /// Host rollup: flapping is a warning, state 0 is up, anything else down.
    ///
    /// A host missing from the snapshot is neither up nor flapping, so down.
    pub fn host_state(&self, host: &str) -> Result<ServiceState, AppError> {
        let Some(value) = self.hosts.get(host) else {
            return Ok(ServiceState::Down);
        };
        let state = MonitoredState::from_value(host, value)?;

        Ok(if state.is_flapping {
            ServiceState::Warning
        } else if state.current_state == STATE_OK {
            ServiceState::Up
        } else {
            ServiceState::Down
        })
    }

    /// Single check on a host; a check missing from the snapshot has no data.
    pub fn service_state(&self, host: &str, service: &str) -> Result<ServiceState, AppError> {
        let Some(value) = self.services.get(host).and_then(|checks| checks.get(service)) else {
            return Ok(ServiceState::Na);
        };
        let state = MonitoredState::from_value(&format!("{}/{}", host, service), value)?;

        Ok(
            if state.is_flapping || state.current_state == STATE_WARNING {
                ServiceState::Warning
            } else if state.current_state == STATE_OK {
                ServiceState::Up
            } else {
                ServiceState::Down
            },
        )
    }

    /// Up when every listed host is present and in state 0.
    pub fn all_hosts_state(&self, hosts: &[String]) -> Result<ServiceState, AppError> {
        for host in hosts {
            let up = match self.hosts.get(host) {
                Some(value) => MonitoredState::from_value(host, value)?.current_state == STATE_OK,
                None => false,
            };
            if !up {
                return Ok(ServiceState::Down);
            }
        }
        Ok(ServiceState::Up)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot() -> MonitoringSnapshot {
        serde_json::from_value(json!({
            "hosts": {
                "web1": { "current_state": 0, "is_flapping": 0 },
                "web2": { "current_state": 0, "is_flapping": true },
                "db1": { "current_state": 1, "is_flapping": false },
                "odd": { "current_state": "up", "is_flapping": 0 }
            },
            "services": {
                "web1": {
                    "HTTP": { "current_state": 0, "is_flapping": 0 },
                    "HTTPS": { "current_state": 1, "is_flapping": 0 },
                    "SMTP": { "current_state": 2, "is_flapping": 0 },
                    "IMAP": { "current_state": 0, "is_flapping": 1 }
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_service_state_mapping() {
        let snap = snapshot();
        assert_eq!(snap.service_state("web1", "HTTP"), Ok(ServiceState::Up));
        assert_eq!(snap.service_state("web1", "HTTPS"), Ok(ServiceState::Warning));
        assert_eq!(snap.service_state("web1", "SMTP"), Ok(ServiceState::Down));
        assert_eq!(snap.service_state("web1", "IMAP"), Ok(ServiceState::Warning));
        assert_eq!(snap.service_state("web1", "FTP"), Ok(ServiceState::Na));
        assert_eq!(snap.service_state("nohost", "HTTP"), Ok(ServiceState::Na));
    }

    #[test]
    fn test_host_state_mapping() {
        let snap = snapshot();
        assert_eq!(snap.host_state("web1"), Ok(ServiceState::Up));
        assert_eq!(snap.host_state("web2"), Ok(ServiceState::Warning));
        assert_eq!(snap.host_state("db1"), Ok(ServiceState::Down));
        assert_eq!(snap.host_state("ghost"), Ok(ServiceState::Down));
        assert!(snap.host_state("odd").is_err());
    }

    #[test]
    fn test_missing_host_is_down_but_missing_check_is_na() {
        let snap = MonitoringSnapshot::from_json(r#"{"hosts": {}, "services": {}}"#).unwrap();
        assert_eq!(snap.host_state("mx1"), Ok(ServiceState::Down));
        assert_eq!(snap.service_state("mx1", "SMTP"), Ok(ServiceState::Na));
        assert_eq!(snap.all_hosts_state(&["mx1".to_string()]), Ok(ServiceState::Down));
    }

    #[test]
    fn test_all_hosts_state() {
        let snap = snapshot();
        let hosts = |names: &[&str]| names.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(snap.all_hosts_state(&hosts(&["web1", "web2"])), Ok(ServiceState::Up));
        assert_eq!(snap.all_hosts_state(&hosts(&["web1", "db1"])), Ok(ServiceState::Down));
        assert_eq!(snap.all_hosts_state(&hosts(&["web1", "ghost"])), Ok(ServiceState::Down));
    }

    #[test]
    fn test_structurally_invalid_document() {
        assert!(MonitoringSnapshot::from_json("{ not json").is_err());
        assert!(MonitoringSnapshot::from_json(r#"{"hosts": 5}"#).is_err());
        assert!(MonitoringSnapshot::from_json(r#"{"hosts": {}, "services": {}}"#).is_ok());
    }
}
