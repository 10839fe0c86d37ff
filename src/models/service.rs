//! Service catalog models and the closed set of service states.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::MonitoringSnapshot;
use crate::errors::AppError;

/// Resolved state of a service.
///
/// Monitoring data never yields `Maintenance`; it comes from a notice
/// override or a fixed catalog rule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Up,
    Down,
    Warning,
    Maintenance,
    Na,
}

impl ServiceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceState::Up => "up",
            ServiceState::Down => "down",
            ServiceState::Warning => "warning",
            ServiceState::Maintenance => "maintenance",
            ServiceState::Na => "na",
        }
    }

    /// Sentence shown next to the status indicator.
    pub fn description(&self) -> &'static str {
        match self {
            ServiceState::Up => "The service is up and running.",
            ServiceState::Down => "There are indications the service is down.",
            ServiceState::Warning => "There are issues with the service.",
            ServiceState::Maintenance => "The service is undergoing scheduled maintenance.",
            ServiceState::Na => "No data available.",
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(ServiceState::Up),
            "down" => Ok(ServiceState::Down),
            "warning" => Ok(ServiceState::Warning),
            "maintenance" => Ok(ServiceState::Maintenance),
            "na" => Ok(ServiceState::Na),
            other => Err(format!("unknown service state {:?}", other)),
        }
    }
}

/// Layout column a category is rendered in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "u8", into = "u8")]
pub enum Column {
    One,
    Two,
    Three,
}

impl Column {
    pub const ALL: [Column; 3] = [Column::One, Column::Two, Column::Three];

    pub fn number(&self) -> u8 {
        match self {
            Column::One => 1,
            Column::Two => 2,
            Column::Three => 3,
        }
    }
}

impl TryFrom<u8> for Column {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Column::One),
            2 => Ok(Column::Two),
            3 => Ok(Column::Three),
            other => Err(format!("column must be 1, 2 or 3, got {}", other)),
        }
    }
}

impl From<Column> for u8 {
    fn from(column: Column) -> Self {
        column.number()
    }
}

/// How a service's raw state is derived from the monitoring snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatusRule {
    /// Roll up a whole host
    Host { host: String },
    /// One service check on one host
    Service { host: String, service: String },
    /// Up only when every listed host is up
    AllHosts { hosts: Vec<String> },
    /// Constant state, for services without monitoring
    Fixed { state: ServiceState },
}

impl StatusRule {
    pub fn evaluate(&self, snapshot: &MonitoringSnapshot) -> Result<ServiceState, AppError> {
        match self {
            StatusRule::Host { host } => snapshot.host_state(host),
            StatusRule::Service { host, service } => snapshot.service_state(host, service),
            StatusRule::AllHosts { hosts } => snapshot.all_hosts_state(hosts),
            StatusRule::Fixed { state } => Ok(*state),
        }
    }
}

/// A named group of services shown together.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub column: Column,
    /// Member service ids, in definition order
    pub services: Vec<String>,
}

/// A catalog entry with the state last derived from monitoring data.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    pub display_name: String,
    pub category: String,
    pub rule: StatusRule,
    pub raw_status: ServiceState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_from_str_is_case_insensitive() {
        assert_eq!("WARNING".parse::<ServiceState>(), Ok(ServiceState::Warning));
        assert_eq!(" maintenance ".parse::<ServiceState>(), Ok(ServiceState::Maintenance));
        assert!("sideways".parse::<ServiceState>().is_err());
    }

    #[test]
    fn test_column_bounds() {
        assert_eq!(Column::try_from(2), Ok(Column::Two));
        assert!(Column::try_from(0).is_err());
        assert!(Column::try_from(4).is_err());
        assert_eq!(serde_json::to_string(&Column::Three).unwrap(), "3");
    }

    #[test]
    fn test_rule_deserializes_from_tagged_table() {
        let rule: StatusRule =
            toml::from_str("kind = \"service\"\nhost = \"web1\"\nservice = \"HTTP\"").unwrap();
        assert_eq!(
            rule,
            StatusRule::Service {
                host: "web1".to_string(),
                service: "HTTP".to_string()
            }
        );

        let rule: StatusRule = toml::from_str("kind = \"fixed\"\nstate = \"up\"").unwrap();
        assert_eq!(
            rule,
            StatusRule::Fixed {
                state: ServiceState::Up
            }
        );
    }
}
