//! Notice model: one human-authored incident, maintenance or information record.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use super::ServiceState;

/// Kind of notice, used by the presentation layer for styling.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NoticeType {
    Outage,
    Information,
    Maintenance,
    #[default]
    #[serde(other)]
    Other,
}

/// A parsed notice record.
///
/// Timestamps are resolved in the notice's own timezone and kept with that
/// offset; `updated_at` is the record's modification time on disk.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NoticeType,
    pub title: String,
    pub markup_language: String,
    pub timezone: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expire_at: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta: Option<DateTime<FixedOffset>>,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_state: Option<ServiceState>,
    pub affects: BTreeSet<String>,
    pub updated_at: DateTime<Utc>,
    /// Front-matter keys this service does not interpret
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Notice {
    /// Shown in listings: active, not expired, and already created.
    pub fn is_visible_at(&self, now: DateTime<Utc>) -> bool {
        self.active
            && self.expire_at.map_or(true, |expire| expire >= now)
            && self.created_at.map_or(true, |created| created <= now)
    }

    /// Visible and already started; only these may override a service state.
    pub fn is_in_force_at(&self, now: DateTime<Utc>) -> bool {
        self.is_visible_at(now) && self.starts_at.map_or(true, |starts| starts <= now)
    }

    pub fn affects_service(&self, service_id: &str) -> bool {
        self.affects.contains(service_id)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::TimeZone;

    pub fn at(secs: i64) -> DateTime<FixedOffset> {
        Utc.timestamp_opt(secs, 0).unwrap().fixed_offset()
    }

    pub fn notice(id: &str) -> Notice {
        Notice {
            id: id.to_string(),
            kind: NoticeType::Outage,
            title: format!("Notice {}", id),
            markup_language: "markdown".to_string(),
            timezone: "UTC".to_string(),
            body: String::new(),
            created_at: None,
            starts_at: None,
            expire_at: None,
            eta: None,
            active: true,
            force_state: None,
            affects: BTreeSet::new(),
            updated_at: Utc.timestamp_opt(0, 0).unwrap(),
            extra: BTreeMap::new(),
        }
    }
}
