//! Node Status Model
//!
//! Status is an append-only time series per node; the current status is the
//! newest row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ValidationError;

/// Allowed status values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusValue {
    Unknown,
    Healthy,
    Unhealthy,
    Maintenance,
}

impl StatusValue {
    pub const ALL: [StatusValue; 4] = [
        StatusValue::Unknown,
        StatusValue::Healthy,
        StatusValue::Unhealthy,
        StatusValue::Maintenance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusValue::Unknown => "unknown",
            StatusValue::Healthy => "healthy",
            StatusValue::Unhealthy => "unhealthy",
            StatusValue::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for StatusValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusValue {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StatusValue::ALL
            .into_iter()
            .find(|value| value.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidStatus(s.to_string()))
    }
}

/// One status row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub node_id: String,
    pub status: StatusValue,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_allowed_values() {
        assert_eq!("healthy".parse::<StatusValue>().unwrap(), StatusValue::Healthy);
        assert_eq!(
            "maintenance".parse::<StatusValue>().unwrap(),
            StatusValue::Maintenance
        );
        assert_eq!(
            "degraded".parse::<StatusValue>(),
            Err(ValidationError::InvalidStatus("degraded".to_string()))
        );
    }

    #[test]
    fn test_status_serializes_to_row_shape() {
        let status = NodeStatus {
            node_id: "n1".to_string(),
            status: StatusValue::Unhealthy,
            created_at: DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["node_id"], "n1");
        assert_eq!(value["status"], "unhealthy");
    }
}
