//! Audit Log Model
//!
//! Types describing one immutable audit record and the actor it is
//! attributed to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use super::ValidationError;

/// Kind of entity an audit entry refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Node,
    Edge,
    NodeStatus,
    System,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Node => "node",
            EntityType::Edge => "edge",
            EntityType::NodeStatus => "node_status",
            EntityType::System => "system",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "node" => Ok(EntityType::Node),
            "edge" => Ok(EntityType::Edge),
            "node_status" => Ok(EntityType::NodeStatus),
            "system" => Ok(EntityType::System),
            other => Err(ValidationError::UnknownEntityType(other.to_string())),
        }
    }
}

/// Mutation recorded by an audit entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    /// Data recreated or reverted by a restore
    Restore,
    /// Entity removed by a restore
    RestoreDelete,
    Backup,
    RestoreToTimestamp,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
            AuditAction::Restore => "restore",
            AuditAction::RestoreDelete => "restore_delete",
            AuditAction::Backup => "backup",
            AuditAction::RestoreToTimestamp => "restore_to_timestamp",
        }
    }

    /// Entries written by a restore. A timestamp restore never reverses these.
    pub fn is_reversal(&self) -> bool {
        matches!(self, AuditAction::Restore | AuditAction::RestoreDelete)
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(AuditAction::Create),
            "update" => Ok(AuditAction::Update),
            "delete" => Ok(AuditAction::Delete),
            "restore" => Ok(AuditAction::Restore),
            "restore_delete" => Ok(AuditAction::RestoreDelete),
            "backup" => Ok(AuditAction::Backup),
            "restore_to_timestamp" => Ok(AuditAction::RestoreToTimestamp),
            other => Err(ValidationError::UnknownAuditAction(other.to_string())),
        }
    }
}

/// One audit log row with its JSON snapshots decoded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub action: AuditAction,
    pub old_data: Option<Value>,
    pub new_data: Option<Value>,
    pub user_id: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    /// `old_data` as an object, if it is one
    pub fn old_object(&self) -> Option<&serde_json::Map<String, Value>> {
        self.old_data.as_ref().and_then(Value::as_object)
    }
}

/// Who performed a mutation
///
/// Passed explicitly into every mutating call and copied onto each audit
/// entry the call writes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditActor {
    pub user_id: Option<String>,
    pub ip_address: Option<String>,
}

impl AuditActor {
    pub fn new(user_id: Option<String>, ip_address: Option<String>) -> Self {
        Self {
            user_id,
            ip_address,
        }
    }

    /// Anonymous actor for internal and maintenance work
    pub fn system() -> Self {
        Self::default()
    }

    /// Build an actor from request metadata.
    ///
    /// The client address is the first hop of `X-Forwarded-For`, else
    /// `X-Real-IP`, else the socket peer address. Blank values are ignored.
    pub fn from_request(
        user_id: Option<&str>,
        forwarded_for: Option<&str>,
        real_ip: Option<&str>,
        remote_addr: Option<&str>,
    ) -> Self {
        let forwarded = forwarded_for
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty());

        let ip_address = forwarded
            .or_else(|| real_ip.map(str::trim).filter(|v| !v.is_empty()))
            .or_else(|| remote_addr.map(str::trim).filter(|v| !v.is_empty()))
            .map(str::to_string);

        Self {
            user_id: user_id.map(str::to_string),
            ip_address,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_round_trips_through_strings() {
        for ty in [
            EntityType::Node,
            EntityType::Edge,
            EntityType::NodeStatus,
            EntityType::System,
        ] {
            assert_eq!(ty.as_str().parse::<EntityType>().unwrap(), ty);
        }
        assert!("vertex".parse::<EntityType>().is_err());
    }

    #[test]
    fn test_action_serializes_snake_case() {
        let json = serde_json::to_string(&AuditAction::RestoreDelete).unwrap();
        assert_eq!(json, "\"restore_delete\"");
        assert_eq!(
            "restore_to_timestamp".parse::<AuditAction>().unwrap(),
            AuditAction::RestoreToTimestamp
        );
    }

    #[test]
    fn test_only_restore_actions_are_reversals() {
        assert!(AuditAction::Restore.is_reversal());
        assert!(AuditAction::RestoreDelete.is_reversal());
        assert!(!AuditAction::Create.is_reversal());
        assert!(!AuditAction::Delete.is_reversal());
        assert!(!AuditAction::RestoreToTimestamp.is_reversal());
    }

    #[test]
    fn test_actor_prefers_first_forwarded_hop() {
        let actor = AuditActor::from_request(
            Some("alice"),
            Some("203.0.113.7, 10.0.0.1"),
            Some("198.51.100.2"),
            Some("127.0.0.1"),
        );
        assert_eq!(actor.user_id.as_deref(), Some("alice"));
        assert_eq!(actor.ip_address.as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn test_actor_falls_back_to_real_ip_then_remote() {
        let actor = AuditActor::from_request(None, Some("  "), Some("198.51.100.2"), None);
        assert_eq!(actor.ip_address.as_deref(), Some("198.51.100.2"));

        let actor = AuditActor::from_request(None, None, None, Some("127.0.0.1"));
        assert_eq!(actor.ip_address.as_deref(), Some("127.0.0.1"));
        assert_eq!(actor.user_id, None);

        assert_eq!(
            AuditActor::from_request(None, None, None, None),
            AuditActor::system()
        );
    }
}
