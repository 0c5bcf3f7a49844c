//! Audit Log Storage
//!
//! Append-only ledger of every mutation. Rows are inserted and read, never
//! updated or deleted. Reads return entries newest-first with the row id as
//! the tie-break for identical timestamps.

use crate::db::error::DatabaseError;
use crate::models::time::{format_timestamp, parse_timestamp};
use crate::models::{AuditAction, AuditActor, AuditEntry, EntityType};
use chrono::{DateTime, Utc};
use libsql::{Connection, Row};
use serde_json::Value;

const AUDIT_COLUMNS: &str =
    "id, entity_type, entity_id, action, old_data, new_data, user_id, ip_address, created_at";

/// One row to append
#[derive(Debug, Clone, Copy)]
pub struct NewAuditEntry<'a> {
    pub entity_type: EntityType,
    pub entity_id: &'a str,
    pub action: AuditAction,
    pub old_data: Option<&'a Value>,
    pub new_data: Option<&'a Value>,
}

fn encode_snapshot(value: Option<&Value>) -> Result<Option<String>, DatabaseError> {
    value
        .map(|v| {
            serde_json::to_string(v).map_err(|e| DatabaseError::malformed_json("audit snapshot", e))
        })
        .transpose()
}

fn decode_snapshot(id: i64, column: &str, raw: Option<String>) -> Result<Option<Value>, DatabaseError> {
    raw.map(|text| {
        serde_json::from_str(&text)
            .map_err(|e| DatabaseError::malformed_json(format!("audit_log {} {}", id, column), e))
    })
    .transpose()
}

fn row_to_entry(row: &Row) -> Result<AuditEntry, DatabaseError> {
    let id: i64 = row.get(0)?;
    let entity_type: String = row.get(1)?;
    let entity_id: String = row.get(2)?;
    let action: String = row.get(3)?;
    let old_data: Option<String> = row.get(4)?;
    let new_data: Option<String> = row.get(5)?;
    let user_id: Option<String> = row.get(6)?;
    let ip_address: Option<String> = row.get(7)?;
    let created_at: String = row.get(8)?;

    Ok(AuditEntry {
        id,
        entity_type: entity_type
            .parse()
            .map_err(|_| DatabaseError::malformed_value("audit_log.entity_type", entity_type))?,
        entity_id,
        action: action
            .parse()
            .map_err(|_| DatabaseError::malformed_value("audit_log.action", action))?,
        old_data: decode_snapshot(id, "old_data", old_data)?,
        new_data: decode_snapshot(id, "new_data", new_data)?,
        user_id,
        ip_address,
        created_at: parse_timestamp(&created_at)
            .ok_or_else(|| DatabaseError::malformed_value("audit_log.created_at", created_at))?,
    })
}

async fn collect_entries(
    conn: &Connection,
    sql: &str,
    params: impl libsql::params::IntoParams,
) -> Result<Vec<AuditEntry>, DatabaseError> {
    let mut rows = conn.query(sql, params).await?;
    let mut entries = Vec::new();
    while let Some(row) = rows.next().await? {
        entries.push(row_to_entry(&row)?);
    }
    Ok(entries)
}

/// Append one entry and return its id
pub async fn append(
    conn: &Connection,
    entry: NewAuditEntry<'_>,
    actor: &AuditActor,
    now: &str,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO audit_log
            (entity_type, entity_id, action, old_data, new_data, user_id, ip_address, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        (
            entry.entity_type.as_str(),
            entry.entity_id,
            entry.action.as_str(),
            encode_snapshot(entry.old_data)?,
            encode_snapshot(entry.new_data)?,
            actor.user_id.as_deref(),
            actor.ip_address.as_deref(),
            now,
        ),
    )
    .await?;

    Ok(conn.last_insert_rowid())
}

/// Entries filtered by type and/or id, newest first
pub async fn history(
    conn: &Connection,
    entity_type: Option<EntityType>,
    entity_id: Option<&str>,
) -> Result<Vec<AuditEntry>, DatabaseError> {
    let sql = format!(
        "SELECT {} FROM audit_log
         WHERE (?1 IS NULL OR entity_type = ?1)
           AND (?2 IS NULL OR entity_id = ?2)
         ORDER BY created_at DESC, id DESC",
        AUDIT_COLUMNS
    );
    collect_entries(conn, &sql, (entity_type.map(|t| t.as_str()), entity_id)).await
}

/// Entries strictly after `timestamp`, newest first
///
/// Stored times are whole microseconds (the store truncates its clock), so
/// comparing against the cutoff truncated to microseconds is exact.
pub async fn entries_after(
    conn: &Connection,
    timestamp: DateTime<Utc>,
) -> Result<Vec<AuditEntry>, DatabaseError> {
    let sql = format!(
        "SELECT {} FROM audit_log
         WHERE created_at > ?
         ORDER BY created_at DESC, id DESC",
        AUDIT_COLUMNS
    );
    collect_entries(conn, &sql, [format_timestamp(timestamp)]).await
}

/// Exact lookup; `None` unless id, type and entity id all match
pub async fn entry_by_id(
    conn: &Connection,
    id: i64,
    entity_type: EntityType,
    entity_id: &str,
) -> Result<Option<AuditEntry>, DatabaseError> {
    let sql = format!(
        "SELECT {} FROM audit_log WHERE id = ? AND entity_type = ? AND entity_id = ?",
        AUDIT_COLUMNS
    );
    let mut rows = conn
        .query(&sql, (id, entity_type.as_str(), entity_id))
        .await?;

    match rows.next().await? {
        Some(row) => Ok(Some(row_to_entry(&row)?)),
        None => Ok(None),
    }
}
