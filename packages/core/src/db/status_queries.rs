//! Node Status Storage
//!
//! Status rows are appended, never updated. Every read orders by
//! `(created_at DESC, id DESC)` so two writes in the same millisecond still
//! resolve to the later one.

use crate::db::error::DatabaseError;
use crate::models::time::parse_timestamp;
use crate::models::{NodeStatus, StatusValue};
use libsql::{Connection, Row};

fn row_to_status(row: &Row) -> Result<NodeStatus, DatabaseError> {
    let node_id: String = row.get(0)?;
    let status: String = row.get(1)?;
    let created_at: String = row.get(2)?;

    Ok(NodeStatus {
        node_id,
        status: status
            .parse()
            .map_err(|_| DatabaseError::malformed_value("node_status.status", status))?,
        created_at: parse_timestamp(&created_at)
            .ok_or_else(|| DatabaseError::malformed_value("node_status.created_at", created_at))?,
    })
}

async fn collect_statuses(
    conn: &Connection,
    sql: &str,
    params: impl libsql::params::IntoParams,
) -> Result<Vec<NodeStatus>, DatabaseError> {
    let mut rows = conn.query(sql, params).await?;
    let mut statuses = Vec::new();
    while let Some(row) = rows.next().await? {
        statuses.push(row_to_status(&row)?);
    }
    Ok(statuses)
}

pub async fn insert_status(
    conn: &Connection,
    node_id: &str,
    status: StatusValue,
    now: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO node_status (node_id, status, created_at) VALUES (?, ?, ?)",
        (node_id, status.as_str(), now),
    )
    .await?;
    Ok(())
}

/// Most recent row for the node
pub async fn current(conn: &Connection, node_id: &str) -> Result<Option<NodeStatus>, DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT node_id, status, created_at FROM node_status
             WHERE node_id = ?
             ORDER BY created_at DESC, id DESC
             LIMIT 1",
            [node_id],
        )
        .await?;

    match rows.next().await? {
        Some(row) => Ok(Some(row_to_status(&row)?)),
        None => Ok(None),
    }
}

pub async fn history(conn: &Connection, node_id: &str) -> Result<Vec<NodeStatus>, DatabaseError> {
    collect_statuses(
        conn,
        "SELECT node_id, status, created_at FROM node_status
         WHERE node_id = ?
         ORDER BY created_at DESC, id DESC",
        [node_id],
    )
    .await
}

/// Latest row per node, restricted to nodes that still exist, by node id
pub async fn all_current(conn: &Connection) -> Result<Vec<NodeStatus>, DatabaseError> {
    collect_statuses(
        conn,
        "SELECT ns.node_id, ns.status, ns.created_at
         FROM node_status ns
         INNER JOIN nodes n ON n.id = ns.node_id
         WHERE ns.id = (
             SELECT latest.id FROM node_status latest
             WHERE latest.node_id = ns.node_id
             ORDER BY latest.created_at DESC, latest.id DESC
             LIMIT 1
         )
         ORDER BY ns.node_id",
        (),
    )
    .await
}
