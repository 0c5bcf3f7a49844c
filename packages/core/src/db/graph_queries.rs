//! Node and Edge Row Access
//!
//! Free functions over a borrowed [`Connection`] so the same statements run
//! inside a service transaction or standalone. Nothing here writes audit
//! entries; callers pair each mutation with its audit insert.

use crate::db::error::DatabaseError;
use crate::models::{EntityData, GraphElement, GraphSnapshot};
use libsql::Connection;

/// Serialize a payload for the `data` column
pub fn encode_data(data: &EntityData) -> Result<String, DatabaseError> {
    serde_json::to_string(data).map_err(|e| DatabaseError::malformed_json("entity payload", e))
}

/// Decode a `data` column; it must hold a JSON object
pub fn decode_data(context: &str, raw: &str) -> Result<EntityData, DatabaseError> {
    serde_json::from_str::<EntityData>(raw).map_err(|e| DatabaseError::malformed_json(context, e))
}

async fn count(
    conn: &Connection,
    sql: &str,
    params: impl libsql::params::IntoParams,
) -> Result<i64, DatabaseError> {
    let mut rows = conn.query(sql, params).await?;
    match rows.next().await? {
        Some(row) => Ok(row.get::<i64>(0)?),
        None => Ok(0),
    }
}

async fn collect_id_data(
    conn: &Connection,
    sql: &str,
    params: impl libsql::params::IntoParams,
) -> Result<Vec<(String, EntityData)>, DatabaseError> {
    let mut rows = conn.query(sql, params).await?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().await? {
        let id: String = row.get(0)?;
        let raw: String = row.get(1)?;
        let data = decode_data(&format!("edge {}", id), &raw)?;
        out.push((id, data));
    }
    Ok(out)
}

// Nodes

pub async fn node_exists(conn: &Connection, id: &str) -> Result<bool, DatabaseError> {
    Ok(count(conn, "SELECT COUNT(*) FROM nodes WHERE id = ?", [id]).await? > 0)
}

/// Stored payload of one node
pub async fn fetch_node_data(conn: &Connection, id: &str) -> Result<Option<EntityData>, DatabaseError> {
    let mut rows = conn
        .query("SELECT data FROM nodes WHERE id = ?", [id])
        .await?;

    match rows.next().await? {
        Some(row) => {
            let raw: String = row.get(0)?;
            Ok(Some(decode_data(&format!("node {}", id), &raw)?))
        }
        None => Ok(None),
    }
}

pub async fn insert_node(
    conn: &Connection,
    id: &str,
    data: &EntityData,
    now: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO nodes (id, data, created_at, updated_at) VALUES (?, ?, ?, ?)",
        (id, encode_data(data)?, now, now),
    )
    .await?;
    Ok(())
}

/// Insert unless the id is taken; returns whether a row was written
pub async fn insert_node_if_absent(
    conn: &Connection,
    id: &str,
    data: &EntityData,
    now: &str,
) -> Result<bool, DatabaseError> {
    let written = conn
        .execute(
            "INSERT OR IGNORE INTO nodes (id, data, created_at, updated_at) VALUES (?, ?, ?, ?)",
            (id, encode_data(data)?, now, now),
        )
        .await?;
    Ok(written > 0)
}

pub async fn update_node_data(
    conn: &Connection,
    id: &str,
    data: &EntityData,
    now: &str,
) -> Result<bool, DatabaseError> {
    let updated = conn
        .execute(
            "UPDATE nodes SET data = ?, updated_at = ? WHERE id = ?",
            (encode_data(data)?, now, id),
        )
        .await?;
    Ok(updated > 0)
}

pub async fn delete_node_row(conn: &Connection, id: &str) -> Result<bool, DatabaseError> {
    let deleted = conn.execute("DELETE FROM nodes WHERE id = ?", [id]).await?;
    Ok(deleted > 0)
}

// Edges

pub async fn edge_exists_by_id(conn: &Connection, id: &str) -> Result<bool, DatabaseError> {
    Ok(count(conn, "SELECT COUNT(*) FROM edges WHERE id = ?", [id]).await? > 0)
}

/// Whether any edge joins `a` and `b`, in either direction
pub async fn edge_exists_between(conn: &Connection, a: &str, b: &str) -> Result<bool, DatabaseError> {
    let n = count(
        conn,
        "SELECT COUNT(*) FROM edges
         WHERE (source = ?1 AND target = ?2)
            OR (source = ?2 AND target = ?1)",
        (a, b),
    )
    .await?;
    Ok(n > 0)
}

pub async fn fetch_edge_data(conn: &Connection, id: &str) -> Result<Option<EntityData>, DatabaseError> {
    let mut rows = conn
        .query("SELECT data FROM edges WHERE id = ?", [id])
        .await?;

    match rows.next().await? {
        Some(row) => {
            let raw: String = row.get(0)?;
            Ok(Some(decode_data(&format!("edge {}", id), &raw)?))
        }
        None => Ok(None),
    }
}

/// Edges with `node_id` at either end, oldest first
pub async fn fetch_incident_edges(
    conn: &Connection,
    node_id: &str,
) -> Result<Vec<(String, EntityData)>, DatabaseError> {
    collect_id_data(
        conn,
        "SELECT id, data FROM edges WHERE source = ?1 OR target = ?1 ORDER BY created_at, rowid",
        [node_id],
    )
    .await
}

/// Edges leaving `source`, oldest first
pub async fn fetch_edges_from(
    conn: &Connection,
    source: &str,
) -> Result<Vec<(String, EntityData)>, DatabaseError> {
    collect_id_data(
        conn,
        "SELECT id, data FROM edges WHERE source = ? ORDER BY created_at, rowid",
        [source],
    )
    .await
}

pub async fn insert_edge(
    conn: &Connection,
    id: &str,
    source: &str,
    target: &str,
    data: &EntityData,
    now: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO edges (id, source, target, data, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?)",
        (id, source, target, encode_data(data)?, now, now),
    )
    .await?;
    Ok(())
}

pub async fn insert_edge_if_absent(
    conn: &Connection,
    id: &str,
    source: &str,
    target: &str,
    data: &EntityData,
    now: &str,
) -> Result<bool, DatabaseError> {
    let written = conn
        .execute(
            "INSERT OR IGNORE INTO edges (id, source, target, data, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            (id, source, target, encode_data(data)?, now, now),
        )
        .await?;
    Ok(written > 0)
}

/// Overwrite endpoints and payload of an existing edge
pub async fn update_edge(
    conn: &Connection,
    id: &str,
    source: &str,
    target: &str,
    data: &EntityData,
    now: &str,
) -> Result<bool, DatabaseError> {
    let updated = conn
        .execute(
            "UPDATE edges SET source = ?, target = ?, data = ?, updated_at = ? WHERE id = ?",
            (source, target, encode_data(data)?, now, id),
        )
        .await?;
    Ok(updated > 0)
}

pub async fn delete_edge_row(conn: &Connection, id: &str) -> Result<bool, DatabaseError> {
    let deleted = conn.execute("DELETE FROM edges WHERE id = ?", [id]).await?;
    Ok(deleted > 0)
}

pub async fn delete_incident_edges(conn: &Connection, node_id: &str) -> Result<u64, DatabaseError> {
    let deleted = conn
        .execute("DELETE FROM edges WHERE source = ?1 OR target = ?1", [node_id])
        .await?;
    Ok(deleted)
}

pub async fn delete_edges_from(conn: &Connection, source: &str) -> Result<u64, DatabaseError> {
    let deleted = conn
        .execute("DELETE FROM edges WHERE source = ?", [source])
        .await?;
    Ok(deleted)
}

/// Read the whole graph, nodes and edges each in creation order
pub async fn load_snapshot(conn: &Connection) -> Result<GraphSnapshot, DatabaseError> {
    let mut snapshot = GraphSnapshot::default();

    let mut rows = conn
        .query("SELECT id, data FROM nodes ORDER BY created_at, rowid", ())
        .await?;
    while let Some(row) = rows.next().await? {
        let id: String = row.get(0)?;
        let raw: String = row.get(1)?;
        snapshot.nodes.push(GraphElement {
            data: decode_data(&format!("node {}", id), &raw)?,
        });
    }

    let mut rows = conn
        .query("SELECT id, data FROM edges ORDER BY created_at, rowid", ())
        .await?;
    while let Some(row) = rows.next().await? {
        let id: String = row.get(0)?;
        let raw: String = row.get(1)?;
        snapshot.edges.push(GraphElement {
            data: decode_data(&format!("edge {}", id), &raw)?,
        });
    }

    Ok(snapshot)
}
