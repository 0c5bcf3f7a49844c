//! gdmon Admin Binary
//!
//! Operator tool for a gdmon graph store: inspect the graph and its audit
//! trail, take backups, and run restores from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Print the whole graph as JSON
//! gdmon-admin snapshot
//!
//! # Audit history of one node
//! gdmon-admin history --entity-type node --entity-id web-1
//!
//! # Undo audit entry 42 of edge e1
//! gdmon-admin restore-entity edge e1 42
//!
//! # Roll the whole graph back
//! gdmon-admin restore-to "2024-05-01 12:00:00"
//! ```
//!
//! # Environment Variables
//!
//! - `GDMON_DB_PATH`, `GDMON_BACKUP_DIR`, `GDMON_BUSY_TIMEOUT_MS`: store settings
//!   (`--db` wins over `GDMON_DB_PATH`)
//! - `RUST_LOG`: Logging level (e.g., "info", "debug", "trace")

use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use gdmon_core::models::time::parse_timestamp;
use gdmon_core::{as_entity_data, AuditActor, EntityData, EntityType, Graph, GraphConfig, StatusValue};

#[derive(Parser)]
#[command(name = "gdmon-admin")]
#[command(author, version, about = "Inspect, back up and restore a gdmon graph store")]
struct Cli {
    /// Storage file (default: $GDMON_DB_PATH or ~/.gdmon/database/graph.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// User recorded on audit entries (default: $USER)
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the storage file and schema if missing
    Init,

    /// Print every node and edge as JSON
    Snapshot,

    /// Create a node
    AddNode {
        id: String,
        /// JSON object payload
        #[arg(long, default_value = "{}")]
        data: String,
    },

    /// Delete a node and its edges
    RemoveNode { id: String },

    /// Create an edge between two existing nodes
    AddEdge {
        id: String,
        source: String,
        target: String,
        /// JSON object payload
        #[arg(long, default_value = "{}")]
        data: String,
    },

    /// Delete an edge
    RemoveEdge { id: String },

    /// Copy the storage file into the backup directory
    Backup {
        /// Backup name (default: backup_<time>_<random>)
        #[arg(long)]
        name: Option<String>,
    },

    /// Print audit entries, newest first
    History {
        /// node, edge, node_status or system
        #[arg(long)]
        entity_type: Option<String>,
        #[arg(long)]
        entity_id: Option<String>,
    },

    /// Reverse one audit entry of one entity
    RestoreEntity {
        /// node or edge
        entity_type: String,
        entity_id: String,
        audit_id: i64,
    },

    /// Reverse every change made after a point in time
    RestoreTo {
        /// `YYYY-MM-DD HH:MM:SS[.ffffff]` (UTC) or RFC 3339
        timestamp: String,
    },

    /// Node status commands
    Status {
        #[command(subcommand)]
        command: StatusCommands,
    },
}

#[derive(Subcommand)]
enum StatusCommands {
    /// Append a status for a node
    Set { node_id: String, status: String },

    /// Current status of one node
    Get { node_id: String },

    /// All statuses of one node, newest first
    History { node_id: String },

    /// Current status of every node
    All,
}

fn parse_data(raw: &str) -> anyhow::Result<EntityData> {
    let value: serde_json::Value =
        serde_json::from_str(raw).with_context(|| format!("--data is not valid JSON: {}", raw))?;
    Ok(as_entity_data(value)?)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = GraphConfig::from_env();
    if let Some(db) = cli.db {
        config.database_path = db;
    }
    config
        .validate()
        .map_err(|msg| anyhow!("invalid configuration: {}", msg))?;

    let graph = Graph::open(&config)
        .await
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;

    let actor = AuditActor::new(
        cli.user.or_else(|| std::env::var("USER").ok()),
        None,
    );
    let service = graph.graph_service();

    match cli.command {
        Commands::Init => {
            println!("store ready at {}", config.database_path.display());
        }
        Commands::Snapshot => print_json(&service.get().await?)?,
        Commands::AddNode { id, data } => {
            let stored = service.add_node(&id, parse_data(&data)?, &actor).await?;
            print_json(&stored)?;
        }
        Commands::RemoveNode { id } => {
            let edges = service.remove_node(&id, &actor).await?;
            println!("removed node {} and {} edge(s)", id, edges.len());
        }
        Commands::AddEdge {
            id,
            source,
            target,
            data,
        } => {
            let stored = service
                .add_edge(&id, &source, &target, parse_data(&data)?, &actor)
                .await?;
            print_json(&stored)?;
        }
        Commands::RemoveEdge { id } => {
            service.remove_edge(&id, &actor).await?;
            println!("removed edge {}", id);
        }
        Commands::Backup { name } => {
            let report = graph.create_backup(name.as_deref(), &actor).await;
            print_json(&report)?;
            if !report.success {
                return Err(anyhow!("backup failed"));
            }
        }
        Commands::History {
            entity_type,
            entity_id,
        } => {
            let entity_type = entity_type
                .map(|t| t.parse::<EntityType>())
                .transpose()?;
            let entries = service
                .audit_history(entity_type, entity_id.as_deref())
                .await?;
            print_json(&entries)?;
        }
        Commands::RestoreEntity {
            entity_type,
            entity_id,
            audit_id,
        } => {
            let entity_type: EntityType = entity_type.parse()?;
            graph
                .restore_service()
                .restore_entity(entity_type, &entity_id, audit_id, &actor)
                .await?;
            println!("restored {} {} from audit entry {}", entity_type, entity_id, audit_id);
        }
        Commands::RestoreTo { timestamp } => {
            let at = parse_timestamp(&timestamp)
                .ok_or_else(|| anyhow!("unrecognised timestamp: {}", timestamp))?;
            let summary = graph
                .restore_service()
                .restore_to_timestamp(at, &actor)
                .await?;
            print_json(&summary)?;
        }
        Commands::Status { command } => match command {
            StatusCommands::Set { node_id, status } => {
                let status: StatusValue = status.parse()?;
                graph
                    .status_service()
                    .set_status(&node_id, status, &actor)
                    .await?;
                println!("{} is now {}", node_id, status);
            }
            StatusCommands::Get { node_id } => {
                match graph.status_service().current(&node_id).await? {
                    Some(status) => print_json(&status)?,
                    None => println!("no status recorded for {}", node_id),
                }
            }
            StatusCommands::History { node_id } => {
                print_json(&graph.status_service().history(&node_id).await?)?;
            }
            StatusCommands::All => print_json(&graph.status_service().all_current().await?)?,
        },
    }

    Ok(())
}
