//! SQLite schema and migrations
//!
//! The schema is versioned. Each migration step is a DDL batch; pending
//! steps and the version bump run inside a single transaction, so a
//! database is always at a whole version. Version 1 created the
//! entities table and its full-text index; version 2 added worlds and
//! campaigns.

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

use crate::storage::error::{StorageError, StorageResult};

/// Schema version this build reads and writes
pub const SCHEMA_VERSION: i32 = 2;

/// Ordered migration steps; each entry is (target version, DDL batch)
const MIGRATIONS: &[(i32, &str)] = &[(1, MIGRATION_V1), (2, MIGRATION_V2)];

/// Version 1: entities plus the trigger-synced full-text index
///
/// `world_id` carries no FOREIGN KEY: the worlds table did not exist
/// yet at this version and SQLite cannot add constraints later.
const MIGRATION_V1: &str = r#"
CREATE TABLE IF NOT EXISTS entities (
    id TEXT PRIMARY KEY,
    type TEXT NOT NULL,
    name TEXT NOT NULL,
    description TEXT,
    secrets TEXT,
    content TEXT,
    summary TEXT,
    notes TEXT,
    tags TEXT NOT NULL DEFAULT '[]',
    connections TEXT,
    world_id TEXT NOT NULL,
    campaign_id TEXT,
    forked_from TEXT,
    session_date TEXT,
    duration REAL,
    created_at TEXT NOT NULL,
    modified_at TEXT NOT NULL,
    type_specific_fields TEXT
);

CREATE INDEX IF NOT EXISTS idx_entities_world_id ON entities(world_id);
CREATE INDEX IF NOT EXISTS idx_entities_type ON entities(type);
CREATE INDEX IF NOT EXISTS idx_entities_modified_at ON entities(modified_at);

-- Full-text index over the searchable text columns (FTS5)
CREATE VIRTUAL TABLE IF NOT EXISTS entity_fts USING fts5(
    name,
    description,
    content,
    notes,
    content='entities',
    content_rowid='rowid'
);

-- Triggers to keep FTS in sync with the entities table
CREATE TRIGGER IF NOT EXISTS entities_ai AFTER INSERT ON entities BEGIN
    INSERT INTO entity_fts(rowid, name, description, content, notes)
    VALUES (NEW.rowid, NEW.name, NEW.description, NEW.content, NEW.notes);
END;

CREATE TRIGGER IF NOT EXISTS entities_ad AFTER DELETE ON entities BEGIN
    INSERT INTO entity_fts(entity_fts, rowid, name, description, content, notes)
    VALUES ('delete', OLD.rowid, OLD.name, OLD.description, OLD.content, OLD.notes);
END;

CREATE TRIGGER IF NOT EXISTS entities_au AFTER UPDATE ON entities BEGIN
    INSERT INTO entity_fts(entity_fts, rowid, name, description, content, notes)
    VALUES ('delete', OLD.rowid, OLD.name, OLD.description, OLD.content, OLD.notes);
    INSERT INTO entity_fts(rowid, name, description, content, notes)
    VALUES (NEW.rowid, NEW.name, NEW.description, NEW.content, NEW.notes);
END;
"#;

/// Version 2: worlds and campaigns
const MIGRATION_V2: &str = r#"
CREATE TABLE IF NOT EXISTS worlds (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    created_at TEXT NOT NULL,
    modified_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS campaigns (
    id TEXT PRIMARY KEY,
    world_id TEXT NOT NULL REFERENCES worlds(id),
    name TEXT NOT NULL,
    description TEXT,
    created_at TEXT NOT NULL,
    modified_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_campaigns_world_id ON campaigns(world_id);
"#;

/// Get the schema version recorded in the database
///
/// Returns 0 for a database that has never been migrated.
pub fn schema_version(conn: &Connection) -> rusqlite::Result<i32> {
    let table_exists: bool = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'")?
        .exists([])?;
    if !table_exists {
        return Ok(0);
    }
    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version WHERE id = 1", [], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(version.unwrap_or(0))
}

/// Bring the database up to [`SCHEMA_VERSION`]
///
/// Applies every pending migration step, in order, inside one
/// transaction; the version marker is written in the same transaction.
/// A database already at the current version is a no-op. A database
/// reporting a version newer than this build refuses to open; versions
/// are never downgraded.
pub fn migrate(conn: &mut Connection) -> StorageResult<()> {
    let current = schema_version(conn).map_err(|e| init_error("could not read schema version", e))?;

    if current > SCHEMA_VERSION {
        return Err(StorageError::Initialization {
            message: format!(
                "database is at schema version {}, but this build supports at most version {}",
                current, SCHEMA_VERSION
            ),
            source: None,
        });
    }
    if current == SCHEMA_VERSION {
        debug!(version = current, "schema already current");
        return Ok(());
    }

    let tx = conn
        .transaction()
        .map_err(|e| init_error("could not begin migration transaction", e))?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL
        );",
    )
    .map_err(|e| init_error("could not create schema_version table", e))?;

    for (version, ddl) in MIGRATIONS {
        if *version <= current {
            continue;
        }
        tx.execute_batch(ddl)
            .map_err(|e| init_error(format!("migration to schema version {} failed", version), e))?;
        info!(version, "applied schema migration");
    }

    tx.execute(
        "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?)",
        [SCHEMA_VERSION],
    )
    .map_err(|e| init_error("could not record schema version", e))?;

    tx.commit()
        .map_err(|e| init_error("could not commit schema migration", e))?;

    Ok(())
}

fn init_error(message: impl Into<String>, source: rusqlite::Error) -> StorageError {
    StorageError::Initialization {
        message: message.into(),
        source: Some(source),
    }
}
