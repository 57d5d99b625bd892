//! Entity store
//!
//! `EntityStore` owns the SQLite connection and is the only write path
//! into the database. Tags and connections are stored as JSON columns
//! and queried with `json_each`. Full-text search runs against an FTS5
//! index that triggers keep in sync with the entities table.

use chrono::Utc;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, ToSql};
use std::fs;
use tracing::debug;
use uuid::Uuid;

use crate::config::Config;
use crate::models::{Campaign, Entity, EntityRef, EntityType, World};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::row::{
    format_timestamp, parse_timestamp, parse_uuid, EntityRow, SearchResultRow, ENTITY_COLUMNS,
};
use crate::storage::schema::{self, SCHEMA_VERSION};

/// Marker placed before a matched term in search snippets
pub const HIGHLIGHT_START: &str = "<b>";
/// Marker placed after a matched term in search snippets
pub const HIGHLIGHT_END: &str = "</b>";

const SNIPPET_ELLIPSIS: &str = "…";

/// SQLite-backed store for worlds, campaigns, and entities
#[derive(Debug)]
pub struct EntityStore {
    conn: Connection,
    read_only: bool,
}

impl EntityStore {
    // ==================== Lifecycle ====================

    /// Open the store at the configured database path
    ///
    /// Creates the data directory and the database on first open, sets
    /// WAL journaling and foreign keys, and migrates the schema before
    /// returning. In read-only mode nothing is created and the database
    /// must already be at the current schema version.
    pub fn open(config: &Config) -> StorageResult<Self> {
        let path = config.database_path();

        if config.read_only {
            let conn = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY)
                .map_err(|e| StorageError::Initialization {
                    message: format!("could not open database at {}", path.display()),
                    source: Some(e),
                })?;
            conn.execute_batch("PRAGMA foreign_keys = ON;").map_err(|e| {
                StorageError::Initialization {
                    message: "could not configure database pragmas".to_string(),
                    source: Some(e),
                }
            })?;
            let version = schema::schema_version(&conn).map_err(|e| {
                StorageError::Initialization {
                    message: "could not read schema version".to_string(),
                    source: Some(e),
                }
            })?;
            if version != SCHEMA_VERSION {
                return Err(StorageError::Initialization {
                    message: format!(
                        "read-only database is at schema version {}, expected {}",
                        version, SCHEMA_VERSION
                    ),
                    source: None,
                });
            }
            debug!(path = %path.display(), "opened store read-only");
            return Ok(Self {
                conn,
                read_only: true,
            });
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut conn = Connection::open(&path).map_err(|e| StorageError::Initialization {
            message: format!("could not open database at {}", path.display()),
            source: Some(e),
        })?;
        // Pragmas are set before any migration runs
        conn.execute_batch("PRAGMA journal_mode = WAL;\nPRAGMA foreign_keys = ON;")
            .map_err(|e| StorageError::Initialization {
                message: "could not configure database pragmas".to_string(),
                source: Some(e),
            })?;
        schema::migrate(&mut conn)?;
        debug!(path = %path.display(), "opened store");
        Ok(Self {
            conn,
            read_only: false,
        })
    }

    /// Open an in-memory store, mainly for tests and scratch work
    pub fn open_in_memory() -> StorageResult<Self> {
        let mut conn =
            Connection::open_in_memory().map_err(|e| StorageError::Initialization {
                message: "could not open in-memory database".to_string(),
                source: Some(e),
            })?;
        conn.execute_batch("PRAGMA foreign_keys = ON;").map_err(|e| {
            StorageError::Initialization {
                message: "could not configure database pragmas".to_string(),
                source: Some(e),
            }
        })?;
        schema::migrate(&mut conn)?;
        Ok(Self {
            conn,
            read_only: false,
        })
    }

    /// Close the store, flushing SQLite state to disk
    pub fn close(self) -> StorageResult<()> {
        self.conn.close().map_err(|(_, e)| StorageError::Database(e))
    }

    /// Whether this store was opened read-only
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Direct access to the underlying connection
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Schema version of the open database
    pub fn schema_version(&self) -> StorageResult<i32> {
        Ok(schema::schema_version(&self.conn)?)
    }

    // ==================== World Operations ====================

    /// Insert a new world
    pub fn create_world(&self, world: &World) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO worlds (id, name, description, created_at, modified_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                world.id.to_string(),
                world.name,
                world.description,
                format_timestamp(&world.created_at),
                format_timestamp(&world.modified_at),
            ],
        )?;
        debug!(id = %world.id, name = %world.name, "created world");
        Ok(())
    }

    /// Get a world by id, or `None` if it does not exist
    pub fn get_world(&self, id: Uuid) -> StorageResult<Option<World>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, description, created_at, modified_at
                 FROM worlds WHERE id = ?1",
                [id.to_string()],
                world_tuple,
            )
            .optional()?;
        row.map(hydrate_world).transpose()
    }

    /// List all worlds, ordered by name
    pub fn list_worlds(&self) -> StorageResult<Vec<World>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, created_at, modified_at
             FROM worlds ORDER BY name",
        )?;
        let rows = stmt
            .query_map([], world_tuple)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(hydrate_world).collect()
    }

    /// Update a world's name and description, refreshing its
    /// modification time
    pub fn update_world(&self, world: &World) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE worlds SET name = ?1, description = ?2, modified_at = ?3 WHERE id = ?4",
            params![
                world.name,
                world.description,
                format_timestamp(&Utc::now()),
                world.id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(StorageError::not_found("world", world.id.to_string()));
        }
        Ok(())
    }

    /// Delete a world
    ///
    /// Fails while campaigns still reference the world. Entities are
    /// not constrained and keep their world_id.
    pub fn delete_world(&self, id: Uuid) -> StorageResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM worlds WHERE id = ?1", [id.to_string()])?;
        if changed == 0 {
            return Err(StorageError::not_found("world", id.to_string()));
        }
        debug!(%id, "deleted world");
        Ok(())
    }

    /// Count of worlds
    pub fn world_count(&self) -> StorageResult<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM worlds", [], |row| row.get(0))?)
    }

    // ==================== Campaign Operations ====================

    /// Insert a new campaign
    ///
    /// The referenced world must exist.
    pub fn create_campaign(&self, campaign: &Campaign) -> StorageResult<()> {
        if self.get_world(campaign.world_id)?.is_none() {
            return Err(StorageError::not_found(
                "world",
                campaign.world_id.to_string(),
            ));
        }
        self.conn.execute(
            "INSERT INTO campaigns (id, world_id, name, description, created_at, modified_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                campaign.id.to_string(),
                campaign.world_id.to_string(),
                campaign.name,
                campaign.description,
                format_timestamp(&campaign.created_at),
                format_timestamp(&campaign.modified_at),
            ],
        )?;
        debug!(id = %campaign.id, name = %campaign.name, "created campaign");
        Ok(())
    }

    /// Get a campaign by id, or `None` if it does not exist
    pub fn get_campaign(&self, id: Uuid) -> StorageResult<Option<Campaign>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, world_id, name, description, created_at, modified_at
                 FROM campaigns WHERE id = ?1",
                [id.to_string()],
                campaign_tuple,
            )
            .optional()?;
        row.map(hydrate_campaign).transpose()
    }

    /// List campaigns, optionally scoped to one world, ordered by name
    pub fn list_campaigns(&self, world_id: Option<Uuid>) -> StorageResult<Vec<Campaign>> {
        let rows = match world_id {
            Some(world_id) => {
                let mut stmt = self.conn.prepare(
                    "SELECT id, world_id, name, description, created_at, modified_at
                     FROM campaigns WHERE world_id = ?1 ORDER BY name",
                )?;
                let mapped = stmt.query_map([world_id.to_string()], campaign_tuple)?;
                mapped.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = self.conn.prepare(
                    "SELECT id, world_id, name, description, created_at, modified_at
                     FROM campaigns ORDER BY name",
                )?;
                let mapped = stmt.query_map([], campaign_tuple)?;
                mapped.collect::<Result<Vec<_>, _>>()?
            }
        };
        rows.into_iter().map(hydrate_campaign).collect()
    }

    /// Update a campaign's name and description, refreshing its
    /// modification time
    pub fn update_campaign(&self, campaign: &Campaign) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE campaigns SET name = ?1, description = ?2, modified_at = ?3 WHERE id = ?4",
            params![
                campaign.name,
                campaign.description,
                format_timestamp(&Utc::now()),
                campaign.id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(StorageError::not_found("campaign", campaign.id.to_string()));
        }
        Ok(())
    }

    /// Delete a campaign
    pub fn delete_campaign(&self, id: Uuid) -> StorageResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM campaigns WHERE id = ?1", [id.to_string()])?;
        if changed == 0 {
            return Err(StorageError::not_found("campaign", id.to_string()));
        }
        debug!(%id, "deleted campaign");
        Ok(())
    }

    // ==================== Entity Operations ====================

    /// Insert a new entity
    pub fn create_entity(&self, entity: &Entity) -> StorageResult<()> {
        self.validate_entity(entity)?;
        let row = EntityRow::from_entity(entity)?;
        self.conn.execute(
            "INSERT INTO entities (id, type, name, description, secrets, content, summary, \
             notes, tags, connections, world_id, campaign_id, forked_from, session_date, \
             duration, created_at, modified_at, type_specific_fields)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                row.id,
                row.entity_type,
                row.name,
                row.description,
                row.secrets,
                row.content,
                row.summary,
                row.notes,
                row.tags,
                row.connections,
                row.world_id,
                row.campaign_id,
                row.forked_from,
                row.session_date,
                row.duration,
                row.created_at,
                row.modified_at,
                row.type_specific_fields,
            ],
        )?;
        debug!(id = %entity.id, entity_type = %entity.entity_type, "created entity");
        Ok(())
    }

    /// Get an entity by id
    ///
    /// Returns `Ok(None)` when no entity has this id.
    pub fn get_entity(&self, id: Uuid) -> StorageResult<Option<Entity>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {ENTITY_COLUMNS} FROM entities WHERE id = ?1"),
                [id.to_string()],
                EntityRow::from_sql_row,
            )
            .optional()?;
        row.map(EntityRow::into_entity).transpose()
    }

    /// Update an existing entity, refreshing its modification time
    ///
    /// `created_at` is never rewritten.
    pub fn update_entity(&self, entity: &Entity) -> StorageResult<()> {
        self.validate_entity(entity)?;
        let mut row = EntityRow::from_entity(entity)?;
        row.modified_at = format_timestamp(&Utc::now());
        let changed = self.conn.execute(
            "UPDATE entities SET type = ?1, name = ?2, description = ?3, secrets = ?4, \
             content = ?5, summary = ?6, notes = ?7, tags = ?8, connections = ?9, \
             world_id = ?10, campaign_id = ?11, forked_from = ?12, session_date = ?13, \
             duration = ?14, modified_at = ?15, type_specific_fields = ?16
             WHERE id = ?17",
            params![
                row.entity_type,
                row.name,
                row.description,
                row.secrets,
                row.content,
                row.summary,
                row.notes,
                row.tags,
                row.connections,
                row.world_id,
                row.campaign_id,
                row.forked_from,
                row.session_date,
                row.duration,
                row.modified_at,
                row.type_specific_fields,
                row.id,
            ],
        )?;
        if changed == 0 {
            return Err(StorageError::not_found("entity", entity.id.to_string()));
        }
        Ok(())
    }

    /// Delete an entity and scrub connections that point at it
    ///
    /// The row delete and the connection cleanup on referencing
    /// entities commit as one transaction. Cleanup does not touch the
    /// referencers' modification times.
    pub fn delete_entity(&mut self, id: Uuid) -> StorageResult<()> {
        let id_str = id.to_string();
        let tx = self.conn.transaction()?;

        let changed = tx.execute("DELETE FROM entities WHERE id = ?1", [&id_str])?;
        if changed == 0 {
            return Err(StorageError::not_found("entity", id_str));
        }

        // Entities whose connections list mentions the deleted id
        let referencers: Vec<(String, String)> = {
            let mut stmt = tx.prepare(
                "SELECT id, connections FROM entities
                 WHERE connections IS NOT NULL
                   AND EXISTS (
                       SELECT 1 FROM json_each(entities.connections)
                       WHERE json_extract(json_each.value, '$.id') = ?1
                   )",
            )?;
            let rows = stmt.query_map([&id_str], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        for (referencer_id, connections_json) in referencers {
            let mut connections: Vec<EntityRef> = serde_json::from_str(&connections_json)
                .map_err(|e| StorageError::Corrupt {
                    kind: "entity",
                    column: "connections",
                    id: referencer_id.clone(),
                    details: e.to_string(),
                })?;
            connections.retain(|c| c.id != id);
            let encoded = if connections.is_empty() {
                None
            } else {
                Some(serde_json::to_string(&connections).map_err(|e| {
                    StorageError::Serialize {
                        column: "connections",
                        source: e,
                    }
                })?)
            };
            tx.execute(
                "UPDATE entities SET connections = ?1 WHERE id = ?2",
                params![encoded, referencer_id],
            )?;
        }

        tx.commit()?;
        debug!(%id, "deleted entity");
        Ok(())
    }

    /// List entities in a world, newest modification first
    pub fn list_entities(
        &self,
        world_id: Uuid,
        entity_type: Option<EntityType>,
    ) -> StorageResult<Vec<Entity>> {
        let world_id = world_id.to_string();
        let type_str = entity_type.map(|t| t.as_str());

        let mut sql = format!("SELECT {ENTITY_COLUMNS} FROM entities WHERE world_id = ?");
        let mut params: Vec<&dyn ToSql> = vec![&world_id];
        if let Some(ref type_str) = type_str {
            sql.push_str(" AND type = ?");
            params.push(type_str);
        }
        sql.push_str(" ORDER BY modified_at DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params.as_slice(), EntityRow::from_sql_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(EntityRow::into_entity).collect()
    }

    /// List entities carrying the given tag, newest modification first
    pub fn entities_by_tag(&self, tag: &str) -> StorageResult<Vec<Entity>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTITY_COLUMNS} FROM entities
             WHERE EXISTS (
                 SELECT 1 FROM json_each(entities.tags) WHERE json_each.value = ?1
             )
             ORDER BY modified_at DESC"
        ))?;
        let rows = stmt
            .query_map([tag], EntityRow::from_sql_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(EntityRow::into_entity).collect()
    }

    /// Count entities, optionally scoped to one world
    pub fn entity_count(&self, world_id: Option<Uuid>) -> StorageResult<i64> {
        match world_id {
            Some(world_id) => Ok(self.conn.query_row(
                "SELECT COUNT(*) FROM entities WHERE world_id = ?1",
                [world_id.to_string()],
                |row| row.get(0),
            )?),
            None => Ok(self
                .conn
                .query_row("SELECT COUNT(*) FROM entities", [], |row| row.get(0))?),
        }
    }

    /// Entity ids starting with the given text prefix
    ///
    /// Backs short-id lookup in the CLI.
    pub fn entity_ids_with_prefix(&self, prefix: &str) -> StorageResult<Vec<Uuid>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM entities WHERE id LIKE ?1 || '%' ORDER BY id")?;
        let ids = stmt
            .query_map([prefix], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        ids.iter()
            .map(|id| parse_uuid("entity", "id", id, id))
            .collect()
    }

    fn validate_entity(&self, entity: &Entity) -> StorageResult<()> {
        if let Some(fields) = entity.type_specific_fields.as_ref() {
            if fields.entity_type() != entity.entity_type {
                return Err(StorageError::Validation(format!(
                    "type-specific fields for {} cannot be attached to a {} entity",
                    fields.entity_type(),
                    entity.entity_type
                )));
            }
        }
        Ok(())
    }

    // ==================== Tag Operations ====================

    /// All tags in use, with usage counts, most used first
    pub fn all_tags(&self) -> StorageResult<Vec<(String, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT json_each.value AS tag, COUNT(*) AS uses
             FROM entities, json_each(entities.tags)
             GROUP BY tag
             ORDER BY uses DESC, tag",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let tags = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    }

    // ==================== Full-Text Search ====================

    /// Run a full-text query, returning raw ranked matches
    ///
    /// Results come back in ascending bm25 rank, best match first.
    /// Snippets wrap matched terms in [`HIGHLIGHT_START`] and
    /// [`HIGHLIGHT_END`].
    pub fn search_raw(
        &self,
        query: &str,
        entity_type: Option<EntityType>,
        tag: Option<&str>,
    ) -> StorageResult<Vec<SearchResultRow>> {
        let mut sql = format!(
            "SELECT e.id, rank, \
             snippet(entity_fts, 0, '{hs}', '{he}', '{el}', 12), \
             snippet(entity_fts, 1, '{hs}', '{he}', '{el}', 24), \
             snippet(entity_fts, 2, '{hs}', '{he}', '{el}', 24), \
             snippet(entity_fts, 3, '{hs}', '{he}', '{el}', 24) \
             FROM entities e \
             JOIN entity_fts ON e.rowid = entity_fts.rowid \
             WHERE entity_fts MATCH ?",
            hs = HIGHLIGHT_START,
            he = HIGHLIGHT_END,
            el = SNIPPET_ELLIPSIS,
        );

        let type_str = entity_type.map(|t| t.as_str());
        let mut params: Vec<&dyn ToSql> = vec![&query];
        if let Some(ref type_str) = type_str {
            sql.push_str(" AND e.type = ?");
            params.push(type_str);
        }
        if let Some(ref tag) = tag {
            sql.push_str(" AND EXISTS (SELECT 1 FROM json_each(e.tags) WHERE json_each.value = ?)");
            params.push(tag);
        }
        sql.push_str(" ORDER BY rank");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params.as_slice(), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
            ))
        })?;

        let mut results = Vec::new();
        for row in rows {
            let (id, rank, name, description, content, notes) = row?;
            // snippet() returns text for every column; only excerpts
            // that actually contain a match are kept
            let name_snippet = name.filter(|s| s.contains(HIGHLIGHT_START));
            let content_snippet = [description, content, notes]
                .into_iter()
                .flatten()
                .find(|s| s.contains(HIGHLIGHT_START));
            results.push(SearchResultRow {
                id,
                rank,
                name_snippet,
                content_snippet,
            });
        }
        Ok(results)
    }
}

type WorldTuple = (String, String, Option<String>, String, String);
type CampaignTuple = (String, String, String, Option<String>, String, String);

fn world_tuple(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorldTuple> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn campaign_tuple(row: &rusqlite::Row<'_>) -> rusqlite::Result<CampaignTuple> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn hydrate_world(row: WorldTuple) -> StorageResult<World> {
    let (id, name, description, created_at, modified_at) = row;
    Ok(World {
        id: parse_uuid("world", "id", &id, &id)?,
        created_at: parse_timestamp("world", "created_at", &id, &created_at)?,
        modified_at: parse_timestamp("world", "modified_at", &id, &modified_at)?,
        name,
        description,
    })
}

fn hydrate_campaign(row: CampaignTuple) -> StorageResult<Campaign> {
    let (id, world_id, name, description, created_at, modified_at) = row;
    Ok(Campaign {
        id: parse_uuid("campaign", "id", &id, &id)?,
        world_id: parse_uuid("campaign", "world_id", &id, &world_id)?,
        created_at: parse_timestamp("campaign", "created_at", &id, &created_at)?,
        modified_at: parse_timestamp("campaign", "modified_at", &id, &modified_at)?,
        name,
        description,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::TypeSpecificFields;
    use std::thread::sleep;
    use std::time::Duration;
    use tempfile::TempDir;

    fn test_config(temp_dir: &TempDir) -> Config {
        Config {
            data_dir: temp_dir.path().to_path_buf(),
            read_only: false,
        }
    }

    fn test_store() -> EntityStore {
        EntityStore::open_in_memory().unwrap()
    }

    fn test_world(store: &EntityStore) -> World {
        let world = World::new("Aster");
        store.create_world(&world).unwrap();
        world
    }

    #[test]
    fn test_open_creates_database() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);

        let store = EntityStore::open(&config).unwrap();
        assert!(config.database_path().exists());
        assert_eq!(store.schema_version().unwrap(), SCHEMA_VERSION);
        assert!(!store.is_read_only());
    }

    #[test]
    fn test_open_uses_wal_journaling() {
        let temp_dir = TempDir::new().unwrap();
        let store = EntityStore::open(&test_config(&temp_dir)).unwrap();

        let mode: String = store
            .connection()
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
    }

    #[test]
    fn test_reopen_preserves_data() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);

        let world = {
            let store = EntityStore::open(&config).unwrap();
            let world = test_world(&store);
            let entity = Entity::new(EntityType::Character, "Elara", world.id);
            store.create_entity(&entity).unwrap();
            store.close().unwrap();
            world
        };

        let store = EntityStore::open(&config).unwrap();
        assert_eq!(store.schema_version().unwrap(), SCHEMA_VERSION);
        assert_eq!(store.get_world(world.id).unwrap().unwrap().name, "Aster");
        assert_eq!(store.entity_count(None).unwrap(), 1);
    }

    #[test]
    fn test_read_only_store() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);

        let world = {
            let store = EntityStore::open(&config).unwrap();
            let world = test_world(&store);
            store.close().unwrap();
            world
        };

        let read_only = Config {
            read_only: true,
            ..config
        };
        let store = EntityStore::open(&read_only).unwrap();
        assert!(store.is_read_only());
        assert_eq!(store.get_world(world.id).unwrap().unwrap().name, "Aster");

        let result = store.create_world(&World::new("Veil"));
        assert!(matches!(result, Err(StorageError::Database(_))));
    }

    #[test]
    fn test_read_only_open_requires_existing_database() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            read_only: true,
            ..test_config(&temp_dir)
        };

        let err = EntityStore::open(&config).unwrap_err();
        assert!(matches!(err, StorageError::Initialization { .. }));
    }

    #[test]
    fn test_world_crud() {
        let store = test_store();

        let mut world = World::new("Aster");
        world.description = Some("A shattered archipelago".to_string());
        store.create_world(&world).unwrap();

        let fetched = store.get_world(world.id).unwrap().unwrap();
        assert_eq!(fetched.name, "Aster");
        assert_eq!(fetched.description.as_deref(), Some("A shattered archipelago"));

        world.set_name("Aster Reborn");
        store.update_world(&world).unwrap();
        let fetched = store.get_world(world.id).unwrap().unwrap();
        assert_eq!(fetched.name, "Aster Reborn");

        store.delete_world(world.id).unwrap();
        assert!(store.get_world(world.id).unwrap().is_none());
    }

    #[test]
    fn test_list_worlds_ordered_by_name() {
        let store = test_store();
        store.create_world(&World::new("Veil")).unwrap();
        store.create_world(&World::new("Aster")).unwrap();
        store.create_world(&World::new("Duskmire")).unwrap();

        let names: Vec<String> = store
            .list_worlds()
            .unwrap()
            .into_iter()
            .map(|w| w.name)
            .collect();
        assert_eq!(names, vec!["Aster", "Duskmire", "Veil"]);
        assert_eq!(store.world_count().unwrap(), 3);
    }

    #[test]
    fn test_update_missing_world_not_found() {
        let store = test_store();
        let world = World::new("Nowhere");
        let err = store.update_world(&world).unwrap_err();
        assert!(err.is_not_found());

        let err = store.delete_world(world.id).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_delete_world_with_campaigns_fails() {
        let store = test_store();
        let world = test_world(&store);
        let campaign = Campaign::new("Siege of Vel", world.id);
        store.create_campaign(&campaign).unwrap();

        let err = store.delete_world(world.id).unwrap_err();
        assert!(matches!(err, StorageError::Database(_)));
        assert!(store.get_world(world.id).unwrap().is_some());

        store.delete_campaign(campaign.id).unwrap();
        store.delete_world(world.id).unwrap();
    }

    #[test]
    fn test_campaign_crud() {
        let store = test_store();
        let world = test_world(&store);

        let mut campaign = Campaign::new("Siege of Vel", world.id);
        store.create_campaign(&campaign).unwrap();

        let fetched = store.get_campaign(campaign.id).unwrap().unwrap();
        assert_eq!(fetched.name, "Siege of Vel");
        assert_eq!(fetched.world_id, world.id);

        campaign.set_description(Some("Year one".to_string()));
        store.update_campaign(&campaign).unwrap();
        let fetched = store.get_campaign(campaign.id).unwrap().unwrap();
        assert_eq!(fetched.description.as_deref(), Some("Year one"));

        store.delete_campaign(campaign.id).unwrap();
        assert!(store.get_campaign(campaign.id).unwrap().is_none());
        assert!(store.delete_campaign(campaign.id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_create_campaign_requires_world() {
        let store = test_store();
        let campaign = Campaign::new("Orphaned", Uuid::new_v4());
        let err = store.create_campaign(&campaign).unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("world"));
    }

    #[test]
    fn test_list_campaigns_scoped_to_world() {
        let store = test_store();
        let aster = test_world(&store);
        let veil = World::new("Veil");
        store.create_world(&veil).unwrap();

        store.create_campaign(&Campaign::new("One", aster.id)).unwrap();
        store.create_campaign(&Campaign::new("Two", aster.id)).unwrap();
        store.create_campaign(&Campaign::new("Three", veil.id)).unwrap();

        assert_eq!(store.list_campaigns(None).unwrap().len(), 3);
        assert_eq!(store.list_campaigns(Some(aster.id)).unwrap().len(), 2);
        assert_eq!(store.list_campaigns(Some(veil.id)).unwrap().len(), 1);
    }

    #[test]
    fn test_entity_create_and_get() {
        let store = test_store();
        let world = test_world(&store);

        let mut entity = Entity::new(EntityType::Character, "Elara", world.id);
        entity.description = Some("A daring sword captain".to_string());
        entity.add_tag("captain");
        entity.set_field("appearance", Some("Tall, weathered")).unwrap();
        store.create_entity(&entity).unwrap();

        let fetched = store.get_entity(entity.id).unwrap().unwrap();
        assert_eq!(fetched.name, "Elara");
        assert_eq!(fetched.entity_type, EntityType::Character);
        assert_eq!(fetched.world_id, world.id);
        assert_eq!(fetched.tags, vec!["captain"]);
        let fields = fetched.type_specific_fields.unwrap();
        assert_eq!(fields.get("appearance"), Some("Tall, weathered"));
    }

    #[test]
    fn test_get_missing_entity_is_none() {
        let store = test_store();
        assert!(store.get_entity(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_update_entity_refreshes_modified_at() {
        let store = test_store();
        let world = test_world(&store);
        let mut entity = Entity::new(EntityType::Note, "Scratch", world.id);
        store.create_entity(&entity).unwrap();

        let before = store.get_entity(entity.id).unwrap().unwrap();
        sleep(Duration::from_millis(10));

        entity.set_content(Some("remember the ferry".to_string()));
        store.update_entity(&entity).unwrap();

        let after = store.get_entity(entity.id).unwrap().unwrap();
        assert_eq!(after.content.as_deref(), Some("remember the ferry"));
        assert!(after.modified_at > before.modified_at);
        assert_eq!(after.created_at, before.created_at);
    }

    #[test]
    fn test_update_missing_entity_not_found() {
        let store = test_store();
        let entity = Entity::new(EntityType::Note, "Ghost", Uuid::new_v4());
        let err = store.update_entity(&entity).unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains(&entity.id.to_string()));
    }

    #[test]
    fn test_delete_missing_entity_not_found() {
        let mut store = test_store();
        let err = store.delete_entity(Uuid::new_v4()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_entity_rejects_mismatched_fields() {
        let store = test_store();
        let world = test_world(&store);

        let mut entity = Entity::new(EntityType::Character, "Elara", world.id);
        entity.type_specific_fields = Some(TypeSpecificFields::new(EntityType::Location));

        let err = store.create_entity(&entity).unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)));
    }

    #[test]
    fn test_delete_entity_scrubs_connections() {
        let mut store = EntityStore::open_in_memory().unwrap();
        let world = test_world(&store);

        let target = Entity::new(EntityType::Character, "Elara", world.id);
        store.create_entity(&target).unwrap();

        let mut single = Entity::new(EntityType::Location, "The Brine Harrow", world.id);
        single.connect(&target);
        store.create_entity(&single).unwrap();

        let mut double = Entity::new(EntityType::Faction, "The Gilded Hand", world.id);
        double.connect(&target);
        double.connect(&single);
        store.create_entity(&double).unwrap();

        let single_before = store.get_entity(single.id).unwrap().unwrap();

        store.delete_entity(target.id).unwrap();
        assert!(store.get_entity(target.id).unwrap().is_none());

        let single_after = store.get_entity(single.id).unwrap().unwrap();
        assert!(single_after.connections.is_empty());
        // Cleanup leaves the referencer's modification time alone
        assert_eq!(single_after.modified_at, single_before.modified_at);

        let double_after = store.get_entity(double.id).unwrap().unwrap();
        assert_eq!(double_after.connections.len(), 1);
        assert_eq!(double_after.connections[0].id, single.id);
    }

    #[test]
    fn test_list_entities_filters_and_orders() {
        let store = test_store();
        let world = test_world(&store);
        let other_world = World::new("Veil");
        store.create_world(&other_world).unwrap();

        let first = Entity::new(EntityType::Character, "Elara", world.id);
        store.create_entity(&first).unwrap();
        sleep(Duration::from_millis(10));
        let second = Entity::new(EntityType::Location, "Duskmire", world.id);
        store.create_entity(&second).unwrap();
        let elsewhere = Entity::new(EntityType::Character, "Moira", other_world.id);
        store.create_entity(&elsewhere).unwrap();

        let all = store.list_entities(world.id, None).unwrap();
        assert_eq!(all.len(), 2);
        // Newest modification first
        assert_eq!(all[0].id, second.id);
        assert_eq!(all[1].id, first.id);

        let characters = store
            .list_entities(world.id, Some(EntityType::Character))
            .unwrap();
        assert_eq!(characters.len(), 1);
        assert_eq!(characters[0].id, first.id);

        sleep(Duration::from_millis(10));
        store.update_entity(&first).unwrap();
        let all = store.list_entities(world.id, None).unwrap();
        assert_eq!(all[0].id, first.id);
    }

    #[test]
    fn test_entities_by_tag() {
        let store = test_store();
        let world = test_world(&store);

        let mut tagged = Entity::new(EntityType::Location, "Duskmire", world.id);
        tagged.add_tag("swamp");
        tagged.add_tag("haunted");
        store.create_entity(&tagged).unwrap();

        let mut other = Entity::new(EntityType::Location, "Vel", world.id);
        other.add_tag("city");
        store.create_entity(&other).unwrap();

        let haunted = store.entities_by_tag("haunted").unwrap();
        assert_eq!(haunted.len(), 1);
        assert_eq!(haunted[0].id, tagged.id);
        assert!(store.entities_by_tag("desert").unwrap().is_empty());
    }

    #[test]
    fn test_entity_count_scoped() {
        let store = test_store();
        let world = test_world(&store);
        let other_world = World::new("Veil");
        store.create_world(&other_world).unwrap();

        store
            .create_entity(&Entity::new(EntityType::Note, "One", world.id))
            .unwrap();
        store
            .create_entity(&Entity::new(EntityType::Note, "Two", world.id))
            .unwrap();
        store
            .create_entity(&Entity::new(EntityType::Note, "Three", other_world.id))
            .unwrap();

        assert_eq!(store.entity_count(None).unwrap(), 3);
        assert_eq!(store.entity_count(Some(world.id)).unwrap(), 2);
        assert_eq!(store.entity_count(Some(Uuid::new_v4())).unwrap(), 0);
    }

    #[test]
    fn test_all_tags_counts_and_order() {
        let store = test_store();
        let world = test_world(&store);

        let mut first = Entity::new(EntityType::Character, "Elara", world.id);
        first.add_tag("pc");
        first.add_tag("captain");
        store.create_entity(&first).unwrap();

        let mut second = Entity::new(EntityType::Character, "Moira", world.id);
        second.add_tag("pc");
        store.create_entity(&second).unwrap();

        let tags = store.all_tags().unwrap();
        assert_eq!(tags, vec![("pc".to_string(), 2), ("captain".to_string(), 1)]);
    }

    #[test]
    fn test_entity_ids_with_prefix() {
        let store = test_store();
        let world = test_world(&store);

        let entity = Entity::new(EntityType::Note, "Scratch", world.id);
        store.create_entity(&entity).unwrap();
        store
            .create_entity(&Entity::new(EntityType::Note, "Other", world.id))
            .unwrap();

        let prefix = &entity.id.to_string()[..8];
        let matches = store.entity_ids_with_prefix(prefix).unwrap();
        assert_eq!(matches, vec![entity.id]);
        assert!(store.entity_ids_with_prefix("zzzz").unwrap().is_empty());
    }

    #[test]
    fn test_search_finds_created_entities() {
        let store = test_store();
        let world = test_world(&store);

        let mut entity = Entity::new(EntityType::Character, "Elara", world.id);
        entity.description = Some("A daring sword captain of the harrow fleet".to_string());
        store.create_entity(&entity).unwrap();

        let results = store.search_raw("sword", None, None).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, entity.id.to_string());
        assert!(results[0].rank < 0.0);

        let snippet = results[0].content_snippet.as_deref().unwrap();
        assert!(snippet.contains("<b>sword</b>"));
        assert!(results[0].name_snippet.is_none());
    }

    #[test]
    fn test_search_name_snippet() {
        let store = test_store();
        let world = test_world(&store);

        let entity = Entity::new(EntityType::Location, "Sword Coast", world.id);
        store.create_entity(&entity).unwrap();

        let results = store.search_raw("sword", None, None).unwrap();
        assert_eq!(results.len(), 1);
        let name = results[0].name_snippet.as_deref().unwrap();
        assert!(name.contains("<b>Sword</b>"));
    }

    #[test]
    fn test_search_reflects_updates() {
        let store = test_store();
        let world = test_world(&store);

        let mut entity = Entity::new(EntityType::Character, "Elara", world.id);
        store.create_entity(&entity).unwrap();
        assert_eq!(store.search_raw("Elara", None, None).unwrap().len(), 1);

        entity.set_name("Moira");
        store.update_entity(&entity).unwrap();

        assert!(store.search_raw("Elara", None, None).unwrap().is_empty());
        assert_eq!(store.search_raw("Moira", None, None).unwrap().len(), 1);
    }

    #[test]
    fn test_search_excludes_deleted() {
        let mut store = EntityStore::open_in_memory().unwrap();
        let world = test_world(&store);

        let entity = Entity::new(EntityType::Character, "Elara", world.id);
        store.create_entity(&entity).unwrap();
        assert_eq!(store.search_raw("Elara", None, None).unwrap().len(), 1);

        store.delete_entity(entity.id).unwrap();
        assert!(store.search_raw("Elara", None, None).unwrap().is_empty());
    }

    #[test]
    fn test_search_type_and_tag_filters() {
        let store = test_store();
        let world = test_world(&store);

        let mut character = Entity::new(EntityType::Character, "Dragon Knight", world.id);
        character.add_tag("pc");
        store.create_entity(&character).unwrap();

        let location = Entity::new(EntityType::Location, "Dragon Spire", world.id);
        store.create_entity(&location).unwrap();

        assert_eq!(store.search_raw("dragon", None, None).unwrap().len(), 2);

        let characters = store
            .search_raw("dragon", Some(EntityType::Character), None)
            .unwrap();
        assert_eq!(characters.len(), 1);
        assert_eq!(characters[0].id, character.id.to_string());

        let tagged = store.search_raw("dragon", None, Some("pc")).unwrap();
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].id, character.id.to_string());

        assert!(store
            .search_raw("dragon", Some(EntityType::Session), None)
            .unwrap()
            .is_empty());
        assert!(store.search_raw("dragon", None, Some("npc")).unwrap().is_empty());
    }

    #[test]
    fn test_search_rank_orders_best_first() {
        let store = test_store();
        let world = test_world(&store);

        let mut strong = Entity::new(EntityType::Character, "Dragon", world.id);
        strong.description = Some("A dragon of the red peaks".to_string());
        store.create_entity(&strong).unwrap();

        let mut weak = Entity::new(EntityType::Note, "Travel log", world.id);
        weak.notes = Some(
            "Crossed the pass at dawn and saw a dragon far off over the southern range".to_string(),
        );
        store.create_entity(&weak).unwrap();

        let results = store.search_raw("dragon", None, None).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, strong.id.to_string());
        assert!(results[0].rank <= results[1].rank);
    }

    #[test]
    fn test_corrupt_fields_blob_degrades_to_empty() {
        let store = test_store();
        let world = test_world(&store);

        let entity = Entity::new(EntityType::Character, "Elara", world.id);
        store.create_entity(&entity).unwrap();

        store
            .connection()
            .execute(
                "UPDATE entities SET type_specific_fields = 'not json' WHERE id = ?1",
                [entity.id.to_string()],
            )
            .unwrap();

        let fetched = store.get_entity(entity.id).unwrap().unwrap();
        let fields = fetched.type_specific_fields.unwrap();
        assert!(fields.is_empty());
        assert_eq!(fields.entity_type(), EntityType::Character);
    }
}
