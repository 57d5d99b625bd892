//! Row mapping between SQLite and the model types
//!
//! `EntityRow` is the flat, string-typed shape of one entities row.
//! Encoding an `Entity` serializes tags and connections to JSON and
//! formats timestamps as RFC 3339. Decoding is strict for everything
//! except type_specific_fields, which degrades to empty on a bad blob.

use chrono::{DateTime, SecondsFormat, Utc};
use std::str::FromStr;
use uuid::Uuid;

use crate::fields::TypeSpecificFields;
use crate::models::{Entity, EntityRef, EntityType};
use crate::storage::error::{StorageError, StorageResult};

/// Column list for entity SELECTs, in [`EntityRow`] field order
pub(crate) const ENTITY_COLUMNS: &str = "id, type, name, description, secrets, content, \
     summary, notes, tags, connections, world_id, campaign_id, forked_from, session_date, \
     duration, created_at, modified_at, type_specific_fields";

/// One row of the entities table, as stored
#[derive(Debug, Clone)]
pub(crate) struct EntityRow {
    pub id: String,
    pub entity_type: String,
    pub name: String,
    pub description: Option<String>,
    pub secrets: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub notes: Option<String>,
    pub tags: String,
    pub connections: Option<String>,
    pub world_id: String,
    pub campaign_id: Option<String>,
    pub forked_from: Option<String>,
    pub session_date: Option<String>,
    pub duration: Option<f64>,
    pub created_at: String,
    pub modified_at: String,
    pub type_specific_fields: Option<String>,
}

impl EntityRow {
    /// Read a row produced by a [`ENTITY_COLUMNS`] SELECT
    pub fn from_sql_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            entity_type: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            secrets: row.get(4)?,
            content: row.get(5)?,
            summary: row.get(6)?,
            notes: row.get(7)?,
            tags: row.get(8)?,
            connections: row.get(9)?,
            world_id: row.get(10)?,
            campaign_id: row.get(11)?,
            forked_from: row.get(12)?,
            session_date: row.get(13)?,
            duration: row.get(14)?,
            created_at: row.get(15)?,
            modified_at: row.get(16)?,
            type_specific_fields: row.get(17)?,
        })
    }

    /// Encode an entity for storage
    pub fn from_entity(entity: &Entity) -> StorageResult<Self> {
        let tags = serde_json::to_string(&entity.tags).map_err(|e| StorageError::Serialize {
            column: "tags",
            source: e,
        })?;
        let connections = if entity.connections.is_empty() {
            None
        } else {
            Some(
                serde_json::to_string(&entity.connections).map_err(|e| StorageError::Serialize {
                    column: "connections",
                    source: e,
                })?,
            )
        };
        // An all-unset field container is stored as NULL, not "{}"
        let type_specific_fields = entity
            .type_specific_fields
            .as_ref()
            .map(|fields| fields.to_json())
            .filter(|json| json != "{}");

        Ok(Self {
            id: entity.id.to_string(),
            entity_type: entity.entity_type.as_str().to_string(),
            name: entity.name.clone(),
            description: entity.description.clone(),
            secrets: entity.secrets.clone(),
            content: entity.content.clone(),
            summary: entity.summary.clone(),
            notes: entity.notes.clone(),
            tags,
            connections,
            world_id: entity.world_id.to_string(),
            campaign_id: entity.campaign_id.map(|id| id.to_string()),
            forked_from: entity.forked_from.map(|id| id.to_string()),
            session_date: entity.session_date.map(|d| format_timestamp(&d)),
            duration: entity.duration,
            created_at: format_timestamp(&entity.created_at),
            modified_at: format_timestamp(&entity.modified_at),
            type_specific_fields,
        })
    }

    /// Decode a stored row into an entity
    pub fn into_entity(self) -> StorageResult<Entity> {
        let id_str = self.id.clone();

        let id = parse_uuid("entity", "id", &id_str, &self.id)?;
        let entity_type = EntityType::from_str(&self.entity_type).map_err(|e| {
            StorageError::Corrupt {
                kind: "entity",
                column: "type",
                id: id_str.clone(),
                details: e.to_string(),
            }
        })?;
        let world_id = parse_uuid("entity", "world_id", &id_str, &self.world_id)?;
        let campaign_id = self
            .campaign_id
            .as_deref()
            .map(|v| parse_uuid("entity", "campaign_id", &id_str, v))
            .transpose()?;
        let forked_from = self
            .forked_from
            .as_deref()
            .map(|v| parse_uuid("entity", "forked_from", &id_str, v))
            .transpose()?;
        let session_date = self
            .session_date
            .as_deref()
            .map(|v| parse_timestamp("entity", "session_date", &id_str, v))
            .transpose()?;
        let created_at = parse_timestamp("entity", "created_at", &id_str, &self.created_at)?;
        let modified_at = parse_timestamp("entity", "modified_at", &id_str, &self.modified_at)?;

        let tags: Vec<String> =
            serde_json::from_str(&self.tags).map_err(|e| StorageError::Corrupt {
                kind: "entity",
                column: "tags",
                id: id_str.clone(),
                details: e.to_string(),
            })?;
        let connections: Vec<EntityRef> = match self.connections.as_deref() {
            None => Vec::new(),
            Some(json) => serde_json::from_str(json).map_err(|e| StorageError::Corrupt {
                kind: "entity",
                column: "connections",
                id: id_str.clone(),
                details: e.to_string(),
            })?,
        };
        let type_specific_fields = Some(TypeSpecificFields::from_json(
            entity_type,
            self.type_specific_fields.as_deref(),
        ));

        Ok(Entity {
            id,
            entity_type,
            name: self.name,
            description: self.description,
            secrets: self.secrets,
            content: self.content,
            summary: self.summary,
            notes: self.notes,
            tags,
            connections,
            world_id,
            campaign_id,
            forked_from,
            session_date,
            duration: self.duration,
            created_at,
            modified_at,
            type_specific_fields,
        })
    }
}

/// One raw full-text match, before hydration into a search hit
#[derive(Debug, Clone)]
pub struct SearchResultRow {
    /// Matched entity id
    pub id: String,
    /// FTS5 bm25 rank; more negative means more relevant
    pub rank: f64,
    /// Highlighted name excerpt, when the match hit the name
    pub name_snippet: Option<String>,
    /// Highlighted excerpt from description, content, or notes
    pub content_snippet: Option<String>,
}

pub(crate) fn parse_uuid(
    kind: &'static str,
    column: &'static str,
    id: &str,
    value: &str,
) -> StorageResult<Uuid> {
    Uuid::parse_str(value).map_err(|e| StorageError::Corrupt {
        kind,
        column,
        id: id.to_string(),
        details: e.to_string(),
    })
}

pub(crate) fn parse_timestamp(
    kind: &'static str,
    column: &'static str,
    id: &str,
    value: &str,
) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt {
            kind,
            column,
            id: id.to_string(),
            details: e.to_string(),
        })
}

/// RFC 3339 with millisecond precision and a `Z` suffix
///
/// Fixed-width, so lexicographic order matches chronological order and
/// `ORDER BY modified_at` works on the text column.
pub(crate) fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_round_trip() {
        let world_id = Uuid::new_v4();
        let mut entity = Entity::new(EntityType::Character, "Elara", world_id);
        entity.description = Some("A daring sword captain".to_string());
        entity.add_tag("captain");
        entity.add_tag("pc");
        entity.set_field("appearance", Some("Tall, weathered")).unwrap();

        let other = Entity::new(EntityType::Location, "The Brine Harrow", world_id);
        entity.connect(&other);

        // Pin timestamps to millisecond precision so the decoded copy
        // compares equal
        let stamp: DateTime<Utc> = "2025-03-01T08:00:00.000Z".parse().unwrap();
        entity.created_at = stamp;
        entity.modified_at = stamp;

        let row = EntityRow::from_entity(&entity).unwrap();
        assert_eq!(row.entity_type, "character");
        assert_eq!(row.tags, r#"["captain","pc"]"#);
        assert!(row.connections.is_some());
        assert!(row.type_specific_fields.is_some());
        assert!(row.created_at.ends_with('Z'));

        let back = row.into_entity().unwrap();
        assert_eq!(back, entity);
    }

    #[test]
    fn test_empty_collections_stored_as_null() {
        let entity = Entity::new(EntityType::Note, "Scratch", Uuid::new_v4());
        let row = EntityRow::from_entity(&entity).unwrap();
        assert_eq!(row.tags, "[]");
        assert!(row.connections.is_none());
        assert!(row.type_specific_fields.is_none());

        let back = row.into_entity().unwrap();
        assert!(back.tags.is_empty());
        assert!(back.connections.is_empty());
        let fields = back.type_specific_fields.unwrap();
        assert!(fields.is_empty());
        assert_eq!(fields.entity_type(), EntityType::Note);
    }

    #[test]
    fn test_timestamp_format_is_sortable() {
        let earlier = format_timestamp(&"2025-03-01T08:00:00.000Z".parse().unwrap());
        let later = format_timestamp(&"2025-03-01T09:30:00.000Z".parse().unwrap());
        assert_eq!(earlier.len(), later.len());
        assert!(earlier < later);
    }

    #[test]
    fn test_corrupt_tags_error() {
        let entity = Entity::new(EntityType::Note, "Scratch", Uuid::new_v4());
        let mut row = EntityRow::from_entity(&entity).unwrap();
        row.tags = "not json".to_string();

        let err = row.into_entity().unwrap_err();
        assert!(matches!(
            err,
            StorageError::Corrupt { column: "tags", .. }
        ));
    }

    #[test]
    fn test_corrupt_timestamp_error() {
        let entity = Entity::new(EntityType::Note, "Scratch", Uuid::new_v4());
        let mut row = EntityRow::from_entity(&entity).unwrap();
        row.modified_at = "yesterday".to_string();

        let err = row.into_entity().unwrap_err();
        assert!(matches!(
            err,
            StorageError::Corrupt {
                column: "modified_at",
                ..
            }
        ));
    }

    #[test]
    fn test_malformed_type_specific_fields_degrade_to_empty() {
        let entity = Entity::new(EntityType::Character, "Elara", Uuid::new_v4());
        let mut row = EntityRow::from_entity(&entity).unwrap();
        row.type_specific_fields = Some("{unterminated".to_string());

        let back = row.into_entity().unwrap();
        let fields = back.type_specific_fields.unwrap();
        assert!(fields.is_empty());
        assert_eq!(fields.entity_type(), EntityType::Character);
    }

    #[test]
    fn test_column_list_matches_row_width() {
        assert_eq!(ENTITY_COLUMNS.split(',').count(), 18);
    }
}
