//! Entity search
//!
//! Wraps the store's raw full-text query and hydrates each match into
//! a [`SearchHit`] carrying the entity's name, type, and modification
//! time alongside the rank and snippets.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::EntityType;
use crate::storage::error::{StorageError, StorageResult};
use crate::store::EntityStore;

/// One search match, ready for display
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    /// Matched entity id
    pub id: Uuid,
    /// Entity name
    pub name: String,
    /// Entity type
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    /// FTS5 bm25 rank; more negative means more relevant
    pub rank: f64,
    /// Highlighted name excerpt, when the match hit the name
    pub name_snippet: Option<String>,
    /// Highlighted excerpt from description, content, or notes
    pub content_snippet: Option<String>,
    /// When the entity was last modified
    pub modified_at: DateTime<Utc>,
}

/// Search entities by full-text query
///
/// Matches are ordered best rank first; equal ranks fall back to the
/// most recently modified entity. Filters narrow the results to one
/// entity type or one tag.
pub fn search_entities(
    store: &EntityStore,
    query: &str,
    entity_type: Option<EntityType>,
    tag: Option<&str>,
) -> StorageResult<Vec<SearchHit>> {
    let rows = store.search_raw(query, entity_type, tag)?;

    let mut hits = Vec::with_capacity(rows.len());
    for row in rows {
        let id = Uuid::parse_str(&row.id).map_err(|e| StorageError::Corrupt {
            kind: "entity",
            column: "id",
            id: row.id.clone(),
            details: e.to_string(),
        })?;
        // A row can vanish between the match and the read; skip it
        let Some(entity) = store.get_entity(id)? else {
            continue;
        };
        hits.push(SearchHit {
            id,
            name: entity.name,
            entity_type: entity.entity_type,
            rank: row.rank,
            name_snippet: row.name_snippet,
            content_snippet: row.content_snippet,
            modified_at: entity.modified_at,
        });
    }

    sort_hits(&mut hits);
    Ok(hits)
}

/// Sort by ascending rank, breaking ties with the newest modification
fn sort_hits(hits: &mut [SearchHit]) {
    hits.sort_by(|a, b| {
        a.rank
            .partial_cmp(&b.rank)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.modified_at.cmp(&a.modified_at))
    });
}
