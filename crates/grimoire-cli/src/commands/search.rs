//! Search command handler

use anyhow::Result;

use grimoire_core::{search_entities, EntityStore, EntityType};

use crate::output::Output;

/// Search entities by full-text query
pub fn run(
    store: &EntityStore,
    query: &str,
    entity_type: Option<EntityType>,
    tag: Option<&str>,
    output: &Output,
) -> Result<()> {
    let hits = search_entities(store, query, entity_type, tag)?;
    output.print_search_hits(&hits);
    Ok(())
}
