//! Entity command handlers

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use grimoire_core::{Entity, EntityStore, EntityType};

use crate::output::Output;

/// Arguments for `entity set`
#[derive(clap::Args)]
pub struct SetArgs {
    /// Entity ID (full UUID or prefix)
    pub id: String,
    /// New name
    #[arg(long)]
    pub name: Option<String>,
    /// New description
    #[arg(long)]
    pub description: Option<String>,
    /// New secrets text
    #[arg(long)]
    pub secrets: Option<String>,
    /// New body content
    #[arg(long)]
    pub content: Option<String>,
    /// New session summary
    #[arg(long)]
    pub summary: Option<String>,
    /// New session notes
    #[arg(long)]
    pub notes: Option<String>,
    /// Session date (RFC 3339, e.g. 2026-03-14T19:00:00Z)
    #[arg(long)]
    pub session_date: Option<String>,
    /// Session duration in hours
    #[arg(long)]
    pub duration: Option<f64>,
    /// Set a type-specific field, as name=value
    #[arg(short, long)]
    pub field: Vec<String>,
    /// Clear a type-specific field
    #[arg(long)]
    pub unset_field: Vec<String>,
}

/// Create a new entity
#[allow(clippy::too_many_arguments)]
pub fn create(
    store: &EntityStore,
    entity_type: EntityType,
    name: String,
    world: String,
    campaign: Option<String>,
    tags: Vec<String>,
    description: Option<String>,
    output: &Output,
) -> Result<()> {
    let world_id = super::world::resolve_world_id(store, &world)?;
    // Entities carry no foreign key on world_id, so check it here
    if store.get_world(world_id)?.is_none() {
        bail!("World not found: {}", world);
    }

    let mut entity = Entity::new(entity_type, name, world_id);
    entity.description = description;
    if let Some(ref campaign_ref) = campaign {
        entity.campaign_id = Some(super::campaign::resolve_campaign_id(store, campaign_ref)?);
    }
    for tag in tags {
        entity.add_tag(tag);
    }

    store
        .create_entity(&entity)
        .context("Failed to create entity")?;

    output.success(&format!("Created {}: {}", entity.entity_type, entity.id));
    output.print_entity(&entity);

    Ok(())
}

/// List entities by world and/or tag, optionally filtered by type
pub fn list(
    store: &EntityStore,
    world: Option<String>,
    entity_type: Option<EntityType>,
    tag: Option<String>,
    output: &Output,
) -> Result<()> {
    let entities = match (world, tag) {
        (Some(world), tag) => {
            let world_id = super::world::resolve_world_id(store, &world)?;
            let mut entities = store.list_entities(world_id, entity_type)?;
            if let Some(ref tag) = tag {
                entities.retain(|e| e.tags.iter().any(|t| t == tag));
            }
            entities
        }
        (None, Some(tag)) => {
            let mut entities = store.entities_by_tag(&tag)?;
            if let Some(entity_type) = entity_type {
                entities.retain(|e| e.entity_type == entity_type);
            }
            entities
        }
        (None, None) => bail!("Provide --world or --tag to list entities"),
    };

    output.print_entities(&entities);
    Ok(())
}

/// Show a single entity
pub fn show(store: &EntityStore, id: String, output: &Output) -> Result<()> {
    let uuid = resolve_entity_id(store, &id)?;

    let entity = store
        .get_entity(uuid)?
        .ok_or_else(|| anyhow::anyhow!("Entity not found: {}", id))?;

    output.print_entity(&entity);
    Ok(())
}

/// Update fields on an entity
pub fn set(store: &EntityStore, args: SetArgs, output: &Output) -> Result<()> {
    let uuid = resolve_entity_id(store, &args.id)?;

    let mut entity = store
        .get_entity(uuid)?
        .ok_or_else(|| anyhow::anyhow!("Entity not found: {}", args.id))?;

    if let Some(name) = args.name {
        entity.set_name(name);
    }
    if let Some(description) = args.description {
        entity.set_description(Some(description));
    }
    if let Some(secrets) = args.secrets {
        entity.set_secrets(Some(secrets));
    }
    if let Some(content) = args.content {
        entity.set_content(Some(content));
    }
    if let Some(summary) = args.summary {
        entity.set_summary(Some(summary));
    }
    if let Some(notes) = args.notes {
        entity.set_notes(Some(notes));
    }
    if let Some(ref date) = args.session_date {
        let parsed: DateTime<Utc> = DateTime::parse_from_rfc3339(date)
            .with_context(|| format!("Invalid session date (expected RFC 3339): {}", date))?
            .with_timezone(&Utc);
        entity.set_session_date(Some(parsed));
    }
    if let Some(duration) = args.duration {
        entity.set_duration(Some(duration));
    }
    for assignment in &args.field {
        let (name, value) = assignment
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("Expected name=value, got: {}", assignment))?;
        entity.set_field(name, Some(value))?;
    }
    for name in &args.unset_field {
        entity.set_field(name, None)?;
    }

    store
        .update_entity(&entity)
        .context("Failed to update entity")?;

    output.success("Entity updated");
    output.print_entity(&entity);

    Ok(())
}

/// Add tags to an entity
pub fn tag(store: &EntityStore, id: String, tags: Vec<String>, output: &Output) -> Result<()> {
    if tags.is_empty() {
        bail!("Provide at least one tag");
    }
    let uuid = resolve_entity_id(store, &id)?;

    let mut entity = store
        .get_entity(uuid)?
        .ok_or_else(|| anyhow::anyhow!("Entity not found: {}", id))?;

    for tag in tags {
        entity.add_tag(tag);
    }
    store
        .update_entity(&entity)
        .context("Failed to update entity")?;

    output.success(&format!("Tags: {}", entity.tags.join(", ")));

    Ok(())
}

/// Remove tags from an entity
pub fn untag(store: &EntityStore, id: String, tags: Vec<String>, output: &Output) -> Result<()> {
    if tags.is_empty() {
        bail!("Provide at least one tag");
    }
    let uuid = resolve_entity_id(store, &id)?;

    let mut entity = store
        .get_entity(uuid)?
        .ok_or_else(|| anyhow::anyhow!("Entity not found: {}", id))?;

    for tag in &tags {
        entity.remove_tag(tag);
    }
    store
        .update_entity(&entity)
        .context("Failed to update entity")?;

    if entity.tags.is_empty() {
        output.success("Tags: (none)");
    } else {
        output.success(&format!("Tags: {}", entity.tags.join(", ")));
    }

    Ok(())
}

/// Connect an entity to another
pub fn connect(store: &EntityStore, id: String, other: String, output: &Output) -> Result<()> {
    let uuid = resolve_entity_id(store, &id)?;
    let other_uuid = resolve_entity_id(store, &other)?;
    if uuid == other_uuid {
        bail!("Cannot connect an entity to itself");
    }

    let mut entity = store
        .get_entity(uuid)?
        .ok_or_else(|| anyhow::anyhow!("Entity not found: {}", id))?;
    let target = store
        .get_entity(other_uuid)?
        .ok_or_else(|| anyhow::anyhow!("Entity not found: {}", other))?;

    entity.connect(&target);
    store
        .update_entity(&entity)
        .context("Failed to update entity")?;

    output.success(&format!("Connected {} to {}", entity.name, target.name));

    Ok(())
}

/// Remove a connection between entities
pub fn disconnect(store: &EntityStore, id: String, other: String, output: &Output) -> Result<()> {
    let uuid = resolve_entity_id(store, &id)?;
    let other_uuid = resolve_entity_id(store, &other)?;

    let mut entity = store
        .get_entity(uuid)?
        .ok_or_else(|| anyhow::anyhow!("Entity not found: {}", id))?;

    if !entity.disconnect(other_uuid) {
        bail!("No connection to: {}", other);
    }
    store
        .update_entity(&entity)
        .context("Failed to update entity")?;

    output.success("Connection removed");

    Ok(())
}

/// Delete an entity
pub fn delete(store: &mut EntityStore, id: String, output: &Output) -> Result<()> {
    let uuid = resolve_entity_id(store, &id)?;

    store
        .delete_entity(uuid)
        .context("Failed to delete entity")?;

    output.success(&format!("Deleted entity: {}", uuid));

    Ok(())
}

/// Resolve an entity ID (full UUID or unique prefix)
pub(crate) fn resolve_entity_id(store: &EntityStore, id: &str) -> Result<Uuid> {
    if let Ok(uuid) = Uuid::parse_str(id) {
        return Ok(uuid);
    }

    let mut matches = store.entity_ids_with_prefix(id)?;
    match matches.len() {
        0 => bail!("No entity found matching: {}", id),
        1 => Ok(matches.remove(0)),
        _ => {
            eprintln!("Multiple entities match '{}':", id);
            for uuid in &matches {
                eprintln!("  {}", uuid);
            }
            bail!("Ambiguous ID. Please provide more characters.");
        }
    }
}
