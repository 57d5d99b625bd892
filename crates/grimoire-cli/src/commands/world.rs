//! World command handlers

use anyhow::{bail, Context, Result};
use uuid::Uuid;

use grimoire_core::{EntityStore, World};

use crate::output::Output;

/// Create a new world
pub fn create(
    store: &EntityStore,
    name: String,
    description: Option<String>,
    output: &Output,
) -> Result<()> {
    let mut world = World::new(name);
    world.description = description;

    store.create_world(&world).context("Failed to create world")?;

    output.success(&format!("Created world: {}", world.id));
    output.print_world(&world);

    Ok(())
}

/// List all worlds
pub fn list(store: &EntityStore, output: &Output) -> Result<()> {
    let worlds = store.list_worlds()?;
    output.print_worlds(&worlds);
    Ok(())
}

/// Show a single world
pub fn show(store: &EntityStore, id: String, output: &Output) -> Result<()> {
    let uuid = resolve_world_id(store, &id)?;

    let world = store
        .get_world(uuid)?
        .ok_or_else(|| anyhow::anyhow!("World not found: {}", id))?;

    output.print_world(&world);
    Ok(())
}

/// Delete a world
pub fn delete(store: &EntityStore, id: String, output: &Output) -> Result<()> {
    let uuid = resolve_world_id(store, &id)?;

    store
        .delete_world(uuid)
        .context("Failed to delete world (campaigns may still reference it)")?;

    output.success(&format!("Deleted world: {}", uuid));

    Ok(())
}

/// Resolve a world reference (full UUID, ID prefix, or exact name)
pub(crate) fn resolve_world_id(store: &EntityStore, reference: &str) -> Result<Uuid> {
    if let Ok(uuid) = Uuid::parse_str(reference) {
        return Ok(uuid);
    }

    let worlds = store.list_worlds()?;
    let mut matches: Vec<&World> = worlds
        .iter()
        .filter(|w| w.id.to_string().starts_with(reference) || w.name == reference)
        .collect();

    match matches.len() {
        0 => bail!("No world found matching: {}", reference),
        1 => Ok(matches.remove(0).id),
        _ => {
            eprintln!("Multiple worlds match '{}':", reference);
            for world in &matches {
                eprintln!("  {} - {}", world.id, world.name);
            }
            bail!("Ambiguous reference. Please provide more characters.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_world_by_name_and_prefix() {
        let store = EntityStore::open_in_memory().unwrap();
        let world = World::new("Aster");
        store.create_world(&world).unwrap();

        assert_eq!(resolve_world_id(&store, "Aster").unwrap(), world.id);
        assert_eq!(
            resolve_world_id(&store, &world.id.to_string()).unwrap(),
            world.id
        );
        assert_eq!(
            resolve_world_id(&store, &world.id.to_string()[..8]).unwrap(),
            world.id
        );
        assert!(resolve_world_id(&store, "Nowhere").is_err());
    }
}
