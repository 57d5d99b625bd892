//! Campaign command handlers

use anyhow::{bail, Context, Result};
use uuid::Uuid;

use grimoire_core::{Campaign, EntityStore};

use crate::output::Output;

/// Create a new campaign
pub fn create(
    store: &EntityStore,
    name: String,
    world: String,
    description: Option<String>,
    output: &Output,
) -> Result<()> {
    let world_id = super::world::resolve_world_id(store, &world)?;

    let mut campaign = Campaign::new(name, world_id);
    campaign.description = description;

    store
        .create_campaign(&campaign)
        .context("Failed to create campaign")?;

    output.success(&format!("Created campaign: {}", campaign.id));

    Ok(())
}

/// List campaigns, optionally scoped to one world
pub fn list(store: &EntityStore, world: Option<String>, output: &Output) -> Result<()> {
    let world_id = match world {
        Some(ref reference) => Some(super::world::resolve_world_id(store, reference)?),
        None => None,
    };

    let campaigns = store.list_campaigns(world_id)?;
    output.print_campaigns(&campaigns);
    Ok(())
}

/// Delete a campaign
pub fn delete(store: &EntityStore, id: String, output: &Output) -> Result<()> {
    let uuid = resolve_campaign_id(store, &id)?;

    store
        .delete_campaign(uuid)
        .context("Failed to delete campaign")?;

    output.success(&format!("Deleted campaign: {}", uuid));

    Ok(())
}

/// Resolve a campaign reference (full UUID, ID prefix, or exact name)
pub(crate) fn resolve_campaign_id(store: &EntityStore, reference: &str) -> Result<Uuid> {
    if let Ok(uuid) = Uuid::parse_str(reference) {
        return Ok(uuid);
    }

    let campaigns = store.list_campaigns(None)?;
    let mut matches: Vec<&Campaign> = campaigns
        .iter()
        .filter(|c| c.id.to_string().starts_with(reference) || c.name == reference)
        .collect();

    match matches.len() {
        0 => bail!("No campaign found matching: {}", reference),
        1 => Ok(matches.remove(0).id),
        _ => {
            eprintln!("Multiple campaigns match '{}':", reference);
            for campaign in &matches {
                eprintln!("  {} - {}", campaign.id, campaign.name);
            }
            bail!("Ambiguous reference. Please provide more characters.");
        }
    }
}
