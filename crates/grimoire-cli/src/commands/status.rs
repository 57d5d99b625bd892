//! Status command handler

use anyhow::Result;

use grimoire_core::{Config, EntityStore};

use crate::output::{Output, OutputFormat};

/// Show status information
pub fn show(store: &EntityStore, config: &Config, output: &Output) -> Result<()> {
    let schema_version = store.schema_version()?;
    let worlds = store.world_count()?;
    let campaigns = store.list_campaigns(None)?.len();
    let entities = store.entity_count(None)?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "database": config.database_path(),
                    "schema_version": schema_version,
                    "read_only": store.is_read_only(),
                    "counts": {
                        "worlds": worlds,
                        "campaigns": campaigns,
                        "entities": entities
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.database_path().display());
        }
        OutputFormat::Human => {
            println!("Grimoire Status");
            println!("===============");
            println!();
            println!("Storage:");
            println!("  Database: {}", config.database_path().display());
            println!("  Schema:   version {}", schema_version);
            if store.is_read_only() {
                println!("  Mode:     read-only");
            }
            println!();
            println!("Contents:");
            println!("  Worlds:    {}", worlds);
            println!("  Campaigns: {}", campaigns);
            println!("  Entities:  {}", entities);
        }
    }

    Ok(())
}
