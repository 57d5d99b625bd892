//! Tag command handlers

use anyhow::Result;

use grimoire_core::EntityStore;

use crate::output::Output;

/// List all tags with usage counts
pub fn list(store: &EntityStore, output: &Output) -> Result<()> {
    let tags = store.all_tags()?;
    output.print_tags(&tags);
    Ok(())
}
