//! Init command handler

use anyhow::{bail, Result};

use grimoire_core::{Config, EntityStore};

use crate::output::Output;

/// Create the data directory and database, running migrations
///
/// Safe to run again on an existing database; migrations are a no-op
/// when the schema is already current.
pub fn run(output: &Output) -> Result<()> {
    let config = Config::load()?;
    if config.read_only {
        bail!("Cannot initialize while read-only mode is set");
    }

    let existed = config.database_path().exists();
    let store = EntityStore::open(&config)?;
    let version = store.schema_version()?;
    store.close()?;

    if output.is_json() {
        println!(
            "{}",
            serde_json::json!({
                "database": config.database_path(),
                "schema_version": version,
                "created": !existed,
            })
        );
    } else if existed {
        output.message(&format!(
            "Database already initialized at {} (schema version {})",
            config.database_path().display(),
            version
        ));
    } else {
        output.success(&format!(
            "Initialized database at {} (schema version {})",
            config.database_path().display(),
            version
        ));
    }

    Ok(())
}
