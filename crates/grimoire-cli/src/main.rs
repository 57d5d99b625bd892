//! Grimoire CLI
//!
//! Command-line interface for Grimoire - worldbuilding and campaign
//! data management.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::debug;

use grimoire_core::{Config, EntityStore, EntityType};

mod commands;
mod output;

use commands::entity::SetArgs;
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "grimoire")]
#[command(about = "Grimoire - local-first worldbuilding and campaign management")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database (first-time setup)
    Init,
    /// Show database status and counts
    Status,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Manage worlds
    World {
        #[command(subcommand)]
        command: WorldCommands,
    },
    /// Manage campaigns
    Campaign {
        #[command(subcommand)]
        command: CampaignCommands,
    },
    /// Manage entities
    Entity {
        #[command(subcommand)]
        command: EntityCommands,
    },
    /// Search entities by full-text query
    Search {
        /// Search query
        query: String,
        /// Restrict to one entity type
        #[arg(short = 't', long = "type")]
        entity_type: Option<EntityType>,
        /// Restrict to entities carrying this tag
        #[arg(long)]
        tag: Option<String>,
    },
    /// List all tags
    Tags,
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, read_only)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[derive(Subcommand)]
enum WorldCommands {
    /// Create a new world
    Create {
        /// World name
        name: String,
        /// Description
        #[arg(short, long)]
        description: Option<String>,
    },
    /// List all worlds
    #[command(alias = "ls")]
    List,
    /// Show world details
    Show {
        /// World ID (full UUID or prefix) or name
        id: String,
    },
    /// Delete a world
    #[command(alias = "rm")]
    Delete {
        /// World ID (full UUID or prefix) or name
        id: String,
    },
}

#[derive(Subcommand)]
enum CampaignCommands {
    /// Create a new campaign
    Create {
        /// Campaign name
        name: String,
        /// World the campaign belongs to (ID or name)
        #[arg(short, long)]
        world: String,
        /// Description
        #[arg(short, long)]
        description: Option<String>,
    },
    /// List campaigns
    #[command(alias = "ls")]
    List {
        /// Restrict to one world (ID or name)
        #[arg(short, long)]
        world: Option<String>,
    },
    /// Delete a campaign
    #[command(alias = "rm")]
    Delete {
        /// Campaign ID (full UUID or prefix) or name
        id: String,
    },
}

#[derive(Subcommand)]
enum EntityCommands {
    /// Create a new entity
    #[command(alias = "add")]
    Create {
        /// Entity type (character, location, faction, note, session)
        entity_type: EntityType,
        /// Entity name
        name: String,
        /// World the entity belongs to (ID or name)
        #[arg(short, long)]
        world: String,
        /// Campaign to assign (ID or name)
        #[arg(short, long)]
        campaign: Option<String>,
        /// Tags to add
        #[arg(short, long)]
        tag: Vec<String>,
        /// Description
        #[arg(short, long)]
        description: Option<String>,
    },
    /// List entities
    #[command(alias = "ls")]
    List {
        /// World to list (ID or name)
        #[arg(short, long)]
        world: Option<String>,
        /// Filter by entity type
        #[arg(short = 't', long = "type")]
        entity_type: Option<EntityType>,
        /// Filter by tag
        #[arg(long)]
        tag: Option<String>,
    },
    /// Show entity details
    Show {
        /// Entity ID (full UUID or prefix)
        id: String,
    },
    /// Update entity fields
    Set(SetArgs),
    /// Add tags to an entity
    Tag {
        /// Entity ID (full UUID or prefix)
        id: String,
        /// Tags to add
        tags: Vec<String>,
    },
    /// Remove tags from an entity
    Untag {
        /// Entity ID (full UUID or prefix)
        id: String,
        /// Tags to remove
        tags: Vec<String>,
    },
    /// Connect an entity to another
    Connect {
        /// Entity ID (full UUID or prefix)
        id: String,
        /// Entity to connect to (full UUID or prefix)
        other: String,
    },
    /// Remove a connection between entities
    Disconnect {
        /// Entity ID (full UUID or prefix)
        id: String,
        /// Connected entity (full UUID or prefix)
        other: String,
    },
    /// Delete an entity
    #[command(alias = "rm")]
    Delete {
        /// Entity ID (full UUID or prefix)
        id: String,
    },
}

fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    // Commands that don't need the store
    match &cli.command {
        Commands::Config { command } => {
            return handle_config_command(command.clone(), &output);
        }
        Commands::Init => {
            return commands::init::run(&output);
        }
        _ => {}
    }

    let config = Config::load()?;
    debug!(config = %Config::config_file_path().display(), "loaded configuration");
    let mut store = EntityStore::open(&config)?;

    match cli.command {
        Commands::Init => unreachable!(),          // Handled above
        Commands::Config { .. } => unreachable!(), // Handled above
        Commands::Status => commands::status::show(&store, &config, &output),
        Commands::World { command } => handle_world_command(command, &store, &output),
        Commands::Campaign { command } => handle_campaign_command(command, &store, &output),
        Commands::Entity { command } => handle_entity_command(command, &mut store, &output),
        Commands::Search {
            query,
            entity_type,
            tag,
        } => commands::search::run(&store, &query, entity_type, tag.as_deref(), &output),
        Commands::Tags => commands::tag::list(&store, &output),
    }
}

fn handle_world_command(
    command: WorldCommands,
    store: &EntityStore,
    output: &Output,
) -> Result<()> {
    match command {
        WorldCommands::Create { name, description } => {
            commands::world::create(store, name, description, output)
        }
        WorldCommands::List => commands::world::list(store, output),
        WorldCommands::Show { id } => commands::world::show(store, id, output),
        WorldCommands::Delete { id } => commands::world::delete(store, id, output),
    }
}

fn handle_campaign_command(
    command: CampaignCommands,
    store: &EntityStore,
    output: &Output,
) -> Result<()> {
    match command {
        CampaignCommands::Create {
            name,
            world,
            description,
        } => commands::campaign::create(store, name, world, description, output),
        CampaignCommands::List { world } => commands::campaign::list(store, world, output),
        CampaignCommands::Delete { id } => commands::campaign::delete(store, id, output),
    }
}

fn handle_entity_command(
    command: EntityCommands,
    store: &mut EntityStore,
    output: &Output,
) -> Result<()> {
    match command {
        EntityCommands::Create {
            entity_type,
            name,
            world,
            campaign,
            tag,
            description,
        } => commands::entity::create(store, entity_type, name, world, campaign, tag, description, output),
        EntityCommands::List {
            world,
            entity_type,
            tag,
        } => commands::entity::list(store, world, entity_type, tag, output),
        EntityCommands::Show { id } => commands::entity::show(store, id, output),
        EntityCommands::Set(args) => commands::entity::set(store, args, output),
        EntityCommands::Tag { id, tags } => commands::entity::tag(store, id, tags, output),
        EntityCommands::Untag { id, tags } => commands::entity::untag(store, id, tags, output),
        EntityCommands::Connect { id, other } => commands::entity::connect(store, id, other, output),
        EntityCommands::Disconnect { id, other } => {
            commands::entity::disconnect(store, id, other, output)
        }
        EntityCommands::Delete { id } => commands::entity::delete(store, id, output),
    }
}

fn handle_config_command(command: Option<ConfigCommands>, output: &Output) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(output),
        Some(ConfigCommands::Set { key, value }) => commands::config::set(key, value, output),
    }
}

/// Install the tracing subscriber when GRIMOIRE_LOG is set
///
/// Logs go to stderr so they never mix with command output.
fn init_logging() {
    if std::env::var("GRIMOIRE_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_env("GRIMOIRE_LOG"))
            .with_writer(std::io::stderr)
            .init();
    }
}
