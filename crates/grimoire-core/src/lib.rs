//! Grimoire Core Library
//!
//! Local-first storage for worldbuilding and campaign data. Worlds
//! contain campaigns and entities; entities are characters, locations,
//! factions, notes, and sessions, linked by tags and connections.
//!
//! # Architecture
//!
//! A single SQLite database is the source of truth. Entities live in
//! one table with JSON columns for tags, connections, and the
//! per-type field container; an FTS5 index over the text columns is
//! kept in sync by triggers, so search can never drift from the data.
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let store = EntityStore::open(&config)?;
//!
//! let world = World::new("Aster");
//! store.create_world(&world)?;
//!
//! let mut elara = Entity::new(EntityType::Character, "Elara", world.id);
//! elara.set_field("appearance", Some("Tall, weathered"))?;
//! store.create_entity(&elara)?;
//!
//! let hits = search_entities(&store, "weathered", None, None)?;
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration loading and paths
//! - [`models`]: Entity, World, and Campaign types
//! - [`fields`]: Schema-validated type-specific field containers
//! - [`store`]: The SQLite-backed entity store
//! - [`search`]: Full-text search over entities
//! - [`storage`]: Migrations, row mapping, and errors

pub mod config;
pub mod fields;
pub mod models;
pub mod search;
pub mod storage;
pub mod store;

pub use config::Config;
pub use fields::{FieldError, TypeSpecificFields, TypedFields};
pub use models::{Campaign, Entity, EntityRef, EntityType, UnknownEntityType, World};
pub use search::{search_entities, SearchHit};
pub use storage::{SearchResultRow, StorageError, StorageResult, SCHEMA_VERSION};
pub use store::{EntityStore, HIGHLIGHT_END, HIGHLIGHT_START};
