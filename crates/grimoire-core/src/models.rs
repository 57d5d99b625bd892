//! Data models for Grimoire
//!
//! Defines the core data structures: Entity, World, and Campaign.
//! Entities carry free-form text, tags, weak connections to other
//! entities, and a schema-validated set of type-specific fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::fields::{FieldError, TypeSpecificFields};

/// The closed set of entity kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Character,
    Location,
    Faction,
    Note,
    Session,
}

impl EntityType {
    /// Every entity type, in display order
    pub const ALL: [EntityType; 5] = [
        EntityType::Character,
        EntityType::Location,
        EntityType::Faction,
        EntityType::Note,
        EntityType::Session,
    ];

    /// The persisted name of this type
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Character => "character",
            EntityType::Location => "location",
            EntityType::Faction => "faction",
            EntityType::Note => "note",
            EntityType::Session => "session",
        }
    }

    /// Legal type-specific field names for this type, in display order
    ///
    /// These are the exact keys used in persisted JSON.
    pub fn field_names(&self) -> &'static [&'static str] {
        match self {
            EntityType::Character => &["appearance", "personality", "motivation", "voiceMannerisms"],
            EntityType::Location => &["appearance", "atmosphere", "notableFeatures"],
            EntityType::Faction => &["ideology", "goals", "resources", "structure"],
            EntityType::Note => &["content"],
            EntityType::Session => &["prepNotes"],
        }
    }

    /// Whether `name` is a legal type-specific field for this type
    pub fn is_legal_field(&self, name: &str) -> bool {
        self.field_names().contains(&name)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unrecognized entity type name
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown entity type '{0}' (expected character, location, faction, note, or session)")]
pub struct UnknownEntityType(pub String);

impl FromStr for EntityType {
    type Err = UnknownEntityType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "character" => Ok(EntityType::Character),
            "location" => Ok(EntityType::Location),
            "faction" => Ok(EntityType::Faction),
            "note" => Ok(EntityType::Note),
            "session" => Ok(EntityType::Session),
            _ => Err(UnknownEntityType(s.to_string())),
        }
    }
}

/// A weak reference to another entity
///
/// Connections are stored on the owning entity as a list of these.
/// The name and type are denormalized for display; the id is the link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    /// Referenced entity id
    pub id: Uuid,
    /// Referenced entity name at the time the connection was made
    pub name: String,
    /// Referenced entity type
    #[serde(rename = "type")]
    pub entity_type: EntityType,
}

impl From<&Entity> for EntityRef {
    fn from(entity: &Entity) -> Self {
        Self {
            id: entity.id,
            name: entity.name.clone(),
            entity_type: entity.entity_type,
        }
    }
}

/// A worldbuilding entity: character, location, faction, note, or session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    /// Unique identifier
    pub id: Uuid,
    /// What kind of entity this is
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    /// Display name
    pub name: String,
    /// Optional description
    pub description: Option<String>,
    /// GM-only secrets
    pub secrets: Option<String>,
    /// Body text (note entities)
    pub content: Option<String>,
    /// Session summary (session entities)
    pub summary: Option<String>,
    /// Session notes (session entities)
    pub notes: Option<String>,
    /// Tags for organization
    pub tags: Vec<String>,
    /// Weak references to related entities
    pub connections: Vec<EntityRef>,
    /// World this entity belongs to
    pub world_id: Uuid,
    /// Campaign this entity belongs to, if any
    pub campaign_id: Option<Uuid>,
    /// Entity this one was forked from, if any
    pub forked_from: Option<Uuid>,
    /// When the session happened (session entities)
    pub session_date: Option<DateTime<Utc>>,
    /// Session length in hours (session entities)
    pub duration: Option<f64>,
    /// When this entity was created
    pub created_at: DateTime<Utc>,
    /// When this entity was last modified
    pub modified_at: DateTime<Utc>,
    /// Schema-validated fields specific to the entity type
    pub type_specific_fields: Option<TypeSpecificFields>,
}

impl Entity {
    /// Create a new entity in the given world
    pub fn new(entity_type: EntityType, name: impl Into<String>, world_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            entity_type,
            name: name.into(),
            description: None,
            secrets: None,
            content: None,
            summary: None,
            notes: None,
            tags: Vec::new(),
            connections: Vec::new(),
            world_id,
            campaign_id: None,
            forked_from: None,
            session_date: None,
            duration: None,
            created_at: now,
            modified_at: now,
            type_specific_fields: Some(TypeSpecificFields::new(entity_type)),
        }
    }

    /// Update the name
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.modified_at = Utc::now();
    }

    /// Update the description
    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
        self.modified_at = Utc::now();
    }

    /// Update the secrets text
    pub fn set_secrets(&mut self, secrets: Option<String>) {
        self.secrets = secrets;
        self.modified_at = Utc::now();
    }

    /// Update the body content
    pub fn set_content(&mut self, content: Option<String>) {
        self.content = content;
        self.modified_at = Utc::now();
    }

    /// Update the session summary
    pub fn set_summary(&mut self, summary: Option<String>) {
        self.summary = summary;
        self.modified_at = Utc::now();
    }

    /// Update the session notes
    pub fn set_notes(&mut self, notes: Option<String>) {
        self.notes = notes;
        self.modified_at = Utc::now();
    }

    /// Assign or clear the campaign
    pub fn set_campaign(&mut self, campaign_id: Option<Uuid>) {
        self.campaign_id = campaign_id;
        self.modified_at = Utc::now();
    }

    /// Update the session date
    pub fn set_session_date(&mut self, session_date: Option<DateTime<Utc>>) {
        self.session_date = session_date;
        self.modified_at = Utc::now();
    }

    /// Update the session duration in hours
    pub fn set_duration(&mut self, duration: Option<f64>) {
        self.duration = duration;
        self.modified_at = Utc::now();
    }

    /// Add a tag
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
            self.modified_at = Utc::now();
        }
    }

    /// Remove a tag
    pub fn remove_tag(&mut self, tag: &str) {
        if let Some(pos) = self.tags.iter().position(|t| t == tag) {
            self.tags.remove(pos);
            self.modified_at = Utc::now();
        }
    }

    /// Set all tags (replacing existing)
    pub fn set_tags(&mut self, tags: Vec<String>) {
        self.tags = tags;
        self.modified_at = Utc::now();
    }

    /// Add a connection to another entity
    pub fn connect(&mut self, other: &Entity) {
        if self.connections.iter().any(|c| c.id == other.id) {
            return;
        }
        self.connections.push(EntityRef::from(other));
        self.modified_at = Utc::now();
    }

    /// Remove the connection to the given entity, returning whether one existed
    pub fn disconnect(&mut self, id: Uuid) -> bool {
        if let Some(pos) = self.connections.iter().position(|c| c.id == id) {
            self.connections.remove(pos);
            self.modified_at = Utc::now();
            true
        } else {
            false
        }
    }

    /// Set or clear one type-specific field
    ///
    /// `None` clears the field. Fails if the name is not legal for this
    /// entity's type.
    pub fn set_field(&mut self, field: &str, value: Option<&str>) -> Result<(), FieldError> {
        let next = match self.type_specific_fields.as_ref() {
            Some(fields) => fields.set(field, value)?,
            None => TypeSpecificFields::new(self.entity_type).set(field, value)?,
        };
        self.type_specific_fields = Some(next);
        self.modified_at = Utc::now();
        Ok(())
    }
}

/// A world: the top-level container entities belong to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct World {
    /// Unique identifier
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Optional description
    pub description: Option<String>,
    /// When this world was created
    pub created_at: DateTime<Utc>,
    /// When this world was last modified
    pub modified_at: DateTime<Utc>,
}

impl World {
    /// Create a new world with the given name
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            created_at: now,
            modified_at: now,
        }
    }

    /// Update the name
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.modified_at = Utc::now();
    }

    /// Update the description
    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
        self.modified_at = Utc::now();
    }
}

/// A campaign within a world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    /// Unique identifier
    pub id: Uuid,
    /// World this campaign belongs to
    pub world_id: Uuid,
    /// Display name
    pub name: String,
    /// Optional description
    pub description: Option<String>,
    /// When this campaign was created
    pub created_at: DateTime<Utc>,
    /// When this campaign was last modified
    pub modified_at: DateTime<Utc>,
}

impl Campaign {
    /// Create a new campaign in the given world
    pub fn new(name: impl Into<String>, world_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            world_id,
            name: name.into(),
            description: None,
            created_at: now,
            modified_at: now,
        }
    }

    /// Update the name
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.modified_at = Utc::now();
    }

    /// Update the description
    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
        self.modified_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_round_trip() {
        for entity_type in EntityType::ALL {
            let parsed: EntityType = entity_type.as_str().parse().unwrap();
            assert_eq!(parsed, entity_type);
        }
    }

    #[test]
    fn test_entity_type_parse_rejects_unknown() {
        let err = "monster".parse::<EntityType>().unwrap_err();
        assert!(err.to_string().contains("monster"));
    }

    #[test]
    fn test_entity_type_parse_case_insensitive() {
        assert_eq!("Character".parse::<EntityType>().unwrap(), EntityType::Character);
    }

    #[test]
    fn test_entity_type_serde_lowercase() {
        let json = serde_json::to_string(&EntityType::Faction).unwrap();
        assert_eq!(json, "\"faction\"");
        let back: EntityType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, EntityType::Faction);
    }

    #[test]
    fn test_field_names_per_type() {
        assert_eq!(
            EntityType::Character.field_names(),
            &["appearance", "personality", "motivation", "voiceMannerisms"]
        );
        assert_eq!(EntityType::Note.field_names(), &["content"]);
        assert!(EntityType::Location.is_legal_field("atmosphere"));
        assert!(!EntityType::Location.is_legal_field("ideology"));
    }

    #[test]
    fn test_entity_new() {
        let world_id = Uuid::new_v4();
        let entity = Entity::new(EntityType::Character, "Elara", world_id);
        assert_eq!(entity.name, "Elara");
        assert_eq!(entity.entity_type, EntityType::Character);
        assert_eq!(entity.world_id, world_id);
        assert!(entity.tags.is_empty());
        assert!(entity.connections.is_empty());
        assert!(entity.campaign_id.is_none());
        assert_eq!(entity.created_at, entity.modified_at);

        let fields = entity.type_specific_fields.as_ref().unwrap();
        assert_eq!(fields.entity_type(), EntityType::Character);
        assert!(fields.is_empty());
    }

    #[test]
    fn test_entity_set_name_bumps_modified() {
        let mut entity = Entity::new(EntityType::Note, "Scratch", Uuid::new_v4());
        let original = entity.modified_at;
        std::thread::sleep(std::time::Duration::from_millis(10));
        entity.set_name("Polished");
        assert_eq!(entity.name, "Polished");
        assert!(entity.modified_at > original);
    }

    #[test]
    fn test_entity_tags() {
        let mut entity = Entity::new(EntityType::Location, "Duskmire", Uuid::new_v4());
        entity.add_tag("swamp");
        entity.add_tag("haunted");
        assert_eq!(entity.tags, vec!["swamp", "haunted"]);

        // Adding duplicate should not add again
        entity.add_tag("swamp");
        assert_eq!(entity.tags.len(), 2);

        entity.remove_tag("swamp");
        assert_eq!(entity.tags, vec!["haunted"]);
    }

    #[test]
    fn test_entity_connections() {
        let world_id = Uuid::new_v4();
        let mut captain = Entity::new(EntityType::Character, "Elara", world_id);
        let ship = Entity::new(EntityType::Location, "The Brine Harrow", world_id);

        captain.connect(&ship);
        assert_eq!(captain.connections.len(), 1);
        assert_eq!(captain.connections[0].id, ship.id);
        assert_eq!(captain.connections[0].name, "The Brine Harrow");
        assert_eq!(captain.connections[0].entity_type, EntityType::Location);

        // Connecting again is a no-op
        captain.connect(&ship);
        assert_eq!(captain.connections.len(), 1);

        assert!(captain.disconnect(ship.id));
        assert!(captain.connections.is_empty());
        assert!(!captain.disconnect(ship.id));
    }

    #[test]
    fn test_entity_set_field() {
        let mut entity = Entity::new(EntityType::Character, "Elara", Uuid::new_v4());
        entity.set_field("appearance", Some("Tall, weathered")).unwrap();

        let fields = entity.type_specific_fields.as_ref().unwrap();
        assert_eq!(fields.get("appearance"), Some("Tall, weathered"));

        let err = entity.set_field("atmosphere", Some("damp")).unwrap_err();
        assert!(err.to_string().contains("atmosphere"));
    }

    #[test]
    fn test_entity_set_field_clears() {
        let mut entity = Entity::new(EntityType::Note, "Scratch", Uuid::new_v4());
        entity.set_field("content", Some("remember the ferry")).unwrap();
        entity.set_field("content", None).unwrap();
        let fields = entity.type_specific_fields.as_ref().unwrap();
        assert_eq!(fields.get("content"), None);
    }

    #[test]
    fn test_world_new() {
        let world = World::new("Aster");
        assert_eq!(world.name, "Aster");
        assert!(world.description.is_none());
        assert_eq!(world.created_at, world.modified_at);
    }

    #[test]
    fn test_campaign_new() {
        let world = World::new("Aster");
        let campaign = Campaign::new("Siege of Vel", world.id);
        assert_eq!(campaign.name, "Siege of Vel");
        assert_eq!(campaign.world_id, world.id);
    }

    #[test]
    fn test_world_serialization() {
        let world = World::new("Aster");
        let json = serde_json::to_string(&world).unwrap();
        let back: World = serde_json::from_str(&json).unwrap();
        assert_eq!(world, back);
    }

    #[test]
    fn test_entity_ref_serde_uses_type_key() {
        let entity = Entity::new(EntityType::Faction, "The Gilded Hand", Uuid::new_v4());
        let reference = EntityRef::from(&entity);
        let json = serde_json::to_string(&reference).unwrap();
        assert!(json.contains("\"type\":\"faction\""));
        let back: EntityRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, reference);
    }
}
