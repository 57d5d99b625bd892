//! Type-specific field containers
//!
//! Each entity type allows a fixed set of named free-text fields (a
//! character has `appearance`, a location has `atmosphere`, and so on).
//! `TypeSpecificFields` holds those values and enforces the whitelist:
//! an illegal name can never be stored, and every mutation returns a
//! new container, leaving the original untouched.
//!
//! Rehydration from persisted JSON is deliberately lenient. A blob that
//! is missing, empty, malformed, or written by an older build degrades
//! to an empty container instead of failing the read.

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::models::EntityType;

/// Error raised when a field name is not legal for the entity type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("unknown field '{field}' for {entity_type} entities")]
    UnknownField {
        entity_type: EntityType,
        field: String,
    },
}

/// An immutable set of schema-validated fields for one entity type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSpecificFields {
    entity_type: EntityType,
    values: BTreeMap<String, String>,
}

impl TypeSpecificFields {
    /// Create an empty container for the given entity type
    pub fn new(entity_type: EntityType) -> Self {
        Self {
            entity_type,
            values: BTreeMap::new(),
        }
    }

    /// Rehydrate from a persisted JSON blob
    ///
    /// Never fails. A missing, empty, or unparseable blob yields an
    /// empty container; keys that are not legal for the type and values
    /// that are not strings are dropped.
    pub fn from_json(entity_type: EntityType, blob: Option<&str>) -> Self {
        let mut fields = Self::new(entity_type);
        let Some(blob) = blob else {
            return fields;
        };
        if blob.trim().is_empty() {
            return fields;
        }
        let Ok(serde_json::Value::Object(map)) = serde_json::from_str(blob) else {
            return fields;
        };
        for (key, value) in map {
            if !entity_type.is_legal_field(&key) {
                continue;
            }
            if let serde_json::Value::String(text) = value {
                fields.values.insert(key, text);
            }
        }
        fields
    }

    /// The entity type this container is bound to
    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    /// Get a field value
    ///
    /// Returns `None` when the field is unset or not legal for the
    /// type. A field set to the empty string returns `Some("")`.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }

    /// Return a new container with one field set or cleared
    ///
    /// `None` clears the field. Fails if the name is not legal for the
    /// type; the original container is never modified.
    pub fn set(&self, field: &str, value: Option<&str>) -> Result<Self, FieldError> {
        if !self.entity_type.is_legal_field(field) {
            return Err(FieldError::UnknownField {
                entity_type: self.entity_type,
                field: field.to_string(),
            });
        }
        let mut next = self.clone();
        match value {
            Some(value) => {
                next.values.insert(field.to_string(), value.to_string());
            }
            None => {
                next.values.remove(field);
            }
        }
        Ok(next)
    }

    /// Serialize to the persisted JSON shape
    ///
    /// Only currently-set fields are emitted, in the order declared by
    /// [`EntityType::field_names`]. An unset container yields `"{}"`.
    pub fn to_json(&self) -> String {
        // String-keyed, string-valued map; serialization cannot fail
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }

    /// View as a discriminated enum for exhaustive matching
    pub fn to_typed(&self) -> TypedFields {
        let get = |name: &str| self.values.get(name).cloned();
        match self.entity_type {
            EntityType::Character => TypedFields::Character {
                appearance: get("appearance"),
                personality: get("personality"),
                motivation: get("motivation"),
                voice_mannerisms: get("voiceMannerisms"),
            },
            EntityType::Location => TypedFields::Location {
                appearance: get("appearance"),
                atmosphere: get("atmosphere"),
                notable_features: get("notableFeatures"),
            },
            EntityType::Faction => TypedFields::Faction {
                ideology: get("ideology"),
                goals: get("goals"),
                resources: get("resources"),
                structure: get("structure"),
            },
            EntityType::Note => TypedFields::Note {
                content: get("content"),
            },
            EntityType::Session => TypedFields::Session {
                prep_notes: get("prepNotes"),
            },
        }
    }

    /// Whether no field holds a non-empty value
    ///
    /// A field set to the empty string still counts as empty here, even
    /// though [`get`](Self::get) distinguishes it from an unset field.
    pub fn is_empty(&self) -> bool {
        self.values.values().all(|v| v.is_empty())
    }

    /// Whether `name` is a legal field for this container's type
    pub fn is_legal_field(&self, name: &str) -> bool {
        self.entity_type.is_legal_field(name)
    }

    /// Legal field names for this container's type, in display order
    pub fn legal_field_names(&self) -> &'static [&'static str] {
        self.entity_type.field_names()
    }
}

impl Serialize for TypeSpecificFields {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for name in self.entity_type.field_names() {
            if let Some(value) = self.values.get(*name) {
                map.serialize_entry(name, value)?;
            }
        }
        map.end()
    }
}

/// Field values grouped by entity type
///
/// Produced by [`TypeSpecificFields::to_typed`]; each variant carries
/// the legal fields for its type so callers can match exhaustively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedFields {
    Character {
        appearance: Option<String>,
        personality: Option<String>,
        motivation: Option<String>,
        voice_mannerisms: Option<String>,
    },
    Location {
        appearance: Option<String>,
        atmosphere: Option<String>,
        notable_features: Option<String>,
    },
    Faction {
        ideology: Option<String>,
        goals: Option<String>,
        resources: Option<String>,
        structure: Option<String>,
    },
    Note {
        content: Option<String>,
    },
    Session {
        prep_notes: Option<String>,
    },
}
