//! Entity metadata needed to open sessions.
//!
//! The registry answers two questions: may this entity be enqueued at all,
//! and which property orders its drain.

use std::collections::BTreeMap;

use enqconf::EntitiesConfig;

use crate::error::{Result, SessionError};

/// Shape of one entity type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntitySchema {
    pub indexable: bool,
    pub primary_key: Option<String>,
    pub composite_key: bool,
    pub uuid_property: Option<String>,
}

impl EntitySchema {
    /// An indexable entity keyed by a single primary key property.
    pub fn indexed(primary_key: impl Into<String>) -> Self {
        Self {
            indexable: true,
            primary_key: Some(primary_key.into()),
            ..Default::default()
        }
    }

    /// An entity that is known but excluded from indexing.
    pub fn not_indexed() -> Self {
        Self::default()
    }

    /// Mark the primary key as composite and name the surrogate UUID property.
    pub fn with_composite_key(mut self, uuid_property: Option<String>) -> Self {
        self.composite_key = true;
        self.uuid_property = uuid_property;
        self
    }

    pub fn without_primary_key(mut self) -> Self {
        self.primary_key = None;
        self
    }

    /// Composite keys drain by the UUID property when there is one, otherwise
    /// by the primary key itself.
    fn ordering_property(&self) -> Option<&str> {
        match (self.composite_key, &self.uuid_property, &self.primary_key) {
            (true, Some(uuid), _) => Some(uuid),
            (_, _, Some(pk)) => Some(pk),
            (_, _, None) => None,
        }
    }
}

/// Registered entity types, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    entities: BTreeMap<String, EntitySchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, name: impl Into<String>, schema: EntitySchema) -> Self {
        self.register(name, schema);
        self
    }

    pub fn register(&mut self, name: impl Into<String>, schema: EntitySchema) {
        self.entities.insert(name.into(), schema);
    }

    pub fn from_config(entities: &EntitiesConfig) -> Self {
        let entities = entities
            .iter()
            .map(|(name, entity)| {
                let schema = EntitySchema {
                    indexable: entity.indexable,
                    primary_key: entity.primary_key.clone(),
                    composite_key: entity.composite_key,
                    uuid_property: entity.uuid_property.clone(),
                };
                (name.clone(), schema)
            })
            .collect();
        Self { entities }
    }

    pub fn get(&self, entity_name: &str) -> Option<&EntitySchema> {
        self.entities.get(entity_name)
    }

    /// Unknown entities are never indexable.
    pub fn is_indexable(&self, entity_name: &str) -> bool {
        self.get(entity_name).is_some_and(|schema| schema.indexable)
    }

    /// Name of the property used as the drain cursor for `entity_name`.
    pub fn resolve_ordering_property(&self, entity_name: &str) -> Result<String> {
        let schema = self
            .get(entity_name)
            .ok_or_else(|| SessionError::UnknownEntity(entity_name.to_string()))?;
        schema
            .ordering_property()
            .map(str::to_string)
            .ok_or_else(|| SessionError::MissingPrimaryKey(entity_name.to_string()))
    }

    pub fn indexable_entities(&self) -> impl Iterator<Item = &str> {
        self.entities
            .iter()
            .filter(|(_, schema)| schema.indexable)
            .map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
