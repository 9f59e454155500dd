//! Entity metadata: which entity lives in which table, its columns and associations

use crate::{Error, Result};
use indexmap::IndexMap;

/// Separator used in fully-qualified entity names, e.g. `App\Entity\User`
pub const NAMESPACE_SEPARATOR: char = '\\';

/// Kind of relation an association field describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationKind {
    OneToOne,
    ManyToOne,
    OneToMany,
    ManyToMany,
}

impl AssociationKind {
    /// Whether the association hydrates into a collection
    pub fn is_to_many(&self) -> bool {
        matches!(self, AssociationKind::OneToMany | AssociationKind::ManyToMany)
    }
}

/// A declared relation field on an entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationMapping {
    /// Entity that declares the association
    pub source_entity: String,
    /// Field name on the source entity
    pub field_name: String,
    /// Fully-qualified name of the target entity
    pub target_entity: String,
    pub kind: AssociationKind,
}

/// A mapped field and the column it is stored in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    pub field_name: String,
    pub column_name: String,
}

/// Read-only metadata describing one mapped entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMetadata {
    name: String,
    table_name: String,
    fields: Vec<FieldMapping>,
    identifier: Vec<String>,
    associations: IndexMap<String, AssociationMapping>,
}

impl EntityMetadata {
    /// Start describing an entity stored in `table`
    ///
    /// # Examples
    /// ```
    /// use archibald_native::{AssociationKind, EntityMetadata};
    ///
    /// let user = EntityMetadata::new("App\\Entity\\User", "users")
    ///     .id("id")
    ///     .field("name")
    ///     .association("articles", "App\\Entity\\Article", AssociationKind::OneToMany);
    ///
    /// assert_eq!(user.table_name(), "users");
    /// assert!(user.has_association("articles"));
    /// ```
    pub fn new(name: &str, table: &str) -> Self {
        Self {
            name: name.to_string(),
            table_name: table.to_string(),
            fields: Vec::new(),
            identifier: Vec::new(),
            associations: IndexMap::new(),
        }
    }

    /// Add an identifier field stored in a column of the same name
    pub fn id(self, field: &str) -> Self {
        self.id_column(field, field)
    }

    /// Add an identifier field stored in `column`
    pub fn id_column(mut self, field: &str, column: &str) -> Self {
        self.identifier.push(field.to_string());
        self.field_column(field, column)
    }

    /// Add a field stored in a column of the same name
    pub fn field(self, field: &str) -> Self {
        self.field_column(field, field)
    }

    /// Add a field stored in `column`
    pub fn field_column(mut self, field: &str, column: &str) -> Self {
        self.fields.push(FieldMapping {
            field_name: field.to_string(),
            column_name: column.to_string(),
        });
        self
    }

    /// Declare an association field pointing at `target`
    pub fn association(mut self, field: &str, target: &str, kind: AssociationKind) -> Self {
        self.associations.insert(
            field.to_string(),
            AssociationMapping {
                source_entity: self.name.clone(),
                field_name: field.to_string(),
                target_entity: target.to_string(),
                kind,
            },
        );
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn fields(&self) -> &[FieldMapping] {
        &self.fields
    }

    pub fn identifier(&self) -> &[String] {
        &self.identifier
    }

    pub fn has_association(&self, field: &str) -> bool {
        self.associations.contains_key(field)
    }

    pub fn association_mapping(&self, field: &str) -> Option<&AssociationMapping> {
        self.associations.get(field)
    }

    /// Target entity of an association field
    pub fn association_target(&self, field: &str) -> Option<&str> {
        self.associations
            .get(field)
            .map(|mapping| mapping.target_entity.as_str())
    }

    /// All associations in declaration order
    pub fn association_mappings(&self) -> impl Iterator<Item = &AssociationMapping> {
        self.associations.values()
    }
}

/// Source of entity metadata, shared read-only between builders
pub trait MetadataProvider: Send + Sync {
    /// Look up an entity by its fully-qualified name
    fn class_metadata(&self, name: &str) -> Result<&EntityMetadata>;

    /// Every entity the provider knows about
    fn all_metadata(&self) -> Vec<&EntityMetadata>;
}

/// In-memory metadata provider
#[derive(Debug, Clone, Default)]
pub struct MetadataRegistry {
    entities: IndexMap<String, EntityMetadata>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity, replacing any previous one with the same name
    pub fn register(mut self, metadata: EntityMetadata) -> Self {
        self.entities.insert(metadata.name().to_string(), metadata);
        self
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl MetadataProvider for MetadataRegistry {
    fn class_metadata(&self, name: &str) -> Result<&EntityMetadata> {
        self.entities
            .get(name.trim_start_matches(NAMESPACE_SEPARATOR))
            .ok_or_else(|| Error::entity_not_found(name))
    }

    fn all_metadata(&self) -> Vec<&EntityMetadata> {
        self.entities.values().collect()
    }
}
