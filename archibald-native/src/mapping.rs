//! Result set mapping: how raw result columns hydrate back into entities

use crate::metadata::{AssociationMapping, EntityMetadata};
use crate::{Error, Result};
use indexmap::IndexMap;

/// A result column bound to an entity field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldResult {
    /// Alias of the entity owning the field
    pub alias: String,
    pub field_name: String,
    /// Physical column read from the aliased table
    pub column_name: String,
}

/// A result column hydrated as a plain scalar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarResult {
    /// Name the value is exposed under in hydrated results
    pub result_name: String,
    /// Select expression producing the column, when it is not a bare column
    pub expression: Option<String>,
}

/// Accumulates entity, joined entity, field and scalar results for one query
///
/// Aliases are registered at most once and a joined result requires its
/// parent alias to be registered first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSetMapping {
    alias_map: IndexMap<String, String>,
    parent_alias_map: IndexMap<String, String>,
    relation_map: IndexMap<String, AssociationMapping>,
    field_mappings: IndexMap<String, FieldResult>,
    scalar_mappings: IndexMap<String, ScalarResult>,
}

impl ResultSetMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `alias` as a root entity result
    pub fn add_entity_result(&mut self, entity: &str, alias: &str) -> Result<()> {
        if self.alias_map.contains_key(alias) {
            return Err(Error::duplicate_alias(alias));
        }

        self.alias_map.insert(alias.to_string(), entity.to_string());
        Ok(())
    }

    /// Register `alias` as an entity reached from `parent_alias` through `relation`
    pub fn add_joined_entity_result(
        &mut self,
        entity: &str,
        alias: &str,
        parent_alias: &str,
        relation: AssociationMapping,
    ) -> Result<()> {
        if !self.alias_map.contains_key(parent_alias) {
            return Err(Error::unknown_alias(parent_alias));
        }

        self.add_entity_result(entity, alias)?;
        self.parent_alias_map
            .insert(alias.to_string(), parent_alias.to_string());
        self.relation_map.insert(alias.to_string(), relation);
        Ok(())
    }

    /// Bind `column_alias` to a field of the entity registered under `alias`
    pub fn add_field_result(
        &mut self,
        alias: &str,
        column_alias: &str,
        field_name: &str,
        column_name: &str,
    ) -> Result<()> {
        if !self.alias_map.contains_key(alias) {
            return Err(Error::unknown_alias(alias));
        }

        self.field_mappings.insert(
            column_alias.to_string(),
            FieldResult {
                alias: alias.to_string(),
                field_name: field_name.to_string(),
                column_name: column_name.to_string(),
            },
        );
        Ok(())
    }

    /// Hydrate `column_alias` as a scalar named `result_name`
    pub fn add_scalar_result(&mut self, column_alias: &str, result_name: &str) {
        self.scalar_mappings.insert(
            column_alias.to_string(),
            ScalarResult {
                result_name: result_name.to_string(),
                expression: None,
            },
        );
    }

    /// Hydrate the output of `expression` as a scalar; the expression is
    /// selected as `column_alias` by the generated select clause
    pub fn add_scalar_expression(&mut self, expression: &str, column_alias: &str, result_name: &str) {
        self.scalar_mappings.insert(
            column_alias.to_string(),
            ScalarResult {
                result_name: result_name.to_string(),
                expression: Some(expression.to_string()),
            },
        );
    }

    /// Register a root entity together with one field result per mapped field
    pub fn add_root_entity_from_metadata(&mut self, metadata: &EntityMetadata, alias: &str) -> Result<()> {
        self.add_entity_result(metadata.name(), alias)?;
        self.add_fields_from_metadata(metadata, alias)
    }

    /// Register a joined entity together with one field result per mapped field
    pub fn add_joined_entity_from_metadata(
        &mut self,
        metadata: &EntityMetadata,
        alias: &str,
        parent_alias: &str,
        relation: AssociationMapping,
    ) -> Result<()> {
        self.add_joined_entity_result(metadata.name(), alias, parent_alias, relation)?;
        self.add_fields_from_metadata(metadata, alias)
    }

    fn add_fields_from_metadata(&mut self, metadata: &EntityMetadata, alias: &str) -> Result<()> {
        for field in metadata.fields() {
            let column_alias = self.unique_column_alias(alias, &field.column_name);
            self.add_field_result(alias, &column_alias, &field.field_name, &field.column_name)?;
        }
        Ok(())
    }

    fn unique_column_alias(&self, alias: &str, column: &str) -> String {
        let base = format!("{}_{}", alias, column);
        let mut candidate = base.clone();
        let mut counter = 1;
        while self.field_mappings.contains_key(&candidate)
            || self.scalar_mappings.contains_key(&candidate)
        {
            candidate = format!("{}{}", base, counter);
            counter += 1;
        }
        candidate
    }

    pub fn is_registered(&self, alias: &str) -> bool {
        self.alias_map.contains_key(alias)
    }

    /// Entity registered under `alias`
    pub fn entity_for_alias(&self, alias: &str) -> Option<&str> {
        self.alias_map.get(alias).map(String::as_str)
    }

    /// Parent alias of a joined result
    pub fn parent_alias(&self, alias: &str) -> Option<&str> {
        self.parent_alias_map.get(alias).map(String::as_str)
    }

    /// Relation through which a joined result is reached
    pub fn relation(&self, alias: &str) -> Option<&AssociationMapping> {
        self.relation_map.get(alias)
    }

    /// Every registered alias with its entity, in registration order
    pub fn aliases(&self) -> impl Iterator<Item = (&str, &str)> {
        self.alias_map.iter().map(|(a, e)| (a.as_str(), e.as_str()))
    }

    /// Aliases registered as root results
    pub fn root_aliases(&self) -> impl Iterator<Item = &str> {
        self.alias_map
            .keys()
            .filter(|alias| !self.parent_alias_map.contains_key(*alias))
            .map(String::as_str)
    }

    /// Aliases joined directly from `parent_alias`
    pub fn joined_aliases(&self, parent_alias: &str) -> Vec<&str> {
        self.parent_alias_map
            .iter()
            .filter(|(_, parent)| parent.as_str() == parent_alias)
            .map(|(alias, _)| alias.as_str())
            .collect()
    }

    pub fn field_mappings(&self) -> &IndexMap<String, FieldResult> {
        &self.field_mappings
    }

    pub fn scalar_mappings(&self) -> &IndexMap<String, ScalarResult> {
        &self.scalar_mappings
    }

    /// Whether any column is mapped, as a field or as a scalar
    pub fn has_column_mappings(&self) -> bool {
        !self.field_mappings.is_empty() || !self.scalar_mappings.is_empty()
    }

    /// Render the select list for every mapped column, e.g. `u.id AS u_id`
    ///
    /// Returns an empty string when nothing is mapped.
    pub fn generate_select_clause(&self) -> String {
        let fields = self.field_mappings.iter().map(|(column_alias, field)| {
            format!("{}.{} AS {}", field.alias, field.column_name, column_alias)
        });

        let scalars = self
            .scalar_mappings
            .iter()
            .map(|(column_alias, scalar)| match &scalar.expression {
                Some(expression) => format!("{} AS {}", expression, column_alias),
                None => column_alias.clone(),
            });

        fields.chain(scalars).collect::<Vec<_>>().join(", ")
    }
}
