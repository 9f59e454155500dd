//! Object hydration: flat result rows into nested entity objects
//!
//! Each row carries the columns of every aliased entity side by side. Rows
//! are folded into one object per distinct root entity; joined entities are
//! nested under the relation field they were joined through, as an array for
//! to-many relations and as an object (or null) for to-one relations.
//! Scalar results are merged into the root object.

use crate::mapping::ResultSetMapping;
use crate::metadata::MetadataProvider;
use crate::Result;
use indexmap::{IndexMap, IndexSet};
use serde_json::{Map, Value as JsonValue};
use tracing::trace;

/// One result row keyed by column alias
pub type Row = Map<String, JsonValue>;

/// Columns read for one alias
struct AliasPlan {
    /// Column aliases of the identifier fields
    id_columns: Vec<String>,
    /// Column alias and field name for every mapped field
    fields: Vec<(String, String)>,
}

/// Entities seen so far, per alias, keyed by identity
type EntityIndex = IndexMap<String, IndexMap<String, Map<String, JsonValue>>>;
/// Child identities per parent identity, per child alias
type LinkIndex = IndexMap<String, IndexMap<String, IndexSet<String>>>;

/// Hydrates rows according to a result set mapping
pub struct ObjectHydrator<'a> {
    rsm: &'a ResultSetMapping,
    metadata: &'a dyn MetadataProvider,
}

impl<'a> ObjectHydrator<'a> {
    pub fn new(rsm: &'a ResultSetMapping, metadata: &'a dyn MetadataProvider) -> Self {
        Self { rsm, metadata }
    }

    pub fn hydrate_all(&self, rows: &[Row]) -> Result<Vec<JsonValue>> {
        let plans = self.plans()?;
        let root_aliases: Vec<&str> = self.rsm.root_aliases().collect();

        let mut entities: EntityIndex = IndexMap::new();
        let mut links: LinkIndex = IndexMap::new();
        let mut roots: IndexMap<(String, String), Map<String, JsonValue>> = IndexMap::new();
        let mut scalar_rows = Vec::new();

        for row in rows {
            let mut identities: IndexMap<&str, String> = IndexMap::new();

            for (alias, plan) in &plans {
                let Some(identity) = row_identity(plan, row) else {
                    continue;
                };
                entities
                    .entry(alias.clone())
                    .or_default()
                    .entry(identity.clone())
                    .or_insert_with(|| entity_data(plan, row));
                identities.insert(alias.as_str(), identity);
            }

            for (alias, identity) in &identities {
                let Some(parent) = self.rsm.parent_alias(alias) else {
                    continue;
                };
                if let Some(parent_identity) = identities.get(parent) {
                    links
                        .entry(alias.to_string())
                        .or_default()
                        .entry(parent_identity.clone())
                        .or_default()
                        .insert(identity.clone());
                }
            }

            let scalars = self.scalars(row);
            if root_aliases.is_empty() {
                scalar_rows.push(JsonValue::Object(scalars));
                continue;
            }

            for root in &root_aliases {
                if let Some(identity) = identities.get(root) {
                    roots
                        .entry((root.to_string(), identity.clone()))
                        .or_insert_with(|| scalars.clone());
                }
            }
        }

        if root_aliases.is_empty() {
            trace!(rows = scalar_rows.len(), "hydrated scalar rows");
            return Ok(scalar_rows);
        }

        let results: Vec<JsonValue> = roots
            .into_iter()
            .map(|((alias, identity), scalars)| {
                let mut object = self.build(&alias, &identity, &entities, &links);
                object.extend(scalars);
                JsonValue::Object(object)
            })
            .collect();

        trace!(rows = rows.len(), results = results.len(), "hydrated rows");
        Ok(results)
    }

    fn plans(&self) -> Result<IndexMap<String, AliasPlan>> {
        let mut plans = IndexMap::new();

        for (alias, entity) in self.rsm.aliases() {
            let metadata = self.metadata.class_metadata(entity)?;
            let fields: Vec<(String, String)> = self
                .rsm
                .field_mappings()
                .iter()
                .filter(|(_, field)| field.alias == alias)
                .map(|(column_alias, field)| (column_alias.clone(), field.field_name.clone()))
                .collect();

            let id_columns = fields
                .iter()
                .filter(|(_, field_name)| metadata.identifier().contains(field_name))
                .map(|(column_alias, _)| column_alias.clone())
                .collect();

            plans.insert(alias.to_string(), AliasPlan { id_columns, fields });
        }

        Ok(plans)
    }

    fn scalars(&self, row: &Row) -> Map<String, JsonValue> {
        self.rsm
            .scalar_mappings()
            .iter()
            .map(|(column_alias, scalar)| {
                let value = row.get(column_alias).cloned().unwrap_or(JsonValue::Null);
                (scalar.result_name.clone(), value)
            })
            .collect()
    }

    fn build(&self, alias: &str, identity: &str, entities: &EntityIndex, links: &LinkIndex) -> Map<String, JsonValue> {
        let mut object = entities
            .get(alias)
            .and_then(|by_identity| by_identity.get(identity))
            .cloned()
            .unwrap_or_default();

        for child in self.rsm.joined_aliases(alias) {
            let Some(relation) = self.rsm.relation(child) else {
                continue;
            };
            let children: Vec<&String> = links
                .get(child)
                .and_then(|by_parent| by_parent.get(identity))
                .map(|identities| identities.iter().collect())
                .unwrap_or_default();

            let value = if relation.kind.is_to_many() {
                JsonValue::Array(
                    children
                        .iter()
                        .map(|child_identity| JsonValue::Object(self.build(child, child_identity, entities, links)))
                        .collect(),
                )
            } else {
                children
                    .first()
                    .map(|child_identity| JsonValue::Object(self.build(child, child_identity, entities, links)))
                    .unwrap_or(JsonValue::Null)
            };

            object.insert(relation.field_name.clone(), value);
        }

        object
    }
}

/// Identity of the entity an alias contributes to `row`, if any
///
/// Entities with identifier fields are absent when any identifier is null;
/// without identifiers, when every field is null.
fn row_identity(plan: &AliasPlan, row: &Row) -> Option<String> {
    let columns: Vec<&String> = if plan.id_columns.is_empty() {
        plan.fields.iter().map(|(column_alias, _)| column_alias).collect()
    } else {
        plan.id_columns.iter().collect()
    };

    let values: Vec<JsonValue> = columns
        .iter()
        .map(|column| row.get(*column).cloned().unwrap_or(JsonValue::Null))
        .collect();

    let absent = if plan.id_columns.is_empty() {
        values.iter().all(JsonValue::is_null)
    } else {
        values.iter().any(JsonValue::is_null)
    };

    if absent {
        None
    } else {
        Some(JsonValue::Array(values).to_string())
    }
}

fn entity_data(plan: &AliasPlan, row: &Row) -> Map<String, JsonValue> {
    plan.fields
        .iter()
        .map(|(column_alias, field_name)| {
            let value = row.get(column_alias).cloned().unwrap_or(JsonValue::Null);
            (field_name.clone(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{AssociationKind, EntityMetadata, MetadataRegistry};
    use serde_json::json;

    fn registry() -> MetadataRegistry {
        MetadataRegistry::new()
            .register(
                EntityMetadata::new("App\\User", "users")
                    .id("id")
                    .field("name")
                    .association("articles", "App\\Article", AssociationKind::OneToMany)
                    .association("profile", "App\\Profile", AssociationKind::OneToOne),
            )
            .register(EntityMetadata::new("App\\Article", "articles").id("id").field("title"))
            .register(EntityMetadata::new("App\\Profile", "profiles").id("id").field("bio"))
    }

    fn rsm(registry: &MetadataRegistry) -> ResultSetMapping {
        let user = registry.class_metadata("App\\User").unwrap();
        let mut rsm = ResultSetMapping::new();
        rsm.add_root_entity_from_metadata(user, "u").unwrap();
        rsm.add_joined_entity_from_metadata(
            registry.class_metadata("App\\Article").unwrap(),
            "a",
            "u",
            user.association_mapping("articles").unwrap().clone(),
        )
        .unwrap();
        rsm.add_joined_entity_from_metadata(
            registry.class_metadata("App\\Profile").unwrap(),
            "p",
            "u",
            user.association_mapping("profile").unwrap().clone(),
        )
        .unwrap();
        rsm
    }

    fn row(value: JsonValue) -> Row {
        match value {
            JsonValue::Object(map) => map,
            _ => panic!("row must be an object"),
        }
    }

    #[test]
    fn test_rows_fold_into_root_objects() {
        let registry = registry();
        let rsm = rsm(&registry);
        let rows = vec![
            row(json!({"u_id": 1, "u_name": "Ada", "a_id": 10, "a_title": "Engines", "p_id": 5, "p_bio": "math"})),
            row(json!({"u_id": 1, "u_name": "Ada", "a_id": 11, "a_title": "Notes", "p_id": 5, "p_bio": "math"})),
            row(json!({"u_id": 2, "u_name": "Alan", "a_id": null, "a_title": null, "p_id": null, "p_bio": null})),
        ];

        let results = ObjectHydrator::new(&rsm, &registry).hydrate_all(&rows).unwrap();

        assert_eq!(
            results,
            vec![
                json!({
                    "id": 1,
                    "name": "Ada",
                    "articles": [
                        {"id": 10, "title": "Engines"},
                        {"id": 11, "title": "Notes"}
                    ],
                    "profile": {"id": 5, "bio": "math"}
                }),
                json!({"id": 2, "name": "Alan", "articles": [], "profile": null}),
            ]
        );
    }

    #[test]
    fn test_scalars_merge_into_root() {
        let registry = registry();
        let user = registry.class_metadata("App\\User").unwrap();
        let mut rsm = ResultSetMapping::new();
        rsm.add_root_entity_from_metadata(user, "u").unwrap();
        rsm.add_scalar_expression("COUNT(a.id)", "article_count", "articleCount");

        let rows = vec![row(json!({"u_id": 1, "u_name": "Ada", "article_count": 2}))];
        let results = ObjectHydrator::new(&rsm, &registry).hydrate_all(&rows).unwrap();

        assert_eq!(results, vec![json!({"id": 1, "name": "Ada", "articleCount": 2})]);
    }

    #[test]
    fn test_scalar_only_mapping_keeps_every_row() {
        let registry = registry();
        let mut rsm = ResultSetMapping::new();
        rsm.add_scalar_result("total", "total");

        let rows = vec![row(json!({"total": 3})), row(json!({"total": 3}))];
        let results = ObjectHydrator::new(&rsm, &registry).hydrate_all(&rows).unwrap();

        assert_eq!(results, vec![json!({"total": 3}), json!({"total": 3})]);
    }

    #[test]
    fn test_unknown_entity_in_mapping_fails() {
        let registry = registry();
        let mut rsm = ResultSetMapping::new();
        rsm.add_entity_result("App\\Ghost", "g").unwrap();

        assert!(ObjectHydrator::new(&rsm, &registry).hydrate_all(&[]).is_err());
    }
}
