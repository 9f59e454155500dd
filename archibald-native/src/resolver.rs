//! Table reference resolution against entity metadata
//!
//! A table reference passed to `from` or one of the joins may be a physical
//! table name, a fully-qualified entity name, or the name of an association
//! field on the entity it is joined from. The resolver turns any of these
//! into the physical table name and, when an entity is recognised, registers
//! the alias into the result set mapping.

use crate::mapping::ResultSetMapping;
use crate::metadata::{AssociationMapping, EntityMetadata, MetadataProvider, NAMESPACE_SEPARATOR};
use crate::Result;
use tracing::{debug, trace};

/// Resolves table references and registers entity results
pub struct MappingResolver<'a> {
    metadata: &'a dyn MetadataProvider,
}

impl<'a> MappingResolver<'a> {
    pub fn new(metadata: &'a dyn MetadataProvider) -> Self {
        Self { metadata }
    }

    /// Resolve `identifier` to a physical table name, registering `alias`
    /// into `rsm` when the identifier names a mapped entity.
    ///
    /// Identifiers that match no entity are returned unchanged and leave
    /// `rsm` untouched. Unknown fully-qualified entity names fail with the
    /// provider's error.
    pub fn resolve(
        &self,
        identifier: &str,
        alias: &str,
        joined_from: Option<&str>,
        rsm: &mut ResultSetMapping,
    ) -> Result<String> {
        let (entity, relation) = self.find_entity(identifier, joined_from, rsm)?;

        let Some(entity) = entity else {
            trace!(identifier, alias, "table reference is not a mapped entity");
            return Ok(identifier.to_string());
        };

        match (joined_from, relation) {
            (Some(parent), Some(relation)) => {
                debug!(
                    entity = entity.name(),
                    alias,
                    parent,
                    relation = %relation.field_name,
                    "registering joined entity result"
                );
                rsm.add_joined_entity_from_metadata(entity, alias, parent, relation)?;
            }
            (joined_from, _) => {
                if let Some(parent) = joined_from {
                    // Table name coincidence without a relation: the entity
                    // is registered as a root even inside a join.
                    debug!(
                        entity = entity.name(),
                        alias,
                        parent,
                        "no relation from parent, registering as root entity result"
                    );
                } else {
                    debug!(entity = entity.name(), alias, "registering root entity result");
                }
                rsm.add_root_entity_from_metadata(entity, alias)?;
            }
        }

        Ok(entity.table_name().to_string())
    }

    fn find_entity(
        &self,
        identifier: &str,
        joined_from: Option<&str>,
        rsm: &ResultSetMapping,
    ) -> Result<(Option<&'a EntityMetadata>, Option<AssociationMapping>)> {
        let metadata = self.metadata;

        if identifier.contains(NAMESPACE_SEPARATOR) {
            let entity = metadata.class_metadata(identifier)?;
            return Ok((Some(entity), None));
        }

        let parent_entity = joined_from.and_then(|parent| rsm.entity_for_alias(parent));
        if let Some(parent_entity) = parent_entity {
            let parent = metadata.class_metadata(parent_entity)?;
            return self.find_through_parent(identifier, parent);
        }

        let entity = metadata
            .all_metadata()
            .into_iter()
            .find(|entity| entity.table_name() == identifier);
        Ok((entity, None))
    }

    /// Match an association field name first, then a target table name
    fn find_through_parent(
        &self,
        identifier: &str,
        parent: &'a EntityMetadata,
    ) -> Result<(Option<&'a EntityMetadata>, Option<AssociationMapping>)> {
        let metadata = self.metadata;

        if let Some(mapping) = parent.association_mapping(identifier) {
            let target = metadata.class_metadata(&mapping.target_entity)?;
            return Ok((Some(target), Some(mapping.clone())));
        }

        for mapping in parent.association_mappings() {
            let target = metadata.class_metadata(&mapping.target_entity)?;
            if target.table_name() == identifier {
                return Ok((Some(target), Some(mapping.clone())));
            }
        }

        Ok((None, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{AssociationKind, MetadataRegistry};
    use crate::Error;

    fn registry() -> MetadataRegistry {
        MetadataRegistry::new()
            .register(
                EntityMetadata::new("App\\User", "users")
                    .id("id")
                    .field("name")
                    .association("articles", "App\\Article", AssociationKind::OneToMany)
                    .association("profile", "App\\Profile", AssociationKind::OneToOne),
            )
            .register(
                EntityMetadata::new("App\\Article", "articles")
                    .id("id")
                    .field("title")
                    .association("author", "App\\User", AssociationKind::ManyToOne),
            )
            .register(EntityMetadata::new("App\\Profile", "user_profiles").id("id").field("bio"))
            .register(EntityMetadata::new("App\\Tag", "tags").id("id").field("label"))
    }

    #[test]
    fn test_plain_table_passes_through() {
        let registry = registry();
        let resolver = MappingResolver::new(&registry);
        let mut rsm = ResultSetMapping::new();

        let table = resolver.resolve("audit_log", "l", None, &mut rsm).unwrap();
        assert_eq!(table, "audit_log");
        assert_eq!(rsm, ResultSetMapping::new());
    }

    #[test]
    fn test_qualified_name_registers_root() {
        let registry = registry();
        let resolver = MappingResolver::new(&registry);
        let mut rsm = ResultSetMapping::new();

        let table = resolver.resolve("App\\User", "u", None, &mut rsm).unwrap();
        assert_eq!(table, "users");
        assert_eq!(rsm.aliases().collect::<Vec<_>>(), vec![("u", "App\\User")]);
        assert_eq!(rsm.field_mappings().len(), 2);
    }

    #[test]
    fn test_unknown_qualified_name_propagates_error() {
        let registry = registry();
        let resolver = MappingResolver::new(&registry);
        let mut rsm = ResultSetMapping::new();

        let err = resolver.resolve("App\\Ghost", "g", None, &mut rsm).unwrap_err();
        assert!(matches!(err, Error::EntityNotFound { .. }));
        assert!(!rsm.is_registered("g"));
    }

    #[test]
    fn test_table_name_registers_root() {
        let registry = registry();
        let resolver = MappingResolver::new(&registry);
        let mut rsm = ResultSetMapping::new();

        let table = resolver.resolve("articles", "a", None, &mut rsm).unwrap();
        assert_eq!(table, "articles");
        assert_eq!(rsm.entity_for_alias("a"), Some("App\\Article"));
        assert_eq!(rsm.parent_alias("a"), None);
    }

    #[test]
    fn test_join_through_association_field() {
        let registry = registry();
        let resolver = MappingResolver::new(&registry);
        let mut rsm = ResultSetMapping::new();

        resolver.resolve("users", "u", None, &mut rsm).unwrap();
        let table = resolver.resolve("profile", "p", Some("u"), &mut rsm).unwrap();

        assert_eq!(table, "user_profiles");
        assert_eq!(rsm.entity_for_alias("p"), Some("App\\Profile"));
        assert_eq!(rsm.parent_alias("p"), Some("u"));
        assert_eq!(rsm.relation("p").unwrap().field_name, "profile");
    }

    #[test]
    fn test_join_through_target_table_name() {
        let registry = registry();
        let resolver = MappingResolver::new(&registry);
        let mut rsm = ResultSetMapping::new();

        resolver.resolve("users", "u", None, &mut rsm).unwrap();
        let table = resolver.resolve("user_profiles", "p", Some("u"), &mut rsm).unwrap();

        assert_eq!(table, "user_profiles");
        assert_eq!(rsm.parent_alias("p"), Some("u"));
        assert_eq!(rsm.relation("p").unwrap().field_name, "profile");
    }

    #[test]
    fn test_join_to_unrelated_table_passes_through() {
        let registry = registry();
        let resolver = MappingResolver::new(&registry);
        let mut rsm = ResultSetMapping::new();

        resolver.resolve("users", "u", None, &mut rsm).unwrap();
        let before = rsm.clone();

        // tags is mapped, but users has no relation to it
        let table = resolver.resolve("tags", "t", Some("u"), &mut rsm).unwrap();
        assert_eq!(table, "tags");
        assert_eq!(rsm, before);
    }

    #[test]
    fn test_join_from_unmapped_alias_falls_back_to_root() {
        let registry = registry();
        let resolver = MappingResolver::new(&registry);
        let mut rsm = ResultSetMapping::new();

        // "l" comes from a plain table, so only the table name coincidence is
        // left; the entity ends up as a root result, not a joined one.
        resolver.resolve("audit_log", "l", None, &mut rsm).unwrap();
        let table = resolver.resolve("tags", "t", Some("l"), &mut rsm).unwrap();

        assert_eq!(table, "tags");
        assert_eq!(rsm.entity_for_alias("t"), Some("App\\Tag"));
        assert_eq!(rsm.parent_alias("t"), None);
        assert_eq!(rsm.root_aliases().collect::<Vec<_>>(), vec!["t"]);
    }

    #[test]
    fn test_qualified_name_in_join_registers_root() {
        let registry = registry();
        let resolver = MappingResolver::new(&registry);
        let mut rsm = ResultSetMapping::new();

        // A qualified name carries no relation, even from a mapped parent
        resolver.resolve("App\\User", "u", None, &mut rsm).unwrap();
        let table = resolver.resolve("App\\Article", "a", Some("u"), &mut rsm).unwrap();

        assert_eq!(table, "articles");
        assert_eq!(rsm.entity_for_alias("a"), Some("App\\Article"));
        assert_eq!(rsm.parent_alias("a"), None);
        assert!(rsm.relation("a").is_none());
        assert_eq!(rsm.root_aliases().collect::<Vec<_>>(), vec!["u", "a"]);
    }

    #[test]
    fn test_duplicate_root_alias_fails() {
        let registry = registry();
        let resolver = MappingResolver::new(&registry);
        let mut rsm = ResultSetMapping::new();

        resolver.resolve("App\\User", "u", None, &mut rsm).unwrap();
        let err = resolver.resolve("App\\User", "u", None, &mut rsm).unwrap_err();

        assert!(matches!(err, Error::DuplicateAlias { .. }));
        assert_eq!(rsm.aliases().count(), 1);
    }
}
