use archibald_native::{
    native, predicate, AssociationKind, EntityMetadata, MetadataRegistry, PlaceholderStyle, SortDirection,
};
use chrono::NaiveDate;
use std::sync::Arc;

fn main() -> archibald_native::Result<()> {
    let metadata = Arc::new(
        MetadataRegistry::new()
            .register(
                EntityMetadata::new("App\\Entity\\User", "users")
                    .id("id")
                    .field("name")
                    .field_column("createdAt", "created_at")
                    .association("articles", "App\\Entity\\Article", AssociationKind::OneToMany),
            )
            .register(
                EntityMetadata::new("App\\Entity\\Article", "articles")
                    .id("id")
                    .field("title")
                    .association("author", "App\\Entity\\User", AssociationKind::ManyToOne),
            ),
    );

    // Entity name in FROM, association field in the join
    let mut qb = native(metadata.clone())
        .from("App\\Entity\\User", "u")?
        .left_join("u", "articles", "a", "a.author_id = u.id")?
        .where_(predicate![
            "u.created_at > :since",
            NaiveDate::from_ymd_opt(2024, 1, 1),
            "u.name IN (:names)",
            vec!["ada", "alan"],
        ])?
        .and_where(("a.title LIKE :title", "%engine%"))?
        .order_by("u.name", SortDirection::Asc)
        .set_max_results(20);

    let query = qb.get_query()?;
    println!("SQL: {}", query.sql());
    for (key, bound) in query.parameters().iter() {
        println!("  {} = {:?} ({:?})", key, bound.value, bound.parameter_type);
    }

    let (positional, values) = query.to_positional(PlaceholderStyle::Dollar)?;
    println!("Positional SQL: {}", positional);
    println!("Values: {:?}", values);

    // Plain tables pass through; scalars can be mapped by hand
    let mut counts = native(metadata)
        .from("audit_log", "l")?
        .group_by("l.user_id");
    counts.result_set_mapping().add_scalar_expression("COUNT(*)", "total", "total");
    counts
        .result_set_mapping()
        .add_scalar_expression("l.user_id", "user_id", "userId");

    println!("Scalar SQL: {}", counts.get_query()?.sql());

    Ok(())
}
