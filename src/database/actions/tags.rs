use crate::{
    cache::cache::{invalidate_cache, CacheKeyType, CacheLifetime, RedisValue},
    error::FoodgramError,
    schema::{Entity, NewTag, Tag, Uuid},
};

use redis::aio::MultiplexedConnection;
use sqlx::{PgConnection, Pool, Postgres};
use std::collections::HashMap;

fn is_hex_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

pub async fn create_tag(tag: NewTag, pool: &Pool<Postgres>) -> Result<Tag, FoodgramError> {
    if !is_hex_color(&tag.color) {
        return Err(FoodgramError::InvalidQuery(format!(
            "{} is not a #RRGGBB color",
            tag.color
        )));
    }

    let tag: Tag = sqlx::query_as(
        "INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3) RETURNING id, name, color, slug",
    )
    .bind(tag.name)
    .bind(tag.color)
    .bind(tag.slug)
    .fetch_one(pool)
    .await?;

    Ok(tag)
}

/// Creates the tag and drops every cached tag list.
pub async fn create_tag_cached(
    tag: NewTag,
    pool: &Pool<Postgres>,
    cache: &mut MultiplexedConnection,
) -> Result<Tag, FoodgramError> {
    let tag = create_tag(tag, pool).await?;
    invalidate_cache(CacheLifetime::BindTagCache, cache).await?;

    Ok(tag)
}

pub async fn get_tag(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Tag>, FoodgramError> {
    let tag: Option<Tag> = sqlx::query_as("SELECT id, name, color, slug FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(tag)
}

pub async fn find_tag(slug: &str, pool: &Pool<Postgres>) -> Result<Option<Tag>, FoodgramError> {
    let tag: Option<Tag> =
        sqlx::query_as("SELECT id, name, color, slug FROM tags WHERE slug = $1")
            .bind(slug)
            .fetch_optional(pool)
            .await?;

    Ok(tag)
}

pub async fn list_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, FoodgramError> {
    let list: Vec<Tag> = sqlx::query_as("SELECT id, name, color, slug FROM tags ORDER BY name")
        .fetch_all(pool)
        .await?;

    Ok(list)
}

/// Cached [`list_tags`]. A failing cache falls back to the database.
pub async fn list_tags_cached(
    pool: &Pool<Postgres>,
    cache: &mut MultiplexedConnection,
) -> Result<Vec<Tag>, FoodgramError> {
    let p = pool.clone();
    let cached = RedisValue::<Tag>::get_or_list(CacheKeyType::Tags.new("all"), cache, move || {
        async move { list_tags(&p).await }
    })
    .await;

    match cached {
        Ok(tags) => Ok(tags.value),
        Err(e) => {
            log::error!("> Tag cache unavailable ({e}), reading database");
            list_tags(pool).await
        }
    }
}

#[derive(sqlx::FromRow)]
struct RecipeTagRow {
    recipe_id: Uuid,
    #[sqlx(flatten)]
    tag: Tag,
}

/// Tags of every recipe in `recipe_ids`, keyed by recipe, in the order they were attached.
pub async fn list_recipe_tags(
    pool: &Pool<Postgres>,
    recipe_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<Tag>>, FoodgramError> {
    let rows: Vec<RecipeTagRow> = sqlx::query_as(
        "
        SELECT rt.recipe_id AS recipe_id, t.id AS id, t.name AS name, t.color AS color, t.slug AS slug
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = ANY($1)
        ORDER BY rt.id
    ",
    )
    .bind(recipe_ids)
    .fetch_all(pool)
    .await?;

    let mut tags: HashMap<Uuid, Vec<Tag>> = HashMap::new();
    for row in rows {
        tags.entry(row.recipe_id).or_default().push(row.tag);
    }

    Ok(tags)
}

/// Fails with the first id in `tags` that has no row.
pub async fn ensure_tags_exist(
    tags: &[Uuid],
    conn: &mut PgConnection,
) -> Result<(), FoodgramError> {
    let found: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM tags WHERE id = ANY($1)")
        .bind(tags)
        .fetch_all(&mut *conn)
        .await?;

    match tags
        .iter()
        .find(|id| !found.iter().any(|(found,)| found == *id))
    {
        Some(missing) => Err(FoodgramError::reference(Entity::Tag, *missing)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("#E26C2D", true)]
    #[case("#49b64e", true)]
    #[case("E26C2D", false)]
    #[case("#E26C2", false)]
    #[case("#GGGGGG", false)]
    #[case("#ÄÄÄ", false)]
    fn colors_are_hex_triplets(#[case] color: &str, #[case] valid: bool) {
        assert_eq!(is_hex_color(color), valid);
    }
}
