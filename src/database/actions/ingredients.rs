use crate::{
    cache::cache::{invalidate_cache, CacheKeyType, CacheLifetime, RedisValue},
    error::FoodgramError,
    schema::{Entity, Ingredient, NewIngredient, Uuid},
};

use redis::aio::MultiplexedConnection;
use sqlx::{PgConnection, Pool, Postgres};

/// Escapes LIKE wildcards so the prefix is matched literally.
fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

pub async fn create_ingredient(
    ingredient: NewIngredient,
    pool: &Pool<Postgres>,
) -> Result<Ingredient, FoodgramError> {
    let ingredient: Ingredient = sqlx::query_as(
        "
        INSERT INTO ingredients (name, measurement_unit)
        VALUES ($1, $2)
        RETURNING id, name, measurement_unit
    ",
    )
    .bind(ingredient.name.trim())
    .bind(ingredient.measurement_unit.trim())
    .fetch_one(pool)
    .await?;

    Ok(ingredient)
}

pub async fn create_ingredient_cached(
    ingredient: NewIngredient,
    pool: &Pool<Postgres>,
    cache: &mut MultiplexedConnection,
) -> Result<Ingredient, FoodgramError> {
    let ingredient = create_ingredient(ingredient, pool).await?;
    invalidate_cache(CacheLifetime::BindIngredientCache, cache).await?;

    Ok(ingredient)
}

pub async fn get_ingredient(
    id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Option<Ingredient>, FoodgramError> {
    let row: Option<Ingredient> =
        sqlx::query_as("SELECT id, name, measurement_unit FROM ingredients WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;

    Ok(row)
}

/// Case-insensitive name prefix search. An empty prefix lists everything.
pub async fn search_ingredients(
    prefix: &str,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, FoodgramError> {
    let rows: Vec<Ingredient> = sqlx::query_as(
        "
        SELECT id, name, measurement_unit
        FROM ingredients
        WHERE LOWER(name) LIKE LOWER($1) ESCAPE '\\'
        ORDER BY name, measurement_unit
    ",
    )
    .bind(like_prefix(prefix))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn search_ingredients_cached(
    prefix: &str,
    pool: &Pool<Postgres>,
    cache: &mut MultiplexedConnection,
) -> Result<Vec<Ingredient>, FoodgramError> {
    let key = prefix.to_lowercase();
    let p = pool.clone();
    let k = key.clone();
    let cached = RedisValue::<Ingredient>::get_or_list(
        CacheKeyType::Ingredients.new(key),
        cache,
        move || async move { search_ingredients(&k, &p).await },
    )
    .await;

    match cached {
        Ok(ingredients) => Ok(ingredients.value),
        Err(e) => {
            log::error!("> Ingredient cache unavailable ({e}), reading database");
            search_ingredients(prefix, pool).await
        }
    }
}

/// Fails with the first id in `ingredients` that has no row.
pub async fn ensure_ingredients_exist(
    ingredients: &[Uuid],
    conn: &mut PgConnection,
) -> Result<(), FoodgramError> {
    let found: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM ingredients WHERE id = ANY($1)")
        .bind(ingredients)
        .fetch_all(&mut *conn)
        .await?;

    match ingredients
        .iter()
        .find(|id| !found.iter().any(|(found,)| found == *id))
    {
        Some(missing) => Err(FoodgramError::reference(Entity::Ingredient, *missing)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("сах", "сах%")]
    #[case("", "%")]
    #[case("50%", "50\\%%")]
    #[case("a_b", "a\\_b%")]
    #[case("c:\\", "c:\\\\%")]
    fn prefix_wildcards_are_escaped(#[case] prefix: &str, #[case] pattern: &str) {
        assert_eq!(like_prefix(prefix), pattern);
    }
}
