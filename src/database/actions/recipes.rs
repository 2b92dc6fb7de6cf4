use crate::{
    authentication::permissions::ActionType,
    error::FoodgramError,
    filter::RecipeFilter,
    jwt::SessionData,
    schema::{Entity, MembershipKind, Recipe, RecipeDetail, RecipePart, RecipePayload, Uuid},
    validation::{validate_composition, ValidatedRecipe},
};

use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};
use std::collections::{HashMap, HashSet};

use super::{
    ingredients::ensure_ingredients_exist,
    tags::{ensure_tags_exist, list_recipe_tags},
    users::list_user_profiles,
};

pub async fn get_recipe(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Recipe>, FoodgramError> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Fetches a recipe the session is allowed to change.
pub async fn get_recipe_mut(
    id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Recipe, FoodgramError> {
    let recipe = get_recipe(id, pool)
        .await?
        .ok_or_else(|| FoodgramError::reference(Entity::Recipe, id))?;

    if !session.can_manage(recipe.author_id) {
        return Err(FoodgramError::Forbidden);
    }

    Ok(recipe)
}

#[derive(sqlx::FromRow)]
struct RecipePartRow {
    recipe_id: Uuid,
    #[sqlx(flatten)]
    part: RecipePart,
}

/// Ingredient amounts of every recipe in `recipe_ids`, keyed by recipe.
pub async fn list_recipe_parts(
    pool: &Pool<Postgres>,
    recipe_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<RecipePart>>, FoodgramError> {
    let rows: Vec<RecipePartRow> = sqlx::query_as(
        "
        SELECT ri.recipe_id AS recipe_id, i.id AS id, i.name AS name,
            i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = ANY($1)
        ORDER BY ri.id
    ",
    )
    .bind(recipe_ids)
    .fetch_all(pool)
    .await?;

    let mut parts: HashMap<Uuid, Vec<RecipePart>> = HashMap::new();
    for row in rows {
        parts.entry(row.recipe_id).or_default().push(row.part);
    }

    Ok(parts)
}

/// `(recipe, kind)` pairs the viewer holds among `recipe_ids`.
async fn list_viewer_memberships(
    viewer: Option<Uuid>,
    recipe_ids: &[Uuid],
    pool: &Pool<Postgres>,
) -> Result<HashSet<(Uuid, MembershipKind)>, FoodgramError> {
    let viewer = match viewer {
        Some(v) => v,
        None => return Ok(HashSet::new()),
    };

    let rows: Vec<(Uuid, String)> = sqlx::query_as(
        "SELECT recipe_id, collection FROM recipe_memberships WHERE user_id = $1 AND recipe_id = ANY($2)",
    )
    .bind(viewer)
    .bind(recipe_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(recipe, collection)| {
            [MembershipKind::Favorite, MembershipKind::ShoppingCart]
                .into_iter()
                .find(|kind| kind.collection() == Some(collection.as_str()))
                .map(|kind| (recipe, kind))
        })
        .collect())
}

async fn ensure_references_exist(
    recipe: &ValidatedRecipe,
    conn: &mut PgConnection,
) -> Result<(), FoodgramError> {
    ensure_tags_exist(&recipe.tags, conn).await?;

    let ingredients: Vec<Uuid> = recipe.ingredients.iter().map(|(id, _)| *id).collect();
    ensure_ingredients_exist(&ingredients, conn).await
}

async fn insert_recipe_links(
    recipe_id: Uuid,
    recipe: &ValidatedRecipe,
    conn: &mut PgConnection,
) -> Result<(), FoodgramError> {
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
    builder.push_values(recipe.tags.iter(), |mut b, tag| {
        b.push_bind(recipe_id).push_bind(*tag);
    });
    builder
        .build()
        .execute(&mut *conn)
        .await?;

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ");
    builder.push_values(recipe.ingredients.iter(), |mut b, (ingredient, amount)| {
        b.push_bind(recipe_id)
            .push_bind(*ingredient)
            .push_bind(*amount);
    });
    builder
        .build()
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Validates and stores a recipe with its tags and ingredient amounts. Nothing is
/// persisted unless every part succeeds.
pub async fn create_recipe(
    session: &SessionData,
    payload: RecipePayload,
    pool: &Pool<Postgres>,
) -> Result<RecipeDetail, FoodgramError> {
    session.authenticate(ActionType::CreateRecipes)?;
    let recipe = validate_composition(payload)?;

    let mut tx = pool.begin().await?;
    ensure_references_exist(&recipe, &mut *tx).await?;

    let id: (Uuid,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, image, text, cooking_time)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ",
    )
    .bind(session.user_id)
    .bind(&recipe.name)
    .bind(&recipe.image)
    .bind(&recipe.text)
    .bind(recipe.cooking_time)
    .fetch_one(&mut *tx)
    .await?;

    insert_recipe_links(id.0, &recipe, &mut *tx).await?;
    tx.commit().await?;

    log::debug!("> User {} created recipe {}", session.user_id, id.0);

    get_recipe_detail(id.0, Some(session.user_id), pool).await
}

/// Replaces every field, tag and ingredient of the recipe. The author stays as is.
pub async fn update_recipe(
    id: Uuid,
    session: &SessionData,
    payload: RecipePayload,
    pool: &Pool<Postgres>,
) -> Result<RecipeDetail, FoodgramError> {
    get_recipe_mut(id, session, pool).await?;
    let recipe = validate_composition(payload)?;

    let mut tx = pool.begin().await?;
    ensure_references_exist(&recipe, &mut *tx).await?;

    sqlx::query(
        "
        UPDATE recipes
        SET name = $2, image = $3, text = $4, cooking_time = $5
        WHERE id = $1
    ",
    )
    .bind(id)
    .bind(&recipe.name)
    .bind(&recipe.image)
    .bind(&recipe.text)
    .bind(recipe.cooking_time)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    insert_recipe_links(id, &recipe, &mut *tx).await?;
    tx.commit().await?;

    log::debug!("> User {} updated recipe {id}", session.user_id);

    get_recipe_detail(id, Some(session.user_id), pool).await
}

pub async fn delete_recipe(
    id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), FoodgramError> {
    get_recipe_mut(id, session, pool).await?;

    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    log::debug!("> User {} deleted recipe {id}", session.user_id);

    Ok(())
}

/// Read models for `recipes` in the given order, with a fixed number of queries.
async fn recipe_details(
    recipes: Vec<Recipe>,
    viewer: Option<Uuid>,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeDetail>, FoodgramError> {
    let ids: Vec<Uuid> = recipes.iter().map(|recipe| recipe.id).collect();
    let mut author_ids: Vec<Uuid> = recipes.iter().map(|recipe| recipe.author_id).collect();
    author_ids.sort_unstable();
    author_ids.dedup();

    let authors = list_user_profiles(&author_ids, viewer, pool).await?;
    let mut tags = list_recipe_tags(pool, &ids).await?;
    let mut parts = list_recipe_parts(pool, &ids).await?;
    let memberships = list_viewer_memberships(viewer, &ids, pool).await?;

    recipes
        .into_iter()
        .map(|recipe| -> Result<RecipeDetail, FoodgramError> {
            let author = authors
                .get(&recipe.author_id)
                .cloned()
                .ok_or_else(|| FoodgramError::reference(Entity::User, recipe.author_id))?;

            Ok(RecipeDetail {
                author,
                tags: tags.remove(&recipe.id).unwrap_or_default(),
                ingredients: parts.remove(&recipe.id).unwrap_or_default(),
                is_favorited: memberships.contains(&(recipe.id, MembershipKind::Favorite)),
                is_in_shopping_cart: memberships
                    .contains(&(recipe.id, MembershipKind::ShoppingCart)),
                id: recipe.id,
                name: recipe.name,
                image: recipe.image,
                text: recipe.text,
                cooking_time: recipe.cooking_time,
            })
        })
        .collect()
}

pub async fn get_recipe_detail(
    id: Uuid,
    viewer: Option<Uuid>,
    pool: &Pool<Postgres>,
) -> Result<RecipeDetail, FoodgramError> {
    let recipe = get_recipe(id, pool)
        .await?
        .ok_or_else(|| FoodgramError::reference(Entity::Recipe, id))?;

    let mut details = recipe_details(vec![recipe], viewer, pool).await?;
    details
        .pop()
        .ok_or_else(|| FoodgramError::reference(Entity::Recipe, id))
}

/// Recipes matching `filter` as seen by `viewer`, newest first.
pub async fn fetch_recipes(
    filter: &RecipeFilter,
    viewer: Option<Uuid>,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeDetail>, FoodgramError> {
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT r.* FROM recipes r WHERE TRUE");
    filter.push_conditions(&mut builder, viewer);
    builder.push(" ORDER BY r.pub_date DESC, r.id DESC");

    let rows: Vec<Recipe> = builder
        .build_query_as()
        .fetch_all(pool)
        .await?;

    recipe_details(rows, viewer, pool).await
}
