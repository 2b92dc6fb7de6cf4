use crate::{
    error::FoodgramError,
    schema::{CartIngredient, Uuid},
    shopping_list::{aggregate_cart, render_shopping_list, ShoppingListLine},
};

use sqlx::{Pool, Postgres};

pub async fn list_cart_ingredients(
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Vec<CartIngredient>, FoodgramError> {
    let rows: Vec<CartIngredient> = sqlx::query_as(
        "
        SELECT i.name AS name, i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM recipe_memberships m
        INNER JOIN recipe_ingredients ri ON ri.recipe_id = m.recipe_id
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE m.user_id = $1 AND m.collection = 'shopping_cart'
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn shopping_list(
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Vec<ShoppingListLine>, FoodgramError> {
    Ok(aggregate_cart(list_cart_ingredients(user_id, pool).await?))
}

/// The plain text shopping list offered as a download.
pub async fn download_shopping_list(
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<String, FoodgramError> {
    let lines = shopping_list(user_id, pool).await?;
    log::debug!("> User {user_id} downloaded {} shopping list lines", lines.len());

    Ok(render_shopping_list(&lines))
}
