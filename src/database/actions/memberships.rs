use crate::{
    error::FoodgramError,
    membership::{add_membership, remove_membership, MembershipStore},
    schema::{MembershipKind, ShortRecipe, Uuid},
};

use sqlx::{Pool, Postgres};

use super::recipes::get_recipe;

/// [`MembershipStore`] backed by the `recipe_memberships` and `subscriptions` tables.
pub struct PgMembershipStore<'a> {
    pool: &'a Pool<Postgres>,
}

impl<'a> PgMembershipStore<'a> {
    pub fn new(pool: &'a Pool<Postgres>) -> Self {
        Self { pool }
    }
}

impl MembershipStore for PgMembershipStore<'_> {
    async fn target_exists(
        &self,
        kind: MembershipKind,
        target: Uuid,
    ) -> Result<bool, FoodgramError> {
        let query = match kind {
            MembershipKind::Subscription => "SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)",
            MembershipKind::Favorite | MembershipKind::ShoppingCart => {
                "SELECT EXISTS (SELECT 1 FROM recipes WHERE id = $1)"
            }
        };

        let row: (bool,) = sqlx::query_as(query)
            .bind(target)
            .fetch_one(self.pool)
            .await?;

        Ok(row.0)
    }

    async fn contains(
        &self,
        kind: MembershipKind,
        user: Uuid,
        target: Uuid,
    ) -> Result<bool, FoodgramError> {
        let row: (bool,) = match kind.collection() {
            Some(collection) => sqlx::query_as(
                "SELECT EXISTS (SELECT 1 FROM recipe_memberships WHERE user_id = $1 AND recipe_id = $2 AND collection = $3)",
            )
            .bind(user)
            .bind(target)
            .bind(collection)
            .fetch_one(self.pool)
            .await?,
            None => sqlx::query_as(
                "SELECT EXISTS (SELECT 1 FROM subscriptions WHERE subscriber_id = $1 AND author_id = $2)",
            )
            .bind(user)
            .bind(target)
            .fetch_one(self.pool)
            .await?,
        };

        Ok(row.0)
    }

    async fn insert(
        &self,
        kind: MembershipKind,
        user: Uuid,
        target: Uuid,
    ) -> Result<bool, FoodgramError> {
        let query = match kind.collection() {
            Some(collection) => sqlx::query(
                "
                INSERT INTO recipe_memberships (user_id, recipe_id, collection)
                VALUES ($1, $2, $3)
                ON CONFLICT DO NOTHING
            ",
            )
            .bind(user)
            .bind(target)
            .bind(collection)
            .execute(self.pool)
            .await?,
            None => sqlx::query(
                "
                INSERT INTO subscriptions (subscriber_id, author_id)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
            ",
            )
            .bind(user)
            .bind(target)
            .execute(self.pool)
            .await?,
        };

        Ok(query.rows_affected() > 0)
    }

    async fn delete(
        &self,
        kind: MembershipKind,
        user: Uuid,
        target: Uuid,
    ) -> Result<bool, FoodgramError> {
        let query = match kind.collection() {
            Some(collection) => sqlx::query(
                "DELETE FROM recipe_memberships WHERE user_id = $1 AND recipe_id = $2 AND collection = $3",
            )
            .bind(user)
            .bind(target)
            .bind(collection)
            .execute(self.pool)
            .await?,
            None => {
                sqlx::query("DELETE FROM subscriptions WHERE subscriber_id = $1 AND author_id = $2")
                    .bind(user)
                    .bind(target)
                    .execute(self.pool)
                    .await?
            }
        };

        Ok(query.rows_affected() > 0)
    }
}

async fn add_recipe_to(
    kind: MembershipKind,
    user_id: Uuid,
    recipe_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<ShortRecipe, FoodgramError> {
    add_membership(&PgMembershipStore::new(pool), kind, user_id, recipe_id).await?;

    // The recipe may have been deleted in between
    let recipe = get_recipe(recipe_id, pool)
        .await?
        .ok_or_else(|| FoodgramError::reference(kind.target(), recipe_id))?;

    Ok(recipe.into())
}

pub async fn add_to_favorites(
    user_id: Uuid,
    recipe_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<ShortRecipe, FoodgramError> {
    add_recipe_to(MembershipKind::Favorite, user_id, recipe_id, pool).await
}

pub async fn remove_from_favorites(
    user_id: Uuid,
    recipe_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), FoodgramError> {
    remove_membership(
        &PgMembershipStore::new(pool),
        MembershipKind::Favorite,
        user_id,
        recipe_id,
    )
    .await
}

pub async fn add_to_shopping_cart(
    user_id: Uuid,
    recipe_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<ShortRecipe, FoodgramError> {
    add_recipe_to(MembershipKind::ShoppingCart, user_id, recipe_id, pool).await
}

pub async fn remove_from_shopping_cart(
    user_id: Uuid,
    recipe_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), FoodgramError> {
    remove_membership(
        &PgMembershipStore::new(pool),
        MembershipKind::ShoppingCart,
        user_id,
        recipe_id,
    )
    .await
}
