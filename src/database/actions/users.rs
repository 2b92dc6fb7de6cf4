use crate::{
    error::FoodgramError,
    membership::{add_membership, is_member, remove_membership},
    schema::{Entity, MembershipKind, ShortRecipe, SubscriptionCard, User, UserProfile, Uuid},
};

use sqlx::{Pool, Postgres};
use std::collections::{HashMap, HashSet};

use super::memberships::PgMembershipStore;

pub async fn get_user_by_id(
    pool: &Pool<Postgres>,
    user_id: Uuid,
) -> Result<Option<User>, FoodgramError> {
    let row: Option<User> = sqlx::query_as(
        "SELECT id, username, email, first_name, last_name, role FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn is_subscribed(
    viewer: Option<Uuid>,
    author_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<bool, FoodgramError> {
    is_member(
        &PgMembershipStore::new(pool),
        MembershipKind::Subscription,
        viewer,
        author_id,
    )
    .await
}

pub async fn get_user_profile(
    user_id: Uuid,
    viewer: Option<Uuid>,
    pool: &Pool<Postgres>,
) -> Result<UserProfile, FoodgramError> {
    let user = get_user_by_id(pool, user_id)
        .await?
        .ok_or_else(|| FoodgramError::reference(Entity::User, user_id))?;
    let subscribed = is_subscribed(viewer, user_id, pool).await?;

    Ok(UserProfile::from_user(user, subscribed))
}

/// The session's own profile. Nobody is subscribed to themselves.
pub async fn get_me(user_id: Uuid, pool: &Pool<Postgres>) -> Result<UserProfile, FoodgramError> {
    let user = get_user_by_id(pool, user_id)
        .await?
        .ok_or_else(|| FoodgramError::reference(Entity::User, user_id))?;

    Ok(UserProfile::from_user(user, false))
}

/// Which of `authors` the viewer is subscribed to. Anonymous viewers follow nobody.
async fn subscribed_authors(
    viewer: Option<Uuid>,
    authors: &[Uuid],
    pool: &Pool<Postgres>,
) -> Result<HashSet<Uuid>, FoodgramError> {
    let viewer = match viewer {
        Some(v) => v,
        None => return Ok(HashSet::new()),
    };

    let rows: Vec<(Uuid,)> = sqlx::query_as(
        "SELECT author_id FROM subscriptions WHERE subscriber_id = $1 AND author_id = ANY($2)",
    )
    .bind(viewer)
    .bind(authors)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Profiles for every id in `user_ids` that has a row, keyed by id.
pub async fn list_user_profiles(
    user_ids: &[Uuid],
    viewer: Option<Uuid>,
    pool: &Pool<Postgres>,
) -> Result<HashMap<Uuid, UserProfile>, FoodgramError> {
    let users: Vec<User> = sqlx::query_as(
        "SELECT id, username, email, first_name, last_name, role FROM users WHERE id = ANY($1)",
    )
    .bind(user_ids)
    .fetch_all(pool)
    .await?;

    let subscribed = subscribed_authors(viewer, user_ids, pool).await?;

    Ok(users
        .into_iter()
        .map(|user| {
            let is_subscribed = subscribed.contains(&user.id);
            (user.id, UserProfile::from_user(user, is_subscribed))
        })
        .collect())
}

pub async fn list_users(
    viewer: Option<Uuid>,
    pool: &Pool<Postgres>,
) -> Result<Vec<UserProfile>, FoodgramError> {
    let users: Vec<User> = sqlx::query_as(
        "SELECT id, username, email, first_name, last_name, role FROM users ORDER BY username",
    )
    .fetch_all(pool)
    .await?;

    let ids: Vec<Uuid> = users.iter().map(|user| user.id).collect();
    let subscribed = subscribed_authors(viewer, &ids, pool).await?;

    Ok(users
        .into_iter()
        .map(|user| {
            let is_subscribed = subscribed.contains(&user.id);
            UserProfile::from_user(user, is_subscribed)
        })
        .collect())
}

/// Author profile with their newest recipes. `recipes_limit` of `None` lists all of them.
pub async fn subscription_card(
    author: User,
    viewer: Uuid,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<SubscriptionCard, FoodgramError> {
    let recipes: Vec<ShortRecipe> = sqlx::query_as(
        "
        SELECT id, name, image, cooking_time
        FROM recipes
        WHERE author_id = $1
        ORDER BY pub_date DESC, id DESC
        LIMIT $2
    ",
    )
    .bind(author.id)
    .bind(recipes_limit.map(|limit| limit.max(0)))
    .fetch_all(pool)
    .await?;

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recipes WHERE author_id = $1")
        .bind(author.id)
        .fetch_one(pool)
        .await?;

    let subscribed = is_subscribed(Some(viewer), author.id, pool).await?;

    Ok(SubscriptionCard {
        author: UserProfile::from_user(author, subscribed),
        recipes,
        recipes_count: count.0,
    })
}

pub async fn list_subscriptions(
    viewer: Uuid,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<Vec<SubscriptionCard>, FoodgramError> {
    let authors: Vec<User> = sqlx::query_as(
        "
        SELECT u.id AS id, u.username AS username, u.email AS email,
            u.first_name AS first_name, u.last_name AS last_name, u.role AS role
        FROM subscriptions s
        INNER JOIN users u ON u.id = s.author_id
        WHERE s.subscriber_id = $1
        ORDER BY u.username
    ",
    )
    .bind(viewer)
    .fetch_all(pool)
    .await?;

    let mut cards = Vec::with_capacity(authors.len());
    for author in authors {
        cards.push(subscription_card(author, viewer, recipes_limit, pool).await?);
    }

    Ok(cards)
}

pub async fn subscribe(
    subscriber_id: Uuid,
    author_id: Uuid,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<SubscriptionCard, FoodgramError> {
    add_membership(
        &PgMembershipStore::new(pool),
        MembershipKind::Subscription,
        subscriber_id,
        author_id,
    )
    .await?;

    let author = get_user_by_id(pool, author_id)
        .await?
        .ok_or_else(|| FoodgramError::reference(Entity::User, author_id))?;

    subscription_card(author, subscriber_id, recipes_limit, pool).await
}

pub async fn unsubscribe(
    subscriber_id: Uuid,
    author_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), FoodgramError> {
    remove_membership(
        &PgMembershipStore::new(pool),
        MembershipKind::Subscription,
        subscriber_id,
        author_id,
    )
    .await
}
