use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type Uuid = i32;

#[derive(
    Clone, Debug, PartialEq, PartialOrd, sqlx::Type, Serialize, Eq, Ord, Hash, Deserialize,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Admin,
}

/// The collections a user can hold memberships in.
///
/// Favorites and shopping carts point at recipes and share the `recipe_memberships`
/// table, subscriptions point at other users.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipKind {
    Favorite,
    ShoppingCart,
    Subscription,
}

impl MembershipKind {
    /// Value of the `collection` discriminant, `None` for subscriptions.
    pub fn collection(&self) -> Option<&'static str> {
        match self {
            MembershipKind::Favorite => Some("favorite"),
            MembershipKind::ShoppingCart => Some("shopping_cart"),
            MembershipKind::Subscription => None,
        }
    }

    pub fn target(&self) -> Entity {
        match self {
            MembershipKind::Favorite | MembershipKind::ShoppingCart => Entity::Recipe,
            MembershipKind::Subscription => Entity::User,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MembershipKind::Favorite => "favorites",
            MembershipKind::ShoppingCart => "shopping cart",
            MembershipKind::Subscription => "subscriptions",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    User,
    Recipe,
    Tag,
    Ingredient,
}

impl Entity {
    pub fn label(&self) -> &'static str {
        match self {
            Entity::User => "user",
            Entity::Recipe => "recipe",
            Entity::Tag => "tag",
            Entity::Ingredient => "ingredient",
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

impl UserProfile {
    pub fn from_user(user: User, is_subscribed: bool) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            is_subscribed,
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Recipe {
    pub id: Uuid,
    pub author_id: Uuid,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub pub_date: DateTime<Utc>,
}

/// An ingredient as it appears inside one recipe.
#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipePart {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeDetail {
    pub id: Uuid,
    pub author: UserProfile,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub tags: Vec<Tag>,
    pub ingredients: Vec<RecipePart>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShortRecipe {
    pub id: Uuid,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

impl From<Recipe> for ShortRecipe {
    fn from(recipe: Recipe) -> Self {
        Self {
            id: recipe.id,
            name: recipe.name,
            image: recipe.image,
            cooking_time: recipe.cooking_time,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionCard {
    #[serde(flatten)]
    pub author: UserProfile,
    pub recipes: Vec<ShortRecipe>,
    pub recipes_count: i64,
}

/// A (user, target) membership row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Membership {
    pub kind: MembershipKind,
    pub user_id: Uuid,
    pub target_id: Uuid,
}

/// One ingredient line of a recipe sitting in somebody's shopping cart.
#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq)]
pub struct CartIngredient {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IngredientAmount {
    pub id: Uuid,
    pub amount: i64,
}

/// Client-supplied recipe body for create and update. The author never comes from here.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipePayload {
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i64,
    #[serde(default)]
    pub tags: Vec<Uuid>,
    #[serde(default)]
    pub ingredients: Vec<IngredientAmount>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTag {
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewIngredient {
    pub name: String,
    pub measurement_unit: String,
}
