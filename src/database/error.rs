use std::fmt::{self, Display};

use thiserror::Error;

use super::{
    schema::{Entity, MembershipKind, Uuid},
    validation::CompositionError,
};

#[derive(Debug)]
pub struct QueryError {
    info: String,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self { info }
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Configuration(e) => Self::new(format!("{e}")),
            sqlx::Error::Database(e) => Self::new(format!("{e}")),
            sqlx::Error::Io(e) => Self::new(format!("{e}")),
            sqlx::Error::Tls(e) => Self::new(format!("{e}")),
            sqlx::Error::Protocol(e) => Self::new(format!("{e}")),
            sqlx::Error::RowNotFound => Self::new(format!("RowNotFound")),
            sqlx::Error::TypeNotFound { type_name } => {
                Self::new(format!("Type not found: {type_name}"))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => {
                Self::new(format!("Column index out of bounds {index} ({len})"))
            }
            sqlx::Error::ColumnNotFound(e) => Self::new(format!("{e}")),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::new(format!("Column decode {index} ({source})"))
            }
            sqlx::Error::Decode(e) => Self::new(format!("{e}")),
            sqlx::Error::PoolTimedOut => Self::new(format!("Pool timed out")),
            sqlx::Error::PoolClosed => Self::new(format!("Pool closed")),
            sqlx::Error::WorkerCrashed => Self::new(format!("Worker crashed")),
            sqlx::Error::Migrate(e) => Self::new(format!("{e}")),
            _ => Self::new(format!("Unknown error")),
        }
    }
}

impl Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Query failed ({})", self.info)
    }
}

impl std::error::Error for QueryError {}

#[derive(Debug)]
pub struct CacheError {
    info: String,
}

impl From<redis::RedisError> for CacheError {
    fn from(value: redis::RedisError) -> Self {
        Self {
            info: format!("{:?} - {:?}", value.code(), value.detail()),
        }
    }
}

impl Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cache failed ({})", self.info)
    }
}

impl std::error::Error for CacheError {}

#[derive(Error, Debug)]
pub enum FoodgramError {
    #[error("{0}")]
    ValidationFailed(#[from] CompositionError),

    #[error("Recipe is already in {}", .0.label())]
    AlreadyExists(MembershipKind),

    #[error("Recipe is not in {}", .0.label())]
    NotFound(MembershipKind),

    #[error("You can't subscribe to yourself")]
    SelfReferenceNotAllowed,

    #[error("No {} exists with id {id}", .entity.label())]
    ReferenceNotFound { entity: Entity, id: Uuid },

    #[error("{0} already exists")]
    Conflict(&'static str),

    #[error("Referenced {} does not exist", .0.label())]
    MissingReference(Entity),

    #[error("Invalid session; {0}")]
    Unauthorized(String),

    #[error("You don't have permission to perform this action")]
    Forbidden,

    #[error("Invalid request; {0}")]
    InvalidQuery(String),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Environment misconfigured; {0}")]
    Config(String),
}

impl FoodgramError {
    pub fn reference(entity: Entity, id: Uuid) -> Self {
        Self::ReferenceNotFound { entity, id }
    }
}

/// What a unique constraint protects, for the conflict message.
fn conflict_subject(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some("tags_name_key") => "A tag with this name",
        Some("tags_color_key") => "A tag with this color",
        Some("tags_slug_key") => "A tag with this slug",
        Some("unique_pair_name_measurement_unit") => "An ingredient with this name and unit",
        Some("users_username_key") => "A user with this username",
        Some("users_email_key") => "A user with this email",
        Some("unique_pair_recipe_ingredient") => "This ingredient in the recipe",
        Some("unique_pair_recipe_tag") => "This tag on the recipe",
        _ => "This entry",
    }
}

/// The entity a foreign key points at, read from its `<table>_<column>_fkey` name.
fn referenced_entity(constraint: Option<&str>) -> Option<Entity> {
    let column = constraint?.strip_suffix("_fkey")?;

    [
        ("_user_id", Entity::User),
        ("_subscriber_id", Entity::User),
        ("_author_id", Entity::User),
        ("_recipe_id", Entity::Recipe),
        ("_tag_id", Entity::Tag),
        ("_ingredient_id", Entity::Ingredient),
    ]
    .into_iter()
    .find(|(suffix, _)| column.ends_with(suffix))
    .map(|(_, entity)| entity)
}

impl From<sqlx::Error> for FoodgramError {
    fn from(value: sqlx::Error) -> Self {
        if let sqlx::Error::Database(e) = &value {
            if e.is_unique_violation() {
                return Self::Conflict(conflict_subject(e.constraint()));
            }
            if e.is_foreign_key_violation() {
                if let Some(entity) = referenced_entity(e.constraint()) {
                    return Self::MissingReference(entity);
                }
            }
        }

        Self::Query(QueryError::from(value))
    }
}

impl From<redis::RedisError> for FoodgramError {
    fn from(value: redis::RedisError) -> Self {
        Self::Cache(CacheError::from(value))
    }
}

impl From<FoodgramError> for potion::Error {
    fn from(value: FoodgramError) -> Self {
        // Subscriptions share the membership variants but read better with their own wording
        let info = match &value {
            FoodgramError::AlreadyExists(MembershipKind::Subscription) => {
                String::from("You are already subscribed to this author")
            }
            FoodgramError::NotFound(MembershipKind::Subscription) => {
                String::from("You are not subscribed to this author")
            }
            other => other.to_string(),
        };

        let code = match value {
            FoodgramError::ValidationFailed(_)
            | FoodgramError::AlreadyExists(_)
            | FoodgramError::SelfReferenceNotAllowed
            | FoodgramError::Conflict(_)
            | FoodgramError::InvalidQuery(_) => 400,
            FoodgramError::Unauthorized(_) => 401,
            FoodgramError::Forbidden => 403,
            FoodgramError::NotFound(_)
            | FoodgramError::ReferenceNotFound { .. }
            | FoodgramError::MissingReference(_) => 404,
            FoodgramError::Query(_) | FoodgramError::Cache(_) | FoodgramError::Config(_) => 500,
        };

        potion::Error {
            code,
            info: Some(info),
            redirect: None,
        }
    }
}
