pub const SHOPPING_LIST_HEADER: &str = "Список покупок с сайта Foodgram:\n\n";
pub const SHOPPING_LIST_FILENAME: &str = "shopping-cart.txt";

/// Filter flags (`is_favorited`, `is_in_shopping_cart`) only apply when they equal this value.
pub const FILTER_ENABLED_VALUE: f64 = 1.;

pub const SESSION_LIFETIME_HOURS: i64 = 1;
pub const SESSION_HEADER_PREFIX: &str = "Token ";

pub const MIN_AMOUNT: i64 = 1;
pub const MAX_AMOUNT: i64 = i32::MAX as i64;
pub const MIN_COOKING_TIME: i64 = 1;
pub const MAX_COOKING_TIME: i64 = i16::MAX as i64;

pub const TAG_CACHE_BIND_KEY: &str = "tag-cache-key";
pub const INGREDIENT_CACHE_BIND_KEY: &str = "ingredient-cache-key";
