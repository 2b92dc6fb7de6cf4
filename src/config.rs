use std::{env, fmt::Display, str::FromStr};

use crate::error::FoodgramError;

pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub redis_url: String,
    pub jwt_secret: String,
    pub port: u16,
}

impl Config {
    pub fn load() -> Result<Self, FoodgramError> {
        Ok(Self {
            database_url: require("DATABASE_URL")?,
            database_max_connections: try_load("DATABASE_MAX_CONNECTIONS", "5")?,
            redis_url: try_load("REDIS_URL", "redis://127.0.0.1/")?,
            jwt_secret: require("JWT_SECRET")?,
            port: try_load("FOODGRAM_PORT", "8000")?,
        })
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn require(key: &str) -> Result<String, FoodgramError> {
    var(key).ok_or_else(|| {
        log::error!("Environment variable {key} not found");
        FoodgramError::Config(format!("{key} is required"))
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, FoodgramError>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|| {
            log::warn!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            log::warn!("Invalid {key} value: {e}");
            FoodgramError::Config(format!("Invalid {key} value ({e})"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_unset_keys() {
        let port: u16 = try_load("FOODGRAM_TEST_UNSET_PORT", "8000").unwrap();
        assert_eq!(port, 8000);
    }

    #[test]
    fn unparsable_default_is_a_config_error() {
        let result: Result<u16, _> = try_load("FOODGRAM_TEST_UNSET_PORT", "eighty");
        assert!(matches!(result, Err(FoodgramError::Config(_))));
    }

    #[test]
    fn missing_required_key_is_a_config_error() {
        let result = require("FOODGRAM_TEST_UNSET_SECRET");
        assert!(matches!(result, Err(FoodgramError::Config(_))));
    }
}
