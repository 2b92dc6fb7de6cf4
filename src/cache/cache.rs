use std::future::Future;

use redis::{aio::MultiplexedConnection, AsyncCommands, FromRedisValue, ToRedisArgs};
use redis_macros::{FromRedisValue, ToRedisArgs};
use serde::{Deserialize, Serialize};

use crate::{
    constants::{INGREDIENT_CACHE_BIND_KEY, TAG_CACHE_BIND_KEY},
    error::{CacheError, FoodgramError},
};

// Caching - keys

#[derive(Serialize, Clone, Debug)]
pub struct CacheKey<T: ToString + Serialize> {
    _value: T,
    _type: CacheKeyType,
}

impl<T: ToString + Serialize> CacheKey<T> {
    pub fn from(r#type: CacheKeyType, key: T) -> Self {
        Self {
            _value: key,
            _type: r#type,
        }
    }

    pub fn to_string(&self) -> String {
        self.into()
    }
}

impl<T: ToString + Serialize> Into<String> for &CacheKey<T> {
    fn into(self) -> String {
        match self._type {
            CacheKeyType::Tags => format!("tags-{}", self._value.to_string()),
            CacheKeyType::Ingredients => format!("ingredients-{}", self._value.to_string()),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum CacheKeyType {
    Tags,
    Ingredients,
}

impl CacheKeyType {
    pub fn new<T: ToString + Serialize>(self, key: T) -> CacheKey<T> {
        CacheKey::from(self, key)
    }
}

impl<T: ToString + Serialize> From<CacheKey<T>> for CacheLifetime {
    fn from(value: CacheKey<T>) -> Self {
        match value._type {
            CacheKeyType::Tags => CacheLifetime::BindTagCache,
            CacheKeyType::Ingredients => CacheLifetime::BindIngredientCache,
        }
    }
}

// Cache - wrappers

/// Every cached value is bound to one of these. It dies as soon as the bind key is
/// rotated by [`invalidate_cache`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum CacheLifetime {
    BindTagCache,
    BindIngredientCache,
}

impl CacheLifetime {
    fn bind_key(&self) -> &'static str {
        match self {
            CacheLifetime::BindTagCache => TAG_CACHE_BIND_KEY,
            CacheLifetime::BindIngredientCache => INGREDIENT_CACHE_BIND_KEY,
        }
    }

    pub async fn get_cache_bind(
        &self,
        cache: &mut MultiplexedConnection,
    ) -> Result<Option<String>, FoodgramError> {
        get_cache_value::<&str, String>(self.bind_key(), cache).await
    }

    pub async fn validate_cache_bind(
        &self,
        bind: &Option<String>,
        cache: &mut MultiplexedConnection,
    ) -> Result<bool, FoodgramError> {
        Ok(bind == &self.get_cache_bind(cache).await?)
    }
}

#[derive(Serialize, serde::Deserialize, FromRedisValue, ToRedisArgs, Clone)]
pub struct RedisValue<T: serde::Serialize + Send + Sync + Clone> {
    pub value: T,
    _lifetime: CacheLifetime,
    _bind: Option<String>,
}

impl<T: serde::Serialize + Send + Sync + Clone + for<'a> Deserialize<'a>> RedisValue<T> {
    async fn new(
        value: T,
        lifetime: CacheLifetime,
        cache: &mut MultiplexedConnection,
    ) -> Result<Self, FoodgramError> {
        let bind = lifetime.get_cache_bind(cache).await?;

        Ok(Self {
            value,
            _lifetime: lifetime,
            _bind: bind,
        })
    }

    async fn validate(&self, cache: &mut MultiplexedConnection) -> Result<bool, FoodgramError> {
        self._lifetime.validate_cache_bind(&self._bind, cache).await
    }

    pub async fn get_or_list<'a, F, Fut, K>(
        key: CacheKey<K>,
        cache: &mut MultiplexedConnection,
        callback: F,
    ) -> Result<RedisValue<Vec<T>>, FoodgramError>
    where
        Vec<T>: serde::Serialize + Send + Sync,
        K: ToString + Serialize + Clone + Send + Sync,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Vec<T>, FoodgramError>> + Send + 'a,
    {
        let value = get_cache_value::<String, RedisValue<Vec<T>>>((&key).into(), cache)
            .await
            .unwrap_or_else(|_| {
                let mut c = cache.clone();
                let k = key.to_string();
                tokio::spawn(async move {
                    log::error!("> Failed to deserialize cached value. Deleting {}", &k);
                    if let Err(e) = delete_cache_value(k, &mut c).await {
                        log::error!("> Failed to delete cached value! {e}");
                    }
                });
                None
            });
        // * Cannot use .map(|| {...}) due to async closures
        let value = match value {
            Some(value) => {
                log::trace!("> Found {:?}", key.to_string());
                match value.validate(cache).await? {
                    true => Some(value),
                    false => {
                        log::trace!("> Invalidated {:?}", key.to_string());
                        None
                    }
                }
            }
            None => None,
        };

        match value {
            Some(value) => Ok(value),
            None => {
                log::trace!("> Fetching {:?}", key.to_string());
                let value = callback().await?;
                let lifetime: CacheLifetime = key.to_owned().into();
                let value = RedisValue::new(value, lifetime, cache).await?;

                if let Err(e) =
                    set_cache_value::<String, RedisValue<Vec<T>>>((&key).into(), value.clone(), cache)
                        .await
                {
                    log::error!("{e:?}");
                }

                Ok(value)
            }
        }
    }
}

/// Rotates the bind key of `lifetime`, invalidating every value bound to it.
pub async fn invalidate_cache(
    lifetime: CacheLifetime,
    cache: &mut MultiplexedConnection,
) -> Result<(), FoodgramError> {
    let key = lifetime.bind_key();
    let bind = uuid::Uuid::new_v4().to_string();
    log::trace!("> Rotating {key} to {bind}");
    set_cache_value(key, bind, cache).await
}

// Cache - raw handlers

pub async fn set_cache_value<K: ToRedisArgs + Send + Sync, V: ToRedisArgs + Send + Sync>(
    key: K,
    value: V,
    cache: &mut MultiplexedConnection,
) -> Result<(), FoodgramError> {
    let _: () = cache.set(key, value).await.map_err(CacheError::from)?;

    Ok(())
}

pub async fn delete_cache_value<K: ToRedisArgs + Send + Sync>(
    key: K,
    cache: &mut MultiplexedConnection,
) -> Result<(), FoodgramError> {
    let _: () = cache.del(key).await.map_err(CacheError::from)?;

    Ok(())
}

pub async fn get_cache_value<K: ToRedisArgs + Send + Sync, V: FromRedisValue>(
    key: K,
    cache: &mut MultiplexedConnection,
) -> Result<Option<V>, FoodgramError> {
    let value: Option<V> = cache.get(key).await.map_err(CacheError::from)?;

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_by_type() {
        assert_eq!(CacheKeyType::Tags.new("all").to_string(), "tags-all");
        assert_eq!(
            CacheKeyType::Ingredients.new("сах").to_string(),
            "ingredients-сах"
        );
    }

    #[test]
    fn keys_bind_to_their_lifetime() {
        let lifetime: CacheLifetime = CacheKeyType::Tags.new("all").into();
        assert_eq!(lifetime, CacheLifetime::BindTagCache);
        assert_eq!(lifetime.bind_key(), TAG_CACHE_BIND_KEY);

        let lifetime: CacheLifetime = CacheKeyType::Ingredients.new("").into();
        assert_eq!(lifetime, CacheLifetime::BindIngredientCache);
        assert_eq!(lifetime.bind_key(), INGREDIENT_CACHE_BIND_KEY);
    }
}
