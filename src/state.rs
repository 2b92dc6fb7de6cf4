use redis::aio::MultiplexedConnection;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

use crate::{config::Config, error::FoodgramError, jwt::SessionKey, routes::routes};

/// Connections shared by every request.
#[derive(Clone)]
pub struct State {
    pub pool: Pool<Postgres>,
    pub cache: MultiplexedConnection,
    pub session_key: SessionKey,
}

impl State {
    pub async fn connect(config: &Config) -> Result<Self, FoodgramError> {
        log::info!("Connecting to database...");
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(&config.database_url)
            .await?;

        log::info!("Running migrations...");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(sqlx::Error::from)?;

        log::info!("Connecting to cache...");
        let cache = redis::Client::open(config.redis_url.as_str())?
            .get_multiplexed_async_connection()
            .await?;

        Ok(Self {
            pool,
            cache,
            session_key: SessionKey::new(config.jwt_secret.as_bytes())?,
        })
    }
}

/// Connects everything and serves the API until the process is stopped.
pub async fn serve(config: Config) -> Result<(), FoodgramError> {
    let state = State::connect(&config).await?;

    log::info!("Server running on 0.0.0.0:{}", config.port);
    warp::serve(routes(state))
        .run(([0, 0, 0, 0], config.port))
        .await;

    Ok(())
}
