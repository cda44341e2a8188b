//! # Connections Module
//!
//! Production backends for the cache and store seams: Redis for `KvCache`,
//! PostgreSQL (deadpool + tokio-postgres) for the three store traits.

/// PostgreSQL implementation of the booking, observation and audit stores.
pub mod db_postgres;

/// Redis implementation of the key-value cache.
pub mod cache_redis;

pub use cache_redis::RedisCache;
pub use db_postgres::PgStore;
