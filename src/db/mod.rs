pub mod postgres;
pub mod redis;
pub mod session_store;

pub use self::postgres::{create_pool, PgSessionStore};
pub use self::redis::{create_redis_client, Cache, CacheKey, CacheWriterHandle};
pub use self::session_store::{InMemorySessionStore, SessionStore};
