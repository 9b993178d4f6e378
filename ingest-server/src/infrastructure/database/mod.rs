mod redis;

#[rustfmt::skip]
pub use self::redis::{RedisClient, RedisRepository};
