//! Service layer: Redis caching plus the bid estimator and structural
//! design calculator.

pub mod cache;
pub mod estimator;
pub mod structural;

pub use cache::RedisCache;
