pub mod config;
pub mod db;
pub mod metrics;
pub mod models;
pub mod search;
pub mod weather;

/// Build timestamp stamped by build.rs / 构建时间
pub const BUILD_TIME: &str = env!("BUILD_TIME");
