use std::env;
use std::str::FromStr;

use crate::comment::tree::DEFAULT_MAX_DEPTH;

/// Runtime configuration, read from the environment after `.env` is loaded
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub mongodb_uri: String,
    pub database_name: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub comment_max_depth: usize,
    pub comment_rate_limit: u64,
    pub comment_rate_window: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8000,
            mongodb_uri: "mongodb://localhost:27017".to_string(),
            database_name: "community_db".to_string(),
            redis_url: "redis://127.0.0.1:6379".to_string(),
            jwt_secret: "secret".to_string(),
            comment_max_depth: DEFAULT_MAX_DEPTH,
            comment_rate_limit: 20,
            comment_rate_window: 60,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = AppConfig::default();
        AppConfig {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "PORT", defaults.port),
            mongodb_uri: lookup("MONGODB_URI").unwrap_or(defaults.mongodb_uri),
            database_name: lookup("DATABASE_NAME").unwrap_or(defaults.database_name),
            redis_url: lookup("REDIS_URL").unwrap_or(defaults.redis_url),
            jwt_secret: lookup("JWT_SECRET").unwrap_or(defaults.jwt_secret),
            comment_max_depth: parse_or(&lookup, "COMMENT_MAX_DEPTH", defaults.comment_max_depth),
            comment_rate_limit: parse_or(&lookup, "COMMENT_RATE_LIMIT", defaults.comment_rate_limit),
            comment_rate_window: parse_or(
                &lookup,
                "COMMENT_RATE_WINDOW",
                defaults.comment_rate_window,
            ),
        }
    }
}

fn parse_or<T: FromStr + Copy>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                log::warn!("Invalid value {:?} for {}; using default", raw, key);
                default
            }
        },
        None => default,
    }
}
