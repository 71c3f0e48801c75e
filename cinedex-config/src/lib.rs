//! Environment configuration for cinedex services.
//!
//! Everything is sourced from process environment variables (optionally
//! seeded from a `.env` file via [`load_dotenv`]): the listener port, the
//! MySQL search-index connection, and the Redis hot-store connection.
//! Loading is pure and fails fast with a named missing/invalid variable;
//! connectivity retries are the caller's concern.

use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("invalid value for {name}: {value:?}")]
    InvalidVar { name: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Best-effort `.env` loading; a missing file is not an error.
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MysqlSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
}

impl MysqlSettings {
    /// Connection URL in the form sqlx expects.
    pub fn dsn(&self) -> String {
        format!(
            "mysql://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.dbname
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub db: i64,
}

impl RedisSettings {
    pub fn url(&self) -> String {
        if self.password.is_empty() {
            format!("redis://{}:{}/{}", self.host, self.port, self.db)
        } else {
            format!("redis://:{}@{}:{}/{}", self.password, self.host, self.port, self.db)
        }
    }
}

/// Full service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// HTTP listener port, from `PORT` or `LISTENER_PORT`.
    pub listen_port: u16,
    pub mysql: MysqlSettings,
    pub redis: RedisSettings,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let listen_port = match env::var("PORT").or_else(|_| env::var("LISTENER_PORT")) {
            Ok(v) => parse_var("PORT", &v)?,
            Err(_) => return Err(ConfigError::MissingVar("PORT or LISTENER_PORT")),
        };

        let mysql = MysqlSettings {
            host: require("MYSQL_HOST")?,
            port: parse_required("MYSQL_PORT")?,
            user: require("MYSQL_USER")?,
            password: env::var("MYSQL_PASSWORD").unwrap_or_default(),
            dbname: require("MYSQL_DBNAME")?,
        };

        let redis = RedisSettings {
            host: require("REDIS_HOST")?,
            port: parse_required("REDIS_PORT")?,
            password: env::var("REDIS_PASSWORD").unwrap_or_default(),
            db: match env::var("REDIS_DB") {
                Ok(v) if !v.is_empty() => parse_var("REDIS_DB", &v)?,
                _ => 0,
            },
        };

        Ok(Self { listen_port, mysql, redis })
    }
}

fn require(name: &'static str) -> Result<String> {
    match env::var(name) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::MissingVar(name)),
    }
}

fn parse_required<T: std::str::FromStr>(name: &'static str) -> Result<T> {
    let raw = require(name)?;
    parse_var(name, &raw)
}

fn parse_var<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T> {
    value.parse().map_err(|_| ConfigError::InvalidVar {
        name,
        value: value.to_string(),
    })
}
