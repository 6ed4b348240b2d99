//! Environment-based configuration.
//!
//! The binaries load a `.env` file with `dotenvy` before calling
//! [`Config::from_env`]; the engine itself only reads process environment
//! variables.

use crate::error::{EngineError, Result};

const DEFAULT_BASE_URL: &str = "https://api.discogs.com";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub discogs: DiscogsConfig,
}

#[derive(Debug, Clone)]
pub struct DiscogsConfig {
    /// Personal access token for the Discogs API.
    pub token: String,
    /// Remote username whose collection is mirrored.
    pub username: String,
    pub base_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let database_url = require("DATABASE_URL")?;
        let token = require("DISCOGS_TOKEN")?;
        let username = require("DISCOGS_USERNAME")?;
        let base_url = std::env::var("DISCOGS_BASE_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            database_url,
            discogs: DiscogsConfig {
                token,
                username,
                base_url,
            },
        })
    }
}

fn require(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| EngineError::Config(format!("{} not set", name)))
}
