//! Configuration management for the highlight anchor server

use serde::Deserialize;
use std::env;
use thiserror::Error;

use crate::anchor::DEFAULT_CONTEXT_WINDOW;
use crate::highlights::{is_hex_color, DEFAULT_HIGHLIGHT_COLOR};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: '{value}'")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub highlights: HighlightConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HighlightConfig {
    /// Characters of prefix/suffix context stored with each quote
    pub context_window: usize,
    /// Color used when the user has not picked one
    pub default_color: String,
    /// Skip the quote search on documents with more indexed characters
    pub max_search_chars: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            database: DatabaseConfig {
                url: "sqlite:./highlights.db".to_string(),
            },
            highlights: HighlightConfig::default(),
        }
    }
}

impl Default for HighlightConfig {
    fn default() -> Self {
        HighlightConfig {
            context_window: DEFAULT_CONTEXT_WINDOW,
            default_color: DEFAULT_HIGHLIGHT_COLOR.to_string(),
            max_search_chars: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_var("SERVER_PORT")?.unwrap_or(3000),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite:./highlights.db".to_string()),
            },
            highlights: HighlightConfig {
                context_window: parse_var("HIGHLIGHT_CONTEXT_WINDOW")?
                    .unwrap_or(DEFAULT_CONTEXT_WINDOW),
                default_color: color_var("HIGHLIGHT_DEFAULT_COLOR")?
                    .unwrap_or_else(|| DEFAULT_HIGHLIGHT_COLOR.to_string()),
                max_search_chars: parse_var("HIGHLIGHT_MAX_SEARCH_CHARS")?,
            },
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        Err(_) => Ok(None),
    }
}

fn color_var(name: &'static str) -> Result<Option<String>, ConfigError> {
    match env::var(name) {
        Ok(value) if is_hex_color(value.trim()) => Ok(Some(value.trim().to_string())),
        Ok(value) => Err(ConfigError::InvalidValue { name, value }),
        Err(_) => Ok(None),
    }
}
