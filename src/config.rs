//! Configuration management for taskboard.
//!
//! Configuration can be set via environment variables:
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `3000`.
//! - `DEV_MODE` - Optional. Disables auth when `true`. Defaults to `false`.
//! - `DATA_DIR` - Optional. Directory for the SQLite database. Defaults to `./data`.
//! - `STORE_BACKEND` - Optional. `sqlite` (default) or `memory`.
//! - `POSITION_BASE` - Optional. Position of the first task in a column. Defaults to `1000`.
//! - `POSITION_STEP` - Optional. Gap used on append and rebalance. Defaults to `1000`.
//! - `JWT_SECRET` - Required unless `DEV_MODE=true`. HMAC secret for tokens.
//! - `DASHBOARD_PASSWORD` - Optional. Password for single-tenant login.
//! - `JWT_TTL_DAYS` - Optional. Token lifetime. Defaults to `30`.
//! - `BOARD_USERS` - Optional. JSON list of `{"id", "username", "password"}`;
//!   enables multi-user login.

use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use crate::ordering::{PositionAllocator, DEFAULT_BASE, DEFAULT_STEP};
use crate::store::StoreType;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// A login account for multi-user mode.
#[derive(Debug, Clone, Deserialize)]
pub struct UserAccount {
    pub id: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Dev mode: every request runs as the `dev` user.
    Disabled,
    /// One shared dashboard password.
    SingleTenant,
    /// Named accounts from `BOARD_USERS`.
    MultiUser,
}

#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub jwt_secret: Option<String>,
    pub dashboard_password: Option<String>,
    pub jwt_ttl_days: i64,
    pub users: Vec<UserAccount>,
}

impl AuthConfig {
    pub fn auth_mode(&self, dev_mode: bool) -> AuthMode {
        if dev_mode {
            AuthMode::Disabled
        } else if !self.users.is_empty() {
            AuthMode::MultiUser
        } else {
            AuthMode::SingleTenant
        }
    }

    pub fn auth_required(&self, dev_mode: bool) -> bool {
        !dev_mode
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Skip authentication entirely
    pub dev_mode: bool,

    /// Directory holding `taskboard.db`
    pub data_dir: PathBuf,

    pub store_type: StoreType,

    /// Allocator constants, validated on load
    pub positions: PositionAllocator,

    pub auth: AuthConfig,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        None => Ok(default),
    }
}

fn parse_bool(name: &str) -> Result<bool, ConfigError> {
    match env_var(name).map(|v| v.trim().to_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(ConfigError::InvalidValue(
                name.to_string(),
                format!("expected a boolean, got {:?}", other),
            )),
        },
    }
}

fn parse_users(raw: Option<String>) -> Result<Vec<UserAccount>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    let users: Vec<UserAccount> = serde_json::from_str(&raw)
        .map_err(|e| ConfigError::InvalidValue("BOARD_USERS".to_string(), e.to_string()))?;
    if let Some(bad) = users
        .iter()
        .find(|u| u.id.trim().is_empty() || u.username.trim().is_empty())
    {
        return Err(ConfigError::InvalidValue(
            "BOARD_USERS".to_string(),
            format!("account {:?} needs an id and a username", bad.username),
        ));
    }
    Ok(users)
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `JWT_SECRET` is not set outside
    /// dev mode, and `ConfigError::InvalidValue` for unparsable values or
    /// unusable position constants.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env_var("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = parse_env("PORT", 3000u16)?;
        let dev_mode = parse_bool("DEV_MODE")?;

        let data_dir = env_var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data"));
        let store_type = env_var("STORE_BACKEND")
            .map(|s| StoreType::from_str(&s))
            .unwrap_or_default();

        let base = parse_env("POSITION_BASE", DEFAULT_BASE)?;
        let step = parse_env("POSITION_STEP", DEFAULT_STEP)?;
        let positions = PositionAllocator::new(base, step).map_err(|e| {
            ConfigError::InvalidValue("POSITION_BASE/POSITION_STEP".to_string(), e.to_string())
        })?;

        let auth = AuthConfig {
            jwt_secret: env_var("JWT_SECRET"),
            dashboard_password: env_var("DASHBOARD_PASSWORD"),
            jwt_ttl_days: parse_env("JWT_TTL_DAYS", 30i64)?,
            users: parse_users(env_var("BOARD_USERS"))?,
        };
        if !dev_mode && auth.jwt_secret.is_none() {
            return Err(ConfigError::MissingEnvVar("JWT_SECRET".to_string()));
        }

        Ok(Self {
            host,
            port,
            dev_mode,
            data_dir,
            store_type,
            positions,
            auth,
        })
    }

    /// Dev-mode config backed by the in-memory store (useful for testing).
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            dev_mode: true,
            data_dir,
            store_type: StoreType::Memory,
            positions: PositionAllocator::default(),
            auth: AuthConfig {
                jwt_ttl_days: 30,
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_mode_selection() {
        let mut auth = AuthConfig::default();
        assert_eq!(auth.auth_mode(true), AuthMode::Disabled);
        assert_eq!(auth.auth_mode(false), AuthMode::SingleTenant);
        auth.users = parse_users(Some(
            r#"[{"id": "u1", "username": "alice", "password": "pw"}]"#.to_string(),
        ))
        .unwrap();
        assert_eq!(auth.auth_mode(false), AuthMode::MultiUser);
        assert!(!auth.auth_required(true));
    }

    #[test]
    fn test_parse_users_rejects_blank_ids() {
        let result = parse_users(Some(
            r#"[{"id": " ", "username": "alice", "password": "pw"}]"#.to_string(),
        ));
        assert!(matches!(result, Err(ConfigError::InvalidValue(name, _)) if name == "BOARD_USERS"));
        assert!(parse_users(Some("not json".to_string())).is_err());
        assert!(parse_users(None).unwrap().is_empty());
    }

    #[test]
    fn test_testing_config_defaults() {
        let config = Config::new(PathBuf::from("/tmp/board"));
        assert!(config.dev_mode);
        assert_eq!(config.store_type, StoreType::Memory);
        assert_eq!(config.positions.base(), DEFAULT_BASE);
        assert_eq!(config.positions.step(), DEFAULT_STEP);
    }
}
