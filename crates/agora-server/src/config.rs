use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

const DEV_SECRET: &str = "dev-secret-change-me";

#[derive(Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub db_readers: usize,
    pub jwt_secret: String,
    pub token_ttl_minutes: i64,
    /// Empty means any origin is allowed.
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = lookup("AGORA_JWT_SECRET").unwrap_or_else(|| {
            warn!("AGORA_JWT_SECRET not set, using the development secret");
            DEV_SECRET.to_string()
        });

        let config = Self {
            host: lookup("AGORA_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&lookup, "AGORA_PORT", 8000)?,
            db_path: lookup("AGORA_DB_PATH")
                .unwrap_or_else(|| "agora.db".into())
                .into(),
            db_readers: parse_or(&lookup, "AGORA_DB_READERS", agora_db::DEFAULT_READER_POOL_SIZE)?,
            jwt_secret,
            token_ttl_minutes: parse_or(&lookup, "AGORA_TOKEN_TTL_MINUTES", 30)?,
            cors_origins: lookup("AGORA_CORS_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
        };

        if config.db_readers == 0 {
            bail!("AGORA_DB_READERS must be at least 1");
        }
        if config.token_ttl_minutes <= 0 {
            bail!("AGORA_TOKEN_TTL_MINUTES must be positive");
        }
        Ok(config)
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr + Display,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has invalid value '{raw}'")),
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}
