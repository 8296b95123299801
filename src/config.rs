use std::net::SocketAddr;

use anyhow::{bail, Context};
use chrono::{Duration, Utc};

use crate::credential::TokenKeys;

const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub max_connections: u32,
    pub token_secret: Option<String>,
    pub token_ttl: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL must be set")?;
        let bind_addr = lookup("ALUMNI_BIND_ADDR")
            .unwrap_or_else(|| "127.0.0.1:5000".to_string())
            .parse::<SocketAddr>()
            .context("ALUMNI_BIND_ADDR is not a socket address")?;
        let max_connections = match lookup("ALUMNI_DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse::<u32>()
                .context("ALUMNI_DB_MAX_CONNECTIONS is not a number")?,
            None => 5,
        };
        let ttl_hours = match lookup("ALUMNI_TOKEN_TTL_HOURS") {
            Some(raw) => raw
                .parse::<i64>()
                .context("ALUMNI_TOKEN_TTL_HOURS is not a number")?,
            None => 24,
        };
        if ttl_hours <= 0 {
            bail!("ALUMNI_TOKEN_TTL_HOURS must be positive");
        }
        let token_ttl = Duration::try_hours(ttl_hours)
            .filter(|ttl| Utc::now().checked_add_signed(*ttl).is_some())
            .context("ALUMNI_TOKEN_TTL_HOURS is out of range")?;

        Ok(Self {
            database_url,
            bind_addr,
            max_connections,
            token_secret: lookup("ALUMNI_TOKEN_SECRET"),
            token_ttl,
        })
    }

    /// Only the HTTP server needs signing keys, so a missing secret is
    /// reported here rather than when the config is read.
    pub fn token_keys(&self) -> anyhow::Result<TokenKeys> {
        let secret = self
            .token_secret
            .as_deref()
            .context("ALUMNI_TOKEN_SECRET must be set")?;
        if secret.len() < MIN_SECRET_LEN {
            bail!(
                "ALUMNI_TOKEN_SECRET must be at least {} bytes long",
                MIN_SECRET_LEN
            );
        }
        Ok(TokenKeys::new(secret, self.token_ttl))
    }
}
