use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

/// Longest token lifetime the server will issue.
const MAX_TOKEN_TTL_DAYS: i64 = 365;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    pub sweep_interval_secs: u64,
    pub admin: Option<AdminSeed>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = var("ZEROWASTE_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("ZEROWASTE_JWT_SECRET is unset or still a placeholder");
        }

        let host = var("ZEROWASTE_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = var("ZEROWASTE_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("ZEROWASTE_PORT must be a port number")?;
        let db_path: PathBuf = var("ZEROWASTE_DB_PATH")
            .unwrap_or_else(|| "zerowaste.db".into())
            .into();

        let ttl_days: i64 = match var("ZEROWASTE_TOKEN_TTL_DAYS") {
            Some(raw) => raw.parse().context("ZEROWASTE_TOKEN_TTL_DAYS must be a number")?,
            None => 30,
        };
        if ttl_days <= 0 || ttl_days > MAX_TOKEN_TTL_DAYS {
            bail!("ZEROWASTE_TOKEN_TTL_DAYS must be between 1 and {}", MAX_TOKEN_TTL_DAYS);
        }
        let Some(token_ttl) = chrono::Duration::try_days(ttl_days) else {
            bail!("ZEROWASTE_TOKEN_TTL_DAYS is out of range");
        };

        let sweep_interval_secs: u64 = match var("ZEROWASTE_SWEEP_INTERVAL_SECS") {
            Some(raw) => raw
                .parse()
                .context("ZEROWASTE_SWEEP_INTERVAL_SECS must be a number")?,
            None => 300,
        };
        if sweep_interval_secs == 0 {
            bail!("ZEROWASTE_SWEEP_INTERVAL_SECS must be positive");
        }

        let admin = match (var("ZEROWASTE_ADMIN_EMAIL"), var("ZEROWASTE_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                Some(AdminSeed { email, password })
            }
            (None, None) => None,
            _ => bail!("ZEROWASTE_ADMIN_EMAIL and ZEROWASTE_ADMIN_PASSWORD must be set together"),
        };

        Ok(Self {
            host,
            port,
            db_path,
            jwt_secret,
            token_ttl,
            sweep_interval_secs,
            admin,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}
