use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;

/// Process configuration, read from the environment (after `.env`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// `:memory:` selects a throwaway in-memory database.
    pub db_path: PathBuf,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("CORKBOARD_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = match lookup("CORKBOARD_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("CORKBOARD_PORT is not a port number: {raw}"))?,
            None => 3000,
        };
        let db_path = lookup("CORKBOARD_DB_PATH")
            .unwrap_or_else(|| "corkboard.db".into())
            .into();

        Ok(Self {
            host,
            port,
            db_path,
        })
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }

    pub fn in_memory(&self) -> bool {
        self.db_path.as_os_str() == ":memory:"
    }
}
