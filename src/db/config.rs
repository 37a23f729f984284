//! Connection pool configuration.

use sqlx::postgres::PgPoolOptions;
use std::env;
use std::time::Duration;

/// Pool sizing and timeout knobs, read from the environment in deployments
/// and defaulted for local development.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Maximum pool size
    pub max_connections: u32,
    /// Connections kept open when idle
    pub min_connections: u32,
    /// Acquire timeout in seconds
    pub connection_timeout_secs: u64,
    /// Idle connection timeout in seconds
    pub idle_timeout_secs: u64,
    /// Maximum connection lifetime in seconds
    pub max_lifetime_secs: u64,
}

impl DatabaseConfig {
    /// Read configuration from the environment.
    ///
    /// `DATABASE_URL` is required; `DB_MAX_CONNECTIONS`, `DB_MIN_CONNECTIONS`,
    /// `DB_CONNECTION_TIMEOUT`, `DB_IDLE_TIMEOUT` and `DB_MAX_LIFETIME`
    /// override the development defaults when present.
    ///
    /// # Panics
    ///
    /// Panics if `DATABASE_URL` is unset or any override fails to parse.
    pub fn from_env() -> Self {
        let defaults = Self::development();
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            max_connections: env_or("DB_MAX_CONNECTIONS", defaults.max_connections),
            min_connections: env_or("DB_MIN_CONNECTIONS", defaults.min_connections),
            connection_timeout_secs: env_or("DB_CONNECTION_TIMEOUT", defaults.connection_timeout_secs),
            idle_timeout_secs: env_or("DB_IDLE_TIMEOUT", defaults.idle_timeout_secs),
            max_lifetime_secs: env_or("DB_MAX_LIFETIME", defaults.max_lifetime_secs),
        }
    }

    /// Local development defaults against `postgres://postgres@localhost/tourney_db`
    pub fn development() -> Self {
        Self {
            database_url: "postgres://postgres@localhost/tourney_db".to_string(),
            max_connections: 20,
            min_connections: 5,
            connection_timeout_secs: 10,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
        }
    }

    /// Pool options carrying this configuration, ready to connect
    pub fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(Duration::from_secs(self.connection_timeout_secs))
            .idle_timeout(Duration::from_secs(self.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(self.max_lifetime_secs))
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::development()
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{name} must be a valid number, got '{raw}'")),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_development_defaults_are_sane() {
        let config = DatabaseConfig::development();
        assert!(config.min_connections <= config.max_connections);
        assert!(config.database_url.starts_with("postgres://"));
    }
}
