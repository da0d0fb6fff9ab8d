use std::str::FromStr;

use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::NoTls;
use tracing::debug;

use super::{Cell, DoctorLookup, DoctorRow, LookupError, SpecialistLookup, decode_doctor_rows};
use crate::config::{self, ConfigError};

const SPECIALISTS_QUERY: &str = "SELECT * FROM sp_get_specialists($1)";
const DOCTORS_QUERY: &str = "SELECT * FROM sp_get_doctors_by_specialists($1)";
const DEFAULT_POOL_MAX: usize = 16;

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// `postgres://[user[:password]@]host[:port]/dbname[?params]`
    pub db_url: String,
    pub pool_max: usize,
}

impl PostgresConfig {
    /// Reads `DATABASE_URL` and `DATABASE_POOL_MAX`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            db_url: config::require("DATABASE_URL")?,
            pool_max: config::parse_or("DATABASE_POOL_MAX", DEFAULT_POOL_MAX)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |var: &'static str, value: &str, reason: &str| ConfigError::Invalid {
            var,
            value: value.to_string(),
            reason: reason.to_string(),
        };

        let url = url::Url::parse(self.db_url.trim())
            .map_err(|e| invalid("DATABASE_URL", "<redacted>", &e.to_string()))?;
        if !matches!(url.scheme(), "postgres" | "postgresql") {
            return Err(invalid("DATABASE_URL", url.scheme(), "unsupported URL scheme"));
        }
        if url.host().is_none() {
            return Err(invalid("DATABASE_URL", "<redacted>", "URL must include a host"));
        }
        if url.path().trim_start_matches('/').is_empty() {
            return Err(invalid("DATABASE_URL", "<redacted>", "URL must include a database name"));
        }
        if self.pool_max == 0 {
            return Err(invalid("DATABASE_POOL_MAX", "0", "pool size must be at least 1"));
        }
        Ok(())
    }
}

/// Both lookups, served by stored procedures over a shared connection pool.
#[derive(Clone)]
pub struct PgLookup {
    pool: Pool,
}

impl PgLookup {
    pub fn new(config: &PostgresConfig) -> Result<Self, LookupError> {
        config.validate()?;
        let pg_config = tokio_postgres::Config::from_str(config.db_url.trim()).map_err(|e| {
            ConfigError::Invalid {
                var: "DATABASE_URL",
                value: "<redacted>".to_string(),
                reason: e.to_string(),
            }
        })?;
        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let mgr = Manager::from_config(pg_config, NoTls, mgr_config);
        let pool = Pool::builder(mgr)
            .max_size(config.pool_max)
            .build()
            .map_err(|e| ConfigError::Invalid {
                var: "DATABASE_POOL_MAX",
                value: config.pool_max.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { pool })
    }

    pub fn from_env() -> Result<Self, LookupError> {
        Self::new(&PostgresConfig::from_env()?)
    }
}

impl SpecialistLookup for PgLookup {
    async fn specialists_for(&self, symptoms: &[String]) -> Result<Vec<String>, LookupError> {
        let client = self.pool.get().await?;
        let stmt = client.prepare_cached(SPECIALISTS_QUERY).await?;
        let rows = client.query(&stmt, &[&symptoms]).await?;
        debug!(rows = rows.len(), "sp_get_specialists returned");

        rows.iter()
            .map(|row| {
                row.try_get::<_, Cell>(0)?
                    .into_text()
                    .ok_or_else(|| LookupError::Malformed("specialist name is null".into()))
            })
            .collect()
    }
}

impl DoctorLookup for PgLookup {
    async fn doctors_for(&self, specialists: &[String]) -> Result<Vec<DoctorRow>, LookupError> {
        let client = self.pool.get().await?;
        let stmt = client.prepare_cached(DOCTORS_QUERY).await?;
        let rows = client.query(&stmt, &[&specialists]).await?;
        debug!(rows = rows.len(), "sp_get_doctors_by_specialists returned");

        Ok(decode_doctor_rows(rows.iter().map(|row| {
            (0..row.len())
                .map(|i| row.try_get::<_, Cell>(i))
                .collect::<Result<Vec<_>, _>>()
                .map_err(LookupError::from)
        })))
    }
}
