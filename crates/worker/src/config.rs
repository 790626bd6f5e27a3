//! Worker configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use tripwire_core::tenant::TenantScope;
use tripwire_events::{EmailConfig, DEFAULT_FROM_ADDRESS, DEFAULT_SMTP_PORT};
use tripwire_pipeline::DEFAULT_SOURCE_TIMEOUT;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has invalid value {value:?}: expected {expected}")]
    Invalid {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Log output format selected by `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(()),
        }
    }
}

/// Scheduling settings shared by every stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageConfig {
    pub enabled: bool,
    pub tick_interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionConfig {
    pub stage: StageConfig,
    pub max_items_per_tick: u32,
    pub source_url: String,
    pub source_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    pub stage: StageConfig,
    pub max_items_per_tick: u32,
    pub max_retry_count: u32,
}

/// Everything the worker needs to start.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub tenant_scope: TenantScope,
    pub ingestion: IngestionConfig,
    pub evaluation: StageConfig,
    pub dispatch: DispatchConfig,
    /// `None` when `SMTP_HOST` is unset.
    pub email: Option<EmailConfig>,
    pub log_format: LogFormat,
}

impl WorkerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                         | Default                  |
    /// |---------------------------------|--------------------------|
    /// | `DATABASE_URL`                  | required                 |
    /// | `DATABASE_MAX_CONNECTIONS`      | `10`                     |
    /// | `TENANT_ID`                     | unset (all tenants)      |
    /// | `INGESTION_ENABLED`             | `true`                   |
    /// | `INGESTION_TICK_INTERVAL_SECS`  | `15`                     |
    /// | `INGESTION_MAX_ITEMS_PER_TICK`  | `1000`                   |
    /// | `METRIC_SOURCE_URL`             | `http://localhost:8081`  |
    /// | `METRIC_SOURCE_TIMEOUT_SECS`    | `10`                     |
    /// | `EVALUATION_ENABLED`            | `true`                   |
    /// | `EVALUATION_TICK_INTERVAL_SECS` | `300`                    |
    /// | `DISPATCH_ENABLED`              | `true`                   |
    /// | `DISPATCH_TICK_INTERVAL_SECS`   | `30`                     |
    /// | `DISPATCH_MAX_ITEMS_PER_TICK`   | `100`                    |
    /// | `DISPATCH_MAX_RETRY_COUNT`      | `3`                      |
    /// | `SMTP_HOST`                     | unset (email disabled)   |
    /// | `SMTP_PORT`                     | `587`                    |
    /// | `SMTP_FROM`                     | `alerts@tripwire.local`  |
    /// | `SMTP_USER`                     | -                        |
    /// | `SMTP_PASSWORD`                 | -                        |
    /// | `LOG_FORMAT`                    | `text`                   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env { lookup: &lookup };

        let database_url = env
            .string("DATABASE_URL")
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let tenant_scope = match env.parse::<i64>("TENANT_ID", "a tenant id")? {
            Some(id) => TenantScope::Tenant(id),
            None => TenantScope::AllTenants,
        };

        Ok(Self {
            database_url,
            database_max_connections: env
                .positive("DATABASE_MAX_CONNECTIONS")?
                .unwrap_or(tripwire_db::DEFAULT_MAX_CONNECTIONS),
            tenant_scope,
            ingestion: IngestionConfig {
                stage: env.stage("INGESTION_ENABLED", "INGESTION_TICK_INTERVAL_SECS", 15)?,
                max_items_per_tick: env
                    .positive("INGESTION_MAX_ITEMS_PER_TICK")?
                    .unwrap_or(1000),
                source_url: env
                    .string("METRIC_SOURCE_URL")
                    .unwrap_or_else(|| "http://localhost:8081".into()),
                source_timeout: env
                    .parse::<u64>("METRIC_SOURCE_TIMEOUT_SECS", "a number of seconds")?
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_SOURCE_TIMEOUT),
            },
            evaluation: env.stage(
                "EVALUATION_ENABLED",
                "EVALUATION_TICK_INTERVAL_SECS",
                300,
            )?,
            dispatch: DispatchConfig {
                stage: env.stage("DISPATCH_ENABLED", "DISPATCH_TICK_INTERVAL_SECS", 30)?,
                max_items_per_tick: env
                    .positive("DISPATCH_MAX_ITEMS_PER_TICK")?
                    .unwrap_or(100),
                max_retry_count: env
                    .parse("DISPATCH_MAX_RETRY_COUNT", "a non-negative integer")?
                    .unwrap_or(3),
            },
            email: env.email()?,
            log_format: env
                .parse_with("LOG_FORMAT", "text or json", |v| v.parse::<LogFormat>().ok())?
                .unwrap_or_default(),
        })
    }
}

struct Env<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl Env<'_> {
    /// A non-blank value, trimmed.
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse_with<T>(
        &self,
        key: &'static str,
        expected: &'static str,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Result<Option<T>, ConfigError> {
        match self.string(key) {
            None => Ok(None),
            Some(value) => parse(&value).map(Some).ok_or(ConfigError::Invalid {
                key,
                value,
                expected,
            }),
        }
    }

    fn parse<T: FromStr>(
        &self,
        key: &'static str,
        expected: &'static str,
    ) -> Result<Option<T>, ConfigError> {
        self.parse_with(key, expected, |v| v.parse().ok())
    }

    fn positive(&self, key: &'static str) -> Result<Option<u32>, ConfigError> {
        self.parse_with(key, "a positive integer", |v| {
            v.parse::<u32>().ok().filter(|n| *n > 0)
        })
    }

    fn flag(&self, key: &'static str) -> Result<Option<bool>, ConfigError> {
        self.parse_with(key, "true or false", |v| {
            match v.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Some(true),
                "false" | "0" | "no" => Some(false),
                _ => None,
            }
        })
    }

    fn stage(
        &self,
        enabled_key: &'static str,
        interval_key: &'static str,
        default_interval_secs: u64,
    ) -> Result<StageConfig, ConfigError> {
        let interval_secs = self
            .parse_with(interval_key, "a positive number of seconds", |v| {
                v.parse::<u64>().ok().filter(|secs| *secs > 0)
            })?
            .unwrap_or(default_interval_secs);
        Ok(StageConfig {
            enabled: self.flag(enabled_key)?.unwrap_or(true),
            tick_interval: Duration::from_secs(interval_secs),
        })
    }

    fn email(&self) -> Result<Option<EmailConfig>, ConfigError> {
        let smtp_port = self
            .parse_with("SMTP_PORT", "a port number", |v| {
                v.parse::<u16>().ok().filter(|port| *port > 0)
            })?
            .unwrap_or(DEFAULT_SMTP_PORT);
        let Some(smtp_host) = self.string("SMTP_HOST") else {
            return Ok(None);
        };
        Ok(Some(EmailConfig {
            smtp_host,
            smtp_port,
            from_address: self
                .string("SMTP_FROM")
                .unwrap_or_else(|| DEFAULT_FROM_ADDRESS.to_string()),
            smtp_user: self.string("SMTP_USER"),
            smtp_password: self.string("SMTP_PASSWORD"),
        }))
    }
}
