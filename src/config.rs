//! Startup configuration read from `local.env`, an optional TOML file and the environment.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};
use crate::logging;
use crate::token::TokenMode;

// Free-text settings, read verbatim. Figment would otherwise type-guess them,
// turning `007` into `7` or `true` into a boolean.
const RAW_STRING_VARS: &[(&str, &str)] = &[
    ("LOG_LEVEL", "log_level"),
    ("LOG_FORMAT", "log_format"),
    ("GRPC_PORT", "grpc_port"),
    ("TOKEN_MODE", "token_mode"),
    ("POSTGRESQL_USER", "postgresql.user"),
    ("POSTGRESQL_PASSWORD", "postgresql.password"),
    ("POSTGRESQL_HOST", "postgresql.host"),
    ("POSTGRESQL_NAME", "postgresql.name"),
    ("POSTGRESQL_SSLMODE", "postgresql.sslmode"),
];

/// Process-wide configuration, loaded once at startup.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Minimum log severity.
    pub log_level: String,
    /// `text` or `json`.
    pub log_format: String,
    /// Listen address, `:port` or `host:port`.
    pub grpc_port: String,
    /// bcrypt work factor.
    pub bcrypt_cost: u32,
    /// How Login tokens are produced.
    pub token_mode: TokenMode,
    /// Database connection and pool settings.
    pub postgresql: PostgresConfig,
}

/// PostgreSQL connection and pool settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub sslmode: String,
    pub pool_max_conns: u32,
    #[serde(with = "human_duration")]
    pub pool_max_conn_lifetime: Duration,
    #[serde(with = "human_duration")]
    pub pool_max_conn_idle_time: Duration,
}

impl fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("sslmode", &self.sslmode)
            .field("pool_max_conns", &self.pool_max_conns)
            .field("pool_max_conn_lifetime", &self.pool_max_conn_lifetime)
            .field("pool_max_conn_idle_time", &self.pool_max_conn_idle_time)
            .finish()
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            user: "postgres".to_string(),
            password: String::new(),
            host: "localhost".to_string(),
            port: 5432,
            name: "postgres".to_string(),
            sslmode: "disable".to_string(),
            pool_max_conns: 10,
            pool_max_conn_lifetime: Duration::from_secs(60 * 60),
            pool_max_conn_idle_time: Duration::from_secs(30 * 60),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            grpc_port: ":50051".to_string(),
            bcrypt_cost: bcrypt::DEFAULT_COST,
            token_mode: TokenMode::Placeholder,
            postgresql: PostgresConfig::default(),
        }
    }
}

impl AuthConfig {
    /// Loads configuration from `local.env`, an optional TOML file and the environment.
    ///
    /// Priority, highest first:
    /// 1. `POSTGRESQL_*` variables (e.g. `POSTGRESQL_POOL_MAX_CONNS=20`)
    /// 2. `LOG_LEVEL`, `LOG_FORMAT`, `GRPC_PORT`, `BCRYPT_COST`, `TOKEN_MODE`
    /// 3. TOML file at `AUTH_CONFIG_PATH` (default `config/auth.toml`), skipped if absent
    /// 4. Built-in defaults
    ///
    /// `local.env` is read into the process environment first when it exists.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if `local.env` is malformed or a value has the wrong type.
    pub fn from_env() -> Result<Self> {
        match dotenvy::from_filename("local.env") {
            Ok(_) => {}
            Err(e) if e.not_found() => {}
            Err(e) => return Err(Error::Config(format!("local.env: {e}"))),
        }

        let config_path = std::env::var("AUTH_CONFIG_PATH")
            .unwrap_or_else(|_| "config/auth.toml".to_string());

        Self::figment(&config_path)
            .extract()
            .map_err(|e| Error::Config(e.to_string()))
    }

    fn figment(config_path: &str) -> figment::Figment {
        use figment::providers::{Env, Format, Serialized, Toml};
        use figment::Figment;

        let typed = Figment::from(Serialized::defaults(AuthConfig::default()))
            .merge(Toml::file(config_path).nested())
            .merge(Env::raw().only(&["BCRYPT_COST"]))
            .merge(
                Env::prefixed("POSTGRESQL_")
                    .filter(|key| {
                        !RAW_STRING_VARS.iter().any(|(var, _)| {
                            var.strip_prefix("POSTGRESQL_")
                                .is_some_and(|suffix| key.as_str().eq_ignore_ascii_case(suffix))
                        })
                    })
                    .map(|key| format!("postgresql.{key}").into()),
            );

        RAW_STRING_VARS
            .iter()
            .fold(typed, |figment, (var, key)| match std::env::var(var) {
                Ok(value) => figment.merge(Serialized::default(key, value)),
                Err(_) => figment,
            })
    }

    /// Validates values that deserialize fine but cannot be used.
    ///
    /// # Errors
    /// Returns [`Error::Config`] describing the first offending setting.
    pub fn validate(&self) -> Result<()> {
        logging::level_directive(&self.log_level)
            .map_err(|_| Error::Config(format!("unknown LOG_LEVEL '{}'", self.log_level)))?;

        if !matches!(self.log_format.as_str(), "text" | "json") {
            return Err(Error::Config(format!(
                "unknown LOG_FORMAT '{}', expected text or json",
                self.log_format
            )));
        }

        self.listen_addr()?;

        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(Error::Config(format!(
                "BCRYPT_COST must be between 4 and 31, got {}",
                self.bcrypt_cost
            )));
        }

        let pg = &self.postgresql;
        if pg.pool_max_conns == 0 {
            return Err(Error::Config(
                "POSTGRESQL_POOL_MAX_CONNS cannot be zero".to_string(),
            ));
        }
        if pg.user.is_empty() {
            return Err(Error::Config("POSTGRESQL_USER is empty".to_string()));
        }
        if pg.name.is_empty() {
            return Err(Error::Config("POSTGRESQL_NAME is empty".to_string()));
        }
        pg.sslmode
            .parse::<sqlx::postgres::PgSslMode>()
            .map_err(|e| Error::Config(format!("POSTGRESQL_SSLMODE: {e}")))?;

        Ok(())
    }

    /// Resolves `grpc_port` to a socket address.
    ///
    /// A bare `:port` binds all IPv4 interfaces.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the value is not a valid address.
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        let raw = self.grpc_port.trim();
        let full = if raw.starts_with(':') {
            format!("0.0.0.0{raw}")
        } else {
            raw.to_string()
        };
        full.parse()
            .map_err(|e| Error::Config(format!("invalid GRPC_PORT '{raw}': {e}")))
    }
}

/// Parses durations such as `30s`, `5m`, `1h30m`, `1.5h`, `250ms` or a bare number of seconds.
pub fn parse_duration(input: &str) -> std::result::Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("empty duration".to_string());
    }
    if let Ok(secs) = input.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut rest = input;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("missing unit in duration '{input}'"))?;
        if digits == 0 {
            return Err(format!("invalid duration '{input}'"));
        }
        let (number, tail) = rest.split_at(digits);
        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_len);

        let value: f64 = number
            .parse()
            .map_err(|_| format!("invalid number '{number}' in duration '{input}'"))?;
        let scale = match unit {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            other => return Err(format!("unknown unit '{other}' in duration '{input}'")),
        };
        let part = Duration::try_from_secs_f64(value * scale)
            .map_err(|e| format!("duration '{input}' out of range: {e}"))?;
        total = total
            .checked_add(part)
            .ok_or_else(|| format!("duration '{input}' out of range"))?;
        rest = next;
    }
    Ok(total)
}

fn format_duration(d: Duration) -> String {
    if d.subsec_nanos() == 0 {
        format!("{}s", d.as_secs())
    } else {
        format!("{}ms", d.as_millis())
    }
}

mod human_duration {
    use super::*;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Duration, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Secs(u64),
            Text(String),
        }

        match Raw::deserialize(d)? {
            Raw::Secs(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
        }
    }
}
