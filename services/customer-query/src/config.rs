//! Service configuration.
//!
//! # Purpose
//! Loads the listener, logging, auth, and storage settings from environment variables (with an
//! optional YAML override file) and validates them once at startup.
//!
//! # Key invariants
//! - Every absent required variable is reported together in [`ConfigError::Missing`].
//! - Empty values count as absent.
//! - Secrets (database password) never appear in `Debug` output.
use jsonwebtoken::Algorithm;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_METRICS_BIND: &str = "0.0.0.0:9090";
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_DB_PORT: u16 = 5432;
pub const DEFAULT_DB_POOL_MAX: u32 = 5;
pub const DEFAULT_STATEMENT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_CLOUDSQL_SOCKET_DIR: &str = "/cloudsql";
pub const CONFIG_FILE_ENV: &str = "CUSTOMER_QUERY_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
    #[error("read {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

/// Settings for the bearer token verifier.
#[derive(Debug, Clone)]
pub struct OidcConfig {
    pub issuer: String,
    pub audience: String,
    pub jwks_uri: String,
    pub algorithm: Algorithm,
}

/// Where Postgres listens: a Cloud SQL style unix socket directory or a TCP host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbEndpoint {
    Socket(PathBuf),
    Tcp { host: String, port: u16 },
}

#[derive(Clone)]
pub struct PostgresConfig {
    pub endpoint: DbEndpoint,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_connections: u32,
    pub statement_timeout_ms: u64,
    pub acquire_timeout_ms: u64,
    pub run_migrations: bool,
}

impl fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("endpoint", &self.endpoint)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("database", &self.database)
            .field("max_connections", &self.max_connections)
            .field("statement_timeout_ms", &self.statement_timeout_ms)
            .field("acquire_timeout_ms", &self.acquire_timeout_ms)
            .field("run_migrations", &self.run_migrations)
            .finish()
    }
}

// Customer query service configuration sourced from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub metrics_bind: SocketAddr,
    pub log_level: String,
    pub log_format: LogFormat,
    pub storage: StorageBackend,
    pub postgres: Option<PostgresConfig>,
    pub oidc: OidcConfig,
}

#[derive(Debug, Default, Deserialize)]
struct ServiceConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    log_level: Option<String>,
    log_format: Option<String>,
    db_pool_max: Option<u32>,
    db_statement_timeout_ms: Option<u64>,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`ServiceConfig::from_env`], then applies the YAML file named by
    /// `CUSTOMER_QUERY_CONFIG` if set.
    pub fn from_env_or_yaml() -> Result<Self, ConfigError> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            let contents = fs::read_to_string(&path).map_err(|source| ConfigError::File {
                path: path.clone(),
                source,
            })?;
            config.apply_yaml(&contents)?;
        }
        Ok(config)
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };

        let port = vars.parse_or("PORT", DEFAULT_PORT)?;
        let bind_addr = SocketAddr::from(([0, 0, 0, 0], port));
        let metrics_bind = vars.parse_or(
            "METRICS_BIND",
            DEFAULT_METRICS_BIND
                .parse::<SocketAddr>()
                .map_err(|err| invalid("METRICS_BIND", err))?,
        )?;
        let log_level = vars
            .get("LOG_LEVEL")
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
        let log_format = parse_log_format(vars.get("LOG_FORMAT").as_deref())?;
        let storage = match vars.get("STORAGE_BACKEND").as_deref() {
            None | Some("postgres") => StorageBackend::Postgres,
            Some("memory") => StorageBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "STORAGE_BACKEND",
                    reason: format!("expected `postgres` or `memory`, got `{other}`"),
                });
            }
        };

        // Collect every missing variable before failing so operators fix them in one pass.
        let mut missing = Vec::new();
        let issuer = vars.require("OAUTH_ISSUER", &mut missing);
        let audience = vars.require("OAUTH_AUDIENCE", &mut missing);
        let jwks_uri = vars.require("OAUTH_JWKS_URI", &mut missing);

        let postgres = if storage == StorageBackend::Postgres {
            let endpoint = match (vars.get("INSTANCE_CONNECTION_NAME"), vars.get("DB_HOST")) {
                (Some(instance), _) => {
                    let dir = vars
                        .get("DB_SOCKET_DIR")
                        .unwrap_or_else(|| DEFAULT_CLOUDSQL_SOCKET_DIR.to_string());
                    Some(DbEndpoint::Socket(PathBuf::from(dir).join(instance)))
                }
                (None, Some(host)) => Some(DbEndpoint::Tcp {
                    host,
                    port: vars.parse_or("DB_PORT", DEFAULT_DB_PORT)?,
                }),
                (None, None) => {
                    missing.push("INSTANCE_CONNECTION_NAME or DB_HOST");
                    None
                }
            };
            let user = vars.require("DB_USER", &mut missing);
            let password = vars.require("DB_PASSWORD", &mut missing);
            let database = vars.require("DB_NAME", &mut missing);
            match (endpoint, user, password, database) {
                (Some(endpoint), Some(user), Some(password), Some(database)) => {
                    Some(PostgresConfig {
                        endpoint,
                        user,
                        password,
                        database,
                        max_connections: vars.parse_or("DB_POOL_MAX", DEFAULT_DB_POOL_MAX)?,
                        statement_timeout_ms: vars
                            .parse_or("DB_STATEMENT_TIMEOUT_MS", DEFAULT_STATEMENT_TIMEOUT_MS)?,
                        acquire_timeout_ms: vars
                            .parse_or("DB_ACQUIRE_TIMEOUT_MS", DEFAULT_ACQUIRE_TIMEOUT_MS)?,
                        run_migrations: vars
                            .get("DB_RUN_MIGRATIONS")
                            .map(|value| matches!(value.as_str(), "1" | "true" | "yes"))
                            .unwrap_or(false),
                    })
                }
                _ => None,
            }
        } else {
            None
        };

        let (Some(issuer), Some(audience), Some(jwks_uri)) = (issuer, audience, jwks_uri) else {
            return Err(ConfigError::Missing(missing));
        };
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let algorithm = parse_algorithm(vars.get("OAUTH_TOKEN_SIGNING_ALG").as_deref())?;

        Ok(Self {
            bind_addr,
            metrics_bind,
            log_level,
            log_format,
            storage,
            postgres,
            oidc: OidcConfig {
                issuer,
                audience,
                jwks_uri,
                algorithm,
            },
        })
    }

    fn apply_yaml(&mut self, contents: &str) -> Result<(), ConfigError> {
        let override_cfg: ServiceConfigOverride = serde_yaml::from_str(contents)?;
        if let Some(value) = override_cfg.bind_addr {
            self.bind_addr = value.parse().map_err(|err| invalid("bind_addr", err))?;
        }
        if let Some(value) = override_cfg.metrics_bind {
            self.metrics_bind = value.parse().map_err(|err| invalid("metrics_bind", err))?;
        }
        if let Some(value) = override_cfg.log_level {
            self.log_level = value;
        }
        if let Some(value) = override_cfg.log_format {
            self.log_format = parse_log_format(Some(&value))?;
        }
        if let Some(pg) = self.postgres.as_mut() {
            if let Some(value) = override_cfg.db_pool_max {
                pg.max_connections = value;
            }
            if let Some(value) = override_cfg.db_statement_timeout_ms {
                pg.statement_timeout_ms = value;
            }
        }
        Ok(())
    }
}

struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|value| !value.trim().is_empty())
    }

    fn require(&self, name: &'static str, missing: &mut Vec<&'static str>) -> Option<String> {
        let value = self.get(name);
        if value.is_none() {
            missing.push(name);
        }
        value
    }

    fn parse_or<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.get(name) {
            Some(value) => value.trim().parse().map_err(|err| invalid(name, err)),
            None => Ok(default),
        }
    }
}

fn invalid(name: &'static str, err: impl fmt::Display) -> ConfigError {
    ConfigError::Invalid {
        name,
        reason: err.to_string(),
    }
}

fn parse_log_format(value: Option<&str>) -> Result<LogFormat, ConfigError> {
    match value {
        None | Some("json") => Ok(LogFormat::Json),
        Some("text") => Ok(LogFormat::Text),
        Some(other) => Err(ConfigError::Invalid {
            name: "LOG_FORMAT",
            reason: format!("expected `json` or `text`, got `{other}`"),
        }),
    }
}

fn parse_algorithm(value: Option<&str>) -> Result<Algorithm, ConfigError> {
    let Some(value) = value else {
        return Ok(Algorithm::RS256);
    };
    let algorithm =
        Algorithm::from_str(value).map_err(|err| invalid("OAUTH_TOKEN_SIGNING_ALG", err))?;
    match algorithm {
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::ES256
        | Algorithm::ES384 => Ok(algorithm),
        other => Err(ConfigError::Invalid {
            name: "OAUTH_TOKEN_SIGNING_ALG",
            reason: format!("{other:?} is not an asymmetric JWKS algorithm"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    const AUTH: [(&str, &str); 3] = [
        ("OAUTH_ISSUER", "https://issuer.example/"),
        ("OAUTH_AUDIENCE", "customers-api"),
        ("OAUTH_JWKS_URI", "https://issuer.example/.well-known/jwks.json"),
    ];

    #[test]
    fn reports_every_missing_variable() {
        let err = ServiceConfig::from_lookup(lookup(&[])).unwrap_err();
        let ConfigError::Missing(missing) = &err else {
            panic!("expected missing error, got {err}");
        };
        assert_eq!(
            missing,
            &vec![
                "OAUTH_ISSUER",
                "OAUTH_AUDIENCE",
                "OAUTH_JWKS_URI",
                "INSTANCE_CONNECTION_NAME or DB_HOST",
                "DB_USER",
                "DB_PASSWORD",
                "DB_NAME",
            ]
        );
        assert!(err.to_string().contains("OAUTH_ISSUER, OAUTH_AUDIENCE"));
    }

    #[test]
    fn memory_backend_needs_only_auth() {
        let mut pairs = AUTH.to_vec();
        pairs.push(("STORAGE_BACKEND", "memory"));
        let config = ServiceConfig::from_lookup(lookup(&pairs)).expect("config");
        assert_eq!(config.storage, StorageBackend::Memory);
        assert!(config.postgres.is_none());
        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.oidc.algorithm, Algorithm::RS256);
    }

    #[test]
    fn empty_values_count_as_missing() {
        let mut pairs = AUTH.to_vec();
        pairs.retain(|(k, _)| *k != "OAUTH_AUDIENCE");
        pairs.push(("OAUTH_AUDIENCE", "  "));
        pairs.push(("STORAGE_BACKEND", "memory"));
        let err = ServiceConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ref m) if m == &vec!["OAUTH_AUDIENCE"]));
    }

    #[test]
    fn postgres_over_cloudsql_socket() {
        let mut pairs = AUTH.to_vec();
        pairs.extend([
            ("INSTANCE_CONNECTION_NAME", "proj:region:db"),
            ("DB_USER", "svc"),
            ("DB_PASSWORD", "hunter2"),
            ("DB_NAME", "customers"),
            ("DB_POOL_MAX", "9"),
            ("PORT", "3000"),
        ]);
        let config = ServiceConfig::from_lookup(lookup(&pairs)).expect("config");
        let pg = config.postgres.expect("postgres");
        assert_eq!(
            pg.endpoint,
            DbEndpoint::Socket(PathBuf::from("/cloudsql/proj:region:db"))
        );
        assert_eq!(pg.max_connections, 9);
        assert_eq!(pg.statement_timeout_ms, DEFAULT_STATEMENT_TIMEOUT_MS);
        assert!(!pg.run_migrations);
        assert_eq!(config.bind_addr.port(), 3000);
        assert!(!format!("{pg:?}").contains("hunter2"));
    }

    #[test]
    fn postgres_over_tcp() {
        let mut pairs = AUTH.to_vec();
        pairs.extend([
            ("DB_HOST", "db.internal"),
            ("DB_PORT", "6432"),
            ("DB_USER", "svc"),
            ("DB_PASSWORD", "pw"),
            ("DB_NAME", "customers"),
            ("DB_RUN_MIGRATIONS", "true"),
        ]);
        let config = ServiceConfig::from_lookup(lookup(&pairs)).expect("config");
        let pg = config.postgres.expect("postgres");
        assert_eq!(
            pg.endpoint,
            DbEndpoint::Tcp {
                host: "db.internal".to_string(),
                port: 6432
            }
        );
        assert!(pg.run_migrations);
    }

    #[test]
    fn rejects_bad_values() {
        let mut pairs = AUTH.to_vec();
        pairs.extend([("STORAGE_BACKEND", "memory"), ("PORT", "eighty")]);
        let err = ServiceConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));

        let mut pairs = AUTH.to_vec();
        pairs.extend([("STORAGE_BACKEND", "sqlite")]);
        let err = ServiceConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "STORAGE_BACKEND", .. }));

        let mut pairs = AUTH.to_vec();
        pairs.extend([
            ("STORAGE_BACKEND", "memory"),
            ("OAUTH_TOKEN_SIGNING_ALG", "HS256"),
        ]);
        let err = ServiceConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: "OAUTH_TOKEN_SIGNING_ALG",
                ..
            }
        ));
    }

    #[test]
    fn yaml_override_applies() {
        let mut pairs = AUTH.to_vec();
        pairs.push(("STORAGE_BACKEND", "memory"));
        let mut config = ServiceConfig::from_lookup(lookup(&pairs)).expect("config");
        config
            .apply_yaml("bind_addr: 127.0.0.1:8181\nlog_level: debug\nlog_format: text\n")
            .expect("yaml");
        assert_eq!(
            config.bind_addr,
            "127.0.0.1:8181".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, LogFormat::Text);
    }

    struct EnvGuard {
        key: &'static str,
        prev: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let prev = std::env::var(key).ok();
            unsafe {
                std::env::set_var(key, value);
            }
            Self { key, prev }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.prev {
                Some(value) => unsafe {
                    std::env::set_var(self.key, value);
                },
                None => unsafe {
                    std::env::remove_var(self.key);
                },
            }
        }
    }

    #[test]
    #[serial]
    fn from_env_reads_process_environment() {
        let _g1 = EnvGuard::set("OAUTH_ISSUER", "https://issuer.example/");
        let _g2 = EnvGuard::set("OAUTH_AUDIENCE", "customers-api");
        let _g3 = EnvGuard::set("OAUTH_JWKS_URI", "https://issuer.example/jwks");
        let _g4 = EnvGuard::set("STORAGE_BACKEND", "memory");
        let _g5 = EnvGuard::set("LOG_LEVEL", "warn");
        let config = ServiceConfig::from_env().expect("config");
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.oidc.audience, "customers-api");
    }
}
