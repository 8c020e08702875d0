//! Connection configuration
//!
//! Configuration is read in two steps. [`Settings`] is a raw snapshot of the
//! `DB_*` keys and never fails to load; [`BackendConfig::from_settings`]
//! turns it into a typed, per-backend configuration and reports missing or
//! malformed values as [`EntityError::Configuration`]. The connection manager
//! performs the second step on its first connect attempt.
//!
//! | `DB_TYPE`              | Required keys                                              |
//! |------------------------|------------------------------------------------------------|
//! | `sqlite`               | `DB_PATH`                                                  |
//! | `mysql`, `mariadb`     | `DB_HOST`, `DB_PORT`, `DB_NAME`, `DB_USERNAME`, `DB_PASSWORD` |
//! | `postgresql`           | `DB_HOST`, `DB_NAME`, `DB_USERNAME`, `DB_PASSWORD`          |
//! | `cubrid`               | `DB_HOST`, `DB_NAME`, `DB_USERNAME`, `DB_PASSWORD`          |

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use once_cell::sync::OnceCell;
use url::Url;

use crate::backends::BackendKind;
use crate::error::{EntityError, EntityResult};

pub const DB_TYPE: &str = "DB_TYPE";
pub const DB_PATH: &str = "DB_PATH";
pub const DB_HOST: &str = "DB_HOST";
pub const DB_PORT: &str = "DB_PORT";
pub const DB_NAME: &str = "DB_NAME";
pub const DB_USERNAME: &str = "DB_USERNAME";
pub const DB_PASSWORD: &str = "DB_PASSWORD";

/// Every key the settings snapshot picks up
pub const SETTING_KEYS: &[&str] = &[
    DB_TYPE,
    DB_PATH,
    DB_HOST,
    DB_PORT,
    DB_NAME,
    DB_USERNAME,
    DB_PASSWORD,
];

static ENV_SETTINGS: OnceCell<Settings> = OnceCell::new();

/// Raw connection settings, keyed by `DB_*` name
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Settings {
    values: BTreeMap<String, String>,
}

impl Settings {
    /// Empty settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings from the process environment.
    ///
    /// A `.env` file in the working directory (or one of its parents) is
    /// loaded first; variables already present in the environment win. The
    /// environment is read once per process and the snapshot is reused by
    /// every later call.
    pub fn from_env() -> Self {
        ENV_SETTINGS
            .get_or_init(|| {
                match dotenvy::dotenv() {
                    Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env file"),
                    Err(e) => tracing::debug!("No .env file loaded: {}", e),
                }
                Self::from_lookup(|key| std::env::var(key).ok())
            })
            .clone()
    }

    /// Settings from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let values = SETTING_KEYS
            .iter()
            .filter_map(|key| lookup(key).map(|value| (key.to_string(), value)))
            .collect();
        Self { values }
    }

    /// Settings from key/value pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let values = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self { values }
    }

    /// Settings for a SQLite database file
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        let path: PathBuf = path.into();
        Self::new()
            .with(DB_TYPE, "sqlite")
            .with(DB_PATH, path.to_string_lossy())
    }

    /// Set a key, returning the updated settings
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Look up a key. Blank values count as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn require(&self, key: &str) -> EntityResult<String> {
        self.get(key).map(str::to_string).ok_or_else(|| {
            EntityError::Configuration(format!("Missing required setting {}", key))
        })
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.values {
            if key == DB_PASSWORD {
                map.entry(key, &"***");
            } else {
                map.entry(key, value);
            }
        }
        map.finish()
    }
}

/// SQLite: a database file addressed by path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteConfig {
    pub path: PathBuf,
}

/// MySQL or MariaDB server
#[derive(Clone, PartialEq, Eq)]
pub struct MySqlConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
}

/// PostgreSQL server; the port is the driver default
#[derive(Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    pub host: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

/// CUBRID server
#[derive(Clone, PartialEq, Eq)]
pub struct CubridConfig {
    pub host: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

macro_rules! redacted_debug {
    ($ty:ident { $($field:ident),* }) => {
        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($ty))
                    $(.field(stringify!($field), &self.$field))*
                    .field("password", &"***")
                    .finish()
            }
        }
    };
}

redacted_debug!(MySqlConfig { host, port, database, username });
redacted_debug!(PostgresConfig { host, database, username });
redacted_debug!(CubridConfig { host, database, username });

/// Typed connection configuration, one variant per supported backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    Sqlite(SqliteConfig),
    MySql(MySqlConfig),
    Postgres(PostgresConfig),
    Cubrid(CubridConfig),
}

impl BackendConfig {
    /// Validate raw settings into a typed configuration
    pub fn from_settings(settings: &Settings) -> EntityResult<Self> {
        let kind: BackendKind = settings
            .get(DB_TYPE)
            .ok_or_else(|| EntityError::Configuration(format!("{} is not set", DB_TYPE)))?
            .parse()?;

        let config = match kind {
            BackendKind::Sqlite => BackendConfig::Sqlite(SqliteConfig {
                path: PathBuf::from(settings.require(DB_PATH)?),
            }),
            BackendKind::MySql => {
                let raw_port = settings.require(DB_PORT)?;
                let port = raw_port.parse::<u16>().map_err(|_| {
                    EntityError::Configuration(format!(
                        "{} must be a port number, got '{}'",
                        DB_PORT, raw_port
                    ))
                })?;
                BackendConfig::MySql(MySqlConfig {
                    host: settings.require(DB_HOST)?,
                    port,
                    database: settings.require(DB_NAME)?,
                    username: settings.require(DB_USERNAME)?,
                    password: settings.require(DB_PASSWORD)?,
                })
            }
            BackendKind::Postgres => BackendConfig::Postgres(PostgresConfig {
                host: settings.require(DB_HOST)?,
                database: settings.require(DB_NAME)?,
                username: settings.require(DB_USERNAME)?,
                password: settings.require(DB_PASSWORD)?,
            }),
            BackendKind::Cubrid => BackendConfig::Cubrid(CubridConfig {
                host: settings.require(DB_HOST)?,
                database: settings.require(DB_NAME)?,
                username: settings.require(DB_USERNAME)?,
                password: settings.require(DB_PASSWORD)?,
            }),
        };

        Ok(config)
    }

    /// Backend kind of this configuration
    pub fn kind(&self) -> BackendKind {
        match self {
            BackendConfig::Sqlite(_) => BackendKind::Sqlite,
            BackendConfig::MySql(_) => BackendKind::MySql,
            BackendConfig::Postgres(_) => BackendKind::Postgres,
            BackendConfig::Cubrid(_) => BackendKind::Cubrid,
        }
    }

    /// Driver URL for this configuration, with credentials percent-encoded
    pub fn connection_url(&self) -> EntityResult<String> {
        match self {
            BackendConfig::Sqlite(config) => {
                Ok(format!("sqlite://{}?mode=rwc", config.path.display()))
            }
            BackendConfig::MySql(config) => server_url(
                "mysql",
                &config.host,
                Some(config.port),
                &config.database,
                &config.username,
                &config.password,
            ),
            BackendConfig::Postgres(config) => server_url(
                "postgres",
                &config.host,
                None,
                &config.database,
                &config.username,
                &config.password,
            ),
            BackendConfig::Cubrid(config) => server_url(
                "cubrid",
                &config.host,
                None,
                &config.database,
                &config.username,
                &config.password,
            ),
        }
    }
}

fn server_url(
    scheme: &str,
    host: &str,
    port: Option<u16>,
    database: &str,
    username: &str,
    password: &str,
) -> EntityResult<String> {
    let mut url = Url::parse(&format!("{}://{}", scheme, host))?;
    let invalid = |what: &str| {
        EntityError::Configuration(format!("Cannot use {} in a {} URL", what, scheme))
    };

    url.set_port(port).map_err(|_| invalid("port"))?;
    url.set_username(username).map_err(|_| invalid("username"))?;
    url.set_password(Some(password))
        .map_err(|_| invalid("password"))?;
    url.set_path(database);

    Ok(url.to_string())
}
