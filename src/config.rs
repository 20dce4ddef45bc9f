//! Connection-string resolution.
//!
//! Resolution runs once, when the data-access layer is built, and yields an
//! immutable [`ConnectionSettings`]. Sources are tried in priority order and
//! the first one that supplies *both* connection strings wins:
//!
//! 1. explicit overrides
//! 2. externally supplied configuration (a JSON value from the host)
//! 3. the environment (`DUAL_SQL_PRIMARY` / `DUAL_SQL_SECONDARY`)
//! 4. `appsettings.json` in the base directory
//! 5. fixed development fallbacks

use std::fmt;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::types::{DatabaseType, Store};

pub const ENV_PRIMARY: &str = "DUAL_SQL_PRIMARY";
pub const ENV_SECONDARY: &str = "DUAL_SQL_SECONDARY";
pub const ENV_PRIMARY_KIND: &str = "DUAL_SQL_PRIMARY_KIND";
pub const ENV_SECONDARY_KIND: &str = "DUAL_SQL_SECONDARY_KIND";
pub const SETTINGS_FILE: &str = "appsettings.json";

/// Development-only fallbacks; they point at hosts that do not exist.
pub const FALLBACK_PRIMARY: &str = "Data Source=FAKE_SQL_SERVER;Initial Catalog=FakeDatabase;User ID=fakeUser;Password=fakePassword;";
pub const FALLBACK_SECONDARY: &str =
    "Server=FAKE_DB2_SERVER:50000;Database=FAKEDB;UID=fakeUser;PWD=fakePassword;";

pub const DEFAULT_PRIMARY_TYPE: DatabaseType = DatabaseType::Mssql;
pub const DEFAULT_SECONDARY_TYPE: DatabaseType = DatabaseType::Postgres;

/// Engine and connection string for one store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub database_type: DatabaseType,
    pub connection_string: String,
}

impl StoreSettings {
    pub fn new(database_type: DatabaseType, connection_string: impl Into<String>) -> Self {
        Self {
            database_type,
            connection_string: connection_string.into(),
        }
    }
}

/// Which source produced the resolved settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOrigin {
    Override,
    External,
    Environment,
    File,
    Fallback,
}

/// Resolved settings for both stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub primary: StoreSettings,
    pub secondary: StoreSettings,
    pub origin: ConfigOrigin,
}

impl ConnectionSettings {
    #[must_use]
    pub fn store(&self, store: Store) -> &StoreSettings {
        match store {
            Store::Primary => &self.primary,
            Store::Secondary => &self.secondary,
        }
    }
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// The inputs resolution may consult.
pub struct ConfigSources {
    overrides: Option<(String, String)>,
    external: Option<serde_json::Value>,
    env: Option<EnvLookup>,
    base_dir: Option<PathBuf>,
    primary_type: DatabaseType,
    secondary_type: DatabaseType,
}

impl Default for ConfigSources {
    fn default() -> Self {
        Self {
            overrides: None,
            external: None,
            env: Some(Box::new(|key| std::env::var(key).ok())),
            base_dir: std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(Path::to_path_buf)),
            primary_type: DEFAULT_PRIMARY_TYPE,
            secondary_type: DEFAULT_SECONDARY_TYPE,
        }
    }
}

impl fmt::Debug for ConfigSources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigSources")
            .field("overrides", &self.overrides.is_some())
            .field("external", &self.external.is_some())
            .field("env", &self.env.is_some())
            .field("base_dir", &self.base_dir)
            .field("primary_type", &self.primary_type)
            .field("secondary_type", &self.secondary_type)
            .finish()
    }
}

impl ConfigSources {
    /// Process environment plus `appsettings.json` next to the executable.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_overrides(mut self, primary: impl Into<String>, secondary: impl Into<String>) -> Self {
        self.overrides = Some((primary.into(), secondary.into()));
        self
    }

    #[must_use]
    pub fn with_external(mut self, config: serde_json::Value) -> Self {
        self.external = Some(config);
        self
    }

    /// Replace the environment lookup (tests, or a host-specific store).
    #[must_use]
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        self.env = Some(Box::new(lookup));
        self
    }

    #[must_use]
    pub fn without_env(mut self) -> Self {
        self.env = None;
        self
    }

    #[must_use]
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn without_file(mut self) -> Self {
        self.base_dir = None;
        self
    }

    /// Engines used when a source does not name them.
    #[must_use]
    pub fn with_database_types(mut self, primary: DatabaseType, secondary: DatabaseType) -> Self {
        self.primary_type = primary;
        self.secondary_type = secondary;
        self
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AppSettings {
    #[serde(default)]
    connection_strings: PerStore,
    #[serde(default)]
    backends: PerStore,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PerStore {
    primary: Option<String>,
    secondary: Option<String>,
}

struct Candidate {
    primary: Option<String>,
    secondary: Option<String>,
    primary_type: Option<String>,
    secondary_type: Option<String>,
}

impl Candidate {
    fn from_settings(settings: AppSettings) -> Self {
        Self {
            primary: settings.connection_strings.primary,
            secondary: settings.connection_strings.secondary,
            primary_type: settings.backends.primary,
            secondary_type: settings.backends.secondary,
        }
    }

    fn complete(self, sources: &ConfigSources, origin: ConfigOrigin) -> Option<ConnectionSettings> {
        let primary = non_blank(self.primary)?;
        let secondary = non_blank(self.secondary)?;
        Some(ConnectionSettings {
            primary: StoreSettings::new(
                parse_type(self.primary_type, sources.primary_type),
                primary,
            ),
            secondary: StoreSettings::new(
                parse_type(self.secondary_type, sources.secondary_type),
                secondary,
            ),
            origin,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_type(name: Option<String>, default: DatabaseType) -> DatabaseType {
    match non_blank(name) {
        None => default,
        Some(name) => DatabaseType::from_str(name.trim(), true).unwrap_or_else(|e| {
            warn!(backend = %name, error = %e, "unknown backend type, using {default}");
            default
        }),
    }
}

/// Resolve both connection strings. Never fails: the last stage is a fixed
/// fallback.
#[must_use]
pub fn resolve(sources: &ConfigSources) -> ConnectionSettings {
    let settings = resolve_inner(sources);
    debug!(origin = ?settings.origin, primary = %settings.primary.database_type,
        secondary = %settings.secondary.database_type, "connection settings resolved");
    settings
}

fn resolve_inner(sources: &ConfigSources) -> ConnectionSettings {
    if let Some((primary, secondary)) = &sources.overrides {
        let candidate = Candidate {
            primary: Some(primary.clone()),
            secondary: Some(secondary.clone()),
            primary_type: None,
            secondary_type: None,
        };
        if let Some(settings) = candidate.complete(sources, ConfigOrigin::Override) {
            return settings;
        }
    }

    if let Some(external) = &sources.external {
        match serde_json::from_value::<AppSettings>(external.clone()) {
            Ok(parsed) => {
                if let Some(settings) =
                    Candidate::from_settings(parsed).complete(sources, ConfigOrigin::External)
                {
                    return settings;
                }
            }
            Err(e) => warn!(error = %e, "ignoring malformed external configuration"),
        }
    }

    if let Some(env) = &sources.env {
        let candidate = Candidate {
            primary: env(ENV_PRIMARY),
            secondary: env(ENV_SECONDARY),
            primary_type: env(ENV_PRIMARY_KIND),
            secondary_type: env(ENV_SECONDARY_KIND),
        };
        if let Some(settings) = candidate.complete(sources, ConfigOrigin::Environment) {
            return settings;
        }
    }

    if let Some(dir) = &sources.base_dir
        && let Some(parsed) = read_settings_file(&dir.join(SETTINGS_FILE))
        && let Some(settings) = Candidate::from_settings(parsed).complete(sources, ConfigOrigin::File)
    {
        return settings;
    }

    ConnectionSettings {
        primary: StoreSettings::new(sources.primary_type, FALLBACK_PRIMARY),
        secondary: StoreSettings::new(sources.secondary_type, FALLBACK_SECONDARY),
        origin: ConfigOrigin::Fallback,
    }
}

fn read_settings_file(path: &Path) -> Option<AppSettings> {
    if !path.is_file() {
        return None;
    }
    let text = std::fs::read_to_string(path)
        .map_err(|e| warn!(path = %path.display(), error = %e, "cannot read settings file"))
        .ok()?;
    serde_json::from_str(&text)
        .map_err(|e| warn!(path = %path.display(), error = %e, "ignoring malformed settings file"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn isolated() -> ConfigSources {
        ConfigSources::new().without_env().without_file()
    }

    #[test]
    fn overrides_win_when_both_present() {
        let settings = resolve(
            &isolated()
                .with_overrides("a.db", "b.db")
                .with_external(json!({"ConnectionStrings": {"Primary": "x", "Secondary": "y"}})),
        );
        assert_eq!(settings.origin, ConfigOrigin::Override);
        assert_eq!(settings.primary.connection_string, "a.db");
        assert_eq!(settings.primary.database_type, DatabaseType::Mssql);
        assert_eq!(settings.secondary.database_type, DatabaseType::Postgres);
    }

    #[test]
    fn half_override_falls_through_to_external() {
        let settings = resolve(
            &isolated()
                .with_overrides("a.db", "  ")
                .with_external(json!({
                    "ConnectionStrings": {"Primary": "x", "Secondary": "y"},
                    "Backends": {"Primary": "SQLite", "Secondary": "sqlserver"}
                })),
        );
        assert_eq!(settings.origin, ConfigOrigin::External);
        assert_eq!(settings.primary, StoreSettings::new(DatabaseType::Sqlite, "x"));
        assert_eq!(settings.secondary.database_type, DatabaseType::Mssql);
    }

    #[test]
    fn environment_lookup_is_consulted() {
        let settings = resolve(&isolated().with_env(|key| match key {
            ENV_PRIMARY => Some("p".to_string()),
            ENV_SECONDARY => Some("s".to_string()),
            ENV_SECONDARY_KIND => Some("sqlite".to_string()),
            _ => None,
        }));
        assert_eq!(settings.origin, ConfigOrigin::Environment);
        assert_eq!(settings.store(Store::Secondary), &StoreSettings::new(DatabaseType::Sqlite, "s"));
    }

    #[test]
    fn settings_file_is_read_from_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{"ConnectionStrings": {"Primary": "file-p", "Secondary": "file-s"}, "Logging": {}}"#,
        )
        .unwrap();
        let settings = resolve(&isolated().with_base_dir(dir.path()));
        assert_eq!(settings.origin, ConfigOrigin::File);
        assert_eq!(settings.primary.connection_string, "file-p");
    }

    #[test]
    fn malformed_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "{ not json").unwrap();
        let settings = resolve(
            &isolated()
                .with_base_dir(dir.path())
                .with_database_types(DatabaseType::Sqlite, DatabaseType::Sqlite),
        );
        assert_eq!(settings.origin, ConfigOrigin::Fallback);
        assert_eq!(settings.primary.connection_string, FALLBACK_PRIMARY);
        assert_eq!(settings.secondary.database_type, DatabaseType::Sqlite);
    }
}
