#![cfg(feature = "sqlite")]

mod common;

use common::TempDb;
use dual_sql_middleware::config::ConfigOrigin;
use dual_sql_middleware::prelude::*;
use serde_json::json;

fn sqlite_sources() -> ConfigSources {
    ConfigSources::new()
        .without_env()
        .without_file()
        .with_database_types(DatabaseType::Sqlite, DatabaseType::Sqlite)
}

#[test]
fn overrides_build_a_working_layer() -> Result<(), Box<dyn std::error::Error>> {
    let primary = TempDb::new("primary.db")?;
    let secondary = TempDb::new("secondary.db")?;
    primary.exec(&["CREATE TABLE a (x INTEGER)"])?;
    secondary.exec(&["CREATE TABLE b (x INTEGER)"])?;

    let layer = DataAccessLayer::from_sources(
        &sqlite_sources().with_overrides(primary.path(), format!("Data Source={};Busy Timeout=2000", secondary.path())),
    )?;
    let settings = layer.settings().ok_or("settings not kept")?;
    assert_eq!(settings.origin, ConfigOrigin::Override);
    assert_eq!(layer.primary().database_type(), DatabaseType::Sqlite);

    assert!(layer.store(Store::Primary).insert_one("INSERT INTO a (x) VALUES (1)", None));
    assert!(layer.store(Store::Secondary).insert_one("INSERT INTO b (x) VALUES (2)", None));
    // each store really is its own database
    assert!(layer.primary().select_one("SELECT * FROM b", None).is_empty());
    assert_eq!(secondary.count("b")?, 1);
    Ok(())
}

#[test]
fn external_json_names_engines_and_strings() -> Result<(), Box<dyn std::error::Error>> {
    let primary = TempDb::new("primary.db")?;
    let secondary = TempDb::new("secondary.db")?;

    let layer = DataAccessLayer::from_sources(&ConfigSources::new().without_env().without_file().with_external(json!({
        "ConnectionStrings": { "Primary": primary.path(), "Secondary": secondary.path() },
        "Backends": { "Primary": "sqlite", "Secondary": "SQLite" }
    })))?;
    assert_eq!(layer.settings().map(|s| s.origin), Some(ConfigOrigin::External));
    assert_eq!(layer.secondary().database_type(), DatabaseType::Sqlite);

    let total = layer.run_mixed(
        Some(vec!["CREATE TABLE p (x INTEGER)".to_string(), "INSERT INTO p (x) VALUES (1)".to_string()]),
        None,
        Some(vec!["CREATE TABLE s (x INTEGER)".to_string()]),
        None,
    )?;
    assert_eq!(total, 1);
    assert_eq!(primary.count("p")?, 1);
    Ok(())
}

#[test]
fn environment_lookup_feeds_the_layer() -> Result<(), Box<dyn std::error::Error>> {
    let primary = TempDb::new("primary.db")?;
    let secondary = TempDb::new("secondary.db")?;
    let (p, s) = (primary.path().to_string(), secondary.path().to_string());

    let sources = ConfigSources::new().without_file().with_env(move |key| match key {
        "DUAL_SQL_PRIMARY" => Some(p.clone()),
        "DUAL_SQL_SECONDARY" => Some(s.clone()),
        "DUAL_SQL_PRIMARY_KIND" | "DUAL_SQL_SECONDARY_KIND" => Some("sqlite".to_string()),
        _ => None,
    });
    let layer = DataAccessLayer::from_sources(&sources)?;
    assert_eq!(layer.settings().map(|s| s.origin), Some(ConfigOrigin::Environment));
    assert_eq!(
        layer.primary().scalar_one("SELECT 40 + 2", None),
        Some(RowValues::Int(42))
    );
    Ok(())
}

#[test]
fn engine_with_unparsable_string_is_a_config_error() {
    let err = DataAccessLayer::from_settings(&ConnectionSettings {
        primary: StoreSettings::new(DatabaseType::Sqlite, "   "),
        secondary: StoreSettings::new(DatabaseType::Sqlite, "x.db"),
        origin: ConfigOrigin::Override,
    })
    .unwrap_err();
    assert!(matches!(err, DataAccessError::Config(_)));
}
