#![cfg(feature = "sqlite")]

mod common;

use common::{TempDb, spied_layer};
use dual_sql_middleware::prelude::*;

fn table(db: &TempDb) -> Result<(), Box<dyn std::error::Error>> {
    db.exec(&["CREATE TABLE t (x INTEGER NOT NULL)"])
}

#[test]
fn insert_update_delete_batch_sums_to_three_and_leaves_table_empty()
-> Result<(), Box<dyn std::error::Error>> {
    let primary = TempDb::new("primary.db")?;
    let secondary = TempDb::new("secondary.db")?;
    table(&primary)?;
    let layer = spied_layer(&primary, &secondary);

    let total = layer.primary().run_batch(
        [
            "INSERT INTO t (x) VALUES (1)",
            "UPDATE t SET x = 2 WHERE x = 1",
            "DELETE FROM t WHERE x = 2",
        ],
        None,
    )?;
    assert_eq!(total, 3);
    assert_eq!(primary.count("t")?, 0);
    assert_eq!(layer.primary_backend().connects(), 1);
    Ok(())
}

#[test]
fn malformed_second_statement_rolls_back_the_first() -> Result<(), Box<dyn std::error::Error>> {
    let primary = TempDb::new("primary.db")?;
    let secondary = TempDb::new("secondary.db")?;
    table(&primary)?;
    let layer = spied_layer(&primary, &secondary);

    let total = layer.primary().run_batch(
        [
            "INSERT INTO t (x) VALUES (1)",
            "UPDAT t SET x = 2 WHERE x = 1",
            "DELETE FROM t WHERE x = 2",
        ],
        None,
    )?;
    assert_eq!(total, FAILURE);
    assert_eq!(primary.count("t")?, 0);
    Ok(())
}

#[test]
fn parameterised_batch_binds_each_statement_separately() -> Result<(), Box<dyn std::error::Error>> {
    let primary = TempDb::new("primary.db")?;
    let secondary = TempDb::new("secondary.db")?;
    table(&primary)?;
    let layer = spied_layer(&primary, &secondary);

    let total = layer.primary().run_batch(
        ["INSERT INTO t (x) VALUES (@x)", "INSERT INTO t (x) VALUES (@x)", "DELETE FROM t WHERE x = @x"],
        Some(vec![
            Params::new().with("x", 10),
            Params::new().with("x", 20),
            Params::new().with("x", 10),
        ]),
    )?;
    assert_eq!(total, 3);
    assert_eq!(primary.count("t")?, 1);
    Ok(())
}

#[test]
fn length_mismatch_is_rejected_before_connecting() -> Result<(), Box<dyn std::error::Error>> {
    let primary = TempDb::new("primary.db")?;
    let secondary = TempDb::new("secondary.db")?;
    let layer = spied_layer(&primary, &secondary);

    let err = layer
        .primary()
        .run_batch(
            ["INSERT INTO t (x) VALUES (1)", "INSERT INTO t (x) VALUES (2)"],
            Some(vec![Params::new()]),
        )
        .unwrap_err();
    assert!(err.is_validation());

    let empty: [&str; 0] = [];
    let err = layer.secondary().run_batch(empty, None).unwrap_err();
    assert!(err.is_validation());

    assert_eq!(layer.primary_backend().connects(), 0);
    assert_eq!(layer.secondary_backend().connects(), 0);
    Ok(())
}

#[test]
fn statement_order_is_preserved() -> Result<(), Box<dyn std::error::Error>> {
    let primary = TempDb::new("primary.db")?;
    let secondary = TempDb::new("secondary.db")?;
    primary.exec(&["CREATE TABLE log (seq INTEGER PRIMARY KEY AUTOINCREMENT, tag TEXT NOT NULL)"])?;
    let layer = spied_layer(&primary, &secondary);

    let tags = ["a", "b", "c", "d"];
    let total = layer.primary().run_batch(
        tags.iter().map(|_| "INSERT INTO log (tag) VALUES (:tag)"),
        Some(tags.iter().map(|t| Params::new().with("tag", *t)).collect()),
    )?;
    assert_eq!(total, 4);

    let rows = layer.primary().select_one("SELECT tag FROM log ORDER BY seq", None);
    let seen: Vec<&str> = rows.iter().filter_map(|r| r.get("tag").and_then(RowValues::as_text)).collect();
    assert_eq!(seen, tags);
    Ok(())
}
