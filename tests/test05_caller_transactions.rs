#![cfg(feature = "sqlite")]

mod common;

use common::TempDb;
use dual_sql_middleware::executor::{delete_one, insert_one, scalar_one, select_one, update_one};
use dual_sql_middleware::prelude::*;

fn db() -> Result<TempDb, Box<dyn std::error::Error>> {
    let db = TempDb::new("tx.db")?;
    db.exec(&["CREATE TABLE items (id INTEGER PRIMARY KEY, qty INTEGER NOT NULL)"])?;
    Ok(db)
}

fn insert(id: i64) -> Statement {
    Statement::text("INSERT INTO items (id, qty) VALUES (@id, 1)").with_params(Some(Params::new().with("id", id)))
}

#[test]
fn executor_never_commits_a_borrowed_transaction() -> Result<(), Box<dyn std::error::Error>> {
    let db = db()?;
    let mut conn = db.backend().connect()?;
    {
        let mut tx = Tx::begin(&mut conn, IsolationLevel::ReadCommitted)?;
        assert!(insert_one(&mut tx, &insert(1)));
        assert!(insert_one(&mut tx, &insert(2)));
        assert_eq!(update_one(&mut tx, &Statement::text("UPDATE items SET qty = 5")), 2);
        assert_eq!(
            scalar_one(&mut tx, &Statement::text("SELECT SUM(qty) FROM items")),
            Some(RowValues::Int(10))
        );
        // not visible outside until the owner commits
        assert_eq!(db.count("items")?, 0);
        tx.commit()?;
    }
    assert_eq!(db.count("items")?, 2);
    conn.close()?;
    Ok(())
}

#[test]
fn a_failing_statement_leaves_the_borrowed_transaction_to_its_owner()
-> Result<(), Box<dyn std::error::Error>> {
    let db = db()?;
    let mut conn = db.backend().connect()?;
    {
        let mut tx = Tx::begin(&mut conn, IsolationLevel::ReadCommitted)?;
        assert!(insert_one(&mut tx, &insert(1)));
        // duplicate key: fails, but the transaction and the first row survive
        assert!(!insert_one(&mut tx, &insert(1)));
        assert_eq!(delete_one(&mut tx, &Statement::text("DELETE FROM missing")), FAILURE);
        assert_eq!(select_one(&mut tx, &Statement::text("SELECT id FROM items")).len(), 1);
        tx.commit()?;
    }
    assert_eq!(db.count("items")?, 1);
    Ok(())
}

#[test]
fn an_abandoned_transaction_rolls_back_on_drop() -> Result<(), Box<dyn std::error::Error>> {
    let db = db()?;
    let mut conn = db.backend().connect()?;
    {
        let mut tx = Tx::begin(&mut conn, IsolationLevel::Serializable)?;
        assert!(insert_one(&mut tx, &insert(3)));
    }
    assert_eq!(db.count("items")?, 0);

    // the connection is usable again with a fresh local transaction
    assert!(insert_one(&mut conn, &insert(4)));
    assert_eq!(db.count("items")?, 1);
    Ok(())
}

#[test]
fn explicit_rollback_discards_work() -> Result<(), Box<dyn std::error::Error>> {
    let db = db()?;
    let mut conn = db.backend().connect()?;
    let mut tx = Tx::begin(&mut conn, IsolationLevel::ReadCommitted)?;
    assert!(insert_one(&mut tx, &insert(1)));
    tx.rollback()?;
    assert_eq!(db.count("items")?, 0);
    Ok(())
}
