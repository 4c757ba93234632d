//! Seeded schemas and engines shared across test suites.

use crate::commands::{insert_values, int, text};
use command::{ColumnDef, Command};
use database::Database;
use types::SqlType;

/// `CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, age INTEGER)`
pub fn create_users() -> Command {
    Command::CreateTable {
        name: "users".into(),
        columns: vec![
            ColumnDef::primary_key("id"),
            ColumnDef::new("name", SqlType::Text),
            ColumnDef::new("age", SqlType::Integer),
        ],
    }
}

/// `CREATE TABLE orders (oid INTEGER PRIMARY KEY, uid INTEGER, item TEXT)`
pub fn create_orders() -> Command {
    Command::CreateTable {
        name: "orders".into(),
        columns: vec![
            ColumnDef::primary_key("oid"),
            ColumnDef::new("uid", SqlType::Integer),
            ColumnDef::new("item", SqlType::Text),
        ],
    }
}

/// An in-memory engine with an empty `users` table.
pub fn users_db() -> Database {
    let mut db = Database::open_in_memory().unwrap();
    db.execute(create_users()).unwrap();
    db
}

/// An in-memory engine with `users` holding Alice (1, 30) and Bob (2, 25).
pub fn seeded_users_db() -> Database {
    let mut db = users_db();
    db.execute(insert_values("users", vec![int(1), text("Alice"), int(30)]))
        .unwrap();
    db.execute(insert_values("users", vec![int(2), text("Bob"), int(25)]))
        .unwrap();
    db
}
