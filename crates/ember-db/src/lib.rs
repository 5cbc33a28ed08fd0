//! SQLite storage and domain logic for Ember: identity, social graph, groups,
//! messaging, reactions, read receipts, and the streak engine.
//!
//! One connection behind a mutex. Every multi-statement operation (blocking a
//! user, creating a group, accepting an invite, sending a message plus its
//! streak update) runs inside a single SQLite transaction, so partial state is
//! never observable.

pub mod migrations;
pub mod models;
pub mod streaks;

mod groups;
mod messages;
mod reactions;
mod social;
pub mod users;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::info;

use ember_types::error::{StoreError, StoreResult};

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database file, apply migrations, and seed the
    /// sample accounts if the user table is empty.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let mut conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&mut conn)?;
        users::seed_sample_users(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Fresh in-memory database with the full schema and no seed data.
    /// Used by tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        let mut conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Internal(format!("DB lock poisoned: {e}")))?;
        f(&conn)
    }

    pub fn with_conn_mut<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Internal(format!("DB lock poisoned: {e}")))?;
        f(&mut conn)
    }
}

/// True when the error is a UNIQUE or CHECK constraint violation, used to map
/// constraint backstops to their domain rejection.
pub(crate) fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

#[cfg(test)]
pub(crate) mod test_util {
    use crate::users::Profile;
    use crate::Database;

    pub(crate) fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    pub(crate) fn register(db: &Database, username: &str) -> i64 {
        db.register(username, "correct-horse-battery", Profile::default())
            .unwrap()
    }

    /// Run the full request/accept flow so the pair ends up friends.
    pub(crate) fn befriend(db: &Database, a: i64, b: i64) {
        let username = db.get_user(b).unwrap().unwrap().username;
        db.send_friend_request(a, &username).unwrap();
        let req = db.pending_friend_requests(b).unwrap().remove(0);
        db.respond_to_friend_request(req.request_id, b, true).unwrap();
    }
}
