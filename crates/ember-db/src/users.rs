//! Identity and credential store.

use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use ember_types::error::{StoreError, StoreResult};

use crate::models::UserRow;
use crate::{is_constraint_violation, Database};

/// Optional profile fields supplied at registration.
#[derive(Debug, Default, Clone)]
pub struct Profile {
    pub display_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub country: Option<String>,
    pub bio: Option<String>,
}

impl Database {
    /// Create a user. Duplicate usernames are pre-checked, with the UNIQUE
    /// constraint as a backstop against a racing insert.
    pub fn register(&self, username: &str, password: &str, profile: Profile) -> StoreResult<i64> {
        let password_hash = hash_password(password)?;

        self.with_conn(|conn| {
            let taken: Option<i64> = conn
                .query_row(
                    "SELECT user_id FROM users WHERE username = ?1",
                    [username],
                    |row| row.get(0),
                )
                .optional()?;
            if taken.is_some() {
                return Err(StoreError::DuplicateUsername);
            }

            conn.execute(
                "INSERT INTO users (username, password_hash, display_name, date_of_birth, country, bio)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    username,
                    password_hash,
                    profile.display_name,
                    profile.date_of_birth,
                    profile.country,
                    profile.bio
                ],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    StoreError::DuplicateUsername
                } else {
                    e.into()
                }
            })?;

            Ok(conn.last_insert_rowid())
        })
    }

    /// Verify credentials. Returns the user on success, `None` for an unknown
    /// username or a wrong password — never which of the two it was.
    pub fn authenticate(&self, username: &str, password: &str) -> StoreResult<Option<UserRow>> {
        let user = self.with_conn(|conn| query_user_by_username(conn, username))?;

        match user {
            Some(u) if verify_password(&u.password_hash, password) => Ok(Some(u)),
            _ => Ok(None),
        }
    }

    pub fn get_user(&self, user_id: i64) -> StoreResult<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, user_id))
    }

    pub fn get_user_by_username(&self, username: &str) -> StoreResult<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    pub fn list_users(&self) -> StoreResult<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users ORDER BY username"
            ))?;
            let rows = stmt
                .query_map([], map_user_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_profile(&self, user_id: i64, profile: Profile) -> StoreResult<()> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE users
                 SET display_name = ?1, date_of_birth = ?2, country = ?3, bio = ?4
                 WHERE user_id = ?5",
                rusqlite::params![
                    profile.display_name,
                    profile.date_of_birth,
                    profile.country,
                    profile.bio,
                    user_id
                ],
            )?;
            if n == 0 {
                return Err(StoreError::NotFound("user"));
            }
            Ok(())
        })
    }

    pub fn change_password(&self, user_id: i64, new_password: &str) -> StoreResult<()> {
        let password_hash = hash_password(new_password)?;
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE users SET password_hash = ?1 WHERE user_id = ?2",
                rusqlite::params![password_hash, user_id],
            )?;
            if n == 0 {
                return Err(StoreError::NotFound("user"));
            }
            Ok(())
        })
    }
}

/// Hash with Argon2id and a fresh salt.
pub fn hash_password(password: &str) -> StoreResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| StoreError::PasswordHash(e.to_string()))
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// First-run sample accounts, created only when the user table is empty.
pub(crate) fn seed_sample_users(conn: &Connection) -> StoreResult<()> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    if count > 0 {
        return Ok(());
    }

    let samples = [
        ("alice", "Alice Johnson"),
        ("bob", "Bob Smith"),
        ("charlie", "Charlie Brown"),
    ];

    for (username, display_name) in samples {
        let password_hash = hash_password("password123")?;
        conn.execute(
            "INSERT INTO users (username, password_hash, display_name) VALUES (?1, ?2, ?3)",
            rusqlite::params![username, password_hash, display_name],
        )?;
    }

    info!("Seeded {} sample accounts", samples.len());
    Ok(())
}

const USER_COLUMNS: &str =
    "user_id, username, password_hash, display_name, date_of_birth, country, bio, created_at";

fn map_user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        user_id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        display_name: row.get(3)?,
        date_of_birth: row.get(4)?,
        country: row.get(5)?,
        bio: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub(crate) fn query_user_by_username(
    conn: &Connection,
    username: &str,
) -> StoreResult<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE username = ?1"
    ))?;
    Ok(stmt.query_row([username], map_user_row).optional()?)
}

pub(crate) fn query_user_by_id(conn: &Connection, user_id: i64) -> StoreResult<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"
    ))?;
    Ok(stmt.query_row([user_id], map_user_row).optional()?)
}
