use rusqlite::Connection;
use tracing::info;

use ember_types::error::StoreResult;

/// Ordered schema migrations, tracked with `PRAGMA user_version`. Each entry
/// runs once, inside its own transaction. Append-only: never edit a shipped
/// entry, add a new one.
pub const MIGRATIONS: &[&str] = &[
    // v1: initial schema
    "
    CREATE TABLE users (
        user_id         INTEGER PRIMARY KEY AUTOINCREMENT,
        username        TEXT NOT NULL UNIQUE,
        password_hash   TEXT NOT NULL,
        display_name    TEXT,
        date_of_birth   TEXT,
        country         TEXT,
        bio             TEXT,
        created_at      TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE messages (
        message_id          INTEGER PRIMARY KEY AUTOINCREMENT,
        sender_id           INTEGER NOT NULL REFERENCES users(user_id),
        receiver_id         INTEGER NOT NULL REFERENCES users(user_id),
        message_text        TEXT NOT NULL,
        image_path          TEXT,
        sent_at             TEXT NOT NULL DEFAULT (datetime('now')),
        is_edited           INTEGER NOT NULL DEFAULT 0,
        edited_at           TEXT,
        -- Weak back-reference to the forwarded original. No FK: it may
        -- dangle once the original is deleted.
        forwarded_from_id   INTEGER
    );

    CREATE INDEX idx_messages_pair
        ON messages(sender_id, receiver_id, sent_at);

    CREATE TABLE groups (
        group_id            INTEGER PRIMARY KEY AUTOINCREMENT,
        group_name          TEXT NOT NULL,
        group_description   TEXT,
        group_avatar        TEXT NOT NULL DEFAULT '👥',
        created_by          INTEGER NOT NULL REFERENCES users(user_id),
        created_at          TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE group_members (
        member_id   INTEGER PRIMARY KEY AUTOINCREMENT,
        group_id    INTEGER NOT NULL REFERENCES groups(group_id) ON DELETE CASCADE,
        user_id     INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
        role        TEXT NOT NULL DEFAULT 'member' CHECK(role IN ('admin', 'member')),
        joined_at   TEXT NOT NULL DEFAULT (datetime('now')),
        invited_by  INTEGER REFERENCES users(user_id),
        UNIQUE(group_id, user_id)
    );

    CREATE TABLE group_invites (
        invite_id       INTEGER PRIMARY KEY AUTOINCREMENT,
        group_id        INTEGER NOT NULL REFERENCES groups(group_id) ON DELETE CASCADE,
        inviter_id      INTEGER NOT NULL REFERENCES users(user_id),
        invitee_id      INTEGER NOT NULL REFERENCES users(user_id),
        status          TEXT NOT NULL DEFAULT 'pending' CHECK(status IN ('pending', 'accepted', 'declined')),
        invited_at      TEXT NOT NULL DEFAULT (datetime('now')),
        responded_at    TEXT
    );

    -- At most one *pending* invite per (group, invitee); answered invites
    -- stay as history and do not block a re-invite.
    CREATE UNIQUE INDEX idx_invites_pending
        ON group_invites(group_id, invitee_id) WHERE status = 'pending';

    CREATE TABLE group_messages (
        message_id          INTEGER PRIMARY KEY AUTOINCREMENT,
        group_id            INTEGER NOT NULL REFERENCES groups(group_id) ON DELETE CASCADE,
        sender_id           INTEGER NOT NULL REFERENCES users(user_id),
        message_text        TEXT NOT NULL,
        image_path          TEXT,
        sent_at             TEXT NOT NULL DEFAULT (datetime('now')),
        is_edited           INTEGER NOT NULL DEFAULT 0,
        edited_at           TEXT,
        forwarded_from_id   INTEGER
    );

    CREATE INDEX idx_group_messages_group
        ON group_messages(group_id, sent_at);

    CREATE TABLE friend_requests (
        request_id      INTEGER PRIMARY KEY AUTOINCREMENT,
        requester_id    INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
        recipient_id    INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
        status          TEXT NOT NULL DEFAULT 'pending' CHECK(status IN ('pending', 'accepted', 'declined')),
        requested_at    TEXT NOT NULL DEFAULT (datetime('now')),
        responded_at    TEXT
    );

    CREATE UNIQUE INDEX idx_requests_pending
        ON friend_requests(requester_id, recipient_id) WHERE status = 'pending';

    -- Canonicalized pair: user1_id < user2_id always.
    CREATE TABLE friendships (
        friendship_id   INTEGER PRIMARY KEY AUTOINCREMENT,
        user1_id        INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
        user2_id        INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
        created_at      TEXT NOT NULL DEFAULT (datetime('now')),
        UNIQUE(user1_id, user2_id)
    );

    CREATE TABLE blocked_users (
        block_id    INTEGER PRIMARY KEY AUTOINCREMENT,
        blocker_id  INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
        blocked_id  INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
        blocked_at  TEXT NOT NULL DEFAULT (datetime('now')),
        UNIQUE(blocker_id, blocked_id)
    );

    -- Canonicalized pair, like friendships. Dates are YYYY-MM-DD text.
    CREATE TABLE streaks (
        streak_id                   INTEGER PRIMARY KEY AUTOINCREMENT,
        user1_id                    INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
        user2_id                    INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
        streak_count                INTEGER NOT NULL DEFAULT 0,
        last_active_date            TEXT,
        user1_last_message_date     TEXT,
        user2_last_message_date     TEXT,
        UNIQUE(user1_id, user2_id)
    );

    -- message_id points into messages or group_messages depending on
    -- message_kind, so it carries no FK.
    CREATE TABLE message_reactions (
        reaction_id     INTEGER PRIMARY KEY AUTOINCREMENT,
        message_id      INTEGER NOT NULL,
        user_id         INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
        glyph           TEXT NOT NULL,
        message_kind    TEXT NOT NULL CHECK(message_kind IN ('direct', 'group')),
        created_at      TEXT NOT NULL DEFAULT (datetime('now')),
        UNIQUE(message_id, user_id, message_kind)
    );

    CREATE TABLE read_receipts (
        receipt_id      INTEGER PRIMARY KEY AUTOINCREMENT,
        message_id      INTEGER NOT NULL,
        user_id         INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
        message_kind    TEXT NOT NULL CHECK(message_kind IN ('direct', 'group')),
        read_at         TEXT NOT NULL DEFAULT (datetime('now')),
        UNIQUE(message_id, user_id, message_kind)
    );
    ",
];

/// Apply any migrations newer than the database's `user_version`.
pub fn run(conn: &mut Connection) -> StoreResult<()> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    for (idx, sql) in MIGRATIONS.iter().enumerate().skip(version as usize) {
        let target = (idx + 1) as i64;
        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", target)?;
        tx.commit()?;
        info!("Applied schema migration v{target}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_apply_once_and_are_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        run(&mut conn).unwrap();

        let version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0)).unwrap();
        assert_eq!(version, MIGRATIONS.len() as i64);

        // Running again must be a no-op, not a re-apply.
        run(&mut conn).unwrap();
        let again: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0)).unwrap();
        assert_eq!(again, version);
    }
}
