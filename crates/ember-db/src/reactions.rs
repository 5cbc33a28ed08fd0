//! Reactions and read receipts. Both are upserts keyed by
//! (message, user, kind), so repeats replace rather than accumulate.

use rusqlite::OptionalExtension;

use ember_types::error::StoreResult;
use ember_types::MessageKind;

use crate::models::ReactionRow;
use crate::Database;

impl Database {
    /// Add or replace the user's reaction on a message.
    pub fn add_reaction(
        &self,
        message_id: i64,
        user_id: i64,
        glyph: &str,
        kind: MessageKind,
    ) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO message_reactions (message_id, user_id, glyph, message_kind)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(message_id, user_id, message_kind)
                 DO UPDATE SET glyph = excluded.glyph, created_at = datetime('now')",
                rusqlite::params![message_id, user_id, glyph, kind.as_str()],
            )?;
            Ok(())
        })
    }

    pub fn remove_reaction(
        &self,
        message_id: i64,
        user_id: i64,
        kind: MessageKind,
    ) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM message_reactions
                 WHERE message_id = ?1 AND user_id = ?2 AND message_kind = ?3",
                rusqlite::params![message_id, user_id, kind.as_str()],
            )?;
            Ok(())
        })
    }

    /// All reactions on a message, with reactor identity.
    pub fn reactions(&self, message_id: i64, kind: MessageKind) -> StoreResult<Vec<ReactionRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT mr.user_id, u.username, mr.glyph, mr.created_at
                 FROM message_reactions mr
                 JOIN users u ON mr.user_id = u.user_id
                 WHERE mr.message_id = ?1 AND mr.message_kind = ?2
                 ORDER BY mr.created_at ASC, mr.reaction_id ASC",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![message_id, kind.as_str()], |row| {
                    Ok(ReactionRow {
                        user_id: row.get(0)?,
                        username: row.get(1)?,
                        glyph: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Record that a user has read a message. Idempotent; re-reading
    /// refreshes the timestamp.
    pub fn mark_read(&self, message_id: i64, user_id: i64, kind: MessageKind) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO read_receipts (message_id, user_id, message_kind)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(message_id, user_id, message_kind)
                 DO UPDATE SET read_at = datetime('now')",
                rusqlite::params![message_id, user_id, kind.as_str()],
            )?;
            Ok(())
        })
    }

    /// Mark every direct message the reader received from `peer_id` as read.
    /// The client calls this at render time; receipts on the reader's own
    /// sent messages are what the peer checks for check marks.
    pub fn mark_conversation_read(&self, reader_id: i64, peer_id: i64) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO read_receipts (message_id, user_id, message_kind)
                 SELECT message_id, ?1, 'direct' FROM messages
                 WHERE sender_id = ?2 AND receiver_id = ?1
                 ON CONFLICT(message_id, user_id, message_kind)
                 DO UPDATE SET read_at = datetime('now')",
                [reader_id, peer_id],
            )?;
            Ok(())
        })
    }

    pub fn is_read(&self, message_id: i64, user_id: i64, kind: MessageKind) -> StoreResult<bool> {
        self.with_conn(|conn| {
            let row: Option<i64> = conn
                .query_row(
                    "SELECT receipt_id FROM read_receipts
                     WHERE message_id = ?1 AND user_id = ?2 AND message_kind = ?3",
                    rusqlite::params![message_id, user_id, kind.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(row.is_some())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{befriend, register, test_db};

    #[test]
    fn reaction_upsert_keeps_latest_glyph_only() {
        let db = test_db();
        let a = register(&db, "ana");
        let b = register(&db, "ben");
        befriend(&db, a, b);
        let (mid, _) = db.send_direct_message(a, b, "news!", None).unwrap();

        db.add_reaction(mid, b, "👍", MessageKind::Direct).unwrap();
        db.add_reaction(mid, b, "🎉", MessageKind::Direct).unwrap();

        let reactions = db.reactions(mid, MessageKind::Direct).unwrap();
        assert_eq!(reactions.len(), 1);
        assert_eq!(reactions[0].glyph, "🎉");
        assert_eq!(reactions[0].user_id, b);
    }

    #[test]
    fn direct_and_group_reactions_with_same_id_do_not_collide() {
        let db = test_db();
        let a = register(&db, "ana");
        let b = register(&db, "ben");
        befriend(&db, a, b);
        let group = db.create_group("club", None, None, a).unwrap();

        // Both tables start their ids at 1, so the first direct and first
        // group message share an id; the kind keeps their reactions apart.
        let (dm, _) = db.send_direct_message(a, b, "dm", None).unwrap();
        let gm = db.send_group_message(group, a, "gm", None).unwrap();
        assert_eq!(dm, gm);

        db.add_reaction(dm, a, "👍", MessageKind::Direct).unwrap();
        db.add_reaction(gm, a, "🎉", MessageKind::Group).unwrap();

        assert_eq!(db.reactions(dm, MessageKind::Direct).unwrap()[0].glyph, "👍");
        assert_eq!(db.reactions(gm, MessageKind::Group).unwrap()[0].glyph, "🎉");
    }

    #[test]
    fn remove_reaction_clears_the_row() {
        let db = test_db();
        let a = register(&db, "ana");
        let b = register(&db, "ben");
        befriend(&db, a, b);
        let (mid, _) = db.send_direct_message(a, b, "hm", None).unwrap();

        db.add_reaction(mid, b, "👀", MessageKind::Direct).unwrap();
        db.remove_reaction(mid, b, MessageKind::Direct).unwrap();
        assert!(db.reactions(mid, MessageKind::Direct).unwrap().is_empty());
    }

    #[test]
    fn read_receipts_are_idempotent() {
        let db = test_db();
        let a = register(&db, "ana");
        let b = register(&db, "ben");
        befriend(&db, a, b);
        let (mid, _) = db.send_direct_message(a, b, "seen?", None).unwrap();

        assert!(!db.is_read(mid, b, MessageKind::Direct).unwrap());
        db.mark_read(mid, b, MessageKind::Direct).unwrap();
        db.mark_read(mid, b, MessageKind::Direct).unwrap();
        assert!(db.is_read(mid, b, MessageKind::Direct).unwrap());
    }

    #[test]
    fn mark_conversation_read_covers_only_inbound_messages() {
        let db = test_db();
        let a = register(&db, "ana");
        let b = register(&db, "ben");
        befriend(&db, a, b);

        let (from_b, _) = db.send_direct_message(b, a, "one", None).unwrap();
        let (from_a, _) = db.send_direct_message(a, b, "two", None).unwrap();

        db.mark_conversation_read(a, b).unwrap();

        assert!(db.is_read(from_b, a, MessageKind::Direct).unwrap());
        // a's own sent message is for b to mark.
        assert!(!db.is_read(from_a, b, MessageKind::Direct).unwrap());
    }
}
