//! Direct and group messaging: send, history, edit, delete, forward, search.

use chrono::{Local, NaiveDate};
use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use ember_types::error::{StoreError, StoreResult};
use ember_types::{GroupRole, MessageKind};

use crate::groups::member_role;
use crate::models::MessageRow;
use crate::social::{are_friends, is_blocked};
use crate::{streaks, Database};

impl Database {
    /// Send a direct message. Rejects if either side blocks the other or the
    /// pair is not friends. The insert and the streak update share one
    /// transaction; returns the message id and the resulting streak count.
    pub fn send_direct_message(
        &self,
        sender_id: i64,
        receiver_id: i64,
        text: &str,
        image_path: Option<&str>,
    ) -> StoreResult<(i64, u32)> {
        self.send_direct_message_on(sender_id, receiver_id, text, image_path, Local::now().date_naive())
    }

    /// Date-parameterized variant of [`Self::send_direct_message`]; the streak
    /// engine is evaluated at `today`. Tests drive multi-day scenarios with it.
    pub fn send_direct_message_on(
        &self,
        sender_id: i64,
        receiver_id: i64,
        text: &str,
        image_path: Option<&str>,
        today: NaiveDate,
    ) -> StoreResult<(i64, u32)> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let sent = direct_send(&tx, sender_id, receiver_id, text, image_path, None, today)?;
            tx.commit()?;
            Ok(sent)
        })
    }

    /// Full conversation between two users, oldest first.
    pub fn conversation(&self, a: i64, b: i64) -> StoreResult<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DIRECT_COLUMNS}
                 FROM messages m
                 JOIN users u ON m.sender_id = u.user_id
                 WHERE (m.sender_id = ?1 AND m.receiver_id = ?2)
                    OR (m.sender_id = ?2 AND m.receiver_id = ?1)
                 ORDER BY m.sent_at ASC, m.message_id ASC"
            ))?;
            let rows = stmt
                .query_map([a, b], map_message_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Send to a group; rejected unless the sender is a member.
    pub fn send_group_message(
        &self,
        group_id: i64,
        sender_id: i64,
        text: &str,
        image_path: Option<&str>,
    ) -> StoreResult<i64> {
        self.with_conn(|conn| group_send(conn, group_id, sender_id, text, image_path, None))
    }

    /// Group history, oldest first. Membership-gated.
    pub fn group_messages(&self, group_id: i64, user_id: i64) -> StoreResult<Vec<MessageRow>> {
        self.with_conn(|conn| {
            if member_role(conn, group_id, user_id)?.is_none() {
                return Err(StoreError::NotMember);
            }

            let mut stmt = conn.prepare(&format!(
                "SELECT {GROUP_COLUMNS}
                 FROM group_messages m
                 JOIN users u ON m.sender_id = u.user_id
                 WHERE m.group_id = ?1
                 ORDER BY m.sent_at ASC, m.message_id ASC"
            ))?;
            let rows = stmt
                .query_map([group_id], map_message_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Destructive in-place edit, restricted to the original sender: replaces
    /// the text, flips the edited flag, stamps `edited_at`. The send timestamp
    /// is untouched and no revision history is kept.
    pub fn edit_message(
        &self,
        message_id: i64,
        editor_id: i64,
        new_text: &str,
        kind: MessageKind,
    ) -> StoreResult<()> {
        self.with_conn(|conn| {
            require_sender(conn, message_id, editor_id, kind)?;
            conn.execute(
                &format!(
                    "UPDATE {} SET message_text = ?1, is_edited = 1, edited_at = datetime('now')
                     WHERE message_id = ?2",
                    kind.table()
                ),
                rusqlite::params![new_text, message_id],
            )?;
            Ok(())
        })
    }

    /// Hard delete, restricted to the original sender: removes the row and
    /// cascades to its reactions and read receipts in one transaction.
    pub fn delete_message(
        &self,
        message_id: i64,
        actor_id: i64,
        kind: MessageKind,
    ) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            require_sender(&tx, message_id, actor_id, kind)?;
            tx.execute(
                &format!("DELETE FROM {} WHERE message_id = ?1", kind.table()),
                [message_id],
            )?;

            tx.execute(
                "DELETE FROM message_reactions WHERE message_id = ?1 AND message_kind = ?2",
                rusqlite::params![message_id, kind.as_str()],
            )?;
            tx.execute(
                "DELETE FROM read_receipts WHERE message_id = ?1 AND message_kind = ?2",
                rusqlite::params![message_id, kind.as_str()],
            )?;

            tx.commit()?;
            debug!(message_id, kind = kind.as_str(), "message deleted");
            Ok(())
        })
    }

    /// Forward a message into another conversation or group. Same permission
    /// checks as a fresh send; the copy gets a "Forwarded: " prefix and a weak
    /// back-reference to the original id.
    pub fn forward_message(
        &self,
        message_id: i64,
        sender_id: i64,
        destination_id: i64,
        source_kind: MessageKind,
        destination_kind: MessageKind,
    ) -> StoreResult<i64> {
        self.forward_message_on(
            message_id,
            sender_id,
            destination_id,
            source_kind,
            destination_kind,
            Local::now().date_naive(),
        )
    }

    pub fn forward_message_on(
        &self,
        message_id: i64,
        sender_id: i64,
        destination_id: i64,
        source_kind: MessageKind,
        destination_kind: MessageKind,
        today: NaiveDate,
    ) -> StoreResult<i64> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let original: Option<(String, Option<String>)> = tx
                .query_row(
                    &format!(
                        "SELECT message_text, image_path FROM {} WHERE message_id = ?1",
                        source_kind.table()
                    ),
                    [message_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let (text, image_path) = original.ok_or(StoreError::NotFound("message"))?;

            let forwarded_text = format!("Forwarded: {text}");
            let new_id = match destination_kind {
                MessageKind::Direct => {
                    let (id, _streak) = direct_send(
                        &tx,
                        sender_id,
                        destination_id,
                        &forwarded_text,
                        image_path.as_deref(),
                        Some(message_id),
                        today,
                    )?;
                    id
                }
                MessageKind::Group => group_send(
                    &tx,
                    destination_id,
                    sender_id,
                    &forwarded_text,
                    image_path.as_deref(),
                    Some(message_id),
                )?,
            };

            tx.commit()?;
            Ok(new_id)
        })
    }

    /// Case-insensitive substring search in one direct conversation,
    /// newest first.
    pub fn search_conversation(
        &self,
        user_id: i64,
        peer_id: i64,
        query: &str,
    ) -> StoreResult<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DIRECT_COLUMNS}
                 FROM messages m
                 JOIN users u ON m.sender_id = u.user_id
                 WHERE ((m.sender_id = ?1 AND m.receiver_id = ?2)
                     OR (m.sender_id = ?2 AND m.receiver_id = ?1))
                   AND m.message_text LIKE ?3 ESCAPE '\\'
                 ORDER BY m.sent_at DESC, m.message_id DESC"
            ))?;
            let rows = stmt
                .query_map(
                    rusqlite::params![user_id, peer_id, like_pattern(query)],
                    map_message_row,
                )?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Case-insensitive substring search in one group, newest first.
    /// Membership-gated like the history read.
    pub fn search_group_messages(
        &self,
        group_id: i64,
        user_id: i64,
        query: &str,
    ) -> StoreResult<Vec<MessageRow>> {
        self.with_conn(|conn| {
            if member_role(conn, group_id, user_id)?.is_none() {
                return Err(StoreError::NotMember);
            }

            let mut stmt = conn.prepare(&format!(
                "SELECT {GROUP_COLUMNS}
                 FROM group_messages m
                 JOIN users u ON m.sender_id = u.user_id
                 WHERE m.group_id = ?1 AND m.message_text LIKE ?2 ESCAPE '\\'
                 ORDER BY m.sent_at DESC, m.message_id DESC"
            ))?;
            let rows = stmt
                .query_map(rusqlite::params![group_id, like_pattern(query)], map_message_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Delete every direct message between two users, cascading reactions and
    /// receipts the way a single delete does.
    pub fn clear_conversation(&self, a: i64, b: i64) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM message_reactions
                 WHERE message_kind = 'direct' AND message_id IN (
                     SELECT message_id FROM messages
                     WHERE (sender_id = ?1 AND receiver_id = ?2)
                        OR (sender_id = ?2 AND receiver_id = ?1))",
                [a, b],
            )?;
            tx.execute(
                "DELETE FROM read_receipts
                 WHERE message_kind = 'direct' AND message_id IN (
                     SELECT message_id FROM messages
                     WHERE (sender_id = ?1 AND receiver_id = ?2)
                        OR (sender_id = ?2 AND receiver_id = ?1))",
                [a, b],
            )?;
            tx.execute(
                "DELETE FROM messages
                 WHERE (sender_id = ?1 AND receiver_id = ?2)
                    OR (sender_id = ?2 AND receiver_id = ?1)",
                [a, b],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Wipe a group's history. Admin-only, like removing members.
    pub fn clear_group_chat(&self, group_id: i64, user_id: i64) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            match member_role(&tx, group_id, user_id)? {
                Some(GroupRole::Admin) => {}
                Some(GroupRole::Member) => return Err(StoreError::PermissionDenied),
                None => return Err(StoreError::NotMember),
            }
            tx.execute(
                "DELETE FROM message_reactions
                 WHERE message_kind = 'group' AND message_id IN (
                     SELECT message_id FROM group_messages WHERE group_id = ?1)",
                [group_id],
            )?;
            tx.execute(
                "DELETE FROM read_receipts
                 WHERE message_kind = 'group' AND message_id IN (
                     SELECT message_id FROM group_messages WHERE group_id = ?1)",
                [group_id],
            )?;
            tx.execute("DELETE FROM group_messages WHERE group_id = ?1", [group_id])?;
            tx.commit()?;
            Ok(())
        })
    }
}

/// Reject unless `user_id` sent the message; unknown ids are NotFound.
fn require_sender(
    conn: &Connection,
    message_id: i64,
    user_id: i64,
    kind: MessageKind,
) -> StoreResult<()> {
    let sender: Option<i64> = conn
        .query_row(
            &format!("SELECT sender_id FROM {} WHERE message_id = ?1", kind.table()),
            [message_id],
            |row| row.get(0),
        )
        .optional()?;
    match sender {
        None => Err(StoreError::NotFound("message")),
        Some(s) if s != user_id => Err(StoreError::PermissionDenied),
        Some(_) => Ok(()),
    }
}

/// Insert a direct message and advance the streak, on the caller's
/// connection so everything shares one transaction.
fn direct_send(
    conn: &Connection,
    sender_id: i64,
    receiver_id: i64,
    text: &str,
    image_path: Option<&str>,
    forwarded_from: Option<i64>,
    today: NaiveDate,
) -> StoreResult<(i64, u32)> {
    if is_blocked(conn, sender_id, receiver_id)? {
        return Err(StoreError::Blocked);
    }
    if !are_friends(conn, sender_id, receiver_id)? {
        return Err(StoreError::NotFriends);
    }

    conn.execute(
        "INSERT INTO messages (sender_id, receiver_id, message_text, image_path, forwarded_from_id)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![sender_id, receiver_id, text, image_path, forwarded_from],
    )?;
    let message_id = conn.last_insert_rowid();

    let streak = streaks::update_streak(conn, sender_id, receiver_id, today)?;
    Ok((message_id, streak))
}

fn group_send(
    conn: &Connection,
    group_id: i64,
    sender_id: i64,
    text: &str,
    image_path: Option<&str>,
    forwarded_from: Option<i64>,
) -> StoreResult<i64> {
    if member_role(conn, group_id, sender_id)?.is_none() {
        return Err(StoreError::NotMember);
    }

    conn.execute(
        "INSERT INTO group_messages (group_id, sender_id, message_text, image_path, forwarded_from_id)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![group_id, sender_id, text, image_path, forwarded_from],
    )?;
    Ok(conn.last_insert_rowid())
}

const DIRECT_COLUMNS: &str = "m.message_id, m.sender_id, COALESCE(u.display_name, u.username), \
     m.message_text, m.image_path, m.sent_at, m.is_edited, m.edited_at, m.forwarded_from_id";

// Same shape as DIRECT_COLUMNS; kept separate so the two queries stay
// independently greppable.
const GROUP_COLUMNS: &str = "m.message_id, m.sender_id, COALESCE(u.display_name, u.username), \
     m.message_text, m.image_path, m.sent_at, m.is_edited, m.edited_at, m.forwarded_from_id";

fn map_message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        message_id: row.get(0)?,
        sender_id: row.get(1)?,
        sender_name: row.get(2)?,
        text: row.get(3)?,
        image_path: row.get(4)?,
        sent_at: row.get(5)?,
        is_edited: row.get(6)?,
        edited_at: row.get(7)?,
        forwarded_from_id: row.get(8)?,
    })
}

/// `%substring%` with LIKE wildcards in the user's query escaped.
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{befriend, register, test_db};
    use chrono::NaiveDate;

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, n).unwrap()
    }

    #[test]
    fn send_between_non_friends_fails_and_writes_nothing() {
        let db = test_db();
        let a = register(&db, "ana");
        let b = register(&db, "ben");

        let err = db.send_direct_message(a, b, "hi", None).unwrap_err();
        assert!(matches!(err, StoreError::NotFriends));
        assert!(db.conversation(a, b).unwrap().is_empty());
        assert!(db.streak(a, b).unwrap().is_none());
    }

    #[test]
    fn send_to_blocked_user_fails() {
        let db = test_db();
        let a = register(&db, "ana");
        let b = register(&db, "ben");
        befriend(&db, a, b);
        db.block_user(b, "ana").unwrap();

        let err = db.send_direct_message(a, b, "hi", None).unwrap_err();
        assert!(matches!(err, StoreError::Blocked));
    }

    #[test]
    fn streak_scenario_from_first_message_to_reset() {
        let db = test_db();
        let x = register(&db, "xan");
        let y = register(&db, "yas");
        befriend(&db, x, y);

        // Day 1: X creates the streak state, count 0.
        let (_, s) = db.send_direct_message_on(x, y, "hi", None, day(1)).unwrap();
        assert_eq!(s, 0);
        // Day 1: Y replies; first mutual day is baseline only.
        let (_, s) = db.send_direct_message_on(y, x, "hey", None, day(1)).unwrap();
        assert_eq!(s, 0);

        // Day 2: only X so far, nothing scores.
        let (_, s) = db.send_direct_message_on(x, y, "morning", None, day(2)).unwrap();
        assert_eq!(s, 0);
        // Day 2: Y completes the day, one-day step increments.
        let (_, s) = db.send_direct_message_on(y, x, "morning!", None, day(2)).unwrap();
        assert_eq!(s, 1);

        // Day 4, day 3 skipped: gap of 2 resets.
        let (_, s) = db.send_direct_message_on(x, y, "back", None, day(4)).unwrap();
        assert_eq!(s, 0);

        let row = db.streak(x, y).unwrap().unwrap();
        assert_eq!(row.streak_count, 0);
        assert_eq!(row.last_active_date, Some(day(4)));
    }

    #[test]
    fn edit_changes_only_text_and_flags() {
        let db = test_db();
        let a = register(&db, "ana");
        let b = register(&db, "ben");
        befriend(&db, a, b);

        let (mid, _) = db.send_direct_message(a, b, "typo'd", None).unwrap();
        let before = db.conversation(a, b).unwrap().remove(0);

        db.edit_message(mid, a, "fixed", MessageKind::Direct).unwrap();
        let after = db.conversation(a, b).unwrap().remove(0);

        assert_eq!(after.text, "fixed");
        assert!(after.is_edited);
        assert!(after.edited_at.is_some());
        assert_eq!(after.sent_at, before.sent_at);
    }

    #[test]
    fn delete_cascades_reactions_and_receipts() {
        let db = test_db();
        let a = register(&db, "ana");
        let b = register(&db, "ben");
        befriend(&db, a, b);

        let (mid, _) = db.send_direct_message(a, b, "ephemeral", None).unwrap();
        db.add_reaction(mid, b, "🔥", MessageKind::Direct).unwrap();
        db.mark_read(mid, b, MessageKind::Direct).unwrap();

        db.delete_message(mid, a, MessageKind::Direct).unwrap();

        assert!(db.conversation(a, b).unwrap().is_empty());
        assert!(db.reactions(mid, MessageKind::Direct).unwrap().is_empty());
        assert!(!db.is_read(mid, b, MessageKind::Direct).unwrap());

        assert!(matches!(
            db.delete_message(mid, a, MessageKind::Direct).unwrap_err(),
            StoreError::NotFound("message")
        ));
    }

    #[test]
    fn forward_to_friend_prefixes_and_back_references() {
        let db = test_db();
        let a = register(&db, "ana");
        let b = register(&db, "ben");
        let c = register(&db, "cal");
        befriend(&db, a, b);
        befriend(&db, a, c);

        let (orig, _) = db.send_direct_message(b, a, "check this out", None).unwrap();
        let fwd = db
            .forward_message(orig, a, c, MessageKind::Direct, MessageKind::Direct)
            .unwrap();

        let msg = db.conversation(a, c).unwrap().remove(0);
        assert_eq!(msg.message_id, fwd);
        assert_eq!(msg.text, "Forwarded: check this out");
        assert_eq!(msg.forwarded_from_id, Some(orig));

        // The back-reference is weak: deleting the original leaves it dangling.
        db.delete_message(orig, b, MessageKind::Direct).unwrap();
        let msg = db.conversation(a, c).unwrap().remove(0);
        assert_eq!(msg.forwarded_from_id, Some(orig));
    }

    #[test]
    fn only_the_sender_may_edit_or_delete() {
        let db = test_db();
        let a = register(&db, "ana");
        let b = register(&db, "ben");
        let c = register(&db, "cal");
        befriend(&db, a, b);

        let (mid, _) = db.send_direct_message(a, b, "mine", None).unwrap();

        // Neither the receiver nor a third party may touch it.
        for intruder in [b, c] {
            assert!(matches!(
                db.edit_message(mid, intruder, "hijacked", MessageKind::Direct)
                    .unwrap_err(),
                StoreError::PermissionDenied
            ));
            assert!(matches!(
                db.delete_message(mid, intruder, MessageKind::Direct).unwrap_err(),
                StoreError::PermissionDenied
            ));
        }

        let msg = db.conversation(a, b).unwrap().remove(0);
        assert_eq!(msg.text, "mine");
        assert!(!msg.is_edited);
    }

    #[test]
    fn group_message_mutations_require_sender() {
        let db = test_db();
        let a = register(&db, "ana");
        let b = register(&db, "ben");
        let group = db.create_group("club", None, None, a).unwrap();
        db.invite_to_group(group, a, b).unwrap();
        let inv = db.pending_invites(b).unwrap().remove(0);
        db.respond_to_invite(inv.invite_id, b, true).unwrap();

        let mid = db.send_group_message(group, b, "from ben", None).unwrap();

        // Even the group admin may not rewrite another member's message.
        assert!(matches!(
            db.edit_message(mid, a, "rewritten", MessageKind::Group).unwrap_err(),
            StoreError::PermissionDenied
        ));
        assert!(matches!(
            db.delete_message(mid, a, MessageKind::Group).unwrap_err(),
            StoreError::PermissionDenied
        ));

        db.edit_message(mid, b, "from ben, fixed", MessageKind::Group).unwrap();
        db.delete_message(mid, b, MessageKind::Group).unwrap();
        assert!(db.group_messages(group, a).unwrap().is_empty());
    }

    #[test]
    fn clear_group_chat_is_admin_only() {
        let db = test_db();
        let a = register(&db, "ana");
        let b = register(&db, "ben");
        let c = register(&db, "cal");
        let group = db.create_group("club", None, None, a).unwrap();
        db.invite_to_group(group, a, b).unwrap();
        let inv = db.pending_invites(b).unwrap().remove(0);
        db.respond_to_invite(inv.invite_id, b, true).unwrap();

        db.send_group_message(group, b, "history", None).unwrap();

        assert!(matches!(
            db.clear_group_chat(group, b).unwrap_err(),
            StoreError::PermissionDenied
        ));
        assert!(matches!(
            db.clear_group_chat(group, c).unwrap_err(),
            StoreError::NotMember
        ));
        assert_eq!(db.group_messages(group, b).unwrap().len(), 1);

        db.clear_group_chat(group, a).unwrap();
        assert!(db.group_messages(group, b).unwrap().is_empty());
    }

    #[test]
    fn forward_to_non_friend_fails_and_writes_nothing() {
        let db = test_db();
        let a = register(&db, "ana");
        let b = register(&db, "ben");
        let c = register(&db, "cal");
        befriend(&db, a, b);

        let (orig, _) = db.send_direct_message(b, a, "psst", None).unwrap();
        let err = db
            .forward_message(orig, a, c, MessageKind::Direct, MessageKind::Direct)
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFriends));
        assert!(db.conversation(a, c).unwrap().is_empty());
        assert!(db.streak(a, c).unwrap().is_none());
    }

    #[test]
    fn forward_to_group_requires_membership() {
        let db = test_db();
        let a = register(&db, "ana");
        let b = register(&db, "ben");
        befriend(&db, a, b);
        let group = db.create_group("club", None, None, b).unwrap();

        let (orig, _) = db.send_direct_message(b, a, "psst", None).unwrap();
        let err = db
            .forward_message(orig, a, group, MessageKind::Direct, MessageKind::Group)
            .unwrap_err();
        assert!(matches!(err, StoreError::NotMember));
        assert!(db.group_messages(group, b).unwrap().is_empty());
    }

    #[test]
    fn search_is_case_insensitive_and_escapes_wildcards() {
        let db = test_db();
        let a = register(&db, "ana");
        let b = register(&db, "ben");
        befriend(&db, a, b);

        db.send_direct_message(a, b, "Budget is 100% done", None).unwrap();
        db.send_direct_message(b, a, "great news", None).unwrap();

        let hits = db.search_conversation(a, b, "budget").unwrap();
        assert_eq!(hits.len(), 1);

        // A literal % must not act as a wildcard.
        let hits = db.search_conversation(a, b, "100%").unwrap();
        assert_eq!(hits.len(), 1);
        let hits = db.search_conversation(a, b, "1%d").unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn clear_conversation_removes_both_directions() {
        let db = test_db();
        let a = register(&db, "ana");
        let b = register(&db, "ben");
        befriend(&db, a, b);

        db.send_direct_message(a, b, "one", None).unwrap();
        db.send_direct_message(b, a, "two", None).unwrap();
        db.clear_conversation(a, b).unwrap();

        assert!(db.conversation(a, b).unwrap().is_empty());
    }
}
