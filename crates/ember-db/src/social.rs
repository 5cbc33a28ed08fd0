//! Social graph: friend requests, friendships, blocks.

use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use ember_types::error::{StoreError, StoreResult};

use crate::models::{BlockedUserRow, PendingRequestRow, UserRow};
use crate::streaks::canonical_pair;
use crate::users::query_user_by_username;
use crate::Database;

impl Database {
    /// Send a friend request, addressed by username the way the client does.
    pub fn send_friend_request(
        &self,
        requester_id: i64,
        recipient_username: &str,
    ) -> StoreResult<i64> {
        self.with_conn(|conn| {
            let recipient = query_user_by_username(conn, recipient_username)?
                .ok_or(StoreError::NotFound("user"))?;

            if recipient.user_id == requester_id {
                return Err(StoreError::SelfTarget);
            }
            if are_friends(conn, requester_id, recipient.user_id)? {
                return Err(StoreError::AlreadyFriends);
            }

            // A pending request in either direction counts as a duplicate.
            let pending: Option<i64> = conn
                .query_row(
                    "SELECT request_id FROM friend_requests
                     WHERE ((requester_id = ?1 AND recipient_id = ?2)
                         OR (requester_id = ?2 AND recipient_id = ?1))
                       AND status = 'pending'",
                    [requester_id, recipient.user_id],
                    |row| row.get(0),
                )
                .optional()?;
            if pending.is_some() {
                return Err(StoreError::DuplicateRequest);
            }

            conn.execute(
                "INSERT INTO friend_requests (requester_id, recipient_id) VALUES (?1, ?2)",
                [requester_id, recipient.user_id],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Pending requests received by a user, newest first.
    pub fn pending_friend_requests(&self, user_id: i64) -> StoreResult<Vec<PendingRequestRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT fr.request_id, fr.requester_id, u.username, u.display_name, fr.requested_at
                 FROM friend_requests fr
                 JOIN users u ON fr.requester_id = u.user_id
                 WHERE fr.recipient_id = ?1 AND fr.status = 'pending'
                 ORDER BY fr.requested_at DESC, fr.request_id DESC",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(PendingRequestRow {
                        request_id: row.get(0)?,
                        requester_id: row.get(1)?,
                        requester_username: row.get(2)?,
                        requester_display_name: row.get(3)?,
                        requested_at: row.get(4)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Accept or decline a pending request. Only the recipient may respond;
    /// accepting creates exactly one canonicalized friendship row.
    pub fn respond_to_friend_request(
        &self,
        request_id: i64,
        responder_id: i64,
        accept: bool,
    ) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let requester_id: i64 = tx
                .query_row(
                    "SELECT requester_id FROM friend_requests
                     WHERE request_id = ?1 AND recipient_id = ?2 AND status = 'pending'",
                    [request_id, responder_id],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or(StoreError::NotFound("friend request"))?;

            let status = if accept { "accepted" } else { "declined" };
            tx.execute(
                "UPDATE friend_requests
                 SET status = ?1, responded_at = datetime('now')
                 WHERE request_id = ?2",
                rusqlite::params![status, request_id],
            )?;

            if accept {
                let (user1_id, user2_id) = canonical_pair(requester_id, responder_id);
                tx.execute(
                    "INSERT INTO friendships (user1_id, user2_id) VALUES (?1, ?2)",
                    [user1_id, user2_id],
                )?;
            }

            tx.commit()?;
            Ok(())
        })
    }

    pub fn are_friends(&self, a: i64, b: i64) -> StoreResult<bool> {
        self.with_conn(|conn| are_friends(conn, a, b))
    }

    pub fn list_friends(&self, user_id: i64) -> StoreResult<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.user_id, u.username, u.password_hash, u.display_name,
                        u.date_of_birth, u.country, u.bio, u.created_at
                 FROM friendships f
                 JOIN users u ON u.user_id = CASE
                     WHEN f.user1_id = ?1 THEN f.user2_id
                     ELSE f.user1_id
                 END
                 WHERE f.user1_id = ?1 OR f.user2_id = ?1
                 ORDER BY u.username",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
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
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn remove_friendship(&self, a: i64, b: i64) -> StoreResult<()> {
        self.with_conn(|conn| {
            let (user1_id, user2_id) = canonical_pair(a, b);
            let n = conn.execute(
                "DELETE FROM friendships WHERE user1_id = ?1 AND user2_id = ?2",
                [user1_id, user2_id],
            )?;
            if n == 0 {
                return Err(StoreError::NotFound("friendship"));
            }
            Ok(())
        })
    }

    /// Block a user. In one transaction: drop any friendship, delete every
    /// direct message between the pair (with their reactions and read
    /// receipts), then insert the block row. All-or-nothing, so a crash can
    /// never leave "blocked but still friends" state behind.
    pub fn block_user(&self, blocker_id: i64, blocked_username: &str) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let blocked = query_user_by_username(&tx, blocked_username)?
                .ok_or(StoreError::NotFound("user"))?;
            let blocked_id = blocked.user_id;

            if blocked_id == blocker_id {
                return Err(StoreError::SelfTarget);
            }

            let existing: Option<i64> = tx
                .query_row(
                    "SELECT block_id FROM blocked_users
                     WHERE blocker_id = ?1 AND blocked_id = ?2",
                    [blocker_id, blocked_id],
                    |row| row.get(0),
                )
                .optional()?;
            if existing.is_some() {
                return Err(StoreError::AlreadyBlocked);
            }

            let (user1_id, user2_id) = canonical_pair(blocker_id, blocked_id);
            tx.execute(
                "DELETE FROM friendships WHERE user1_id = ?1 AND user2_id = ?2",
                [user1_id, user2_id],
            )?;

            // Reactions and receipts first, while the message rows still
            // exist to select against.
            tx.execute(
                "DELETE FROM message_reactions
                 WHERE message_kind = 'direct' AND message_id IN (
                     SELECT message_id FROM messages
                     WHERE (sender_id = ?1 AND receiver_id = ?2)
                        OR (sender_id = ?2 AND receiver_id = ?1))",
                [blocker_id, blocked_id],
            )?;
            tx.execute(
                "DELETE FROM read_receipts
                 WHERE message_kind = 'direct' AND message_id IN (
                     SELECT message_id FROM messages
                     WHERE (sender_id = ?1 AND receiver_id = ?2)
                        OR (sender_id = ?2 AND receiver_id = ?1))",
                [blocker_id, blocked_id],
            )?;
            let removed = tx.execute(
                "DELETE FROM messages
                 WHERE (sender_id = ?1 AND receiver_id = ?2)
                    OR (sender_id = ?2 AND receiver_id = ?1)",
                [blocker_id, blocked_id],
            )?;

            tx.execute(
                "INSERT INTO blocked_users (blocker_id, blocked_id) VALUES (?1, ?2)",
                [blocker_id, blocked_id],
            )?;

            tx.commit()?;
            debug!(blocker_id, blocked_id, removed, "user blocked");
            Ok(())
        })
    }

    pub fn unblock_user(&self, blocker_id: i64, blocked_id: i64) -> StoreResult<()> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM blocked_users WHERE blocker_id = ?1 AND blocked_id = ?2",
                [blocker_id, blocked_id],
            )?;
            if n == 0 {
                return Err(StoreError::NotFound("block"));
            }
            Ok(())
        })
    }

    /// True when either side has blocked the other.
    pub fn is_blocked(&self, a: i64, b: i64) -> StoreResult<bool> {
        self.with_conn(|conn| is_blocked(conn, a, b))
    }

    /// Users blocked by `user_id`, most recent first.
    pub fn blocked_users(&self, user_id: i64) -> StoreResult<Vec<BlockedUserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.user_id, u.username, u.display_name, bu.blocked_at
                 FROM blocked_users bu
                 JOIN users u ON bu.blocked_id = u.user_id
                 WHERE bu.blocker_id = ?1
                 ORDER BY bu.blocked_at DESC, bu.block_id DESC",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(BlockedUserRow {
                        user_id: row.get(0)?,
                        username: row.get(1)?,
                        display_name: row.get(2)?,
                        blocked_at: row.get(3)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

pub(crate) fn are_friends(conn: &Connection, a: i64, b: i64) -> StoreResult<bool> {
    let (user1_id, user2_id) = canonical_pair(a, b);
    let row: Option<i64> = conn
        .query_row(
            "SELECT friendship_id FROM friendships WHERE user1_id = ?1 AND user2_id = ?2",
            [user1_id, user2_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(row.is_some())
}

pub(crate) fn is_blocked(conn: &Connection, a: i64, b: i64) -> StoreResult<bool> {
    let row: Option<i64> = conn
        .query_row(
            "SELECT block_id FROM blocked_users
             WHERE (blocker_id = ?1 AND blocked_id = ?2)
                OR (blocker_id = ?2 AND blocked_id = ?1)",
            [a, b],
            |row| row.get(0),
        )
        .optional()?;
    Ok(row.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{befriend, register, test_db};

    #[test]
    fn accepted_request_creates_symmetric_friendship() {
        let db = test_db();
        let a = register(&db, "ana");
        let b = register(&db, "ben");

        db.send_friend_request(a, "ben").unwrap();
        let reqs = db.pending_friend_requests(b).unwrap();
        assert_eq!(reqs.len(), 1);

        db.respond_to_friend_request(reqs[0].request_id, b, true).unwrap();

        assert!(db.are_friends(a, b).unwrap());
        assert!(db.are_friends(b, a).unwrap());

        // Exactly one row for the unordered pair.
        let count: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM friendships", [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn declined_request_creates_no_friendship() {
        let db = test_db();
        let a = register(&db, "ana");
        let b = register(&db, "ben");

        db.send_friend_request(a, "ben").unwrap();
        let req = db.pending_friend_requests(b).unwrap().remove(0);
        db.respond_to_friend_request(req.request_id, b, false).unwrap();

        assert!(!db.are_friends(a, b).unwrap());
        assert!(db.pending_friend_requests(b).unwrap().is_empty());
    }

    #[test]
    fn duplicate_and_reverse_pending_requests_rejected() {
        let db = test_db();
        let a = register(&db, "ana");
        let b = register(&db, "ben");

        db.send_friend_request(a, "ben").unwrap();
        assert!(matches!(
            db.send_friend_request(a, "ben").unwrap_err(),
            StoreError::DuplicateRequest
        ));
        assert!(matches!(
            db.send_friend_request(b, "ana").unwrap_err(),
            StoreError::DuplicateRequest
        ));
    }

    #[test]
    fn self_request_rejected() {
        let db = test_db();
        let a = register(&db, "ana");
        assert!(matches!(
            db.send_friend_request(a, "ana").unwrap_err(),
            StoreError::SelfTarget
        ));
    }

    #[test]
    fn only_recipient_can_respond() {
        let db = test_db();
        let a = register(&db, "ana");
        register(&db, "ben");

        let req_id = db.send_friend_request(a, "ben").unwrap();
        // The requester answering their own request is a not-found.
        assert!(matches!(
            db.respond_to_friend_request(req_id, a, true).unwrap_err(),
            StoreError::NotFound(_)
        ));
    }

    #[test]
    fn block_drops_friendship_and_messages_atomically() {
        let db = test_db();
        let a = register(&db, "ana");
        let b = register(&db, "ben");
        befriend(&db, a, b);

        db.send_direct_message(a, b, "hello", None).unwrap();
        let (mid, _) = db.send_direct_message(b, a, "hi back", None).unwrap();
        db.add_reaction(mid, a, "❤️", ember_types::MessageKind::Direct).unwrap();

        db.block_user(a, "ben").unwrap();

        assert!(!db.are_friends(a, b).unwrap());
        assert!(db.is_blocked(a, b).unwrap());
        assert!(db.is_blocked(b, a).unwrap());
        assert!(db.conversation(a, b).unwrap().is_empty());
        assert!(db
            .reactions(mid, ember_types::MessageKind::Direct)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn unblock_restores_nothing_but_the_ability_to_refriend() {
        let db = test_db();
        let a = register(&db, "ana");
        let b = register(&db, "ben");
        befriend(&db, a, b);

        db.block_user(a, "ben").unwrap();
        db.unblock_user(a, b).unwrap();

        assert!(!db.is_blocked(a, b).unwrap());
        assert!(!db.are_friends(a, b).unwrap());

        // Friendship can be rebuilt through a fresh request.
        befriend(&db, a, b);
        assert!(db.are_friends(a, b).unwrap());
    }

    #[test]
    fn friends_list_is_sorted_by_username() {
        let db = test_db();
        let me = register(&db, "me");
        let zoe = register(&db, "zoe");
        let abe = register(&db, "abe");
        befriend(&db, me, zoe);
        befriend(&db, me, abe);

        let names: Vec<String> = db
            .list_friends(me)
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["abe", "zoe"]);
    }
}
