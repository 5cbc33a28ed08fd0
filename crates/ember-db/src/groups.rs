//! Groups, memberships, invites.

use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use ember_types::error::{StoreError, StoreResult};
use ember_types::GroupRole;

use crate::models::{GroupRow, InviteRow, MemberRow};
use crate::Database;

impl Database {
    /// Create a group; the creator becomes an admin member in the same
    /// transaction.
    pub fn create_group(
        &self,
        name: &str,
        description: Option<&str>,
        avatar: Option<&str>,
        creator_id: i64,
    ) -> StoreResult<i64> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO groups (group_name, group_description, group_avatar, created_by)
                 VALUES (?1, ?2, COALESCE(?3, '👥'), ?4)",
                rusqlite::params![name, description, avatar, creator_id],
            )?;
            let group_id = tx.last_insert_rowid();

            tx.execute(
                "INSERT INTO group_members (group_id, user_id, role, invited_by)
                 VALUES (?1, ?2, 'admin', ?2)",
                rusqlite::params![group_id, creator_id],
            )?;

            tx.commit()?;
            debug!(group_id, creator_id, "group created");
            Ok(group_id)
        })
    }

    /// Invite a user. Admin-only; rejects existing members and duplicate
    /// pending invites.
    pub fn invite_to_group(
        &self,
        group_id: i64,
        inviter_id: i64,
        invitee_id: i64,
    ) -> StoreResult<i64> {
        self.with_conn(|conn| {
            match member_role(conn, group_id, inviter_id)? {
                Some(GroupRole::Admin) => {}
                Some(GroupRole::Member) => return Err(StoreError::PermissionDenied),
                None => return Err(StoreError::NotMember),
            }

            if member_role(conn, group_id, invitee_id)?.is_some() {
                return Err(StoreError::AlreadyMember);
            }

            let pending: Option<i64> = conn
                .query_row(
                    "SELECT invite_id FROM group_invites
                     WHERE group_id = ?1 AND invitee_id = ?2 AND status = 'pending'",
                    [group_id, invitee_id],
                    |row| row.get(0),
                )
                .optional()?;
            if pending.is_some() {
                return Err(StoreError::DuplicateInvite);
            }

            conn.execute(
                "INSERT INTO group_invites (group_id, inviter_id, invitee_id) VALUES (?1, ?2, ?3)",
                [group_id, inviter_id, invitee_id],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Pending invites addressed to a user, newest first.
    pub fn pending_invites(&self, user_id: i64) -> StoreResult<Vec<InviteRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT gi.invite_id, gi.group_id, g.group_name, g.group_avatar,
                        gi.inviter_id, u.username, gi.invited_at
                 FROM group_invites gi
                 JOIN groups g ON gi.group_id = g.group_id
                 JOIN users u ON gi.inviter_id = u.user_id
                 WHERE gi.invitee_id = ?1 AND gi.status = 'pending'
                 ORDER BY gi.invited_at DESC, gi.invite_id DESC",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(InviteRow {
                        invite_id: row.get(0)?,
                        group_id: row.get(1)?,
                        group_name: row.get(2)?,
                        group_avatar: row.get(3)?,
                        inviter_id: row.get(4)?,
                        inviter_username: row.get(5)?,
                        invited_at: row.get(6)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Accept or decline an invite. Accepting records the membership (role
    /// member, invited_by the original inviter) in the same transaction as
    /// the status flip.
    pub fn respond_to_invite(&self, invite_id: i64, user_id: i64, accept: bool) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let invite: Option<(i64, i64)> = tx
                .query_row(
                    "SELECT group_id, inviter_id FROM group_invites
                     WHERE invite_id = ?1 AND invitee_id = ?2 AND status = 'pending'",
                    [invite_id, user_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let (group_id, inviter_id) = invite.ok_or(StoreError::NotFound("invitation"))?;

            let status = if accept { "accepted" } else { "declined" };
            tx.execute(
                "UPDATE group_invites
                 SET status = ?1, responded_at = datetime('now')
                 WHERE invite_id = ?2",
                rusqlite::params![status, invite_id],
            )?;

            if accept {
                tx.execute(
                    "INSERT INTO group_members (group_id, user_id, role, invited_by)
                     VALUES (?1, ?2, 'member', ?3)",
                    [group_id, user_id, inviter_id],
                )?;
            }

            tx.commit()?;
            Ok(())
        })
    }

    /// Remove a member. Admin-only; admins can remove other admins.
    pub fn remove_member(&self, group_id: i64, admin_id: i64, target_id: i64) -> StoreResult<()> {
        self.with_conn(|conn| {
            match member_role(conn, group_id, admin_id)? {
                Some(GroupRole::Admin) => {}
                Some(GroupRole::Member) => return Err(StoreError::PermissionDenied),
                None => return Err(StoreError::NotMember),
            }

            let n = conn.execute(
                "DELETE FROM group_members WHERE group_id = ?1 AND user_id = ?2",
                [group_id, target_id],
            )?;
            if n == 0 {
                return Err(StoreError::NotFound("member"));
            }
            Ok(())
        })
    }

    /// Unconditional self-removal. The sole admin may leave too; the group
    /// then has no admin and no successor is promoted.
    pub fn leave_group(&self, group_id: i64, user_id: i64) -> StoreResult<()> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM group_members WHERE group_id = ?1 AND user_id = ?2",
                [group_id, user_id],
            )?;
            if n == 0 {
                return Err(StoreError::NotMember);
            }
            Ok(())
        })
    }

    /// Members of a group, admins first, then join order. Membership-gated
    /// like the history read.
    pub fn list_members(&self, group_id: i64, user_id: i64) -> StoreResult<Vec<MemberRow>> {
        self.with_conn(|conn| {
            if member_role(conn, group_id, user_id)?.is_none() {
                return Err(StoreError::NotMember);
            }

            let mut stmt = conn.prepare(
                "SELECT u.user_id, u.username, u.display_name, gm.role, gm.joined_at
                 FROM group_members gm
                 JOIN users u ON gm.user_id = u.user_id
                 WHERE gm.group_id = ?1
                 ORDER BY CASE gm.role WHEN 'admin' THEN 0 ELSE 1 END,
                          gm.joined_at ASC, gm.member_id ASC",
            )?;
            let rows = stmt
                .query_map([group_id], |row| {
                    Ok(MemberRow {
                        user_id: row.get(0)?,
                        username: row.get(1)?,
                        display_name: row.get(2)?,
                        role: row.get(3)?,
                        joined_at: row.get(4)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Groups a user belongs to, newest first, with their role and the
    /// member count.
    pub fn list_user_groups(&self, user_id: i64) -> StoreResult<Vec<GroupRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT g.group_id, g.group_name, g.group_description, g.group_avatar,
                        g.created_by, u.username,
                        (SELECT COUNT(*) FROM group_members WHERE group_id = g.group_id),
                        gm.role, g.created_at
                 FROM groups g
                 JOIN group_members gm ON g.group_id = gm.group_id
                 JOIN users u ON g.created_by = u.user_id
                 WHERE gm.user_id = ?1
                 ORDER BY g.created_at DESC, g.group_id DESC",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(GroupRow {
                        group_id: row.get(0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                        avatar: row.get(3)?,
                        created_by: row.get(4)?,
                        creator_username: row.get(5)?,
                        member_count: row.get(6)?,
                        role: row.get(7)?,
                        created_at: row.get(8)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Group header with creator identity and member count. Membership-gated.
    pub fn group_detail(&self, group_id: i64, user_id: i64) -> StoreResult<GroupRow> {
        self.with_conn(|conn| {
            if member_role(conn, group_id, user_id)?.is_none() {
                return Err(StoreError::NotMember);
            }

            let mut stmt = conn.prepare(
                "SELECT g.group_id, g.group_name, g.group_description, g.group_avatar,
                        g.created_by, u.username,
                        (SELECT COUNT(*) FROM group_members WHERE group_id = g.group_id),
                        g.created_at
                 FROM groups g
                 JOIN users u ON g.created_by = u.user_id
                 WHERE g.group_id = ?1",
            )?;
            let row = stmt
                .query_row([group_id], |row| {
                    Ok(GroupRow {
                        group_id: row.get(0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                        avatar: row.get(3)?,
                        created_by: row.get(4)?,
                        creator_username: row.get(5)?,
                        member_count: row.get(6)?,
                        role: None,
                        created_at: row.get(7)?,
                    })
                })
                .optional()?;
            row.ok_or(StoreError::NotFound("group"))
        })
    }
}

/// The caller's role in a group, `None` when not a member.
pub(crate) fn member_role(
    conn: &Connection,
    group_id: i64,
    user_id: i64,
) -> StoreResult<Option<GroupRole>> {
    let role: Option<String> = conn
        .query_row(
            "SELECT role FROM group_members WHERE group_id = ?1 AND user_id = ?2",
            [group_id, user_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(role.as_deref().map(GroupRole::from_str))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{register, test_db};

    fn invite_and_accept(db: &Database, group: i64, admin: i64, user: i64) {
        db.invite_to_group(group, admin, user).unwrap();
        let inv = db.pending_invites(user).unwrap().remove(0);
        db.respond_to_invite(inv.invite_id, user, true).unwrap();
    }

    #[test]
    fn creator_becomes_admin_member() {
        let db = test_db();
        let a = register(&db, "ana");
        let group = db.create_group("book club", Some("books"), None, a).unwrap();

        let members = db.list_members(group, a).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].user_id, a);
        assert_eq!(members[0].role, "admin");

        let detail = db.group_detail(group, a).unwrap();
        assert_eq!(detail.member_count, 1);
        assert_eq!(detail.creator_username, "ana");
        assert_eq!(detail.avatar, "👥");
    }

    #[test]
    fn invite_accept_adds_member_with_inviter_recorded() {
        let db = test_db();
        let a = register(&db, "ana");
        let b = register(&db, "ben");
        let group = db.create_group("club", None, None, a).unwrap();

        invite_and_accept(&db, group, a, b);

        let members = db.list_members(group, b).unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[1].user_id, b);
        assert_eq!(members[1].role, "member");

        // The invite is consumed.
        assert!(db.pending_invites(b).unwrap().is_empty());

        let groups = db.list_user_groups(b).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].role.as_deref(), Some("member"));
        assert_eq!(groups[0].member_count, 2);
    }

    #[test]
    fn declined_invite_allows_reinvite() {
        let db = test_db();
        let a = register(&db, "ana");
        let b = register(&db, "ben");
        let group = db.create_group("club", None, None, a).unwrap();

        db.invite_to_group(group, a, b).unwrap();
        let inv = db.pending_invites(b).unwrap().remove(0);
        db.respond_to_invite(inv.invite_id, b, false).unwrap();
        assert!(db.list_user_groups(b).unwrap().is_empty());

        // Declined is terminal for that invite, but a fresh one is allowed.
        db.invite_to_group(group, a, b).unwrap();
        assert_eq!(db.pending_invites(b).unwrap().len(), 1);
    }

    #[test]
    fn invite_rejects_members_duplicates_and_non_admins() {
        let db = test_db();
        let a = register(&db, "ana");
        let b = register(&db, "ben");
        let c = register(&db, "cal");
        let group = db.create_group("club", None, None, a).unwrap();
        invite_and_accept(&db, group, a, b);

        assert!(matches!(
            db.invite_to_group(group, a, b).unwrap_err(),
            StoreError::AlreadyMember
        ));

        db.invite_to_group(group, a, c).unwrap();
        assert!(matches!(
            db.invite_to_group(group, a, c).unwrap_err(),
            StoreError::DuplicateInvite
        ));

        // b is a plain member, c is not a member at all.
        assert!(matches!(
            db.invite_to_group(group, b, c).unwrap_err(),
            StoreError::PermissionDenied
        ));
        assert!(matches!(
            db.invite_to_group(group, c, b).unwrap_err(),
            StoreError::NotMember
        ));
    }

    #[test]
    fn remove_member_is_admin_only() {
        let db = test_db();
        let a = register(&db, "ana");
        let b = register(&db, "ben");
        let c = register(&db, "cal");
        let group = db.create_group("club", None, None, a).unwrap();
        invite_and_accept(&db, group, a, b);
        invite_and_accept(&db, group, a, c);

        assert!(matches!(
            db.remove_member(group, b, c).unwrap_err(),
            StoreError::PermissionDenied
        ));

        db.remove_member(group, a, c).unwrap();
        assert_eq!(db.list_members(group, a).unwrap().len(), 2);
    }

    #[test]
    fn sole_admin_may_leave_without_succession() {
        let db = test_db();
        let a = register(&db, "ana");
        let b = register(&db, "ben");
        let group = db.create_group("club", None, None, a).unwrap();
        invite_and_accept(&db, group, a, b);

        db.leave_group(group, a).unwrap();

        let members = db.list_members(group, b).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].role, "member");
    }

    #[test]
    fn roster_and_detail_are_member_only() {
        let db = test_db();
        let a = register(&db, "ana");
        let b = register(&db, "ben");
        let group = db.create_group("club", None, None, a).unwrap();

        assert!(matches!(
            db.list_members(group, b).unwrap_err(),
            StoreError::NotMember
        ));
        assert!(matches!(
            db.group_detail(group, b).unwrap_err(),
            StoreError::NotMember
        ));

        // Joining grants access to both.
        invite_and_accept(&db, group, a, b);
        assert_eq!(db.list_members(group, b).unwrap().len(), 2);
        assert_eq!(db.group_detail(group, b).unwrap().member_count, 2);
    }

    #[test]
    fn leaving_a_group_you_are_not_in_fails() {
        let db = test_db();
        let a = register(&db, "ana");
        let b = register(&db, "ben");
        let group = db.create_group("club", None, None, a).unwrap();

        assert!(matches!(
            db.leave_group(group, b).unwrap_err(),
            StoreError::NotMember
        ));
    }
}
