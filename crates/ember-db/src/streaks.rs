//! Per-pair day-streak engine.
//!
//! A streak counts consecutive calendar days on which *both* members of a
//! friend pair sent at least one direct message to the other. The state
//! machine is re-derived from stored dates on every send — there is no
//! scheduler, so correctness depends entirely on recomputing at write time.

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};

use ember_types::error::StoreResult;

use crate::models::StreakRow;
use crate::Database;

/// Fixed ordering for an unordered user pair: lower id is always side 1.
pub fn canonical_pair(a: i64, b: i64) -> (i64, i64) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Mutable streak state for one canonicalized pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreakState {
    pub count: u32,
    pub last_active: Option<NaiveDate>,
    pub user1_last: Option<NaiveDate>,
    pub user2_last: Option<NaiveDate>,
}

impl StreakState {
    /// Apply one message send to the state, at day granularity.
    ///
    /// Every send stamps the sender's side and `last_active` with today.
    /// The count then moves only on these conditions, judged against the
    /// *pre-update* `last_active`:
    /// - a gap of more than one day resets to 0 unconditionally;
    /// - if both sides have now messaged today, a one-day step increments,
    ///   a same-day repeat is a no-op, and the very first mutual day only
    ///   establishes the baseline (count stays 0).
    ///
    /// Returns the resulting count.
    pub fn advance(&mut self, sender_is_user1: bool, today: NaiveDate) -> u32 {
        let prev_active = self.last_active;

        if sender_is_user1 {
            self.user1_last = Some(today);
        } else {
            self.user2_last = Some(today);
        }
        self.last_active = Some(today);

        let both_today = self.user1_last == Some(today) && self.user2_last == Some(today);

        match prev_active {
            Some(prev) if (today - prev).num_days() > 1 => {
                // Streak broken by inactivity, regardless of both_today.
                self.count = 0;
            }
            Some(prev) if both_today => match (today - prev).num_days() {
                0 => {}
                1 => self.count += 1,
                // Covers a clock stepping backwards; the >1 gap is already
                // handled above.
                _ => self.count = 0,
            },
            // First mutual day ever: the baseline day does not itself score.
            _ => {}
        }

        self.count
    }
}

impl Database {
    /// Current streak row for a pair, if one exists.
    pub fn streak(&self, a: i64, b: i64) -> StoreResult<Option<StreakRow>> {
        self.with_conn(|conn| query_streak(conn, a, b))
    }
}

pub(crate) fn query_streak(conn: &Connection, a: i64, b: i64) -> StoreResult<Option<StreakRow>> {
    let (user1_id, user2_id) = canonical_pair(a, b);
    let mut stmt = conn.prepare(
        "SELECT streak_count, last_active_date, user1_last_message_date, user2_last_message_date
         FROM streaks
         WHERE user1_id = ?1 AND user2_id = ?2",
    )?;

    let row = stmt
        .query_row([user1_id, user2_id], |row| {
            Ok(StreakRow {
                user1_id,
                user2_id,
                streak_count: row.get::<_, i64>(0)? as u32,
                last_active_date: parse_date(row.get(1)?),
                user1_last_message_date: parse_date(row.get(2)?),
                user2_last_message_date: parse_date(row.get(3)?),
            })
        })
        .optional()?;

    Ok(row)
}

/// Advance the streak for one successful direct-message send. Runs on the
/// caller's connection so it shares the send's transaction.
pub(crate) fn update_streak(
    conn: &Connection,
    sender_id: i64,
    receiver_id: i64,
    today: NaiveDate,
) -> StoreResult<u32> {
    let (user1_id, user2_id) = canonical_pair(sender_id, receiver_id);
    let sender_is_user1 = sender_id == user1_id;

    let Some(row) = query_streak(conn, user1_id, user2_id)? else {
        // Lazy creation on the first message between a pair.
        let sender_date = Some(date_str(today));
        let (d1, d2) = if sender_is_user1 {
            (sender_date, None)
        } else {
            (None, sender_date)
        };
        conn.execute(
            "INSERT INTO streaks (user1_id, user2_id, streak_count, last_active_date,
                                  user1_last_message_date, user2_last_message_date)
             VALUES (?1, ?2, 0, ?3, ?4, ?5)",
            rusqlite::params![user1_id, user2_id, date_str(today), d1, d2],
        )?;
        return Ok(0);
    };

    let mut state = StreakState {
        count: row.streak_count,
        last_active: row.last_active_date,
        user1_last: row.user1_last_message_date,
        user2_last: row.user2_last_message_date,
    };
    let count = state.advance(sender_is_user1, today);

    conn.execute(
        "UPDATE streaks
         SET streak_count = ?1, last_active_date = ?2,
             user1_last_message_date = ?3, user2_last_message_date = ?4
         WHERE user1_id = ?5 AND user2_id = ?6",
        rusqlite::params![
            count as i64,
            state.last_active.map(date_str),
            state.user1_last.map(date_str),
            state.user2_last.map(date_str),
            user1_id,
            user2_id
        ],
    )?;

    Ok(count)
}

fn date_str(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

fn parse_date(s: Option<String>) -> Option<NaiveDate> {
    s.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, n).unwrap()
    }

    #[test]
    fn canonical_pair_orders_low_first() {
        assert_eq!(canonical_pair(7, 3), (3, 7));
        assert_eq!(canonical_pair(3, 7), (3, 7));
    }

    #[test]
    fn first_mutual_day_establishes_baseline_only() {
        let mut s = StreakState::default();
        assert_eq!(s.advance(true, day(1)), 0);
        // Same day, other side: both messaged today, no prior baseline.
        assert_eq!(s.advance(false, day(1)), 0);
        assert_eq!(s.last_active, Some(day(1)));
    }

    #[test]
    fn one_day_continuation_increments() {
        let mut s = StreakState::default();
        s.advance(true, day(1));
        s.advance(false, day(1));

        assert_eq!(s.advance(true, day(2)), 0); // only one side so far today
        assert_eq!(s.advance(false, day(2)), 1);

        // Repeats on the same day do not double-count.
        assert_eq!(s.advance(true, day(2)), 1);
        assert_eq!(s.advance(false, day(2)), 1);

        assert_eq!(s.advance(true, day(3)), 1);
        assert_eq!(s.advance(false, day(3)), 2);
    }

    #[test]
    fn gap_over_one_day_resets() {
        let mut s = StreakState::default();
        s.advance(true, day(1));
        s.advance(false, day(1));
        s.advance(true, day(2));
        s.advance(false, day(2));
        assert_eq!(s.count, 1);

        // Day 3 skipped entirely.
        assert_eq!(s.advance(true, day(4)), 0);
    }

    #[test]
    fn one_sided_chatter_never_scores() {
        let mut s = StreakState::default();
        for d in 1..=5 {
            assert_eq!(s.advance(true, day(d)), 0);
        }
    }

    #[test]
    fn lazy_row_creation_sets_only_sender_side() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            conn.execute_batch(
                "INSERT INTO users (username, password_hash) VALUES ('a', 'x');
                 INSERT INTO users (username, password_hash) VALUES ('b', 'x');",
            )?;
            let count = update_streak(conn, 2, 1, day(1))?;
            assert_eq!(count, 0);
            Ok(())
        })
        .unwrap();

        let row = db.streak(1, 2).unwrap().unwrap();
        assert_eq!(row.streak_count, 0);
        assert_eq!(row.user1_last_message_date, None);
        assert_eq!(row.user2_last_message_date, Some(day(1)));
        assert_eq!(row.last_active_date, Some(day(1)));
    }
}
