//! Append-only record of join events and the monthly join statistic derived from it.

use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rusqlite::params;
use tracing::{debug, error, info};

use crate::{
    domain::{ChatId, UserProfile},
    store::Database,
    Result,
};

// Fixed width so text comparison matches chronological order.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

#[derive(Clone)]
pub struct MembershipLedger {
    db: Arc<Database>,
}

impl MembershipLedger {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Append a join of `member` to `chat_id` stamped with the current UTC time.
    ///
    /// Never fails from the caller's point of view; store errors are logged.
    pub fn record(&self, chat_id: ChatId, member: &UserProfile) {
        self.record_at(chat_id, member, Utc::now());
    }

    pub fn record_at(&self, chat_id: ChatId, member: &UserProfile, at: DateTime<Utc>) {
        let full_name = member.full_name();
        let res = self.db.with_conn(|c| {
            c.execute(
                "INSERT INTO joined_users (user_id, chat_id, join_timestamp, username, full_name, is_bot)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    member.id.0,
                    chat_id.0,
                    at.format(TIMESTAMP_FORMAT).to_string(),
                    member.username.as_deref().unwrap_or(""),
                    full_name,
                    member.is_bot,
                ],
            )?;
            Ok(())
        });

        match res {
            Ok(()) => info!(
                "{} {} ({:?}) recorded as joined chat {}",
                if member.is_bot { "Bot" } else { "User" },
                member.id.0,
                full_name,
                chat_id.0
            ),
            Err(e) => error!(
                "Failed to record join of {} to chat {}: {e}",
                member.id.0, chat_id.0
            ),
        }
    }

    /// Distinct non-bot users that joined `chat_id` during the current UTC month.
    ///
    /// Display statistic only; returns 0 when the store fails.
    pub fn monthly_join_count(&self, chat_id: ChatId) -> u64 {
        self.monthly_join_count_at(chat_id, Utc::now())
    }

    pub fn monthly_join_count_at(&self, chat_id: ChatId, now: DateTime<Utc>) -> u64 {
        match self.try_count_month(chat_id, now) {
            Ok(n) => {
                debug!(
                    "Monthly joins for chat {} ({}): {n}",
                    chat_id.0,
                    now.format("%Y-%m")
                );
                n
            }
            Err(e) => {
                error!("Failed to count monthly joins for chat {}: {e}", chat_id.0);
                0
            }
        }
    }

    fn try_count_month(&self, chat_id: ChatId, now: DateTime<Utc>) -> Result<u64> {
        let (start, end) = month_bounds(now);
        self.db.with_conn(|c| {
            let n: i64 = c.query_row(
                "SELECT COUNT(DISTINCT user_id) FROM joined_users
                 WHERE chat_id = ?1 AND is_bot = 0
                   AND join_timestamp >= ?2 AND join_timestamp < ?3",
                params![chat_id.0, start, end],
                |row| row.get(0),
            )?;
            Ok(n.max(0) as u64)
        })
    }
}

/// `[first instant of now's month, first instant of the next month)` as stored text.
fn month_bounds(now: DateTime<Utc>) -> (String, String) {
    let (y, m) = (now.year(), now.month());
    let (ny, nm) = if m == 12 { (y + 1, 1) } else { (y, m + 1) };
    let fmt = |y: i32, m: u32| {
        NaiveDate::from_ymd_opt(y, m, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
            .unwrap_or_default()
    };
    (fmt(y, m), fmt(ny, nm))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserId;
    use chrono::TimeZone;

    fn user(id: i64, is_bot: bool) -> UserProfile {
        UserProfile {
            id: UserId(id),
            username: Some(format!("u{id}")),
            first_name: format!("User {id}"),
            last_name: None,
            is_bot,
        }
    }

    fn ledger() -> (Arc<Database>, MembershipLedger) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        (db.clone(), MembershipLedger::new(db))
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn counts_distinct_humans_in_month() {
        let (db, l) = ledger();
        let chat = ChatId(-1);

        for id in 1..=3 {
            l.record_at(chat, &user(id, false), at(2026, 3, 2, 10));
        }
        // Rejoins of user 1 within the month.
        l.record_at(chat, &user(1, false), at(2026, 3, 10, 10));
        l.record_at(chat, &user(1, false), at(2026, 3, 31, 23));
        // Bots are recorded but not counted.
        l.record_at(chat, &user(99, true), at(2026, 3, 5, 10));

        assert_eq!(l.monthly_join_count_at(chat, at(2026, 3, 20, 0)), 3);

        // Every join is kept.
        let rows: i64 = db
            .with_conn(|c| {
                Ok(c.query_row("SELECT COUNT(*) FROM joined_users", [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(rows, 6);
    }

    #[test]
    fn other_months_and_chats_are_excluded() {
        let (_, l) = ledger();
        l.record_at(ChatId(1), &user(1, false), at(2026, 2, 28, 23));
        l.record_at(ChatId(1), &user(2, false), at(2026, 4, 1, 0));
        l.record_at(ChatId(2), &user(3, false), at(2026, 3, 15, 0));
        l.record_at(ChatId(1), &user(4, false), at(2026, 3, 1, 0));

        assert_eq!(l.monthly_join_count_at(ChatId(1), at(2026, 3, 15, 12)), 1);
    }

    #[test]
    fn december_rolls_into_next_year() {
        let (start, end) = month_bounds(at(2025, 12, 31, 23));
        assert_eq!(start, "2025-12-01T00:00:00.000000");
        assert_eq!(end, "2026-01-01T00:00:00.000000");
    }

    #[test]
    fn record_uses_current_month() {
        let (_, l) = ledger();
        l.record(ChatId(7), &user(1, false));
        assert_eq!(l.monthly_join_count(ChatId(7)), 1);
    }
}
