//! Login streak tracking.
//!
//! Runs once per authenticated session start, independent of plan data:
//! reads the per-user streak record, bumps or resets the
//! consecutive-day counter, and persists it at most once per calendar
//! day.

use chrono::NaiveDate;

use crate::plan::StreakRecord;
use crate::store::{RemoteStore, StoreError};

/// Date format used in persisted streak records.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Check and update the login streak for `user_id` as of `today`.
///
/// Returns the streak to display. A record counting today already is
/// left untouched; a last login of yesterday extends the streak; any
/// longer gap (or a first-ever login) resets it to one.
pub async fn check_streak(
    store: &dyn RemoteStore,
    user_id: &str,
    today: NaiveDate,
) -> Result<u32, StoreError> {
    let record = store.read_streak(user_id).await?.unwrap_or_default();

    let today_str = today.format(DATE_FORMAT).to_string();
    if record.last_login == today_str {
        // Already counted today, nothing to persist.
        return Ok(record.current_streak);
    }

    let yesterday = today.pred_opt().map(|d| d.format(DATE_FORMAT).to_string());
    let current_streak = if yesterday.as_deref() == Some(record.last_login.as_str()) {
        record.current_streak + 1
    } else {
        1
    };

    let updated = StreakRecord {
        current_streak,
        last_login: today_str,
    };
    store.write_streak(user_id, &updated).await?;
    log::info!(
        "streak: user {} at {} consecutive day(s)",
        user_id,
        current_streak
    );
    Ok(current_streak)
}
