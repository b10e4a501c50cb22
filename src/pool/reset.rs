//! Daily quota boundary.

use crate::config::ResetBoundary;
use chrono::{DateTime, FixedOffset, Local, NaiveDate, Utc};

/// The quota day `now` falls in under `boundary`, as `YYYY-MM-DD`.
///
/// `offset_minutes` only applies to [`ResetBoundary::FixedOffset`]; an
/// out-of-range offset falls back to UTC.
pub fn date_key(now: DateTime<Utc>, boundary: ResetBoundary, offset_minutes: i32) -> String {
    quota_day(now, boundary, offset_minutes)
        .format("%Y-%m-%d")
        .to_string()
}

fn quota_day(now: DateTime<Utc>, boundary: ResetBoundary, offset_minutes: i32) -> NaiveDate {
    match boundary {
        ResetBoundary::Utc => now.date_naive(),
        ResetBoundary::Local => now.with_timezone(&Local).date_naive(),
        ResetBoundary::FixedOffset => match FixedOffset::east_opt(offset_minutes * 60) {
            Some(tz) => now.with_timezone(&tz).date_naive(),
            None => now.date_naive(),
        },
    }
}
