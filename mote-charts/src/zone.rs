//! Named time zones applied to `time` instants.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::error::ChartError;

/// How far back a nonexistent local time is walked to find the offset in
/// force before the transition.
const GAP_SEARCH_MINUTES: i64 = 180;

pub fn parse_zone(name: &str) -> Result<Tz, String> {
    name.trim()
        .parse::<Tz>()
        .map_err(|e| format!("unknown time zone '{name}': {e}"))
}

pub(crate) fn to_chrono(at: OffsetDateTime) -> Result<DateTime<Utc>, ChartError> {
    DateTime::from_timestamp(at.unix_timestamp(), at.nanosecond())
        .ok_or_else(|| ChartError::TimeZone(format!("{at} is outside the supported range")))
}

/// Offset `tz` observes at instant `at`.
pub fn offset_at(tz: Tz, at: OffsetDateTime) -> Result<UtcOffset, ChartError> {
    let utc = to_chrono(at)?;
    let seconds = tz.offset_from_utc_datetime(&utc.naive_utc()).fix().local_minus_utc();
    Ok(UtcOffset::from_whole_seconds(seconds)?)
}

/// `at` expressed in the offset `tz` observes at that instant.
pub fn in_zone(at: OffsetDateTime, tz: Tz) -> Result<OffsetDateTime, ChartError> {
    Ok(at.to_offset(offset_at(tz, at)?))
}

/// Attach the offset `tz` had at wall-clock time `local`.
///
/// Repeated wall-clock times take the earlier instant. Skipped ones keep the
/// offset from before the transition, so 02:30 on a spring-forward night in
/// Berlin reads as 02:30 +01:00.
pub fn resolve_naive(local: PrimitiveDateTime, tz: Tz) -> Result<OffsetDateTime, ChartError> {
    let naive = to_naive(local)?;
    let seconds = match tz.from_local_datetime(&naive).earliest() {
        Some(dt) => dt.offset().fix().local_minus_utc(),
        None => offset_before_gap(tz, naive)
            .ok_or_else(|| ChartError::TimeZone(format!("no valid local time near {naive} in {}", tz.name())))?,
    };
    Ok(local.assume_offset(UtcOffset::from_whole_seconds(seconds)?))
}

fn offset_before_gap(tz: Tz, naive: NaiveDateTime) -> Option<i32> {
    (1..=GAP_SEARCH_MINUTES).find_map(|minutes| {
        tz.from_local_datetime(&(naive - Duration::minutes(minutes)))
            .latest()
            .map(|dt| dt.offset().fix().local_minus_utc())
    })
}

fn to_naive(local: PrimitiveDateTime) -> Result<NaiveDateTime, ChartError> {
    NaiveDate::from_ymd_opt(local.year(), u32::from(u8::from(local.month())), u32::from(local.day()))
        .and_then(|d| {
            d.and_hms_nano_opt(
                u32::from(local.hour()),
                u32::from(local.minute()),
                u32::from(local.second()),
                local.nanosecond(),
            )
        })
        .ok_or_else(|| ChartError::TimeZone(format!("{local} is not a valid local time")))
}
