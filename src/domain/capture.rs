//! Capture timestamps and the UTC/Eastern cutover correction.
//!
//! The sensor logger wrote wall-clock timestamps that were really UTC up until
//! the cutover instant, even though everything downstream reads them as US
//! Eastern. Both the recording filenames and the summary table carry the same
//! mistake, so both go through [`parse_capture_time`].

use std::path::Path;

use chrono::{DateTime, LocalResult, NaiveDateTime, Offset, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

/// Timezone every capture timestamp is localized to
pub const EASTERN: Tz = chrono_tz::America::New_York;

/// 2026-01-08T14:00:00 Eastern (19:00:00 UTC) as Unix seconds
pub const CUTOVER_UNIX_SECS: i64 = 1_767_898_800;

/// Hours subtracted from timestamps recorded before the cutover
pub const UTC_SHIFT_HOURS: i64 = 5;

/// A timezone-aware capture instant in Eastern time
pub type CaptureTime = DateTime<Tz>;

/// Errors from timestamp parsing
#[derive(Debug, Error)]
pub enum CaptureTimeError {
    #[error("Not a timestamp: {0:?}")]
    Unparseable(String),

    #[error("File name has no timestamp stem: {0}")]
    MissingStem(String),
}

/// Naive layouts accepted after the date/time separator is normalized to `T`
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y%m%dT%H%M%S",
    "%Y%m%dT%H%M",
];

/// The cutover instant, in Eastern time
pub fn cutover() -> CaptureTime {
    (DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(CUTOVER_UNIX_SECS)).with_timezone(&EASTERN)
}

/// Shift a pre-cutover timestamp back by [`UTC_SHIFT_HOURS`].
///
/// The shift is applied to the wall clock and the result localized again, so
/// across a DST change the instant moves by four or six hours. Instants at or
/// after the cutover are returned unchanged.
pub fn correct_mislabelled_utc(time: CaptureTime) -> CaptureTime {
    if time < cutover() {
        localize(time.naive_local() - TimeDelta::hours(UTC_SHIFT_HOURS))
    } else {
        time
    }
}

/// Parse the wall-clock part of an ISO-like timestamp.
///
/// Any explicit offset is discarded: the logger's offsets are as wrong as its
/// wall clock, so only the digits are trusted. Both the extended
/// (`2026-01-08T13:59:59`) and basic (`20260108_135959`) forms are accepted,
/// with any single character between date and time.
pub fn parse_wall_clock(raw: &str) -> Result<NaiveDateTime, CaptureTimeError> {
    let text = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Ok(dt.naive_local());
    }

    let normalized = normalize_separator(text.trim_end_matches(['Z', 'z']));
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&normalized, format).ok())
        .ok_or_else(|| CaptureTimeError::Unparseable(raw.to_string()))
}

/// Attach the Eastern zone to a wall-clock time.
///
/// Fall-back ambiguity resolves to the earlier instant. A time inside the
/// spring-forward gap keeps the offset in force before the jump, so
/// `2026-03-08 02:30` is read as EST and lands on 03:30 EDT.
pub fn localize(naive: NaiveDateTime) -> CaptureTime {
    match EASTERN.from_local_datetime(&naive) {
        LocalResult::Single(time) => time,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            // West of Greenwich the same digits read as UTC fall before the
            // transition, which gives the pre-jump offset
            let offset = EASTERN.offset_from_utc_datetime(&naive).fix();
            let utc = naive - TimeDelta::seconds(i64::from(offset.local_minus_utc()));
            EASTERN.from_utc_datetime(&utc)
        }
    }
}

/// Parse, localize and correct a raw timestamp string
pub fn parse_capture_time(raw: &str) -> Result<CaptureTime, CaptureTimeError> {
    let naive = parse_wall_clock(raw)?;
    Ok(correct_mislabelled_utc(localize(naive)))
}

/// Derive the capture time from a recording's file name (text before the first dot)
pub fn capture_time_from_path(path: &Path) -> Result<CaptureTime, CaptureTimeError> {
    let stem = path
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.split('.').next())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| CaptureTimeError::MissingStem(path.display().to_string()))?;

    parse_capture_time(stem)
}

fn normalize_separator(text: &str) -> String {
    // Extended dates are ten bytes long, basic dates eight
    let date_len = if text.as_bytes().get(4) == Some(&b'-') { 10 } else { 8 };

    match (text.get(..date_len), text.get(date_len + 1..)) {
        (Some(date), Some(time)) if !time.is_empty() => format!("{}T{}", date, time),
        _ => text.to_string(),
    }
}
