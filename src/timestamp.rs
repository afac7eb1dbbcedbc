//! Conversion between the archive's native timestamps and absolute time.
//!
//! The archive counts from 2001-01-01T00:00:00Z. Older archives store whole
//! seconds, newer ones nanoseconds; the unit is told apart by magnitude.

use chrono::{DateTime, Utc};

/// Seconds between the Unix epoch and the archive's native epoch.
pub const NATIVE_EPOCH_OFFSET_SECS: i64 = 978_307_200;

/// Raw values with a magnitude above this are nanoseconds, otherwise seconds.
pub const NANOSECOND_THRESHOLD: u64 = 1_000_000_000_000_000;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Convert a raw archive timestamp into an absolute UTC instant.
///
/// Never fails. Values outside the range chrono can represent clamp to
/// [`DateTime::<Utc>::MIN_UTC`] or [`DateTime::<Utc>::MAX_UTC`].
#[must_use]
pub fn to_absolute(raw: i64) -> DateTime<Utc> {
    let (secs, nanos) = if raw.unsigned_abs() > NANOSECOND_THRESHOLD {
        (raw.div_euclid(NANOS_PER_SEC), raw.rem_euclid(NANOS_PER_SEC))
    } else {
        (raw, 0)
    };

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let converted = secs
        .checked_add(NATIVE_EPOCH_OFFSET_SECS)
        .and_then(|unix| DateTime::from_timestamp(unix, nanos as u32));

    converted.unwrap_or(if raw < 0 {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}

/// Convert an absolute instant into native nanoseconds, saturating at `i64` bounds.
///
/// Instants within about 11.5 days of the native epoch produce values small
/// enough that [`to_absolute`] reads them back as seconds. Real archives
/// never hold such dates.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn from_absolute(t: DateTime<Utc>) -> i64 {
    let secs = i128::from(t.timestamp()) - i128::from(NATIVE_EPOCH_OFFSET_SECS);
    let nanos = secs * i128::from(NANOS_PER_SEC) + i128::from(t.timestamp_subsec_nanos());
    nanos.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}
