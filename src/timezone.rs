//! Resolves canonical timezone names to UTC offsets.

use time::{OffsetDateTime, UtcOffset};
use time_tz::{Offset, TimeZone};

use crate::Error;

/// Get the offset of `canonical_timezone` (e.g. "America/Sao_Paulo") from UTC
/// at the current time.
///
/// Returns `None` if the timezone name is not recognised.
pub fn get_local_offset(canonical_timezone: &str) -> Option<UtcOffset> {
    time_tz::timezones::get_by_name(canonical_timezone)
        .map(|tz| tz.get_offset_utc(&OffsetDateTime::now_utc()).to_utc())
}

/// Get the current time in `canonical_timezone`.
///
/// # Errors
/// Returns an [Error::InvalidTimezoneError] if the timezone name is not recognised.
pub fn now_in_timezone(canonical_timezone: &str) -> Result<OffsetDateTime, Error> {
    let offset = get_local_offset(canonical_timezone)
        .ok_or_else(|| Error::InvalidTimezoneError(canonical_timezone.to_owned()))?;

    Ok(OffsetDateTime::now_utc().to_offset(offset))
}
