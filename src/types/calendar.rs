use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use crate::error::{Error, Result};

/// Display format used for `lastUpdated` style strings, 24h clock.
pub const LOCAL_DISPLAY_FORMAT: &str = "%Y/%m/%d %H:%M";

pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| Error::InvalidTimezone(name.to_string()))
}

/// Calendar day of `instant` as seen in `tz`. This is the ledger's natural key.
pub fn calendar_day(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

pub fn format_local(instant: DateTime<Utc>, tz: Tz) -> String {
    instant.with_timezone(&tz).format(LOCAL_DISPLAY_FORMAT).to_string()
}

/// Parse a `YYYY/MM/DD HH:MM` local time (as written by the legacy history
/// file) into a UTC instant.
pub fn parse_local(text: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let naive = chrono::NaiveDateTime::parse_from_str(text.trim(), LOCAL_DISPLAY_FORMAT).ok()?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}
