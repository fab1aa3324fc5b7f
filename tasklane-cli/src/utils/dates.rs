//! Parsing of dates typed on the command line.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM` (local time), or `YYYY-MM-DD` (local midnight).
pub fn parse_datetime(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M"))
        .or_else(|_| {
            NaiveDate::parse_from_str(input, "%Y-%m-%d").map(|d| d.and_time(NaiveTime::MIN))
        })
        .map_err(|_| {
            anyhow!(
                "Invalid date '{}'. Use YYYY-MM-DD, YYYY-MM-DDTHH:MM or RFC 3339",
                input
            )
        })?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| anyhow!("'{}' does not exist in the local time zone", input))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc3339_exactly() {
        let dt = parse_datetime("2025-03-20T15:00:00Z").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2025, 3, 20, 15, 0, 0).unwrap());
    }

    #[test]
    fn parses_local_forms() {
        let day = parse_datetime("2025-03-20").unwrap();
        let time = parse_datetime("2025-03-20T15:00").unwrap();
        assert_eq!(time - day, chrono::Duration::hours(15));
    }

    #[test]
    fn rejects_nonsense() {
        assert!(parse_datetime("next tuesday").is_err());
    }
}
