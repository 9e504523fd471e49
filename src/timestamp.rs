//! Timestamps are microseconds since the Unix epoch everywhere in the core
//! (spec §3, §6). This module is the parser contract of §6's "Timestamp
//! format" paragraph, following `TimestampHelper.hpp`/`.cpp` from the
//! original implementation (see `examples/original_source/`).

use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::PipeError;

/// Microseconds since 1970-01-01T00:00:00Z.
pub type Timestamp = u64;

/// The current wall-clock time, used to stamp elements created outside of
/// any source-provided event time (e.g. `assignTimestamps` default, or
/// punctuations emitted by operators that have no event-time input).
pub fn now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_micros() as Timestamp
}

/// Parses one of the three accepted forms from §6:
///   - a decimal integer: milliseconds since epoch
///   - `YYYY-MM-DD HH:MM:SS[.fff]`
///   - `YYYYMMDDTHHMMSS[.ffffff]`
///
/// Always returns microseconds since the Unix epoch.
pub fn parse_timestamp(s: &str) -> Result<Timestamp, PipeError> {
    let s = s.trim();
    if let Ok(millis) = s.parse::<i64>() {
        if millis < 0 {
            return Err(PipeError::Parse(format!(
                "timestamp {s} precedes the Unix epoch"
            )));
        }
        return Ok(millis as Timestamp * 1_000);
    }
    if let Some((date, time)) = s.split_once(' ') {
        return parse_date_time(date, time, '-');
    }
    if let Some(idx) = s.find('T') {
        let (date, time) = s.split_at(idx);
        return parse_date_time(date, &time[1..], '\0');
    }
    Err(PipeError::Parse(format!("unrecognized timestamp: {s}")))
}

fn parse_date_time(date: &str, time: &str, date_sep: char) -> Result<Timestamp, PipeError> {
    let (y, m, d) = if date_sep == '-' {
        let mut it = date.split('-');
        let y: i64 = next_num(&mut it, date)?;
        let m: i64 = next_num(&mut it, date)?;
        let d: i64 = next_num(&mut it, date)?;
        (y, m, d)
    } else {
        if date.len() != 8 {
            return Err(PipeError::Parse(format!("bad date: {date}")));
        }
        (
            date[0..4]
                .parse()
                .map_err(|_| PipeError::Parse(format!("bad date: {date}")))?,
            date[4..6]
                .parse()
                .map_err(|_| PipeError::Parse(format!("bad date: {date}")))?,
            date[6..8]
                .parse()
                .map_err(|_| PipeError::Parse(format!("bad date: {date}")))?,
        )
    };

    let (hms, frac) = match time.split_once('.') {
        Some((a, b)) => (a, Some(b)),
        None => (time, None),
    };
    let (hh, mm, ss) = if date_sep == '-' {
        let mut it = hms.split(':');
        (
            next_num(&mut it, hms)?,
            next_num(&mut it, hms)?,
            next_num(&mut it, hms)?,
        )
    } else {
        if hms.len() != 6 {
            return Err(PipeError::Parse(format!("bad time: {hms}")));
        }
        (
            hms[0..2]
                .parse()
                .map_err(|_| PipeError::Parse(format!("bad time: {hms}")))?,
            hms[2..4]
                .parse()
                .map_err(|_| PipeError::Parse(format!("bad time: {hms}")))?,
            hms[4..6]
                .parse()
                .map_err(|_| PipeError::Parse(format!("bad time: {hms}")))?,
        )
    };

    let micros_frac: i64 = match frac {
        None => 0,
        Some(f) => {
            let mut digits = f.to_string();
            while digits.len() < 6 {
                digits.push('0');
            }
            digits.truncate(6);
            digits
                .parse()
                .map_err(|_| PipeError::Parse(format!("bad fractional seconds: {f}")))?
        }
    };

    let days = days_from_civil(y, m, d);
    let secs = days * 86_400 + hh * 3_600 + mm * 60 + ss;
    if secs < 0 {
        return Err(PipeError::Parse(
            "timestamp precedes the Unix epoch".to_string(),
        ));
    }
    Ok(secs as Timestamp * 1_000_000 + micros_frac as Timestamp)
}

fn next_num(it: &mut std::str::Split<'_, char>, ctx: &str) -> Result<i64, PipeError> {
    it.next()
        .ok_or_else(|| PipeError::Parse(format!("bad timestamp component in {ctx}")))?
        .parse()
        .map_err(|_| PipeError::Parse(format!("bad timestamp component in {ctx}")))
}

/// Howard Hinnant's days-from-civil algorithm, proleptic Gregorian, days
/// since 1970-01-01.
fn days_from_civil(y: i64, m: i64, d: i64) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as i64;
    let mp = (m + 9) % 12;
    let doy = (153 * mp + 2) / 5 + d - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_millis() {
        assert_eq!(parse_timestamp("1000").unwrap(), 1_000_000);
    }

    #[test]
    fn parses_space_separated() {
        let ts = parse_timestamp("1970-01-01 00:00:01.500").unwrap();
        assert_eq!(ts, 1_500_000);
    }

    #[test]
    fn parses_compact_form() {
        let ts = parse_timestamp("19700101T000001.500000").unwrap();
        assert_eq!(ts, 1_500_000);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_timestamp("not-a-timestamp").is_err());
    }
}
