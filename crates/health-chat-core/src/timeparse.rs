//! Requested appointment time parsing.
//!
//! Pulls a date fragment ("March 5", "on Mar 5, 2025", "2025-03-05",
//! "tomorrow at 3pm", "friday 11am") and a time fragment ("3pm", "at 10:30",
//! "2:15 p.m.") out of free text and combines them. Components that are not
//! mentioned are filled in from `now`: the current year, today's date, or
//! midnight. Day words count only next to a clock time.

use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{Datelike, Duration, Month, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use regex::{Captures, Regex};

/// Display format used in replies, e.g. "March 05, 2025 at 02:30 PM".
pub const APPOINTMENT_FORMAT: &str = "%B %d, %Y at %I:%M %p";

pub fn format_appointment(dt: &NaiveDateTime) -> String {
    dt.format(APPOINTMENT_FORMAT).to_string()
}

/// Parse with the default (lenient) settings.
pub fn parse_requested_time(text: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    TimeParser::default().parse(text, now)
}

/// Appointment time parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeParser {
    /// Reject times that are not strictly after `now`
    pub require_future: bool,
}

impl TimeParser {
    pub fn new(require_future: bool) -> Self {
        Self { require_future }
    }

    /// Parse a requested time out of `text`, or `None` if nothing usable is there.
    pub fn parse(&self, text: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
        let time = find_time(text).ok()?;
        // A day word alone ("today", "on Monday") is not a requested time.
        let date = match find_calendar_date(text, now.date()).ok()? {
            Some(date) => Some(date),
            None if time.is_some() => find_relative_day(text, now.date()).ok()?,
            None => None,
        };

        let parsed = match (date, time) {
            (None, None) => return None,
            (Some(date), time) => date.and_time(time.unwrap_or(NaiveTime::MIN)),
            (None, Some(time)) => now.date().and_time(time),
        };

        if self.require_future && parsed <= now {
            return None;
        }
        Some(parsed)
    }
}

fn month_day_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:on\s+)?([a-z]{3,9})\.?\s+(\d{1,2})(?:st|nd|rd|th)?(?:,?\s+(\d{4}))?\b")
            .expect("month/day pattern is valid")
    })
}

fn iso_date_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").expect("ISO date pattern is valid"))
}

fn relative_day_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(today|tomorrow|monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b")
            .expect("relative day pattern is valid")
    })
}

fn time_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // A bare number is never a time: it needs minutes or am/pm.
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:at\s+)?(\d{1,2})(?::(\d{2}))?\s?([ap])\.?m\b\.?|\b(?:at\s+)?(\d{1,2}):(\d{2})\b",
        )
        .expect("time pattern is valid")
    })
}

/// A fragment was found but names an impossible date or time.
#[derive(Debug)]
struct OutOfRange;

type Found<T> = Result<Option<T>, OutOfRange>;

fn find_calendar_date(text: &str, today: NaiveDate) -> Found<NaiveDate> {
    for caps in month_day_regex().captures_iter(text) {
        let Some(month) = parse_month(&caps[1]) else {
            continue;
        };
        let day: u32 = caps[2].parse().map_err(|_| OutOfRange)?;
        let year = match caps.get(3) {
            Some(y) => y.as_str().parse().map_err(|_| OutOfRange)?,
            None => today.year(),
        };
        return NaiveDate::from_ymd_opt(year, month, day)
            .map(Some)
            .ok_or(OutOfRange);
    }

    if let Some(caps) = iso_date_regex().captures(text) {
        let year = caps[1].parse().map_err(|_| OutOfRange)?;
        let month = caps[2].parse().map_err(|_| OutOfRange)?;
        let day = caps[3].parse().map_err(|_| OutOfRange)?;
        return NaiveDate::from_ymd_opt(year, month, day)
            .map(Some)
            .ok_or(OutOfRange);
    }

    Ok(None)
}

fn find_relative_day(text: &str, today: NaiveDate) -> Found<NaiveDate> {
    let Some(caps) = relative_day_regex().captures(text) else {
        return Ok(None);
    };
    let date = match caps[1].to_lowercase().as_str() {
        "today" => Some(today),
        "tomorrow" => today.succ_opt(),
        day => {
            let weekday = Weekday::from_str(day).map_err(|_| OutOfRange)?;
            let ahead = (7 + weekday.num_days_from_monday() as i64
                - today.weekday().num_days_from_monday() as i64)
                % 7;
            today.checked_add_signed(Duration::days(ahead))
        }
    };
    date.map(Some).ok_or(OutOfRange)
}

fn find_time(text: &str) -> Found<NaiveTime> {
    let Some(caps) = time_regex().captures(text) else {
        return Ok(None);
    };
    let time = if caps.get(1).is_some() {
        meridiem_time(&caps)
    } else {
        let hour = caps[4].parse().map_err(|_| OutOfRange)?;
        let minute = caps[5].parse().map_err(|_| OutOfRange)?;
        NaiveTime::from_hms_opt(hour, minute, 0)
    };
    time.map(Some).ok_or(OutOfRange)
}

fn meridiem_time(caps: &Captures<'_>) -> Option<NaiveTime> {
    let hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    if !(1..=12).contains(&hour) {
        return None;
    }
    let pm = caps[3].eq_ignore_ascii_case("p");
    let hour = match (hour, pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, false) => h,
        (h, true) => h + 12,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn parse_month(word: &str) -> Option<u32> {
    if word.eq_ignore_ascii_case("sept") {
        return Some(9);
    }
    Month::from_str(word).ok().map(|m| m.number_from_month())
}
