//! Free-text date and time resolution for deadlines and send times.
//!
//! Understands English and Russian relative expressions ("tomorrow",
//! "послезавтра", "in 2 hours", "через 3 дня", "в течение 5 дней",
//! "next week", "к пятнице", "end of month") and absolute forms
//! (`2025-03-14 10:30`, `14.03`, `14.03.2025`, `18:00`). All arithmetic is
//! relative to the `now` passed in, in UTC.

use std::sync::OnceLock;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeDelta, Utc, Weekday};
use regex::{Captures, Regex};
use tracing::{debug, error};

/// Hour used for absolute dates given without a time.
const DEFAULT_HOUR: u32 = 9;

pub struct DateParser {
    iso: Regex,
    dotted: Regex,
    offset: Regex,
    within: Regex,
    weekday: Regex,
    clock: Regex,
    deadline_marker: Regex,
}

impl DateParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            iso: Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})(?:[ t](\d{1,2}):(\d{2}))?\b")?,
            dotted: Regex::new(r"\b(\d{1,2})\.(\d{1,2})(?:\.(\d{2,4}))?\b")?,
            offset: Regex::new(
                r"\b(?:через|in)\s+(?:(\d+)|an?)?\s*(минут\w*|мин\b|minutes?\b|mins?\b|час\w*|hours?\b|дн\w*|день\b|days?\b|недел\w*|weeks?\b)",
            )?,
            within: Regex::new(r"(?:в течение|within)\s+(\d+)\s*(?:дн\w*|день|days?)")?,
            weekday: Regex::new(
                r"\b(понедельник[аеу]?|вторник[аеу]?|сред[аеуы]|четверг[аеу]?|пятниц[аеуы]|суббот[аеуы]|воскресень[еяю]|monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b",
            )?,
            clock: Regex::new(r"\b([01]?\d|2[0-3]):([0-5]\d)\b")?,
            deadline_marker: Regex::new(
                r"(?:\b(?:к|до|by|before|until|due|дедлайн|deadline|срок)\b:?)\s+([^.,;!?\n]+)",
            )?,
        })
    }

    /// Resolve a free-text time expression.
    pub fn parse(&self, text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let text = text.trim().to_lowercase();
        if text.is_empty() || matches!(text.as_str(), "не указано" | "none" | "null" | "n/a") {
            return None;
        }

        if let Some(caps) = self.iso.captures(&text) {
            let date = NaiveDate::from_ymd_opt(num(&caps, 1)?, num(&caps, 2)?, num(&caps, 3)?)?;
            let time = match (caps.get(4), caps.get(5)) {
                (Some(_), Some(_)) => NaiveTime::from_hms_opt(num(&caps, 4)?, num(&caps, 5)?, 0)?,
                _ => self.clock_time(&text).unwrap_or(default_time()?),
            };
            return Some(date.and_time(time).and_utc());
        }

        if let Some(caps) = self.offset.captures(&text) {
            let n: i64 = match caps.get(1) {
                Some(m) => m.as_str().parse().ok()?,
                None => 1,
            };
            let unit = caps.get(2).map_or("", |m| m.as_str());
            let delta = if unit.starts_with("мин") || unit.starts_with("min") {
                TimeDelta::try_minutes(n)
            } else if unit.starts_with("час") || unit.starts_with("hour") {
                TimeDelta::try_hours(n)
            } else if unit.starts_with("недел") || unit.starts_with("week") {
                TimeDelta::try_weeks(n)
            } else {
                TimeDelta::try_days(n)
            };
            return shift(now, delta);
        }

        if let Some(caps) = self.within.captures(&text) {
            let days = caps.get(1)?.as_str().parse().ok()?;
            return shift(now, TimeDelta::try_days(days));
        }

        let day = self.relative_day(&text, now);
        let clock = self.clock_time(&text);
        match (day, clock) {
            (Some(day), Some(time)) => Some(day.and_time(time).and_utc()),
            (Some(day), None) => Some(day.and_time(now.time()).and_utc()),
            (None, Some(time)) => {
                let today = now.date_naive().and_time(time).and_utc();
                if today > now {
                    Some(today)
                } else {
                    today.checked_add_signed(Duration::days(1))
                }
            }
            (None, None) => {
                debug!(text = %text, "no date expression recognised");
                None
            }
        }
    }

    /// Find a deadline inside a longer sentence.
    ///
    /// Phrases introduced by a deadline marker ("к", "до", "by", "срок")
    /// are tried first, then the whole text.
    pub fn find_deadline(&self, text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let lower = text.to_lowercase();
        self.deadline_marker
            .captures_iter(&lower)
            .filter_map(|caps| caps.get(1))
            .find_map(|m| self.parse(m.as_str(), now))
            .or_else(|| self.parse(&lower, now))
    }

    /// Day-level expressions: today/tomorrow, weekdays, next week, end of month,
    /// and `DD.MM[.YYYY]`.
    fn relative_day(&self, text: &str, now: DateTime<Utc>) -> Option<NaiveDate> {
        let today = now.date_naive();

        // "послезавтра" contains "завтра", so it is checked first.
        if text.contains("послезавтра") || text.contains("day after tomorrow") {
            return today.checked_add_signed(Duration::days(2));
        }
        if text.contains("завтра") || text.contains("tomorrow") {
            return today.checked_add_signed(Duration::days(1));
        }
        if text.contains("сегодня") || text.contains("today") || text.contains("tonight") {
            return Some(today);
        }
        if (text.contains("конц") && text.contains("месяц"))
            || text.contains("end of month")
            || text.contains("end of the month")
        {
            return last_day_of_month(today);
        }

        let next_week =
            text.contains("next week") || (text.contains("следующ") && text.contains("недел"));
        let next_monday = today.checked_add_signed(Duration::days(
            7 - today.weekday().num_days_from_monday() as i64,
        ))?;
        if let Some(caps) = self.weekday.captures(text) {
            let target = weekday_from(caps.get(1)?.as_str())?;
            if next_week {
                return next_monday
                    .checked_add_signed(Duration::days(target.num_days_from_monday() as i64));
            }
            let mut ahead = (7 + target.num_days_from_monday() as i64
                - today.weekday().num_days_from_monday() as i64)
                % 7;
            if ahead == 0 {
                ahead = 7;
            }
            return today.checked_add_signed(Duration::days(ahead));
        }
        if next_week {
            return Some(next_monday);
        }
        if let Some(caps) = self.dotted.captures(text) {
            let day: u32 = num(&caps, 1)?;
            let month: u32 = num(&caps, 2)?;
            return match caps.get(3) {
                Some(y) => {
                    let mut year: i32 = y.as_str().parse().ok()?;
                    if year < 100 {
                        year += 2000;
                    }
                    NaiveDate::from_ymd_opt(year, month, day)
                }
                None => {
                    let this_year = NaiveDate::from_ymd_opt(today.year(), month, day)?;
                    if this_year >= today {
                        Some(this_year)
                    } else {
                        NaiveDate::from_ymd_opt(today.year() + 1, month, day)
                    }
                }
            };
        }
        None
    }

    fn clock_time(&self, text: &str) -> Option<NaiveTime> {
        let caps = self.clock.captures(text)?;
        NaiveTime::from_hms_opt(num(&caps, 1)?, num(&caps, 2)?, 0)
    }
}

fn shared() -> Option<&'static DateParser> {
    static PARSER: OnceLock<Option<DateParser>> = OnceLock::new();
    PARSER
        .get_or_init(|| match DateParser::new() {
            Ok(p) => Some(p),
            Err(e) => {
                error!(error = %e, "date patterns failed to compile");
                None
            }
        })
        .as_ref()
}

/// Resolve a free-text time expression with the shared parser.
pub fn parse_when(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    shared()?.parse(text, now)
}

/// Find a deadline inside a sentence with the shared parser.
pub fn find_deadline(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    shared()?.find_deadline(text, now)
}

fn num<T: std::str::FromStr>(caps: &Captures<'_>, idx: usize) -> Option<T> {
    caps.get(idx)?.as_str().parse().ok()
}

/// `now + delta`, or `None` when the offset is out of range.
fn shift(now: DateTime<Utc>, delta: Option<TimeDelta>) -> Option<DateTime<Utc>> {
    let shifted = delta.and_then(|d| now.checked_add_signed(d));
    if shifted.is_none() {
        debug!("time offset out of range");
    }
    shifted
}

fn default_time() -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(DEFAULT_HOUR, 0, 0)
}

fn last_day_of_month(date: NaiveDate) -> Option<NaiveDate> {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)?.pred_opt()
}

fn weekday_from(word: &str) -> Option<Weekday> {
    let stems = [
        ("понедельник", Weekday::Mon),
        ("monday", Weekday::Mon),
        ("вторник", Weekday::Tue),
        ("tuesday", Weekday::Tue),
        ("сред", Weekday::Wed),
        ("wednesday", Weekday::Wed),
        ("четверг", Weekday::Thu),
        ("thursday", Weekday::Thu),
        ("пятниц", Weekday::Fri),
        ("friday", Weekday::Fri),
        ("суббот", Weekday::Sat),
        ("saturday", Weekday::Sat),
        ("воскресен", Weekday::Sun),
        ("sunday", Weekday::Sun),
    ];
    stems
        .iter()
        .find(|(stem, _)| word.starts_with(stem))
        .map(|(_, day)| *day)
}
