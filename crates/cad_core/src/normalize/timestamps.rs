use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::macros::format_description;
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time};

use crate::config::EngineConfig;
use crate::diagnostics::Diagnostics;
use crate::domain::ValidationWarning;
use crate::normalize::patterns::{
    CLOCK, CLOCK_IN_TEXT, CLOCK_WITH_MERIDIEM, HYPHEN_DATE_REMNANT, ISO_DATE_IN_TEXT,
    ISO_DATE_ONLY, MONTH_DAY_REMNANT, SLASH_DATETIME_NO_SECONDS, SLASH_DATE_ONLY,
    TRAILING_OFFSET, US_HYPHEN_DATE_ONLY, YEAR_IN_TEXT,
};

/// Naive local wall-clock time. CAD exports never carry a reliable zone, so nothing in the
/// engine converts to or from UTC.
pub type LocalDateTime = PrimitiveDateTime;

/// Heterogeneous CAD timestamp parser.
///
/// Contract:
/// - Never fails: unrecoverable input yields `None` plus a `TS_*` warning.
/// - Time-only values (`14:30:00`, `2:30 PM`) need a reference date and are placed on it.
/// - Two-digit years below the pivot are 20xx, the rest 19xx.
/// - Explicit offsets are discarded with a note; the wall-clock value is kept as written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampParser {
    two_digit_year_pivot: u8,
}

impl Default for TimestampParser {
    fn default() -> Self {
        Self {
            two_digit_year_pivot: 30,
        }
    }
}

impl TimestampParser {
    pub fn new(two_digit_year_pivot: u8) -> Self {
        Self {
            two_digit_year_pivot: two_digit_year_pivot.min(99),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.two_digit_year_pivot)
    }

    /// Parse `raw` (optionally anchored on `reference`, a date or datetime string).
    ///
    /// `field` only labels diagnostics. Empty input is "missing", not "unparseable", and
    /// returns `None` silently.
    pub fn parse(
        &self,
        field: &str,
        raw: &str,
        reference: Option<&str>,
        diag: &mut dyn Diagnostics,
    ) -> Option<LocalDateTime> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        let repaired = match repair_t_separated(field, trimmed, diag) {
            TRepair::Unchanged => None,
            TRepair::Rebuilt(v) => Some(v),
            TRepair::Invalid(reason) => {
                warn_unparseable(field, raw, reason, diag);
                return None;
            }
        };
        let value = repaired.as_deref().unwrap_or(trimmed);

        if is_time_only(value) {
            return self.parse_time_only(field, value, reference, diag);
        }

        let value = if SLASH_DATETIME_NO_SECONDS.is_match(value) {
            format!("{value}:00")
        } else {
            value.to_string()
        };

        if value.contains('/') {
            let parsed = self.parse_slash(&value, field, diag);
            if parsed.is_none() {
                warn_unparseable(field, raw, "slash date", diag);
            }
            return parsed;
        }

        let hyphen_date_first = value
            .split_once(char::is_whitespace)
            .is_some_and(|(d, _)| ISO_DATE_ONLY.is_match(d) || US_HYPHEN_DATE_ONLY.is_match(d));
        if hyphen_date_first {
            let parsed = parse_hyphen_with_clock(&value);
            if parsed.is_none() {
                warn_unparseable(field, raw, "hyphen date with time", diag);
            }
            return parsed;
        }

        match parse_generic(&value) {
            Some((dt, caution)) => {
                if let Some(caution) = caution {
                    diag.info(
                        ValidationWarning::new(
                            "TS_TIMEZONE_AMBIGUOUS",
                            format!("Interpreted {field} as local wall-clock time"),
                        )
                        .with_details(format!("value={trimmed}; {caution}")),
                    );
                }
                Some(dt)
            }
            None => {
                warn_unparseable(field, raw, "no supported format", diag);
                None
            }
        }
    }

    /// Calendar date of a reference string (`MM/DD/YYYY`, `YYYY-MM-DD`, or a datetime
    /// starting with either).
    pub fn parse_date(&self, raw: &str) -> Option<Date> {
        let trimmed = raw.trim();
        let token = trimmed.split_whitespace().next()?;
        let token = match token.split_once('T') {
            Some((date, _)) if ISO_DATE_ONLY.is_match(date) => date,
            _ => token,
        };
        self.parse_slash_date(token)
            .or_else(|| parse_hyphen_date(token))
    }

    fn parse_time_only(
        &self,
        field: &str,
        value: &str,
        reference: Option<&str>,
        diag: &mut dyn Diagnostics,
    ) -> Option<LocalDateTime> {
        let Some(reference) = reference.map(str::trim).filter(|r| !r.is_empty()) else {
            diag.warn(
                ValidationWarning::new(
                    "TS_TIME_ONLY_WITHOUT_REFERENCE",
                    format!("Time-only {field} requires a reference date"),
                )
                .with_details(format!("value={value}")),
            );
            return None;
        };

        let Some(date) = self.parse_date(reference) else {
            diag.warn(
                ValidationWarning::new(
                    "TS_REFERENCE_DATE_UNPARSEABLE",
                    format!("Reference date for {field} is unparseable"),
                )
                .with_details(format!("value={value}; reference={reference}")),
            );
            return None;
        };

        match parse_clock(value) {
            Some(t) => Some(PrimitiveDateTime::new(date, t)),
            None => {
                warn_unparseable(field, value, "invalid time of day", diag);
                None
            }
        }
    }

    fn parse_slash(
        &self,
        value: &str,
        field: &str,
        diag: &mut dyn Diagnostics,
    ) -> Option<LocalDateTime> {
        let (date_part, clock_part) = match value.split_once(char::is_whitespace) {
            Some((d, rest)) => (d, Some(rest.trim())),
            None => (value, None),
        };

        let date = self.parse_slash_date(date_part)?;
        if let Some(caps) = SLASH_DATE_ONLY.captures(date_part) {
            if caps[3].len() == 2 {
                diag.info(
                    ValidationWarning::new(
                        "TS_TWO_DIGIT_YEAR_EXPANDED",
                        format!("Expanded two-digit year in {field}"),
                    )
                    .with_details(format!("value={value}; year={}", date.year())),
                );
            }
        }

        let clock = match clock_part.filter(|c| !c.is_empty()) {
            Some(c) => parse_clock(c)?,
            None => Time::MIDNIGHT,
        };
        Some(PrimitiveDateTime::new(date, clock))
    }

    fn parse_slash_date(&self, token: &str) -> Option<Date> {
        let caps = SLASH_DATE_ONLY.captures(token)?;
        let month: u8 = caps[1].parse().ok()?;
        let day: u8 = caps[2].parse().ok()?;
        let year_raw = &caps[3];
        let year: i32 = year_raw.parse().ok()?;
        let year = if year_raw.len() == 2 {
            self.expand_two_digit_year(year)
        } else {
            year
        };
        calendar_date(year, month, day)
    }

    fn expand_two_digit_year(&self, yy: i32) -> i32 {
        if yy < i32::from(self.two_digit_year_pivot) {
            2000 + yy
        } else {
            1900 + yy
        }
    }
}

/// Parse with default settings (two-digit-year pivot 30).
pub fn parse_timestamp(
    field: &str,
    raw: &str,
    reference: Option<&str>,
    diag: &mut dyn Diagnostics,
) -> Option<LocalDateTime> {
    TimestampParser::default().parse(field, raw, reference, diag)
}

fn warn_unparseable(field: &str, raw: &str, reason: &str, diag: &mut dyn Diagnostics) {
    diag.warn(
        ValidationWarning::new("TS_UNPARSEABLE", format!("Unparseable timestamp for {field}"))
            .with_details(format!("raw={}; reason={reason}", raw.trim())),
    );
}

fn is_time_only(value: &str) -> bool {
    let short = value.chars().count() <= 8
        && value.contains(':')
        && !value.contains('/')
        && !value.contains('-');
    short || CLOCK_WITH_MERIDIEM.is_match(value)
}

fn calendar_date(year: i32, month: u8, day: u8) -> Option<Date> {
    let month = Month::try_from(month).ok()?;
    Date::from_calendar_date(year, month, day).ok()
}

/// `YYYY-MM-DD` or `MM-DD-YYYY`.
fn parse_hyphen_date(token: &str) -> Option<Date> {
    if let Some(caps) = ISO_DATE_ONLY.captures(token) {
        return calendar_date(caps[1].parse().ok()?, caps[2].parse().ok()?, caps[3].parse().ok()?);
    }
    let caps = US_HYPHEN_DATE_ONLY.captures(token)?;
    calendar_date(caps[3].parse().ok()?, caps[1].parse().ok()?, caps[2].parse().ok()?)
}

fn parse_hyphen_with_clock(value: &str) -> Option<LocalDateTime> {
    let (date_part, clock_part) = value.split_once(char::is_whitespace)?;
    let date = parse_hyphen_date(date_part.trim())?;
    let clock = parse_clock(clock_part.trim())?;
    Some(PrimitiveDateTime::new(date, clock))
}

/// `H:MM[:SS[.fff]][ AM|PM]` -> time of day.
pub(crate) fn parse_clock(value: &str) -> Option<Time> {
    let caps = CLOCK.captures(value.trim())?;
    let mut hour: u8 = caps[1].parse().ok()?;
    let minute: u8 = caps[2].parse().ok()?;
    let second: u8 = match caps.get(3) {
        Some(s) => s.as_str().parse().ok()?,
        None => 0,
    };
    let nanos: u32 = match caps.get(4) {
        Some(f) => {
            let mut digits = f.as_str().to_string();
            while digits.len() < 9 {
                digits.push('0');
            }
            digits.parse().ok()?
        }
        None => 0,
    };

    if let Some(meridiem) = caps.get(5) {
        if hour == 0 || hour > 12 {
            return None;
        }
        let pm = meridiem.as_str().eq_ignore_ascii_case("p");
        hour = match (pm, hour) {
            (false, 12) => 0,
            (true, 12) => 12,
            (true, h) => h + 12,
            (false, h) => h,
        };
    }

    Time::from_hms_nano(hour, minute, second, nanos).ok()
}

enum TRepair {
    /// Not a `T`-separated ISO-like string; parse the original.
    Unchanged,
    Rebuilt(String),
    /// A date was found but the text around `T` is not a valid time of day.
    Invalid(&'static str),
}

/// Dates, years and separators only; nothing that could be a time of day.
fn is_date_residue(text: &str) -> bool {
    let stripped = ISO_DATE_IN_TEXT.replace_all(text, " ");
    let stripped = YEAR_IN_TEXT.replace_all(&stripped, " ");
    stripped
        .chars()
        .all(|c| c.is_whitespace() || c == 'T' || c == '-')
}

/// Repair `T`-separated values mangled by vendor exports.
///
/// Handles:
/// - the same value duplicated around the separator (`X T X` -> `X`),
/// - a well-formed or corrupted date before the separator plus a clock after it,
/// - a truncated `MM-DD` remnant whose year appears elsewhere in the string.
///
/// Only an empty or offset-only remainder after `T` yields a date at midnight.
fn repair_t_separated(field: &str, value: &str, diag: &mut dyn Diagnostics) -> TRepair {
    let Some((before, after)) = value.split_once('T') else {
        return TRepair::Unchanged;
    };
    let (before, after) = (before.trim(), after.trim());

    if !before.is_empty() && before == after {
        diag.info(
            ValidationWarning::new(
                "TS_DUPLICATE_COLLAPSED",
                format!("Collapsed duplicated timestamp in {field}"),
            )
            .with_details(format!("raw={value}")),
        );
        return TRepair::Rebuilt(before.to_string());
    }

    if !HYPHEN_DATE_REMNANT.is_match(before) {
        return TRepair::Unchanged;
    }

    let date = ISO_DATE_IN_TEXT
        .captures_iter(before)
        .find_map(|caps| {
            calendar_date(caps[1].parse().ok()?, caps[2].parse().ok()?, caps[3].parse().ok()?)
        })
        .or_else(|| {
            let caps = MONTH_DAY_REMNANT.captures(before)?;
            let year = YEAR_IN_TEXT.captures(value)?;
            calendar_date(year[1].parse().ok()?, caps[1].parse().ok()?, caps[2].parse().ok()?)
        });
    let Some(date) = date else {
        return TRepair::Unchanged;
    };

    let after_clock = TRAILING_OFFSET.replace(after, "");
    let clock = match CLOCK_IN_TEXT
        .captures(&after_clock)
        .or_else(|| CLOCK_IN_TEXT.captures(before))
    {
        Some(caps) => {
            let h: u8 = caps[1].parse().unwrap_or(u8::MAX);
            let m: u8 = caps[2].parse().unwrap_or(u8::MAX);
            let s: u8 = caps.get(3).map_or(Ok(0), |v| v.as_str().parse()).unwrap_or(u8::MAX);
            match Time::from_hms(h, m, s) {
                Ok(t) => Some(t),
                Err(_) => return TRepair::Invalid("invalid time of day after T"),
            }
        }
        None if is_date_residue(&after_clock) => None,
        None => return TRepair::Invalid("no time of day after T"),
    };

    if TRAILING_OFFSET.is_match(after) {
        diag.info(
            ValidationWarning::new(
                "TS_OFFSET_DISCARDED",
                format!("Discarded explicit offset on {field}; kept wall-clock value"),
            )
            .with_details(format!("raw={value}")),
        );
    }

    let rebuilt = match clock {
        Some(t) => format!(
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            date.year(),
            u8::from(date.month()),
            date.day(),
            t.hour(),
            t.minute(),
            t.second()
        ),
        None => format!(
            "{:04}-{:02}-{:02}",
            date.year(),
            u8::from(date.month()),
            date.day()
        ),
    };

    let as_written = value.replacen('T', " ", 1);
    if rebuilt != TRAILING_OFFSET.replace(&as_written, "") {
        diag.info(
            ValidationWarning::new(
                "TS_REPAIRED",
                format!("Reconstructed malformed timestamp for {field}"),
            )
            .with_details(format!("raw={value}; repaired={rebuilt}")),
        );
    }
    TRepair::Rebuilt(rebuilt)
}

/// Last-resort formats. The second element is a caution when the source was ambiguous
/// about its timezone.
fn parse_generic(value: &str) -> Option<(LocalDateTime, Option<&'static str>)> {
    if let Some(date) = parse_hyphen_date(value) {
        return Some((
            PrimitiveDateTime::new(date, Time::MIDNIGHT),
            Some("date-only ISO value placed at local midnight"),
        ));
    }

    if let Ok(dt) = OffsetDateTime::parse(value, &Rfc3339) {
        return Some((
            PrimitiveDateTime::new(dt.date(), dt.time()),
            Some("explicit offset discarded"),
        ));
    }

    if let Ok(dt) = OffsetDateTime::parse(value, &Rfc2822) {
        return Some((
            PrimitiveDateTime::new(dt.date(), dt.time()),
            Some("explicit offset discarded"),
        ));
    }

    if let Ok(dt) = PrimitiveDateTime::parse(
        value,
        format_description!("[year][month][day][hour][minute][second]"),
    ) {
        return Some((dt, None));
    }

    if let Ok(date) = Date::parse(value, format_description!("[year][month][day]")) {
        return Some((PrimitiveDateTime::new(date, Time::MIDNIGHT), None));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    fn parse(raw: &str, reference: Option<&str>) -> (Option<LocalDateTime>, Vec<ValidationWarning>) {
        let mut warnings = Vec::new();
        let out = parse_timestamp("test", raw, reference, &mut warnings);
        (out, warnings)
    }

    #[test]
    fn slash_datetime_without_seconds_defaults_to_zero() {
        let (dt, w) = parse("01/20/2024 14:28", None);
        assert_eq!(dt, Some(datetime!(2024-01-20 14:28:00)));
        assert!(w.is_empty());
    }

    #[test]
    fn two_digit_years_use_pivot() {
        let (dt, _) = parse("03/22/23", Some("2024-01-20"));
        assert_eq!(dt.map(|d| d.year()), Some(2023));
        let (dt, _) = parse("03/22/85", Some("2024-01-20"));
        assert_eq!(dt.map(|d| d.year()), Some(1985));
        let (dt, _) = parse("03/22/29", None);
        assert_eq!(dt.map(|d| d.year()), Some(2029));
        let (dt, _) = parse("03/22/30", None);
        assert_eq!(dt.map(|d| d.year()), Some(1930));
    }

    #[test]
    fn custom_pivot_moves_century_boundary() {
        let parser = TimestampParser::new(50);
        let mut w = Vec::new();
        let dt = parser.parse("test", "03/22/45", None, &mut w);
        assert_eq!(dt.map(|d| d.year()), Some(2045));
    }

    #[test]
    fn time_only_lands_on_reference_date() {
        let (dt, _) = parse("14:30:00", Some("2024-01-20"));
        assert_eq!(dt, Some(datetime!(2024-01-20 14:30:00)));
        let (dt, _) = parse("14:30", Some("01/20/2024"));
        assert_eq!(dt, Some(datetime!(2024-01-20 14:30:00)));
        let (dt, _) = parse("2:05:09 PM", Some("01/20/2024"));
        assert_eq!(dt, Some(datetime!(2024-01-20 14:05:09)));
    }

    #[test]
    fn time_only_without_reference_warns() {
        let (dt, w) = parse("14:30:00", None);
        assert_eq!(dt, None);
        assert_eq!(w[0].code, "TS_TIME_ONLY_WITHOUT_REFERENCE");

        let (dt, w) = parse("14:30:00", Some("yesterday"));
        assert_eq!(dt, None);
        assert_eq!(w[0].code, "TS_REFERENCE_DATE_UNPARSEABLE");
    }

    #[test]
    fn iso_space_separated_is_local() {
        let (dt, _) = parse("2024-01-15 23:59:59", None);
        assert_eq!(dt, Some(datetime!(2024-01-15 23:59:59)));
    }

    #[test]
    fn iso_t_separated_keeps_wall_clock() {
        let (dt, _) = parse("2024-01-15T23:30:00Z", None);
        assert_eq!(dt, Some(datetime!(2024-01-15 23:30:00)));
        let (dt, _) = parse("2024-01-15T23:30:00-05:00", None);
        assert_eq!(dt, Some(datetime!(2024-01-15 23:30:00)));
    }

    #[test]
    fn duplicated_timestamp_uses_first_occurrence() {
        let mut log = crate::diagnostics::DiagnosticLog::new();
        let dt = parse_timestamp(
            "alarm",
            "2024-01-15 14:30:00T2024-01-15 14:30:00",
            None,
            &mut log,
        );
        assert_eq!(dt, Some(datetime!(2024-01-15 14:30:00)));
        assert!(log.has_code("TS_DUPLICATE_COLLAPSED"));
    }

    #[test]
    fn corrupted_concatenation_is_reconstructed() {
        let (dt, _) = parse("2024-01-15T2024-01-15T14:30:00", None);
        assert_eq!(dt, Some(datetime!(2024-01-15 14:30:00)));

        let (dt, _) = parse("01-15T2024 14:30", None);
        assert_eq!(dt, Some(datetime!(2024-01-15 14:30:00)));
    }

    #[test]
    fn date_only_values_land_at_midnight() {
        let (dt, _) = parse("01/15/2024", None);
        assert_eq!(dt, Some(datetime!(2024-01-15 00:00:00)));
        let mut log = crate::diagnostics::DiagnosticLog::new();
        let dt = parse_timestamp("d", "2024-01-15", None, &mut log);
        assert_eq!(dt, Some(datetime!(2024-01-15 00:00:00)));
        assert!(log.has_code("TS_TIMEZONE_AMBIGUOUS"));
    }

    #[test]
    fn invalid_components_warn_instead_of_failing() {
        for raw in ["13/45/2024 10:00", "02/30/2024", "2024-01-15 25:00:00", "not a date"] {
            let (dt, w) = parse(raw, None);
            assert_eq!(dt, None, "{raw}");
            assert!(
                w.iter().any(|w| w.code == "TS_UNPARSEABLE"),
                "expected warning for {raw}: {w:?}"
            );
        }
    }

    #[test]
    fn t_separated_without_valid_clock_warns() {
        for raw in ["2024-01-15T25:10:00", "2024-01-15Tgarbage", "2024-01-15T14:75"] {
            let (dt, w) = parse(raw, None);
            assert_eq!(dt, None, "{raw}");
            assert!(
                w.iter().any(|w| w.code == "TS_UNPARSEABLE"),
                "expected warning for {raw}: {w:?}"
            );
        }
    }

    #[test]
    fn t_separated_date_with_empty_or_offset_tail_is_midnight() {
        let (dt, w) = parse("2024-01-15T", None);
        assert_eq!(dt, Some(datetime!(2024-01-15 00:00:00)));
        assert!(w.iter().all(|w| w.code != "TS_UNPARSEABLE"));

        let (dt, _) = parse("2024-01-15TZ", None);
        assert_eq!(dt, Some(datetime!(2024-01-15 00:00:00)));
    }

    #[test]
    fn empty_is_missing_without_warning() {
        let (dt, w) = parse("   ", Some("2024-01-15"));
        assert_eq!(dt, None);
        assert!(w.is_empty());
    }

    #[test]
    fn meridiem_edges() {
        assert_eq!(parse_clock("12:00 AM"), Some(time::macros::time!(0:00)));
        assert_eq!(parse_clock("12:15 PM"), Some(time::macros::time!(12:15)));
        assert_eq!(parse_clock("13:00 PM"), None);
    }

    #[test]
    fn reference_date_accepts_datetime_strings() {
        let parser = TimestampParser::default();
        assert_eq!(parser.parse_date("01/15/2024 08:00"), Some(date!(2024-01-15)));
        assert_eq!(parser.parse_date("2024-01-15T08:00:00"), Some(date!(2024-01-15)));
        assert_eq!(parser.parse_date("garbage"), None);
    }

    #[test]
    fn compact_and_rfc2822_forms() {
        let (dt, _) = parse("20240115143000", None);
        assert_eq!(dt, Some(datetime!(2024-01-15 14:30:00)));
        let (dt, _) = parse("Mon, 15 Jan 2024 14:30:00 +0000", None);
        assert_eq!(dt, Some(datetime!(2024-01-15 14:30:00)));
        let (dt, w) = parse("Mon, 15 Jan 2024 14:30:00 -0500", None);
        assert_eq!(dt, Some(datetime!(2024-01-15 14:30:00)));
        assert!(w.iter().all(|w| w.code != "TS_UNPARSEABLE"));
    }
}
