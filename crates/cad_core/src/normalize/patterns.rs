//! Shared datetime shape patterns used by the parser, the metrics calculator and the
//! pattern detector.

use std::sync::LazyLock;

use regex::Regex;

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static datetime pattern compiles")
}

/// `MM/DD/YYYY` (also `M/D/YY`), nothing else.
pub static SLASH_DATE_ONLY: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^(\d{1,2})/(\d{1,2})/(\d{4}|\d{2})$"));

/// `YYYY-MM-DD`, nothing else.
pub static ISO_DATE_ONLY: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^(\d{4})-(\d{1,2})-(\d{1,2})$"));

/// `MM-DD-YYYY`, nothing else.
pub static US_HYPHEN_DATE_ONLY: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^(\d{1,2})-(\d{1,2})-(\d{4})$"));

/// `H:MM[:SS[.fff]][ AM|PM]`
pub static CLOCK: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"^(\d{1,2}):(\d{2})(?::(\d{2})(?:\.(\d{1,9}))?)?\s*(?i:([ap])\.?m\.?)?$")
});

/// Clock with a meridiem suffix; such values are time-only even when longer than 8 chars.
pub static CLOCK_WITH_MERIDIEM: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^\d{1,2}:\d{2}(?::\d{2})?\s*(?i:[ap]\.?m\.?)$"));

/// `MM/DD/YYYY HH:MM` without seconds.
pub static SLASH_DATETIME_NO_SECONDS: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^\d{1,2}/\d{1,2}/\d{4} \d{1,2}:\d{2}$"));

/// Time-only sample value as exported in split layouts: `H:MM[:SS]`.
pub static SAMPLE_TIME_ONLY: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^\d{1,2}:\d{2}(?::\d{2})?$"));

/// Full `MM/DD/YYYY HH:MM[:SS]` sample value.
pub static SAMPLE_SLASH_DATETIME: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^\d{1,2}/\d{1,2}/\d{4}\s+\d{1,2}:\d{2}(?::\d{2})?(?:\s*[AaPp][Mm])?$"));

/// Accepted full-datetime sample shapes for combined layouts.
pub static FULL_DATETIME_SHAPES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^\d{1,2}/\d{1,2}/\d{4}\s+\d{1,2}:\d{2}(?::\d{2})?(?:\s*[AaPp][Mm])?$",
        r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?(?:Z|[+-]\d{2}:?\d{2})?$",
        r"^\d{1,2}-\d{1,2}-\d{4}\s+\d{1,2}:\d{2}(?::\d{2})?$",
    ]
    .iter()
    .map(|p| compile(p))
    .collect()
});

/// `1-4 digits` hyphen `1-2 digits`: evidence of a (possibly truncated) ISO date.
pub static HYPHEN_DATE_REMNANT: LazyLock<Regex> = LazyLock::new(|| compile(r"\d{1,4}-\d{1,2}"));

pub static ISO_DATE_IN_TEXT: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(\d{4})-(\d{1,2})-(\d{1,2})"));

pub static MONTH_DAY_REMNANT: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?:^|\D)(\d{1,2})-(\d{1,2})$"));

pub static YEAR_IN_TEXT: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?:^|\D)(19\d{2}|20\d{2})(?:\D|$)"));

pub static CLOCK_IN_TEXT: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(\d{1,2}):(\d{2})(?::(\d{2}))?"));

/// Explicit UTC marker or numeric offset trailing a timestamp.
pub static TRAILING_OFFSET: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?:Z|[+-]\d{2}:?\d{2})$"));

/// True when the value carries a calendar date but no time of day.
pub fn is_date_only(value: &str) -> bool {
    let v = value.trim();
    SLASH_DATE_ONLY.is_match(v) || ISO_DATE_ONLY.is_match(v) || US_HYPHEN_DATE_ONLY.is_match(v)
}
