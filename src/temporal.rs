//! # Temporal extraction
//! Best-effort date recovery from headline text.
//!
//! Recognized signals: ISO dates (`2024-03-15`, also the `2024-03-15:` line
//! prefix), `15 March 2024`, `March 15, 2024`, `March 2024`, `2024-03`,
//! preposition + bare month (`in March`), standalone years, and relative
//! phrases (`today`, `this week`, `last month`, ...). Relative phrases and
//! bare months are resolved against an injected `as_of` date.
//!
//! Selection: the most precise granularity wins; equal granularity → the
//! earliest position in the text. No signal → `None`, never a guess.

use chrono::{Datelike, Days, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::ops::Range;

/// Precision of an extracted date, ordered from coarse to fine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Granularity {
    Year,
    Month,
    Week,
    Day,
}

/// A full or partial calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartialDate {
    Day(NaiveDate),
    /// Stored as the Monday that starts the ISO week.
    Week(NaiveDate),
    Month { year: i32, month: u32 },
    Year(i32),
}

impl PartialDate {
    pub fn granularity(&self) -> Granularity {
        match self {
            PartialDate::Day(_) => Granularity::Day,
            PartialDate::Week(_) => Granularity::Week,
            PartialDate::Month { .. } => Granularity::Month,
            PartialDate::Year(_) => Granularity::Year,
        }
    }

    pub fn year(&self) -> i32 {
        match self {
            PartialDate::Day(d) | PartialDate::Week(d) => d.year(),
            PartialDate::Month { year, .. } => *year,
            PartialDate::Year(y) => *y,
        }
    }

    pub fn month(&self) -> Option<u32> {
        match self {
            PartialDate::Day(d) | PartialDate::Week(d) => Some(d.month()),
            PartialDate::Month { month, .. } => Some(*month),
            PartialDate::Year(_) => None,
        }
    }

    /// First calendar day covered by this date.
    pub fn start(&self) -> NaiveDate {
        match self {
            PartialDate::Day(d) | PartialDate::Week(d) => *d,
            PartialDate::Month { year, month } => {
                NaiveDate::from_ymd_opt(*year, *month, 1).unwrap_or(NaiveDate::MIN)
            }
            PartialDate::Year(y) => NaiveDate::from_ymd_opt(*y, 1, 1).unwrap_or(NaiveDate::MIN),
        }
    }
}

impl Ord for PartialDate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.start()
            .cmp(&other.start())
            .then(self.granularity().cmp(&other.granularity()))
    }
}

impl PartialOrd for PartialDate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PartialDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartialDate::Day(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            PartialDate::Week(d) => {
                let w = d.iso_week();
                write!(f, "{}-W{:02}", w.year(), w.week())
            }
            PartialDate::Month { year, month } => write!(f, "{year:04}-{month:02}"),
            PartialDate::Year(y) => write!(f, "{y:04}"),
        }
    }
}

impl Serialize for PartialDate {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

/// A recognized temporal phrase and where it started in the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporalMatch {
    pub date: PartialDate,
    pub start: usize,
    pub phrase: String,
}

const MONTH: &str = r"(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\.?";

static RE_ISO_DAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").expect("iso day regex"));
static RE_ISO_MONTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})\b").expect("iso month regex"));
static RE_DAY_MONTH_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(\d{{1,2}})(?:st|nd|rd|th)?\s+{MONTH},?\s+(\d{{4}})\b"
    ))
    .expect("dmy regex")
});
static RE_MONTH_DAY_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b{MONTH}\s+(\d{{1,2}})(?:st|nd|rd|th)?,?\s+(\d{{4}})\b"
    ))
    .expect("mdy regex")
});
static RE_MONTH_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b{MONTH},?\s+(\d{{4}})\b")).expect("month-year regex")
});
static RE_PREP_MONTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:in|since|during|until|by|early|late|mid)[\s-]+{MONTH}(?:\b|$)"
    ))
    .expect("prep-month regex")
});
static RE_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").expect("year regex"));
static RE_RELATIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(today|yesterday|this\s+week|(?:last|past)\s+week|this\s+month|last\s+month|this\s+year|last\s+year)\b",
    )
    .expect("relative regex")
});

/// Words that turn a four-digit number into a count rather than a year.
const COUNT_NOUNS: &[&str] = &[
    "cases",
    "deaths",
    "dead",
    "people",
    "infections",
    "infected",
    "patients",
    "suspected",
    "new",
];

/// Extract the best temporal signal from `text`, resolving relative phrases against `as_of`.
pub fn extract_date(text: &str, as_of: NaiveDate) -> Option<TemporalMatch> {
    let day_shaped = day_shaped_spans(text);
    let mut found = Vec::new();
    collect_explicit(text, &day_shaped, &mut found);
    collect_month_only(text, as_of, &mut found);
    collect_years(text, &day_shaped, &mut found);
    collect_relative(text, as_of, &mut found);

    found.into_iter().reduce(|best, next| {
        if outranks(&next, &best) {
            next
        } else {
            best
        }
    })
}

/// Finer granularity first, then earlier position.
fn outranks(a: &TemporalMatch, b: &TemporalMatch) -> bool {
    match a.date.granularity().cmp(&b.date.granularity()) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => a.start < b.start,
    }
}

fn push(out: &mut Vec<TemporalMatch>, date: PartialDate, m: regex::Match<'_>) {
    out.push(TemporalMatch {
        date,
        start: m.start(),
        phrase: m.as_str().to_string(),
    });
}

/// Byte ranges of every day-shaped phrase, valid calendar date or not.
/// Coarser candidates inside them are dropped so `2024-02-30` never degrades
/// to `2024-02` or `2024`.
fn day_shaped_spans(text: &str) -> Vec<Range<usize>> {
    [&*RE_ISO_DAY, &*RE_DAY_MONTH_YEAR, &*RE_MONTH_DAY_YEAR]
        .into_iter()
        .flat_map(|re| re.find_iter(text).map(|m| m.range()))
        .collect()
}

fn inside(spans: &[Range<usize>], m: &regex::Match<'_>) -> bool {
    spans
        .iter()
        .any(|s| s.start <= m.start() && m.end() <= s.end)
}

fn collect_explicit(text: &str, day_shaped: &[Range<usize>], out: &mut Vec<TemporalMatch>) {
    for c in RE_ISO_DAY.captures_iter(text) {
        let (Some(all), Some(y), Some(m), Some(d)) = (c.get(0), c.get(1), c.get(2), c.get(3))
        else {
            continue;
        };
        if let Some(date) = ymd(y.as_str(), m.as_str(), d.as_str()) {
            push(out, PartialDate::Day(date), all);
        }
    }

    for c in RE_DAY_MONTH_YEAR.captures_iter(text) {
        let (Some(all), Some(d), Some(m), Some(y)) = (c.get(0), c.get(1), c.get(2), c.get(3))
        else {
            continue;
        };
        if let Some(date) = month_number(m.as_str())
            .and_then(|mn| ymd(y.as_str(), &mn.to_string(), d.as_str()))
        {
            push(out, PartialDate::Day(date), all);
        }
    }

    for c in RE_MONTH_DAY_YEAR.captures_iter(text) {
        let (Some(all), Some(m), Some(d), Some(y)) = (c.get(0), c.get(1), c.get(2), c.get(3))
        else {
            continue;
        };
        if let Some(date) = month_number(m.as_str())
            .and_then(|mn| ymd(y.as_str(), &mn.to_string(), d.as_str()))
        {
            push(out, PartialDate::Day(date), all);
        }
    }

    for c in RE_MONTH_YEAR.captures_iter(text) {
        let (Some(all), Some(m), Some(y)) = (c.get(0), c.get(1), c.get(2)) else {
            continue;
        };
        if inside(day_shaped, &all) {
            continue;
        }
        if let (Some(month), Ok(year)) = (month_number(m.as_str()), y.as_str().parse::<i32>()) {
            push(out, PartialDate::Month { year, month }, all);
        }
    }

    for c in RE_ISO_MONTH.captures_iter(text) {
        let (Some(all), Some(y), Some(m)) = (c.get(0), c.get(1), c.get(2)) else {
            continue;
        };
        if inside(day_shaped, &all) {
            continue;
        }
        let (Ok(year), Ok(month)) = (y.as_str().parse::<i32>(), m.as_str().parse::<u32>()) else {
            continue;
        };
        if (1..=12).contains(&month) {
            push(out, PartialDate::Month { year, month }, all);
        }
    }
}

fn collect_month_only(text: &str, as_of: NaiveDate, out: &mut Vec<TemporalMatch>) {
    for c in RE_PREP_MONTH.captures_iter(text) {
        let (Some(all), Some(m)) = (c.get(0), c.get(1)) else {
            continue;
        };
        // "in March 2024" is an explicit month-year, handled elsewhere
        let rest = text[all.end()..].trim_start_matches([' ', ',', '.']);
        if rest.starts_with(|ch: char| ch.is_ascii_digit()) {
            continue;
        }
        let Some(month) = month_number(m.as_str()) else {
            continue;
        };
        let year = if month <= as_of.month() {
            as_of.year()
        } else {
            as_of.year() - 1
        };
        push(out, PartialDate::Month { year, month }, all);
    }
}

fn collect_years(text: &str, day_shaped: &[Range<usize>], out: &mut Vec<TemporalMatch>) {
    for m in RE_YEAR.find_iter(text) {
        if inside(day_shaped, &m) {
            continue;
        }
        let next_word = text[m.end()..]
            .trim_start()
            .split(|c: char| !c.is_alphanumeric())
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        if COUNT_NOUNS.contains(&next_word.as_str()) {
            continue;
        }
        if let Ok(y) = m.as_str().parse::<i32>() {
            push(out, PartialDate::Year(y), m);
        }
    }
}

fn collect_relative(text: &str, as_of: NaiveDate, out: &mut Vec<TemporalMatch>) {
    for m in RE_RELATIVE.find_iter(text) {
        let phrase = m
            .as_str()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_lowercase();
        if let Some(date) = resolve_relative(&phrase, as_of) {
            push(out, date, m);
        }
    }
}

/// Resolve a normalized relative phrase (single spaces, lowercase) against `as_of`.
pub fn resolve_relative(phrase: &str, as_of: NaiveDate) -> Option<PartialDate> {
    let monday = as_of.checked_sub_days(Days::new(u64::from(
        as_of.weekday().num_days_from_monday(),
    )))?;
    match phrase {
        "today" => Some(PartialDate::Day(as_of)),
        "yesterday" => as_of.checked_sub_days(Days::new(1)).map(PartialDate::Day),
        "this week" => Some(PartialDate::Week(monday)),
        "last week" | "past week" => monday.checked_sub_days(Days::new(7)).map(PartialDate::Week),
        "this month" => Some(PartialDate::Month {
            year: as_of.year(),
            month: as_of.month(),
        }),
        "last month" => Some(if as_of.month() == 1 {
            PartialDate::Month {
                year: as_of.year() - 1,
                month: 12,
            }
        } else {
            PartialDate::Month {
                year: as_of.year(),
                month: as_of.month() - 1,
            }
        }),
        "this year" => Some(PartialDate::Year(as_of.year())),
        "last year" => Some(PartialDate::Year(as_of.year() - 1)),
        _ => None,
    }
}

fn ymd(y: &str, m: &str, d: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)
}

/// Month number for a full or abbreviated English month name.
pub fn month_number(name: &str) -> Option<u32> {
    let n = name.trim_end_matches('.').to_ascii_lowercase();
    let key = n.get(..3)?;
    let idx = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ]
    .iter()
    .position(|m| *m == key)?;
    Some(idx as u32 + 1)
}
