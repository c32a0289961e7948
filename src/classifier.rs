// src/classifier.rs
//! Headline classifier: ordered, independent extraction passes over one headline.
//!
//! 1. Region: all place keywords; most specific tier wins, then [`MatchSpan::precedes`].
//! 2. Disease: all synonyms; the earliest match in the text wins ([`MatchSpan::precedes`]).
//! 3. Severity: pure lookup of the resolved disease in the severity table.
//! 4. Date: see [`crate::temporal`]; relative phrases use the injected `as_of` date.
//!
//! `classify` never fails. A pass that finds nothing leaves its field unknown.

use anyhow::{anyhow, bail, Result};
use chrono::{NaiveDate, Utc};
use regex::Regex;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

use crate::config::{self, ClassifierTables};
use crate::ingest::normalize_text;
use crate::record::{OutbreakRecord, Region, Severity};
use crate::temporal;

pub const ENV_TABLES_HOT_RELOAD: &str = "OUTBREAK_TABLES_HOT_RELOAD";
pub const ENV_DEV_LOG: &str = "OUTBREAK_DEV_LOG";

/// Debug build, or `SHUTTLE_ENV` in {local, development, dev}.
pub fn is_dev_env() -> bool {
    if cfg!(debug_assertions) {
        return true;
    }
    matches!(
        std::env::var("SHUTTLE_ENV")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str(),
        "local" | "development" | "dev"
    )
}

/// Dev logging gate: `OUTBREAK_DEV_LOG=1` AND [`is_dev_env`].
pub fn dev_logging_enabled() -> bool {
    std::env::var(ENV_DEV_LOG).ok().as_deref() == Some("1") && is_dev_env()
}

pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Never logs raw text. Only hashed id + resolved fields.
fn dev_log_classification(rec: &OutbreakRecord) {
    if !dev_logging_enabled() {
        return;
    }
    let id = anon_hash(rec.raw_text());
    let date = rec.date().map(|d| d.to_string()).unwrap_or_default();
    info!(
        target: "outbreak::classify",
        %id,
        region = %rec.region(),
        disease = rec.disease_label(),
        severity = %rec.severity(),
        %date,
        signals = ?rec.signals()
    );
}

/* ----------------------------
Tie-break comparator
---------------------------- */

/// Byte span of a keyword match plus the table entry it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchSpan {
    pub start: usize,
    pub end: usize,
    /// Index of the table entry (place or disease) in declaration order.
    pub entry: usize,
}

impl MatchSpan {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Total order: earlier start, then longer match, then earlier table entry.
    pub fn precedes(&self, other: &MatchSpan) -> bool {
        self.rank_key() < other.rank_key()
    }

    fn rank_key(&self) -> (usize, Reverse<usize>, usize) {
        (self.start, Reverse(self.len()), self.entry)
    }
}

/// The span that precedes all others, if any.
pub fn first_match<I: IntoIterator<Item = MatchSpan>>(spans: I) -> Option<MatchSpan> {
    spans
        .into_iter()
        .reduce(|best, next| if next.precedes(&best) { next } else { best })
}

/* ----------------------------
Compiled engine
---------------------------- */

#[derive(Debug)]
struct CompiledKeyword {
    entry: usize,
    re: Regex,
}

/// Word-bounded, whitespace-tolerant matcher for a table keyword.
fn keyword_regex(phrase: &str, case_sensitive: bool) -> Result<Regex> {
    let words: Vec<String> = phrase.split_whitespace().map(regex::escape).collect();
    if words.is_empty() {
        bail!("empty keyword");
    }
    let body = words.join(r"\s+");
    let lead = if phrase.trim_start().starts_with(char::is_alphanumeric) {
        r"\b"
    } else {
        ""
    };
    let trail = if phrase.trim_end().ends_with(char::is_alphanumeric) {
        r"\b"
    } else {
        ""
    };
    let flags = if case_sensitive { "" } else { "(?i)" };
    Regex::new(&format!("{flags}{lead}{body}{trail}"))
        .map_err(|e| anyhow!("keyword `{phrase}` regex error: {e}"))
}

fn compile_keywords<'a>(
    entry: usize,
    folded: impl IntoIterator<Item = &'a String>,
    exact: impl IntoIterator<Item = &'a String>,
    out: &mut Vec<CompiledKeyword>,
) -> Result<()> {
    for k in folded {
        out.push(CompiledKeyword {
            entry,
            re: keyword_regex(k, false)?,
        });
    }
    for k in exact {
        out.push(CompiledKeyword {
            entry,
            re: keyword_regex(k, true)?,
        });
    }
    Ok(())
}

fn find_spans(keywords: &[CompiledKeyword], text: &str) -> Vec<MatchSpan> {
    keywords
        .iter()
        .flat_map(|k| {
            k.re.find_iter(text).map(move |m| MatchSpan {
                start: m.start(),
                end: m.end(),
                entry: k.entry,
            })
        })
        .collect()
}

/// Table sizes and version, for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct TablesInfo {
    pub version: String,
    pub places: usize,
    pub diseases: usize,
    pub severity_entries: usize,
}

/// Read-only classifier built from injected lookup tables.
#[derive(Debug)]
pub struct HeadlineClassifier {
    tables: ClassifierTables,
    places: Vec<CompiledKeyword>,
    diseases: Vec<CompiledKeyword>,
    exclusions: Vec<Regex>,
    severity: HashMap<String, Severity>,
}

impl HeadlineClassifier {
    /// Compile the tables. Fails only on invalid table content.
    pub fn new(tables: ClassifierTables) -> Result<Self> {
        tables.validate()?;

        let mut places = Vec::new();
        for (i, p) in tables.places.iter().enumerate() {
            let names = std::iter::once(&p.name).chain(p.aliases.iter());
            compile_keywords(i, names, p.abbreviations.iter(), &mut places)
                .map_err(|e| anyhow!("place `{}`: {e}", p.name))?;
        }

        let mut diseases = Vec::new();
        for (i, d) in tables.diseases.iter().enumerate() {
            let names = std::iter::once(&d.name).chain(d.synonyms.iter());
            compile_keywords(i, names, d.abbreviations.iter(), &mut diseases)
                .map_err(|e| anyhow!("disease `{}`: {e}", d.name))?;
        }

        let exclusions = tables
            .exclusions
            .iter()
            .map(|e| keyword_regex(e, false).map_err(|err| anyhow!("exclusion `{e}`: {err}")))
            .collect::<Result<Vec<_>>>()?;

        let severity = tables.severity.to_map()?;

        Ok(Self {
            tables,
            places,
            diseases,
            exclusions,
            severity,
        })
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Self::new(ClassifierTables::from_toml_str(s)?)
    }

    /// Tables compiled into the binary.
    pub fn with_embedded_tables() -> Result<Self> {
        Self::new(ClassifierTables::embedded()?)
    }

    /// `$OUTBREAK_TABLES_PATH` → `config/outbreak_tables.toml` → embedded.
    pub fn from_default_config() -> Result<Self> {
        Self::new(config::load_tables_default()?)
    }

    pub fn tables(&self) -> &ClassifierTables {
        &self.tables
    }

    pub fn info(&self) -> TablesInfo {
        TablesInfo {
            version: self.tables.version.clone(),
            places: self.tables.places.len(),
            diseases: self.tables.diseases.len(),
            severity_entries: self.severity.len(),
        }
    }

    /// Classify against today's date (UTC) as the reference for relative phrases.
    pub fn classify(&self, text: &str) -> OutbreakRecord {
        self.classify_at(text, Utc::now().date_naive())
    }

    /// Classify with an explicit reference date. Pure function of `(text, as_of)`.
    pub fn classify_at(&self, text: &str, as_of: NaiveDate) -> OutbreakRecord {
        let norm = normalize_text(text);
        let mut signals = Vec::new();

        // 1) Region
        let place = self.resolve_place(&norm);
        if let Some(p) = &place {
            signals.push(format!("place:{}", p.matched));
        }
        let region = place.as_ref().map(|p| p.region).unwrap_or(Region::Unknown);
        let located = self.resolve_country(&norm);

        // 2) Disease
        let disease = self.resolve_disease(&norm).map(|(name, matched)| {
            signals.push(format!("disease:{}", matched.to_lowercase()));
            name
        });

        // 3) Severity
        let severity = disease
            .as_deref()
            .map(|d| self.severity_of(d))
            .unwrap_or(Severity::Unknown);

        // 4) Date
        let date = temporal::extract_date(&norm, as_of).map(|m| {
            signals.push(format!("date:{}", m.phrase));
            m.date
        });

        let rec = OutbreakRecord::new(text, region, disease, severity, date, located, signals);
        dev_log_classification(&rec);
        rec
    }

    /// Static severity of a canonical disease name; unlisted → `Unknown`.
    pub fn severity_of(&self, disease: &str) -> Severity {
        self.severity
            .get(&disease.to_lowercase())
            .copied()
            .unwrap_or(Severity::Unknown)
    }

    fn resolve_place(&self, text: &str) -> Option<PlaceHit> {
        let spans = self.unmasked_spans(&self.places, text);
        let best = spans.into_iter().reduce(|best, next| {
            if self.place_outranks(&next, &best) {
                next
            } else {
                best
            }
        })?;
        let entry = &self.tables.places[best.entry];
        Some(PlaceHit {
            region: entry.tier.into(),
            matched: text[best.start..best.end].to_string(),
        })
    }

    /// Country/city from the best place that carries a country, independent of the region tier.
    fn resolve_country(&self, text: &str) -> (Option<String>, Option<String>) {
        let best = self.unmasked_spans(&self.places, text)
            .into_iter()
            .filter(|s| ClassifierTables::country_of(&self.tables.places[s.entry]).is_some())
            .reduce(|best, next| {
                if self.place_outranks(&next, &best) {
                    next
                } else {
                    best
                }
            });
        let Some(best) = best else {
            return (None, None);
        };
        let entry = &self.tables.places[best.entry];
        let city = (entry.kind == config::PlaceKind::City).then(|| entry.name.clone());
        (ClassifierTables::country_of(entry), city)
    }

    /// Keyword spans that do not overlap an exclusion phrase.
    fn unmasked_spans(&self, keywords: &[CompiledKeyword], text: &str) -> Vec<MatchSpan> {
        let masked: Vec<_> = self
            .exclusions
            .iter()
            .flat_map(|re| re.find_iter(text).map(|m| m.range()))
            .collect();
        find_spans(keywords, text)
            .into_iter()
            .filter(|s| !masked.iter().any(|m| s.start < m.end && m.start < s.end))
            .collect()
    }

    /// Higher tier first, then the positional tie-break.
    fn place_outranks(&self, a: &MatchSpan, b: &MatchSpan) -> bool {
        let ta = Region::from(self.tables.places[a.entry].tier).specificity();
        let tb = Region::from(self.tables.places[b.entry].tier).specificity();
        ta > tb || (ta == tb && a.precedes(b))
    }

    fn resolve_disease(&self, text: &str) -> Option<(String, String)> {
        let best = first_match(self.unmasked_spans(&self.diseases, text))?;
        let name = self.tables.diseases[best.entry].name.clone();
        Some((name, text[best.start..best.end].to_string()))
    }
}

struct PlaceHit {
    region: Region,
    matched: String,
}

/* ----------------------------
Thread-safe handle + hot reload
---------------------------- */

/// Shared handle to the current classifier snapshot.
///
/// Readers clone the inner `Arc` and keep using that snapshot for a whole
/// batch; a reload swaps in a new classifier without touching old snapshots.
#[derive(Clone, Debug)]
pub struct ClassifierHandle {
    inner: Arc<RwLock<Arc<HeadlineClassifier>>>,
}

impl ClassifierHandle {
    pub fn new(classifier: HeadlineClassifier) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(classifier))),
        }
    }

    pub fn current(&self) -> Arc<HeadlineClassifier> {
        match self.inner.read() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn replace(&self, classifier: HeadlineClassifier) {
        let next = Arc::new(classifier);
        match self.inner.write() {
            Ok(mut g) => *g = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}

/// Returns true if we should enable hot reload (dev/local only).
fn hot_reload_enabled() -> bool {
    std::env::var(ENV_TABLES_HOT_RELOAD).ok().as_deref() == Some("1") && is_dev_env()
}

/// Poll `path` every 2s and swap in a freshly compiled classifier when it changes.
/// Broken edits are logged and ignored; the previous tables stay active.
pub fn start_hot_reload_thread(handle: ClassifierHandle, path: PathBuf) {
    if !hot_reload_enabled() {
        return;
    }

    thread::spawn(move || {
        let poll = Duration::from_secs(2);
        let mut last_mtime: Option<SystemTime> = None;

        loop {
            if let Ok(mtime) = fs::metadata(&path).and_then(|m| m.modified()) {
                let changed = match last_mtime {
                    None => {
                        last_mtime = Some(mtime);
                        false
                    }
                    Some(prev) => mtime > prev,
                };
                if changed {
                    match ClassifierTables::load_from(&path).and_then(HeadlineClassifier::new) {
                        Ok(next) => {
                            info!(
                                target: "outbreak::config",
                                version = %next.tables().version,
                                "classifier tables reloaded"
                            );
                            handle.replace(next);
                        }
                        Err(e) => {
                            let error = format!("{e:#}");
                            warn!(target: "outbreak::config", %error, "reload rejected");
                        }
                    }
                    last_mtime = Some(mtime);
                }
            }
            thread::sleep(poll);
        }
    });
}

/* ----------------------------
Tests
---------------------------- */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temporal::PartialDate;

    // Minimal, deterministic tables used only for tests.
    const TEST_TOML: &str = r#"
version = "test"

[[places]]
name = "Uganda"
kind = "country"
tier = "uganda"

[[places]]
name = "Kampala"
kind = "city"
tier = "uganda"
country = "Uganda"

[[places]]
name = "Kenya"
kind = "country"
tier = "east_africa"

[[places]]
name = "East Africa"
tier = "east_africa"

[[places]]
name = "Africa"
tier = "africa"

[[places]]
name = "South Africa"
kind = "country"
tier = "africa"

[[diseases]]
name = "Ebola"
synonyms = ["ebola"]
abbreviations = ["EVD"]

[[diseases]]
name = "Measles"
synonyms = ["measles"]

[[diseases]]
name = "Influenza"
synonyms = ["flu", "influenza", "bird flu"]

[[diseases]]
name = "HIV"
synonyms = ["hiv"]
abbreviations = ["AIDS"]

[[diseases]]
name = "Mpox"
synonyms = ["mpox"]

[severity]
high = ["Ebola"]
medium = ["Measles", "HIV"]
low = ["Influenza"]
"#;

    fn clf() -> HeadlineClassifier {
        HeadlineClassifier::from_toml_str(TEST_TOML).expect("load test tables")
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    #[test]
    fn precedes_is_position_then_length_then_entry() {
        let a = MatchSpan { start: 0, end: 5, entry: 3 };
        let b = MatchSpan { start: 10, end: 20, entry: 0 };
        assert!(a.precedes(&b));
        assert!(!b.precedes(&a));

        let short = MatchSpan { start: 4, end: 7, entry: 0 };
        let long = MatchSpan { start: 4, end: 12, entry: 1 };
        assert!(long.precedes(&short));

        let x = MatchSpan { start: 4, end: 7, entry: 0 };
        let y = MatchSpan { start: 4, end: 7, entry: 1 };
        assert!(x.precedes(&y));
        assert!(!x.precedes(&x));
        assert_eq!(first_match([b, short, long]), Some(long));
    }

    #[test]
    fn uganda_headline_sets_all_tiers() {
        let r = clf().classify_at("Ebola outbreak confirmed in Uganda", as_of());
        assert_eq!(r.region(), Region::Uganda);
        assert!(r.is_uganda() && r.is_east_africa() && r.is_africa());
        assert_eq!(r.disease(), Some("Ebola"));
        assert_eq!(r.severity(), Severity::High);
        assert_eq!(r.date(), None);
        assert_eq!(r.country(), Some("Uganda"));
    }

    #[test]
    fn specific_place_beats_continental_term_regardless_of_order() {
        let r = clf().classify_at("Across Africa, Kenya reports flu", as_of());
        assert_eq!(r.region(), Region::EastAfrica);
        assert_eq!(r.country(), Some("Kenya"));
        assert!(!r.is_uganda());
    }

    #[test]
    fn city_resolves_country() {
        let r = clf().classify_at("Measles in Kampala schools", as_of());
        assert_eq!(r.region(), Region::Uganda);
        assert_eq!(r.city(), Some("Kampala"));
        assert_eq!(r.country(), Some("Uganda"));
    }

    #[test]
    fn longest_match_at_same_position() {
        let r = clf().classify_at("South Africa sees HIV decline", as_of());
        assert_eq!(r.region(), Region::Africa);
        assert_eq!(r.country(), Some("South Africa"));

        let f = clf().classify_at("Bird flu detected", as_of());
        assert_eq!(f.disease(), Some("Influenza"));
        assert!(f.signals().iter().any(|s| s == "disease:bird flu"));
    }

    #[test]
    fn multiple_diseases_resolve_by_text_position() {
        let c = clf();
        let a = c.classify_at("Ebola and measles reported near border", as_of());
        assert_eq!(a.disease(), Some("Ebola"));
        let b = c.classify_at("Measles and Ebola reported near border", as_of());
        assert_eq!(b.disease(), Some("Measles"));
    }

    #[test]
    fn word_boundaries_and_abbreviation_case() {
        let c = clf();
        // "flu" must not fire inside "influence"
        assert_eq!(c.classify_at("Policy influence grows", as_of()).disease(), None);
        // "AIDS" is case-sensitive, "aids" the verb is not a disease
        assert_eq!(c.classify_at("Donor aids clinics", as_of()).disease(), None);
        assert_eq!(
            c.classify_at("AIDS deaths fall", as_of()).disease(),
            Some("HIV")
        );
        assert_eq!(
            c.classify_at("New EVD case", as_of()).disease(),
            Some("Ebola")
        );
    }

    #[test]
    fn disease_outside_severity_table_is_unknown_severity() {
        let r = clf().classify_at("Mpox cluster in Kenya", as_of());
        assert_eq!(r.disease(), Some("Mpox"));
        assert_eq!(r.severity(), Severity::Unknown);
    }

    #[test]
    fn empty_text_is_all_unknown() {
        let r = clf().classify_at("", as_of());
        assert!(r.is_unparsed());
        assert_eq!(r.raw_text(), "");
        assert_eq!(r.severity(), Severity::Unknown);
        assert_eq!(r.country(), None);
    }

    #[test]
    fn relative_dates_use_injected_reference() {
        let r = clf().classify_at("Cholera rising across East Africa this week", as_of());
        assert_eq!(r.region(), Region::EastAfrica);
        assert_eq!(
            r.date(),
            Some(&PartialDate::Week(NaiveDate::from_ymd_opt(2024, 3, 11).unwrap()))
        );
    }

    #[test]
    fn raw_text_is_kept_verbatim() {
        let raw = "  Ebola&nbsp;in <b>Uganda</b>!\r";
        let r = clf().classify_at(raw, as_of());
        assert_eq!(r.raw_text(), raw);
        assert_eq!(r.region(), Region::Uganda);
    }

    #[test]
    fn exclusions_hide_embedded_keywords() {
        let c = HeadlineClassifier::from_toml_str(
            r#"
exclusions = ["Papua New Guinea", "guinea pig"]

[[places]]
name = "Guinea"
kind = "country"
tier = "africa"

[[diseases]]
name = "Ebola"
synonyms = ["ebola"]
"#,
        )
        .unwrap();

        let png = c.classify_at("Measles in Papua New Guinea", as_of());
        assert_eq!(png.region(), Region::Unknown);
        assert_eq!(png.country(), None);

        // only the masked occurrence is hidden
        let both = c.classify_at("Guinea pig study, Ebola in Guinea", as_of());
        assert_eq!(both.country(), Some("Guinea"));
        assert_eq!(both.region(), Region::Africa);
    }

    #[test]
    fn invalid_keyword_regex_is_a_load_error() {
        let bad = r#"
[[diseases]]
name = "Blank"
synonyms = ["   "]
"#;
        assert!(HeadlineClassifier::from_toml_str(bad).is_err());
    }

    #[serial_test::serial]
    #[test]
    fn dev_logging_needs_the_flag() {
        std::env::remove_var(ENV_DEV_LOG);
        assert!(!dev_logging_enabled());
        std::env::set_var(ENV_DEV_LOG, "1");
        // test builds carry debug_assertions, so the env check passes
        assert_eq!(dev_logging_enabled(), is_dev_env());
        assert!(dev_logging_enabled());
        std::env::set_var(ENV_DEV_LOG, "0");
        assert!(!dev_logging_enabled());
        std::env::remove_var(ENV_DEV_LOG);
    }

    #[test]
    fn handle_swaps_snapshots() {
        let h = ClassifierHandle::new(clf());
        let before = h.current();
        h.replace(HeadlineClassifier::with_embedded_tables().unwrap());
        let after = h.current();
        assert_eq!(before.tables().version, "test");
        assert_ne!(after.tables().version, "test");
        // old snapshot still usable
        assert_eq!(
            before.classify_at("Ebola in Uganda", as_of()).region(),
            Region::Uganda
        );
    }
}
