//! # Regional aggregation
//! Thin group-by layer over a classified [`Dataset`].
//!
//! Scopes are inclusive: `EastAfrica` includes Ugandan records, `Africa`
//! includes both. Empty scopes yield zeroed statistics.

use anyhow::{anyhow, Result};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use crate::corpus::Dataset;
use crate::record::{OutbreakRecord, Severity};
use crate::temporal::PartialDate;

/// Window for `recent_outbreaks`, counted back from the latest dated record.
const RECENT_WINDOW_DAYS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionScope {
    Uganda,
    EastAfrica,
    Africa,
    #[default]
    All,
}

impl RegionScope {
    pub fn contains(self, r: &OutbreakRecord) -> bool {
        match self {
            RegionScope::Uganda => r.is_uganda(),
            RegionScope::EastAfrica => r.is_east_africa(),
            RegionScope::Africa => r.is_africa(),
            RegionScope::All => true,
        }
    }
}

impl FromStr for RegionScope {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "uganda" => Ok(RegionScope::Uganda),
            "east_africa" | "eastafrica" => Ok(RegionScope::EastAfrica),
            "africa" => Ok(RegionScope::Africa),
            "all" => Ok(RegionScope::All),
            other => Err(anyhow!("unknown region scope `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateRange {
    pub first: PartialDate,
    pub latest: PartialDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionSummary {
    pub scope: RegionScope,
    pub total_outbreaks: usize,
    pub unique_diseases: usize,
    pub severity_distribution: BTreeMap<Severity, usize>,
    pub most_common_disease: Option<String>,
    pub high_severity_count: usize,
    pub unknown_disease_count: usize,
    pub date_range: Option<DateRange>,
    pub countries_affected: usize,
    pub cities_affected: usize,
    pub recent_outbreaks: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiseaseStats {
    pub count: usize,
    pub severity: Severity,
    pub latest: Option<PartialDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeverityStats {
    pub count: usize,
    pub diseases: BTreeMap<String, usize>,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelinePoint {
    pub date: NaiveDate,
    pub count: usize,
    pub cumulative: usize,
}

/// Read-only statistics over a dataset.
#[derive(Debug, Clone, Copy)]
pub struct RegionalAggregator<'a> {
    dataset: &'a Dataset,
}

impl<'a> RegionalAggregator<'a> {
    pub fn new(dataset: &'a Dataset) -> Self {
        Self { dataset }
    }

    fn scoped(&self, scope: RegionScope) -> Vec<&'a OutbreakRecord> {
        self.dataset.iter().filter(|r| scope.contains(r)).collect()
    }

    /// Scope, then optionally only dated records within `window_days` of the
    /// scope's latest dated record. Undated records fall outside any window.
    fn windowed(&self, scope: RegionScope, window_days: Option<u64>) -> Vec<&'a OutbreakRecord> {
        let data = self.scoped(scope);
        let Some(days) = window_days else {
            return data;
        };
        let Some(latest) = data.iter().filter_map(|r| r.date()).max().map(|d| d.start()) else {
            return Vec::new();
        };
        let cutoff = latest
            .checked_sub_days(Days::new(days))
            .unwrap_or(NaiveDate::MIN);
        data.into_iter()
            .filter(|r| r.date().is_some_and(|d| d.start() >= cutoff))
            .collect()
    }

    pub fn summary(&self, scope: RegionScope) -> RegionSummary {
        let data = self.scoped(scope);

        let mut severity_distribution = BTreeMap::new();
        let mut disease_counts: BTreeMap<&str, usize> = BTreeMap::new();
        let mut countries = BTreeSet::new();
        let mut cities = BTreeSet::new();
        let mut unknown_disease_count = 0;

        for r in &data {
            *severity_distribution.entry(r.severity()).or_insert(0) += 1;
            match r.disease() {
                Some(d) => *disease_counts.entry(d).or_insert(0) += 1,
                None => unknown_disease_count += 1,
            }
            if let Some(c) = r.country() {
                countries.insert(c);
            }
            if let Some(c) = r.city() {
                cities.insert(c);
            }
        }

        // max_by_key keeps the last max; iterate reversed so ties go alphabetical
        let most_common_disease = disease_counts
            .iter()
            .rev()
            .max_by_key(|(_, n)| **n)
            .map(|(d, _)| d.to_string());

        let dates: Vec<PartialDate> = data.iter().filter_map(|r| r.date().copied()).collect();
        let date_range = match (dates.iter().min(), dates.iter().max()) {
            (Some(first), Some(latest)) => Some(DateRange {
                first: *first,
                latest: *latest,
            }),
            _ => None,
        };

        let recent_outbreaks = date_range
            .as_ref()
            .and_then(|dr| dr.latest.start().checked_sub_days(Days::new(RECENT_WINDOW_DAYS)))
            .map(|cutoff| dates.iter().filter(|d| d.start() >= cutoff).count())
            .unwrap_or(0);

        RegionSummary {
            scope,
            total_outbreaks: data.len(),
            unique_diseases: disease_counts.len(),
            high_severity_count: severity_distribution
                .get(&Severity::High)
                .copied()
                .unwrap_or(0),
            severity_distribution,
            most_common_disease,
            unknown_disease_count,
            date_range,
            countries_affected: countries.len(),
            cities_affected: cities.len(),
            recent_outbreaks,
        }
    }

    /// Per known disease: count, static severity, latest date.
    pub fn disease_distribution(&self, scope: RegionScope) -> BTreeMap<String, DiseaseStats> {
        let mut out: BTreeMap<String, DiseaseStats> = BTreeMap::new();
        for r in self.scoped(scope) {
            let Some(d) = r.disease() else {
                continue;
            };
            let e = out.entry(d.to_string()).or_insert(DiseaseStats {
                count: 0,
                severity: r.severity(),
                latest: None,
            });
            e.count += 1;
            if let Some(date) = r.date() {
                if e.latest.map_or(true, |l| *date > l) {
                    e.latest = Some(*date);
                }
            }
        }
        out
    }

    /// Every severity tier (including `Unknown`) with its diseases and share of the scope.
    pub fn severity_breakdown(
        &self,
        scope: RegionScope,
        window_days: Option<u64>,
    ) -> BTreeMap<Severity, SeverityStats> {
        let data = self.windowed(scope, window_days);
        let total = data.len();
        let mut out = BTreeMap::new();
        for sev in [
            Severity::High,
            Severity::Medium,
            Severity::Low,
            Severity::Unknown,
        ] {
            let mut diseases = BTreeMap::new();
            let mut count = 0;
            for r in data.iter().filter(|r| r.severity() == sev) {
                count += 1;
                *diseases.entry(r.disease_label().to_string()).or_insert(0) += 1;
            }
            let percentage = if total > 0 {
                count as f64 / total as f64 * 100.0
            } else {
                0.0
            };
            out.insert(
                sev,
                SeverityStats {
                    count,
                    diseases,
                    percentage,
                },
            );
        }
        out
    }

    /// Records at or above `min_severity`, newest first, undated last.
    pub fn high_priority(
        &self,
        scope: RegionScope,
        min_severity: Severity,
    ) -> Vec<&'a OutbreakRecord> {
        let mut out: Vec<_> = self
            .scoped(scope)
            .into_iter()
            .filter(|r| r.severity() != Severity::Unknown && r.severity() >= min_severity)
            .collect();
        out.sort_by(|a, b| newest_first(a.date(), b.date()));
        out
    }

    /// Counts per date start (dated records only) with a running total.
    pub fn timeline(
        &self,
        scope: RegionScope,
        disease: Option<&str>,
        window_days: Option<u64>,
    ) -> Vec<TimelinePoint> {
        let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
        for r in self.windowed(scope, window_days) {
            if let Some(want) = disease {
                if !r.disease().is_some_and(|d| d.eq_ignore_ascii_case(want)) {
                    continue;
                }
            }
            if let Some(date) = r.date() {
                *per_day.entry(date.start()).or_insert(0) += 1;
            }
        }

        let mut cumulative = 0;
        per_day
            .into_iter()
            .map(|(date, count)| {
                cumulative += count;
                TimelinePoint {
                    date,
                    count,
                    cumulative,
                }
            })
            .collect()
    }
}

fn newest_first(a: Option<&PartialDate>, b: Option<&PartialDate>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.cmp(x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
