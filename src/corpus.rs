// src/corpus.rs
//! Batch classification: one record per input headline, same order.
//!
//! No deduplication and no dropping here; unusable lines become all-unknown
//! records so downstream counts always match the input line count.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;
use std::thread;

use crate::classifier::HeadlineClassifier;
use crate::record::{OutbreakRecord, Region, Severity};
use crate::temporal::PartialDate;

/// Drives a classifier snapshot over many headlines with one fixed reference date.
#[derive(Debug, Clone)]
pub struct CorpusProcessor {
    classifier: Arc<HeadlineClassifier>,
    as_of: NaiveDate,
}

impl CorpusProcessor {
    /// Reference date defaults to today (UTC), fixed for the processor's lifetime.
    pub fn new(classifier: Arc<HeadlineClassifier>) -> Self {
        Self {
            classifier,
            as_of: Utc::now().date_naive(),
        }
    }

    pub fn with_reference_date(mut self, as_of: NaiveDate) -> Self {
        self.as_of = as_of;
        self
    }

    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    pub fn classifier(&self) -> &HeadlineClassifier {
        &self.classifier
    }

    /// Lazy, order-preserving, index-aligned classification.
    pub fn process<I>(&self, headlines: I) -> Records<'_, I::IntoIter>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        Records {
            processor: self,
            inner: headlines.into_iter(),
        }
    }

    /// Classify on up to `workers` scoped threads; identical output to `process(..).collect()`.
    pub fn process_concurrent<S>(&self, headlines: &[S], workers: usize) -> Vec<OutbreakRecord>
    where
        S: AsRef<str> + Sync,
    {
        let workers = workers.max(1);
        if workers == 1 || headlines.len() < 2 {
            return self.process(headlines).collect();
        }
        let chunk = headlines.len().div_ceil(workers);

        thread::scope(|s| {
            let handles: Vec<_> = headlines
                .chunks(chunk)
                .map(|part| s.spawn(move || self.process(part).collect::<Vec<_>>()))
                .collect();

            let mut out = Vec::with_capacity(headlines.len());
            for h in handles {
                match h.join() {
                    Ok(mut part) => out.append(&mut part),
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            }
            out
        })
    }

    /// Eagerly classify into a [`Dataset`].
    pub fn dataset<I>(&self, headlines: I) -> Dataset
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.process(headlines).collect()
    }
}

/// Iterator returned by [`CorpusProcessor::process`].
#[derive(Debug)]
pub struct Records<'a, It> {
    processor: &'a CorpusProcessor,
    inner: It,
}

impl<It> Iterator for Records<'_, It>
where
    It: Iterator,
    It::Item: AsRef<str>,
{
    type Item = OutbreakRecord;

    fn next(&mut self) -> Option<OutbreakRecord> {
        let headline = self.inner.next()?;
        Some(
            self.processor
                .classifier
                .classify_at(headline.as_ref(), self.processor.as_of),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<It> ExactSizeIterator for Records<'_, It>
where
    It: ExactSizeIterator,
    It::Item: AsRef<str>,
{
}

/* ----------------------------
Dataset (table-like output)
---------------------------- */

/// Ordered collection of records handed to aggregation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Dataset {
    records: Vec<OutbreakRecord>,
}

/// One flat row with named columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetRow {
    pub headline: String,
    pub region: Region,
    pub disease: String,
    pub severity: Severity,
    pub date: Option<PartialDate>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub is_uganda: bool,
    pub is_east_africa: bool,
    pub is_africa: bool,
}

impl From<&OutbreakRecord> for DatasetRow {
    fn from(r: &OutbreakRecord) -> Self {
        Self {
            headline: r.raw_text().trim().to_string(),
            region: r.region(),
            disease: r.disease_label().to_string(),
            severity: r.severity(),
            date: r.date().copied(),
            country: r.country().map(str::to_string),
            city: r.city().map(str::to_string),
            is_uganda: r.is_uganda(),
            is_east_africa: r.is_east_africa(),
            is_africa: r.is_africa(),
        }
    }
}

/// Per-batch data-quality counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub total: usize,
    pub unknown_region: usize,
    pub unknown_disease: usize,
    pub undated: usize,
    pub unparsed: usize,
}

impl Dataset {
    pub fn new(records: Vec<OutbreakRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[OutbreakRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OutbreakRecord> {
        self.records.iter()
    }

    pub fn into_records(self) -> Vec<OutbreakRecord> {
        self.records
    }

    pub fn rows(&self) -> impl Iterator<Item = DatasetRow> + '_ {
        self.records.iter().map(DatasetRow::from)
    }

    pub fn stats(&self) -> BatchStats {
        self.records.iter().fold(
            BatchStats {
                total: self.records.len(),
                ..Default::default()
            },
            |mut s, r| {
                s.unknown_region += usize::from(r.region() == Region::Unknown);
                s.unknown_disease += usize::from(r.disease().is_none());
                s.undated += usize::from(r.date().is_none());
                s.unparsed += usize::from(r.is_unparsed());
                s
            },
        )
    }

    /// One JSON row per line.
    pub fn write_json_lines<W: Write>(&self, mut w: W) -> Result<()> {
        for row in self.rows() {
            serde_json::to_writer(&mut w, &row).context("serializing dataset row")?;
            w.write_all(b"\n").context("writing dataset row")?;
        }
        w.flush().context("flushing dataset rows")?;
        Ok(())
    }
}

impl FromIterator<OutbreakRecord> for Dataset {
    fn from_iter<T: IntoIterator<Item = OutbreakRecord>>(iter: T) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a OutbreakRecord;
    type IntoIter = std::slice::Iter<'a, OutbreakRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processor() -> CorpusProcessor {
        let clf = HeadlineClassifier::with_embedded_tables().expect("embedded tables");
        CorpusProcessor::new(Arc::new(clf))
            .with_reference_date(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let p = processor();
        let empty: Vec<String> = Vec::new();
        assert_eq!(p.process(&empty).count(), 0);
        assert!(p.dataset(&empty).is_empty());
    }

    #[test]
    fn duplicates_are_not_collapsed() {
        let p = processor();
        let d = p.dataset(["Ebola in Gulu", "Ebola in Gulu", ""]);
        assert_eq!(d.len(), 3);
        assert_eq!(d.records()[0], d.records()[1]);
        assert!(d.records()[2].is_unparsed());
    }

    #[test]
    fn process_is_lazy_and_sized() {
        let p = processor();
        let input = vec!["a".to_string(), "b".to_string()];
        let it = p.process(&input);
        assert_eq!(it.len(), 2);
    }

    #[test]
    fn stats_count_unknowns() {
        let p = processor();
        let d = p.dataset(["Cholera in Juba 2023", "Nothing to see", "Flu in Paris"]);
        let s = d.stats();
        assert_eq!(s.total, 3);
        assert_eq!(s.unknown_region, 2);
        assert_eq!(s.unknown_disease, 1);
        assert_eq!(s.undated, 2);
        assert_eq!(s.unparsed, 1);
    }

    #[test]
    fn json_lines_have_named_columns() {
        let p = processor();
        let d = p.dataset(["Ebola outbreak confirmed in Uganda", ""]);
        let mut buf = Vec::new();
        d.write_json_lines(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["region"], "Uganda");
        assert_eq!(first["disease"], "Ebola");
        assert_eq!(first["severity"], "High");
        assert_eq!(first["is_east_africa"], true);
        assert!(first["date"].is_null());
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["disease"], "Unknown");
        assert_eq!(second["is_africa"], false);
    }
}
