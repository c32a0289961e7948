// src/ingest/mod.rs
//! Batch boundary: read raw headline lines, normalize text, classify, report.

pub mod file;
pub mod types;

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Instant;

use crate::corpus::{CorpusProcessor, Dataset};
use crate::ingest::types::HeadlineSource;
use crate::metrics::{record_batch, record_source_error};

pub use file::{FileSource, MemorySource};

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[a-z][^>]*>").unwrap());
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Normalize text for matching: decode entities, strip tags, fold quotes,
/// collapse whitespace, trim trailing sentence punctuation.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    out = RE_TAGS.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    out = RE_WS.replace_all(&out, " ").trim().to_string();

    // 5) Strip trailing sentence punctuation (keep quotes)
    while let Some(last) = out.chars().last() {
        if matches!(last, '!' | '?' | '.' | ',' | ':' | ';') || last.is_whitespace() {
            out.pop();
        } else {
            break;
        }
    }

    out
}

/// Split newline-delimited content into headlines. Every line is kept,
/// blank ones included; a single trailing newline does not add a line.
pub fn split_headlines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|l| l.strip_suffix('\r').unwrap_or(l).to_string())
        .collect()
}

/// Read one source, classify every line, record metrics.
/// Errors only when the source cannot be read.
pub async fn run_once(source: &dyn HeadlineSource, processor: &CorpusProcessor) -> Result<Dataset> {
    let started = Instant::now();
    let lines = match source.read_headlines().await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = ?e, source = source.name(), "headline source error");
            record_source_error(source.name());
            return Err(e);
        }
    };

    let dataset = processor.dataset(&lines);
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    let stats = dataset.stats();
    record_batch(&stats, elapsed_ms);

    tracing::info!(
        target: "outbreak::ingest",
        source = source.name(),
        total = stats.total,
        unknown_disease = stats.unknown_disease,
        unknown_region = stats.unknown_region,
        undated = stats.undated,
        elapsed_ms,
        "headline batch classified"
    );

    Ok(dataset)
}
