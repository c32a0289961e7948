//! Classify a newline-delimited headline file and print JSON rows plus regional summaries.
//!
//! Usage: `classify_file <path> [YYYY-MM-DD]`

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;

use outbreak_tracker::ingest::{run_once, FileSource};
use outbreak_tracker::{CorpusProcessor, HeadlineClassifier, RegionScope, RegionalAggregator};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        bail!("usage: classify_file <path> [YYYY-MM-DD]");
    };
    let as_of = args
        .next()
        .map(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| format!("bad date `{s}`")))
        .transpose()?;

    let classifier = Arc::new(HeadlineClassifier::from_default_config()?);
    let mut processor = CorpusProcessor::new(classifier);
    if let Some(d) = as_of {
        processor = processor.with_reference_date(d);
    }

    let dataset = run_once(&FileSource::new(path), &processor).await?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    dataset.write_json_lines(&mut out)?;

    let agg = RegionalAggregator::new(&dataset);
    for scope in [RegionScope::Uganda, RegionScope::EastAfrica] {
        serde_json::to_writer(&mut out, &agg.summary(scope)).context("serializing summary")?;
        writeln!(out)?;
    }
    Ok(())
}
