// src/ingest/types.rs
use anyhow::Result;

/// Something that yields raw headline lines (file, memory, ...).
///
/// Read failures are the only reportable errors in a batch; classification
/// itself never fails.
#[async_trait::async_trait]
pub trait HeadlineSource: Send + Sync {
    async fn read_headlines(&self) -> Result<Vec<String>>;
    fn name(&self) -> &'static str;
}
