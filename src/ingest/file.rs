// src/ingest/file.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::split_headlines;
use super::types::HeadlineSource;

/// Newline-delimited UTF-8 file, one headline per line.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl HeadlineSource for FileSource {
    async fn read_headlines(&self) -> Result<Vec<String>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading headlines from {}", self.path.display()))?;
        Ok(split_headlines(&content))
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// In-memory headlines (tests, HTTP payloads).
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    lines: Vec<String>,
}

impl MemorySource {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl HeadlineSource for MemorySource {
    async fn read_headlines(&self) -> Result<Vec<String>> {
        Ok(self.lines.clone())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
