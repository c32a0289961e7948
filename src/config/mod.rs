// src/config/mod.rs
//! Configuration loading: classifier lookup tables (TOML) and their path resolution.

pub mod tables;

use anyhow::{anyhow, Result};
use std::path::PathBuf;
use tracing::info;

pub use tables::{ClassifierTables, DiseaseEntry, PlaceEntry, PlaceKind, SeverityTable, Tier};

pub const DEFAULT_TABLES_PATH: &str = "config/outbreak_tables.toml";
pub const ENV_TABLES_PATH: &str = "OUTBREAK_TABLES_PATH";

/// Resolve the on-disk tables file:
/// 1) $OUTBREAK_TABLES_PATH (must exist)
/// 2) config/outbreak_tables.toml
///
/// `Ok(None)` means "no file, use the embedded defaults".
pub fn resolve_tables_path() -> Result<Option<PathBuf>> {
    if let Ok(p) = std::env::var(ENV_TABLES_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return Ok(Some(pb));
        }
        return Err(anyhow!(
            "{ENV_TABLES_PATH} points to non-existent path {}",
            pb.display()
        ));
    }
    let local = PathBuf::from(DEFAULT_TABLES_PATH);
    if local.exists() {
        return Ok(Some(local));
    }
    Ok(None)
}

/// Load tables using env var + fallbacks, ending with the embedded copy.
pub fn load_tables_default() -> Result<ClassifierTables> {
    match resolve_tables_path()? {
        Some(path) => {
            let tables = ClassifierTables::load_from(&path)?;
            info!(
                target: "outbreak::config",
                path = %path.display(),
                version = %tables.version,
                "loaded classifier tables"
            );
            Ok(tables)
        }
        None => {
            info!(target: "outbreak::config", "using embedded classifier tables");
            ClassifierTables::embedded()
        }
    }
}
