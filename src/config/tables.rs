// src/config/tables.rs
//! Versioned lookup tables: places, disease synonyms, disease → severity.
//!
//! Pure data. The classifier compiles these into matchers at construction;
//! changing the tables never requires touching classification logic.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use crate::record::{Region, Severity};

/// Tables shipped with the crate (a copy of `config/outbreak_tables.toml`).
pub const EMBEDDED_TABLES: &str = include_str!("../../config/outbreak_tables.toml");

fn default_version() -> String {
    "unversioned".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierTables {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub places: Vec<PlaceEntry>,
    #[serde(default)]
    pub diseases: Vec<DiseaseEntry>,
    #[serde(default)]
    pub severity: SeverityTable,
    /// Phrases that hide any place or disease keyword inside them
    /// ("Papua New Guinea" must not count as Guinea).
    #[serde(default)]
    pub exclusions: Vec<String>,
}

/// Region tier a place keyword maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Uganda,
    EastAfrica,
    Africa,
}

impl From<Tier> for Region {
    fn from(t: Tier) -> Self {
        match t {
            Tier::Uganda => Region::Uganda,
            Tier::EastAfrica => Region::EastAfrica,
            Tier::Africa => Region::Africa,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceKind {
    Country,
    City,
    #[default]
    Area,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceEntry {
    pub name: String,
    pub tier: Tier,
    #[serde(default)]
    pub kind: PlaceKind,
    /// Country the place belongs to (required for cities, implied for countries).
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Matched case-sensitively (e.g. "DRC").
    #[serde(default)]
    pub abbreviations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiseaseEntry {
    /// Canonical name, also the key into the severity table.
    pub name: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
    /// Matched case-sensitively (e.g. "TB", "AIDS").
    #[serde(default)]
    pub abbreviations: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeverityTable {
    #[serde(default)]
    pub high: Vec<String>,
    #[serde(default)]
    pub medium: Vec<String>,
    #[serde(default)]
    pub low: Vec<String>,
}

impl SeverityTable {
    /// Flatten into `lowercased disease name → Severity`.
    /// A disease listed in two tiers is a configuration error.
    pub fn to_map(&self) -> Result<HashMap<String, Severity>> {
        let mut map = HashMap::new();
        for (tier, names) in [
            (Severity::High, &self.high),
            (Severity::Medium, &self.medium),
            (Severity::Low, &self.low),
        ] {
            for n in names {
                let key = n.trim().to_lowercase();
                if key.is_empty() {
                    continue;
                }
                if let Some(prev) = map.insert(key, tier) {
                    if prev != tier {
                        bail!("disease `{n}` listed as both {prev} and {tier} severity");
                    }
                }
            }
        }
        Ok(map)
    }
}

impl ClassifierTables {
    /// Parse and validate from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let tables: ClassifierTables = toml::from_str(s).context("parsing classifier tables")?;
        tables.validate()?;
        Ok(tables)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading classifier tables from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("invalid classifier tables in {}", path.display()))
    }

    /// The tables compiled into the binary.
    pub fn embedded() -> Result<Self> {
        Self::from_toml_str(EMBEDDED_TABLES).context("embedded classifier tables")
    }

    /// Structural checks that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        for p in &self.places {
            if p.name.trim().is_empty() {
                bail!("place with empty name");
            }
            if p.kind == PlaceKind::City && p.country.is_none() {
                return Err(anyhow!("city `{}` has no country", p.name));
            }
        }

        let mut seen = HashSet::new();
        for d in &self.diseases {
            if d.name.trim().is_empty() {
                bail!("disease with empty name");
            }
            if !seen.insert(d.name.to_lowercase()) {
                bail!("disease `{}` defined twice", d.name);
            }
        }

        if self.exclusions.iter().any(|e| e.trim().is_empty()) {
            bail!("empty exclusion phrase");
        }

        self.severity.to_map()?;
        Ok(())
    }

    /// Country a place contributes: explicit `country`, or its own name for countries.
    pub fn country_of(place: &PlaceEntry) -> Option<String> {
        match (&place.country, place.kind) {
            (Some(c), _) => Some(c.clone()),
            (None, PlaceKind::Country) => Some(place.name.clone()),
            _ => None,
        }
    }
}
