//! # Outbreak Record
//! Fixed-shape output of the headline classifier.
//!
//! Every field has an explicit "unknown" representation: `Region::Unknown`,
//! `Severity::Unknown`, or `None` for disease/date/country/city. Records are
//! built once by the classifier and exposed read-only through accessors, so
//! the derived region flags can never disagree with the stored tier.

use serde::{Serialize, Serializer};
use std::fmt;

use crate::temporal::PartialDate;

/// Most specific region tier a headline was attributed to.
///
/// Tiers nest: `Uganda ⊂ EastAfrica ⊂ Africa`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Region {
    Unknown,
    Africa,
    EastAfrica,
    Uganda,
}

impl Region {
    /// Specificity rank used when several places match (higher wins).
    pub fn specificity(self) -> u8 {
        match self {
            Region::Unknown => 0,
            Region::Africa => 1,
            Region::EastAfrica => 2,
            Region::Uganda => 3,
        }
    }

    /// Inclusive membership flags for the broader tiers.
    pub fn flags(self) -> RegionFlags {
        RegionFlags {
            is_uganda: self == Region::Uganda,
            is_east_africa: matches!(self, Region::Uganda | Region::EastAfrica),
            is_africa: self != Region::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Region::Unknown => "Unknown",
            Region::Africa => "Africa",
            Region::EastAfrica => "EastAfrica",
            Region::Uganda => "Uganda",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived, always-consistent membership flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RegionFlags {
    pub is_uganda: bool,
    pub is_east_africa: bool,
    pub is_africa: bool,
}

/// Severity tier, a pure function of the resolved disease.
///
/// Ordering is `Unknown < Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Unknown,
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Unknown => "Unknown",
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified headline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutbreakRecord {
    raw_text: String,
    region: Region,
    #[serde(flatten)]
    flags: RegionFlags,
    #[serde(serialize_with = "unknown_if_none")]
    disease: Option<String>,
    severity: Severity,
    date: Option<PartialDate>,
    country: Option<String>,
    city: Option<String>,
    signals: Vec<String>,
}

impl OutbreakRecord {
    /// Assemble a record; flags are always derived from `region`.
    pub(crate) fn new(
        raw_text: &str,
        region: Region,
        disease: Option<String>,
        severity: Severity,
        date: Option<PartialDate>,
        place: (Option<String>, Option<String>),
        signals: Vec<String>,
    ) -> Self {
        let (country, city) = place;
        Self {
            raw_text: raw_text.to_string(),
            region,
            flags: region.flags(),
            disease,
            severity,
            date,
            country,
            city,
            signals,
        }
    }

    /// Record with every field unknown and the text preserved.
    pub fn unknown(raw_text: &str) -> Self {
        Self::new(
            raw_text,
            Region::Unknown,
            None,
            Severity::Unknown,
            None,
            (None, None),
            Vec::new(),
        )
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn flags(&self) -> RegionFlags {
        self.flags
    }

    pub fn is_uganda(&self) -> bool {
        self.flags.is_uganda
    }

    pub fn is_east_africa(&self) -> bool {
        self.flags.is_east_africa
    }

    pub fn is_africa(&self) -> bool {
        self.flags.is_africa
    }

    pub fn disease(&self) -> Option<&str> {
        self.disease.as_deref()
    }

    /// Disease name or `"Unknown"`.
    pub fn disease_label(&self) -> &str {
        self.disease.as_deref().unwrap_or("Unknown")
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn date(&self) -> Option<&PartialDate> {
        self.date.as_ref()
    }

    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }

    pub fn city(&self) -> Option<&str> {
        self.city.as_deref()
    }

    /// Evidence strings in extraction order (`place:..`, `disease:..`, `date:..`).
    pub fn signals(&self) -> &[String] {
        &self.signals
    }

    /// True when no pass recognized anything (region, disease and date all unknown).
    pub fn is_unparsed(&self) -> bool {
        self.region == Region::Unknown && self.disease.is_none() && self.date.is_none()
    }
}

fn unknown_if_none<S: Serializer>(v: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(v.as_deref().unwrap_or("Unknown"))
}
