// src/sec/models.rs
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::utils::error::ExtractError;

// "2005Q4", "2005-Q4", "2005_q4"
static YEAR_FIRST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})[-_ ]?[Qq]([1-4])$").expect("Failed to compile YEAR_FIRST_RE")
});

// "4_2005", "Q4_2005" (legacy download naming)
static QUARTER_FIRST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[Qq]?([1-4])[-_ ](\d{4})$").expect("Failed to compile QUARTER_FIRST_RE")
});

/// The quarter/year a covered securities list applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FilingPeriod {
    pub year: u16,
    pub quarter: u8,
}

impl FilingPeriod {
    pub fn new(year: u16, quarter: u8) -> Result<Self, ExtractError> {
        if !(1..=4).contains(&quarter) {
            return Err(ExtractError::InvalidPeriod(format!("{}Q{}", year, quarter)));
        }
        Ok(Self { year, quarter })
    }

    /// Derives the period from a document's file name, e.g. `2005Q4.pdf` or `4_2005.pdf`.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| stem.parse().ok())
    }
}

impl fmt::Display for FilingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Q{}", self.year, self.quarter)
    }
}

impl FromStr for FilingPeriod {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        // Parsed inside each branch; the captures only live that long
        let parsed = if let Some(caps) = YEAR_FIRST_RE.captures(s) {
            (caps[1].parse::<u16>(), caps[2].parse::<u8>())
        } else if let Some(caps) = QUARTER_FIRST_RE.captures(s) {
            (caps[2].parse::<u16>(), caps[1].parse::<u8>())
        } else {
            return Err(ExtractError::InvalidPeriod(s.to_string()));
        };

        match parsed {
            (Ok(year), Ok(quarter)) => Self::new(year, quarter),
            _ => Err(ExtractError::InvalidPeriod(s.to_string())),
        }
    }
}

impl Serialize for FilingPeriod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One quarterly list published on the SEC 13F list page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexDocument {
    pub period: FilingPeriod,
    pub url: String,
}

impl IndexDocument {
    pub fn new(period: FilingPeriod, url: impl Into<String>) -> Self {
        Self { period, url: url.into() }
    }

    /// Local file name the document is stored under, e.g. `2005Q4.pdf`.
    pub fn file_name(&self) -> String {
        format!("{}.pdf", self.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_parsing_accepts_both_namings() {
        let expected = FilingPeriod { year: 2005, quarter: 4 };
        assert_eq!("2005Q4".parse::<FilingPeriod>().unwrap(), expected);
        assert_eq!("2005-q4".parse::<FilingPeriod>().unwrap(), expected);
        assert_eq!("4_2005".parse::<FilingPeriod>().unwrap(), expected);
        assert_eq!("Q4_2005".parse::<FilingPeriod>().unwrap(), expected);
    }

    #[test]
    fn test_period_parsing_rejects_garbage() {
        assert!("2005Q5".parse::<FilingPeriod>().is_err());
        assert!("5_2005".parse::<FilingPeriod>().is_err());
        assert!("13flist2005q4".parse::<FilingPeriod>().is_err());
        assert!(FilingPeriod::new(2005, 0).is_err());
    }

    #[test]
    fn test_period_from_path_and_display() {
        let period = FilingPeriod::from_path(Path::new("/data/raw/1_2010.pdf")).unwrap();
        assert_eq!(period.to_string(), "2010Q1");
        assert!(FilingPeriod::from_path(Path::new("/data/raw/readme.txt")).is_none());
    }

    #[test]
    fn test_periods_order_chronologically() {
        let mut periods = vec![
            FilingPeriod { year: 2006, quarter: 1 },
            FilingPeriod { year: 2005, quarter: 4 },
            FilingPeriod { year: 2005, quarter: 2 },
        ];
        periods.sort();
        let labels: Vec<String> = periods.iter().map(|p| p.to_string()).collect();
        assert_eq!(labels, vec!["2005Q2", "2005Q4", "2006Q1"]);
    }

    #[test]
    fn test_index_document_file_name() {
        let doc = IndexDocument::new(FilingPeriod { year: 2012, quarter: 3 }, "https://www.sec.gov/x.pdf");
        assert_eq!(doc.file_name(), "2012Q3.pdf");
    }
}
