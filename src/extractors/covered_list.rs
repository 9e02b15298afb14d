// src/extractors/covered_list.rs

// --- Imports ---
use crate::extractors::layout::{char_slice, ColumnBounds, TableLayout};
use crate::sec::models::FilingPeriod;
use crate::utils::error::ExtractError;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

// --- Regex Patterns (Lazy Static) ---
static RUN_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)run\s*date:?\s*(\d{1,2}/\d{1,2}/\d{4})").expect("Failed to compile RUN_DATE_RE")
});

static RUN_TIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)run\s*time").expect("Failed to compile RUN_TIME_RE")
});

static PAGE_LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bpage:?\s*(\d{1,6})\b").expect("Failed to compile PAGE_LABEL_RE")
});

static TOTAL_COUNT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)total\s*count:?\s*([\d,]+)").expect("Failed to compile TOTAL_COUNT_RE")
});

// Title repeated at the top of pages, e.g. "** OFFICIAL LIST OF SECTION 13(f) SECURITIES **"
static LIST_TITLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\W*(?:official\s+)?list\s+of\s+section\s+13\s*\(?f\)?\s+securities\W*$")
        .expect("Failed to compile LIST_TITLE_RE")
});

// "YEAR: 2005 QUARTER: 4" on the run time line
static HEADER_PERIOD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\byear:?\s*(\d{4})\s+quarter:?\s*([1-4])\b").expect("Failed to compile HEADER_PERIOD_RE")
});

// Printed as "88579Y 10 1" on most lists; compact on a few
static CUSIP_CELL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z0-9]{6}\s?[A-Z0-9]{2}\s?[A-Z0-9]$").expect("Failed to compile CUSIP_CELL_RE")
});

// CUSIP (optionally starred), then fields separated by runs of 2+ spaces
static WHITESPACE_ROW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?P<cusip>[A-Za-z0-9]{6}\s?[A-Za-z0-9]{2}\s?[A-Za-z0-9](?:\s*\*)?)\s{2,}(?P<issuer>\S.*?)(?:\s{2,}(?P<desc>\S.*?))?\s*$",
    )
    .expect("Failed to compile WHITESPACE_ROW_RE")
});

static STATUS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(ADDED|DELETED)\b").expect("Failed to compile STATUS_RE")
});

// --- Data Structures ---

/// One security on a quarterly covered securities list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoveredSecurityRecord {
    pub period: FilingPeriod,
    pub cusip: String,       // 9 characters, no spaces
    pub issuer: String,
    pub description: String, // status keywords removed
    pub run_date: Option<NaiveDate>,
    pub page: u32,
    pub optionable: bool,    // starred on the list
    pub added: bool,
    pub deleted: bool,
}

/// Everything pulled out of one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedList {
    pub period: FilingPeriod,
    pub records: Vec<CoveredSecurityRecord>,
    /// The "TOTAL COUNT" printed at the end of the list, if found.
    pub expected_total: Option<usize>,
    pub pages_scanned: usize,
    pub table_pages: usize,
    pub skipped_rows: usize,
}

impl ExtractedList {
    /// False only when the document printed a total that disagrees with the rows parsed.
    pub fn count_matches(&self) -> bool {
        self.expected_total.map_or(true, |total| total == self.records.len())
    }
}

/// Fields of a data row before validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRow<'a> {
    pub cusip: &'a str,
    pub issuer: &'a str,
    pub description: &'a str,
}

// --- Row Strategies ---

/// Splits one text line into row fields.
pub trait RowStrategy {
    fn name(&self) -> &'static str;
    fn split<'a>(&self, line: &'a str) -> Option<RawRow<'a>>;
}

/// Slices rows at the character offsets of the page's column header.
pub struct ColumnRowStrategy {
    bounds: ColumnBounds,
}

impl ColumnRowStrategy {
    pub fn new(bounds: ColumnBounds) -> Self {
        Self { bounds }
    }
}

impl RowStrategy for ColumnRowStrategy {
    fn name(&self) -> &'static str {
        "column"
    }

    fn split<'a>(&self, line: &'a str) -> Option<RawRow<'a>> {
        // The CUSIP cell may start left of its centered label
        let cusip = char_slice(line, 0, Some(self.bounds.issuer));
        if cusip.trim().is_empty() {
            return None;
        }
        let issuer = char_slice(line, self.bounds.issuer, self.bounds.description);
        // Status is folded into the description; its alignment drifts between lists
        let description = self.bounds.description.map_or("", |d| char_slice(line, d, None));

        Some(RawRow { cusip, issuer, description })
    }
}

/// Splits rows on runs of whitespace when a page has no recognizable header.
pub struct WhitespaceRowStrategy;

impl RowStrategy for WhitespaceRowStrategy {
    fn name(&self) -> &'static str {
        "whitespace"
    }

    fn split<'a>(&self, line: &'a str) -> Option<RawRow<'a>> {
        let caps = WHITESPACE_ROW_RE.captures(line)?;
        Some(RawRow {
            cusip: caps.name("cusip")?.as_str(),
            issuer: caps.name("issuer")?.as_str(),
            description: caps.name("desc").map_or("", |m| m.as_str()),
        })
    }
}

/// Header information shared by every row on a page.
#[derive(Debug, Clone, Copy)]
struct PageContext {
    period: FilingPeriod,
    run_date: Option<NaiveDate>,
    page: u32,
}

// --- Main Extractor Structure ---
pub struct CoveredListExtractor {
    layouts: Vec<TableLayout>,
}

impl Default for CoveredListExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl CoveredListExtractor {
    pub fn new() -> Self {
        Self::with_layouts(vec![TableLayout::standard()])
    }

    /// Layouts are tried in order against each page.
    pub fn with_layouts(layouts: Vec<TableLayout>) -> Self {
        Self { layouts }
    }

    /// Extracts a document's records, resolving its filing period.
    ///
    /// `period` normally comes from the file name. Without it the period printed
    /// in the page header is used. Fails if the text is empty or no period can
    /// be determined; a document with text but no table rows yields an empty list.
    pub fn extract_document(
        &self,
        layout_text: &str,
        source: &str,
        period: Option<FilingPeriod>,
    ) -> Result<ExtractedList, ExtractError> {
        if layout_text.trim().is_empty() {
            return Err(ExtractError::NoText(source.to_string()));
        }

        let period = match period.or_else(|| period_from_header(layout_text)) {
            Some(period) => period,
            None => return Err(ExtractError::UnknownPeriod(source.to_string())),
        };

        tracing::info!("Extracting covered securities list {} from {}", period, source);
        let list = self.extract_text(layout_text, period);

        tracing::info!(
            "Extracted {} securities for {} ({} of {} pages held a table, {} rows skipped)",
            list.records.len(), period, list.table_pages, list.pages_scanned, list.skipped_rows
        );
        if !list.count_matches() {
            tracing::warn!(
                "{}: parsed {} securities but the list reports a total of {}",
                source,
                list.records.len(),
                list.expected_total.unwrap_or_default()
            );
        }

        Ok(list)
    }

    /// Parses every table page of `layout_text`. Pure: the same text and period
    /// always give the same records in table order.
    pub fn extract_text(&self, layout_text: &str, period: FilingPeriod) -> ExtractedList {
        let mut list = ExtractedList {
            period,
            records: Vec::new(),
            expected_total: None,
            pages_scanned: 0,
            table_pages: 0,
            skipped_rows: 0,
        };
        let mut run_date = None;

        for (index, page) in layout_text.split('\x0c').enumerate() {
            if page.trim().is_empty() {
                continue;
            }
            list.pages_scanned += 1;
            self.extract_page(page, index as u32 + 1, &mut run_date, &mut list);
        }

        list
    }

    fn extract_page(
        &self,
        page: &str,
        physical_page: u32,
        run_date: &mut Option<NaiveDate>,
        list: &mut ExtractedList,
    ) {
        let lines: Vec<&str> = page.lines().collect();

        let run_date_line = lines.iter().position(|line| RUN_DATE_RE.is_match(line));
        let header = lines.iter().enumerate().find_map(|(i, line)| {
            self.layouts
                .iter()
                .find_map(|layout| layout.locate(line).map(|bounds| (i, bounds, layout.name.as_str())))
        });

        // Cover pages and notes carry neither a run date nor a column header
        if run_date_line.is_none() && header.is_none() {
            tracing::debug!("Page {} has no table header, skipping", physical_page);
            return;
        }
        list.table_pages += 1;

        let mut page_label = physical_page;
        if let Some(line) = run_date_line.map(|i| lines[i]) {
            if let Some(caps) = RUN_DATE_RE.captures(line) {
                *run_date = NaiveDate::parse_from_str(&caps[1], "%m/%d/%Y").ok().or(*run_date);
            }
            if let Some(label) = PAGE_LABEL_RE.captures(line).and_then(|caps| caps[1].parse().ok()) {
                page_label = label;
            }
        }

        let ctx = PageContext { period: list.period, run_date: *run_date, page: page_label };

        let column = header.map(|(_, bounds, layout_name)| {
            tracing::trace!("Page {} uses layout '{}': {:?}", physical_page, layout_name, bounds);
            ColumnRowStrategy::new(bounds)
        });
        let mut strategies: Vec<&dyn RowStrategy> = Vec::with_capacity(2);
        if let Some(column) = column.as_ref() {
            strategies.push(column);
        }
        strategies.push(&WhitespaceRowStrategy);

        let first_data_line = header.map_or(0, |(i, _, _)| i + 1);
        for (offset, line) in lines.iter().enumerate().skip(first_data_line) {
            if Some(offset) == run_date_line || line.trim().is_empty() || RUN_TIME_RE.is_match(line) {
                continue;
            }
            if LIST_TITLE_RE.is_match(line) {
                continue;
            }
            if let Some(caps) = TOTAL_COUNT_RE.captures(line) {
                list.expected_total = caps[1].replace(',', "").parse().ok();
                continue;
            }

            let parsed = strategies.iter().find_map(|strategy| {
                strategy
                    .split(line)
                    .and_then(|row| build_record(row, &ctx))
                    .map(|record| (strategy.name(), record))
            });
            match parsed {
                Some((strategy, record)) => {
                    tracing::trace!("Row {} split by {} strategy", record.cusip, strategy);
                    list.records.push(record);
                }
                None => {
                    tracing::debug!("Skipping malformed row on page {}: '{}'", page_label, line.trim());
                    list.skipped_rows += 1;
                }
            }
        }
    }
}

/// Validates and normalizes one split row.
fn build_record(row: RawRow<'_>, ctx: &PageContext) -> Option<CoveredSecurityRecord> {
    let optionable = row.cusip.contains('*');
    let cusip_cell = row.cusip.replace('*', "").trim().to_ascii_uppercase();
    if !CUSIP_CELL_RE.is_match(&cusip_cell) {
        return None;
    }
    let cusip: String = cusip_cell.chars().filter(|c| !c.is_whitespace()).collect();

    let issuer = row.issuer.trim();
    if issuer.is_empty() {
        return None;
    }

    let added = STATUS_RE.find_iter(row.description).any(|m| m.as_str() == "ADDED");
    let deleted = STATUS_RE.find_iter(row.description).any(|m| m.as_str() == "DELETED");
    let description = STATUS_RE.replace_all(row.description, "").trim().to_string();

    Some(CoveredSecurityRecord {
        period: ctx.period,
        cusip,
        issuer: issuer.to_string(),
        description,
        run_date: ctx.run_date,
        page: ctx.page,
        optionable,
        added,
        deleted,
    })
}

/// Reads "YEAR: 2005 QUARTER: 4" from the first page header that carries it.
fn period_from_header(layout_text: &str) -> Option<FilingPeriod> {
    let caps = HEADER_PERIOD_RE.captures(layout_text)?;
    let year = caps[1].parse().ok()?;
    let quarter = caps[2].parse().ok()?;
    FilingPeriod::new(year, quarter).ok()
}
