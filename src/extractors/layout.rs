// src/extractors/layout.rs
//! Column header detection for the covered securities table.
//!
//! The list has been printed from several generations of SEC systems, so the
//! header wording drifts between eras. A [`TableLayout`] names the labels one
//! era used for each column; the extractor tries its layouts in order.

/// Header labels for one printing of the table. Labels are matched
/// case-insensitively; list longer labels before their prefixes.
#[derive(Debug, Clone)]
pub struct TableLayout {
    pub name: String,
    pub cusip_labels: Vec<String>,
    pub issuer_labels: Vec<String>,
    pub description_labels: Vec<String>,
}

/// Character offsets of the columns found on a header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnBounds {
    pub issuer: usize,
    pub description: Option<usize>,
}

fn labels(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl TableLayout {
    /// The `CUSIP NO / ISSUER NAME / ISSUER DESCRIPTION` layout plus the
    /// wording variants seen on older lists. The trailing STATUS column needs
    /// no label: its text is read from the end of the description cell.
    pub fn standard() -> Self {
        Self {
            name: "standard".to_string(),
            cusip_labels: labels(&["CUSIP NO", "CUSIP NUMBER", "CUSIP"]),
            issuer_labels: labels(&["ISSUER NAME", "NAME OF ISSUER"]),
            description_labels: labels(&["ISSUER DESCRIPTION", "TITLE OF CLASS", "DESCRIPTION"]),
        }
    }

    /// Returns column offsets if `line` is this layout's header line.
    ///
    /// CUSIP and issuer labels are required and must appear in that order.
    /// The description label is optional but must follow the issuer.
    pub fn locate(&self, line: &str) -> Option<ColumnBounds> {
        let upper = line.to_ascii_uppercase();

        let cusip = find_label(&upper, &self.cusip_labels, 0)?;
        let issuer = find_label(&upper, &self.issuer_labels, cusip + 1)?;
        let description = find_label(&upper, &self.description_labels, issuer + 1);

        Some(ColumnBounds {
            issuer: char_offset(line, issuer),
            description: description.map(|d| char_offset(line, d)),
        })
    }
}

/// Byte offset of the first label found at or after `from`.
fn find_label(upper: &str, labels: &[String], from: usize) -> Option<usize> {
    let haystack = upper.get(from..)?;
    labels
        .iter()
        .find_map(|label| haystack.find(&label.to_ascii_uppercase()))
        .map(|pos| pos + from)
}

fn char_offset(line: &str, byte_offset: usize) -> usize {
    line.get(..byte_offset).map_or(byte_offset, |prefix| prefix.chars().count())
}

/// Slices `line` by character positions; out-of-range bounds clamp to the line.
pub fn char_slice(line: &str, start: usize, end: Option<usize>) -> &str {
    let byte_at = |n: usize| line.char_indices().nth(n).map_or(line.len(), |(i, _)| i);
    let start = byte_at(start);
    let end = end.map_or(line.len(), byte_at);
    if start >= end {
        ""
    } else {
        &line[start..end]
    }
}
