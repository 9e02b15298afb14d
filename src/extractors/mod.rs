// src/extractors/mod.rs
pub mod covered_list;
pub mod layout;
pub mod pdf_text;

// Re-export key extraction types for convenience
#[allow(unused_imports)]
pub use covered_list::{
    CoveredListExtractor,
    CoveredSecurityRecord,
    ExtractedList,
    RowStrategy,
    ColumnRowStrategy,
    WhitespaceRowStrategy,
};
#[allow(unused_imports)]
pub use layout::TableLayout;
pub use pdf_text::{PdfTextSource, Pdftotext};
