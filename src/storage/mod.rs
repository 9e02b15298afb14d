// src/storage/mod.rs
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use crate::extractors::ExtractedList;
use crate::sec::FilingPeriod;
use crate::utils::error::StorageError;

/// Column order of the parsed CSV files.
pub const CSV_HEADERS: [&str; 9] = [
    "period", "cusip", "issuer", "description", "run_date", "page", "optionable", "added", "deleted",
];

pub struct StorageManager {
    base_dir: PathBuf,
}

impl StorageManager {
    /// Creates a new StorageManager with the specified base directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        let base_path = base_dir.as_ref().to_path_buf();

        // Create the base directory if it doesn't exist
        if !base_path.exists() {
            fs::create_dir_all(&base_path)
                .map_err(StorageError::IoError)?;
        }

        Ok(Self { base_dir: base_path })
    }

    /// Like [`StorageManager::new`], but wipes the directory first when `replace_existing` is set.
    pub fn prepare<P: AsRef<Path>>(base_dir: P, replace_existing: bool) -> Result<Self, StorageError> {
        let base_path = base_dir.as_ref();
        if replace_existing && base_path.exists() {
            tracing::info!("Removing existing contents of {}", base_path.display());
            fs::remove_dir_all(base_path)?;
        }
        Self::new(base_path)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn csv_path(&self, stem: &str) -> PathBuf {
        self.base_dir.join(format!("{}.csv", stem))
    }

    pub fn metadata_path(&self, stem: &str) -> PathBuf {
        self.base_dir.join(format!("{}.meta.json", stem))
    }

    /// True if this document has already been parsed into this directory.
    /// Both files must be present; the metadata is written last.
    pub fn has_output(&self, stem: &str) -> bool {
        self.csv_path(stem).is_file() && self.metadata_path(stem).is_file()
    }

    /// Periods of the PDFs already in this directory, under either file naming.
    pub fn stored_periods(&self) -> Result<HashSet<FilingPeriod>, StorageError> {
        let mut periods = HashSet::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let path = entry?.path();
            let is_pdf = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
            if !is_pdf || !path.is_file() {
                continue;
            }
            if let Some(period) = FilingPeriod::from_path(&path) {
                periods.insert(period);
            }
        }
        Ok(periods)
    }

    /// Saves a downloaded document as `file_name`.
    pub fn save_document(&self, file_name: &str, content: &[u8]) -> Result<PathBuf, StorageError> {
        let file_path = self.base_dir.join(file_name);
        write_atomically(&file_path, |tmp| fs::write(tmp, content).map_err(StorageError::IoError))?;
        Ok(file_path)
    }

    /// Writes the records of one document as `<stem>.csv`, header included even when empty.
    pub fn save_records(&self, list: &ExtractedList, stem: &str) -> Result<PathBuf, StorageError> {
        let file_path = self.csv_path(stem);

        write_atomically(&file_path, |tmp| {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_path(tmp)?;
            writer.write_record(CSV_HEADERS)?;
            for record in &list.records {
                writer.serialize(record)?;
            }
            writer.flush()?;
            Ok(())
        })?;

        tracing::info!("Saved {} records to {}", list.records.len(), file_path.display());

        Ok(file_path)
    }

    /// Saves metadata about the extraction in JSON format
    pub fn save_metadata(&self, list: &ExtractedList, stem: &str, source: &Path) -> Result<PathBuf, StorageError> {
        let file_path = self.metadata_path(stem);

        let metadata = serde_json::json!({
            "period": list.period,
            "source": source.display().to_string(),
            "record_count": list.records.len(),
            "expected_total": list.expected_total,
            "count_matches": list.count_matches(),
            "pages_scanned": list.pages_scanned,
            "table_pages": list.table_pages,
            "skipped_rows": list.skipped_rows,
            "extraction_timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let metadata_str = serde_json::to_string_pretty(&metadata)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        write_atomically(&file_path, |tmp| fs::write(tmp, &metadata_str).map_err(StorageError::IoError))?;

        tracing::debug!("Saved metadata to {}", file_path.display());

        Ok(file_path)
    }

    /// Keeps the converted layout text next to the output for debugging layouts.
    pub fn save_layout_text(&self, stem: &str, text: &str) -> Result<PathBuf, StorageError> {
        let debug_dir = self.base_dir.join("debug");
        fs::create_dir_all(&debug_dir)?;

        let file_path = debug_dir.join(format!("{}.txt", stem));
        fs::write(&file_path, text)?;

        tracing::info!("Saved layout text to {}", file_path.display());

        Ok(file_path)
    }
}

/// Writes to `<path>.tmp` first and renames it over `path`, so an interrupted
/// write never leaves a partial file under the final name.
fn write_atomically<F>(path: &Path, write: F) -> Result<(), StorageError>
where
    F: FnOnce(&Path) -> Result<(), StorageError>,
{
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let result = write(&tmp).and_then(|_| fs::rename(&tmp, path).map_err(StorageError::IoError));
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::CoveredSecurityRecord;
    use crate::sec::FilingPeriod;
    use chrono::NaiveDate;

    fn sample_list() -> ExtractedList {
        let period = FilingPeriod { year: 2005, quarter: 4 };
        let record = |cusip: &str, issuer: &str, optionable: bool| CoveredSecurityRecord {
            period,
            cusip: cusip.to_string(),
            issuer: issuer.to_string(),
            description: "COM".to_string(),
            run_date: NaiveDate::from_ymd_opt(2005, 12, 15),
            page: 1,
            optionable,
            added: false,
            deleted: false,
        };
        ExtractedList {
            period,
            records: vec![record("88579Y101", "3M CO", true), record("037833100", "APPLE INC, THE", false)],
            expected_total: Some(2),
            pages_scanned: 2,
            table_pages: 1,
            skipped_rows: 0,
        }
    }

    #[test]
    fn test_save_records_writes_csv() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path().join("parsed")).unwrap();
        assert!(!storage.has_output("2005Q4"));

        let path = storage.save_records(&sample_list(), "2005Q4").unwrap();
        assert!(!path.with_extension("csv.tmp").exists());

        let content = fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "period,cusip,issuer,description,run_date,page,optionable,added,deleted");
        assert_eq!(lines[1], "2005Q4,88579Y101,3M CO,COM,2005-12-15,1,true,false,false");
        assert_eq!(lines[2], "2005Q4,037833100,\"APPLE INC, THE\",COM,2005-12-15,1,false,false,false");
    }

    #[test]
    fn test_empty_list_still_gets_header() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).unwrap();
        let mut list = sample_list();
        list.records.clear();

        let path = storage.save_records(&list, "2005Q4").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap().trim_end(), CSV_HEADERS.join(","));
    }

    #[test]
    fn test_save_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).unwrap();

        let path = storage.save_metadata(&sample_list(), "2005Q4", Path::new("raw/2005Q4.pdf")).unwrap();
        let meta: serde_json::Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(meta["period"], "2005Q4");
        assert_eq!(meta["record_count"], 2);
        assert_eq!(meta["count_matches"], true);
        assert_eq!(meta["source"], "raw/2005Q4.pdf");
    }

    #[test]
    fn test_prepare_replaces_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("parsed");
        let storage = StorageManager::new(&out).unwrap();
        storage.save_records(&sample_list(), "2005Q4").unwrap();
        storage.save_metadata(&sample_list(), "2005Q4", Path::new("raw/2005Q4.pdf")).unwrap();
        storage.save_layout_text("2005Q4", "RUN DATE: 12/15/2005").unwrap();

        let kept = StorageManager::prepare(&out, false).unwrap();
        assert!(kept.has_output("2005Q4"));

        let replaced = StorageManager::prepare(&out, true).unwrap();
        assert!(!replaced.has_output("2005Q4"));
        assert!(!replaced.base_dir().join("debug").exists());
        assert!(replaced.base_dir().exists());
    }

    #[test]
    fn test_has_output_requires_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).unwrap();

        storage.save_records(&sample_list(), "2005Q4").unwrap();
        assert!(!storage.has_output("2005Q4"));

        storage.save_metadata(&sample_list(), "2005Q4", Path::new("raw/2005Q4.pdf")).unwrap();
        assert!(storage.has_output("2005Q4"));
    }

    #[test]
    fn test_failed_write_leaves_no_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).unwrap();
        // A directory squatting on the final name makes the rename fail
        fs::create_dir(storage.metadata_path("2005Q4")).unwrap();

        let result = storage.save_metadata(&sample_list(), "2005Q4", Path::new("raw/2005Q4.pdf"));
        assert!(matches!(result, Err(StorageError::IoError(_))));
        assert!(!dir.path().join("2005Q4.meta.json.tmp").exists());
        assert!(!storage.has_output("2005Q4"));
    }

    #[test]
    fn test_stored_periods_reads_both_namings() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).unwrap();
        storage.save_document("2005Q4.pdf", b"%PDF-1.4\n").unwrap();
        storage.save_document("1_2006.pdf", b"%PDF-1.4\n").unwrap();
        fs::write(dir.path().join("2006Q2.pdf.tmp"), b"partial").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();

        let periods = storage.stored_periods().unwrap();
        assert_eq!(periods.len(), 2);
        assert!(periods.contains(&FilingPeriod { year: 2005, quarter: 4 }));
        assert!(periods.contains(&FilingPeriod { year: 2006, quarter: 1 }));
        assert!(!periods.contains(&FilingPeriod { year: 2006, quarter: 2 }));
    }
}
