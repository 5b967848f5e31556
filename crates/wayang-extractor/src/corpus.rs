//! Corpus loading
//!
//! Reads story rows from a CSV export. Rows without text are dropped
//! before any processing.

use std::io::Read;
use std::path::Path;

use wayang_core::{CorpusConfig, CorpusRow, Result, WayangError};

const UNKNOWN_STORY: &str = "Unknown Story";

/// CSV corpus reader with a configurable column mapping
#[derive(Debug, Clone, Default)]
pub struct CorpusReader {
    columns: CorpusConfig,
}

impl CorpusReader {
    pub fn new(columns: CorpusConfig) -> Self {
        Self { columns }
    }

    /// Read all rows from a CSV file
    pub fn read_path(&self, path: &Path) -> Result<Vec<CorpusRow>> {
        if !path.exists() {
            return Err(WayangError::input_missing(path));
        }
        let file = std::fs::File::open(path)?;
        self.read_from(file)
    }

    /// Read all rows from any CSV source
    pub fn read_from<R: Read>(&self, source: R) -> Result<Vec<CorpusRow>> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(source);

        let headers = reader
            .headers()
            .map_err(|e| WayangError::Parse(format!("corpus header: {e}")))?
            .clone();
        let position = |name: &str| headers.iter().position(|h| h.trim() == name);

        let text_idx = position(&self.columns.text_column).ok_or_else(|| {
            WayangError::Parse(format!(
                "corpus has no '{}' column",
                self.columns.text_column
            ))
        })?;
        let title_idx = position(&self.columns.title_column);
        let subtitle_idx = position(&self.columns.subtitle_column);

        let mut rows = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record =
                record.map_err(|e| WayangError::Parse(format!("corpus row {}: {e}", line + 1)))?;

            let text = match record.get(text_idx) {
                Some(text) if !text.trim().is_empty() => text.to_string(),
                _ => continue,
            };

            let title = title_idx
                .and_then(|i| record.get(i))
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .unwrap_or(UNKNOWN_STORY)
                .to_string();

            let subtitle = subtitle_idx
                .and_then(|i| record.get(i))
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string);

            rows.push(CorpusRow {
                title,
                subtitle,
                text,
            });
        }

        tracing::debug!(rows = rows.len(), "corpus loaded");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drops_rows_without_text() {
        let csv = "Judul,Subjudul,Teks\n\
                   Sakri Lahir,Bagian 1,Prabu Basukesti bertahta di Wirata.\n\
                   Sakri Lahir,Bagian 2,\n\
                   ,Bagian 3,Resi Suganda datang.\n";

        let rows = CorpusReader::default().read_from(csv.as_bytes()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].title, "Sakri Lahir");
        assert_eq!(rows[0].subtitle.as_deref(), Some("Bagian 1"));
        assert_eq!(rows[1].title, "Unknown Story");
    }

    #[test]
    fn test_missing_title_column() {
        let csv = "Teks\nDewi Kaniraras menangis.\n";
        let rows = CorpusReader::default().read_from(csv.as_bytes()).unwrap();
        assert_eq!(rows[0].title, "Unknown Story");
        assert_eq!(rows[0].subtitle, None);
    }

    #[test]
    fn test_missing_text_column_is_parse_error() {
        let csv = "Judul\nSakri Lahir\n";
        let err = CorpusReader::default().read_from(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, WayangError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = CorpusReader::default()
            .read_path(Path::new("/nonexistent/corpus.csv"))
            .unwrap_err();
        assert!(matches!(err, WayangError::InputMissing { .. }));
    }
}
