pub mod file;
pub mod memory;
pub mod sheets;

use crate::domain_utils::DomainUtils;
use async_trait::async_trait;
use std::fmt;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use sheets::SheetsStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Invalid log reference: {0}")]
    MalformedReference(String),
    #[error("Table not found: {0}")]
    NotFound(String),
    #[error("Row {index} out of range for {table}")]
    RowOutOfRange { table: String, index: usize },
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },
    #[error("Storage error: {0}")]
    Io(String),
}

/// A resolved tabular log: a document id plus an optional tab name.
///
/// `tab: None` addresses the first tab of the document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub id: String,
    pub tab: Option<String>,
}

impl TableRef {
    pub fn new(id: impl Into<String>, tab: Option<&str>) -> Self {
        Self {
            id: id.into(),
            tab: tab.map(str::to_string),
        }
    }

    /// Resolve a destination reference (usually a link) to a table.
    pub fn resolve(reference: &str, tab: Option<&str>) -> Result<Self, StoreError> {
        DomainUtils::extract_reference_token(reference)
            .map(|id| Self::new(id, tab))
            .ok_or_else(|| StoreError::MalformedReference(reference.to_string()))
    }

    /// Stable key used by the in-process back-ends.
    pub fn key(&self) -> String {
        match &self.tab {
            Some(tab) => format!("{}#{}", self.id, tab),
            None => self.id.clone(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tab {
            Some(tab) => write!(f, "{}[{}]", self.id, tab),
            None => write!(f, "{}", self.id),
        }
    }
}

/// Snapshot of a table. Row 0 is the header row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    pub fn headers(&self) -> &[String] {
        self.rows.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Header names trimmed, as a reader would compare them.
    pub fn trimmed_headers(&self) -> Vec<String> {
        self.headers().iter().map(|h| h.trim().to_string()).collect()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers().iter().position(|h| h.trim() == name)
    }

    /// Cell value; cells past the end of a ragged row read as "".
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Total rows including the header row.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of rows below the header.
    pub fn data_len(&self) -> usize {
        self.rows.len().saturating_sub(1)
    }

    pub fn header_is_blank(&self) -> bool {
        self.headers().iter().all(|h| h.trim().is_empty())
    }

    pub fn log_row(&self, index: usize) -> Option<LogRow> {
        let cells = self.rows.get(index)?;
        let values = self
            .headers()
            .iter()
            .enumerate()
            .map(|(col, name)| {
                let value = cells.get(col).cloned().unwrap_or_default();
                (name.trim().to_string(), value)
            })
            .collect();
        Some(LogRow { index, values })
    }
}

/// One logged exchange: ordered column/value pairs plus the positional
/// index the row had when it was read.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRow {
    pub index: usize,
    pub values: Vec<(String, String)>,
}

impl LogRow {
    pub fn get(&self, column: &str) -> &str {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
            .unwrap_or("")
    }
}

/// Capability-scoped access to tabular logs.
///
/// Row indices are zero-based and count the header row, so the first data
/// row is index 1.
#[async_trait]
pub trait TableStore: Send + Sync {
    async fn read_all(&self, table: &TableRef) -> Result<Table, StoreError>;

    async fn append_row(&self, table: &TableRef, row: Vec<String>) -> Result<(), StoreError>;

    /// Overwrite row 0 with `header`.
    async fn write_header(&self, table: &TableRef, header: Vec<String>) -> Result<(), StoreError>;

    async fn delete_row(&self, table: &TableRef, index: usize) -> Result<(), StoreError>;

    async fn update_cell(
        &self,
        table: &TableRef,
        row: usize,
        col: usize,
        value: String,
    ) -> Result<(), StoreError>;

    /// Write `header` when the table has no header yet. Returns whether it
    /// wrote anything.
    async fn ensure_header(&self, table: &TableRef, header: &[String]) -> Result<bool, StoreError> {
        let current = self.read_all(table).await?;
        if !current.header_is_blank() {
            return Ok(false);
        }

        self.write_header(table, header.to_vec()).await?;
        log::info!("Headers added to log: {}", table);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_resolve_reference() {
        let table = TableRef::resolve(
            "https://docs.google.com/spreadsheets/d/1LtZgk5aehWblrMRa42xMzy0baOACS5ofi_tlKpn7m3I/edit#gid=0",
            Some("Log"),
        )
        .unwrap();
        assert_eq!(table.id, "1LtZgk5aehWblrMRa42xMzy0baOACS5ofi_tlKpn7m3I");
        assert_eq!(table.tab.as_deref(), Some("Log"));

        assert!(matches!(
            TableRef::resolve("https://example.com/short", None),
            Err(StoreError::MalformedReference(_))
        ));
    }

    #[test]
    fn test_table_accessors() {
        let table = Table::new(vec![
            strings(&[" From ", "To", "Subject"]),
            strings(&["a@x.com", "b@y.com"]),
        ]);

        assert_eq!(table.column("From"), Some(0));
        assert_eq!(table.column("Body"), None);
        assert_eq!(table.cell(1, 1), "b@y.com");
        assert_eq!(table.cell(1, 2), "");
        assert_eq!(table.cell(9, 0), "");
        assert_eq!(table.data_len(), 1);
        assert!(!table.header_is_blank());

        let row = table.log_row(1).unwrap();
        assert_eq!(row.index, 1);
        assert_eq!(row.get("From"), "a@x.com");
        assert_eq!(row.get("Subject"), "");
    }

    #[test]
    fn test_blank_header() {
        assert!(Table::default().header_is_blank());
        assert!(Table::new(vec![strings(&["", " "])]).header_is_blank());
    }
}
