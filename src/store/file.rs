use super::{StoreError, Table, TableRef, TableStore};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Table store backed by one JSON file (array of rows) per table.
///
/// Useful for local runs without any spreadsheet service. A table exists
/// once its file exists; the file name is derived from the table key.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, table: &TableRef) -> PathBuf {
        let name: String = table
            .key()
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{name}.json"))
    }

    /// Create (or replace) a table file with the given rows.
    pub async fn create(&self, table: &TableRef, rows: &[Vec<String>]) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?;
        self.save(table, rows).await
    }

    async fn load(&self, table: &TableRef) -> Result<Vec<Vec<String>>, StoreError> {
        let path = self.path_for(table);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(table.to_string()))
            }
            Err(e) => return Err(StoreError::Io(format!("{}: {e}", path.display()))),
        };
        serde_json::from_str(&content)
            .map_err(|e| StoreError::Io(format!("{}: {e}", path.display())))
    }

    async fn save(&self, table: &TableRef, rows: &[Vec<String>]) -> Result<(), StoreError> {
        let path = self.path_for(table);
        let content =
            serde_json::to_string_pretty(rows).map_err(|e| StoreError::Io(e.to_string()))?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| StoreError::Io(format!("{}: {e}", path.display())))
    }
}

#[async_trait]
impl TableStore for FileStore {
    async fn read_all(&self, table: &TableRef) -> Result<Table, StoreError> {
        Ok(Table::new(self.load(table).await?))
    }

    async fn append_row(&self, table: &TableRef, row: Vec<String>) -> Result<(), StoreError> {
        let mut rows = self.load(table).await?;
        rows.push(row);
        self.save(table, &rows).await
    }

    async fn write_header(&self, table: &TableRef, header: Vec<String>) -> Result<(), StoreError> {
        let mut rows = self.load(table).await?;
        match rows.first_mut() {
            Some(first) => *first = header,
            None => rows.push(header),
        }
        self.save(table, &rows).await
    }

    async fn delete_row(&self, table: &TableRef, index: usize) -> Result<(), StoreError> {
        let mut rows = self.load(table).await?;
        if index >= rows.len() {
            return Err(StoreError::RowOutOfRange {
                table: table.to_string(),
                index,
            });
        }
        rows.remove(index);
        self.save(table, &rows).await
    }

    async fn update_cell(
        &self,
        table: &TableRef,
        row: usize,
        col: usize,
        value: String,
    ) -> Result<(), StoreError> {
        let mut rows = self.load(table).await?;
        let cells = rows.get_mut(row).ok_or_else(|| StoreError::RowOutOfRange {
            table: table.to_string(),
            index: row,
        })?;
        if cells.len() <= col {
            cells.resize(col + 1, String::new());
        }
        cells[col] = value;
        self.save(table, &rows).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_file_store_persists_changes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let table = TableRef::new("client-log", Some("Log"));

        store.create(&table, &[row(&["From", "To"])]).await.unwrap();
        store
            .append_row(&table, row(&["a@x.com", "b@y.com"]))
            .await
            .unwrap();
        store
            .update_cell(&table, 1, 1, "c@y.com".to_string())
            .await
            .unwrap();

        let reopened = FileStore::new(dir.path());
        let snapshot = reopened.read_all(&table).await.unwrap();
        assert_eq!(snapshot.cell(1, 1), "c@y.com");

        reopened.delete_row(&table, 1).await.unwrap();
        assert_eq!(reopened.read_all(&table).await.unwrap().data_len(), 0);
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let result = store.read_all(&TableRef::new("nope", None)).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }
}
