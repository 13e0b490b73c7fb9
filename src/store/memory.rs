use super::{StoreError, Table, TableRef, TableStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// In-process table store. Tables must be registered with
/// [`MemoryStore::insert`] before use; anything else reads as missing.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Vec<Vec<String>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, table: &TableRef, rows: Vec<Vec<String>>) {
        self.lock().insert(table.key(), rows);
    }

    /// Copy of the current rows, or `None` for an unknown table.
    pub fn snapshot(&self, table: &TableRef) -> Option<Vec<Vec<String>>> {
        self.lock().get(&table.key()).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<Vec<String>>>> {
        // A poisoned lock only means a test panicked mid-write
        match self.tables.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn with_table<T>(
        &self,
        table: &TableRef,
        f: impl FnOnce(&mut Vec<Vec<String>>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut tables = self.lock();
        let rows = tables
            .get_mut(&table.key())
            .ok_or_else(|| StoreError::NotFound(table.to_string()))?;
        f(rows)
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn read_all(&self, table: &TableRef) -> Result<Table, StoreError> {
        self.with_table(table, |rows| Ok(Table::new(rows.clone())))
    }

    async fn append_row(&self, table: &TableRef, row: Vec<String>) -> Result<(), StoreError> {
        self.with_table(table, |rows| {
            rows.push(row);
            Ok(())
        })
    }

    async fn write_header(&self, table: &TableRef, header: Vec<String>) -> Result<(), StoreError> {
        self.with_table(table, |rows| {
            match rows.first_mut() {
                Some(first) => *first = header,
                None => rows.push(header),
            }
            Ok(())
        })
    }

    async fn delete_row(&self, table: &TableRef, index: usize) -> Result<(), StoreError> {
        self.with_table(table, |rows| {
            if index >= rows.len() {
                return Err(StoreError::RowOutOfRange {
                    table: table.to_string(),
                    index,
                });
            }
            rows.remove(index);
            Ok(())
        })
    }

    async fn update_cell(
        &self,
        table: &TableRef,
        row: usize,
        col: usize,
        value: String,
    ) -> Result<(), StoreError> {
        self.with_table(table, |rows| {
            let cells = rows.get_mut(row).ok_or_else(|| StoreError::RowOutOfRange {
                table: table.to_string(),
                index: row,
            })?;
            if cells.len() <= col {
                cells.resize(col + 1, String::new());
            }
            cells[col] = value;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_unknown_table_is_not_found() {
        let store = MemoryStore::new();
        let table = TableRef::new("missing", None);
        assert!(matches!(
            store.read_all(&table).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_ensure_header_only_writes_once() {
        let store = MemoryStore::new();
        let table = TableRef::new("fresh", Some("Log"));
        store.insert(&table, vec![]);

        let header = row(&["From", "To"]);
        assert!(store.ensure_header(&table, &header).await.unwrap());
        assert!(!store
            .ensure_header(&table, &row(&["Other"]))
            .await
            .unwrap());

        assert_eq!(store.snapshot(&table).unwrap(), vec![header]);
    }

    #[tokio::test]
    async fn test_delete_and_update() {
        let store = MemoryStore::new();
        let table = TableRef::new("t", None);
        store.insert(&table, vec![row(&["A"]), row(&["1"]), row(&["2"])]);

        store.delete_row(&table, 1).await.unwrap();
        store
            .update_cell(&table, 1, 2, "x".to_string())
            .await
            .unwrap();
        assert_eq!(
            store.snapshot(&table).unwrap(),
            vec![row(&["A"]), row(&["2", "", "x"])]
        );

        assert!(matches!(
            store.delete_row(&table, 5).await,
            Err(StoreError::RowOutOfRange { index: 5, .. })
        ));
    }
}
