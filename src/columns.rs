use crate::store::{StoreError, TableRef, TableStore};

/// Lay `source_row` out in the column order of `destination_headers`,
/// matching columns by name. Destination columns the source lacks are
/// filled with "".
pub fn map_row(
    destination_headers: &[String],
    source_headers: &[String],
    source_row: &[String],
) -> Vec<String> {
    destination_headers
        .iter()
        .map(|name| {
            source_headers
                .iter()
                .position(|h| h == name)
                .and_then(|i| source_row.get(i))
                .cloned()
                .unwrap_or_default()
        })
        .collect()
}

/// Append a source row to the destination named by `reference`.
///
/// A fresh destination (blank or missing header row) first receives
/// `source_headers` as its header. Returns the resolved destination.
pub async fn append_to_destination(
    store: &dyn TableStore,
    reference: &str,
    destination_tab: &str,
    source_headers: &[String],
    source_row: &[String],
) -> Result<TableRef, StoreError> {
    let destination = TableRef::resolve(reference, Some(destination_tab))?;

    store.ensure_header(&destination, source_headers).await?;

    let current = store.read_all(&destination).await?;
    let mapped = map_row(current.headers(), source_headers, source_row);

    store.append_row(&destination, mapped).await?;
    log::info!("Appended row to client log: {}", destination);
    Ok(destination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const REF: &str = "https://docs.google.com/spreadsheets/d/1U8Z02OzmOFc6rI8zFtfVwo1vB1ZoISJIL1EvA8R7YKE/edit";
    const ID: &str = "1U8Z02OzmOFc6rI8zFtfVwo1vB1ZoISJIL1EvA8R7YKE";

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn source_headers() -> Vec<String> {
        strings(&["Date", "Thread ID", "Subject", "From", "To"])
    }

    fn source_row() -> Vec<String> {
        strings(&["2024-05-01", "t-1", "Quote", "a@org.com", "b@client.com"])
    }

    #[test]
    fn test_map_row_subset_reordered() {
        let mapped = map_row(&strings(&["Subject", "From"]), &source_headers(), &source_row());
        assert_eq!(mapped, strings(&["Quote", "a@org.com"]));
    }

    #[test]
    fn test_map_row_unknown_columns_are_blank() {
        let mapped = map_row(
            &strings(&["To", "Needs Draft", "Date"]),
            &source_headers(),
            &source_row(),
        );
        assert_eq!(mapped, strings(&["b@client.com", "", "2024-05-01"]));
    }

    #[test]
    fn test_map_row_short_source_row() {
        let mapped = map_row(&strings(&["To"]), &source_headers(), &strings(&["d"]));
        assert_eq!(mapped, strings(&[""]));
    }

    #[tokio::test]
    async fn test_append_initializes_fresh_destination() {
        let store = MemoryStore::new();
        let table = TableRef::new(ID, Some("Log"));
        store.insert(&table, vec![]);

        let resolved = append_to_destination(&store, REF, "Log", &source_headers(), &source_row())
            .await
            .unwrap();
        assert_eq!(resolved, table);

        let rows = store.snapshot(&table).unwrap();
        assert_eq!(rows, vec![source_headers(), source_row()]);
    }

    #[tokio::test]
    async fn test_append_respects_existing_header_order() {
        let store = MemoryStore::new();
        let table = TableRef::new(ID, Some("Log"));
        store.insert(&table, vec![strings(&["Subject", "From"])]);

        append_to_destination(&store, REF, "Log", &source_headers(), &source_row())
            .await
            .unwrap();

        let rows = store.snapshot(&table).unwrap();
        assert_eq!(rows[1], strings(&["Quote", "a@org.com"]));
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_append_with_bad_reference_fails() {
        let store = MemoryStore::new();
        let result =
            append_to_destination(&store, "no token here", "Log", &source_headers(), &source_row())
                .await;
        assert!(matches!(result, Err(StoreError::MalformedReference(_))));
    }
}
