use crate::config::RegistryConfig;
use crate::domain_utils::DomainUtils;
use crate::store::{StoreError, Table, TableRef, TableStore};
use std::collections::HashMap;

/// Mapping of external domain to destination reference, built fresh from
/// the client registry on every run.
///
/// Iteration follows the order in which each domain was first seen in the
/// registry; a later registry row for the same domain replaces the
/// destination but keeps that position.
#[derive(Debug, Clone, Default)]
pub struct AllowlistIndex {
    entries: Vec<(String, String)>,
    positions: HashMap<String, usize>,
}

impl AllowlistIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from registry rows (row 0 is the header and is skipped).
    pub fn from_registry(
        registry: &Table,
        destination_column: usize,
        website_column: usize,
    ) -> Self {
        let mut index = Self::new();

        for row in 1..registry.len() {
            let destination = registry.cell(row, destination_column).trim();
            let website = registry.cell(row, website_column).trim();

            if destination.is_empty() || website.is_empty() {
                log::debug!("Registry row {} skipped: missing website or log reference", row + 1);
                continue;
            }

            match DomainUtils::domain_from_url_field(website) {
                Some(domain) => index.insert(domain, destination.to_string()),
                None => log::debug!(
                    "Registry row {} skipped: no domain in '{}'",
                    row + 1,
                    website
                ),
            }
        }

        log::info!("Allowed domains loaded: {:?}", index.domains());
        index
    }

    /// Read the registry table through the store and build the index.
    pub async fn load(
        store: &dyn TableStore,
        registry_table: &TableRef,
        registry: &RegistryConfig,
    ) -> Result<Self, StoreError> {
        let table = store.read_all(registry_table).await?;
        Ok(Self::from_registry(
            &table,
            registry.destination_column,
            registry.website_column,
        ))
    }

    /// Insert or overwrite the destination for `domain`.
    pub fn insert(&mut self, domain: String, destination: String) {
        match self.positions.get(&domain) {
            Some(&position) => self.entries[position].1 = destination,
            None => {
                self.positions.insert(domain.clone(), self.entries.len());
                self.entries.push((domain, destination));
            }
        }
    }

    pub fn lookup(&self, domain: &str) -> Option<&str> {
        self.positions
            .get(domain)
            .map(|&position| self.entries[position].1.as_str())
    }

    pub fn domains(&self) -> Vec<&str> {
        self.entries.iter().map(|(d, _)| d.as_str()).collect()
    }

    /// Distinct destination references, in index order.
    pub fn destinations(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.entries
            .iter()
            .map(|(_, dest)| dest.as_str())
            .filter(|dest| seen.insert(*dest))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    /// A registry row with the website in column 18 and the log link in 17.
    fn registry_row(destination: &str, website: &str) -> Vec<String> {
        let mut row = vec![String::new(); 19];
        row[0] = "Client".to_string();
        row[17] = destination.to_string();
        row[18] = website.to_string();
        row
    }

    #[test]
    fn test_builds_domain_mapping() {
        let registry = Table::new(vec![
            registry_row("Email Log", "Website"),
            registry_row(" ref-a ", "https://www.Alpha.com/about"),
            registry_row("ref-b", "beta.io"),
        ]);

        let index = AllowlistIndex::from_registry(&registry, 17, 18);
        assert_eq!(index.len(), 2);
        assert_eq!(index.lookup("alpha.com"), Some("ref-a"));
        assert_eq!(index.lookup("beta.io"), Some("ref-b"));
        assert_eq!(index.lookup("website"), None);
    }

    #[test]
    fn test_skips_incomplete_rows() {
        let registry = Table::new(vec![
            registry_row("h", "h"),
            registry_row("", "gamma.com"),
            registry_row("ref-d", ""),
            registry_row("ref-e", "https://"),
            vec!["short row".to_string()],
        ]);

        assert!(AllowlistIndex::from_registry(&registry, 17, 18).is_empty());
    }

    #[test]
    fn test_duplicate_domain_last_write_wins() {
        let registry = Table::new(vec![
            registry_row("h", "h"),
            registry_row("ref-1", "dup.com"),
            registry_row("ref-2", "other.com"),
            registry_row("ref-3", "http://www.dup.com"),
        ]);

        let index = AllowlistIndex::from_registry(&registry, 17, 18);
        assert_eq!(index.lookup("dup.com"), Some("ref-3"));
        assert_eq!(index.domains(), vec!["dup.com", "other.com"]);
    }

    #[test]
    fn test_destinations_are_distinct_in_order() {
        let mut index = AllowlistIndex::new();
        index.insert("a.com".to_string(), "shared".to_string());
        index.insert("b.com".to_string(), "solo".to_string());
        index.insert("c.com".to_string(), "shared".to_string());

        assert_eq!(index.destinations(), vec!["shared", "solo"]);
    }

    #[tokio::test]
    async fn test_load_through_store() {
        let store = MemoryStore::new();
        let table = TableRef::new("registry", Some("Info"));
        store.insert(
            &table,
            vec![registry_row("h", "h"), registry_row("ref-a", "alpha.com")],
        );

        let config = RegistryConfig {
            reference: "unused".to_string(),
            tab: "Info".to_string(),
            destination_column: 17,
            website_column: 18,
        };
        let index = AllowlistIndex::load(&store, &table, &config).await.unwrap();
        assert_eq!(index.lookup("alpha.com"), Some("ref-a"));
    }
}
