use std::collections::BTreeSet;
use shared::protocol::ALL_REGIONS;

/// The three independent selection sets.
///
/// Region ids obey the sentinel rule: `"all"` never coexists with a
/// specific region id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionStore {
    services: BTreeSet<String>,
    regions: BTreeSet<String>,
    ip_queries: BTreeSet<String>,
}

impl SelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the id was not already selected.
    pub fn add_service(&mut self, id: &str) -> bool {
        self.services.insert(id.to_string())
    }

    pub fn remove_service(&mut self, id: &str) -> bool {
        self.services.remove(id)
    }

    /// Adding `"all"` clears every specific region; adding a specific
    /// region drops `"all"`.
    pub fn add_region(&mut self, id: &str) -> bool {
        if id == ALL_REGIONS {
            self.regions.retain(|r| r == ALL_REGIONS);
        } else {
            self.regions.remove(ALL_REGIONS);
        }
        self.regions.insert(id.to_string())
    }

    /// Removing the last specific region leaves the set empty; `"all"` is
    /// not restored.
    pub fn remove_region(&mut self, id: &str) -> bool {
        self.regions.remove(id)
    }

    pub fn add_ip_query(&mut self, value: &str) -> bool {
        self.ip_queries.insert(value.to_string())
    }

    pub fn remove_ip_query(&mut self, value: &str) -> bool {
        self.ip_queries.remove(value)
    }

    pub fn services(&self) -> &BTreeSet<String> {
        &self.services
    }

    pub fn regions(&self) -> &BTreeSet<String> {
        &self.regions
    }

    pub fn ip_queries(&self) -> &BTreeSet<String> {
        &self.ip_queries
    }

    pub fn total_count(&self) -> usize {
        self.services.len() + self.regions.len() + self.ip_queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_count() == 0
    }

    /// Empties all three sets. Callers hold `&mut self`, so no partially
    /// cleared state is ever observable.
    pub fn clear(&mut self) {
        self.services.clear();
        self.regions.clear();
        self.ip_queries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_total(store: &SelectionStore) {
        assert_eq!(
            store.total_count(),
            store.services().len() + store.regions().len() + store.ip_queries().len()
        );
    }

    #[test]
    fn test_add_and_remove() {
        let mut store = SelectionStore::new();
        assert!(store.add_service("Storage"));
        assert!(!store.add_service("Storage"));
        assert!(store.add_ip_query("40.79.152.10"));
        assert!(store.add_region("eastus"));
        assert_eq!(store.total_count(), 3);

        assert!(store.remove_service("Storage"));
        assert!(!store.remove_service("Storage"));
        assert!(store.remove_ip_query("40.79.152.10"));
        assert!(store.remove_region("eastus"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_all_region_clears_specific_regions() {
        let mut store = SelectionStore::new();
        store.add_region("eastus");
        store.add_region("westus");
        store.add_region(ALL_REGIONS);

        assert_eq!(store.regions().len(), 1);
        assert!(store.regions().contains(ALL_REGIONS));
        assert!(!store.regions().contains("eastus"));
        assert_total(&store);
    }

    #[test]
    fn test_specific_region_drops_all() {
        let mut store = SelectionStore::new();
        store.add_region(ALL_REGIONS);
        store.add_region("eastus");

        assert_eq!(store.regions().iter().collect::<Vec<_>>(), vec!["eastus"]);
        assert_total(&store);
    }

    #[test]
    fn test_removing_last_region_does_not_restore_all() {
        let mut store = SelectionStore::new();
        store.add_region("eastus");
        store.remove_region("eastus");
        assert!(store.regions().is_empty());
    }

    #[test]
    fn test_sets_are_independent() {
        let mut store = SelectionStore::new();
        store.add_service("10.0.0.1");
        store.add_ip_query("10.0.0.1");
        assert_eq!(store.total_count(), 2);

        store.remove_service("10.0.0.1");
        assert!(store.ip_queries().contains("10.0.0.1"));
        assert_total(&store);
    }

    #[test]
    fn test_clear() {
        let mut store = SelectionStore::new();
        store.add_service("Storage");
        store.add_region("eastus");
        store.add_ip_query("not even an address");
        store.clear();
        assert_eq!(store, SelectionStore::new());
        assert_eq!(store.total_count(), 0);
    }
}
