use std::collections::{BTreeMap, HashMap, HashSet};
use serde::Deserialize;
use serde_json::Value;
use shared::types::{Category, Entity, RawRecord};
use crate::address::{match_prefix, AddressLiteral};
use crate::index::fingerprint;

/// Name keywords per category, tested as lowercase substrings in this order.
const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Popular,
        &[
            "azurecloud",
            "azureactivedirectory",
            "azuremonitor",
            "azurekeyvault",
            "appservice",
            "azurefrontdoor",
            "azuredevops",
        ],
    ),
    (
        Category::Compute,
        &["compute", "batch", "virtualmachine", "kubernetes", "aks", "container", "functions", "hdinsight"],
    ),
    (
        Category::Storage,
        &["storage", "datalake", "backup", "sitereplication", "filesync"],
    ),
    (
        Category::Database,
        &["sql", "cosmos", "database", "redis", "mysql", "postgres", "mariadb", "datafactory"],
    ),
    (
        Category::Networking,
        &["network", "frontdoor", "trafficmanager", "loadbalancer", "gateway", "vpn", "dns", "firewall"],
    ),
];

/// Assigns a category by fixed precedence; first keyword hit wins.
pub fn classify_category(name: &str) -> Category {
    let lower = name.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(category, _)| *category)
        .unwrap_or(Category::Other)
}

/// One distinct prefix string across the whole catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixCacheEntry {
    /// First-seen spelling
    pub raw: String,
    pub normalized_lower: String,
}

/// Deduplicates every entity prefix case-insensitively, keeping dataset order
/// and the first-seen spelling.
pub fn build_prefix_cache(entities: &[Entity]) -> Vec<PrefixCacheEntry> {
    let mut seen = HashSet::new();
    let mut cache = Vec::new();

    for prefix in entities.iter().flat_map(|e| e.address_prefixes.iter()) {
        let normalized_lower = prefix.to_lowercase();
        if seen.insert(normalized_lower.clone()) {
            cache.push(PrefixCacheEntry {
                raw: prefix.clone(),
                normalized_lower,
            });
        }
    }

    cache
}

/// In-memory catalog of dataset entities.
#[derive(Debug, Clone, Default)]
pub struct ServiceIndex {
    entities: Vec<Entity>,
    by_id: HashMap<String, usize>,
    prefix_cache: Vec<PrefixCacheEntry>,
}

impl ServiceIndex {
    /// Builds the catalog from raw dataset records.
    /// Records without a usable `id` or `name` are skipped, never fatal.
    pub fn build(records: &[Value]) -> Self {
        let mut entities = Vec::with_capacity(records.len());
        let mut by_id = HashMap::with_capacity(records.len());
        let mut skipped = 0usize;

        for (position, value) in records.iter().enumerate() {
            let record = match RawRecord::deserialize(value) {
                Ok(record) => record,
                Err(e) => {
                    tracing::debug!(position, "Skipping unreadable record: {}", e);
                    skipped += 1;
                    continue;
                }
            };

            let Some(entity) = entity_from_record(record) else {
                tracing::debug!(position, "Skipping record without id or name");
                skipped += 1;
                continue;
            };

            if by_id.contains_key(&entity.id) {
                tracing::warn!("Skipping duplicate record {}", entity.id);
                skipped += 1;
                continue;
            }

            by_id.insert(entity.id.clone(), entities.len());
            entities.push(entity);
        }

        let prefix_cache = build_prefix_cache(&entities);

        tracing::info!(
            entities = entities.len(),
            skipped,
            prefixes = prefix_cache.len(),
            "Built service index"
        );

        Self {
            entities,
            by_id,
            prefix_cache,
        }
    }

    /// All entities in dataset order
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.by_id.get(id).map(|&i| &self.entities[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Entity count per category. Every category is present, possibly with zero.
    pub fn category_counts(&self) -> BTreeMap<Category, usize> {
        let mut counts: BTreeMap<Category, usize> =
            Category::ALL.iter().map(|c| (*c, 0)).collect();
        for entity in &self.entities {
            *counts.entry(entity.category).or_default() += 1;
        }
        counts
    }

    pub fn prefix_cache(&self) -> &[PrefixCacheEntry] {
        &self.prefix_cache
    }

    /// Entities whose region equals `region_id` (case-insensitive), in dataset order.
    pub fn entities_in_region<'a>(&'a self, region_id: &'a str) -> impl Iterator<Item = &'a Entity> + 'a {
        self.entities
            .iter()
            .filter(move |e| e.region.eq_ignore_ascii_case(region_id))
    }

    /// Entities with a prefix matching an address or CIDR term.
    ///
    /// An entity's rank is its best prefix match (exact CIDR, then
    /// containment, then exact address). Output is sorted by rank and keeps
    /// dataset order within a rank. Non-address terms match nothing.
    pub fn entities_matching_address(&self, term: &str) -> Vec<&Entity> {
        let term = term.trim();
        let Some(query) = AddressLiteral::parse(term) else {
            return Vec::new();
        };

        let mut ranked: Vec<_> = self
            .entities
            .iter()
            .filter_map(|entity| {
                entity
                    .address_prefixes
                    .iter()
                    .filter_map(|prefix| match_prefix(&query, term, prefix))
                    .min()
                    .map(|rank| (rank, entity))
            })
            .collect();

        // sort_by_key is stable
        ranked.sort_by_key(|(rank, _)| *rank);
        ranked.into_iter().map(|(_, entity)| entity).collect()
    }

    pub fn fingerprint(&self) -> String {
        fingerprint::compute_fingerprint(&self.entities)
    }
}

fn entity_from_record(record: RawRecord) -> Option<Entity> {
    let id = record.id.filter(|s| !s.trim().is_empty())?;
    let name = record.name.filter(|s| !s.trim().is_empty())?;
    let properties = record.properties.unwrap_or_default();

    Some(Entity {
        category: classify_category(&name),
        region: properties.region.unwrap_or_default(),
        address_prefixes: properties.address_prefixes.unwrap_or_default(),
        id,
        name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_records() -> Vec<Value> {
        vec![
            json!({
                "id": "Storage",
                "name": "Storage",
                "properties": {
                    "region": "",
                    "addressPrefixes": ["40.79.152.0/21", "2603:1030::/23"]
                }
            }),
            json!({
                "id": "Storage.EastUS",
                "name": "Storage.EastUS",
                "properties": {
                    "region": "eastus",
                    "addressPrefixes": ["40.79.152.0/21", "20.38.98.0/24"]
                }
            }),
            json!({
                "id": "AzureCloud.eastus",
                "name": "AzureCloud.eastus",
                "properties": {
                    "region": "eastus",
                    "addressPrefixes": ["13.107.0.0/16", "40.79.152.10"]
                }
            }),
            json!({"id": "Sql", "name": "Sql"}),
            json!({"name": "NoId"}),
            json!({"id": "NoName"}),
            json!({"id": 42, "name": "NumericId"}),
            json!("not even an object"),
        ]
    }

    #[test]
    fn test_build_skips_malformed_records() {
        let index = ServiceIndex::build(&test_records());
        assert_eq!(index.len(), 4);
        assert!(index.contains("Storage"));
        assert!(index.contains("Sql"));
        assert!(!index.contains("NoName"));

        let sql = index.get("Sql").unwrap();
        assert!(sql.address_prefixes.is_empty());
        assert_eq!(sql.region, "");
    }

    #[test]
    fn test_build_skips_duplicate_ids() {
        let records = vec![
            json!({"id": "Sql", "name": "Sql", "properties": {"region": "westus"}}),
            json!({"id": "Sql", "name": "Sql", "properties": {"region": "eastus"}}),
        ];
        let index = ServiceIndex::build(&records);
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("Sql").unwrap().region, "westus");
    }

    #[test]
    fn test_classify_category_precedence() {
        assert_eq!(classify_category("AzureCloud.eastus"), Category::Popular);
        // Popular wins over networking for front door
        assert_eq!(classify_category("AzureFrontDoor.Backend"), Category::Popular);
        assert_eq!(classify_category("BatchNodeManagement"), Category::Compute);
        assert_eq!(classify_category("Storage.EastUS"), Category::Storage);
        assert_eq!(classify_category("SQL.WestEurope"), Category::Database);
        assert_eq!(classify_category("AzureTrafficManager"), Category::Networking);
        assert_eq!(classify_category("PowerBI"), Category::Other);
    }

    #[test]
    fn test_category_counts() {
        let index = ServiceIndex::build(&test_records());
        let counts = index.category_counts();
        assert_eq!(counts.len(), Category::ALL.len());
        assert_eq!(counts[&Category::Storage], 2);
        assert_eq!(counts[&Category::Popular], 1);
        assert_eq!(counts[&Category::Database], 1);
        assert_eq!(counts[&Category::Compute], 0);
        assert_eq!(counts.values().sum::<usize>(), index.len());
    }

    #[test]
    fn test_prefix_cache_dedups_case_insensitively() {
        let records = vec![
            json!({"id": "A", "name": "A", "properties": {"addressPrefixes": ["2001:db8::/32", "10.0.0.0/8"]}}),
            json!({"id": "B", "name": "B", "properties": {"addressPrefixes": ["2001:DB8::/32", "11.0.0.0/8"]}}),
        ];
        let index = ServiceIndex::build(&records);
        let cache = index.prefix_cache();

        let raws: Vec<&str> = cache.iter().map(|e| e.raw.as_str()).collect();
        assert_eq!(raws, vec!["2001:db8::/32", "10.0.0.0/8", "11.0.0.0/8"]);
        assert!(cache.iter().all(|e| e.normalized_lower == e.raw.to_lowercase()));
    }

    #[test]
    fn test_entities_matching_address_containment() {
        let index = ServiceIndex::build(&test_records());
        let ids: Vec<&str> = index
            .entities_matching_address("40.79.152.10")
            .iter()
            .map(|e| e.id.as_str())
            .collect();
        // Containment outranks the bare-address hit on AzureCloud.eastus
        assert_eq!(ids, vec!["Storage", "Storage.EastUS", "AzureCloud.eastus"]);
    }

    #[test]
    fn test_entities_matching_address_exact_cidr() {
        let index = ServiceIndex::build(&test_records());
        let ids: Vec<&str> = index
            .entities_matching_address("40.79.152.0/21")
            .iter()
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(ids, vec!["Storage", "Storage.EastUS"]);

        let ids: Vec<&str> = index
            .entities_matching_address("2603:1030::/23")
            .iter()
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(ids, vec!["Storage"]);
    }

    #[test]
    fn test_entities_matching_address_ipv6() {
        let index = ServiceIndex::build(&test_records());
        let ids: Vec<&str> = index
            .entities_matching_address("2603:1030:0:1::1")
            .iter()
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(ids, vec!["Storage"]);
    }

    #[test]
    fn test_entities_matching_address_is_stable() {
        let index = ServiceIndex::build(&test_records());
        let first: Vec<String> = index
            .entities_matching_address("40.79.152.10")
            .iter()
            .map(|e| e.id.clone())
            .collect();
        for _ in 0..5 {
            let again: Vec<String> = index
                .entities_matching_address("40.79.152.10")
                .iter()
                .map(|e| e.id.clone())
                .collect();
            assert_eq!(first, again);
        }
    }

    #[test]
    fn test_entities_matching_non_address() {
        let index = ServiceIndex::build(&test_records());
        assert!(index.entities_matching_address("storage").is_empty());
        assert!(index.entities_matching_address("").is_empty());
    }

    #[test]
    fn test_entities_in_region_ignores_case() {
        let index = ServiceIndex::build(&test_records());
        let ids: Vec<&str> = index.entities_in_region("EastUS").map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["Storage.EastUS", "AzureCloud.eastus"]);
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let index = ServiceIndex::build(&test_records());
        let same = ServiceIndex::build(&test_records());
        assert_eq!(index.fingerprint(), same.fingerprint());

        let smaller = ServiceIndex::build(&test_records()[..2]);
        assert_ne!(index.fingerprint(), smaller.fingerprint());
    }
}
