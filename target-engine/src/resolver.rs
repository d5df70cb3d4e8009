use std::collections::HashSet;
use shared::protocol::{
    MAX_ADDRESS_SERVICES, MAX_IP_SUGGESTIONS, MAX_REGIONS, MAX_SERVICES_PER_REGION,
    MAX_TEXT_SERVICES,
};
use shared::types::{Entity, Region, ResultKind, SearchResult};
use crate::address;
use crate::index::regions;
use crate::index::{PrefixCacheEntry, ServiceIndex};

/// Unified search over ip literals, regions and services.
///
/// Resolution is pure and synchronous: the same index and term always
/// produce the same ordered result list.
pub struct TargetResolver<'a> {
    index: &'a ServiceIndex,
}

impl<'a> TargetResolver<'a> {
    pub fn new(index: &'a ServiceIndex) -> Self {
        Self { index }
    }

    /// Resolves a free-text term.
    ///
    /// Output order is: ip results, then region results, then the service
    /// bucket (address matches, services of matched regions, text matches).
    /// An entity appears at most once per resolution.
    pub fn search(&self, term: &str) -> Vec<SearchResult> {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        let mut ip_results = Vec::new();
        let mut region_results = Vec::new();
        let mut service_results = Vec::new();
        let mut emitted: HashSet<&'a str> = HashSet::new();

        let suggest_prefixes = if address::classify(&needle).is_some() {
            let matches = self.index.entities_matching_address(&needle);
            ip_results.push(ip_summary(&needle, matches.len()));

            for entity in matches.into_iter().take(MAX_ADDRESS_SERVICES) {
                if emitted.insert(entity.id.as_str()) {
                    service_results.push(service_result(entity));
                }
            }
            !address::is_complete(&needle)
        } else {
            looks_like_partial_address(&needle)
        };

        if suggest_prefixes {
            ip_results.extend(
                self.index
                    .prefix_cache()
                    .iter()
                    .filter(|entry| entry.normalized_lower.contains(&needle))
                    .take(MAX_IP_SUGGESTIONS)
                    .map(prefix_suggestion),
            );
        }

        for region in regions::matching(&needle).take(MAX_REGIONS) {
            region_results.push(region_result(region, self.index.entities_in_region(region.id).count()));

            let fresh: Vec<&'a Entity> = self
                .index
                .entities_in_region(region.id)
                .filter(|e| !emitted.contains(e.id.as_str()))
                .take(MAX_SERVICES_PER_REGION)
                .collect();

            for entity in fresh {
                emitted.insert(entity.id.as_str());
                service_results.push(service_result(entity));
            }
        }

        let text_matches: Vec<&'a Entity> = self
            .index
            .entities()
            .iter()
            .filter(|e| !emitted.contains(e.id.as_str()))
            .filter(|e| e.name.to_lowercase().contains(&needle) || e.id.to_lowercase().contains(&needle))
            .take(MAX_TEXT_SERVICES)
            .collect();

        for entity in text_matches {
            emitted.insert(entity.id.as_str());
            service_results.push(service_result(entity));
        }

        tracing::debug!(
            term = %needle,
            ip = ip_results.len(),
            regions = region_results.len(),
            services = service_results.len(),
            "Resolved search term"
        );

        let mut results = ip_results;
        results.append(&mut region_results);
        results.append(&mut service_results);
        results
    }
}

/// Digits, hex letters and address punctuation only, with at least one
/// digit or colon. Catches typed fragments like `40.79` or `2603:10`.
fn looks_like_partial_address(needle: &str) -> bool {
    needle.chars().any(|c| c.is_ascii_digit() || c == ':')
        && needle
            .chars()
            .all(|c| c.is_ascii_hexdigit() || matches!(c, '.' | ':' | '/'))
}

fn ip_summary(literal: &str, match_count: usize) -> SearchResult {
    let meta = match match_count {
        0 => "No matching services".to_string(),
        1 => "1 matching service".to_string(),
        n => format!("{} matching services", n),
    };
    SearchResult {
        kind: ResultKind::Ip,
        value: literal.to_string(),
        label: literal.to_string(),
        meta,
    }
}

fn prefix_suggestion(entry: &PrefixCacheEntry) -> SearchResult {
    SearchResult {
        kind: ResultKind::Ip,
        value: entry.raw.clone(),
        label: entry.raw.clone(),
        meta: "Prefix match".to_string(),
    }
}

fn region_result(region: &Region, service_count: usize) -> SearchResult {
    SearchResult {
        kind: ResultKind::Region,
        value: region.id.to_string(),
        label: region.display_name.to_string(),
        meta: count_label(service_count, "service"),
    }
}

fn count_label(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("1 {}", noun)
    } else {
        format!("{} {}s", n, noun)
    }
}

/// Service results carry the entity's region as meta, empty for global services.
fn service_result(entity: &Entity) -> SearchResult {
    SearchResult {
        kind: ResultKind::Service,
        value: entity.id.clone(),
        label: entity.name.clone(),
        meta: entity.region.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn record(id: &str, region: &str, prefixes: &[&str]) -> Value {
        json!({
            "id": id,
            "name": id,
            "properties": { "region": region, "addressPrefixes": prefixes }
        })
    }

    fn test_index() -> ServiceIndex {
        let mut records = vec![
            record("Storage", "", &["40.79.152.0/21", "2603:1030::/23"]),
            record("Storage.EastUS", "eastus", &["40.79.152.0/21"]),
            record("Storage.EastUS2", "eastus2", &["20.38.98.0/24"]),
            record("AzureCloud", "", &["13.107.0.0/16"]),
        ];
        for i in 0..7 {
            records.push(record(&format!("Batch{}.EastUS", i), "eastus", &[]));
        }
        for i in 0..12 {
            let prefix = format!("10.{}.0.0/16", i);
            records.push(record(&format!("Monitor{}", i), "", &[prefix.as_str()]));
        }
        ServiceIndex::build(&records)
    }

    fn kinds(results: &[SearchResult]) -> Vec<ResultKind> {
        results.iter().map(|r| r.kind).collect()
    }

    #[test]
    fn test_empty_term() {
        let index = test_index();
        let resolver = TargetResolver::new(&index);
        assert!(resolver.search("").is_empty());
        assert!(resolver.search("   ").is_empty());
    }

    #[test]
    fn test_address_term_yields_summary_then_services() {
        let index = test_index();
        let results = TargetResolver::new(&index).search("40.79.152.10");

        assert_eq!(results[0].kind, ResultKind::Ip);
        assert_eq!(results[0].value, "40.79.152.10");
        assert_eq!(results[0].meta, "2 matching services");

        assert_eq!(results[1].kind, ResultKind::Service);
        assert_eq!(results[1].value, "Storage");
        assert_eq!(results[1].meta, "");
        assert_eq!(results[2].value, "Storage.EastUS");
        assert_eq!(results[2].meta, "eastus");
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn test_address_term_without_matches_still_summarizes() {
        let index = test_index();
        let results = TargetResolver::new(&index).search("192.0.2.1");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].kind, ResultKind::Ip);
        assert_eq!(results[0].meta, "No matching services");
    }

    #[test]
    fn test_address_services_capped() {
        let index = test_index();
        let records: Vec<Value> = (0..12)
            .map(|i| record(&format!("Wide{}", i), "", &["0.0.0.0/0"]))
            .collect();
        let wide = ServiceIndex::build(&records);
        let results = TargetResolver::new(&wide).search("8.8.8.8");
        assert_eq!(results[0].meta, "12 matching services");
        assert_eq!(results.len(), 1 + MAX_ADDRESS_SERVICES);

        // The regular fixture is unaffected
        assert_eq!(TargetResolver::new(&index).search("8.8.8.8").len(), 1);
    }

    #[test]
    fn test_partial_address_suggests_prefixes() {
        let index = test_index();
        let results = TargetResolver::new(&index).search("10.");
        assert!(results.iter().all(|r| r.kind == ResultKind::Ip));
        assert_eq!(results.len(), MAX_IP_SUGGESTIONS);
        assert_eq!(results[0].value, "10.0.0.0/16");
        assert!(results.iter().all(|r| r.meta == "Prefix match"));
    }

    #[test]
    fn test_short_ipv6_summarizes_and_suggests_prefixes() {
        let index = test_index();
        let results = TargetResolver::new(&index).search("2603:10");
        assert_eq!(kinds(&results), vec![ResultKind::Ip, ResultKind::Ip]);
        assert_eq!(results[0].value, "2603:10");
        assert_eq!(results[0].meta, "No matching services");
        assert_eq!(results[1].value, "2603:1030::/23");
        assert_eq!(results[1].meta, "Prefix match");
    }

    #[test]
    fn test_seven_segment_ipv6_matches_services() {
        let index = test_index();
        let results = TargetResolver::new(&index).search("2603:1030:0:1:0:0:1");

        assert_eq!(results[0].kind, ResultKind::Ip);
        assert_eq!(results[0].meta, "1 matching service");
        assert_eq!(results[1].kind, ResultKind::Service);
        assert_eq!(results[1].value, "Storage");
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_incomplete_ipv6_keeps_suggestion_order() {
        let index = test_index();
        let results = TargetResolver::new(&index).search("2603:1030");

        // Summary, then prefix suggestions, then the services it contains
        assert_eq!(results[0].meta, "1 matching service");
        assert_eq!(results[1].value, "2603:1030::/23");
        assert_eq!(results[1].meta, "Prefix match");
        assert_eq!(results[2].value, "Storage");
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn test_region_pass_interleaves_region_services() {
        let index = test_index();
        let results = TargetResolver::new(&index).search("East");

        let regions: Vec<&str> = results
            .iter()
            .filter(|r| r.kind == ResultKind::Region)
            .map(|r| r.value.as_str())
            .collect();
        assert_eq!(&regions[..2], &["eastus", "eastus2"]);
        assert!(regions.len() <= MAX_REGIONS);

        // Regions come before every service
        let first_service = results.iter().position(|r| r.kind == ResultKind::Service).unwrap();
        assert!(results[..first_service].iter().all(|r| r.kind == ResultKind::Region));

        let services: Vec<&SearchResult> = results[first_service..].iter().collect();
        // eastus contributes at most five of its eight entities, then eastus2
        let eastus: Vec<&str> = services.iter().take(5).map(|r| r.meta.as_str()).collect();
        assert_eq!(eastus, vec!["eastus"; 5]);
        assert_eq!(services[5].value, "Storage.EastUS2");
    }

    #[test]
    fn test_region_result_meta_counts_services() {
        let index = test_index();
        let results = TargetResolver::new(&index).search("eastus2");
        let region = results.iter().find(|r| r.kind == ResultKind::Region).unwrap();
        assert_eq!(region.label, "East US 2");
        assert_eq!(region.meta, "1 service");
    }

    #[test]
    fn test_text_pass_skips_already_emitted() {
        let index = test_index();
        let results = TargetResolver::new(&index).search("storage");

        let ids: Vec<&str> = results.iter().map(|r| r.value.as_str()).collect();
        assert_eq!(ids, vec!["Storage", "Storage.EastUS", "Storage.EastUS2"]);
    }

    #[test]
    fn test_no_duplicate_entities() {
        let index = test_index();
        for term in ["east", "eastus", "storage", "40.79.152.10", "batch", "10."] {
            let results = TargetResolver::new(&index).search(term);
            let mut seen = HashSet::new();
            for r in results.iter().filter(|r| r.kind == ResultKind::Service) {
                assert!(seen.insert(r.value.clone()), "{} emitted twice for {}", r.value, term);
            }
        }
    }

    #[test]
    fn test_caps_hold_for_every_term() {
        let index = test_index();
        for term in ["e", "east", "s", "1", "10.", "monitor", "a", "us"] {
            let results = TargetResolver::new(&index).search(term);
            let ip = results.iter().filter(|r| r.kind == ResultKind::Ip).count();
            let regions = results.iter().filter(|r| r.kind == ResultKind::Region).count();
            let services = results.iter().filter(|r| r.kind == ResultKind::Service).count();
            assert!(ip <= MAX_IP_SUGGESTIONS, "{}", term);
            assert!(regions <= MAX_REGIONS, "{}", term);
            assert!(
                services <= MAX_TEXT_SERVICES + MAX_SERVICES_PER_REGION * regions,
                "{}",
                term
            );
        }
    }

    #[test]
    fn test_text_pass_capped() {
        let index = test_index();
        let results = TargetResolver::new(&index).search("monitor");
        assert_eq!(kinds(&results), vec![ResultKind::Service; MAX_TEXT_SERVICES]);
    }

    #[test]
    fn test_search_is_deterministic() {
        let index = test_index();
        let resolver = TargetResolver::new(&index);
        assert_eq!(resolver.search("east"), resolver.search("  EAST "));
    }

    #[test]
    fn test_invalid_literal_falls_through_to_text() {
        let index = test_index();
        let results = TargetResolver::new(&index).search("999.1.1.1");
        // Not an address, not a prefix substring, no region or service named like it
        assert!(results.is_empty());
    }

    #[test]
    fn test_partial_address_detection() {
        assert!(looks_like_partial_address("40.79"));
        assert!(looks_like_partial_address("2603:"));
        assert!(looks_like_partial_address("::"));
        assert!(!looks_like_partial_address("east"));
        assert!(!looks_like_partial_address("cafe"));
        assert!(!looks_like_partial_address("storage 10"));
    }
}
