use shared::types::Region;

const fn region(id: &'static str, display_name: &'static str) -> Region {
    Region { id, display_name }
}

/// Fixed region reference table. Order is the display/search order.
pub static REGIONS: &[Region] = &[
    region("eastus", "East US"),
    region("eastus2", "East US 2"),
    region("centralus", "Central US"),
    region("northcentralus", "North Central US"),
    region("southcentralus", "South Central US"),
    region("westcentralus", "West Central US"),
    region("westus", "West US"),
    region("westus2", "West US 2"),
    region("westus3", "West US 3"),
    region("canadacentral", "Canada Central"),
    region("canadaeast", "Canada East"),
    region("brazilsouth", "Brazil South"),
    region("brazilsoutheast", "Brazil Southeast"),
    region("mexicocentral", "Mexico Central"),
    region("northeurope", "North Europe"),
    region("westeurope", "West Europe"),
    region("uksouth", "UK South"),
    region("ukwest", "UK West"),
    region("francecentral", "France Central"),
    region("francesouth", "France South"),
    region("germanywestcentral", "Germany West Central"),
    region("germanynorth", "Germany North"),
    region("switzerlandnorth", "Switzerland North"),
    region("switzerlandwest", "Switzerland West"),
    region("norwayeast", "Norway East"),
    region("norwaywest", "Norway West"),
    region("swedencentral", "Sweden Central"),
    region("polandcentral", "Poland Central"),
    region("italynorth", "Italy North"),
    region("spaincentral", "Spain Central"),
    region("eastasia", "East Asia"),
    region("southeastasia", "Southeast Asia"),
    region("japaneast", "Japan East"),
    region("japanwest", "Japan West"),
    region("koreacentral", "Korea Central"),
    region("koreasouth", "Korea South"),
    region("centralindia", "Central India"),
    region("southindia", "South India"),
    region("westindia", "West India"),
    region("australiaeast", "Australia East"),
    region("australiasoutheast", "Australia Southeast"),
    region("australiacentral", "Australia Central"),
    region("uaenorth", "UAE North"),
    region("uaecentral", "UAE Central"),
    region("southafricanorth", "South Africa North"),
    region("southafricawest", "South Africa West"),
    region("qatarcentral", "Qatar Central"),
    region("israelcentral", "Israel Central"),
];

/// Looks up a region by id, ignoring case.
pub fn find(id: &str) -> Option<&'static Region> {
    REGIONS.iter().find(|r| r.id.eq_ignore_ascii_case(id))
}

/// Regions whose id or display name contains `needle`, in table order.
/// `needle` must already be lowercase.
pub fn matching(needle: &str) -> impl Iterator<Item = &'static Region> + '_ {
    REGIONS.iter().filter(move |r| {
        r.id.contains(needle) || r.display_name.to_lowercase().contains(needle)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_region_ids_are_unique_and_lowercase() {
        let mut seen = HashSet::new();
        for r in REGIONS {
            assert!(seen.insert(r.id), "duplicate region id {}", r.id);
            assert_eq!(r.id, r.id.to_lowercase());
        }
    }

    #[test]
    fn test_find_ignores_case() {
        assert_eq!(find("EastUS").map(|r| r.display_name), Some("East US"));
        assert!(find("moon-1").is_none());
    }

    #[test]
    fn test_matching_by_id_and_display_name() {
        let east: Vec<&str> = matching("east").map(|r| r.id).collect();
        assert_eq!(&east[..2], &["eastus", "eastus2"]);
        assert!(east.contains(&"southeastasia"));

        // Display name only: "uk south" has a space the id lacks
        let uk: Vec<&str> = matching("uk south").map(|r| r.id).collect();
        assert_eq!(uk, vec!["uksouth"]);
    }
}
