use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Coarse grouping of a service, derived from its name when the catalog is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Popular,
    Compute,
    Storage,
    Database,
    Networking,
    Other,
}

impl Category {
    /// All categories, in classification precedence order.
    pub const ALL: [Category; 6] = [
        Category::Popular,
        Category::Compute,
        Category::Storage,
        Category::Database,
        Category::Networking,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Popular => "popular",
            Category::Compute => "compute",
            Category::Storage => "storage",
            Category::Database => "database",
            Category::Networking => "networking",
            Category::Other => "other",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named service / address-range record from the dataset.
/// Immutable once indexed; the catalog is rebuilt wholesale on reload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Dataset id, e.g. "Storage.EastUS"
    pub id: String,

    /// Display name, usually identical to the id
    pub name: String,

    pub category: Category,

    /// Region id, empty for global services
    pub region: String,

    /// Address prefixes (IPv4/IPv6 CIDR or bare addresses) in dataset order
    pub address_prefixes: Vec<String>,
}

/// Entry of the fixed region reference table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Region {
    pub id: &'static str,
    #[serde(rename = "displayName")]
    pub display_name: &'static str,
}

/// Raw dataset record as published in the `values` array.
/// Every field is optional so one malformed record never fails the whole document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub properties: Option<RawProperties>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProperties {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default, rename = "addressPrefixes")]
    pub address_prefixes: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    Service,
    Region,
    Ip,
}

/// Output unit of the target resolver. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub kind: ResultKind,
    /// Value to add to the selection (entity id, region id or ip literal)
    pub value: String,
    pub label: String,
    pub meta: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Premium,
    #[default]
    #[serde(other)]
    Free,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanState {
    Active,
    #[default]
    #[serde(other)]
    Inactive,
}

/// Plan status as reported by the plan-status service.
/// Unknown plan or status strings fall back to `free` / `inactive`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStatus {
    #[serde(default)]
    pub plan: PlanTier,

    #[serde(default, alias = "plan_status")]
    pub status: PlanState,

    #[serde(
        default,
        alias = "plan_expires_at",
        deserialize_with = "deserialize_timestamp"
    )]
    pub expires_at: Option<DateTime<Utc>>,
}

impl PlanStatus {
    pub fn premium_active() -> Self {
        Self {
            plan: PlanTier::Premium,
            status: PlanState::Active,
            expires_at: None,
        }
    }

    /// Only an active premium plan grants filtered targeting.
    pub fn grants_premium(&self) -> bool {
        self.plan == PlanTier::Premium && self.status == PlanState::Active
    }
}

/// Accepts RFC 3339 timestamps as well as naive ISO timestamps (taken as UTC).
/// Anything unparseable becomes `None` rather than failing the whole reply.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// `GET <api-base>/plan_status?email=<addr>` reply.
#[derive(Debug, Clone, Deserialize)]
pub struct PlanStatusResponse {
    pub success: bool,
    #[serde(default)]
    pub plan: Option<PlanStatus>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradeRequest {
    pub email: String,
}

/// `POST <api-base>/upgrade` reply.
#[derive(Debug, Clone, Deserialize)]
pub struct UpgradeResponse {
    pub success: bool,
    #[serde(default)]
    pub checkout_url: Option<String>,
    #[serde(default)]
    pub waitlist_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionType {
    /// Every change, no targeting. Available on every plan.
    #[default]
    All,
    /// Only changes touching the selected targets. Premium only.
    Filtered,
}

/// Subscription submission, handed to the subscription service unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    pub email: String,

    #[serde(rename = "subscriptionType")]
    pub subscription_type: SubscriptionType,

    #[serde(rename = "selectedServices")]
    pub selected_services: Vec<String>,

    #[serde(rename = "selectedRegions")]
    pub selected_regions: Vec<String>,

    pub ip_queries: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// `POST <api-base>/subscribe` reply.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscribeResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_status_accepts_both_wire_shapes() {
        let short: PlanStatus = serde_json::from_str(
            r#"{"plan":"premium","status":"active","expires_at":"2026-12-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(short.grants_premium());
        assert!(short.expires_at.is_some());

        let long: PlanStatus = serde_json::from_str(
            r#"{"plan":"premium","plan_status":"active","plan_expires_at":"2026-12-01T00:00:00"}"#,
        )
        .unwrap();
        assert!(long.grants_premium());
        assert_eq!(long.expires_at, short.expires_at);
    }

    #[test]
    fn test_unknown_plan_values_fail_closed() {
        let status: PlanStatus =
            serde_json::from_str(r#"{"plan":"enterprise","status":"trialing","expires_at":null}"#)
                .unwrap();
        assert_eq!(status.plan, PlanTier::Free);
        assert_eq!(status.status, PlanState::Inactive);
        assert!(!status.grants_premium());
    }

    #[test]
    fn test_plan_tier_wire_names() {
        assert_eq!(PlanTier::default(), PlanTier::Free);
        assert_eq!(serde_json::to_value(PlanTier::Premium).unwrap(), "premium");
        assert_eq!(serde_json::to_value(PlanTier::Free).unwrap(), "free");
        assert_eq!(serde_json::from_str::<PlanTier>(r#""premium""#).unwrap(), PlanTier::Premium);
        assert_eq!(serde_json::from_str::<PlanTier>(r#""free""#).unwrap(), PlanTier::Free);
        assert_eq!(serde_json::from_str::<PlanTier>(r#""basic""#).unwrap(), PlanTier::Free);
    }

    #[test]
    fn test_inactive_premium_does_not_grant() {
        let status = PlanStatus {
            plan: PlanTier::Premium,
            status: PlanState::Inactive,
            expires_at: None,
        };
        assert!(!status.grants_premium());
    }

    #[test]
    fn test_subscription_request_wire_names() {
        let request = SubscriptionRequest {
            email: "ops@example.com".to_string(),
            subscription_type: SubscriptionType::Filtered,
            selected_services: vec!["Storage".to_string()],
            selected_regions: vec!["eastus".to_string()],
            ip_queries: vec!["40.79.152.10".to_string()],
            user_id: None,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["subscriptionType"], "filtered");
        assert_eq!(json["selectedServices"][0], "Storage");
        assert_eq!(json["selectedRegions"][0], "eastus");
        assert_eq!(json["ip_queries"][0], "40.79.152.10");
        assert!(json.get("user_id").is_none());
    }

    #[test]
    fn test_raw_record_tolerates_missing_properties() {
        let record: RawRecord = serde_json::from_str(r#"{"id":"AzureCloud","name":"AzureCloud"}"#).unwrap();
        assert!(record.properties.is_none());
    }
}
