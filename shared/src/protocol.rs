/// Pseudo-region id meaning "every region"; mutually exclusive with specific ids.
pub const ALL_REGIONS: &str = "all";

/// Plan-status endpoint, relative to the API base. Takes an `email` query parameter.
pub const PLAN_STATUS_PATH: &str = "/plan_status";

/// Upgrade initiation endpoint, relative to the API base.
pub const UPGRADE_PATH: &str = "/upgrade";

/// Subscription submission endpoint, relative to the API base.
pub const SUBSCRIBE_PATH: &str = "/subscribe";

/// Resolver caps
pub const MAX_IP_SUGGESTIONS: usize = 8;
pub const MAX_ADDRESS_SERVICES: usize = 8;
pub const MAX_REGIONS: usize = 6;
pub const MAX_SERVICES_PER_REGION: usize = 5;
pub const MAX_TEXT_SERVICES: usize = 8;
