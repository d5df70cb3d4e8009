pub mod client;

pub use client::{
    DatasetSource, HttpCollaborators, PlanStatusSource, SubscriptionSink, UpgradeOutcome,
    UpgradeSource,
};
