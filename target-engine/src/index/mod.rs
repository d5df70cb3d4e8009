pub mod catalog;
pub mod fingerprint;
pub mod regions;

pub use catalog::{PrefixCacheEntry, ServiceIndex};
