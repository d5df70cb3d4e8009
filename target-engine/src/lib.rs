//! Target resolution engine: turns free-text input into selectable
//! services, regions and ip ranges, and builds the subscription request
//! for whatever the caller picked.

pub mod address;
pub mod api;
pub mod config;
pub mod entitlement;
pub mod error;
pub mod index;
pub mod resolver;
pub mod selection;
pub mod session;
pub mod session_manager;

pub use config::Config;
pub use entitlement::{EntitlementGate, EntitlementOverride, Environment, GateState};
pub use error::{ClientError, GateError, SessionError};
pub use index::ServiceIndex;
pub use resolver::TargetResolver;
pub use selection::SelectionStore;
pub use session::Session;
pub use session_manager::{SearchSnapshot, SessionHandle};
