use std::fmt;
use std::str::FromStr;
use serde::Deserialize;
use shared::types::PlanStatus;
use crate::error::GateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Locked,
    Unlocked,
}

/// Why the gate is currently locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockReason {
    /// No plan status has been applied yet
    Unverified,
    /// The plan service reported a free or inactive plan
    NotPremium,
    /// The plan-status check failed
    StatusUnavailable,
    /// A non-production override forced the gate closed
    OverrideOff,
    /// A non-production override was removed
    OverrideRemoved,
}

impl fmt::Display for LockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            LockReason::Unverified => "plan status not verified yet",
            LockReason::NotPremium => "current plan is not an active premium plan",
            LockReason::StatusUnavailable => "plan status could not be verified",
            LockReason::OverrideOff => "premium override is off",
            LockReason::OverrideRemoved => "premium override was removed",
        };
        f.write_str(text)
    }
}

/// Operations only permitted while unlocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatedOperation {
    Search,
    MutateSelection,
    SelectFilteredMode,
}

impl fmt::Display for GatedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            GatedOperation::Search => "Target search",
            GatedOperation::MutateSelection => "Changing the target selection",
            GatedOperation::SelectFilteredMode => "Filtered subscription mode",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Development,
}

/// Local premium override, honored outside production only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntitlementOverride {
    On,
    Off,
}

impl FromStr for EntitlementOverride {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on" | "true" | "1" | "yes" | "premium" => Ok(EntitlementOverride::On),
            "off" | "false" | "0" | "no" | "free" => Ok(EntitlementOverride::Off),
            other => Err(format!("invalid premium override: {other}")),
        }
    }
}

/// Two-state guard evaluated before every gated operation.
///
/// Starts locked. Each event moves the gate directly to its target state,
/// so the most recent plan status or override decides.
#[derive(Debug, Clone)]
pub struct EntitlementGate {
    state: GateState,
    lock_reason: LockReason,
    environment: Environment,
    override_value: Option<EntitlementOverride>,
}

impl EntitlementGate {
    pub fn new(environment: Environment) -> Self {
        Self {
            state: GateState::Locked,
            lock_reason: LockReason::Unverified,
            environment,
            override_value: None,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn is_unlocked(&self) -> bool {
        self.state == GateState::Unlocked
    }

    /// The reason for the current lock, or `None` while unlocked.
    pub fn lock_reason(&self) -> Option<LockReason> {
        (self.state == GateState::Locked).then_some(self.lock_reason)
    }

    pub fn override_value(&self) -> Option<EntitlementOverride> {
        self.override_value
    }

    /// Applies the outcome of a plan-status check. Failures always lock.
    /// A non-premium reply leaves an active `On` override in force.
    pub fn apply_plan_status<E: fmt::Display>(&mut self, status: Result<&PlanStatus, E>) -> GateState {
        match status {
            Ok(status) if status.grants_premium() => self.unlock(),
            Ok(_) if self.override_value == Some(EntitlementOverride::On) => {
                tracing::debug!("Plan does not grant premium, override keeps the gate unlocked");
                self.unlock()
            }
            Ok(status) => {
                tracing::debug!(plan = ?status.plan, status = ?status.status, "Plan does not grant premium");
                self.lock(LockReason::NotPremium)
            }
            Err(e) => {
                tracing::warn!("Plan status unavailable, locking: {}", e);
                self.lock(LockReason::StatusUnavailable)
            }
        }
        self.state
    }

    /// Sets the local override. Returns false (and changes nothing) in production.
    pub fn set_override(&mut self, value: EntitlementOverride) -> bool {
        if self.environment == Environment::Production {
            tracing::warn!("Ignoring premium override in production");
            return false;
        }

        self.override_value = Some(value);
        match value {
            EntitlementOverride::On => self.unlock(),
            EntitlementOverride::Off => self.lock(LockReason::OverrideOff),
        }
        true
    }

    /// Removes the override and locks until a plan status says otherwise.
    pub fn clear_override(&mut self) {
        if self.override_value.take().is_some() {
            self.lock(LockReason::OverrideRemoved);
        }
    }

    pub fn check(&self, operation: GatedOperation) -> Result<(), GateError> {
        match self.state {
            GateState::Unlocked => Ok(()),
            GateState::Locked => Err(GateError {
                operation,
                reason: self.lock_reason,
            }),
        }
    }

    fn unlock(&mut self) {
        if self.state != GateState::Unlocked {
            tracing::info!("Entitlement gate unlocked");
        }
        self.state = GateState::Unlocked;
    }

    fn lock(&mut self, reason: LockReason) {
        if self.state != GateState::Locked {
            tracing::info!("Entitlement gate locked: {}", reason);
        }
        self.state = GateState::Locked;
        self.lock_reason = reason;
    }
}
