use std::collections::BTreeMap;
use std::fmt;
use anyhow::{Context, Result};
use shared::protocol::ALL_REGIONS;
use shared::types::{
    Category, PlanStatus, ResultKind, SearchResult, SubscriptionRequest, SubscriptionType,
};
use crate::api::{DatasetSource, PlanStatusSource, SubscriptionSink, UpgradeOutcome, UpgradeSource};
use crate::config::SessionConfig;
use crate::entitlement::{EntitlementGate, EntitlementOverride, Environment, GateState, GatedOperation};
use crate::error::SessionError;
use crate::index::{regions, ServiceIndex};
use crate::resolver::TargetResolver;
use crate::selection::SelectionStore;

/// Trims and lowercases an email address. Returns `None` for anything that
/// is obviously not an address.
pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || domain.is_empty() {
        return None;
    }
    Some(email)
}

/// Per-caller context: the built index, the selection, the entitlement gate
/// and the chosen subscription mode. Nothing here outlives the session.
#[derive(Debug, Clone)]
pub struct Session {
    index: ServiceIndex,
    selection: SelectionStore,
    gate: EntitlementGate,
    mode: SubscriptionType,
}

impl Session {
    pub fn new(index: ServiceIndex, environment: Environment) -> Self {
        Self {
            index,
            selection: SelectionStore::new(),
            gate: EntitlementGate::new(environment),
            mode: SubscriptionType::All,
        }
    }

    /// Loads the dataset and plan status and applies any configured override.
    ///
    /// A dataset failure aborts: no partial index is ever used. A plan-status
    /// failure only leaves the gate locked.
    pub async fn bootstrap(
        dataset: &dyn DatasetSource,
        plans: &dyn PlanStatusSource,
        email: Option<&str>,
        config: &SessionConfig,
    ) -> Result<Self> {
        let records = dataset
            .fetch_dataset()
            .await
            .context("Failed to load service dataset")?;

        let mut session = Self::new(ServiceIndex::build(&records), config.environment);

        match email.and_then(normalize_email) {
            Some(email) => {
                session.refresh_plan_status(plans, &email).await;
            }
            None => tracing::debug!("No email for plan lookup, gate stays locked"),
        }

        if let Some(value) = config.premium_override() {
            session.set_override(value);
        }

        Ok(session)
    }

    pub fn index(&self) -> &ServiceIndex {
        &self.index
    }

    pub fn selection(&self) -> &SelectionStore {
        &self.selection
    }

    pub fn gate(&self) -> &EntitlementGate {
        &self.gate
    }

    pub fn mode(&self) -> SubscriptionType {
        self.mode
    }

    pub fn category_counts(&self) -> BTreeMap<Category, usize> {
        self.index.category_counts()
    }

    pub fn total_selected(&self) -> usize {
        self.selection.total_count()
    }

    /// Fetches the plan status and applies it; a failed fetch locks the gate.
    pub async fn refresh_plan_status(&mut self, plans: &dyn PlanStatusSource, email: &str) -> GateState {
        let result = plans.fetch_plan_status(email).await;
        self.apply_plan_status(result.as_ref())
    }

    pub fn apply_plan_status<E: fmt::Display>(&mut self, status: Result<&PlanStatus, E>) -> GateState {
        let state = self.gate.apply_plan_status(status);
        self.enforce_lock();
        state
    }

    pub fn set_override(&mut self, value: EntitlementOverride) -> bool {
        let applied = self.gate.set_override(value);
        self.enforce_lock();
        applied
    }

    pub fn clear_override(&mut self) {
        self.gate.clear_override();
        self.enforce_lock();
    }

    /// A locked gate cannot keep the filtered mode.
    fn enforce_lock(&mut self) {
        if !self.gate.is_unlocked() && self.mode == SubscriptionType::Filtered {
            tracing::info!("Gate locked, reverting to all-changes subscription");
            self.mode = SubscriptionType::All;
        }
    }

    /// Switches the subscription mode. Selecting `filtered` while locked is
    /// rejected and the mode reverts to `all`.
    pub fn set_mode(&mut self, mode: SubscriptionType) -> Result<(), SessionError> {
        if mode == SubscriptionType::Filtered {
            if let Err(e) = self.gate.check(GatedOperation::SelectFilteredMode) {
                tracing::warn!("{}", e);
                self.mode = SubscriptionType::All;
                return Err(e.into());
            }
        }
        self.mode = mode;
        Ok(())
    }

    pub fn search(&self, term: &str) -> Result<Vec<SearchResult>, SessionError> {
        self.gate.check(GatedOperation::Search)?;
        Ok(TargetResolver::new(&self.index).search(term))
    }

    fn check_mutation(&self) -> Result<(), SessionError> {
        self.gate.check(GatedOperation::MutateSelection).map_err(|e| {
            tracing::warn!("{}", e);
            SessionError::from(e)
        })
    }

    /// Adds a service known to the current index.
    pub fn add_service(&mut self, id: &str) -> Result<bool, SessionError> {
        self.check_mutation()?;
        if !self.index.contains(id) {
            return Err(SessionError::UnknownService(id.to_string()));
        }
        Ok(self.selection.add_service(id))
    }

    pub fn remove_service(&mut self, id: &str) -> Result<bool, SessionError> {
        self.check_mutation()?;
        Ok(self.selection.remove_service(id))
    }

    /// Adds a region from the reference table (stored by canonical id) or the `"all"` sentinel.
    pub fn add_region(&mut self, id: &str) -> Result<bool, SessionError> {
        self.check_mutation()?;
        if id.eq_ignore_ascii_case(ALL_REGIONS) {
            return Ok(self.selection.add_region(ALL_REGIONS));
        }
        let region = regions::find(id).ok_or_else(|| SessionError::UnknownRegion(id.to_string()))?;
        Ok(self.selection.add_region(region.id))
    }

    pub fn remove_region(&mut self, id: &str) -> Result<bool, SessionError> {
        self.check_mutation()?;
        let canonical = regions::find(id).map_or(id, |r| r.id);
        Ok(self.selection.remove_region(canonical))
    }

    /// Adds a raw ip query. The value need not be a valid address; blank input is ignored.
    pub fn add_ip_query(&mut self, value: &str) -> Result<bool, SessionError> {
        self.check_mutation()?;
        let value = value.trim();
        if value.is_empty() {
            return Ok(false);
        }
        Ok(self.selection.add_ip_query(value))
    }

    pub fn remove_ip_query(&mut self, value: &str) -> Result<bool, SessionError> {
        self.check_mutation()?;
        Ok(self.selection.remove_ip_query(value.trim()))
    }

    /// Adds whatever a search result points at.
    pub fn select(&mut self, result: &SearchResult) -> Result<bool, SessionError> {
        match result.kind {
            ResultKind::Service => self.add_service(&result.value),
            ResultKind::Region => self.add_region(&result.value),
            ResultKind::Ip => self.add_ip_query(&result.value),
        }
    }

    pub fn clear_selection(&mut self) -> Result<(), SessionError> {
        self.check_mutation()?;
        self.selection.clear();
        Ok(())
    }

    /// Current selection rendered for display. Service ids missing from the
    /// index render as their raw id.
    pub fn selected_targets(&self) -> Vec<SearchResult> {
        let services = self.selection.services().iter().map(|id| match self.index.get(id) {
            Some(entity) => SearchResult {
                kind: ResultKind::Service,
                value: id.clone(),
                label: entity.name.clone(),
                meta: entity.category.to_string(),
            },
            None => SearchResult {
                kind: ResultKind::Service,
                value: id.clone(),
                label: id.clone(),
                meta: "unavailable".to_string(),
            },
        });

        let region_targets = self.selection.regions().iter().map(|id| SearchResult {
            kind: ResultKind::Region,
            value: id.clone(),
            label: if id == ALL_REGIONS {
                "All regions".to_string()
            } else {
                regions::find(id).map_or_else(|| id.clone(), |r| r.display_name.to_string())
            },
            meta: "region".to_string(),
        });

        let ips = self.selection.ip_queries().iter().map(|value| SearchResult {
            kind: ResultKind::Ip,
            value: value.clone(),
            label: value.clone(),
            meta: "ip".to_string(),
        });

        services.chain(region_targets).chain(ips).collect()
    }

    /// Replaces the index wholesale. Returns whether the catalog content changed.
    /// Selected service ids are kept even if the new index no longer has them.
    pub fn reload_index(&mut self, index: ServiceIndex) -> bool {
        let changed = self.index.fingerprint() != index.fingerprint();
        if changed {
            tracing::info!(entities = index.len(), "Service index replaced");
        } else {
            tracing::debug!("Reloaded dataset is unchanged");
        }
        self.index = index;
        changed
    }

    /// Builds the submission for the subscription service.
    ///
    /// Mode `all` carries empty selection lists. Mode `filtered` needs an
    /// unlocked gate and at least one selected target.
    pub fn subscription_request(
        &self,
        email: &str,
        user_id: Option<String>,
    ) -> Result<SubscriptionRequest, SessionError> {
        let email = normalize_email(email).ok_or(SessionError::InvalidEmail)?;

        let (selected_services, selected_regions, ip_queries) = match self.mode {
            SubscriptionType::All => (Vec::new(), Vec::new(), Vec::new()),
            SubscriptionType::Filtered => {
                self.gate.check(GatedOperation::SelectFilteredMode)?;
                if self.selection.is_empty() {
                    return Err(SessionError::EmptyFilter);
                }
                (
                    self.selection.services().iter().cloned().collect(),
                    self.selection.regions().iter().cloned().collect(),
                    self.selection.ip_queries().iter().cloned().collect(),
                )
            }
        };

        Ok(SubscriptionRequest {
            email,
            subscription_type: self.mode,
            selected_services,
            selected_regions,
            ip_queries,
            user_id,
        })
    }

    /// Builds the submission and hands it to the subscription service unchanged.
    pub async fn submit(
        &self,
        sink: &dyn SubscriptionSink,
        email: &str,
        user_id: Option<String>,
    ) -> Result<String> {
        let request = self.subscription_request(email, user_id)?;
        let message = sink
            .submit(&request)
            .await
            .context("Failed to submit subscription")?;
        Ok(message)
    }
}

/// Starts the upgrade flow for an email address.
pub async fn request_upgrade(upgrades: &dyn UpgradeSource, email: &str) -> Result<UpgradeOutcome> {
    let email = normalize_email(email).ok_or(SessionError::InvalidEmail)?;
    let outcome = upgrades
        .initiate_upgrade(&email)
        .await
        .context("Failed to start upgrade")?;
    Ok(outcome)
}
