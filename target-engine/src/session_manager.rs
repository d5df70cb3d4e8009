use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use anyhow::Result;
use shared::types::{PlanStatus, SearchResult, SubscriptionRequest, SubscriptionType};
use crate::api::{PlanStatusSource, SubscriptionSink};
use crate::entitlement::{EntitlementOverride, GateState};
use crate::error::SessionError;
use crate::index::ServiceIndex;
use crate::session::Session;

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

/// Latest debounced search, published after the input settles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchSnapshot {
    /// Increments with every published search; 0 means nothing published yet
    pub seq: u64,
    pub term: String,
    pub results: Vec<SearchResult>,
    /// Set when the gate refused the search
    pub rejection: Option<SessionError>,
}

/// Commands sent to the session task
pub enum SessionCommand {
    TypeQuery(String),
    Search(String, Reply<Vec<SearchResult>>),
    AddService(String, Reply<bool>),
    RemoveService(String, Reply<bool>),
    AddRegion(String, Reply<bool>),
    RemoveRegion(String, Reply<bool>),
    AddIpQuery(String, Reply<bool>),
    RemoveIpQuery(String, Reply<bool>),
    Select(SearchResult, Reply<bool>),
    ClearSelection(Reply<()>),
    SetMode(SubscriptionType, Reply<()>),
    ApplyPlanStatus(Result<PlanStatus, String>, oneshot::Sender<GateState>),
    SetOverride(EntitlementOverride, oneshot::Sender<bool>),
    ClearOverride(oneshot::Sender<GateState>),
    SelectedTargets(oneshot::Sender<Vec<SearchResult>>),
    BuildRequest {
        email: String,
        user_id: Option<String>,
        reply: Reply<SubscriptionRequest>,
    },
    ReloadIndex(ServiceIndex, oneshot::Sender<bool>),
    Shutdown,
}

/// Handle to the task that owns a [`Session`].
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
}

struct SessionTask {
    session: Session,
    debounce: Duration,
    pending: Option<(String, Instant)>,
    seq: u64,
    snapshots: watch::Sender<SearchSnapshot>,
}

impl SessionHandle {
    /// Moves the session onto its own task. The returned receiver sees each
    /// debounced search typed through [`SessionHandle::type_query`].
    pub fn spawn(
        session: Session,
        debounce: Duration,
        cancel: CancellationToken,
    ) -> (Self, watch::Receiver<SearchSnapshot>) {
        let (tx, rx) = mpsc::channel::<SessionCommand>(256);
        let (snapshot_tx, snapshot_rx) = watch::channel(SearchSnapshot::default());

        let task = SessionTask {
            session,
            debounce,
            pending: None,
            seq: 0,
            snapshots: snapshot_tx,
        };
        tokio::spawn(task.run(rx, cancel));

        (Self { tx }, snapshot_rx)
    }

    /// Feeds one keystroke's worth of input. Only the last term typed within
    /// the debounce window is searched.
    pub async fn type_query(&self, term: impl Into<String>) -> Result<()> {
        self.tx.send(SessionCommand::TypeQuery(term.into())).await?;
        Ok(())
    }

    /// Immediate, undebounced search
    pub async fn search(&self, term: impl Into<String>) -> Result<Vec<SearchResult>> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(SessionCommand::Search(term.into(), reply)).await?;
        Ok(rx.await??)
    }

    pub async fn add_service(&self, id: impl Into<String>) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(SessionCommand::AddService(id.into(), reply)).await?;
        Ok(rx.await??)
    }

    pub async fn remove_service(&self, id: impl Into<String>) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(SessionCommand::RemoveService(id.into(), reply)).await?;
        Ok(rx.await??)
    }

    pub async fn add_region(&self, id: impl Into<String>) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(SessionCommand::AddRegion(id.into(), reply)).await?;
        Ok(rx.await??)
    }

    pub async fn remove_region(&self, id: impl Into<String>) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(SessionCommand::RemoveRegion(id.into(), reply)).await?;
        Ok(rx.await??)
    }

    pub async fn add_ip_query(&self, value: impl Into<String>) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(SessionCommand::AddIpQuery(value.into(), reply)).await?;
        Ok(rx.await??)
    }

    pub async fn remove_ip_query(&self, value: impl Into<String>) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(SessionCommand::RemoveIpQuery(value.into(), reply)).await?;
        Ok(rx.await??)
    }

    pub async fn select(&self, result: SearchResult) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(SessionCommand::Select(result, reply)).await?;
        Ok(rx.await??)
    }

    pub async fn clear_selection(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(SessionCommand::ClearSelection(reply)).await?;
        Ok(rx.await??)
    }

    pub async fn set_mode(&self, mode: SubscriptionType) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(SessionCommand::SetMode(mode, reply)).await?;
        Ok(rx.await??)
    }

    /// Fetches the plan status outside the session task, then applies it.
    pub async fn refresh_plan_status(
        &self,
        plans: &dyn PlanStatusSource,
        email: &str,
    ) -> Result<GateState> {
        let status = plans
            .fetch_plan_status(email)
            .await
            .map_err(|e| e.to_string());
        self.apply_plan_status(status).await
    }

    pub async fn apply_plan_status(&self, status: Result<PlanStatus, String>) -> Result<GateState> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(SessionCommand::ApplyPlanStatus(status, reply)).await?;
        Ok(rx.await?)
    }

    pub async fn set_override(&self, value: EntitlementOverride) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(SessionCommand::SetOverride(value, reply)).await?;
        Ok(rx.await?)
    }

    pub async fn clear_override(&self) -> Result<GateState> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(SessionCommand::ClearOverride(reply)).await?;
        Ok(rx.await?)
    }

    pub async fn selected_targets(&self) -> Result<Vec<SearchResult>> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(SessionCommand::SelectedTargets(reply)).await?;
        Ok(rx.await?)
    }

    pub async fn subscription_request(
        &self,
        email: impl Into<String>,
        user_id: Option<String>,
    ) -> Result<SubscriptionRequest> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(SessionCommand::BuildRequest {
            email: email.into(),
            user_id,
            reply,
        }).await?;
        Ok(rx.await??)
    }

    /// Builds the request inside the session task and submits it from the caller.
    pub async fn submit(
        &self,
        sink: &dyn SubscriptionSink,
        email: impl Into<String>,
        user_id: Option<String>,
    ) -> Result<String> {
        let request = self.subscription_request(email, user_id).await?;
        Ok(sink.submit(&request).await?)
    }

    /// Swaps in a freshly built index. Returns true if the catalog changed.
    pub async fn reload_index(&self, index: ServiceIndex) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(SessionCommand::ReloadIndex(index, reply)).await?;
        Ok(rx.await?)
    }

    /// Shutdown the session task
    pub async fn shutdown(&self) -> Result<()> {
        self.tx.send(SessionCommand::Shutdown).await?;
        Ok(())
    }
}

impl SessionTask {
    async fn run(mut self, mut rx: mpsc::Receiver<SessionCommand>, cancel: CancellationToken) {
        loop {
            // The sleep future is built even while disabled, so it needs some deadline
            let deadline = self
                .pending
                .as_ref()
                .map_or_else(|| Instant::now() + self.debounce, |(_, at)| *at);

            tokio::select! {
                cmd = rx.recv() => {
                    match cmd {
                        Some(SessionCommand::Shutdown) | None => {
                            tracing::info!("Session task shutting down");
                            break;
                        }
                        Some(cmd) => self.handle(cmd),
                    }
                }
                _ = tokio::time::sleep_until(deadline), if self.pending.is_some() => {
                    self.publish_pending();
                }
                _ = cancel.cancelled() => {
                    tracing::info!("Session task cancelled");
                    break;
                }
            }
        }
    }

    fn handle(&mut self, cmd: SessionCommand) {
        let session = &mut self.session;
        match cmd {
            SessionCommand::TypeQuery(term) => {
                self.pending = Some((term, Instant::now() + self.debounce));
            }
            SessionCommand::Search(term, reply) => {
                let _ = reply.send(session.search(&term));
            }
            SessionCommand::AddService(id, reply) => {
                let _ = reply.send(session.add_service(&id));
            }
            SessionCommand::RemoveService(id, reply) => {
                let _ = reply.send(session.remove_service(&id));
            }
            SessionCommand::AddRegion(id, reply) => {
                let _ = reply.send(session.add_region(&id));
            }
            SessionCommand::RemoveRegion(id, reply) => {
                let _ = reply.send(session.remove_region(&id));
            }
            SessionCommand::AddIpQuery(value, reply) => {
                let _ = reply.send(session.add_ip_query(&value));
            }
            SessionCommand::RemoveIpQuery(value, reply) => {
                let _ = reply.send(session.remove_ip_query(&value));
            }
            SessionCommand::Select(result, reply) => {
                let _ = reply.send(session.select(&result));
            }
            SessionCommand::ClearSelection(reply) => {
                let _ = reply.send(session.clear_selection());
            }
            SessionCommand::SetMode(mode, reply) => {
                let _ = reply.send(session.set_mode(mode));
            }
            SessionCommand::ApplyPlanStatus(status, reply) => {
                let _ = reply.send(session.apply_plan_status(status.as_ref()));
            }
            SessionCommand::SetOverride(value, reply) => {
                let _ = reply.send(session.set_override(value));
            }
            SessionCommand::ClearOverride(reply) => {
                session.clear_override();
                let _ = reply.send(session.gate().state());
            }
            SessionCommand::SelectedTargets(reply) => {
                let _ = reply.send(session.selected_targets());
            }
            SessionCommand::BuildRequest { email, user_id, reply } => {
                let _ = reply.send(session.subscription_request(&email, user_id));
            }
            SessionCommand::ReloadIndex(index, reply) => {
                let _ = reply.send(session.reload_index(index));
            }
            SessionCommand::Shutdown => {}
        }
    }

    fn publish_pending(&mut self) {
        let Some((term, _)) = self.pending.take() else {
            return;
        };

        self.seq += 1;
        let snapshot = match self.session.search(&term) {
            Ok(results) => SearchSnapshot {
                seq: self.seq,
                term,
                results,
                rejection: None,
            },
            Err(e) => {
                tracing::debug!("Debounced search rejected: {}", e);
                SearchSnapshot {
                    seq: self.seq,
                    term,
                    results: Vec::new(),
                    rejection: Some(e),
                }
            }
        };
        let _ = self.snapshots.send(snapshot);
    }
}
