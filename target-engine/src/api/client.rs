use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::Value;
use shared::protocol::{PLAN_STATUS_PATH, SUBSCRIBE_PATH, UPGRADE_PATH};
use shared::types::{
    PlanStatus, PlanStatusResponse, SubscribeResponse, SubscriptionRequest, UpgradeRequest,
    UpgradeResponse,
};
use crate::config::ApiConfig;
use crate::error::ClientError;

/// Source of the raw service dataset.
#[async_trait]
pub trait DatasetSource: Send + Sync {
    /// Raw records of the `values` array. Per-record validation is left to the index.
    async fn fetch_dataset(&self) -> Result<Vec<Value>, ClientError>;
}

/// Source of the caller's plan status.
#[async_trait]
pub trait PlanStatusSource: Send + Sync {
    async fn fetch_plan_status(&self, email: &str) -> Result<PlanStatus, ClientError>;
}

#[async_trait]
pub trait UpgradeSource: Send + Sync {
    async fn initiate_upgrade(&self, email: &str) -> Result<UpgradeOutcome, ClientError>;
}

/// Receiver of finished subscription requests.
#[async_trait]
pub trait SubscriptionSink: Send + Sync {
    /// Returns the service's confirmation message.
    async fn submit(&self, request: &SubscriptionRequest) -> Result<String, ClientError>;
}

/// Where an upgrade continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeOutcome {
    Checkout(String),
    Waitlist(String),
}

#[derive(Deserialize)]
struct DatasetDocument {
    #[serde(default)]
    values: Vec<Value>,
}

/// HTTP implementation of every collaborator, sharing one connection pool.
#[derive(Clone)]
pub struct HttpCollaborators {
    http: Client,
    base_url: String,
    dataset_url: String,
}

impl HttpCollaborators {
    pub fn new(config: &ApiConfig) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            dataset_url: config.dataset_url.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Turns a non-2xx reply into `ClientError::Server`, keeping the body as message.
async fn ensure_success(resp: Response) -> Result<Response, ClientError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    Err(ClientError::Server {
        status: resp.status().as_u16(),
        message: resp.text().await.unwrap_or_default(),
    })
}

#[async_trait]
impl DatasetSource for HttpCollaborators {
    async fn fetch_dataset(&self) -> Result<Vec<Value>, ClientError> {
        tracing::debug!(url = %self.dataset_url, "Fetching dataset");
        let resp = self.http.get(&self.dataset_url).send().await?;
        let document: DatasetDocument = ensure_success(resp).await?.json().await?;

        tracing::info!(records = document.values.len(), "Fetched dataset");
        Ok(document.values)
    }
}

#[async_trait]
impl PlanStatusSource for HttpCollaborators {
    async fn fetch_plan_status(&self, email: &str) -> Result<PlanStatus, ClientError> {
        let resp = self
            .http
            .get(self.endpoint(PLAN_STATUS_PATH))
            .query(&[("email", email)])
            .send()
            .await?;
        let reply: PlanStatusResponse = ensure_success(resp).await?.json().await?;

        match reply {
            PlanStatusResponse { success: true, plan: Some(plan), .. } => Ok(plan),
            PlanStatusResponse { error, .. } => Err(ClientError::Rejected(
                error.unwrap_or_else(|| "plan status unavailable".to_string()),
            )),
        }
    }
}

#[async_trait]
impl UpgradeSource for HttpCollaborators {
    async fn initiate_upgrade(&self, email: &str) -> Result<UpgradeOutcome, ClientError> {
        let resp = self
            .http
            .post(self.endpoint(UPGRADE_PATH))
            .json(&UpgradeRequest { email: email.to_string() })
            .send()
            .await?;
        let reply: UpgradeResponse = ensure_success(resp).await?.json().await?;

        match reply {
            UpgradeResponse { success: true, checkout_url: Some(url), .. } => {
                Ok(UpgradeOutcome::Checkout(url))
            }
            UpgradeResponse { waitlist_url: Some(url), .. } => Ok(UpgradeOutcome::Waitlist(url)),
            UpgradeResponse { error, .. } => Err(ClientError::Rejected(
                error.unwrap_or_else(|| "upgrade unavailable".to_string()),
            )),
        }
    }
}

#[async_trait]
impl SubscriptionSink for HttpCollaborators {
    async fn submit(&self, request: &SubscriptionRequest) -> Result<String, ClientError> {
        let resp = self
            .http
            .post(self.endpoint(SUBSCRIBE_PATH))
            .json(request)
            .send()
            .await?;

        // The subscribe endpoint reports validation failures as 400 with a JSON body
        let status = resp.status();
        let reply: SubscribeResponse = match resp.json().await {
            Ok(reply) => reply,
            Err(e) if status.is_success() => return Err(e.into()),
            Err(_) => {
                return Err(ClientError::Server {
                    status: status.as_u16(),
                    message: status.canonical_reason().unwrap_or_default().to_string(),
                })
            }
        };

        if reply.success {
            tracing::info!(subscription_type = ?request.subscription_type, "Subscription accepted");
            Ok(reply.message.unwrap_or_else(|| "Subscription created".to_string()))
        } else {
            Err(ClientError::Rejected(
                reply.error.unwrap_or_else(|| format!("subscription failed ({})", status)),
            ))
        }
    }
}
