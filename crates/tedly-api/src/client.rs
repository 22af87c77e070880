// tedee cloud API client
//
// Wraps `reqwest::Client` with bearer authentication from the credential
// cache, `{ result }` envelope unwrapping, the shared retry policy, and the
// create-operation + poll-until-complete protocol used by lock commands.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info, warn};
use url::Url;

use crate::auth::{Account, CredentialCache, DEFAULT_TOKEN_URL};
use crate::error::Error;
use crate::models::{
    Envelope, LockOperation, LockRecord, LockSync, OperationHandle, OperationState,
    OperationStatus,
};
use crate::retry::RetryPolicy;
use crate::transport::TransportConfig;

/// Default API base (versioned).
pub const DEFAULT_API_URL: &str = "https://api.tedee.com/api/v1.18";

/// Endpoints and tuning for a [`TedeeClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: Url,
    pub token_url: Url,
    pub token_retry: RetryPolicy,
    pub api_retry: RetryPolicy,
    /// Delay between two polls of a pending operation.
    pub operation_poll_interval: Duration,
    pub transport: TransportConfig,
}

impl ClientConfig {
    /// Config pointing at the public tedee cloud with default budgets.
    pub fn cloud() -> Result<Self, Error> {
        Ok(Self {
            api_url: Url::parse(DEFAULT_API_URL)?,
            token_url: Url::parse(DEFAULT_TOKEN_URL)?,
            token_retry: RetryPolicy::TOKEN,
            api_retry: RetryPolicy::API,
            operation_poll_interval: Duration::from_secs(1),
            transport: TransportConfig::default(),
        })
    }
}

/// Async client for the tedee cloud API.
///
/// Holds the [`CredentialCache`] as its only source of token material and
/// remembers the ids of the locks returned by the last inventory fetch so
/// that commands against unknown ids can be skipped.
pub struct TedeeClient {
    http: reqwest::Client,
    api_url: Url,
    credentials: CredentialCache,
    retry: RetryPolicy,
    poll_interval: Duration,
    /// id → name of every lock seen in the last `list_locks`.
    known_locks: RwLock<HashMap<u64, String>>,
}

impl TedeeClient {
    pub fn new(config: ClientConfig, account: Account) -> Result<Self, Error> {
        let http = config.transport.build_client()?;
        let credentials =
            CredentialCache::new(http.clone(), config.token_url, account, config.token_retry);
        Ok(Self {
            http,
            api_url: normalize_base_url(config.api_url),
            credentials,
            retry: config.api_retry,
            poll_interval: config.operation_poll_interval,
            known_locks: RwLock::new(HashMap::new()),
        })
    }

    /// The credential cache backing this client.
    pub fn credentials(&self) -> &CredentialCache {
        &self.credentials
    }

    // ── Inventory and sync ───────────────────────────────────────────

    /// Fetch every lock of the account (`GET /my/lock`).
    pub async fn list_locks(&self) -> Result<Vec<LockRecord>, Error> {
        debug!("getting locks from API");
        let url = &self.url("my/lock")?;
        let locks: Vec<LockRecord> = self
            .retry
            .run("get locks", move || self.get(url.clone()))
            .await?;

        *self.known_locks.write().expect("lock index poisoned") = locks
            .iter()
            .map(|lock| (lock.id, lock.name.clone()))
            .collect();

        debug!(count = locks.len(), "locks received from API");
        Ok(locks)
    }

    /// Sync the mutable state of every lock (`GET /my/lock/sync`).
    pub async fn sync_all(&self) -> Result<Vec<LockSync>, Error> {
        debug!("syncing locks from API");
        let url = &self.url("my/lock/sync")?;
        let syncs = self
            .retry
            .run("sync locks", move || self.get(url.clone()))
            .await?;
        debug!("locks synced from API");
        Ok(syncs)
    }

    /// Sync the mutable state of a single lock (`GET /my/lock/{id}/sync`).
    pub async fn sync_one(&self, id: u64) -> Result<LockSync, Error> {
        debug!(lock_id = id, "syncing lock from API");
        let url = &self.url(&format!("my/lock/{id}/sync"))?;
        self.retry
            .run("sync lock", move || self.get(url.clone()))
            .await
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub async fn open(&self, id: u64) -> Result<(), Error> {
        self.execute(id, LockOperation::Open).await
    }

    pub async fn close(&self, id: u64) -> Result<(), Error> {
        self.execute(id, LockOperation::Close).await
    }

    pub async fn pull_spring(&self, id: u64) -> Result<(), Error> {
        self.execute(id, LockOperation::PullSpring).await
    }

    /// Run a command end to end, retrying the whole create + poll cycle.
    ///
    /// A lock id that the last inventory fetch did not return is skipped
    /// with a warning and reported as success.
    async fn execute(&self, id: u64, operation: LockOperation) -> Result<(), Error> {
        let Some(name) = self.known_name(id) else {
            warn!(lock_id = id, %operation, "lock not found, skipping command");
            return Ok(());
        };
        let name = name.as_str();
        debug!(lock = name, %operation, "sending command via API");

        let url = &self.url(operation.path())?;
        self.retry
            .run(&format!("{operation} of {name}"), move || {
                self.create_and_wait(url.clone(), id, name, operation)
            })
            .await?;

        info!(lock = name, %operation, "command completed via API");
        Ok(())
    }

    /// POST the create-operation request, then poll until the vendor
    /// reports the operation as completed.
    async fn create_and_wait(
        &self,
        url: Url,
        id: u64,
        name: &str,
        operation: LockOperation,
    ) -> Result<(), Error> {
        let handle: OperationHandle = self.post(url, &json!({ "deviceId": id })).await?;
        debug!(lock = name, operation_id = %handle.operation_id, status = %handle.status, "operation created");

        let status_url = self.url(&format!("my/device/operation/{}", handle.operation_id))?;
        let mut status = handle.status;
        while status != OperationStatus::Completed {
            tokio::time::sleep(self.poll_interval).await;
            let state: OperationState = self.get(status_url.clone()).await?;
            status = state.status;
            info!(lock = name, %operation, %status, "waiting for operation to complete");
        }
        Ok(())
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn known_name(&self, id: u64) -> Option<String> {
        self.known_locks
            .read()
            .expect("lock index poisoned")
            .get(&id)
            .cloned()
    }

    /// Join a relative path (e.g. `"my/lock"`) onto the API base.
    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.api_url.join(path)?)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        let token = self.credentials.token().await?;
        debug!("GET {url}");

        let resp = self
            .http
            .get(url)
            .bearer_auth(token.expose_secret())
            .send()
            .await?;
        self.handle_response(resp).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &serde_json::Value,
    ) -> Result<T, Error> {
        let token = self.credentials.token().await?;
        debug!("POST {url}");

        let resp = self
            .http
            .post(url)
            .bearer_auth(token.expose_secret())
            .json(body)
            .send()
            .await?;
        self.handle_response(resp).await
    }

    /// Check the status and strip the `{ result }` envelope.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let status = resp.status();
        let body = resp.text().await?;

        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.credentials.invalidate();
        }

        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        let envelope: Envelope<T> = serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body: body.clone(),
            }
        })?;
        Ok(envelope.result)
    }
}

/// Ensure the base path ends with `/` so relative joins append.
fn normalize_base_url(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
