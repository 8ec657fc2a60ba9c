use crate::error::{SessionError, SessionResult};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::StatusCode;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Outcome of one credential refresh round-trip.
///
/// Classified exactly once, at this boundary; callers never re-inspect the
/// HTTP detail. The refreshed credential itself is ambient (a server-managed
/// cookie), so no token value is handed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Credential renewed; reconnect may proceed
    Refreshed,
    /// Network-level trouble; retry later, do not force logout
    TransientFailure,
    /// The long-lived credential itself is dead; terminal, force logout
    Invalid,
}

#[async_trait]
pub trait CredentialRefresher: Send + Sync {
    async fn refresh(&self) -> RefreshOutcome;
}

/// Production refresher: POSTs to the refresh endpoint with the ambient
/// cookie credential. Only the response status class matters here; the new
/// credential arrives as a Set-Cookie side effect.
pub struct HttpCredentialRefresher {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpCredentialRefresher {
    pub fn new(endpoint: impl Into<String>) -> SessionResult<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| SessionError::Config(format!("refresh client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl CredentialRefresher for HttpCredentialRefresher {
    async fn refresh(&self) -> RefreshOutcome {
        match self.client.post(&self.endpoint).send().await {
            Ok(response) => classify_status(response.status()),
            Err(e) => {
                warn!(error = %e, "credential refresh transport error");
                RefreshOutcome::TransientFailure
            }
        }
    }
}

fn classify_status(status: StatusCode) -> RefreshOutcome {
    if status.is_success() {
        RefreshOutcome::Refreshed
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        RefreshOutcome::Invalid
    } else {
        RefreshOutcome::TransientFailure
    }
}

type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Collapses concurrent refresh requests into one in-flight call.
///
/// Every caller awaiting while a refresh is in flight observes that call's
/// outcome; exactly one network round-trip happens. The in-flight slot is
/// generation-tagged so a completed call clears itself without clobbering a
/// newer one.
pub struct CredentialCoordinator {
    refresher: Arc<dyn CredentialRefresher>,
    inflight: Mutex<Option<(u64, SharedRefresh)>>,
    generation: AtomicU64,
}

impl CredentialCoordinator {
    pub fn new(refresher: Arc<dyn CredentialRefresher>) -> Self {
        Self {
            refresher,
            inflight: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    pub async fn refresh(&self) -> RefreshOutcome {
        let (generation, fut) = {
            let mut slot = self.inflight.lock().await;
            match slot.as_ref() {
                Some((generation, fut)) => (*generation, fut.clone()),
                None => {
                    let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
                    let refresher = Arc::clone(&self.refresher);
                    let fut: SharedRefresh =
                        async move { refresher.refresh().await }.boxed().shared();
                    *slot = Some((generation, fut.clone()));
                    (generation, fut)
                }
            }
        };

        let outcome = fut.await;

        let mut slot = self.inflight.lock().await;
        if slot.as_ref().is_some_and(|(g, _)| *g == generation) {
            *slot = None;
        }

        match outcome {
            RefreshOutcome::Refreshed => info!("credential refreshed"),
            RefreshOutcome::TransientFailure => warn!("credential refresh failed transiently"),
            RefreshOutcome::Invalid => warn!("credential refresh rejected, session expired"),
        }

        outcome
    }
}
