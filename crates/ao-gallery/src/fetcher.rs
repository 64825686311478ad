use ao_api_types::{OwnerAddress, Token};
use ao_collection_client::{CollectionTransport, FetchError, retain_displayable, validate_request};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

pub type FetchOutcome = Result<Arc<Vec<Token>>, FetchError>;

type SharedFetch = Shared<BoxFuture<'static, FetchOutcome>>;
type InFlight = Arc<Mutex<HashMap<FetchKey, SharedFetch>>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchKey {
    pub owner: OwnerAddress,
    pub limit: u32,
}

impl FetchKey {
    pub fn new(owner: impl Into<String>, limit: u32) -> Self {
        Self {
            owner: OwnerAddress(owner.into()),
            limit,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

/// Latest known state for one key. `items` survives a failed re-fetch so
/// the last good result can stay on screen.
#[derive(Debug, Clone, Default)]
pub struct FetchState {
    pub status: FetchStatus,
    pub items: Option<Arc<Vec<Token>>>,
    pub error: Option<String>,
    success_seq: u64,
}

/// A fetch that has been issued. Resolving it never cancels the underlying
/// request; dropping it just stops listening.
pub struct PendingFetch {
    pub key: FetchKey,
    outcome: BoxFuture<'static, FetchOutcome>,
}

impl PendingFetch {
    pub async fn resolve(self) -> FetchCompletion {
        FetchCompletion {
            key: self.key,
            outcome: self.outcome.await,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchCompletion {
    pub key: FetchKey,
    pub outcome: FetchOutcome,
}

/// Clears the in-flight entry when the transport task ends, including by
/// panic or abort, so a later fetch for the key reaches the transport.
struct InFlightGuard {
    registry: InFlight,
    key: FetchKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

pub struct CollectionFetcher {
    transport: Arc<dyn CollectionTransport>,
    in_flight: InFlight,
    states: HashMap<FetchKey, FetchState>,
    successes: u64,
}

impl CollectionFetcher {
    pub fn new(transport: Arc<dyn CollectionTransport>) -> Self {
        Self {
            transport,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            states: HashMap::new(),
            successes: 0,
        }
    }

    /// Issues (or joins) the request for `(owner, limit)`. Must be called
    /// from within a tokio runtime: the transport call runs on its own task
    /// so it completes even if every listener goes away.
    pub fn fetch(&self, owner: &OwnerAddress, limit: u32) -> Result<PendingFetch, FetchError> {
        validate_request(owner, limit)?;
        let key = FetchKey {
            owner: owner.clone(),
            limit,
        };

        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = in_flight.get(&key) {
            debug!("joining in-flight fetch for {} (limit {limit})", owner.0);
            return Ok(PendingFetch {
                key,
                outcome: existing.clone().boxed(),
            });
        }

        let transport = Arc::clone(&self.transport);
        let guard = InFlightGuard {
            registry: Arc::clone(&self.in_flight),
            key: key.clone(),
        };
        let task = tokio::spawn(async move {
            transport
                .fetch_owned_tokens(&guard.key.owner, guard.key.limit)
                .await
                .map(|tokens| Arc::new(retain_displayable(tokens)))
        });

        let shared = async move {
            task.await
                .unwrap_or_else(|err| Err(FetchError::Network(format!("fetch task failed: {err}"))))
        }
        .boxed()
        .shared();
        in_flight.insert(key.clone(), shared.clone());

        Ok(PendingFetch {
            key,
            outcome: shared.boxed(),
        })
    }

    #[cfg(test)]
    pub(crate) async fn fetch_owned(&self, owner: &OwnerAddress, limit: u32) -> FetchOutcome {
        self.fetch(owner, limit)?.resolve().await.outcome
    }

    #[cfg(test)]
    pub(crate) fn in_flight_count(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn state(&self, key: &FetchKey) -> Option<&FetchState> {
        self.states.get(key)
    }

    pub fn mark_loading(&mut self, key: &FetchKey) {
        let state = self.states.entry(key.clone()).or_default();
        state.status = FetchStatus::Loading;
    }

    pub fn record(&mut self, key: &FetchKey, outcome: FetchOutcome) {
        let state = self.states.entry(key.clone()).or_default();
        match outcome {
            Ok(items) => {
                self.successes += 1;
                state.status = FetchStatus::Success;
                state.items = Some(items);
                state.error = None;
                state.success_seq = self.successes;
            }
            Err(err) => {
                state.status = FetchStatus::Error;
                state.error = Some(err.to_string());
            }
        }
    }

    /// Drops results for every owner other than `owner`.
    pub fn retain_owner(&mut self, owner: &OwnerAddress) {
        self.states.retain(|key, _| key.owner == *owner);
    }

    /// Most recent successful result for `owner` under any limit.
    pub fn latest_success_for_owner(&self, owner: &OwnerAddress) -> Option<&FetchState> {
        self.states
            .iter()
            .filter(|(key, state)| key.owner == *owner && state.items.is_some())
            .max_by_key(|(_, state)| state.success_seq)
            .map(|(_, state)| state)
    }
}
