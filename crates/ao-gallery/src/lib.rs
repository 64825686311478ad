//! Owner-scoped gallery state: fetching an owner's tokens, layering the
//! visitor's ordering/visibility edits on top, and projecting the result.

pub mod config;
pub mod controller;
pub mod customization;
pub mod fetcher;
pub mod reconcile;

pub use config::GalleryConfig;
pub use controller::{GalleryController, OwnerSource};
pub use customization::{CustomizationOverlay, CustomizationStore};
pub use fetcher::{CollectionFetcher, FetchCompletion, FetchKey, FetchState, FetchStatus, PendingFetch};
pub use reconcile::{DisplayState, merged_order, reconcile};

use ao_collection_client::FetchError;
use ao_session::SessionError;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GalleryError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("no owner address resolved")]
    NoOwner,
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[cfg(test)]
pub(crate) mod test_support {
    use ao_api_types::{OwnerAddress, Token, TokenCollection, TokenMedia};
    use ao_collection_client::{CollectionTransport, FetchError};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::sync::Semaphore;

    pub(crate) fn token(id: &str, media_type: &str) -> Token {
        Token {
            id: id.to_owned(),
            token_id: id.to_owned(),
            name: format!("Token {id}"),
            rarity_order: None,
            rarity_score: None,
            minted_at: "2024-01-01T00:00:00Z".to_owned(),
            sale_type: None,
            media: TokenMedia {
                url: format!("https://img.example/{id}.png"),
                media_type: media_type.to_owned(),
            },
            collection: TokenCollection {
                name: "Observers".to_owned(),
                contract_address: "stars1observers".to_owned(),
            },
        }
    }

    pub(crate) fn images(ids: &[&str]) -> Vec<Token> {
        ids.iter().map(|id| token(id, "image")).collect()
    }

    pub(crate) fn ids(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.id.as_str()).collect()
    }

    /// Transport answering from a per-owner script. With a gate, every call
    /// blocks until the test releases a permit.
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        responses: Mutex<HashMap<String, Result<Vec<Token>, FetchError>>>,
        calls: AtomicUsize,
        gate: Option<Arc<Semaphore>>,
    }

    impl ScriptedTransport {
        pub(crate) fn gated() -> (Self, Arc<Semaphore>) {
            let gate = Arc::new(Semaphore::new(0));
            let transport = Self {
                gate: Some(gate.clone()),
                ..Self::default()
            };
            (transport, gate)
        }

        pub(crate) fn respond(&self, owner: &str, result: Result<Vec<Token>, FetchError>) {
            self.responses
                .lock()
                .expect("script lock")
                .insert(owner.to_owned(), result);
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CollectionTransport for ScriptedTransport {
        fn endpoint(&self) -> &str {
            "scripted://tokens"
        }

        async fn fetch_owned_tokens(&self, owner: &OwnerAddress, limit: u32) -> Result<Vec<Token>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.acquire()
                    .await
                    .map_err(|err| FetchError::Network(err.to_string()))?
                    .forget();
            }
            let scripted = self
                .responses
                .lock()
                .expect("script lock")
                .get(&owner.0)
                .cloned()
                .unwrap_or_else(|| Ok(Vec::new()));
            scripted.map(|mut tokens| {
                tokens.truncate(limit as usize);
                tokens
            })
        }
    }
}
