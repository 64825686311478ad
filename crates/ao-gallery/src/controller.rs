use ao_api_types::{ConnectAction, ConnectionStatus, Token};
use ao_collection_client::CollectionTransport;
use ao_session::{ChainSessionManager, WalletCollaborator};
use ao_storage::KeyValueStore;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::GalleryError;
use crate::config::GalleryConfig;
use crate::customization::CustomizationStore;
use crate::fetcher::{CollectionFetcher, FetchCompletion, FetchKey, PendingFetch};
use crate::reconcile::{DisplayState, ProjectionInput, merged_order, project};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerSource {
    ConnectedWallet,
    Explicit(String),
}

/// Glue between session, fetcher and customization. Every method runs to
/// completion without awaiting; fetches come back as [`PendingFetch`] for
/// the caller to drive and feed into [`GalleryController::on_fetch_completed`].
pub struct GalleryController {
    session: ChainSessionManager,
    fetcher: CollectionFetcher,
    customization: CustomizationStore,
    owner_source: OwnerSource,
    current: Option<FetchKey>,
    default_background: String,
}

impl GalleryController {
    pub fn new(
        config: &GalleryConfig,
        store: Arc<dyn KeyValueStore>,
        wallet: Arc<dyn WalletCollaborator>,
        transport: Arc<dyn CollectionTransport>,
    ) -> Self {
        Self {
            session: ChainSessionManager::start(config.catalog(), store.clone(), wallet),
            fetcher: CollectionFetcher::new(transport),
            customization: CustomizationStore::new(store, config.default_limit),
            owner_source: OwnerSource::ConnectedWallet,
            current: None,
            default_background: config.default_background.clone(),
        }
    }

    /// Resolves the initial owner, if any, and issues its fetch.
    pub fn start(&mut self) -> Result<Option<PendingFetch>, GalleryError> {
        self.rederive()
    }

    pub fn session(&self) -> &ChainSessionManager {
        &self.session
    }

    pub fn current_key(&self) -> Option<&FetchKey> {
        self.current.as_ref()
    }

    // ── Session events ──

    pub fn select_chain(&mut self, chain: &str) -> Result<Option<PendingFetch>, GalleryError> {
        if !self.session.select_chain(chain)? {
            return Ok(None);
        }
        self.rederive()
    }

    pub fn on_wallet_status(&mut self, status: ConnectionStatus) -> Result<Option<PendingFetch>, GalleryError> {
        if !self.session.on_external_status_change(status) {
            return Ok(None);
        }
        self.rederive()
    }

    pub fn trigger_connect_action(&self) -> ConnectAction {
        self.session.trigger_connect_action()
    }

    // ── Fetch lifecycle ──

    /// `None` follows the connected wallet's address.
    pub fn view_owner(&mut self, owner: Option<String>) -> Result<Option<PendingFetch>, GalleryError> {
        self.owner_source = match owner.map(|o| o.trim().to_owned()) {
            Some(owner) if !owner.is_empty() => OwnerSource::Explicit(owner),
            _ => OwnerSource::ConnectedWallet,
        };
        self.rederive()
    }

    pub fn refresh(&mut self) -> Result<Option<PendingFetch>, GalleryError> {
        match self.current.clone() {
            Some(key) => self.begin_fetch(key).map(Some),
            None => Ok(None),
        }
    }

    pub fn set_limit(&mut self, limit: u32) -> Result<Option<PendingFetch>, GalleryError> {
        let owner = self.resolve_owner().ok_or(GalleryError::NoOwner)?;
        self.customization.set_owner_limit(&owner, limit)?;
        self.rederive()
    }

    /// Applies a finished fetch. Completions for any key other than the
    /// current one are dropped; returns whether it was applied.
    pub fn on_fetch_completed(&mut self, completion: FetchCompletion) -> bool {
        if self.current.as_ref() != Some(&completion.key) {
            debug!(
                "discarding stale fetch for {} (limit {})",
                completion.key.owner.0, completion.key.limit
            );
            return false;
        }

        if let Err(err) = &completion.outcome {
            warn!("fetch for {} failed: {err}", completion.key.owner.0);
        }
        self.fetcher.record(&completion.key, completion.outcome);
        true
    }

    // ── Customization ──

    /// Moves the item at visible index `from` to where the item at visible
    /// index `to` currently sits.
    pub fn move_item(&mut self, from: usize, to: usize) -> Result<(), GalleryError> {
        let (owner, merged) = self.edit_context()?;
        let overlay = self.customization.load_overlay(&owner);
        let visible: Vec<&String> = merged
            .iter()
            .filter(|id| !overlay.hidden.contains(id.as_str()))
            .collect();

        if from >= visible.len() || to >= visible.len() {
            return Err(GalleryError::InvalidArgument(format!(
                "move {from} -> {to} is out of range for {} visible items",
                visible.len()
            )));
        }
        let moving = visible[from].clone();
        let target = visible[to].clone();

        self.customization.discover(&owner, &merged);
        let order = self.customization.load_overlay(&owner).order;
        let position = |id: &str| order.iter().position(|entry| entry == id);
        let (Some(from_index), Some(to_index)) = (position(moving.as_str()), position(target.as_str())) else {
            return Err(GalleryError::InvalidArgument(format!("unknown item {moving}")));
        };

        self.customization.reorder(&owner, from_index, to_index)?;
        Ok(())
    }

    pub fn hide(&mut self, id: &str) -> Result<(), GalleryError> {
        let (owner, merged) = self.edit_context()?;
        self.ensure_known(&owner, &merged, id)?;
        self.customization.discover(&owner, &merged);
        self.customization.hide(&owner, id);
        Ok(())
    }

    pub fn unhide(&mut self, id: &str) -> Result<(), GalleryError> {
        let (owner, merged) = self.edit_context()?;
        self.ensure_known(&owner, &merged, id)?;
        self.customization.unhide(&owner, id);
        Ok(())
    }

    pub fn reset(&mut self) -> Result<Option<PendingFetch>, GalleryError> {
        let owner = self.resolve_owner().ok_or(GalleryError::NoOwner)?;
        self.customization.reset_overlay(&owner);
        self.rederive()
    }

    pub fn set_background(&mut self, url: &str) -> Result<(), GalleryError> {
        self.customization.set_background_override(url)
    }

    pub fn clear_background(&mut self) {
        self.customization.clear_background_override();
    }

    pub fn display_state(&mut self) -> DisplayState {
        let Some(key) = self.current.clone() else {
            return DisplayState::WaitingForAddress;
        };

        let overlay = self.customization.load_overlay(&key.owner.0);
        let background_url = self
            .customization
            .background_override()
            .unwrap_or_else(|| self.default_background.clone());

        project(ProjectionInput {
            current: self.fetcher.state(&key),
            fallback: self.fetcher.latest_success_for_owner(&key.owner),
            overlay: &overlay,
            background_url: &background_url,
            storage_warning: self.customization.write_warning(),
        })
    }

    // ── Internals ──

    fn resolve_owner(&self) -> Option<String> {
        match &self.owner_source {
            OwnerSource::Explicit(owner) => Some(owner.clone()),
            OwnerSource::ConnectedWallet => self.session.connected_address().map(ToOwned::to_owned),
        }
    }

    fn rederive(&mut self) -> Result<Option<PendingFetch>, GalleryError> {
        let Some(owner) = self.resolve_owner() else {
            if self.current.take().is_some() {
                debug!("owner no longer resolved; waiting for an address");
            }
            return Ok(None);
        };

        let limit = self.customization.owner_limit(&owner);
        let key = FetchKey::new(owner, limit);
        if self.current.as_ref() == Some(&key) {
            return Ok(None);
        }
        self.begin_fetch(key).map(Some)
    }

    fn begin_fetch(&mut self, key: FetchKey) -> Result<PendingFetch, GalleryError> {
        let pending = self.fetcher.fetch(&key.owner, key.limit)?;
        if self.current.as_ref().is_none_or(|current| current.owner != key.owner) {
            self.fetcher.retain_owner(&key.owner);
        }
        self.fetcher.mark_loading(&key);
        self.current = Some(key);
        Ok(pending)
    }

    fn usable_items(&self, key: &FetchKey) -> Option<Arc<Vec<Token>>> {
        self.fetcher
            .state(key)
            .and_then(|state| state.items.clone())
            .or_else(|| {
                self.fetcher
                    .latest_success_for_owner(&key.owner)
                    .and_then(|state| state.items.clone())
            })
    }

    fn edit_context(&mut self) -> Result<(String, Vec<String>), GalleryError> {
        let key = self.current.clone().ok_or(GalleryError::NoOwner)?;
        let overlay = self.customization.load_overlay(&key.owner.0);
        let merged = self
            .usable_items(&key)
            .map(|items| merged_order(&items, &overlay))
            .unwrap_or_default();
        Ok((key.owner.0, merged))
    }

    fn ensure_known(&mut self, owner: &str, merged: &[String], id: &str) -> Result<(), GalleryError> {
        let overlay = self.customization.load_overlay(owner);
        let known = merged.iter().any(|entry| entry == id)
            || overlay.order.iter().any(|entry| entry == id)
            || overlay.hidden.contains(id);
        if known {
            Ok(())
        } else {
            Err(GalleryError::InvalidArgument(format!("unknown item {id}")))
        }
    }
}
