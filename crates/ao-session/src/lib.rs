mod wallet;

pub use wallet::{BridgeWallet, WalletCollaborator};

use ao_api_types::{ConnectAction, ConnectionStatus, WalletStatus};
use ao_storage::{KeyValueStore, keys};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("unknown chain: {0}")]
    UnknownChain(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSelection {
    pub chain_name: String,
}

/// The set of chains a visitor may select. The default is always a member.
#[derive(Debug, Clone)]
pub struct ChainCatalog {
    default_chain: String,
    known: BTreeSet<String>,
}

impl ChainCatalog {
    pub fn new<I, S>(default_chain: &str, known: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut known: BTreeSet<String> = known
            .into_iter()
            .map(Into::into)
            .map(|name: String| name.trim().to_owned())
            .filter(|name| !name.is_empty())
            .collect();
        known.insert(default_chain.to_owned());
        Self {
            default_chain: default_chain.to_owned(),
            known,
        }
    }

    pub fn default_chain(&self) -> &str {
        &self.default_chain
    }

    pub fn contains(&self, chain: &str) -> bool {
        self.known.contains(chain)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.known.iter().map(String::as_str)
    }
}

pub fn connect_action(status: WalletStatus) -> ConnectAction {
    match status {
        WalletStatus::Connected => ConnectAction::OpenDetailView,
        WalletStatus::Connecting => ConnectAction::None,
        WalletStatus::Disconnected => ConnectAction::Connect,
        WalletStatus::Error => ConnectAction::OpenDetailView,
        WalletStatus::Rejected => ConnectAction::Connect,
        WalletStatus::NotExist => ConnectAction::OpenDetailView,
    }
}

const ELLIPSIS: &str = "...";

/// Shortens `value` to at most `max_len` characters, ending in `...` when
/// there is room for it. Below that the value is cut without an ellipsis.
pub fn truncate_with_ellipsis(value: &str, max_len: usize) -> String {
    if value.chars().count() <= max_len {
        return value.to_owned();
    }
    if max_len < ELLIPSIS.len() {
        return value.chars().take(max_len).collect();
    }
    let mut truncated: String = value.chars().take(max_len - ELLIPSIS.len()).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}

pub struct ChainSessionManager {
    catalog: ChainCatalog,
    store: Arc<dyn KeyValueStore>,
    wallet: Arc<dyn WalletCollaborator>,
    selection: ChainSelection,
    status: ConnectionStatus,
}

impl ChainSessionManager {
    /// Restores the persisted chain (read exactly once) and points the
    /// wallet at it if the wallet reports something else.
    pub fn start(
        catalog: ChainCatalog,
        store: Arc<dyn KeyValueStore>,
        wallet: Arc<dyn WalletCollaborator>,
    ) -> Self {
        let initial = persisted_chain(&catalog, store.as_ref())
            .unwrap_or_else(|| catalog.default_chain().to_owned());

        if wallet.current_chain().as_deref() != Some(initial.as_str()) {
            info!("wallet is not on {initial}; switching once at startup");
            wallet.switch_chain(&initial);
        }

        let status = wallet.status(&initial);
        Self {
            catalog,
            store,
            wallet,
            selection: ChainSelection {
                chain_name: initial,
            },
            status,
        }
    }

    pub fn catalog(&self) -> &ChainCatalog {
        &self.catalog
    }

    pub fn selected_chain(&self) -> &ChainSelection {
        &self.selection
    }

    pub fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    /// Returns `Ok(true)` when the selection changed. Re-selecting the
    /// current chain is a no-op and does not touch the wallet.
    pub fn select_chain(&mut self, name: &str) -> Result<bool, SessionError> {
        let name = name.trim();
        if !self.catalog.contains(name) {
            warn!("ignoring selection of unknown chain '{name}'");
            return Err(SessionError::UnknownChain(name.to_owned()));
        }

        if self.selection.chain_name == name {
            return Ok(false);
        }

        self.selection = ChainSelection {
            chain_name: name.to_owned(),
        };
        if let Err(err) = self.store.set(keys::CHAIN_SELECTION, name) {
            warn!("failed to persist chain selection {name}: {err:#}");
        }

        self.wallet.switch_chain(name);
        self.status = self.wallet.status(name);
        info!("selected chain {name}");
        Ok(true)
    }

    /// Accepts a status pushed by the wallet. A status that names another
    /// chain is stale and dropped; returns whether it was applied.
    pub fn on_external_status_change(&mut self, mut status: ConnectionStatus) -> bool {
        match status.chain.as_deref() {
            Some(chain) if chain != self.selection.chain_name => {
                debug!(
                    "dropping status for {chain}; selected chain is {}",
                    self.selection.chain_name
                );
                return false;
            }
            Some(_) => {}
            None => status.chain = Some(self.selection.chain_name.clone()),
        }

        self.status = status;
        true
    }

    /// The owner address, available only while connected.
    pub fn connected_address(&self) -> Option<&str> {
        match self.status.status {
            WalletStatus::Connected => self
                .status
                .address
                .as_deref()
                .map(str::trim)
                .filter(|address| !address.is_empty()),
            _ => None,
        }
    }

    pub fn connect_action(&self) -> ConnectAction {
        connect_action(self.status.status)
    }

    /// Performs whatever the connect button means for the current status.
    /// Retrying after an error or rejection is always user-initiated.
    pub fn trigger_connect_action(&self) -> ConnectAction {
        let action = self.connect_action();
        let chain = self.selection.chain_name.as_str();
        match action {
            ConnectAction::Connect => self.wallet.connect(chain),
            ConnectAction::OpenDetailView => self.wallet.open_detail_view(chain),
            ConnectAction::None => {}
        }
        action
    }

    pub fn warning(&self) -> Option<String> {
        match self.status.status {
            WalletStatus::Error | WalletStatus::Rejected => {
                let message = self.status.error_message.as_deref()?;
                let wallet = self.status.wallet_name.as_deref().unwrap_or("Wallet");
                Some(format!("{wallet}: {message}"))
            }
            WalletStatus::Disconnected
            | WalletStatus::Connecting
            | WalletStatus::Connected
            | WalletStatus::NotExist => None,
        }
    }
}

fn persisted_chain(catalog: &ChainCatalog, store: &dyn KeyValueStore) -> Option<String> {
    match store.get(keys::CHAIN_SELECTION) {
        Ok(Some(name)) if catalog.contains(name.trim()) => Some(name.trim().to_owned()),
        Ok(Some(name)) => {
            warn!("persisted chain '{name}' is not a known chain; using default");
            None
        }
        Ok(None) => None,
        Err(err) => {
            warn!("failed to read persisted chain selection: {err:#}");
            None
        }
    }
}
