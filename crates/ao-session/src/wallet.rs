use ao_api_types::{ConnectionStatus, WalletRequest};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// The wallet extension as seen by the session: it knows which chain it is
/// pointed at, reports a status per chain, and accepts user-facing requests.
/// Status changes arrive out of band and are pushed into the session.
pub trait WalletCollaborator: Send + Sync {
    fn current_chain(&self) -> Option<String>;
    fn switch_chain(&self, chain: &str);
    fn status(&self, chain: &str) -> ConnectionStatus;
    fn connect(&self, chain: &str);
    fn open_detail_view(&self, chain: &str);
}

#[derive(Default)]
struct BridgeState {
    current_chain: Option<String>,
    statuses: HashMap<String, ConnectionStatus>,
    requests: Vec<WalletRequest>,
}

/// Collaborator backed by a remote browser bridge. Requests queue up until
/// the bridge drains them; statuses are whatever the bridge last reported.
#[derive(Default)]
pub struct BridgeWallet {
    state: Mutex<BridgeState>,
}

impl BridgeWallet {
    pub fn new(current_chain: Option<&str>) -> Self {
        Self {
            state: Mutex::new(BridgeState {
                current_chain: current_chain.map(ToOwned::to_owned),
                ..BridgeState::default()
            }),
        }
    }

    /// Records a status pushed by the bridge. Statuses without a chain are
    /// attributed to the chain the wallet is currently pointed at.
    pub fn report(&self, status: &ConnectionStatus) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(chain) = status.chain.clone().or_else(|| state.current_chain.clone()) else {
            return;
        };
        state.statuses.insert(chain, status.clone());
    }

    pub fn drain_requests(&self) -> Vec<WalletRequest> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut state.requests)
    }

    fn push(&self, request: WalletRequest) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.requests.push(request);
    }
}

impl WalletCollaborator for BridgeWallet {
    fn current_chain(&self) -> Option<String> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.current_chain.clone()
    }

    fn switch_chain(&self, chain: &str) {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.current_chain = Some(chain.to_owned());
        }
        self.push(WalletRequest::SwitchChain {
            chain: chain.to_owned(),
        });
    }

    fn status(&self, chain: &str) -> ConnectionStatus {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .statuses
            .get(chain)
            .cloned()
            .unwrap_or_else(|| ConnectionStatus::disconnected(chain))
    }

    fn connect(&self, chain: &str) {
        self.push(WalletRequest::Connect {
            chain: chain.to_owned(),
        });
    }

    fn open_detail_view(&self, chain: &str) {
        self.push(WalletRequest::OpenDetailView {
            chain: chain.to_owned(),
        });
    }
}
