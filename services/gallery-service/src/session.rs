use ao_api_types::{
    ConnectResponse, ConnectionStatus, SelectChainRequest, SessionResponse, WalletRequestsResponse,
};
use ao_session::{ChainSessionManager, truncate_with_ellipsis};
use axum::{Json, extract::State};

use crate::{AppState, ApiResult, bad_request, gallery_error, unavailable};

const SHORT_ADDRESS_LEN: usize = 20;

fn session_response(session: &ChainSessionManager) -> SessionResponse {
    let status = session.status().clone();
    SessionResponse {
        chain: session.selected_chain().chain_name.clone(),
        known_chains: session.catalog().names().map(ToOwned::to_owned).collect(),
        short_address: status
            .address
            .as_deref()
            .map(|address| truncate_with_ellipsis(address, SHORT_ADDRESS_LEN)),
        connect_action: session.connect_action(),
        warning: session.warning(),
        status,
    }
}

pub(crate) async fn get_session(State(state): State<AppState>) -> ApiResult<SessionResponse> {
    let response = state
        .gallery
        .call(|controller| (session_response(controller.session()), None))
        .await
        .map_err(unavailable)?;
    Ok(Json(response))
}

pub(crate) async fn select_chain(
    State(state): State<AppState>,
    Json(request): Json<SelectChainRequest>,
) -> ApiResult<SessionResponse> {
    if request.chain.trim().is_empty() {
        return Err(bad_request("chain is required"));
    }

    state
        .gallery
        .call(move |controller| match controller.select_chain(&request.chain) {
            Ok(pending) => (Ok(session_response(controller.session())), pending),
            Err(err) => (Err(err), None),
        })
        .await
        .map_err(unavailable)?
        .map(Json)
        .map_err(gallery_error)
}

/// Status pushed by the browser bridge after it talks to the real wallet.
pub(crate) async fn push_status(
    State(state): State<AppState>,
    Json(status): Json<ConnectionStatus>,
) -> ApiResult<SessionResponse> {
    state.wallet.report(&status);

    state
        .gallery
        .call(move |controller| match controller.on_wallet_status(status) {
            Ok(pending) => (Ok(session_response(controller.session())), pending),
            Err(err) => (Err(err), None),
        })
        .await
        .map_err(unavailable)?
        .map(Json)
        .map_err(gallery_error)
}

pub(crate) async fn connect(State(state): State<AppState>) -> ApiResult<ConnectResponse> {
    let action = state
        .gallery
        .call(|controller| (controller.trigger_connect_action(), None))
        .await
        .map_err(unavailable)?;
    Ok(Json(ConnectResponse { action }))
}

pub(crate) async fn drain_requests(State(state): State<AppState>) -> Json<WalletRequestsResponse> {
    Json(WalletRequestsResponse {
        requests: state.wallet.drain_requests(),
    })
}
