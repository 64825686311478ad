use ao_api_types::Token;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::customization::CustomizationOverlay;
use crate::fetcher::{FetchState, FetchStatus};

/// Full display order before the visibility filter: customized ids that are
/// still owned, then newly seen ids in fetch order.
pub fn merged_order(items: &[Token], overlay: &CustomizationOverlay) -> Vec<String> {
    let fetched: HashSet<&str> = items.iter().map(|token| token.id.as_str()).collect();

    let mut placed: HashSet<&str> = HashSet::with_capacity(items.len());
    let mut order = Vec::with_capacity(items.len());
    for id in &overlay.order {
        if fetched.contains(id.as_str()) && placed.insert(id.as_str()) {
            order.push(id.clone());
        }
    }
    for token in items {
        if placed.insert(token.id.as_str()) {
            order.push(token.id.clone());
        }
    }
    order
}

pub fn reconcile(items: &[Token], overlay: &CustomizationOverlay) -> Vec<Token> {
    let by_id: HashMap<&str, &Token> = items.iter().map(|token| (token.id.as_str(), token)).collect();
    merged_order(items, overlay)
        .iter()
        .filter(|id| !overlay.hidden.contains(id.as_str()))
        .filter_map(|id| by_id.get(id.as_str()).map(|token| (*token).clone()))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DisplayState {
    WaitingForAddress,
    Loading,
    Error {
        message: String,
    },
    Ready {
        items: Vec<Token>,
        background_url: String,
        refreshing: bool,
        notice: Option<String>,
        storage_warning: Option<String>,
    },
}

/// Inputs for an owner that has been resolved; with no owner the controller
/// reports [`DisplayState::WaitingForAddress`] without projecting.
pub struct ProjectionInput<'a> {
    /// State for the current `(owner, limit)` key.
    pub current: Option<&'a FetchState>,
    /// The owner's latest good result under any limit.
    pub fallback: Option<&'a FetchState>,
    pub overlay: &'a CustomizationOverlay,
    pub background_url: &'a str,
    pub storage_warning: Option<&'a str>,
}

pub fn project(input: ProjectionInput<'_>) -> DisplayState {
    let status = input.current.map(|state| state.status).unwrap_or_default();
    let usable = input
        .current
        .and_then(|state| state.items.as_ref())
        .or_else(|| input.fallback.and_then(|state| state.items.as_ref()));
    let error = input.current.and_then(|state| state.error.clone());

    match (usable, status) {
        (Some(items), status) => DisplayState::Ready {
            items: reconcile(items, input.overlay),
            background_url: input.background_url.to_owned(),
            refreshing: status == FetchStatus::Loading,
            notice: if status == FetchStatus::Error { error } else { None },
            storage_warning: input.storage_warning.map(ToOwned::to_owned),
        },
        (None, FetchStatus::Error) => DisplayState::Error {
            message: error.unwrap_or_else(|| "failed to load collection".to_owned()),
        },
        (None, FetchStatus::Idle | FetchStatus::Loading | FetchStatus::Success) => DisplayState::Loading,
    }
}
