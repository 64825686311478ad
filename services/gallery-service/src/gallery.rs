use ao_api_types::{BackgroundRequest, ItemRequest, LimitRequest, MoveItemRequest, ViewOwnerRequest};
use ao_gallery::{DisplayState, GalleryController, GalleryError, PendingFetch};
use axum::{Json, extract::State};
use serde::Serialize;

use crate::{AppState, ApiResult, bad_request, gallery_error, unavailable};

#[derive(Debug, Serialize)]
pub(crate) struct GalleryResponse {
    pub(crate) owner: Option<String>,
    pub(crate) limit: Option<u32>,
    #[serde(flatten)]
    pub(crate) display: DisplayState,
}

fn snapshot(controller: &mut GalleryController) -> GalleryResponse {
    let key = controller.current_key().cloned();
    GalleryResponse {
        owner: key.as_ref().map(|key| key.owner.0.clone()),
        limit: key.map(|key| key.limit),
        display: controller.display_state(),
    }
}

/// Runs one controller operation and answers with the resulting gallery.
async fn apply<F>(state: &AppState, operation: F) -> ApiResult<GalleryResponse>
where
    F: FnOnce(&mut GalleryController) -> Result<Option<PendingFetch>, GalleryError> + Send + 'static,
{
    state
        .gallery
        .call(move |controller| match operation(controller) {
            Ok(pending) => (Ok(snapshot(controller)), pending),
            Err(err) => (Err(err), None),
        })
        .await
        .map_err(unavailable)?
        .map(Json)
        .map_err(gallery_error)
}

pub(crate) async fn get_gallery(State(state): State<AppState>) -> ApiResult<GalleryResponse> {
    apply(&state, |_| Ok(None)).await
}

pub(crate) async fn view_owner(
    State(state): State<AppState>,
    Json(request): Json<ViewOwnerRequest>,
) -> ApiResult<GalleryResponse> {
    apply(&state, move |controller| controller.view_owner(request.owner)).await
}

pub(crate) async fn refresh(State(state): State<AppState>) -> ApiResult<GalleryResponse> {
    apply(&state, GalleryController::refresh).await
}

pub(crate) async fn set_limit(
    State(state): State<AppState>,
    Json(request): Json<LimitRequest>,
) -> ApiResult<GalleryResponse> {
    if request.limit <= 0 {
        return Err(bad_request("limit must be a positive integer"));
    }
    let limit = u32::try_from(request.limit).map_err(|_| bad_request("limit is too large"))?;

    apply(&state, move |controller| controller.set_limit(limit)).await
}

pub(crate) async fn move_item(
    State(state): State<AppState>,
    Json(request): Json<MoveItemRequest>,
) -> ApiResult<GalleryResponse> {
    let (Ok(from), Ok(to)) = (usize::try_from(request.from), usize::try_from(request.to)) else {
        return Err(bad_request("from and to must be non-negative"));
    };

    apply(&state, move |controller| controller.move_item(from, to).map(|()| None)).await
}

pub(crate) async fn hide(
    State(state): State<AppState>,
    Json(request): Json<ItemRequest>,
) -> ApiResult<GalleryResponse> {
    if request.id.trim().is_empty() {
        return Err(bad_request("id is required"));
    }
    apply(&state, move |controller| controller.hide(&request.id).map(|()| None)).await
}

pub(crate) async fn unhide(
    State(state): State<AppState>,
    Json(request): Json<ItemRequest>,
) -> ApiResult<GalleryResponse> {
    if request.id.trim().is_empty() {
        return Err(bad_request("id is required"));
    }
    apply(&state, move |controller| controller.unhide(&request.id).map(|()| None)).await
}

pub(crate) async fn reset(State(state): State<AppState>) -> ApiResult<GalleryResponse> {
    apply(&state, GalleryController::reset).await
}

pub(crate) async fn set_background(
    State(state): State<AppState>,
    Json(request): Json<BackgroundRequest>,
) -> ApiResult<GalleryResponse> {
    apply(&state, move |controller| {
        controller.set_background(&request.url).map(|()| None)
    })
    .await
}

pub(crate) async fn clear_background(State(state): State<AppState>) -> ApiResult<GalleryResponse> {
    apply(&state, |controller| {
        controller.clear_background();
        Ok(None)
    })
    .await
}
