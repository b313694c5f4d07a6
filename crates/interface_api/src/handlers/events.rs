//! Event feed handler

use axum::{
    extract::{Query, State},
    Extension, Json,
};

use core_kernel::TenantContext;

use crate::dto::{EventsQuery, EventsResponse};
use crate::error::ApiError;
use crate::AppState;

const DEFAULT_PAGE: usize = 100;
const MAX_PAGE: usize = 500;

/// Restartable, tenant-filtered stage record feed
pub async fn stream_events(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<EventsResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE).min(MAX_PAGE);
    let page = state.engine.events(&ctx, query.since, limit).await?;
    Ok(Json(EventsResponse {
        records: page.records,
        next_cursor: page.next_cursor,
    }))
}
