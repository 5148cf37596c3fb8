//! Calendar events and contacts from the connected Nylas grant.

use axum::extract::State;
use serde::Deserialize;
use serde_json::Value;

use crate::auth::AuthContext;
use crate::http::extract::Query;
use crate::http::response::{ApiResponse, ApiResult};
use crate::http::server::AppState;

const MAX_LIMIT: u32 = 200;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListParams {
    pub calendar_id: String,
    pub limit: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self { calendar_id: "primary".to_string(), limit: 50 }
    }
}

pub async fn events(
    State(state): State<AppState>,
    _ctx: AuthContext,
    Query(params): Query<ListParams>,
) -> ApiResult<ApiResponse<Vec<Value>>> {
    let integrations = state.integrations.load_full();
    let events = integrations
        .nylas()?
        .list_events(&params.calendar_id, params.limit.clamp(1, MAX_LIMIT))
        .await?;
    Ok(ApiResponse::ok(events))
}

pub async fn contacts(
    State(state): State<AppState>,
    _ctx: AuthContext,
    Query(params): Query<ListParams>,
) -> ApiResult<ApiResponse<Vec<Value>>> {
    let integrations = state.integrations.load_full();
    let contacts = integrations.nylas()?.list_contacts(params.limit.clamp(1, MAX_LIMIT)).await?;
    Ok(ApiResponse::ok(contacts))
}
