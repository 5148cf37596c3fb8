use axum::{extract::State, response::Response};

use crate::auth::{Permission, TenantContext};
use crate::db::models::{Experiment, NewExperiment};
use crate::db::repo;
use crate::http::extract::Json;
use crate::http::response::{created, ApiResponse, ApiResult};
use crate::http::routes::required;
use crate::http::server::AppState;

pub async fn list(State(state): State<AppState>, ctx: TenantContext) -> ApiResult<ApiResponse<Vec<Experiment>>> {
    let experiments = repo::list_experiments(state.store.as_ref(), &ctx.organization_id).await?;
    Ok(ApiResponse::ok(experiments))
}

pub async fn create(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(input): Json<NewExperiment>,
) -> ApiResult<Response> {
    ctx.auth.require(Permission::ManageExperiments)?;
    required("name", &input.name)?;

    let experiment = repo::create_experiment(state.store.as_ref(), &ctx.organization_id, &input).await?;
    Ok(created(experiment))
}
