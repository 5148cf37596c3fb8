//! Subscription checkout and direct subscriptions.

use axum::extract::State;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::{Permission, TenantContext};
use crate::db::models::Company;
use crate::db::repo;
use crate::http::extract::Json;
use crate::http::response::{ApiError, ApiResponse, ApiResult};
use crate::http::server::AppState;
use crate::integrations::stripe::{CheckoutRequest, StripeClient};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckoutBody {
    pub price_id: Option<String>,
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutCreated {
    session_id: String,
    url: Option<String>,
}

pub async fn checkout(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(body): Json<CheckoutBody>,
) -> ApiResult<ApiResponse<CheckoutCreated>> {
    ctx.auth.require(Permission::ManageBilling)?;
    let config = state.config.load_full();
    let integrations = state.integrations.load_full();
    let stripe = integrations.stripe()?;

    let price_id = body
        .price_id
        .or_else(|| config.stripe.default_price_id.clone())
        .ok_or_else(|| ApiError::validation("priceId is required"))?;

    let company = repo::get_company(state.store.as_ref(), &ctx.organization_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Organization"))?;

    let customer_id = match company.stripe_customer_id.clone() {
        Some(id) => Some(id),
        None => link_customer(&state, stripe, &company, ctx.auth.user.email.as_deref()).await?,
    };

    let base = config.app.url.trim_end_matches('/');
    let request = CheckoutRequest {
        price_id,
        organization_id: company.id,
        customer_email: ctx.auth.user.email.clone(),
        customer_id,
        success_url: body.success_url.unwrap_or_else(|| format!("{}/settings/billing?checkout=success", base)),
        cancel_url: body.cancel_url.unwrap_or_else(|| format!("{}/settings/billing?checkout=cancelled", base)),
    };

    let session = stripe.create_checkout_session(&request).await?;
    tracing::info!(organization_id = %ctx.organization_id, session_id = %session.id, "Checkout session created");
    Ok(ApiResponse::ok(CheckoutCreated { session_id: session.id, url: session.url }))
}

/// Create a Stripe customer for a company that has none and store its id.
/// Without a billing email there is nothing to create; checkout collects one.
async fn link_customer(
    state: &AppState,
    stripe: &StripeClient,
    company: &Company,
    email: Option<&str>,
) -> ApiResult<Option<String>> {
    let Some(email) = email else {
        return Ok(None);
    };

    let customer = stripe.create_customer(email, Some(&company.name), &company.id).await?;
    repo::update_company(state.store.as_ref(), &company.id, json!({ "stripe_customer_id": customer.id })).await?;
    tracing::info!(organization_id = %company.id, customer_id = %customer.id, "Stripe customer linked");
    Ok(Some(customer.id))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubscriptionBody {
    pub price_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionCreated {
    subscription_id: String,
    status: String,
}

/// Subscribe an organization that already has a Stripe customer (and a
/// saved payment method) without going through checkout.
pub async fn subscribe(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(body): Json<SubscriptionBody>,
) -> ApiResult<ApiResponse<SubscriptionCreated>> {
    ctx.auth.require(Permission::ManageBilling)?;
    let config = state.config.load_full();
    let integrations = state.integrations.load_full();
    let stripe = integrations.stripe()?;

    let price_id = body
        .price_id
        .or_else(|| config.stripe.default_price_id.clone())
        .ok_or_else(|| ApiError::validation("priceId is required"))?;

    let company = repo::get_company(state.store.as_ref(), &ctx.organization_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Organization"))?;
    let customer_id = company
        .stripe_customer_id
        .ok_or_else(|| ApiError::validation("Organization has no billing customer; start a checkout first"))?;

    let subscription = stripe.create_subscription(&customer_id, &price_id).await?;
    repo::update_company(
        state.store.as_ref(),
        &company.id,
        json!({ "stripe_subscription_id": subscription.id, "subscription_status": subscription.status }),
    )
    .await?;
    tracing::info!(organization_id = %company.id, subscription_id = %subscription.id, "Subscription created");

    Ok(ApiResponse::ok(SubscriptionCreated { subscription_id: subscription.id, status: subscription.status }))
}
