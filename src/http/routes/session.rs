//! Sign-out.

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::auth::session::{token_from_headers, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::http::response::ApiResponse;
use crate::http::server::AppState;

fn expired_cookie(name: &str) -> HeaderValue {
    let cookie = format!("{}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax", name);
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// Clear the session cookies and revoke the token upstream. Always succeeds.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let (Some(token), Some(hosted)) = (token_from_headers(&headers), state.sessions.hosted()) {
        if let Err(e) = hosted.logout(&token).await {
            tracing::warn!(error = %e, "Upstream sign-out failed; clearing cookies anyway");
        }
    }

    let mut response = ApiResponse::ok(json!({ "signedOut": true })).into_response();
    for name in [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE] {
        response.headers_mut().append(header::SET_COOKIE, expired_cookie(name));
    }
    response
}
