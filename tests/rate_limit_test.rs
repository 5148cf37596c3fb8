mod common;

use axum::http::StatusCode;

use common::*;

#[tokio::test]
async fn test_budget_exhaustion_returns_429() {
    let mut config = test_config();
    config.rate_limit.in_memory = true;
    config.rate_limit.requests = 2;
    config.rate_limit.window_secs = 60;
    let app = TestApp::new(config);

    for remaining in ["1", "0"] {
        let res = app.send(get("/health", None)).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.headers["x-ratelimit-limit"], "2");
        assert_eq!(res.headers["x-ratelimit-remaining"], remaining);
    }

    let res = app.send(get("/health", None)).await;
    assert_eq!(res.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.body["success"], false);
    assert_eq!(res.body["error"]["code"], "RATE_LIMITED");
    assert_eq!(res.headers["x-ratelimit-remaining"], "0");
    assert!(res.headers.contains_key("x-ratelimit-reset"));
}

#[tokio::test]
async fn test_authenticated_callers_have_separate_budgets() {
    let mut config = test_config();
    config.rate_limit.in_memory = true;
    config.rate_limit.requests = 1;
    let app = TestApp::new(config);
    seed_user(&app.store, "u1", None, "user").await;
    seed_user(&app.store, "u2", None, "user").await;

    assert_eq!(app.send(get("/api/v1/profile", Some(&token("u1")))).await.status, StatusCode::OK);
    assert_eq!(
        app.send(get("/api/v1/profile", Some(&token("u1")))).await.status,
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(app.send(get("/api/v1/profile", Some(&token("u2")))).await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_without_counter_store_requests_pass_without_headers() {
    let mut config = test_config();
    config.rate_limit.requests = 1;
    let app = TestApp::new(config);

    for _ in 0..3 {
        let res = app.send(get("/health", None)).await;
        assert_eq!(res.status, StatusCode::OK);
        assert!(!res.headers.contains_key("x-ratelimit-limit"));
    }
}

#[tokio::test]
async fn test_disabled_limiter_never_limits() {
    let mut config = test_config();
    config.rate_limit.enabled = false;
    config.rate_limit.in_memory = true;
    config.rate_limit.requests = 1;
    let app = TestApp::new(config);

    for _ in 0..3 {
        assert_eq!(app.send(get("/health", None)).await.status, StatusCode::OK);
    }
}
