mod common;

use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};

use common::*;
use onboard_hero::HttpServer;

#[tokio::test]
async fn test_serves_until_shutdown_and_applies_reloads() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (config_tx, config_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let server = HttpServer::new(test_config()).unwrap();
    let task = tokio::spawn(server.run(listener, Some(config_rx), shutdown_rx));

    let client = reqwest::Client::new();
    let url = format!("http://{}/health", addr);

    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));
    assert!(!res.headers().contains_key("x-ratelimit-limit"));
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    // Turn on an in-process limiter without restarting
    let mut reloaded = test_config();
    reloaded.rate_limit.in_memory = true;
    reloaded.rate_limit.requests = 5;
    config_tx.send(reloaded).unwrap();

    let mut limited = false;
    for _ in 0..50 {
        let res = client.get(&url).send().await.unwrap();
        if res.headers().get("x-ratelimit-limit").map(|v| v == "5").unwrap_or(false) {
            limited = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(limited, "reloaded rate limit was never applied");

    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();

    assert!(client.get(&url).send().await.is_err());
}

#[tokio::test]
async fn test_invalid_reload_keeps_current_config() {
    let app = TestApp::new(test_config());
    let mut bad = test_config();
    bad.rate_limit.window_secs = 0;
    assert!(app.state.reload(bad).is_err());
    assert_eq!(app.state.config.load().rate_limit.window_secs, 60);
}

#[test]
fn test_hosted_database_without_service_key_is_refused() {
    let mut config = test_config();
    config.supabase.url = Some("https://demo.supabase.co".into());
    config.supabase.anon_key = Some("anon".into());

    match onboard_hero::AppState::from_config(config) {
        Err(onboard_hero::http::StartupError::InvalidConfig(message)) => {
            assert!(message.contains("service_role_key"))
        }
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("hosted database without a service key was accepted"),
    }
}
