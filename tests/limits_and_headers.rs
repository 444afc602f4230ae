//! Connection limits and handshake header forwarding.

mod common;

use std::time::Duration;

use axum::http::HeaderValue;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Error as WsError;

#[tokio::test]
async fn test_headers_forwarded_minus_handshake_set() {
    let backend = common::start_mock_backend().await;
    let proxy = common::start_proxy(common::test_config(&backend.url())).await;

    let mut request = format!("ws://{}/", proxy.addr)
        .into_client_request()
        .unwrap();
    request
        .headers_mut()
        .insert("x-trace-id", HeaderValue::from_static("42"));
    request
        .headers_mut()
        .insert("sec-websocket-protocol", HeaderValue::from_static("chat"));

    let (mut client, _) = connect_async(request).await.unwrap();
    common::expect_text(&mut client, "backend_connected").await;

    let captured = backend.captured_headers();
    assert_eq!(captured.len(), 1);
    let headers = &captured[0];
    assert_eq!(headers.get("x-trace-id").unwrap(), "42");
    assert!(headers.get("sec-websocket-protocol").is_none());
}

#[tokio::test]
async fn test_connection_limit_enforced() {
    let backend = common::start_mock_backend().await;
    let mut config = common::test_config(&backend.url());
    config.listen.max_connections = 2;
    let proxy = common::start_proxy(config).await;

    let mut first = common::connect_client(proxy.addr).await;
    let mut second = common::connect_client(proxy.addr).await;
    common::expect_text(&mut first, "backend_connected").await;
    common::expect_text(&mut second, "backend_connected").await;

    // The third upgrade attempt is rejected before the handshake.
    match connect_async(format!("ws://{}/", proxy.addr)).await {
        Err(WsError::Http(response)) => assert_eq!(response.status(), 503),
        other => panic!("expected 503 rejection, got {other:?}"),
    }

    // Even a plain request is turned away while saturated.
    let http = reqwest::Client::builder().no_proxy().build().unwrap();
    let plain = http
        .get(format!("http://{}/", proxy.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(plain.status(), 503);

    // Ending a session frees its slot.
    first.close(None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let mut third = common::connect_client(proxy.addr).await;
    common::expect_text(&mut third, "backend_connected").await;
}

#[tokio::test]
async fn test_plain_request_below_limit_is_not_upgraded() {
    let backend = common::start_mock_backend().await;
    let proxy = common::start_proxy(common::test_config(&backend.url())).await;

    let http = reqwest::Client::builder().no_proxy().build().unwrap();
    let response = http
        .get(format!("http://{}/", proxy.addr))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}
