//! End-to-end session stabilization behavior.

mod common;

use std::time::Duration;

use futures_util::SinkExt;
use tokio_tungstenite::tungstenite::Message;

#[tokio::test]
async fn test_echo_through_proxy() {
    let backend = common::start_mock_backend().await;
    let proxy = common::start_proxy(common::test_config(&backend.url())).await;

    let mut client = common::connect_client(proxy.addr).await;
    common::expect_text(&mut client, "backend_connected").await;

    client
        .send(Message::Text("hello".to_string().into()))
        .await
        .unwrap();
    common::expect_text(&mut client, "hello").await;
}

#[tokio::test]
async fn test_transient_backend_restart() {
    let backend = common::start_mock_backend().await;
    let proxy = common::start_proxy(common::test_config(&backend.url())).await;

    let mut client = common::connect_client(proxy.addr).await;
    common::expect_text(&mut client, "backend_connected").await;

    client
        .send(Message::Text("a".to_string().into()))
        .await
        .unwrap();
    common::expect_text(&mut client, "a").await;

    backend.go_down();
    common::expect_text(&mut client, "backend_disconnected").await;

    tokio::time::sleep(Duration::from_millis(300)).await;
    backend.come_back();
    common::expect_text(&mut client, "backend_connected").await;

    client
        .send(Message::Text("b".to_string().into()))
        .await
        .unwrap();
    common::expect_text(&mut client, "b").await;
}

#[tokio::test]
async fn test_reconnect_window_expires() {
    let backend = common::start_mock_backend().await;
    let mut config = common::test_config(&backend.url());
    config.reconnect.dial_timeout = Duration::from_millis(500);
    let proxy = common::start_proxy(config).await;

    let mut client = common::connect_client(proxy.addr).await;
    common::expect_text(&mut client, "backend_connected").await;

    backend.go_down();
    common::expect_text(&mut client, "backend_disconnected").await;

    // The backend never returns: the session must end without another
    // connected event.
    common::expect_close(&mut client).await;
}

#[tokio::test]
async fn test_client_hangup_notifies_backend() {
    let backend = common::start_mock_backend().await;
    let proxy = common::start_proxy(common::test_config(&backend.url())).await;

    let mut client = common::connect_client(proxy.addr).await;
    common::expect_text(&mut client, "backend_connected").await;

    client.close(None).await.unwrap();

    // The backend observes a going-away close within the read deadline.
    let mut codes = Vec::new();
    for _ in 0..100 {
        codes = backend.observed_close_codes();
        if !codes.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(codes, vec![Some(1001)]);
}

#[tokio::test]
async fn test_initial_dial_failure_closes_client() {
    let dead = common::unused_addr().await;
    let mut config = common::test_config(&format!("ws://{dead}/"));
    config.reconnect.dial_timeout = Duration::from_millis(500);
    let proxy = common::start_proxy(config).await;

    // The upgrade itself succeeds; the proxy then reports the backend as
    // unavailable and hangs up without any reconnect attempt.
    let mut client = common::connect_client(proxy.addr).await;
    common::expect_text(&mut client, "backend_disconnected").await;
    common::expect_close(&mut client).await;
}

#[tokio::test]
async fn test_custom_event_names() {
    let backend = common::start_mock_backend().await;
    let mut config = common::test_config(&backend.url());
    config.events.connected = "up".to_string();
    config.events.disconnected = "down".to_string();
    config.reconnect.dial_timeout = Duration::from_millis(500);
    let proxy = common::start_proxy(config).await;

    let mut client = common::connect_client(proxy.addr).await;
    common::expect_text(&mut client, "up").await;

    backend.go_down();
    common::expect_text(&mut client, "down").await;
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    // One session ending must not disturb another session on the same
    // proxy.
    let backend = common::start_mock_backend().await;
    let proxy = common::start_proxy(common::test_config(&backend.url())).await;

    let mut first = common::connect_client(proxy.addr).await;
    let mut second = common::connect_client(proxy.addr).await;
    common::expect_text(&mut first, "backend_connected").await;
    common::expect_text(&mut second, "backend_connected").await;

    first.close(None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    second
        .send(Message::Text("still here".to_string().into()))
        .await
        .unwrap();
    common::expect_text(&mut second, "still here").await;
}
