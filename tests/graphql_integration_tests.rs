use std::sync::Arc;
use std::time::Duration;

use chatnav::core::{Action, AuthState, RouteTable};
use chatnav::data::{DataSource, GraphqlClient, LiveEvent, TransportError, UserUpdate};
use chatnav::lifecycle::{SessionEvent, SubscriptionKind};
use chatnav::push::LocalPushService;
use chatnav::shell::{AppShell, ShellEvent};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_test::{assert_err, assert_ok};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, body_string_contains, header, method, path},
};

// ============================================================================
// Helper Functions
// ============================================================================

fn user_json(groups: serde_json::Value) -> serde_json::Value {
    json!({
        "id": 1,
        "email": "ada@example.com",
        "username": "ada",
        "registrationId": null,
        "badgeCount": 0,
        "groups": groups
    })
}

fn group_json(id: i64, unread: u32) -> serde_json::Value {
    json!({
        "id": id,
        "name": format!("Group {id}"),
        "unreadCount": unread,
        "messages": { "edges": [] }
    })
}

/// One SSE `next` frame carrying `data`.
fn next_frame(data: serde_json::Value) -> String {
    format!("event: next\ndata: {}\n\n", json!({ "data": data }))
}

fn message_frame(id: i64, group_id: i64) -> String {
    message_frame_with(id, group_id, &format!("message {id}"))
}

fn message_frame_with(id: i64, group_id: i64, content: &str) -> String {
    next_frame(json!({
        "messageAdded": {
            "id": id,
            "to": { "id": group_id },
            "from": { "id": 2, "username": "bob" },
            "content": content,
            "createdAt": "2024-03-01T10:00:00Z"
        }
    }))
}

const COMPLETE: &str = "event: complete\ndata:\n\n";

async fn next_event(rx: &mut mpsc::Receiver<LiveEvent>) -> LiveEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a live event")
        .expect("live channel closed")
}

async fn next_session_event(rx: &mut mpsc::Receiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a live event")
        .expect("live channel closed")
}

/// Reads one HTTP request off `socket`, headers and body.
async fn read_request(socket: &mut tokio::net::TcpStream) {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    let header_end = loop {
        let n = socket.read(&mut buf).await.unwrap();
        assert!(n > 0, "connection closed mid-request");
        request.extend_from_slice(&buf[..n]);
        if let Some(pos) = request.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let headers = String::from_utf8_lossy(&request[..header_end]).to_lowercase();
    let content_length: usize = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .map(|v| v.trim().parse().unwrap())
        .unwrap_or(0);
    while request.len() < header_end + content_length {
        let n = socket.read(&mut buf).await.unwrap();
        assert!(n > 0, "connection closed mid-body");
        request.extend_from_slice(&buf[..n]);
    }
}

fn client(server: &MockServer) -> GraphqlClient {
    GraphqlClient::new(server.uri()).with_reconnect_delay(Duration::from_millis(20))
}

// ============================================================================
// Queries and Mutations
// ============================================================================

#[tokio::test]
async fn test_fetch_user_sends_token_and_parses_user() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("Authorization", "Bearer jwt-1"))
        .and(body_partial_json(json!({ "variables": { "id": 1 } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "user": user_json(json!([group_json(3, 2)])) }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client(&mock_server);
    client.set_token(Some("jwt-1".to_string()));

    let user = assert_ok!(client.fetch_user(1).await);
    assert_eq!(user.email, "ada@example.com");
    assert_eq!(user.groups.len(), 1);
    assert_eq!(user.groups[0].unread_count, 2);
}

#[tokio::test]
async fn test_fetch_user_surfaces_graphql_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": [{ "message": "Unauthorized" }]
        })))
        .mount(&mock_server)
        .await;

    match client(&mock_server).fetch_user(1).await {
        Err(TransportError::GraphQl(messages)) => assert_eq!(messages, vec!["Unauthorized"]),
        other => panic!("expected GraphQl error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_fetch_user_http_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&mock_server)
        .await;

    let err = assert_err!(client(&mock_server).fetch_user(1).await);
    match err {
        TransportError::Api { status, message } => {
            assert_eq!(status, 500);
            assert!(message.contains("Internal Server Error"));
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_fetch_missing_user_is_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": { "user": null } })),
        )
        .mount(&mock_server)
        .await;

    let err = assert_err!(client(&mock_server).fetch_user(42).await);
    assert!(matches!(err, TransportError::NotFound(_)));
}

#[tokio::test]
async fn test_update_user_sends_only_set_fields() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("updateUser"))
        .and(body_partial_json(json!({ "variables": { "user": { "badgeCount": 0 } } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "updateUser": user_json(json!([])) }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let user = assert_ok!(client(&mock_server).update_user(&UserUpdate::clear_badge()).await);
    assert_eq!(user.badge_count, 0);

    let requests = mock_server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["variables"]["user"], json!({ "badgeCount": 0 }));
}

// ============================================================================
// Subscriptions
// ============================================================================

#[tokio::test]
async fn test_message_subscription_streams_events() {
    let mock_server = MockServer::start().await;

    let sse = format!(
        ": keep-alive\n\n{}{}{}",
        message_frame(10, 3),
        message_frame(11, 3),
        COMPLETE
    );
    Mock::given(method("POST"))
        .and(path("/graphql/stream"))
        .and(body_partial_json(json!({ "variables": { "groupIds": [3, 4] } })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(sse),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let (tx, mut rx) = mpsc::channel(100);
    let _subscription = client(&mock_server).subscribe_to_messages(vec![3, 4], tx);

    let mut ids = Vec::new();
    for _ in 0..2 {
        match next_event(&mut rx).await {
            LiveEvent::MessageAdded(message) => {
                assert_eq!(message.to.id, 3);
                ids.push(message.id);
            }
            other => panic!("expected MessageAdded, got {other:?}"),
        }
    }
    assert_eq!(ids, vec![10, 11]);
}

#[tokio::test]
async fn test_group_subscription_streams_events() {
    let mock_server = MockServer::start().await;

    let sse = format!(
        "{}{}",
        next_frame(json!({ "groupAdded": group_json(8, 0) })),
        COMPLETE
    );
    Mock::given(method("POST"))
        .and(path("/graphql/stream"))
        .and(body_partial_json(json!({ "variables": { "userId": 1 } })))
        .respond_with(ResponseTemplate::new(200).set_body_string(sse))
        .mount(&mock_server)
        .await;

    let (tx, mut rx) = mpsc::channel(100);
    let _subscription = client(&mock_server).subscribe_to_groups(1, tx);

    match next_event(&mut rx).await {
        LiveEvent::GroupAdded(group) => assert_eq!(group.name, "Group 8"),
        other => panic!("expected GroupAdded, got {other:?}"),
    }
}

#[tokio::test]
async fn test_dropped_stream_reconnects_and_notifies() {
    let mock_server = MockServer::start().await;

    // No `complete` frame: the server hung up, so the client reopens.
    Mock::given(method("POST"))
        .and(path("/graphql/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_string(message_frame(1, 3)))
        .mount(&mock_server)
        .await;

    let client = client(&mock_server);
    let (tx, mut rx) = mpsc::channel(100);
    let _reconnect = client.on_reconnected(tx.clone());
    let subscription = client.subscribe_to_messages(vec![3], tx);

    let mut saw_reconnect = false;
    for _ in 0..10 {
        if next_event(&mut rx).await == LiveEvent::Reconnected {
            saw_reconnect = true;
            break;
        }
    }
    assert!(saw_reconnect);
    subscription.cancel();

    let requests = mock_server.received_requests().await.unwrap();
    assert!(requests.len() >= 2);
}

#[tokio::test]
async fn test_rejected_subscription_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql/stream"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&mock_server)
        .await;

    let (tx, _rx) = mpsc::channel(100);
    let _subscription = client(&mock_server).subscribe_to_messages(vec![3], tx);

    // Several reconnect delays pass without a second attempt.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
}

#[tokio::test]
async fn test_cancelled_subscription_stops_reconnecting() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql/stream"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let (tx, _rx) = mpsc::channel(100);
    let subscription = client(&mock_server).subscribe_to_messages(vec![3], tx);
    tokio::time::sleep(Duration::from_millis(100)).await;
    subscription.cancel();
    // Let any request already on the wire land before counting.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let after_cancel = mock_server.received_requests().await.unwrap().len();
    assert!(after_cancel >= 2);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(mock_server.received_requests().await.unwrap().len(), after_cancel);
}

#[tokio::test]
async fn test_character_split_across_writes_survives() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let body = format!("{}{}", message_frame_with(12, 3, "café"), COMPLETE).into_bytes();
    // Cut between the two bytes of "é".
    let split = body.iter().position(|b| *b == 0xC3).unwrap() + 1;
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_request(&mut socket).await;
        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\n",
            )
            .await
            .unwrap();
        socket.write_all(&body[..split]).await.unwrap();
        socket.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        socket.write_all(&body[split..]).await.unwrap();
        socket.flush().await.unwrap();
    });

    let client = GraphqlClient::new(format!("http://{addr}"));
    let (tx, mut rx) = mpsc::channel(100);
    let _subscription = client.subscribe_to_messages(vec![3], tx);

    match next_event(&mut rx).await {
        LiveEvent::MessageAdded(message) => {
            assert_eq!(message.id, 12);
            assert_eq!(message.content, "café");
        }
        other => panic!("expected MessageAdded, got {other:?}"),
    }
    server.await.unwrap();
}

// ============================================================================
// Shell Against a Mock Server
// ============================================================================

#[tokio::test]
async fn test_shell_login_then_live_message() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("updateUser"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "updateUser": user_json(json!([])) }
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({ "variables": { "id": 1 } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "user": user_json(json!([group_json(3, 0), group_json(4, 1)])) }
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql/stream"))
        .and(body_string_contains("messageAdded"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(format!("{}{}", message_frame(50, 4), COMPLETE)),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql/stream"))
        .and(body_string_contains("groupAdded"))
        .respond_with(ResponseTemplate::new(200).set_body_string(COMPLETE))
        .mount(&mock_server)
        .await;

    let source: Arc<dyn DataSource> = Arc::new(client(&mock_server));
    let push = Arc::new(LocalPushService::new(Some("device-1".to_string())));
    let (tx, mut rx) = mpsc::channel(100);
    let mut shell = AppShell::new(RouteTable::app(), source, push, tx, None);

    shell
        .handle(ShellEvent::Dispatch(Action::Login(AuthState::new(1, "jwt-1"))))
        .await;
    assert_eq!(shell.current_user().map(|u| u.groups.len()), Some(2));

    let event = next_session_event(&mut rx).await;
    assert_eq!(event.session, shell.coordinator().session());
    shell.handle(ShellEvent::Live(event)).await;

    let group = shell.current_user().unwrap().group(4).unwrap();
    assert_eq!(group.unread_count, 2);
    assert_eq!(group.latest_message().map(|m| m.id), Some(50));

    // Every request after login carries the token.
    let requests = mock_server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| {
        r.headers
            .get("authorization")
            .is_some_and(|v| v.to_str().unwrap_or_default() == "Bearer jwt-1")
    }));
}

#[tokio::test]
async fn test_rejected_feeds_leave_slots_free() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("updateUser"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "updateUser": user_json(json!([])) }
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({ "variables": { "id": 1 } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "user": user_json(json!([group_json(3, 0)])) }
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql/stream"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&mock_server)
        .await;

    let source: Arc<dyn DataSource> = Arc::new(client(&mock_server));
    let push = Arc::new(LocalPushService::new(Some("device-1".to_string())));
    let (tx, _rx) = mpsc::channel(100);
    let mut shell = AppShell::new(RouteTable::app(), source, push, tx, None);

    shell
        .handle(ShellEvent::Dispatch(Action::Login(AuthState::new(1, "jwt-1"))))
        .await;
    assert_eq!(shell.current_user().map(|u| u.groups.len()), Some(1));

    let settled = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let subscriptions = shell.coordinator().subscriptions();
            if !subscriptions.is_active(SubscriptionKind::Groups)
                && !subscriptions.is_active(SubscriptionKind::Messages)
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert_ok!(settled);
    // The reconnect listener is not a server feed and stays up.
    assert!(
        shell
            .coordinator()
            .subscriptions()
            .is_active(SubscriptionKind::Reconnect)
    );
}
