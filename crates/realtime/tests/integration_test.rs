use amplify_todo_realtime::{
    ConnectionState, RealtimeClient, RealtimeClientOptions, RealtimeError, SubscriptionEvent,
    SubscriptionGroup,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

/// How the mock server behaves after the handshake
#[derive(Clone, Copy)]
enum Script {
    /// Ack every start and push one data frame for it
    Echo,
    /// Short keep-alive window; starts are acked, then nothing more is sent
    Silent,
    /// Reject every start with an error frame
    RejectStart,
    /// Ack starts; after the second, push frames alternating between the two
    Interleave,
}

// Helper function to start a mock graphql-ws server.
// Every text frame the client sends is forwarded on the returned channel.
async fn start_mock_server(script: Script) -> (String, mpsc::UnboundedReceiver<Value>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let callback = |request: &Request, mut response: Response| -> Result<Response, ErrorResponse> {
            assert!(request.uri().query().unwrap_or_default().contains("header="));
            response
                .headers_mut()
                .insert("Sec-WebSocket-Protocol", HeaderValue::from_static("graphql-ws"));
            Ok(response)
        };
        let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
            .await
            .unwrap();

        let mut started = Vec::new();
        while let Some(Ok(frame)) = ws.next().await {
            let Message::Text(text) = frame else { continue };
            let message: Value = serde_json::from_str(&text).unwrap();
            let _ = seen_tx.send(message.clone());

            let id = message["id"].clone();
            let replies = match (message["type"].as_str(), script) {
                (Some("connection_init"), Script::Silent) => vec![
                    json!({"type": "connection_ack", "payload": {"connectionTimeoutMs": 200}}),
                ],
                (Some("connection_init"), _) => vec![
                    json!({"type": "connection_ack", "payload": {"connectionTimeoutMs": 300000}}),
                    json!({"type": "ka"}),
                ],
                (Some("start"), Script::Echo) => vec![
                    json!({"type": "start_ack", "id": id}),
                    json!({"type": "data", "id": id, "payload": {"data": {
                        "onCreateTodo": {"id": "t-1", "content": "buy milk"}
                    }}}),
                ],
                (Some("start"), Script::Silent) => vec![json!({"type": "start_ack", "id": id})],
                (Some("start"), Script::Interleave) => {
                    started.push(id.clone());
                    let mut replies = vec![json!({"type": "start_ack", "id": id})];
                    if started.len() == 2 {
                        for (n, member) in [1, 0, 1, 0].into_iter().enumerate() {
                            replies.push(json!({"type": "data", "id": started[member], "payload": {"data": {"n": n}}}));
                        }
                    }
                    replies
                }
                (Some("start"), Script::RejectStart) => vec![json!({
                    "type": "error",
                    "id": id,
                    "payload": {"errors": [{"errorType": "Unauthorized", "message": "Not Authorized"}]}
                })],
                (Some("stop"), _) => vec![json!({"type": "complete", "id": id})],
                _ => vec![],
            };
            for reply in replies {
                if ws.send(Message::Text(reply.to_string())).await.is_err() {
                    return;
                }
            }
        }
    });

    (format!("http://{}/graphql", addr), seen_rx)
}

async fn connected_client(script: Script) -> (RealtimeClient, mpsc::UnboundedReceiver<Value>) {
    let (url, seen) = start_mock_server(script).await;
    let client = RealtimeClient::new(&url).unwrap();
    client.set_auth(Some("access-token".to_string())).await;
    (client, seen)
}

#[tokio::test]
async fn test_client_creation_default_options() {
    let client =
        RealtimeClient::new("https://abc.appsync-api.us-east-1.amazonaws.com/graphql").unwrap();
    assert_eq!(
        client.endpoint().as_str(),
        "wss://abc.appsync-realtime-api.us-east-1.amazonaws.com/graphql"
    );
    assert_eq!(
        client.get_connection_state().await,
        ConnectionState::Disconnected
    );
}

#[tokio::test]
async fn test_client_with_explicit_endpoint() {
    let client = RealtimeClient::with_endpoint(
        "https://api.example.com/graphql",
        "wss://realtime.example.com/graphql",
        RealtimeClientOptions::default(),
    )
    .unwrap();
    assert_eq!(client.endpoint().host_str(), Some("realtime.example.com"));
}

#[tokio::test]
async fn test_connect_handshake() {
    let (client, mut seen) = connected_client(Script::Echo).await;
    let mut states = client.on_state_change();

    client.connect().await.unwrap();

    assert_eq!(client.get_connection_state().await, ConnectionState::Connected);
    assert_eq!(states.recv().await.unwrap(), ConnectionState::Connecting);
    assert_eq!(states.recv().await.unwrap(), ConnectionState::Connected);
    assert_eq!(seen.recv().await.unwrap()["type"], "connection_init");

    // A second connect is a no-op
    client.connect().await.unwrap();
    assert_eq!(client.get_connection_state().await, ConnectionState::Connected);
}

#[tokio::test]
async fn test_subscribe_receives_data_and_unsubscribe_sends_stop() {
    let (client, mut seen) = connected_client(Script::Echo).await;

    let mut subscription = client
        .subscribe(
            "subscription OnCreateTodo($owner: String) { onCreateTodo(owner: $owner) { id } }",
            json!({"owner": "s-1::u-1"}),
        )
        .await
        .unwrap();
    assert!(subscription.is_active());

    let event = tokio::time::timeout(Duration::from_secs(5), subscription.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        event,
        SubscriptionEvent::Data(json!({"onCreateTodo": {"id": "t-1", "content": "buy milk"}}))
    );

    assert_eq!(seen.recv().await.unwrap()["type"], "connection_init");
    let start = seen.recv().await.unwrap();
    assert_eq!(start["type"], "start");
    let data: Value = serde_json::from_str(start["payload"]["data"].as_str().unwrap()).unwrap();
    assert_eq!(data["variables"]["owner"], "s-1::u-1");
    assert_eq!(
        start["payload"]["extensions"]["authorization"]["Authorization"],
        "access-token"
    );

    let id = subscription.id().to_string();
    subscription.unsubscribe().await.unwrap();

    let stop = tokio::time::timeout(Duration::from_secs(5), seen.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stop, json!({"type": "stop", "id": id}));
}

#[tokio::test]
async fn test_rejected_start_is_an_error() {
    let (client, _seen) = connected_client(Script::RejectStart).await;

    let result = client.subscribe("subscription { x }", json!({})).await;
    match result {
        Err(RealtimeError::SubscriptionError(message)) => {
            assert_eq!(message, "Unauthorized: Not Authorized")
        }
        other => panic!("unexpected result: {:?}", other.map(|s| s.id().to_string())),
    }
}

#[tokio::test]
async fn test_keep_alive_timeout_fails_subscriptions() {
    let (client, _seen) = connected_client(Script::Silent).await;
    let mut subscription = client.subscribe("subscription { x }", json!({})).await.unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), subscription.next())
        .await
        .unwrap();
    assert_eq!(
        event,
        Some(SubscriptionEvent::Error("connection timed out".to_string()))
    );
    assert_eq!(
        client.get_connection_state().await,
        ConnectionState::Disconnected
    );
}

#[tokio::test]
async fn test_disconnect_completes_subscriptions() {
    let (client, _seen) = connected_client(Script::Echo).await;
    let mut subscription = client.subscribe("subscription { x }", json!({})).await.unwrap();

    // Drain the data frame pushed after start_ack
    let _ = subscription.next().await;

    client.disconnect().await.unwrap();
    assert_eq!(
        client.get_connection_state().await,
        ConnectionState::Disconnected
    );
    assert_eq!(subscription.next().await, Some(SubscriptionEvent::Complete));

    // Releasing after the socket is gone is still fine
    subscription.unsubscribe().await.unwrap();
}

#[tokio::test]
async fn test_subscribe_without_token_is_unauthorized() {
    let (url, _seen) = start_mock_server(Script::Echo).await;
    let client = RealtimeClient::new(&url).unwrap();
    let result = client.subscribe("subscription { x }", json!({})).await;
    assert!(matches!(result, Err(RealtimeError::Unauthorized)));
}

#[tokio::test]
async fn test_group_yields_events_in_arrival_order() {
    let (client, _seen) = connected_client(Script::Interleave).await;

    let mut group = SubscriptionGroup::new();
    let first = group
        .subscribe(&client, "subscription A { a { id } }", json!({}))
        .await
        .unwrap();
    let second = group
        .subscribe(&client, "subscription B { b { id } }", json!({}))
        .await
        .unwrap();
    assert_eq!(group.len(), 2);

    let mut order = Vec::new();
    for _ in 0..4 {
        let (id, event) = tokio::time::timeout(Duration::from_secs(5), group.next())
            .await
            .unwrap()
            .unwrap();
        let SubscriptionEvent::Data(data) = event else {
            panic!("unexpected event: {:?}", event);
        };
        order.push((id, data["n"].as_u64().unwrap()));
    }

    assert_eq!(
        order,
        vec![
            (second.clone(), 0),
            (first.clone(), 1),
            (second.clone(), 2),
            (first.clone(), 3),
        ]
    );
    group.unsubscribe().await.unwrap();
}
