use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use super::SendPhase;
use super::SessionController;
use crate::domain::models::ApiError;
use crate::domain::models::Author;
use crate::domain::models::MessageStatus;
use crate::domain::models::StreamEvent;
use crate::infrastructure::api::HistoryLoader;
use crate::infrastructure::api::StreamClient;
use crate::infrastructure::api::TransportClient;

fn controller_for(url: &str) -> SessionController {
    let transport = Arc::new(TransportClient::new(
        url,
        Duration::from_millis(2000),
        0,
        Duration::from_millis(0),
    ));
    let history = HistoryLoader::new(transport.clone());
    let stream = StreamClient::new(url, transport);

    return SessionController::new(history, stream, "s1");
}

fn offline_controller() -> SessionController {
    // Nothing in these tests touches the network.
    return controller_for("http://127.0.0.1:9");
}

fn fragment(text: &str) -> StreamEvent {
    return StreamEvent::Fragment(text.to_string());
}

#[test]
fn it_defaults_the_session_id() {
    let transport = Arc::new(TransportClient::new(
        "http://127.0.0.1:9",
        Duration::from_millis(2000),
        0,
        Duration::from_millis(0),
    ));
    let history = HistoryLoader::new(transport.clone());
    let stream = StreamClient::new("http://127.0.0.1:9", transport);

    let controller = SessionController::new(history, stream, "  ");

    assert_eq!(controller.session_id(), "default");
}

#[test]
fn it_rejects_empty_sends() {
    let mut controller = offline_controller();

    assert!(!controller.begin_send("   "));
    assert!(controller.messages().is_empty());
    assert!(!controller.is_loading());
}

#[test]
fn it_rejects_sends_while_a_reply_is_in_flight() {
    let mut controller = offline_controller();

    assert!(controller.begin_send("hello"));
    assert!(!controller.begin_send("are you there?"));

    assert_eq!(controller.messages().len(), 1);
    assert!(controller.is_loading());
}

#[test]
fn it_runs_a_full_send_through_the_state_machine() {
    let mut controller = offline_controller();

    assert!(controller.begin_send("hello"));
    assert_eq!(controller.phase(), SendPhase::Sending);

    controller.handle_event(fragment("Hi"));
    assert_eq!(controller.phase(), SendPhase::Streaming);
    controller.handle_event(fragment(" there"));
    controller.handle_event(StreamEvent::Done);

    let messages = controller.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].content, "hello");
    assert_eq!(messages[0].author, Author::User);
    assert_eq!(messages[1].content, "Hi there");
    assert_eq!(messages[1].author, Author::Assistant);
    assert_eq!(messages[1].status, MessageStatus::Final);
    assert!(!controller.is_loading());
    assert!(controller.last_error().is_none());
}

#[test]
fn it_keeps_partial_output_when_the_channel_fails() {
    let mut controller = offline_controller();

    controller.begin_send("hello");
    controller.handle_event(fragment("one"));
    controller.handle_event(fragment(" two"));
    controller.handle_event(StreamEvent::Failed(ApiError::StreamFailed(
        "interrupted".to_string(),
    )));

    let messages = controller.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].content, "one two");
    assert!(!controller.is_loading());
    assert_eq!(
        controller.last_error(),
        Some(&ApiError::StreamFailed("interrupted".to_string()))
    );
}

#[test]
fn it_freezes_content_once_cancelled() {
    let mut controller = offline_controller();

    controller.begin_send("hello");
    controller.handle_event(fragment("one"));
    controller.cancel();
    controller.handle_event(fragment(" two"));
    controller.handle_event(fragment(" three"));

    let messages = controller.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].content, "one");
    assert_eq!(messages[1].status, MessageStatus::Final);
    assert!(!controller.is_loading());

    // Repeated cancels are no-ops.
    controller.cancel();
}

#[test]
fn it_accepts_a_new_send_after_completion() {
    let mut controller = offline_controller();

    controller.begin_send("first");
    controller.handle_event(fragment("one"));
    controller.handle_event(StreamEvent::Done);

    assert!(controller.begin_send("second"));
    controller.handle_event(fragment("two"));
    controller.handle_event(StreamEvent::Done);

    let messages = controller.messages();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[1].content, "one");
    assert_eq!(messages[3].content, "two");
}

#[test]
fn it_drops_events_with_no_active_stream() {
    let mut controller = offline_controller();

    controller.handle_event(fragment("ghost"));

    assert!(controller.messages().is_empty());
    assert!(!controller.is_loading());
}

#[tokio::test]
async fn it_loads_history_ahead_of_pending_messages() -> Result<()> {
    let body = r#"[
        {"id": 1, "message": "hello", "is_user": true, "timestamp": "2024-01-01T00:00:00"},
        {"id": 2, "message": "Hi there", "is_user": false, "timestamp": "2024-01-01T00:00:05"}
    ]"#;

    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/chat/history")
        .match_query(mockito::Matcher::UrlEncoded(
            "session_id".to_string(),
            "s1".to_string(),
        ))
        .with_status(200)
        .with_body(body)
        .create_async().await;

    let mut controller = controller_for(&server.url());
    controller.begin_send("a new question");
    controller.load_history().await;

    mock.assert();

    let messages = controller.messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].content, "hello");
    assert_eq!(messages[1].content, "Hi there");
    assert_eq!(messages[2].content, "a new question");
    assert_eq!(messages[0].status, MessageStatus::Final);
    assert_eq!(messages[1].status, MessageStatus::Final);
    assert!(controller.last_error().is_none());

    return Ok(());
}

#[tokio::test]
async fn it_starts_empty_when_history_is_unavailable() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/chat/history")
        .match_query(mockito::Matcher::Any)
        .with_status(500)
        .create_async().await;

    let mut controller = controller_for(&server.url());
    controller.load_history().await;

    mock.assert();
    assert!(controller.messages().is_empty());
    match controller.last_error() {
        Some(ApiError::HistoryUnavailable(_)) => {}
        err => panic!("expected HistoryUnavailable, got {err:?}"),
    }

    // The failed load does not block sending.
    assert!(controller.begin_send("hello"));
}

#[tokio::test]
async fn it_streams_a_reply_end_to_end() -> Result<()> {
    let body = concat!(
        "data: {\"content\": \"Hi\"}\n\n",
        "data: {\"content\": \" there\"}\n\n",
        "event: done\n",
        "data: \n\n",
    );

    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/chat/stream")
        .match_query(mockito::Matcher::AllOf(vec![
            mockito::Matcher::UrlEncoded("message".to_string(), "hello".to_string()),
            mockito::Matcher::UrlEncoded("session_id".to_string(), "s1".to_string()),
        ]))
        .with_status(200)
        .with_body(body)
        .create_async().await;

    let mut controller = controller_for(&server.url());
    assert!(controller.send_message("hello"));

    while let Some(event) = controller.next_event().await {
        let done = matches!(event, StreamEvent::Done | StreamEvent::Failed(_));
        controller.handle_event(event);
        if done {
            break;
        }
    }

    mock.assert();

    let messages = controller.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].content, "hello");
    assert!(messages[0].author.is_user());
    assert_eq!(messages[1].content, "Hi there");
    assert!(!messages[1].author.is_user());
    assert!(!controller.is_loading());
    assert!(controller.last_error().is_none());

    return Ok(());
}

#[tokio::test]
async fn it_sends_plain_without_a_channel() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/send")
        .with_status(200)
        .with_body("{\"content\": \"Hi there\"}")
        .create_async().await;

    let mut controller = controller_for(&server.url());
    controller.send_plain("hello").await?;

    mock.assert();

    let messages = controller.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].content, "Hi there");
    assert_eq!(messages[1].status, MessageStatus::Final);
    assert!(!controller.is_loading());

    return Ok(());
}
