use std::time::Duration;

use mockito::Matcher;
use recap_bot::transport::{TelegramTransport, Transport};
use recap_bot::TransportError;
use serde_json::json;

const TOKEN: &str = "123:test";

fn transport(server: &mockito::Server) -> TelegramTransport {
    TelegramTransport::with_base_url(TOKEN, server.url(), Duration::from_secs(1)).unwrap()
}

#[tokio::test]
async fn test_next_batch_parses_text_messages_and_acknowledges_updates() {
    let mut server = mockito::Server::new_async().await;
    let first = server
        .mock("POST", "/bot123:test/getUpdates")
        .match_body(Matcher::PartialJson(json!({ "offset": 0, "timeout": 1 })))
        .with_status(200)
        .with_body(
            json!({
                "ok": true,
                "result": [
                    {
                        "update_id": 40,
                        "message": {
                            "message_id": 5,
                            "chat": { "id": -100 },
                            "from": { "id": 9, "first_name": "Olena", "username": "olena_k", "language_code": "uk" },
                            "text": "/summary",
                            "reply_to_message": { "message_id": 4, "chat": { "id": -100 } }
                        }
                    },
                    {
                        "update_id": 41,
                        "message": {
                            "message_id": 6,
                            "chat": { "id": -100 },
                            "from": { "id": 9, "first_name": "Olena" },
                            "sticker": { "file_id": "x" }
                        }
                    }
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;
    let second = server
        .mock("POST", "/bot123:test/getUpdates")
        .match_body(Matcher::PartialJson(json!({ "offset": 42 })))
        .with_status(200)
        .with_body(r#"{"ok":true,"result":[]}"#)
        .create_async()
        .await;

    let transport = transport(&server);
    let batch = transport.next_batch().await.unwrap();

    assert_eq!(batch.len(), 1);
    let message = &batch[0];
    assert_eq!(message.chat_id, -100);
    assert_eq!(message.author_name, "Olena");
    assert_eq!(message.username.as_deref(), Some("olena_k"));
    assert_eq!(message.language.as_deref(), Some("uk"));
    assert_eq!(message.reply_to, Some(4));
    assert_eq!(message.text, "/summary");

    assert!(transport.next_batch().await.unwrap().is_empty());
    first.assert_async().await;
    second.assert_async().await;
}

#[tokio::test]
async fn test_send_poll_posts_options() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/bot123:test/sendPoll")
        .match_body(Matcher::Json(json!({
            "chat_id": -100,
            "question": "Pizza?",
            "options": [{ "text": "yes" }, { "text": "no" }]
        })))
        .with_status(200)
        .with_body(r#"{"ok":true,"result":{"message_id":7}}"#)
        .create_async()
        .await;

    transport(&server)
        .send_poll(-100, "Pizza?", &["yes".to_string(), "no".to_string()])
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_is_admin_reads_member_status() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/bot123:test/getChatMember")
        .match_body(Matcher::PartialJson(json!({ "user_id": 1 })))
        .with_status(200)
        .with_body(r#"{"ok":true,"result":{"status":"creator","user":{"id":1}}}"#)
        .create_async()
        .await;
    server
        .mock("POST", "/bot123:test/getChatMember")
        .match_body(Matcher::PartialJson(json!({ "user_id": 2 })))
        .with_status(200)
        .with_body(r#"{"ok":true,"result":{"status":"member","user":{"id":2}}}"#)
        .create_async()
        .await;

    let transport = transport(&server);

    assert!(transport.is_admin(-100, 1).await.unwrap());
    assert!(!transport.is_admin(-100, 2).await.unwrap());
}

#[tokio::test]
async fn test_api_rejection_carries_description() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/bot123:test/sendMessage")
        .with_status(400)
        .with_body(r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#)
        .create_async()
        .await;

    let err = transport(&server).send_text(-1, "hi").await.unwrap_err();

    match err {
        TransportError::Api(description) => assert!(description.contains("chat not found")),
        other => panic!("unexpected error: {other:?}"),
    }
}
