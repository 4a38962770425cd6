//! Chat Relay
//!
//! Guest-mode chat backend: forwards a conversation to an OpenAI-compatible
//! chat completion endpoint, rotating through a pool of API keys and
//! retrying with the next key when an attempt fails.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod router;

use api::{context_window, guest_messages, CompletionRequest, Message};
use client::HttpClient;
use config::{ConfigLoader, RelayConfig};
use error::{RelayError, Result};
use router::{KeyPool, KeyPoolStats, ModelCatalog};

/// The relay client. Share it behind an `Arc`; all methods take `&self`.
#[derive(Debug)]
pub struct ChatRelay {
    /// Rotation pool
    key_pool: KeyPool,

    /// Advertised models
    models: ModelCatalog,

    /// HTTP client
    http_client: HttpClient,

    temperature: f32,
    max_tokens: u32,

    /// Stored messages sent as context by `reply_to_chat`
    history_limit: usize,
}

impl ChatRelay {
    /// Create a relay from the default config locations and environment
    pub fn new() -> Result<Self> {
        let loader = ConfigLoader::new()?;
        Self::from_config(loader.into_config())
    }

    /// Create a relay with a custom config path
    pub fn with_config_path(path: &str) -> Result<Self> {
        let loader = ConfigLoader::from_path(path)?;
        Self::from_config(loader.into_config())
    }

    /// Create a relay from a config object
    pub fn from_config(config: RelayConfig) -> Result<Self> {
        config.validate()?;

        let key_pool = KeyPool::new(config.resolve_api_keys())?;
        tracing::info!(
            keys = key_pool.len(),
            endpoint = %config.endpoint,
            "Chat relay ready"
        );

        Ok(Self {
            key_pool,
            models: ModelCatalog::new(config.models.clone())?,
            http_client: HttpClient::new(config.endpoint.clone(), config.timeout())?,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            history_limit: config.history_limit,
        })
    }

    /// Send a conversation and return the assistant's reply.
    ///
    /// Makes at most one attempt per key in the pool. Keys rejected with
    /// 401/403 are excluded from rotation; other failures just move on to
    /// the next key. Exhaustion yields [`RelayError::Unavailable`].
    pub async fn send(&self, messages: &[Message], model: Option<&str>) -> Result<String> {
        if messages.is_empty() {
            return Err(RelayError::EmptyConversation);
        }

        let model = self.models.resolve(model);
        if !self.models.contains(model) {
            tracing::debug!(model, "Forwarding unlisted model verbatim");
        }
        let request = CompletionRequest::new(model, messages, self.temperature, self.max_tokens);
        let max_attempts = self.key_pool.len();

        for attempt in 1..=max_attempts {
            let key = self.key_pool.select_key();
            tracing::debug!(
                model,
                attempt,
                max_attempts,
                key_index = key.index(),
                "Sending completion request"
            );

            match self.http_client.post_completion(&request, key.value()).await {
                Ok(content) => return Ok(content),
                Err(err) => {
                    tracing::warn!(
                        model,
                        attempt,
                        key_index = key.index(),
                        error = %err,
                        "Completion attempt failed"
                    );
                    if err.is_authorization() {
                        self.key_pool.mark_failed(key);
                    }
                }
            }
        }

        tracing::error!(model, attempts = max_attempts, "All API keys exhausted");
        Err(RelayError::Unavailable)
    }

    /// Guest chat: prior turns plus a new user message, nothing persisted
    pub async fn guest_chat(
        &self,
        message: &str,
        history: &[Message],
        model: Option<&str>,
    ) -> Result<String> {
        if message.is_empty() {
            return Err(RelayError::EmptyMessage);
        }
        self.send(&guest_messages(history, message), model).await
    }

    /// Reply to a stored chat. `stored` is the chat's messages oldest first,
    /// ending with the new user message; only the most recent
    /// `history_limit` of them are sent.
    pub async fn reply_to_chat(&self, stored: &[Message], model: Option<&str>) -> Result<String> {
        self.send(context_window(stored, self.history_limit), model).await
    }

    /// Advertised model identifiers, default first
    pub fn models(&self) -> &[String] {
        self.models.models()
    }

    /// Model used when the caller does not choose one
    pub fn default_model(&self) -> &str {
        self.models.default_model()
    }

    /// Rotation statistics
    pub fn key_stats(&self) -> KeyPoolStats {
        self.key_pool.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Mock, Server};
    use std::sync::Arc;

    const COMPLETION_PATH: &str = "/v1/chat/completions";

    const HELLO: &str = r#"{
        "id": "chatcmpl-1",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hello"}, "finish_reason": "stop"}]
    }"#;

    fn relay_for(server: &Server, keys: &[&str]) -> ChatRelay {
        let config = RelayConfig {
            endpoint: format!("{}{}", server.url(), COMPLETION_PATH),
            timeout_secs: 5,
            ..RelayConfig::with_keys(keys.iter().map(|k| k.to_string()).collect())
        };
        ChatRelay::from_config(config).unwrap()
    }

    async fn mock_key(
        server: &mut Server,
        key: &str,
        status: usize,
        body: &str,
        hits: usize,
    ) -> Mock {
        server
            .mock("POST", COMPLETION_PATH)
            .match_header("authorization", format!("Bearer {}", key).as_str())
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body)
            .expect(hits)
            .create_async()
            .await
    }

    #[test]
    fn test_from_config_requires_keys() {
        let err = ChatRelay::from_config(RelayConfig::default()).unwrap_err();
        assert!(matches!(err, RelayError::NoKeysConfigured));
    }

    #[test]
    fn test_models_exposed() {
        let relay = ChatRelay::from_config(RelayConfig::with_keys(vec!["k".into()])).unwrap();
        assert_eq!(relay.default_model(), "sonar(clinesp)");
        assert_eq!(relay.models().len(), 4);
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let mut server = Server::new_async().await;
        let k1 = mock_key(&mut server, "k1", 200, HELLO, 1).await;
        let k2 = mock_key(&mut server, "k2", 200, HELLO, 0).await;

        let relay = relay_for(&server, &["k1", "k2"]);
        let reply = relay.send(&[Message::user("hi")], None).await.unwrap();

        assert_eq!(reply, "Hello");
        assert_eq!(relay.key_stats().failed_keys, 0);
        k1.assert_async().await;
        k2.assert_async().await;
    }

    #[tokio::test]
    async fn test_repeated_success_does_not_blacklist() {
        let mut server = Server::new_async().await;
        let _k1 = mock_key(&mut server, "k1", 200, HELLO, 2).await;
        let _k2 = mock_key(&mut server, "k2", 200, HELLO, 2).await;

        let relay = relay_for(&server, &["k1", "k2"]);
        for _ in 0..4 {
            relay.send(&[Message::user("hi")], None).await.unwrap();
            assert_eq!(relay.key_stats().failed_keys, 0);
        }
        assert_eq!(relay.key_stats().total_selections, 4);
    }

    #[tokio::test]
    async fn test_all_unauthorized_exhausts_after_pool_size_attempts() {
        let mut server = Server::new_async().await;
        let mocks = vec![
            mock_key(&mut server, "k1", 401, r#"{"error":"bad key"}"#, 1).await,
            mock_key(&mut server, "k2", 403, r#"{"error":"bad key"}"#, 1).await,
            mock_key(&mut server, "k3", 401, r#"{"error":"bad key"}"#, 1).await,
        ];

        let relay = relay_for(&server, &["k1", "k2", "k3"]);
        let err = relay.send(&[Message::user("hi")], None).await.unwrap_err();

        assert!(matches!(err, RelayError::Unavailable));
        assert!(!err.to_string().contains("bad key"));
        assert_eq!(relay.key_stats().failed_keys, 3);
        assert_eq!(relay.key_stats().total_selections, 3);
        for mock in mocks {
            mock.assert_async().await;
        }
    }

    #[tokio::test]
    async fn test_unauthorized_key_is_skipped_afterwards() {
        let mut server = Server::new_async().await;
        let k1 = mock_key(&mut server, "k1", 401, "{}", 1).await;
        let k2 = mock_key(&mut server, "k2", 200, HELLO, 3).await;

        let relay = relay_for(&server, &["k1", "k2"]);
        for _ in 0..3 {
            let reply = relay.send(&[Message::user("hi")], None).await.unwrap();
            assert_eq!(reply, "Hello");
        }

        assert_eq!(relay.key_stats().failed_keys, 1);
        k1.assert_async().await;
        k2.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_choices_retries_without_blacklisting() {
        let mut server = Server::new_async().await;
        let k1 = mock_key(&mut server, "k1", 200, r#"{"id":"x"}"#, 1).await;
        let k2 = mock_key(&mut server, "k2", 200, HELLO, 1).await;

        let relay = relay_for(&server, &["k1", "k2"]);
        let reply = relay.send(&[Message::user("hi")], None).await.unwrap();

        assert_eq!(reply, "Hello");
        assert_eq!(relay.key_stats().failed_keys, 0);
        k1.assert_async().await;
        k2.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_errors_retry_then_fail() {
        let mut server = Server::new_async().await;
        let k1 = mock_key(&mut server, "k1", 500, "{}", 1).await;
        let k2 = mock_key(&mut server, "k2", 502, "{}", 1).await;

        let relay = relay_for(&server, &["k1", "k2"]);
        let err = relay.send(&[Message::user("hi")], None).await.unwrap_err();

        assert!(matches!(err, RelayError::Unavailable));
        assert_eq!(relay.key_stats().failed_keys, 0);
        k1.assert_async().await;
        k2.assert_async().await;
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_unavailable() {
        let config = RelayConfig {
            endpoint: "http://127.0.0.1:1/v1/chat/completions".to_string(),
            timeout_secs: 2,
            ..RelayConfig::with_keys(vec!["k1".into(), "k2".into()])
        };
        let relay = ChatRelay::from_config(config).unwrap();

        let err = relay.send(&[Message::user("hi")], None).await.unwrap_err();
        assert!(matches!(err, RelayError::Unavailable));
        assert_eq!(relay.key_stats().total_selections, 2);
    }

    #[tokio::test]
    async fn test_model_defaults_and_passes_through() {
        let mut server = Server::new_async().await;
        let default_model = server
            .mock("POST", COMPLETION_PATH)
            .match_body(mockito::Matcher::PartialJson(
                serde_json::json!({"model": "sonar(clinesp)"}),
            ))
            .with_status(200)
            .with_body(HELLO)
            .expect(1)
            .create_async()
            .await;
        let custom_model = server
            .mock("POST", COMPLETION_PATH)
            .match_body(mockito::Matcher::PartialJson(
                serde_json::json!({"model": "not-in-the-list"}),
            ))
            .with_status(200)
            .with_body(HELLO)
            .expect(1)
            .create_async()
            .await;

        let relay = relay_for(&server, &["k1"]);
        relay.send(&[Message::user("hi")], None).await.unwrap();
        relay
            .send(&[Message::user("hi")], Some("not-in-the-list"))
            .await
            .unwrap();

        default_model.assert_async().await;
        custom_model.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_conversation_rejected_before_network() {
        let server = Server::new_async().await;
        let relay = relay_for(&server, &["k1"]);

        let err = relay.send(&[], None).await.unwrap_err();
        assert!(matches!(err, RelayError::EmptyConversation));
        assert_eq!(relay.key_stats().total_selections, 0);
    }

    #[tokio::test]
    async fn test_guest_chat_sends_history_then_message() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", COMPLETION_PATH)
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "messages": [
                    {"role": "user", "content": "hi"},
                    {"role": "assistant", "content": "hello"},
                    {"role": "user", "content": "and now?"}
                ]
            })))
            .with_status(200)
            .with_body(HELLO)
            .expect(1)
            .create_async()
            .await;

        let relay = relay_for(&server, &["k1"]);
        let history = vec![Message::user("hi"), Message::assistant("hello")];
        let reply = relay.guest_chat("and now?", &history, None).await.unwrap();

        assert_eq!(reply, "Hello");
        mock.assert_async().await;

        let err = relay.guest_chat("", &history, None).await.unwrap_err();
        assert!(matches!(err, RelayError::EmptyMessage));
    }

    #[tokio::test]
    async fn test_reply_to_chat_sends_latest_window() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", COMPLETION_PATH)
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "messages": [
                    {"role": "assistant", "content": "3"},
                    {"role": "user", "content": "4"}
                ]
            })))
            .with_status(200)
            .with_body(HELLO)
            .expect(1)
            .create_async()
            .await;

        let config = RelayConfig {
            endpoint: format!("{}{}", server.url(), COMPLETION_PATH),
            history_limit: 2,
            ..RelayConfig::with_keys(vec!["k1".into()])
        };
        let relay = ChatRelay::from_config(config).unwrap();

        let stored: Vec<Message> = (0..5)
            .map(|i| {
                if i % 2 == 0 {
                    Message::user(i.to_string())
                } else {
                    Message::assistant(i.to_string())
                }
            })
            .collect();
        let reply = relay.reply_to_chat(&stored, None).await.unwrap();

        assert_eq!(reply, "Hello");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_concurrent_exhaustion_is_safe() {
        let mut server = Server::new_async().await;
        let _k1 = mock_key(&mut server, "k1", 401, "{}", 16).await;
        let _k2 = mock_key(&mut server, "k2", 401, "{}", 16).await;
        let _k3 = mock_key(&mut server, "k3", 401, "{}", 16).await;

        let relay = Arc::new(relay_for(&server, &["k1", "k2", "k3"]));
        let tasks = (0..16).map(|_| {
            let relay = Arc::clone(&relay);
            tokio::spawn(async move { relay.send(&[Message::user("hi")], None).await })
        });

        for result in futures::future::join_all(tasks).await {
            assert!(matches!(result.unwrap(), Err(RelayError::Unavailable)));
        }

        let stats = relay.key_stats();
        assert_eq!(stats.total_selections, 16 * 3);
        assert!(stats.failed_keys <= 3);
        assert!(stats.cursor < 3);
    }

    #[tokio::test]
    async fn test_timed_out_attempts_retry_without_blacklisting() {
        // Accepts connections and never writes a response
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let silent = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let config = RelayConfig {
            endpoint: format!("http://{}{}", addr, COMPLETION_PATH),
            timeout_secs: 1,
            ..RelayConfig::with_keys(vec!["k1".into(), "k2".into()])
        };
        let relay = ChatRelay::from_config(config).unwrap();

        let err = tokio_test::assert_err!(relay.send(&[Message::user("hi")], None).await);
        assert!(matches!(err, RelayError::Unavailable));

        let stats = relay.key_stats();
        assert_eq!(stats.total_selections, 2);
        assert_eq!(stats.failed_keys, 0);

        silent.abort();
    }
}
