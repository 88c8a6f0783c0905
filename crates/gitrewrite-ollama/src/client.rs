//! Ollama API client.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::traits::ChatApi;
use crate::types::{ApiErrorBody, ChatRequest, ChatResponse, ShowRequest, ShowResponse, TagsResponse};

/// Address used when nothing else is configured.
pub const DEFAULT_HOST: &str = "http://127.0.0.1:11434";

/// Port assumed for hosts given without scheme or port.
pub const DEFAULT_PORT: u16 = 11434;

/// Pick the server address: explicit flag, then `OLLAMA_HOST`, then the
/// config file, then [`DEFAULT_HOST`]. Empty values are skipped.
#[must_use]
pub fn resolve_host(flag: Option<&str>, env: Option<&str>, config: Option<&str>) -> String {
    [flag, env, config]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|h| !h.is_empty())
        .map_or_else(|| DEFAULT_HOST.to_string(), normalize_host)
}

/// Turn a host the way users write it into a base URL.
///
/// A bare host gets `http://` and port 11434; an explicit scheme keeps the
/// scheme's own default port. Trailing slashes are removed.
#[must_use]
pub fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.contains("://") {
        return host.to_string();
    }

    let (authority, path) = host
        .split_once('/')
        .map_or((host, String::new()), |(a, p)| (a, format!("/{p}")));

    let has_port = if authority.starts_with('[') {
        authority.contains("]:")
    } else {
        authority.contains(':')
    };

    if has_port {
        format!("http://{authority}{path}")
    } else {
        format!("http://{authority}:{DEFAULT_PORT}{path}")
    }
}

/// Ollama API client.
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

impl OllamaClient {
    /// Create a client for a server address.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(host: &str) -> Result<Self> {
        let client = Client::builder().user_agent("gitrewrite").build()?;
        Ok(Self {
            client,
            base_url: normalize_host(host),
        })
    }

    /// Create a client, resolving the address from a flag, `OLLAMA_HOST`
    /// and the configured host in that order.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn from_env(flag: Option<&str>, configured: Option<&str>) -> Result<Self> {
        let env = std::env::var("OLLAMA_HOST").ok();
        Self::new(&resolve_host(flag, env.as_deref(), configured))
    }

    /// The base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.client.get(self.endpoint(path)).send().await?;
        Self::decode(response).await
    }

    async fn post<T: DeserializeOwned, B: serde::Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let request = self.client.post(self.endpoint(path)).json(body);
        Self::decode(request.send().await?).await
    }

    /// Parse a success body, or surface Ollama's `{"error": ...}` message.
    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            return Ok(serde_json::from_str(&text)?);
        }

        let message = serde_json::from_str::<ApiErrorBody>(&text)
            .map_or(text, |body| body.error);
        Err(Error::ApiError {
            status: status.as_u16(),
            message,
        })
    }

    /// List the names of locally available models.
    ///
    /// # Errors
    /// Returns error if the server cannot be reached.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let tags: TagsResponse = self.get("/api/tags").await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Check that the server answers.
    ///
    /// # Errors
    /// Returns error if the server cannot be reached.
    pub async fn ping(&self) -> Result<()> {
        self.list_models().await.map(|_| ())
    }

    /// Look up the context window of `model`.
    ///
    /// The size is read from the `model_info` entry whose key ends in
    /// `.context_length`; it may be a number or a numeric string.
    ///
    /// # Errors
    /// Returns `NoContextLength` if no such entry exists, or an API error.
    pub async fn context_length(&self, model: &str) -> Result<usize> {
        let show: ShowResponse = self
            .post("/api/show", &ShowRequest { model, name: model })
            .await?;

        show.model_info
            .unwrap_or_default()
            .iter()
            .filter(|(key, _)| key.ends_with(".context_length"))
            .find_map(|(_, value)| parse_context_length(value))
            .ok_or_else(|| Error::NoContextLength(model.to_string()))
    }

    /// Send a non-streaming chat request and return the reply text.
    ///
    /// # Errors
    /// Returns error if the request fails or the reply cannot be parsed.
    pub async fn chat(&self, request: &ChatRequest) -> Result<String> {
        let response: ChatResponse = self.post("/api/chat", request).await?;
        Ok(response.message.content)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_context_length(value: &Value) -> Option<usize> {
    let size = match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    usize::try_from(size).ok().filter(|&n| n > 0)
}

impl ChatApi for OllamaClient {
    async fn ping(&self) -> Result<()> {
        self.ping().await
    }

    async fn context_length(&self, model: &str) -> Result<usize> {
        self.context_length(model).await
    }

    async fn chat(&self, request: &ChatRequest) -> Result<String> {
        self.chat(request).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::ChatMessage;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> OllamaClient {
        OllamaClient::new(base_url).unwrap()
    }

    // === Host resolution ===

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("localhost"), "http://localhost:11434");
        assert_eq!(normalize_host("gpu-box:8080"), "http://gpu-box:8080");
        assert_eq!(normalize_host("http://gpu-box"), "http://gpu-box");
        assert_eq!(normalize_host("https://ollama.example.com/"), "https://ollama.example.com");
        assert_eq!(normalize_host("[::1]"), "http://[::1]:11434");
        assert_eq!(normalize_host("[::1]:9000"), "http://[::1]:9000");
        assert_eq!(normalize_host("proxy/ollama"), "http://proxy:11434/ollama");
    }

    #[test]
    fn test_resolve_host_precedence() {
        assert_eq!(
            resolve_host(Some("flag-host"), Some("env-host"), Some("config-host")),
            "http://flag-host:11434"
        );
        assert_eq!(
            resolve_host(None, Some("env-host"), Some("config-host")),
            "http://env-host:11434"
        );
        assert_eq!(
            resolve_host(None, Some(" "), Some("config-host")),
            "http://config-host:11434"
        );
        assert_eq!(resolve_host(None, None, None), DEFAULT_HOST);
    }

    // === Requests ===

    #[tokio::test]
    async fn test_ping_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "models": [{ "name": "qwen2.5:14b" }, { "name": "llama3.1:8b" }]
            })))
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server.uri());
        client.ping().await.unwrap();
        assert_eq!(
            client.list_models().await.unwrap(),
            vec!["qwen2.5:14b", "llama3.1:8b"]
        );
    }

    #[tokio::test]
    async fn test_ping_unreachable() {
        let client = test_client("http://127.0.0.1:9");
        assert!(matches!(client.ping().await, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_context_length_number() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/show"))
            .and(body_partial_json(serde_json::json!({ "model": "qwen2.5:14b" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model_info": {
                    "general.architecture": "qwen2",
                    "qwen2.context_length": 32768
                }
            })))
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server.uri());
        assert_eq!(client.context_length("qwen2.5:14b").await.unwrap(), 32768);
    }

    #[tokio::test]
    async fn test_context_length_string() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/show"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model_info": { "llama.context_length": "8192" }
            })))
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server.uri());
        assert_eq!(client.context_length("llama3").await.unwrap(), 8192);
    }

    #[tokio::test]
    async fn test_context_length_missing() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/show"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model_info": { "general.architecture": "qwen2" }
            })))
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server.uri());
        let result = client.context_length("qwen2.5:14b").await;
        assert!(matches!(result, Err(Error::NoContextLength(m)) if m == "qwen2.5:14b"));
    }

    #[tokio::test]
    async fn test_chat_returns_content() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(serde_json::json!({
                "model": "qwen2.5:14b",
                "stream": false,
                "options": { "temperature": 0.1 },
                "format": { "type": "object" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "qwen2.5:14b",
                "message": { "role": "assistant", "content": "{\"commit_id\":\"abc\"}" },
                "done": true
            })))
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server.uri());
        let request = ChatRequest::new(
            "qwen2.5:14b",
            vec![ChatMessage::system("sys"), ChatMessage::user("hi")],
            0.1,
        )
        .with_format(serde_json::json!({ "type": "object" }));

        let reply = client.chat(&request).await.unwrap();
        assert_eq!(reply, "{\"commit_id\":\"abc\"}");
    }

    #[tokio::test]
    async fn test_chat_api_error_uses_error_field() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": "model 'nope' not found"
            })))
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server.uri());
        let request = ChatRequest::new("nope", vec![ChatMessage::user("hi")], 0.1);
        let err = client.chat(&request).await.unwrap_err();

        match err {
            Error::ApiError { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "model 'nope' not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_api_error_plain_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal failure"))
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server.uri());
        let err = client.ping().await.unwrap_err();
        assert!(matches!(err, Error::ApiError { status: 500, message } if message == "internal failure"));
    }

    #[tokio::test]
    async fn test_malformed_success_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server.uri());
        let request = ChatRequest::new("m", vec![ChatMessage::user("hi")], 0.1);
        assert!(matches!(client.chat(&request).await, Err(Error::Parse(_))));
    }
}
