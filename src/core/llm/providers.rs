use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::classifier::{ChangeClassification, ChangeClassifier, ClassificationRequest};
use super::prompt::PromptBuilder;
use crate::config::Config;
use crate::error::{RegdiffError, Result};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11435";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";

/// Factory function to create the appropriate classifier based on config
pub fn create_classifier(config: &Config) -> Result<Box<dyn ChangeClassifier>> {
    let llm = &config.llm;
    if !llm.enabled {
        return Err(RegdiffError::Config("LLM integration is disabled".to_string()));
    }

    let prompts = PromptBuilder::new(config.analysis.max_content_chars)?;
    match llm.provider.as_str() {
        "ollama" => Ok(Box::new(OllamaProvider::new(config, prompts)?)),
        "openai" => Ok(Box::new(OpenAiProvider::new(config, prompts)?)),
        _ => Err(RegdiffError::Config(format!(
            "Unsupported LLM provider: {}",
            llm.provider
        ))),
    }
}

fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| RegdiffError::Config(format!("Failed to build HTTP client: {}", e)))
}

fn base_url(configured: Option<&str>, fallback: &str) -> String {
    configured.unwrap_or(fallback).trim_end_matches('/').to_string()
}

/// Parse the JSON object the model was asked to produce
pub fn parse_classification(raw: &str) -> Result<ChangeClassification> {
    serde_json::from_str(raw.trim())
        .map_err(|e| RegdiffError::MalformedResponse(format!("Invalid JSON response from LLM: {}", e)))
}

async fn send_json(request: reqwest::RequestBuilder, provider: &str) -> Result<Value> {
    let response = request
        .send()
        .await
        .map_err(|e| RegdiffError::BackendUnavailable(format!("{} request failed: {}", provider, e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        return Err(RegdiffError::BackendUnavailable(format!(
            "{} error {}: {}",
            provider, status, error_text
        )));
    }

    response
        .json()
        .await
        .map_err(|e| RegdiffError::MalformedResponse(format!("Failed to parse {} response: {}", provider, e)))
}

/// Local Ollama server
pub struct OllamaProvider {
    base_url: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
    prompts: PromptBuilder,
}

impl OllamaProvider {
    pub fn new(config: &Config, prompts: PromptBuilder) -> Result<Self> {
        Ok(Self {
            base_url: base_url(config.llm.base_url.as_deref(), DEFAULT_OLLAMA_URL),
            model: config.llm.model.clone(),
            temperature: config.llm.temperature.unwrap_or(0.1),
            client: build_client(config.llm.timeout_secs)?,
            prompts,
        })
    }
}

/// Model names from an `/api/tags` body
pub fn parse_ollama_models(body: &Value) -> Result<Vec<String>> {
    let models = body["models"]
        .as_array()
        .ok_or_else(|| RegdiffError::MalformedResponse("Ollama tag list has no 'models' array".to_string()))?;

    Ok(models
        .iter()
        .map(|m| {
            m.get("name")
                .or_else(|| m.get("model"))
                .and_then(Value::as_str)
                .unwrap_or("unnamed")
                .to_string()
        })
        .collect())
}

/// Classification from an `/api/generate` body, whose `response` holds the model's JSON
pub fn parse_ollama_generate(body: &Value) -> Result<ChangeClassification> {
    let raw = body["response"]
        .as_str()
        .ok_or_else(|| RegdiffError::MalformedResponse("Ollama response has no 'response' field".to_string()))?;
    parse_classification(raw)
}

#[async_trait]
impl ChangeClassifier for OllamaProvider {
    async fn classify(&self, request: ClassificationRequest) -> Result<ChangeClassification> {
        let prompt = self.prompts.build(&request)?;

        let payload = json!({
            "model": self.model,
            "prompt": prompt,
            "format": "json",
            "stream": false,
            "options": { "temperature": self.temperature }
        });

        debug!("Sending {} change to Ollama ({})", request.kind, self.model);
        let body = send_json(
            self.client.post(format!("{}/api/generate", self.base_url)).json(&payload),
            "Ollama",
        )
        .await?;
        debug!("Received response from Ollama");

        parse_ollama_generate(&body)
    }

    fn provider_name(&self) -> &str {
        "Ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let body = send_json(self.client.get(format!("{}/api/tags", self.base_url)), "Ollama").await?;
        parse_ollama_models(&body)
    }
}

/// OpenAI-compatible chat completions endpoint
pub struct OpenAiProvider {
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    client: reqwest::Client,
    prompts: PromptBuilder,
}

impl OpenAiProvider {
    pub fn new(config: &Config, prompts: PromptBuilder) -> Result<Self> {
        let api_key = config
            .llm
            .api_key
            .clone()
            .ok_or_else(|| RegdiffError::Config("API key required for OpenAI provider".to_string()))?;

        Ok(Self {
            base_url: base_url(config.llm.base_url.as_deref(), DEFAULT_OPENAI_URL),
            api_key,
            model: config.llm.model.clone(),
            temperature: config.llm.temperature.unwrap_or(0.1),
            max_tokens: config.llm.max_tokens,
            client: build_client(config.llm.timeout_secs)?,
            prompts,
        })
    }
}

/// Model ids from a `/v1/models` body
pub fn parse_openai_models(body: &Value) -> Result<Vec<String>> {
    let data = body["data"]
        .as_array()
        .ok_or_else(|| RegdiffError::MalformedResponse("Model list has no 'data' array".to_string()))?;

    Ok(data
        .iter()
        .filter_map(|m| m["id"].as_str())
        .map(str::to_string)
        .collect())
}

/// Classification from a chat completions body
pub fn parse_openai_chat(body: &Value) -> Result<ChangeClassification> {
    let content = body["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| RegdiffError::MalformedResponse("Failed to extract content from OpenAI response".to_string()))?;
    parse_classification(content)
}

#[async_trait]
impl ChangeClassifier for OpenAiProvider {
    async fn classify(&self, request: ClassificationRequest) -> Result<ChangeClassification> {
        let prompt = self.prompts.build(&request)?;

        let mut payload = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": "You are a regulatory affairs analyst. Answer only with the requested JSON object."
                },
                {
                    "role": "user",
                    "content": prompt
                }
            ],
            "response_format": { "type": "json_object" },
            "temperature": self.temperature
        });
        if let Some(max_tokens) = self.max_tokens {
            payload["max_tokens"] = json!(max_tokens);
        }

        debug!("Sending {} change to OpenAI ({})", request.kind, self.model);
        let body = send_json(
            self.client
                .post(format!("{}/v1/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&payload),
            "OpenAI",
        )
        .await?;

        parse_openai_chat(&body)
    }

    fn provider_name(&self) -> &str {
        "OpenAI"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let body = send_json(
            self.client
                .get(format!("{}/v1/models", self.base_url))
                .bearer_auth(&self.api_key),
            "OpenAI",
        )
        .await?;
        parse_openai_models(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::llm::ChangeKind;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response on localhost and return its base URL
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            // Drain the whole request so closing the socket does not reset it
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);
                if let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&request[..end]).to_lowercase();
                    let body_len = head
                        .lines()
                        .find_map(|line| line.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= end + 4 + body_len {
                        break;
                    }
                }
            }

            let response = format!(
                "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });

        format!("http://{}", addr)
    }

    fn ollama_at(base_url: String) -> Box<dyn ChangeClassifier> {
        let mut config = Config::default();
        config.llm.base_url = Some(base_url);
        config.llm.timeout_secs = 5;
        create_classifier(&config).unwrap()
    }

    fn added(content: &str) -> ClassificationRequest {
        ClassificationRequest { kind: ChangeKind::Added, content: content.to_string() }
    }

    #[test]
    fn test_factory_respects_enabled_flag() {
        let mut config = Config::default();
        config.llm.enabled = false;
        assert!(matches!(create_classifier(&config), Err(RegdiffError::Config(_))));
    }

    #[test]
    fn test_factory_rejects_unknown_provider() {
        let mut config = Config::default();
        config.llm.provider = "carrier-pigeon".to_string();
        assert!(matches!(create_classifier(&config), Err(RegdiffError::Config(_))));
    }

    #[test]
    fn test_factory_builds_ollama() {
        let classifier = create_classifier(&Config::default()).unwrap();
        assert_eq!(classifier.provider_name(), "Ollama");
        assert_eq!(classifier.model_name(), "mistral");
    }

    #[test]
    fn test_openai_requires_key() {
        let mut config = Config::default();
        config.llm.provider = "openai".to_string();
        assert!(create_classifier(&config).is_err());

        config.llm.api_key = Some("sk-test".to_string());
        assert_eq!(create_classifier(&config).unwrap().provider_name(), "OpenAI");
    }

    #[test]
    fn test_parse_classification() {
        let ok = parse_classification(
            "\n{\"change_summary\":\"Clarifies scope.\",\"change_type\":\"Clarification\",\"potential_impact\":\"None.\"}\n",
        )
        .unwrap();
        assert_eq!(ok.change_type, "Clarification");

        let err = parse_classification("Sure! Here is the JSON you asked for").unwrap_err();
        assert!(matches!(err, RegdiffError::MalformedResponse(_)));
    }

    #[test]
    fn test_parse_ollama_models_falls_back() {
        let body = json!({
            "models": [
                { "name": "mistral:latest" },
                { "model": "llama3:8b" },
                { "size": 1 }
            ]
        });
        assert_eq!(
            parse_ollama_models(&body).unwrap(),
            vec!["mistral:latest", "llama3:8b", "unnamed"]
        );
        assert!(parse_ollama_models(&json!({})).is_err());
    }

    #[test]
    fn test_parse_openai_models() {
        let body = json!({ "data": [ { "id": "gpt-4o-mini" }, { "id": "gpt-4o" } ] });
        assert_eq!(parse_openai_models(&body).unwrap(), vec!["gpt-4o-mini", "gpt-4o"]);
    }

    #[test]
    fn test_parse_ollama_generate() {
        let body = json!({
            "model": "mistral",
            "response": "{\"change_type\":\"New Requirement\",\"change_summary\":\"Adds limits.\"}",
            "done": true
        });
        let parsed = parse_ollama_generate(&body).unwrap();
        assert_eq!(parsed.change_type, "New Requirement");
        assert_eq!(parsed.change_summary.as_deref(), Some("Adds limits."));

        let missing = parse_ollama_generate(&json!({ "done": true })).unwrap_err();
        assert!(matches!(missing, RegdiffError::MalformedResponse(_)));
    }

    #[test]
    fn test_parse_openai_chat() {
        let body = json!({
            "choices": [ { "message": { "role": "assistant", "content": "{\"change_type\":\"Removal\"}" } } ]
        });
        assert_eq!(parse_openai_chat(&body).unwrap().change_type, "Removal");
        assert!(matches!(
            parse_openai_chat(&json!({ "choices": [] })),
            Err(RegdiffError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_server_error_is_backend_unavailable() {
        let url = serve_once("HTTP/1.1 500 Internal Server Error", "{\"error\":\"model crashed\"}").await;
        let err = ollama_at(url).classify(added("2. Limits\nText B")).await.unwrap_err();
        assert!(matches!(err, RegdiffError::BackendUnavailable(msg) if msg.contains("500")));
    }

    #[tokio::test]
    async fn test_non_json_body_is_malformed() {
        let url = serve_once("HTTP/1.1 200 OK", "<html>not json</html>").await;
        let err = ollama_at(url).list_models().await.unwrap_err();
        assert!(matches!(err, RegdiffError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_generate_without_classification_is_malformed() {
        let url = serve_once("HTTP/1.1 200 OK", "{\"response\":\"I think this is a clarification.\",\"done\":true}").await;
        let err = ollama_at(url).classify(added("2. Limits\nText B")).await.unwrap_err();
        assert!(matches!(err, RegdiffError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_reported() {
        let mut config = Config::default();
        // Port 9 (discard) on localhost is not an Ollama server
        config.llm.base_url = Some("http://127.0.0.1:9".to_string());
        config.llm.timeout_secs = 2;
        let classifier = create_classifier(&config).unwrap();

        let err = classifier.list_models().await.unwrap_err();
        assert!(matches!(err, RegdiffError::BackendUnavailable(_)));
    }
}
