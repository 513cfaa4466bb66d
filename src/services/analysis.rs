//! # Mood-analysis relay
//!
//! Turns a week of scores and notes into a counselor-style report by making
//! one chat-completion call to DeepSeek. The API key stays server-side.
//! Every failure comes back as a `{ success: false, error }` envelope with
//! a user-facing message; nothing is retried.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::Validate;

use crate::config::Config;

const SYSTEM_PROMPT: &str = "你是专业的心理咨询师，擅长认知行为疗法(CBT)和共情沟通。";
const EMPTY_NOTES_PLACEHOLDER: &str = "(本周无详细文字记录)";
const TEMPERATURE: f64 = 0.7;
const MAX_TOKENS: u32 = 1000;

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("请提供有效的情绪分数数据 (moodScores)")]
    InvalidScores,

    #[error("服务端配置错误：缺少 API 密钥")]
    MissingApiKey,

    #[error("AI 服务请求失败 ({status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("AI 服务返回数据异常")]
    MalformedResponse,

    #[error("AI 服务响应超时，请稍后重试")]
    NoResponse,

    #[error("系统错误: {0}")]
    Setup(String),
}

impl AnalysisError {
    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidScores => StatusCode::BAD_REQUEST,
            Self::MissingApiKey | Self::Setup(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream { .. } | Self::MalformedResponse => StatusCode::BAD_GATEWAY,
            Self::NoResponse => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl IntoResponse for AnalysisError {
    fn into_response(self) -> Response {
        (self.status(), Json(AnalysisEnvelope::failure(&self))).into_response()
    }
}

/// Wire envelope for both outcomes of the relay.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct AnalysisEnvelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl AnalysisEnvelope {
    pub fn failure(error: &AnalysisError) -> Self {
        Self {
            success: false,
            report: None,
            error: Some(error.to_string()),
            timestamp: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub report: String,
    pub timestamp: i64,
}

impl From<AnalysisReport> for AnalysisEnvelope {
    fn from(report: AnalysisReport) -> Self {
        Self {
            success: true,
            report: Some(report.report),
            error: None,
            timestamp: Some(report.timestamp),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeMoodRequest {
    #[validate(length(min = 1))]
    pub mood_scores: Vec<f64>,
    #[serde(default)]
    pub notes: Option<Value>,
}

impl AnalyzeMoodRequest {
    /// Accepts any JSON; anything without a non-empty numeric `moodScores`
    /// array is rejected.
    pub fn parse(raw: Value) -> Result<Self, AnalysisError> {
        let request: Self = serde_json::from_value(raw).map_err(|_| AnalysisError::InvalidScores)?;
        request.validate().map_err(|_| AnalysisError::InvalidScores)?;
        Ok(request)
    }

    /// Notes as display strings, or the placeholder when there are none.
    pub fn notes_or_placeholder(&self) -> Vec<String> {
        match &self.notes {
            Some(Value::Array(items)) if !items.is_empty() => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            _ => vec![EMPTY_NOTES_PLACEHOLDER.to_string()],
        }
    }
}

pub fn build_prompt(scores: &[f64], notes: &[String]) -> String {
    let scores = scores
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let notes = notes.join("; ");

    format!(
        r#"
你是一位温暖、包容且专业的心理咨询师。请根据以下用户本周的情绪数据和日记，生成一份简明扼要的情绪周报（约300字）。

【数据概览】
- 情绪分数趋势（0-100分，分数越高代表心情越好）：{scores}
- 用户日记关键词/片段：{notes}

【生成要求】
1. **共情与接纳**：用温暖的语调开场，肯定用户记录情绪的努力。
2. **趋势分析**：观察分数的波动，结合日记内容尝试分析可能的影响因素（如果日记内容较少，则更多基于分数趋势进行通用解读）。
3. **实用建议**：给出1-2条简单易行的心理调节或生活建议。
4. **结语**：给予一句充满希望的鼓励。
5. 格式清晰，分段输出，不要使用Markdown标题语法（#），直接使用文本段落。
"#
    )
}

/// Upstream error bodies are echoed as compact JSON; non-JSON bodies are
/// quoted.
fn render_upstream_body(body: String) -> String {
    match serde_json::from_str::<Value>(&body) {
        Ok(value) => value.to_string(),
        Err(_) => Value::String(body).to_string(),
    }
}

#[derive(Clone)]
pub struct AnalysisClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl AnalysisClient {
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AnalysisError::Setup(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, AnalysisError> {
        Self::new(
            &config.deepseek_base_url,
            config.deepseek_model.clone(),
            config.deepseek_api_key.clone(),
            Duration::from_secs(config.analysis_timeout_secs),
        )
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn analyze(&self, raw: Value) -> Result<AnalysisReport, AnalysisError> {
        let request = AnalyzeMoodRequest::parse(raw).map_err(|e| {
            tracing::warn!("Analysis rejected: invalid moodScores");
            e
        })?;
        let notes = request.notes_or_placeholder();

        let Some(api_key) = self.api_key.as_deref() else {
            tracing::error!("Analysis unavailable: DEEPSEEK_API_KEY is not set");
            return Err(AnalysisError::MissingApiKey);
        };

        let prompt = build_prompt(&request.mood_scores, &notes);
        let url = format!("{}/chat/completions", self.base_url);

        tracing::info!(scores = request.mood_scores.len(), notes = notes.len(), "Calling DeepSeek");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&json!({
                "model": self.model,
                "messages": [
                    { "role": "system", "content": SYSTEM_PROMPT },
                    { "role": "user", "content": prompt }
                ],
                "temperature": TEMPERATURE,
                "max_tokens": MAX_TOKENS,
                "stream": false
            }))
            .send()
            .await
            .map_err(|e| {
                if e.is_builder() {
                    tracing::error!(error = %e, "DeepSeek request setup failed");
                    AnalysisError::Setup(e.to_string())
                } else {
                    tracing::error!(error = %e, "DeepSeek gave no response");
                    AnalysisError::NoResponse
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %body, "DeepSeek returned an error status");
            return Err(AnalysisError::Upstream {
                status: status.as_u16(),
                body: render_upstream_body(body),
            });
        }

        let payload: Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                AnalysisError::NoResponse
            } else {
                tracing::error!(error = %e, "DeepSeek response was not JSON");
                AnalysisError::MalformedResponse
            }
        })?;

        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                tracing::error!(payload = %payload, "DeepSeek returned an unexpected structure");
                AnalysisError::MalformedResponse
            })?;

        tracing::info!("DeepSeek analysis succeeded");
        Ok(AnalysisReport {
            report: content.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, key: Option<&str>) -> AnalysisClient {
        AnalysisClient::new(
            &server.uri(),
            "deepseek-chat",
            key.map(str::to_string),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn completion(content: &str) -> Value {
        json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] })
    }

    #[tokio::test]
    async fn test_success_returns_report() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({
                "model": "deepseek-chat",
                "temperature": 0.7,
                "max_tokens": 1000,
                "stream": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("本周整体平稳")))
            .expect(1)
            .mount(&server)
            .await;

        let report = client(&server, Some("test-key"))
            .analyze(json!({ "moodScores": [80, 65, 72], "notes": ["考试通过"] }))
            .await
            .unwrap();
        assert_eq!(report.report, "本周整体平稳");
        assert!(report.timestamp > 0);
    }

    #[tokio::test]
    async fn test_invalid_scores_never_call_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("x")))
            .expect(0)
            .mount(&server)
            .await;
        let client = client(&server, Some("test-key"));

        for body in [
            json!({}),
            json!({ "moodScores": [] }),
            json!({ "moodScores": "80" }),
            json!({ "moodScores": ["high"] }),
            Value::Null,
        ] {
            let err = client.analyze(body).await.unwrap_err();
            assert_eq!(err.to_string(), "请提供有效的情绪分数数据 (moodScores)");
        }
    }

    #[tokio::test]
    async fn test_missing_key() {
        let server = MockServer::start().await;
        let err = client(&server, None)
            .analyze(json!({ "moodScores": [50] }))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::MissingApiKey));
        assert_eq!(err.to_string(), "服务端配置错误：缺少 API 密钥");
    }

    #[tokio::test]
    async fn test_upstream_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "bad key" })))
            .mount(&server)
            .await;

        let err = client(&server, Some("wrong"))
            .analyze(json!({ "moodScores": [50] }))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), r#"AI 服务请求失败 (401): {"error":"bad key"}"#);
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_unexpected_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let err = client(&server, Some("k"))
            .analyze(json!({ "moodScores": [50] }))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "AI 服务返回数据异常");
    }

    #[tokio::test]
    async fn test_timeout_maps_to_no_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion("late"))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = AnalysisClient::new(
            &server.uri(),
            "deepseek-chat",
            Some("k".into()),
            Duration::from_millis(50),
        )
        .unwrap();
        let err = client.analyze(json!({ "moodScores": [50] })).await.unwrap_err();
        assert_eq!(err.to_string(), "AI 服务响应超时，请稍后重试");
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn test_unbuildable_request_is_setup_error() {
        let client = AnalysisClient::new(
            "not a url",
            "deepseek-chat",
            Some("k".into()),
            Duration::from_secs(5),
        )
        .unwrap();
        let err = client.analyze(json!({ "moodScores": [50] })).await.unwrap_err();
        assert!(matches!(err, AnalysisError::Setup(_)));
        assert!(err.to_string().starts_with("系统错误: "));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_refused_connection_maps_to_no_response() {
        // Nothing listens on the discard port
        let client = AnalysisClient::new(
            "http://127.0.0.1:9",
            "deepseek-chat",
            Some("k".into()),
            Duration::from_secs(5),
        )
        .unwrap();
        let err = client.analyze(json!({ "moodScores": [50] })).await.unwrap_err();
        assert!(matches!(err, AnalysisError::NoResponse));
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_notes_placeholder() {
        let request = AnalyzeMoodRequest::parse(json!({ "moodScores": [1], "notes": [] })).unwrap();
        assert_eq!(request.notes_or_placeholder(), vec!["(本周无详细文字记录)"]);

        let request = AnalyzeMoodRequest::parse(json!({ "moodScores": [1], "notes": "x" })).unwrap();
        assert_eq!(request.notes_or_placeholder(), vec!["(本周无详细文字记录)"]);

        let request = AnalyzeMoodRequest::parse(json!({ "moodScores": [1], "notes": ["a", "b"] })).unwrap();
        assert_eq!(request.notes_or_placeholder(), vec!["a", "b"]);
    }

    #[test]
    fn test_prompt_embeds_scores_and_notes() {
        let prompt = build_prompt(&[80.0, 72.5], &["a".into(), "b".into()]);
        assert!(prompt.contains("：80, 72.5\n"));
        assert!(prompt.contains("：a; b\n"));
    }

    #[test]
    fn test_render_upstream_body() {
        assert_eq!(render_upstream_body(r#"{ "a" : 1 }"#.into()), r#"{"a":1}"#);
        assert_eq!(render_upstream_body("oops".into()), r#""oops""#);
    }

    #[test]
    fn test_failure_envelope_shape() {
        let body = serde_json::to_value(AnalysisEnvelope::failure(&AnalysisError::MalformedResponse)).unwrap();
        assert_eq!(body, json!({ "success": false, "error": "AI 服务返回数据异常" }));
    }
}
