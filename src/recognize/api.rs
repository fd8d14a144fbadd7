//! `ApiRecognizer`: sends the region image to an OpenAI-compatible
//! `/v1/chat/completions` endpoint and returns the transcribed text.
//!
//! All connection details come from [`ApiConfig`]; nothing is hardcoded.

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use tokio_util::sync::CancellationToken;

use super::{RecognizeError, Recognizer, ScreenGrabber};
use crate::config::ApiConfig;
use crate::select::Region;

/// Upper bound on the reply length requested from the model.
const MAX_TOKENS: u32 = 2_048;

/// Calls a vision-capable chat-completions endpoint.
///
/// Works with OpenAI, Ollama (OpenAI mode), LM Studio, vLLM and anything
/// else that accepts `image_url` content parts with data URLs.
pub struct ApiRecognizer {
    client: reqwest::Client,
    config: ApiConfig,
    grabber: Arc<dyn ScreenGrabber>,
}

impl ApiRecognizer {
    /// No client-side timeout is configured: the session deadline bounds the
    /// call and the cancellation token aborts it.
    pub fn new(config: &ApiConfig, grabber: Arc<dyn ScreenGrabber>) -> Self {
        Self {
            client: reqwest::Client::new(),
            config: config.clone(),
            grabber,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn request_body(&self, png: &[u8]) -> serde_json::Value {
        let data_url = format!(
            "data:image/png;base64,{}",
            general_purpose::STANDARD.encode(png)
        );

        serde_json::json!({
            "model": self.config.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": self.config.prompt },
                    { "type": "image_url", "image_url": { "url": data_url } }
                ]
            }],
            "stream": false,
            "temperature": self.config.temperature,
            "max_tokens": MAX_TOKENS
        })
    }

    async fn call(&self, png: &[u8]) -> Result<String, RecognizeError> {
        let mut req = self.client.post(self.endpoint()).json(&self.request_body(png));

        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?.error_for_status()?;
        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RecognizeError::Parse(e.to_string()))?;

        extract_text(&json)
    }
}

/// Pull `choices[0].message.content` out of a chat-completions reply.
fn extract_text(json: &serde_json::Value) -> Result<String, RecognizeError> {
    let content = &json["choices"][0]["message"]["content"];
    if content.is_null() {
        return Err(RecognizeError::Parse(
            "response has no choices[0].message.content".into(),
        ));
    }

    let text = content
        .as_str()
        .ok_or_else(|| RecognizeError::Parse("message content is not a string".into()))?
        .trim()
        .to_string();

    if text.is_empty() {
        return Err(RecognizeError::EmptyResponse);
    }
    Ok(text)
}

#[async_trait]
impl Recognizer for ApiRecognizer {
    async fn recognize(
        &self,
        cancel: CancellationToken,
        region: Region,
    ) -> Result<String, RecognizeError> {
        let png = self.grabber.grab(&cancel, &region).await?;

        tokio::select! {
            result = self.call(&png) => {
                if let Ok(text) = &result {
                    log::debug!("recognize: {} chars from {region}", text.chars().count());
                }
                result
            }
            _ = cancel.cancelled() => Err(RecognizeError::Cancelled),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct StaticGrabber;

    #[async_trait]
    impl ScreenGrabber for StaticGrabber {
        async fn grab(
            &self,
            _cancel: &CancellationToken,
            _region: &Region,
        ) -> Result<Vec<u8>, RecognizeError> {
            Ok(vec![0x89, b'P', b'N', b'G'])
        }
    }

    fn recognizer(base_url: &str) -> ApiRecognizer {
        let config = ApiConfig {
            base_url: base_url.into(),
            ..ApiConfig::default()
        };
        ApiRecognizer::new(&config, Arc::new(StaticGrabber))
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        assert_eq!(
            recognizer("http://localhost:11434/").endpoint(),
            "http://localhost:11434/v1/chat/completions"
        );
    }

    #[test]
    fn body_carries_image_as_data_url() {
        let body = recognizer("http://x").request_body(b"abc");
        let parts = &body["messages"][0]["content"];

        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[1]["type"], "image_url");
        assert_eq!(parts[1]["image_url"]["url"], "data:image/png;base64,YWJj");
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn extract_trims_content() {
        let reply = json!({ "choices": [{ "message": { "content": "  Hello\nWorld \n" } }] });
        assert_eq!(extract_text(&reply).unwrap(), "Hello\nWorld");
    }

    #[test]
    fn extract_blank_is_empty_response() {
        let reply = json!({ "choices": [{ "message": { "content": "   " } }] });
        assert!(matches!(
            extract_text(&reply),
            Err(RecognizeError::EmptyResponse)
        ));
    }

    #[test]
    fn extract_missing_is_parse_error() {
        assert!(matches!(
            extract_text(&json!({ "error": "nope" })),
            Err(RecognizeError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn cancelled_token_aborts_call() {
        // Nothing listens on port 9 (discard); cancellation must win anyway.
        let rec = recognizer("http://127.0.0.1:9");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = rec
            .recognize(cancel, Region::new(0, 0, 4, 4).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RecognizeError::Cancelled | RecognizeError::Request(_)
        ));
    }
}
