//! Telegram notifications

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use types::errors::DataError;

use super::http::fetch_json;

pub const DEFAULT_TELEGRAM_URL: &str = "https://api.telegram.org";

/// Sink for messages meant for a human.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, text: &str) -> Result<(), DataError>;
}

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Bot API client sending to a single chat.
#[derive(Debug, Clone)]
pub struct Telegram {
    http: Client,
    base: String,
    token: String,
    chat_id: String,
}

impl Telegram {
    pub fn new(
        http: Client,
        base: impl Into<String>,
        token: impl Into<String>,
        chat_id: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base: base.into().trim_end_matches('/').to_string(),
            token: token.into(),
            chat_id: chat_id.into(),
        }
    }
}

#[async_trait]
impl Notifier for Telegram {
    async fn notify(&self, text: &str) -> Result<(), DataError> {
        let url = format!("{}/bot{}/sendMessage", self.base, self.token);
        let body = json!({ "chat_id": self.chat_id, "text": text });

        let response: SendMessageResponse = fetch_json(self.http.post(&url).json(&body)).await?;
        if !response.ok {
            return Err(DataError::Gateway(format!(
                "telegram rejected message: {}",
                response.description.unwrap_or_default()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_send_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .and(body_json(json!({"chat_id": "42", "text": "usd broken"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": {}})))
            .expect(1)
            .mount(&server)
            .await;

        let telegram = Telegram::new(Client::new(), server.uri(), "TOKEN", "42");
        telegram.notify("usd broken").await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"ok": false, "description": "chat not found"})),
            )
            .mount(&server)
            .await;

        let telegram = Telegram::new(Client::new(), server.uri(), "TOKEN", "42");
        let err = telegram.notify("text").await.unwrap_err();
        assert!(err.to_string().contains("chat not found"));
    }
}
