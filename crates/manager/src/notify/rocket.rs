//! Rocket.Chat incoming-webhook notifier.

use async_trait::async_trait;
use serde::Serialize;
use tracing::trace;

use super::{Delivery, Notifier};
use crate::errors::CollaboratorError;

#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    text: &'a str,
    channel: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    alias: Option<&'a str>,
}

/// Posts each message to an incoming webhook; the destination is the
/// channel (`#ops`) or user (`@alice`).
#[derive(Debug, Clone)]
pub struct RocketNotifier {
    name: String,
    webhook_url: String,
    username: Option<String>,
    client: reqwest::Client,
}

impl RocketNotifier {
    pub fn new(
        name: impl Into<String>,
        webhook_url: impl Into<String>,
        username: Option<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            name: name.into(),
            webhook_url: webhook_url.into(),
            username,
            client,
        }
    }
}

#[async_trait]
impl Notifier for RocketNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send_message(
        &self,
        text: &str,
        destination: &str,
    ) -> Result<Delivery, CollaboratorError> {
        let body = WebhookMessage {
            text,
            channel: destination,
            alias: self.username.as_deref(),
        };

        trace!(notifier = %self.name, channel = %destination, "Posting webhook message");

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(format!("webhook returned HTTP {}: {}", status, detail.trim()).into());
        }

        Ok(Delivery::new("Rocket message sent"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_posts_text_and_channel() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks/token"))
            .and(body_json(serde_json::json!({
                "text": "[www.example.com] New certificate upload;",
                "channel": "#ops",
                "alias": "certkeeper",
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = RocketNotifier::new(
            "rocket",
            format!("{}/hooks/token", server.uri()),
            Some("certkeeper".to_string()),
            reqwest::Client::new(),
        );

        let delivery = notifier
            .send_message("[www.example.com] New certificate upload;", "#ops")
            .await
            .unwrap();
        assert_eq!(delivery.as_str(), "Rocket message sent");
    }

    #[tokio::test]
    async fn test_http_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let notifier =
            RocketNotifier::new("rocket", server.uri(), None, reqwest::Client::new());

        let err = notifier.send_message("hello", "#ops").await.unwrap_err();
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("boom"));
    }
}
