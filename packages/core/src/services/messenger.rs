//! HTTP client for the messaging gateway.
//!
//! The gateway is a thin capability: POST a phone number and a message body,
//! get a success/failure back. `MessengerClient` implements
//! [`NotificationGateway`] by rendering the templated text and swallowing
//! transport errors into a `false` result — queue state never depends on
//! delivery.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::error::AppError;
use crate::notify::{templates, NotificationGateway};

#[derive(Clone)]
pub struct MessengerClient {
    base_url: String,
    http: Client,
}

impl MessengerClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            http: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(&self, phone: &str, body: &str) -> Result<(), AppError> {
        let url = format!("{}/messages", self.base_url);

        let response = self
            .http
            .post(&url)
            .json(&OutboundMessage { to: phone, body })
            .send()
            .await
            .map_err(|err| AppError::Network(err.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::Network(format!(
                "Messaging gateway returned HTTP {}",
                response.status()
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct OutboundMessage<'a> {
    to: &'a str,
    body: &'a str,
}

#[async_trait]
impl NotificationGateway for MessengerClient {
    async fn notify_waiting(
        &self,
        phone: &str,
        client_name: &str,
        equipment_type: &str,
        ahead_count: i64,
    ) -> bool {
        let body = templates::waiting_message(client_name, equipment_type, ahead_count);
        match self.send(phone, &body).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("Waiting notification to {} failed: {}", phone, err);
                false
            }
        }
    }

    async fn notify_opened(
        &self,
        phone: &str,
        client_name: &str,
        equipment_description: &str,
    ) -> bool {
        let body = templates::opened_message(client_name, equipment_description);
        match self.send(phone, &body).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("Opened notification to {} failed: {}", phone, err);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json_string, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn notify_waiting_returns_true_on_200() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = MessengerClient::new(server.uri());
        assert!(client.notify_waiting("+34600123456", "Ada", "laptop", 2).await);
    }

    #[tokio::test]
    async fn notify_opened_returns_false_on_500() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = MessengerClient::new(server.uri());
        assert!(
            !client
                .notify_opened("+34600123456", "Ada", "laptop (broken hinge)")
                .await
        );
    }

    #[tokio::test]
    async fn send_posts_rendered_template_body() {
        let server = MockServer::start().await;
        let expected = serde_json::json!({
            "to": "+34600123456",
            "body": templates::waiting_message("Ada", "laptop", 0),
        });
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(body_json_string(expected.to_string()))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = MessengerClient::new(server.uri());
        assert!(client.notify_waiting("+34600123456", "Ada", "laptop", 0).await);
    }
}
