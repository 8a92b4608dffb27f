use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;

use crate::domain::ports::DiscordNotifier;

#[derive(Debug, Serialize)]
struct WebhookPayload {
    content: String,
}

/// Thin reqwest client for the podium-winner Discord webhook.
#[derive(Clone)]
pub struct DiscordClient {
    http: reqwest::Client,
    webhook_url: Option<String>,
}

impl DiscordClient {
    pub fn new(webhook_url: Option<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, webhook_url })
    }
}

#[async_trait]
impl DiscordNotifier for DiscordClient {
    async fn notify_winner(&self, nickname: &str, match_room: &str) {
        let Some(url) = &self.webhook_url else {
            return;
        };
        let payload = WebhookPayload {
            content: format!("{nickname} won a match in room {match_room}"),
        };
        if let Err(err) = self.http.post(url).json(&payload).send().await {
            warn!(error = %err, "discord webhook delivery failed");
        }
    }
}
