//! Outbound messaging sink.
//!
//! Webhook auto-replies and dispatch alerts end here. Delivery is
//! fire-and-forget from the caller's point of view: the core's job ends at
//! producing the ranked list and the formatted text. When no provider is
//! configured, messages go to the log instead — useful locally and in
//! tests.

use std::time::Duration;

use reqwest::Client;
use serde_json::json;
use tracing::{info, warn};

use crate::error::{Result, RozgarError};

/// Ceiling on a single provider call so a slow messaging backend cannot pin
/// a webhook handler past the channel's retry window.
const SEND_TIMEOUT_SECS: u64 = 10;

/// Where outbound texts go.
pub enum MessageSink {
    /// POST to a messaging provider (Cloud-API style: `{to, text: {body}}`).
    Http {
        client: Client,
        url: String,
        access_token: String,
    },
    /// No provider configured: log the message and carry on.
    Log,
}

impl MessageSink {
    /// Build a sink from optional provider settings.
    pub fn from_config(url: Option<String>, access_token: Option<String>) -> Result<Self> {
        match (url, access_token) {
            (Some(url), Some(access_token)) => {
                let client = Client::builder()
                    .timeout(Duration::from_secs(SEND_TIMEOUT_SECS))
                    .build()
                    .map_err(RozgarError::Network)?;
                Ok(Self::Http {
                    client,
                    url,
                    access_token,
                })
            }
            (Some(_), None) | (None, Some(_)) => {
                warn!("messaging provider partially configured; falling back to log sink");
                Ok(Self::Log)
            }
            (None, None) => Ok(Self::Log),
        }
    }

    /// Send a text message to a phone number.
    pub async fn send_text(&self, to: &str, body: &str) -> Result<()> {
        match self {
            Self::Http {
                client,
                url,
                access_token,
            } => {
                let response = client
                    .post(url)
                    .bearer_auth(access_token)
                    .json(&json!({
                        "messaging_product": "whatsapp",
                        "to": to,
                        "text": { "body": body },
                    }))
                    .send()
                    .await
                    .map_err(RozgarError::Network)?;

                if !response.status().is_success() {
                    warn!(to, status = %response.status(), "messaging provider rejected send");
                }
                Ok(())
            }
            Self::Log => {
                info!(to, body, "outbound message (log sink)");
                Ok(())
            }
        }
    }
}

/// Render the alert text sent to a worker ranked by job dispatch.
pub fn format_dispatch_alert(job: &crate::db::queries::Job, distance_m: f64) -> String {
    format!(
        "New job near you: {} ({}m away)\nRs {}/day | {}\nCall {} to accept.",
        job.title,
        distance_m.round() as i64,
        job.salary_per_day,
        job.employer_name,
        job.phone,
    )
}
