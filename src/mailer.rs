//! Verification mail delivery.
//!
//! Outbound mail goes through an HTTP relay: the webhook variant POSTs a
//! JSON document to the configured endpoint, the log variant just records
//! the link (development and tests). Delivery is best-effort — a failed
//! send is logged, never surfaced to the registering user.

use serde_json::json;

#[derive(Clone)]
pub enum Mailer {
    Webhook {
        client: reqwest::Client,
        endpoint: String,
    },
    Log,
}

impl Mailer {
    pub fn from_config(webhook_url: Option<String>) -> Self {
        match webhook_url {
            Some(endpoint) if !endpoint.is_empty() => Self::Webhook {
                client: reqwest::Client::new(),
                endpoint,
            },
            _ => Self::Log,
        }
    }

    pub async fn send_verification(&self, email: &str, username: &str, verify_url: &str) {
        match self {
            Self::Webhook { client, endpoint } => {
                let body = json!({
                    "to": email,
                    "subject": "Email Verification for Task App",
                    "body": format!(
                        "Hi {username},\n\nClick the link to verify your email:\n\n{verify_url}\n"
                    ),
                });
                match client.post(endpoint).json(&body).send().await {
                    Ok(resp) if resp.status().is_success() => {
                        tracing::info!(email, "Verification mail sent");
                    }
                    Ok(resp) => {
                        tracing::warn!(email, status = %resp.status(), "Mail relay rejected verification mail");
                    }
                    Err(err) => {
                        tracing::warn!(email, error = %err, "Failed to send verification mail");
                    }
                }
            }
            Self::Log => {
                tracing::info!(email, verify_url, "Verification mail (log delivery)");
            }
        }
    }
}
