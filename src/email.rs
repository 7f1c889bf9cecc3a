use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error};

/// Outcome of a send attempt. Email is fire-and-forget: callers branch on
/// `success` but nothing upstream fails because a message didn't go out.
#[derive(Debug, Clone, Copy)]
pub struct EmailSendResult {
    pub success: bool,
}

#[derive(Serialize)]
struct TransactionalPayload<'a> {
    #[serde(rename = "transactionalId")]
    transactional_id: &'a str,
    email: &'a str,
    #[serde(rename = "dataVariables")]
    data_variables: Value,
}

#[derive(Serialize)]
struct ContactPayload<'a> {
    email: &'a str,
    source: &'a str,
}

#[derive(Clone)]
pub struct LoopsClient {
    api_key: String,
    http: Client,
}

impl LoopsClient {
    pub fn new(api_key: String) -> Self {
        LoopsClient {
            api_key,
            http: Client::new(),
        }
    }

    pub async fn send_transactional(
        &self,
        transactional_id: &str,
        email: &str,
        data_variables: Value,
    ) -> EmailSendResult {
        let payload = TransactionalPayload {
            transactional_id,
            email,
            data_variables,
        };

        let response = self
            .http
            .post("https://app.loops.so/api/v1/transactional")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                debug!(transactional_id, email, "Transactional email sent");
                EmailSendResult { success: true }
            }
            Ok(response) => {
                error!(
                    transactional_id,
                    status = %response.status(),
                    "Loops rejected transactional email"
                );
                EmailSendResult { success: false }
            }
            Err(e) => {
                error!(transactional_id, "Failed to reach Loops: {:?}", e);
                EmailSendResult { success: false }
            }
        }
    }

    pub async fn create_contact(&self, email: &str, source: &str) -> EmailSendResult {
        let payload = ContactPayload { email, source };

        let response = self
            .http
            .post("https://app.loops.so/api/v1/contacts/create")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await;

        match response {
            Ok(response) => {
                debug!(email, status = %response.status(), "Loops contact response");
                EmailSendResult {
                    success: response.status().is_success(),
                }
            }
            Err(e) => {
                error!("Failed to send contact to Loops: {:?}", e);
                EmailSendResult { success: false }
            }
        }
    }
}
