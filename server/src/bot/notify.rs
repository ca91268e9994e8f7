//! Outbound Group Messages
//!
//! Posts messages through the OneBot HTTP API. Used for events that have no
//! inbound request to attach a quick reply to, such as member-leave notices.

use std::time::Duration;

use serde::Serialize;
use tracing::warn;

#[derive(Debug, Serialize)]
struct SendGroupMsg<'a> {
    group_id: i64,
    message: &'a str,
}

/// OneBot HTTP API client for group messages.
#[derive(Debug, Clone)]
pub struct GroupNotifier {
    client: reqwest::Client,
    api_url: String,
    access_token: Option<String>,
}

impl GroupNotifier {
    pub fn new(
        api_url: &str,
        access_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            access_token,
        })
    }

    /// Post `message` to `group_id`.
    pub async fn send_group_msg(&self, group_id: i64, message: &str) -> Result<(), reqwest::Error> {
        let mut request = self
            .client
            .post(format!("{}/send_group_msg", self.api_url))
            .json(&SendGroupMsg { group_id, message });

        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if let Err(e) = response.error_for_status_ref() {
            warn!(group_id, error = %e, "OneBot API rejected group message");
            return Err(e);
        }
        Ok(())
    }
}
