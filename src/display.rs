//! External display surface: a Discord channel whose name shows the live count.

use crate::error::DisplayError;
use async_trait::async_trait;
use reqwest::{header, Client, Response, Url};
use serde::Deserialize;
use serde_json::json;
use std::num::NonZeroU64;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// Default timeout for a single display API call.
pub const DEFAULT_DISPLAY_TIMEOUT: Duration = Duration::from_secs(10);

/// Somewhere the active-count label can be shown.
#[async_trait]
pub trait DisplaySurface: Send + Sync {
    /// Establish (or verify) the connection. Returns a name for logs.
    async fn connect(&self) -> Result<String, DisplayError>;

    /// Label currently shown, if the surface can tell.
    async fn current_label(&self) -> Result<Option<String>, DisplayError>;

    /// Replace the shown label.
    async fn set_label(&self, label: &str) -> Result<(), DisplayError>;
}

#[derive(Deserialize)]
struct CurrentUser {
    username: String,
}

#[derive(Deserialize)]
struct Channel {
    name: Option<String>,
}

/// Discord channel renamed through the REST API with a bot token.
pub struct DiscordChannel {
    client: Client,
    api_base: Url,
    channel_id: NonZeroU64,
}

impl DiscordChannel {
    pub fn new(
        token: &str,
        channel_id: NonZeroU64,
        api_base: Url,
        timeout: Duration,
    ) -> Result<Self, DisplayError> {
        let mut auth = header::HeaderValue::from_str(&format!("Bot {}", token))
            .map_err(|_| DisplayError::InvalidToken)?;
        auth.set_sensitive(true);

        let mut headers = header::HeaderMap::new();
        headers.insert(header::AUTHORIZATION, auth);

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            api_base,
            channel_id,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base.as_str().trim_end_matches('/'), path)
    }

    fn channel_url(&self) -> String {
        self.url(&format!("channels/{}", self.channel_id))
    }
}

fn check(response: Response) -> Result<Response, DisplayError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(DisplayError::Status(status))
    }
}

#[async_trait]
impl DisplaySurface for DiscordChannel {
    async fn connect(&self) -> Result<String, DisplayError> {
        let response = check(self.client.get(self.url("users/@me")).send().await?)?;
        let user: CurrentUser = response
            .json()
            .await
            .map_err(|e| DisplayError::Decode(e.to_string()))?;
        Ok(user.username)
    }

    async fn current_label(&self) -> Result<Option<String>, DisplayError> {
        let response = check(self.client.get(self.channel_url()).send().await?)?;
        let channel: Channel = response
            .json()
            .await
            .map_err(|e| DisplayError::Decode(e.to_string()))?;
        Ok(channel.name)
    }

    async fn set_label(&self, label: &str) -> Result<(), DisplayError> {
        check(
            self.client
                .patch(self.channel_url())
                .json(&json!({ "name": label }))
                .send()
                .await?,
        )?;
        Ok(())
    }
}
