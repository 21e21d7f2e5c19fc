//! Admin publish client.
//!
//! All requests carry the admin secret in the `X-Admin-Secret` header.

use reqwest::Client;
use url::Url;

use super::{ClientError, parse_response};
use crate::objects::admin::{ADMIN_SECRET_HEADER, SendEntry, SendRequest, SendResponse};

/// Typed HTTP client for the pollbus **admin API**.
#[derive(Debug, Clone)]
pub struct AdminClient {
    http: Client,
    base_url: Url,
    admin_secret: String,
}

impl AdminClient {
    /// Create a new `AdminClient`.
    ///
    /// * `base_url` – root URL of the pollbus server.
    /// * `admin_secret` – the shared admin secret.
    pub fn new(base_url: Url, admin_secret: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url,
            admin_secret: admin_secret.into(),
        }
    }

    /// Replace the default `reqwest::Client` with a custom one.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `POST /admin/send` – publish a batch of notifications.
    pub async fn send(&self, notifications: Vec<SendEntry>) -> Result<SendResponse, ClientError> {
        let url = self.base_url.join("/admin/send")?;

        let resp = self
            .http
            .post(url)
            .header(ADMIN_SECRET_HEADER, &self.admin_secret)
            .json(&SendRequest { notifications })
            .send()
            .await?;

        parse_response(resp).await
    }
}
