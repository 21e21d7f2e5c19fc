//! Long-poll client.
//!
//! One call to [`BusClient::poll`] is one long poll: it blocks server-side
//! until something arrives on the subscribed channels or the server's
//! timeout elapses, then returns (possibly empty). A consumer loops,
//! feeding the highest received id back as `last`.

use reqwest::Client;
use url::Url;

use super::{ClientError, parse_response};
use crate::objects::bus::{PollItem, PollOptions, PollRequest, TENANT_HEADER, WireChannel};

/// How a client identifies itself to the bus.
#[derive(Debug, Clone)]
pub enum BusAuth {
    /// Authenticated: the server derives the tenant from the token.
    Bearer(String),
    /// Anonymous: the tenant is named explicitly and the server applies
    /// the restricted anonymous context.
    Anonymous { tenant: String },
}

/// Typed HTTP client for the long-poll endpoint.
#[derive(Debug, Clone)]
pub struct BusClient {
    http: Client,
    base_url: Url,
    auth: BusAuth,
}

impl BusClient {
    /// Create a client that authenticates with a bearer token.
    pub fn with_token(base_url: Url, token: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url,
            auth: BusAuth::Bearer(token.into()),
        }
    }

    /// Create an anonymous client for the given tenant.
    pub fn anonymous(base_url: Url, tenant: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url,
            auth: BusAuth::Anonymous {
                tenant: tenant.into(),
            },
        }
    }

    /// Replace the default `reqwest::Client` with a custom one.
    ///
    /// The client's request timeout must exceed the server's poll
    /// timeout or every quiet poll surfaces as a transport error.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `POST /bus/poll` — one long poll.
    pub async fn poll(
        &self,
        channels: Vec<WireChannel>,
        last: i64,
        options: PollOptions,
    ) -> Result<Vec<PollItem>, ClientError> {
        let url = self.base_url.join("/bus/poll")?;

        let mut request = self.http.post(url).json(&PollRequest {
            channels,
            last,
            options,
        });
        request = match &self.auth {
            BusAuth::Bearer(token) => request.bearer_auth(token),
            BusAuth::Anonymous { tenant } => request.header(TENANT_HEADER, tenant),
        };

        parse_response(request.send().await?).await
    }
}
