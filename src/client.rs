use std::time::{Duration, Instant};

use reqwest::{Client as ReqwestClient, Method, RequestBuilder, header};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::observability::{
    TRANSPORT_REQUEST_DURATION, TRANSPORT_REQUEST_ERRORS, TRANSPORT_REQUESTS,
};
use crate::types::{
    Chat, ListResponse, Message, SendMessageRequest, SendMessageResponse, SendResult,
};

/// Header through which Beeper Desktop advertises its version.
pub const DESKTOP_VERSION_HEADER: &str = "x-beeper-desktop-version";

/// Ports probed by [`discover`], in order.
pub const DISCOVERY_PORTS: [u16; 3] = [39867, 39868, 39869];

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(2);

/// A decoded payload together with the desktop version advertised on its response.
///
/// The version travels with each result instead of living on the client, so one client can be
/// shared freely between concurrent calls.  Failed calls carry it on the error instead; see
/// [`Error::desktop_version`].
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse<T> {
    /// The decoded response body.
    pub payload: T,
    /// Value of the `X-Beeper-Desktop-Version` header, when present.
    pub desktop_version: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Discards the version and returns the payload.
    pub fn into_payload(self) -> T {
        self.payload
    }

    /// Transforms the payload, keeping the version.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        ApiResponse {
            payload: f(self.payload),
            desktop_version: self.desktop_version,
        }
    }
}

/// Client for the Beeper Desktop API.
#[derive(Debug, Clone)]
pub struct BeeperClient {
    client: ReqwestClient,
    base_url: Url,
    auth_token: Option<String>,
    timeout: Duration,
}

impl BeeperClient {
    /// Create a client for the effective configuration.
    ///
    /// A missing token is not an error here; the API answers 401 and the call fails with an
    /// `auth` error.
    pub fn new(config: &Config, auth_token: Option<String>) -> Result<Self> {
        Self::with_options(&config.api_url, auth_token, None)
    }

    /// Create a client with custom settings.
    pub fn with_options(
        base_url: &str,
        auth_token: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            Error::config(format!("invalid API URL {base_url:?}: {e}")).with_source(e)
        })?;
        if base_url.cannot_be_a_base() {
            return Err(Error::config(format!(
                "invalid API URL {:?}: not a base URL",
                base_url.as_str()
            )));
        }

        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                Error::config(format!("failed to build HTTP client: {e}")).with_source(e)
            })?;

        Ok(Self {
            client,
            base_url,
            auth_token: auth_token.filter(|t| !t.is_empty()),
            timeout,
        })
    }

    /// The base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Returns true if a bearer token will be sent.
    pub fn has_auth_token(&self) -> bool {
        self.auth_token.is_some()
    }

    /// The per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Builds an endpoint URL from percent-encoded path segments.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header(header::ACCEPT, "application/json");
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Sends a request and returns the raw body of a 2xx response.
    async fn execute(
        &self,
        builder: RequestBuilder,
        operation: &'static str,
    ) -> Result<ApiResponse<String>> {
        TRANSPORT_REQUESTS.click();
        let start = Instant::now();
        let result = self.execute_inner(builder, operation).await;
        TRANSPORT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());
        if let Err(err) = &result {
            TRANSPORT_REQUEST_ERRORS.click();
            debug!(operation, category = %err.category(), "request failed: {err}");
        }
        result
    }

    async fn execute_inner(
        &self,
        builder: RequestBuilder,
        operation: &'static str,
    ) -> Result<ApiResponse<String>> {
        let response = builder.send().await.map_err(|e| {
            if e.is_builder() {
                Error::config(format!("failed to create request: {e}"))
                    .with_operation(operation)
                    .with_source(e)
            } else {
                Error::from_network_failure(e, Some(operation))
            }
        })?;

        let status = response.status();
        let desktop_version = response
            .headers()
            .get(DESKTOP_VERSION_HEADER)
            .and_then(|val| val.to_str().ok())
            .filter(|val| !val.is_empty())
            .map(String::from);
        debug!(operation, status = status.as_u16(), ?desktop_version, "response received");

        let body = response.text().await.map_err(|e| {
            Error::network(format!("failed to read response body: {e}"))
                .with_operation(operation)
                .with_source(e)
        })?;

        if !status.is_success() {
            let err = Error::from_status(status.as_u16(), &body, Some(operation));
            return Err(match desktop_version {
                Some(version) => err.with_desktop_version(version),
                None => err,
            });
        }

        Ok(ApiResponse {
            payload: body,
            desktop_version,
        })
    }

    /// Decodes a 2xx body; undecodable output is the server's fault.
    fn decode<T: DeserializeOwned>(
        raw: ApiResponse<String>,
        what: &str,
        operation: &'static str,
    ) -> Result<ApiResponse<T>> {
        let payload = serde_json::from_str::<T>(&raw.payload).map_err(|e| {
            warn!(operation, "undecodable {what} in API response");
            Error::server(format!("failed to unmarshal {what}: {e}"))
                .with_operation(operation)
                .with_source(e)
        })?;
        Ok(ApiResponse {
            payload,
            desktop_version: raw.desktop_version,
        })
    }

    /// Checks that the API is reachable.
    pub async fn ping(&self) -> Result<ApiResponse<()>> {
        let url = self.endpoint(&["health"]);
        let raw = self.execute(self.request(Method::GET, url), "ping").await?;
        Ok(raw.map(|_| ()))
    }

    /// Lists all chats.
    pub async fn list_chats(&self) -> Result<ApiResponse<Vec<Chat>>> {
        let url = self.endpoint(&["v1", "chats"]);
        let raw = self
            .execute(self.request(Method::GET, url), "list_chats")
            .await?;
        let resp = Self::decode::<ListResponse<Chat>>(raw, "chats", "list_chats")?;
        Ok(resp.map(|list| list.items))
    }

    /// Fetches one chat by ID.
    pub async fn get_chat(&self, chat_id: &str) -> Result<ApiResponse<Chat>> {
        require("chat ID", chat_id, "get_chat")?;
        let url = self.endpoint(&["v1", "chats", chat_id]);
        let raw = self
            .execute(self.request(Method::GET, url), "get_chat")
            .await?;
        Self::decode(raw, "chat", "get_chat")
    }

    /// Lists up to `limit` messages of a chat.
    pub async fn list_messages(
        &self,
        chat_id: &str,
        limit: u32,
    ) -> Result<ApiResponse<Vec<Message>>> {
        require("chat ID", chat_id, "list_messages")?;
        let mut url = self.endpoint(&["v1", "chats", chat_id, "messages"]);
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string());
        let raw = self
            .execute(self.request(Method::GET, url), "list_messages")
            .await?;
        let resp = Self::decode::<ListResponse<Message>>(raw, "messages", "list_messages")?;
        Ok(resp.map(|list| list.items))
    }

    /// Sends a text message to a chat.
    ///
    /// Both the chat ID and the text must be non-empty; this is checked before any request is
    /// made.
    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<ApiResponse<SendResult>> {
        require("chat ID", chat_id, "send_message")?;
        require("message text", text, "send_message")?;
        let url = self.endpoint(&["v1", "chats", chat_id, "messages"]);
        let builder = self
            .request(Method::POST, url)
            .json(&SendMessageRequest { text });
        let raw = self.execute(builder, "send_message").await?;
        let resp = Self::decode::<SendMessageResponse>(raw, "response", "send_message")?;
        Ok(resp.map(SendResult::from))
    }

    /// Searches messages across all chats.
    pub async fn search_messages(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<ApiResponse<Vec<Message>>> {
        require("search query", query, "search_messages")?;
        let mut url = self.endpoint(&["v1", "messages", "search"]);
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("limit", &limit.to_string());
        let raw = self
            .execute(self.request(Method::GET, url), "search_messages")
            .await?;
        let resp = Self::decode::<ListResponse<Message>>(raw, "messages", "search_messages")?;
        Ok(resp.map(|list| list.items))
    }
}

fn require(what: &str, value: &str, operation: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(format!("{what} is required")).with_operation(operation));
    }
    Ok(())
}

/// The candidate URLs probed by [`discover`].
pub fn discovery_candidates() -> Vec<String> {
    DISCOVERY_PORTS
        .iter()
        .map(|port| format!("http://localhost:{port}"))
        .collect()
}

/// Returns the first candidate URL whose health check succeeds.
pub async fn discover<I>(candidates: I) -> Result<String>
where
    I: IntoIterator<Item = String>,
{
    for url in candidates {
        let client = match BeeperClient::with_options(&url, None, Some(DISCOVERY_TIMEOUT)) {
            Ok(client) => client,
            Err(err) => {
                debug!(%url, "skipping discovery candidate: {err}");
                continue;
            }
        };
        match client.ping().await {
            Ok(_) => return Ok(url),
            Err(err) => debug!(%url, "discovery candidate unreachable: {err}"),
        }
    }
    Err(Error::network("could not auto-discover Beeper Desktop API").with_operation("discover"))
}
