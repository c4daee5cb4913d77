//! Streaming API client.
//!
//! Each call to [`Client::start`] opens one HTTP connection, decodes the
//! response body as a sequence of JSON objects and hands every decoded
//! [`Status`] to the callback inline, in arrival order. The future resolves
//! once the server closes the stream or an error occurs. There is no
//! reconnect; callers that want one loop around `start` themselves.

use std::fmt::Display;
use std::time::Duration;

use futures_util::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};
use url::form_urlencoded;
use url::Url;

use crate::decode::JsonStreamDecoder;
use crate::error::{summarize_error_body, StreamError, ERROR_BODY_SNIPPET_LEN};
use crate::status::Status;

/// Production host for the streaming API.
pub const STREAM_BASE_URL: &str = "http://stream.twitter.com";
/// API version prefix placed before every endpoint.
pub const API_VERSION: &str = "1";
/// Endpoint shared by `track` and `follow`.
pub const FILTER_ENDPOINT: &str = "statuses/filter";
pub const SAMPLE_ENDPOINT: &str = "statuses/sample";
pub const FIREHOSE_ENDPOINT: &str = "statuses/firehose";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ClientDefaults;

impl ClientDefaults {
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    /// Upper bound on reading the body of a rejected stream request.
    pub const ERROR_BODY_TIMEOUT: Duration = Duration::from_secs(2);
    pub const USER_AGENT: &'static str = concat!("tweetstream/", env!("CARGO_PKG_VERSION"));
}

/// Transport settings applied to every stream request.
///
/// No read timeout is applied: a stream stays open for as long as the server
/// keeps it open.
#[derive(Clone, Debug)]
pub struct ClientOptions {
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout: ClientDefaults::CONNECT_TIMEOUT,
            user_agent: ClientDefaults::USER_AGENT.to_string(),
        }
    }
}

/// Ordered query parameters.
///
/// Pairs serialize in insertion order. Inserting a key that is already present
/// replaces its value in place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.pairs.push((key, value)),
        }
    }

    /// Builder form of [`QueryParams::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for QueryParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for QueryParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

/// Streaming API client holding HTTP Basic credentials.
#[derive(Clone)]
pub struct Client {
    username: String,
    password: SecretString,
    options: ClientOptions,
    base_url: String,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("options", &self.options)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Client {
    /// Creates a client for the production stream host.
    ///
    /// Credentials are stored verbatim and only checked by the server once a
    /// stream is opened.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::with_options(username, password, ClientOptions::default())
    }

    pub fn with_options(
        username: impl Into<String>,
        password: impl Into<String>,
        options: ClientOptions,
    ) -> Self {
        Self {
            username: username.into(),
            password: SecretString::new(password.into()),
            options,
            base_url: STREAM_BASE_URL.to_string(),
        }
    }

    /// Points the client at another scheme, host and port.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.base_url = base_url.trim_end().trim_end_matches('/').to_string();
        self
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Streams statuses matching any of `keywords`.
    pub async fn track<I, S, F>(&self, keywords: I, on_status: F) -> Result<(), StreamError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: FnMut(Status),
    {
        self.start(FILTER_ENDPOINT, track_params(keywords), on_status)
            .await
    }

    /// Streams statuses posted by, or replying to, any of the user `ids`.
    pub async fn follow<I, T, F>(&self, ids: I, on_status: F) -> Result<(), StreamError>
    where
        I: IntoIterator<Item = T>,
        T: Display,
        F: FnMut(Status),
    {
        self.start(FILTER_ENDPOINT, follow_params(ids), on_status)
            .await
    }

    /// Streams a random sample of all public statuses.
    pub async fn sample<F>(&self, on_status: F) -> Result<(), StreamError>
    where
        F: FnMut(Status),
    {
        self.start(SAMPLE_ENDPOINT, QueryParams::new(), on_status)
            .await
    }

    /// Streams all public statuses. Requires elevated access on the account.
    pub async fn firehose<F>(&self, on_status: F) -> Result<(), StreamError>
    where
        F: FnMut(Status),
    {
        self.start(FIREHOSE_ENDPOINT, QueryParams::new(), on_status)
            .await
    }

    /// Opens a stream on `endpoint` and invokes `on_status` once per message.
    ///
    /// Returns `Ok(())` when the server closes the stream cleanly. Messages
    /// delivered before an error stay delivered.
    pub async fn start<P, F>(
        &self,
        endpoint: &str,
        params: P,
        mut on_status: F,
    ) -> Result<(), StreamError>
    where
        P: Into<QueryParams>,
        F: FnMut(Status),
    {
        let params = params.into();
        let uri = self.build_uri(endpoint, Some(&params))?;
        let target = strip_credentials(&uri);

        let http = reqwest::Client::builder()
            .connect_timeout(self.options.connect_timeout)
            .user_agent(self.options.user_agent.as_str())
            .build()?;

        info!(event = "stream_connecting", url = %target);
        let response = http
            .get(target.clone())
            .basic_auth(&self.username, Some(self.password.expose_secret()))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = read_error_snippet(response).await;
            warn!(event = "stream_rejected", url = %target, status = status.as_u16());
            return Err(StreamError::HttpStatus {
                status,
                body: summarize_error_body(&body),
            });
        }
        info!(event = "stream_connected", url = %target);

        let mut body = response.bytes_stream();
        let mut decoder = JsonStreamDecoder::new();
        let mut delivered: u64 = 0;

        while let Some(chunk) = body.next().await {
            decoder.push(&chunk?);
            while let Some(value) = decoder.next_value().map_err(decode_failed)? {
                let status = Status::from_value(value).map_err(decode_failed)?;
                delivered += 1;
                debug!(event = "stream_status", id = ?status.id, delivered);
                on_status(status);
            }
        }
        decoder.finish().map_err(decode_failed)?;

        info!(event = "stream_closed", url = %target, delivered);
        Ok(())
    }

    /// Builds the authenticated request URI for `endpoint`.
    ///
    /// The endpoint is placed in the path as given, so `statuses/filter`
    /// becomes `/1/statuses/filter.json`.
    pub fn build_uri(
        &self,
        endpoint: &str,
        params: Option<&QueryParams>,
    ) -> Result<Url, StreamError> {
        let query = build_query_parameters(params);
        let mut uri = Url::parse(&format!(
            "{}/{API_VERSION}/{endpoint}.json{query}",
            self.base_url
        ))?;

        uri.set_username(&self.username)
            .map_err(|()| StreamError::InvalidCredentials)?;
        uri.set_password(Some(self.password.expose_secret()))
            .map_err(|()| StreamError::InvalidCredentials)?;
        Ok(uri)
    }
}

/// Serializes `params` as a query string including the leading `?`.
///
/// Returns an empty string when there is nothing to send. Keys and values are
/// form-encoded, so a space becomes `+`.
pub fn build_query_parameters(params: Option<&QueryParams>) -> String {
    let Some(params) = params.filter(|params| !params.is_empty()) else {
        return String::new();
    };

    let pairs = params
        .iter()
        .map(|(key, value)| format!("{}={}", form_escape(key), form_escape(value)))
        .collect::<Vec<_>>();
    format!("?{}", pairs.join("&"))
}

fn form_escape(input: &str) -> String {
    form_urlencoded::byte_serialize(input.as_bytes()).collect()
}

fn track_params<I, S>(keywords: I) -> QueryParams
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined = keywords
        .into_iter()
        .map(|keyword| keyword.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(",");
    QueryParams::new().with("track", joined)
}

fn follow_params<I, T>(ids: I) -> QueryParams
where
    I: IntoIterator<Item = T>,
    T: Display,
{
    let joined = ids
        .into_iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",");
    QueryParams::new().with("follow", joined)
}

/// Reads the start of an error body.
///
/// Rejected streams may keep the connection open, so the read stops after
/// `ERROR_BODY_SNIPPET_LEN` bytes, at end of body, on a read error, or when
/// `ClientDefaults::ERROR_BODY_TIMEOUT` elapses.
async fn read_error_snippet(response: reqwest::Response) -> String {
    let mut body = response.bytes_stream();
    let mut snippet = Vec::new();

    let read = async {
        while snippet.len() < ERROR_BODY_SNIPPET_LEN {
            match body.next().await {
                Some(Ok(chunk)) => snippet.extend_from_slice(&chunk),
                Some(Err(_)) | None => break,
            }
        }
    };
    if tokio::time::timeout(ClientDefaults::ERROR_BODY_TIMEOUT, read)
        .await
        .is_err()
    {
        debug!(event = "error_body_read_timed_out", bytes = snippet.len());
    }

    String::from_utf8_lossy(&snippet).into_owned()
}

fn strip_credentials(uri: &Url) -> Url {
    let mut target = uri.clone();
    // Only fails for URLs without a host, which `build_uri` never returns.
    let _ = target.set_username("");
    let _ = target.set_password(None);
    target
}

fn decode_failed(err: serde_json::Error) -> StreamError {
    warn!(event = "stream_decode_failed", error = %err);
    StreamError::Decode(err)
}
