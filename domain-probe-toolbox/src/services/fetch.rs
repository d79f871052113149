//! HTTP transport shared by the HTTP-based probes.
//!
//! The redirect tracer, the header grader, the DoH probe and the website
//! status probe all go through [`HttpFetcher`]. Transport failures come back
//! as a [`FetchError`] whose [`NetworkErrorKind`] is derived from the error
//! chain, never from the message text.

use std::error::Error as _;
use std::fmt;
use std::io;

use async_trait::async_trait;
use reqwest::{Client, Method, redirect::Policy};
use tokio::time::{Duration, timeout};

use crate::error::{ToolboxError, ToolboxResult};
use crate::types::{HttpHeader, NetworkErrorKind};

const USER_AGENT: &str = concat!("domain-probe/", env!("CARGO_PKG_VERSION"));

/// Redirects followed when a request opts into following.
const FOLLOW_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMethod {
    Get,
    Head,
}

/// One HTTP request.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: FetchMethod,
    pub url: String,
    pub headers: Vec<HttpHeader>,
    pub follow_redirects: bool,
    pub timeout: Duration,
    /// Read the response body as text.
    pub read_body: bool,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method: FetchMethod::Get,
            url: url.into(),
            headers: Vec::new(),
            follow_redirects: false,
            timeout,
            read_body: false,
        }
    }

    pub fn head(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method: FetchMethod::Head,
            ..Self::get(url, timeout)
        }
    }

    #[must_use]
    pub fn following_redirects(mut self) -> Self {
        self.follow_redirects = true;
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push(HttpHeader {
            name: name.to_string(),
            value: value.to_string(),
        });
        self
    }

    #[must_use]
    pub fn with_body(mut self) -> Self {
        self.read_body = true;
        self
    }
}

/// Response of one HTTP request.
#[derive(Debug, Clone, Default)]
pub struct FetchedResponse {
    pub status: u16,
    /// Response headers, lower-case names, in wire order.
    pub headers: Vec<HttpHeader>,
    /// URL of the response after any followed redirects.
    pub final_url: String,
    pub body: Option<String>,
}

impl FetchedResponse {
    /// First value of a header, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    pub fn location(&self) -> Option<&str> {
        self.header("location")
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }
}

/// Transport failure of one HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: NetworkErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: NetworkErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl std::error::Error for FetchError {}

/// Sends HTTP requests for the probes.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchedResponse, FetchError>;
}

/// Run `fetch` under the request's own deadline.
///
/// The deadline also covers fetchers that do not enforce it themselves.
pub(crate) async fn fetch_with_timeout(
    fetcher: &dyn HttpFetcher,
    request: FetchRequest,
) -> Result<FetchedResponse, FetchError> {
    let limit = request.timeout;
    timeout(limit, fetcher.fetch(request))
        .await
        .unwrap_or_else(|_| {
            Err(FetchError::new(
                NetworkErrorKind::Timeout,
                format!("Request timed out after {}s", limit.as_secs()),
            ))
        })
}

/// [`HttpFetcher`] backed by reqwest with rustls.
pub struct ReqwestFetcher {
    manual: Client,
    following: Client,
}

impl ReqwestFetcher {
    pub fn new() -> ToolboxResult<Self> {
        let build = |policy: Policy| {
            Client::builder()
                .user_agent(USER_AGENT)
                .redirect(policy)
                .build()
                .map_err(|e| {
                    ToolboxError::NetworkError(format!("Failed to build HTTP client: {e}"))
                })
        };
        Ok(Self {
            manual: build(Policy::none())?,
            following: build(Policy::limited(FOLLOW_LIMIT))?,
        })
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchedResponse, FetchError> {
        let client = if request.follow_redirects {
            &self.following
        } else {
            &self.manual
        };
        let method = match request.method {
            FetchMethod::Get => Method::GET,
            FetchMethod::Head => Method::HEAD,
        };

        let mut builder = client
            .request(method, &request.url)
            .timeout(request.timeout);
        for header in &request.headers {
            builder = builder.header(header.name.as_str(), header.value.as_str());
        }

        let response = builder.send().await.map_err(|e| fetch_error(&e))?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| HttpHeader {
                name: name.as_str().to_string(),
                value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
            })
            .collect();

        let body = if request.read_body {
            Some(response.text().await.map_err(|e| fetch_error(&e))?)
        } else {
            None
        };

        log::trace!("[HTTP] {} {} -> {status}", request.url, final_url);

        Ok(FetchedResponse {
            status,
            headers,
            final_url,
            body,
        })
    }
}

fn fetch_error(err: &reqwest::Error) -> FetchError {
    FetchError::new(classify_reqwest_error(err), root_message(err))
}

/// Innermost error message, which names the actual failure.
fn root_message(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message = cause.to_string();
        source = cause.source();
    }
    message
}

/// Categorize a reqwest error by walking its source chain.
pub(crate) fn classify_reqwest_error(err: &reqwest::Error) -> NetworkErrorKind {
    if err.is_timeout() {
        return NetworkErrorKind::Timeout;
    }

    let mut source = err.source();
    while let Some(cause) = source {
        if cause.downcast_ref::<rustls::Error>().is_some() {
            return NetworkErrorKind::Ssl;
        }
        if let Some(io_err) = cause.downcast_ref::<io::Error>()
            && let Some(kind) = classify_io_error(io_err)
        {
            return kind;
        }
        source = cause.source();
    }

    NetworkErrorKind::Unknown
}

/// Categorize an I/O error, looking through the wrapper tokio-rustls uses
/// for handshake failures.
pub(crate) fn classify_io_error(err: &io::Error) -> Option<NetworkErrorKind> {
    if let Some(inner) = err.get_ref()
        && inner.downcast_ref::<rustls::Error>().is_some()
    {
        return Some(NetworkErrorKind::Ssl);
    }
    match err.kind() {
        io::ErrorKind::ConnectionRefused => Some(NetworkErrorKind::ConnectionRefused),
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof => Some(NetworkErrorKind::ConnectionReset),
        io::ErrorKind::TimedOut => Some(NetworkErrorKind::Timeout),
        _ => None,
    }
}
