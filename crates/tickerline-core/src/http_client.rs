use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const REDACTED: &str = "REDACTED";
const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Authentication strategy applied to outgoing HTTP requests.
#[derive(Clone, PartialEq, Eq)]
pub enum HttpAuth {
    None,
    Header { name: String, value: String },
}

impl HttpAuth {
    pub fn apply(&self, headers: &mut BTreeMap<String, String>) {
        match self {
            Self::None => {}
            Self::Header { name, value } => {
                headers.insert(name.to_ascii_lowercase(), value.clone());
            }
        }
    }
}

impl std::fmt::Debug for HttpAuth {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Header { name, .. } => f
                .debug_struct("Header")
                .field("name", name)
                .field("value", &REDACTED)
                .finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct QueryParam {
    name: String,
    value: String,
    secret: bool,
}

/// GET request envelope used by adapter transport calls.
#[derive(Clone, PartialEq, Eq)]
pub struct HttpRequest {
    base_url: String,
    query: Vec<QueryParam>,
    pub headers: BTreeMap<String, String>,
    pub timeout_ms: u64,
}

impl std::fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRequest")
            .field("url", &self.redacted_url())
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            base_url: url.into(),
            query: Vec::new(),
            headers: BTreeMap::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push(QueryParam {
            name: name.into(),
            value: value.into(),
            secret: false,
        });
        self
    }

    /// Adds a query parameter whose value never appears in [`redacted_url`](Self::redacted_url).
    pub fn with_secret_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push(QueryParam {
            name: name.into(),
            value: value.into(),
            secret: true,
        });
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_auth(mut self, auth: &HttpAuth) -> Self {
        auth.apply(&mut self.headers);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// URL sent on the wire, with every query value percent-encoded.
    pub fn url(&self) -> String {
        self.render(false)
    }

    /// URL safe for logs and error messages.
    pub fn redacted_url(&self) -> String {
        self.render(true)
    }

    fn render(&self, redact: bool) -> String {
        if self.query.is_empty() {
            return self.base_url.clone();
        }

        let query = self
            .query
            .iter()
            .map(|param| {
                let value = if redact && param.secret {
                    REDACTED.to_owned()
                } else {
                    urlencoding::encode(&param.value).into_owned()
                };
                format!("{}={value}", urlencoding::encode(&param.name))
            })
            .collect::<Vec<_>>()
            .join("&");

        let separator = if self.base_url.contains('?') { '&' } else { '?' };
        format!("{}{separator}{query}", self.base_url)
    }
}

/// HTTP response envelope returned by an adapter transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok_json(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Transport-level HTTP error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    message: String,
}

impl HttpError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for HttpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HttpError {}

/// Boxed future returned by [`HttpClient::execute`].
pub type HttpFuture<'a> = Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>>;

/// Adapter transport contract that supports async execution and auth-aware requests.
pub trait HttpClient: Send + Sync {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a>;
}

/// Production HTTP client using reqwest for real API calls.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Arc<reqwest::Client>,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self {
            client: Arc::new(
                reqwest::Client::builder()
                    .user_agent(concat!("tickerline/", env!("CARGO_PKG_VERSION")))
                    // Yahoo answers the first chart call with a session cookie
                    // it expects on later calls.
                    .cookie_store(true)
                    .build()
                    .unwrap_or_else(|_| reqwest::Client::new()),
            ),
        }
    }

    /// Create a ReqwestHttpClient with a custom reqwest::Client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for ReqwestHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
        Box::pin(async move {
            let mut builder = self
                .client
                .get(request.url())
                .timeout(Duration::from_millis(request.timeout_ms));

            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }

            // reqwest errors embed the URL, which may carry a credential.
            let response = builder.send().await.map_err(|e| {
                let e = e.without_url();
                if e.is_timeout() {
                    HttpError::new(format!("request timeout: {e}"))
                } else if e.is_connect() {
                    HttpError::new(format!("connection failed: {e}"))
                } else {
                    HttpError::new(format!("request failed: {e}"))
                }
            })?;

            let status = response.status().as_u16();
            let body = response.text().await.map_err(|e| {
                HttpError::new(format!("failed to read response body: {}", e.without_url()))
            })?;

            Ok(HttpResponse { status, body })
        })
    }
}

/// Transport wrapper that stamps one timeout on every request before
/// delegating.
///
/// The router wraps its shared client with this so the transport deadline
/// follows the configured per-call timeout instead of the request default.
pub struct TimeoutHttpClient {
    inner: Arc<dyn HttpClient>,
    timeout_ms: u64,
}

impl TimeoutHttpClient {
    pub fn new(inner: Arc<dyn HttpClient>, timeout: Duration) -> Self {
        Self {
            inner,
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub const fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }
}

impl std::fmt::Debug for TimeoutHttpClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeoutHttpClient")
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl HttpClient for TimeoutHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
        self.inner.execute(request.with_timeout_ms(self.timeout_ms))
    }
}

/// Canned outcome served by [`ScriptedHttpClient`].
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Response(HttpResponse),
    Failure(HttpError),
    /// Waits before answering `{}` so callers can exercise their timeouts.
    Stall(Duration),
}

/// Deterministic offline transport mapping URL fragments to canned replies.
///
/// The first registered fragment contained in the request URL wins. Requests
/// with no matching fragment fail with a transport error. Every request is
/// recorded so tests can assert which providers were contacted.
#[derive(Debug, Default)]
pub struct ScriptedHttpClient {
    routes: Vec<(String, ScriptedReply)>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, fragment: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        self.route(fragment, ScriptedReply::Response(HttpResponse::new(status, body)))
    }

    pub fn fail(self, fragment: impl Into<String>, message: impl Into<String>) -> Self {
        self.route(fragment, ScriptedReply::Failure(HttpError::new(message)))
    }

    pub fn stall(self, fragment: impl Into<String>, delay: Duration) -> Self {
        self.route(fragment, ScriptedReply::Stall(delay))
    }

    pub fn route(mut self, fragment: impl Into<String>, reply: ScriptedReply) -> Self {
        self.routes.push((fragment.into(), reply));
        self
    }

    /// All requests seen so far, in execution order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// Number of requests whose URL contains `fragment`.
    pub fn request_count(&self, fragment: &str) -> usize {
        self.requests()
            .iter()
            .filter(|request| request.url().contains(fragment))
            .count()
    }

    fn reply_for(&self, url: &str) -> Option<ScriptedReply> {
        self.routes
            .iter()
            .find(|(fragment, _)| url.contains(fragment.as_str()))
            .map(|(_, reply)| reply.clone())
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
        let url = request.url();
        let redacted = request.redacted_url();
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        let reply = self.reply_for(&url);

        Box::pin(async move {
            match reply {
                Some(ScriptedReply::Response(response)) => Ok(response),
                Some(ScriptedReply::Failure(error)) => Err(error),
                Some(ScriptedReply::Stall(delay)) => {
                    tokio::time::sleep(delay).await;
                    Ok(HttpResponse::ok_json("{}"))
                }
                None => Err(HttpError::new(format!(
                    "no scripted response for {redacted}"
                ))),
            }
        })
    }
}
