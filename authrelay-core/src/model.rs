//! Request and response types flowing through the relay pipeline.
//!
//! - [`RequestDescriptor`] - an outgoing request, replayable at most once
//! - [`Response`] - a fully buffered HTTP response
//! - [`Outcome`] - a response split into success and failure

use std::fmt;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;
use uuid::Uuid;

/// Immutable description of an outgoing request.
///
/// The only mutable state is the `retried` flag, which moves from `false` to
/// `true` once, before the descriptor is queued for replay. A descriptor with
/// `retried == true` never re-enters credential renewal.
///
/// # Examples
///
/// ```
/// use authrelay_core::RequestDescriptor;
/// use reqwest::Method;
///
/// let url = "https://api.example.com/articles/".parse().unwrap();
/// let descriptor = RequestDescriptor::new(Method::GET, url);
/// assert!(!descriptor.is_retried());
/// ```
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    id: Uuid,
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
    retried: bool,
}

impl RequestDescriptor {
    /// Create a descriptor with no headers and no body.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            id: Uuid::new_v4(),
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            retried: false,
        }
    }

    /// Add a header, replacing any previous value with the same name.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set a raw body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set a JSON body and the matching content type.
    pub fn with_json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        Ok(self
            .with_header(
                reqwest::header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )
            .with_body(body))
    }

    /// Correlation id used in logs.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Whether this descriptor has already been queued for replay.
    pub fn is_retried(&self) -> bool {
        self.retried
    }

    /// Mark the descriptor as retried.
    ///
    /// Returns `false` if it was already marked.
    pub(crate) fn mark_retried(&mut self) -> bool {
        !std::mem::replace(&mut self.retried, true)
    }

    /// Copy of this descriptor with extra headers, keeping the id and flag.
    pub(crate) fn decorated(&self, extra: HeaderMap) -> Self {
        let mut copy = self.clone();
        copy.headers.extend(extra);
        copy
    }
}

/// A buffered HTTP response.
#[derive(Clone)]
pub struct Response {
    url: Url,
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Response {
    pub fn new(url: Url, status: StatusCode, headers: HeaderMap, body: impl Into<Vec<u8>>) -> Self {
        Self {
            url,
            status,
            headers,
            body: body.into(),
        }
    }

    /// URL of the request that produced this response.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Body decoded as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Split into an [`Outcome`] by status class.
    pub fn into_outcome(self) -> Outcome {
        if self.status.is_success() {
            Outcome::Success(self)
        } else {
            Outcome::Failure(self)
        }
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("url", &self.url.as_str())
            .field("status", &self.status)
            .field("body_len", &self.body.len())
            .finish()
    }
}

/// Result of dispatching one request.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// 2xx response.
    Success(Response),
    /// Any other status.
    Failure(Response),
}
