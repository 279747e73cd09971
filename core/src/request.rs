//! Immutable descriptions of endpoint calls and their URL composition.
//!
//! # Design
//! An `EndpointRequest` says what to call (method, path, query, headers,
//! body, timeout) without knowing which server it will be sent to. The
//! client folds in its `ClientConfig` to produce wire-ready `HttpRequest`s.
//!
//! A request may carry one *splittable* multi-valued query parameter (for
//! example a list of ids to look up). If writing every value into a single
//! URL would exceed the configured maximum URL length, the values are spread
//! over as many requests as needed, each URL within the limit. Callers that
//! can receive several responses (the multi-response JSON mode) opt into
//! this; everyone else gets exactly one request.

use std::time::Duration;

use serde::Serialize;
use url::Url;

use crate::config::{ClientConfig, MultiValueQueryHandling};
use crate::error::ClientError;
use crate::http::{HttpMethod, HttpRequest};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const CONTENT_TYPE: &str = "Content-Type";

/// A query parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    Single(String),
    Multi(Vec<String>),
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Single(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Single(value)
    }
}

impl From<Vec<String>> for QueryValue {
    fn from(values: Vec<String>) -> Self {
        QueryValue::Multi(values)
    }
}

/// Describes one logical call to an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointRequest {
    method: HttpMethod,
    path: String,
    query: Vec<(String, QueryValue)>,
    splittable_query: Option<(String, Vec<String>)>,
    headers: Vec<(String, String)>,
    timeout: Duration,
    body: Option<Vec<u8>>,
}

impl EndpointRequest {
    /// `path` is appended to the client's server prefix unless it is already
    /// a full `http://` or `https://` URL.
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            splittable_query: None,
            headers: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn head(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Head, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// A multi-valued parameter that may be spread across several requests
    /// when the URL would otherwise be too long. Only one per request.
    #[must_use]
    pub fn splittable_query<I, S>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.splittable_query = Some((key.into(), values.into_iter().map(Into::into).collect()));
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn json_body<T: Serialize + ?Sized>(self, value: &T) -> Result<Self, ClientError> {
        let body = serde_json::to_vec(value)?;
        Ok(self.header(CONTENT_TYPE, "application/json").body(body))
    }

    #[must_use]
    pub fn xml_body(self, body: impl Into<Vec<u8>>) -> Self {
        self.header(CONTENT_TYPE, "application/xml").body(body)
    }

    #[must_use]
    pub fn url_encoded_body<I, K, V>(self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        self.header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(encoded.into_bytes())
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn timeout_duration(&self) -> Duration {
        self.timeout
    }

    pub fn body_bytes(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Composes the wire requests for this call.
    ///
    /// With `allow_split` the splittable query may produce several requests;
    /// without it exactly one request is returned, however long its URL.
    pub fn to_http_requests(
        &self,
        config: &ClientConfig,
        allow_split: bool,
    ) -> Result<Vec<HttpRequest>, ClientError> {
        let base = self.base_url(config)?;

        let urls = match &self.splittable_query {
            None => vec![base],
            Some((_, values)) if values.is_empty() => vec![base],
            Some((key, values)) if allow_split => {
                split_values(&base, key, values, config)
            }
            Some((key, values)) => {
                let url = with_values(&base, key, values, config.multi_value_query_handling);
                if url.as_str().len() > config.maximum_url_length {
                    tracing::warn!(
                        url_length = url.as_str().len(),
                        maximum = config.maximum_url_length,
                        "request URL exceeds maximum length and cannot be split"
                    );
                }
                vec![url]
            }
        };

        Ok(urls
            .into_iter()
            .map(|url| HttpRequest {
                method: self.method,
                url: url.into(),
                headers: self.headers.clone(),
                body: self.body.clone(),
                timeout: self.timeout,
            })
            .collect())
    }

    fn base_url(&self, config: &ClientConfig) -> Result<Url, ClientError> {
        let raw = if self.path.starts_with("http://") || self.path.starts_with("https://") {
            self.path.clone()
        } else {
            join_prefix(&config.server_prefix, &self.path)
        };
        let mut url = Url::parse(&raw).map_err(|source| ClientError::InvalidUrl {
            url: raw.clone(),
            source,
        })?;

        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query {
                match value {
                    QueryValue::Single(value) => {
                        pairs.append_pair(key, value);
                    }
                    QueryValue::Multi(values) => {
                        append_values(&mut pairs, key, values, config.multi_value_query_handling);
                    }
                }
            }
        }
        Ok(url)
    }
}

fn join_prefix(prefix: &str, path: &str) -> String {
    match (prefix.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", prefix.trim_end_matches('/'), path),
        (false, false) if !path.is_empty() => format!("{prefix}/{path}"),
        _ => format!("{prefix}{path}"),
    }
}

fn append_values(
    pairs: &mut url::form_urlencoded::Serializer<'_, url::UrlQuery<'_>>,
    key: &str,
    values: &[String],
    handling: MultiValueQueryHandling,
) {
    match handling {
        MultiValueQueryHandling::RepeatKey => {
            for value in values {
                pairs.append_pair(key, value);
            }
        }
        MultiValueQueryHandling::UseComma => {
            pairs.append_pair(key, &values.join(","));
        }
    }
}

fn with_values(base: &Url, key: &str, values: &[String], handling: MultiValueQueryHandling) -> Url {
    let mut url = base.clone();
    append_values(&mut url.query_pairs_mut(), key, values, handling);
    url
}

/// Greedily packs values into URLs no longer than the configured maximum.
/// A value that does not fit even on its own still gets its own URL.
fn split_values(base: &Url, key: &str, values: &[String], config: &ClientConfig) -> Vec<Url> {
    let handling = config.multi_value_query_handling;
    let whole = with_values(base, key, values, handling);
    if whole.as_str().len() <= config.maximum_url_length {
        return vec![whole];
    }

    let mut urls = Vec::new();
    let mut start = 0;
    while start < values.len() {
        let mut end = start + 1;
        let mut url = with_values(base, key, &values[start..end], handling);
        while end < values.len() {
            let candidate = with_values(base, key, &values[start..=end], handling);
            if candidate.as_str().len() > config.maximum_url_length {
                break;
            }
            url = candidate;
            end += 1;
        }
        urls.push(url);
        start = end;
    }
    urls
}
