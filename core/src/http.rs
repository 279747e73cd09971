//! HTTP transport types shared by the client, the scheduler and transports.
//!
//! # Design
//! These types describe HTTP requests and responses as plain data. The core
//! builds `HttpRequest` values from `EndpointRequest` descriptors and hands
//! them to a `Transport`; the transport reports back `HttpResponse` metadata
//! plus body bytes. Nothing here touches the network.
//!
//! All fields use owned types (`String`, `Vec`) so values can move freely
//! between the scheduler's tasks without lifetime concerns.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Head,
    Patch,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status codes the endpoint layer gives names to.
///
/// Decoders never fail on status; callers inspect `HttpResponse::status`
/// (or `HttpResponse::is_success`) when the code matters to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum HttpStatus {
    Ok = 200,
    BadRequest = 400,
    Unauthorized = 401,
    Forbidden = 403,
    NotFound = 404,
    Conflict = 409,
    InternalServerError = 500,
}

impl HttpStatus {
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            200 => Some(HttpStatus::Ok),
            400 => Some(HttpStatus::BadRequest),
            401 => Some(HttpStatus::Unauthorized),
            403 => Some(HttpStatus::Forbidden),
            404 => Some(HttpStatus::NotFound),
            409 => Some(HttpStatus::Conflict),
            500 => Some(HttpStatus::InternalServerError),
            _ => None,
        }
    }

    pub fn is_success(self) -> bool {
        self == HttpStatus::Ok
    }
}

/// A wire-ready HTTP request described as plain data.
///
/// Produced by `EndpointRequest::to_http_requests` once the server prefix and
/// query parameters have been folded into `url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
}

/// Response metadata reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
        }
    }

    /// First value of `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn known_status(&self) -> Option<HttpStatus> {
        HttpStatus::from_code(self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_names_are_uppercase() {
        assert_eq!(HttpMethod::Patch.as_str(), "PATCH");
        assert_eq!(HttpMethod::Head.to_string(), "HEAD");
        let json = serde_json::to_string(&HttpMethod::Delete).unwrap();
        assert_eq!(json, r#""DELETE""#);
    }

    #[test]
    fn header_lookup_ignores_case() {
        let response = HttpResponse {
            status: 200,
            headers: vec![("Content-Type".to_string(), "text/plain".to_string())],
        };
        assert_eq!(response.header("content-type"), Some("text/plain"));
        assert_eq!(response.header("x-missing"), None);
    }

    #[test]
    fn known_status_maps_named_codes() {
        assert_eq!(HttpResponse::new(409).known_status(), Some(HttpStatus::Conflict));
        assert_eq!(HttpResponse::new(418).known_status(), None);
        assert!(HttpStatus::Ok.is_success());
        assert!(!HttpStatus::NotFound.is_success());
        assert!(HttpResponse::new(204).is_success());
    }
}
