//! Transport capability used by the traversal driver to dispatch calls.
//!
//! The engine only needs [`Transport`]; [`HttpTransport`] is the reqwest
//! backed implementation used by the command line runner. Tests substitute
//! their own implementations.

use crate::error::TransportError;
use crate::request::PreparedRequest;
use crate::route::Method;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use tracing::debug;

/// The request as it was actually dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

/// Raw response handed back by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub request: SentRequest,
}

impl HttpResponse {
    /// Body decoded as UTF-8, with invalid sequences replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Body parsed as JSON, if it is JSON.
    pub fn json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

/// Something that can perform HTTP calls.
///
/// Any error is treated by the engine as a failure of that single route.
pub trait Transport {
    fn send(
        &self,
        method: &Method,
        url: &str,
        request: &PreparedRequest,
    ) -> Result<HttpResponse, TransportError>;

    fn get(&self, url: &str, request: &PreparedRequest) -> Result<HttpResponse, TransportError> {
        self.send(&Method::Get, url, request)
    }

    fn post(&self, url: &str, request: &PreparedRequest) -> Result<HttpResponse, TransportError> {
        self.send(&Method::Post, url, request)
    }

    fn put(&self, url: &str, request: &PreparedRequest) -> Result<HttpResponse, TransportError> {
        self.send(&Method::Put, url, request)
    }

    fn delete(&self, url: &str, request: &PreparedRequest) -> Result<HttpResponse, TransportError> {
        self.send(&Method::Delete, url, request)
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(
        &self,
        method: &Method,
        url: &str,
        request: &PreparedRequest,
    ) -> Result<HttpResponse, TransportError> {
        (**self).send(method, url, request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(
        &self,
        method: &Method,
        url: &str,
        request: &PreparedRequest,
    ) -> Result<HttpResponse, TransportError> {
        (**self).send(method, url, request)
    }
}

/// Blocking HTTP transport.
///
/// With a session, one client (and its connection pool) serves every call of
/// the run. Without one, each call gets a fresh client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    session: Option<Client>,
}

impl HttpTransport {
    pub fn new(session: bool) -> Result<Self, TransportError> {
        let session = if session {
            Some(Client::builder().build()?)
        } else {
            None
        };
        Ok(Self { session })
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    fn client(&self) -> Result<Client, TransportError> {
        match &self.session {
            Some(client) => Ok(client.clone()),
            None => Ok(Client::builder().build()?),
        }
    }
}

fn to_reqwest_method(method: &Method) -> Result<reqwest::Method, TransportError> {
    match method {
        Method::Get => Ok(reqwest::Method::GET),
        Method::Post => Ok(reqwest::Method::POST),
        Method::Put => Ok(reqwest::Method::PUT),
        Method::Delete => Ok(reqwest::Method::DELETE),
        Method::Other(s) => reqwest::Method::from_bytes(s.as_bytes())
            .map_err(|_| TransportError::InvalidMethod(s.clone())),
    }
}

fn to_header_map(headers: &[(String, String)]) -> Result<HeaderMap, TransportError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| TransportError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| TransportError::InvalidHeader {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        map.append(header_name, header_value);
    }
    Ok(map)
}

impl Transport for HttpTransport {
    fn send(
        &self,
        method: &Method,
        url: &str,
        request: &PreparedRequest,
    ) -> Result<HttpResponse, TransportError> {
        let client = self.client()?;
        let mut builder = client
            .request(to_reqwest_method(method)?, url)
            .headers(to_header_map(&request.headers)?);
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        debug!(%method, url, "sending request");
        let response = builder.send()?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let final_url = response.url().to_string();
        let body = response.bytes()?.to_vec();
        debug!(status = status.as_u16(), bytes = body.len(), "received response");

        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
            request: SentRequest {
                method: method.to_string(),
                url: final_url,
                headers: request.headers.clone(),
                body: request.body.clone(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_map_rejects_bad_name() {
        let err = to_header_map(&[("bad header".to_string(), "v".to_string())]).unwrap_err();
        assert!(matches!(err, TransportError::InvalidHeader { name, .. } if name == "bad header"));
    }

    #[test]
    fn test_header_map_keeps_repeats() {
        let map = to_header_map(&[
            ("X-A".to_string(), "1".to_string()),
            ("X-A".to_string(), "2".to_string()),
        ])
        .unwrap();
        assert_eq!(map.get_all("x-a").iter().count(), 2);
    }

    #[test]
    fn test_reqwest_method_mapping() {
        assert_eq!(to_reqwest_method(&Method::Put).unwrap(), reqwest::Method::PUT);
        assert_eq!(
            to_reqwest_method(&Method::Other("PATCH".to_string())).unwrap(),
            reqwest::Method::PATCH
        );
        assert!(to_reqwest_method(&Method::Other("BAD METHOD".to_string())).is_err());
    }

    #[test]
    fn test_response_text_and_json() {
        let response = HttpResponse {
            status: 200,
            reason: "OK".to_string(),
            headers: vec![],
            body: br#"{"id": 1}"#.to_vec(),
            request: SentRequest {
                method: "GET".to_string(),
                url: "http://h/".to_string(),
                headers: vec![],
                body: None,
            },
        };
        assert_eq!(response.text(), r#"{"id": 1}"#);
        assert_eq!(response.json(), Some(serde_json::json!({"id": 1})));
    }

    #[test]
    fn test_transport_session_flag() {
        assert!(HttpTransport::new(true).unwrap().has_session());
        assert!(!HttpTransport::new(false).unwrap().has_session());
    }
}
