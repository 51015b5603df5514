//! Route model: one scripted HTTP interaction.
//!
//! Routes are authored once (in code or deserialized from a scenario file)
//! and stay read-only for the whole run.

use crate::template::Template;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

/// HTTP method of a route.
///
/// Anything other than GET/POST/PUT/DELETE is kept as `Other` so that it can
/// be reported as an unknown method instead of failing to load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(from = "String")]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Other(String),
}

impl Method {
    pub fn parse(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            _ => Method::Other(s.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Other(s) => s,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Method::Other(_))
    }
}

impl From<String> for Method {
    fn from(s: String) -> Self {
        Method::parse(&s)
    }
}

impl From<&str> for Method {
    fn from(s: &str) -> Self {
        Method::parse(s)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Headers and optional body to send.
///
/// Header names are literal; header values and the body are templates.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RequestTemplate {
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<Template>,
}

/// Expected status code and, optionally, expected body.
///
/// `body: None` verifies the status code only.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "ResponseDef")]
pub struct ResponseTemplate {
    pub code: u16,
    pub body: Option<Template>,
}

impl ResponseTemplate {
    pub fn status(code: u16) -> Self {
        Self { code, body: None }
    }

    pub fn with_body(mut self, body: impl Into<Template>) -> Self {
        self.body = Some(body.into());
        self
    }
}

impl Default for ResponseTemplate {
    fn default() -> Self {
        Self::status(200)
    }
}

impl fmt::Display for ResponseTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)
    }
}

/// Scenario files may give either a bare status code or `{code, body}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ResponseDef {
    Code(u16),
    Full(FullResponseDef),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct FullResponseDef {
    #[serde(default = "default_code")]
    code: u16,
    #[serde(default)]
    body: Option<Template>,
}

fn default_code() -> u16 {
    200
}

impl From<ResponseDef> for ResponseTemplate {
    fn from(def: ResponseDef) -> Self {
        match def {
            ResponseDef::Code(code) => ResponseTemplate::status(code),
            ResponseDef::Full(FullResponseDef { code, body }) => ResponseTemplate { code, body },
        }
    }
}

/// Rule copying a value out of a call's result record into the host's store.
///
/// `path` is dot separated; each segment is a mapping key or, on sequences,
/// an integer index (`response.body-object.items.0.id`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Extractor {
    pub path: String,
    pub key: String,
}

impl Extractor {
    pub fn new(path: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
        }
    }

    pub fn path_parts(&self) -> impl Iterator<Item = &str> {
        self.path.split('.')
    }
}

impl fmt::Display for Extractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.path, self.key)
    }
}

/// One HTTP interaction: where to send it, what to send, what to expect and
/// what to remember from the answer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RouteDef")]
pub struct Route {
    path: String,
    method: Method,
    request: RequestTemplate,
    response: ResponseTemplate,
    store: Vec<Extractor>,
    doc: Option<String>,
}

impl Route {
    /// A GET route expecting status 200.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: Method::Get,
            request: RequestTemplate::default(),
            response: ResponseTemplate::default(),
            store: Vec::new(),
            doc: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(path).with_method(Method::Post)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(path).with_method(Method::Put)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(path).with_method(Method::Delete)
    }

    pub fn with_method(mut self, method: impl Into<Method>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Template>) -> Self {
        self.request.body = Some(body.into());
        self
    }

    pub fn with_request(mut self, request: RequestTemplate) -> Self {
        self.request = request;
        self
    }

    pub fn with_response(mut self, response: ResponseTemplate) -> Self {
        self.response = response;
        self
    }

    pub fn expect_status(self, code: u16) -> Self {
        self.with_response(ResponseTemplate::status(code))
    }

    pub fn with_extractor(mut self, extractor: Extractor) -> Self {
        self.store.push(extractor);
        self
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn request(&self) -> &RequestTemplate {
        &self.request
    }

    pub fn response(&self) -> &ResponseTemplate {
        &self.response
    }

    pub fn extractors(&self) -> &[Extractor] {
        &self.store
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.doc {
            Some(doc) => f.write_str(doc),
            None => write!(f, "{} {}", self.path, self.method),
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RouteDef {
    path: String,
    #[serde(default)]
    method: Method,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default)]
    body: Option<Template>,
    #[serde(default)]
    response: ResponseTemplate,
    #[serde(default)]
    store: Vec<Extractor>,
    #[serde(default)]
    doc: Option<String>,
}

impl From<RouteDef> for Route {
    fn from(def: RouteDef) -> Self {
        Route {
            path: def.path,
            method: def.method,
            request: RequestTemplate {
                headers: def.headers,
                body: def.body,
            },
            response: def.response,
            store: def.store,
            doc: def.doc,
        }
    }
}
