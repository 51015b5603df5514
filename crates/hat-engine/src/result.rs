//! Results of route execution and their aggregation.
//!
//! [`Outcome`] is the tagged union every consumer works with: a scalar
//! pass/fail, one HTTP call, or a named collection of outcomes. Each variant
//! knows whether it succeeded, how to render itself at a verbosity level and
//! how to serialize itself to a JSON record.

use crate::request::display_url;
use crate::route::Route;
use crate::transport::HttpResponse;
use crate::traverse::UNEXPECTED_RESPONSE;
use crate::verify::canonicalize_text;
use serde_json::{json, Map, Value};
use std::ops::{Add, AddAssign};
use std::sync::Arc;

/// Indentation added per nesting level when rendering.
const INDENT_STEP: usize = 2;

/// How a collection decides which children to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderPolicy {
    /// Every child at the requested verbosity.
    #[default]
    Flat,
    /// Failures always, in full detail. Successes only once verbosity is
    /// raised, one level quieter than requested.
    Filtered,
}

/// Outcome of one route against one host.
#[derive(Debug, Clone)]
pub struct HttpResult {
    success: bool,
    title: String,
    message: String,
    route: Arc<Route>,
    host: String,
    response: Option<HttpResponse>,
}

impl HttpResult {
    pub fn new(
        message: impl Into<String>,
        success: bool,
        route: Arc<Route>,
        host: impl Into<String>,
        response: Option<HttpResponse>,
    ) -> Self {
        let host = host.into();
        let title = format!("{}: {}", route, display_url(&host, route.path()));
        Self {
            success,
            title,
            message: message.into(),
            route,
            host,
            response,
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn url(&self) -> String {
        display_url(&self.host, self.route.path())
    }

    pub fn response(&self) -> Option<&HttpResponse> {
        self.response.as_ref()
    }

    /// Same result, marked failed with a new message. Used when work after
    /// the call itself (extraction) fails.
    pub(crate) fn into_failure(mut self, message: impl Into<String>) -> Self {
        self.success = false;
        self.message = message.into();
        self
    }

    /// Serialize to the structured record also used as the extraction source.
    ///
    /// `request` and `response` are only present when a call was made.
    /// `body-object` fields hold the parsed JSON body, or null.
    pub fn to_record(&self) -> Value {
        let mut record = Map::new();
        record.insert("success".to_string(), Value::Bool(self.success));
        record.insert("message".to_string(), Value::String(self.message.clone()));
        record.insert("url".to_string(), Value::String(self.url()));
        record.insert(
            "method".to_string(),
            Value::String(self.route.method().to_string()),
        );

        if let Some(response) = &self.response {
            let request = &response.request;
            let request_object = request
                .body
                .as_deref()
                .and_then(|body| serde_json::from_str::<Value>(body).ok())
                .unwrap_or(Value::Null);
            record.insert(
                "request".to_string(),
                json!({
                    "url": request.url,
                    "headers": headers_object(&request.headers),
                    "body": request.body,
                    "body-object": request_object,
                }),
            );
            record.insert(
                "response".to_string(),
                json!({
                    "status-code": response.status,
                    "status": response.reason,
                    "headers": headers_object(&response.headers),
                    "body": response.text(),
                    "body-object": response.json().unwrap_or(Value::Null),
                }),
            );
        }

        Value::Object(record)
    }

    fn render_lines(&self, verbosity: u8, indent: usize, out: &mut Vec<String>) {
        let pad = " ".repeat(indent);
        out.push(format!("{pad}{}", self.title));

        let Some(response) = &self.response else {
            if !self.message.is_empty() {
                out.push(format!("{pad}{}", self.message.trim_end()));
            }
            return;
        };

        if verbosity >= 1 {
            if !self.success && self.message != UNEXPECTED_RESPONSE {
                out.push(format!("{pad}{}", self.message.trim_end()));
            }
            let request = &response.request;
            out.push(format!("{pad}Request: {} {}", request.method, request.url));
            out.push(format!("{pad}Request Headers:"));
            for (name, value) in &request.headers {
                out.push(format!("{pad}{name}: {value}"));
            }
            if verbosity >= 2 {
                if let Some(body) = &request.body {
                    out.push(format!("{pad}Request Body:"));
                    push_body(body, &pad, out);
                }
            }

            out.push(format!(
                "{pad}Response: {} {}",
                response.status, response.reason
            ));
            out.push(format!("{pad}Response Headers:"));
            for (name, value) in &response.headers {
                out.push(format!("{pad}{name}: {value}"));
            }
            if verbosity >= 2 && !response.body.is_empty() {
                out.push(format!("{pad}Response Body:"));
                push_body(&response.text(), &pad, out);
            }
        }
    }
}

fn headers_object(headers: &[(String, String)]) -> Value {
    let mut map = Map::new();
    for (name, value) in headers {
        map.insert(name.clone(), Value::String(value.clone()));
    }
    Value::Object(map)
}

/// JSON bodies pretty-printed, anything else as raw text.
fn push_body(body: &str, pad: &str, out: &mut Vec<String>) {
    let text = canonicalize_text(body).unwrap_or_else(|| body.to_string());
    for line in text.lines() {
        out.push(format!("{pad}{line}"));
    }
}

/// Plain pass/fail outcome, used for tests that are not HTTP calls and for
/// failures detected before any route runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarResult {
    pub title: String,
    pub success: bool,
    pub message: Option<String>,
}

impl ScalarResult {
    pub fn new(title: impl Into<String>, success: bool) -> Self {
        Self {
            title: title.into(),
            success,
            message: None,
        }
    }

    pub fn failure(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            success: false,
            message: Some(message.into()),
        }
    }

    pub fn to_record(&self) -> Value {
        let message = match &self.message {
            Some(message) => format!("{}\n{}", self.title, message),
            None => self.title.clone(),
        };
        json!({ "success": self.success, "message": message })
    }

    fn render_lines(&self, indent: usize, out: &mut Vec<String>) {
        let pad = " ".repeat(indent);
        out.push(format!("{pad}{}", self.title));
        if let Some(message) = &self.message {
            for line in message.lines() {
                out.push(format!("{pad}{line}"));
            }
        }
    }
}

/// Named, ordered group of outcomes.
///
/// Success is the conjunction of the children; an empty collection succeeds.
#[derive(Debug, Clone, Default)]
pub struct CollectionResult {
    title: String,
    results: Vec<Outcome>,
}

impl CollectionResult {
    pub fn new(title: impl Into<String>, results: Vec<Outcome>) -> Self {
        Self {
            title: title.into(),
            results,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn results(&self) -> &[Outcome] {
        &self.results
    }

    pub fn success(&self) -> bool {
        self.results.iter().all(Outcome::success)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn push(&mut self, outcome: impl Into<Outcome>) {
        self.results.push(outcome.into());
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Outcome> {
        self.results.iter()
    }

    pub fn to_record(&self) -> Value {
        json!({
            "success": self.success(),
            "title": self.title,
            "results": self.results.iter().map(Outcome::to_record).collect::<Vec<_>>(),
        })
    }

    /// Render the children selected by `policy`, without the title line.
    pub fn render_children(&self, verbosity: u8, policy: RenderPolicy) -> String {
        let mut out = Vec::new();
        self.children_lines(verbosity, INDENT_STEP, policy, &mut out);
        out.join("\n")
    }

    fn children_lines(
        &self,
        verbosity: u8,
        indent: usize,
        policy: RenderPolicy,
        out: &mut Vec<String>,
    ) {
        for child in &self.results {
            let level = match policy {
                RenderPolicy::Flat => Some(verbosity),
                RenderPolicy::Filtered if !child.success() => Some(verbosity.max(2)),
                RenderPolicy::Filtered if verbosity >= 1 => Some(verbosity - 1),
                RenderPolicy::Filtered => None,
            };
            if let Some(level) = level {
                child.render_lines(level, indent, policy, out);
            }
        }
    }
}

impl Add for CollectionResult {
    type Output = CollectionResult;

    fn add(mut self, other: CollectionResult) -> CollectionResult {
        self += other;
        self
    }
}

impl Add<Vec<Outcome>> for CollectionResult {
    type Output = CollectionResult;

    fn add(mut self, other: Vec<Outcome>) -> CollectionResult {
        self += other;
        self
    }
}

impl AddAssign for CollectionResult {
    fn add_assign(&mut self, other: CollectionResult) {
        self.results.extend(other.results);
    }
}

impl AddAssign<Vec<Outcome>> for CollectionResult {
    fn add_assign(&mut self, other: Vec<Outcome>) {
        self.results.extend(other);
    }
}

impl<T: Into<Outcome>> Extend<T> for CollectionResult {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.results.extend(iter.into_iter().map(Into::into));
    }
}

impl IntoIterator for CollectionResult {
    type Item = Outcome;
    type IntoIter = std::vec::IntoIter<Outcome>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

impl<'a> IntoIterator for &'a CollectionResult {
    type Item = &'a Outcome;
    type IntoIter = std::slice::Iter<'a, Outcome>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

/// Anything a test can produce.
#[derive(Debug, Clone)]
pub enum Outcome {
    Scalar(ScalarResult),
    Http(HttpResult),
    Collection(CollectionResult),
}

impl Outcome {
    pub fn success(&self) -> bool {
        match self {
            Outcome::Scalar(result) => result.success,
            Outcome::Http(result) => result.success(),
            Outcome::Collection(collection) => collection.success(),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Outcome::Scalar(result) => &result.title,
            Outcome::Http(result) => result.title(),
            Outcome::Collection(collection) => collection.title(),
        }
    }

    pub fn to_record(&self) -> Value {
        match self {
            Outcome::Scalar(result) => result.to_record(),
            Outcome::Http(result) => result.to_record(),
            Outcome::Collection(collection) => collection.to_record(),
        }
    }

    /// Render with the flat policy.
    ///
    /// - 0: title line (plus the message when no call was made)
    /// - 1: request method, URL and headers; response status and headers
    /// - 2: request and response bodies, JSON pretty-printed when parseable
    pub fn render(&self, verbosity: u8) -> String {
        self.render_with(verbosity, RenderPolicy::Flat)
    }

    pub fn render_with(&self, verbosity: u8, policy: RenderPolicy) -> String {
        let mut out = Vec::new();
        self.render_lines(verbosity, 0, policy, &mut out);
        out.join("\n")
    }

    fn render_lines(&self, verbosity: u8, indent: usize, policy: RenderPolicy, out: &mut Vec<String>) {
        match self {
            Outcome::Scalar(result) => result.render_lines(indent, out),
            Outcome::Http(result) => result.render_lines(verbosity, indent, out),
            Outcome::Collection(collection) => {
                out.push(format!("{}{}", " ".repeat(indent), collection.title));
                collection.children_lines(verbosity, indent + INDENT_STEP, policy, out);
            }
        }
    }
}

impl From<HttpResult> for Outcome {
    fn from(result: HttpResult) -> Self {
        Outcome::Http(result)
    }
}

impl From<ScalarResult> for Outcome {
    fn from(result: ScalarResult) -> Self {
        Outcome::Scalar(result)
    }
}

impl From<CollectionResult> for Outcome {
    fn from(collection: CollectionResult) -> Self {
        Outcome::Collection(collection)
    }
}
