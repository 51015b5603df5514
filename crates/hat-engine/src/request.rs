//! Turns a route's request template into concrete call parameters.

use crate::error::{StructuralError, TemplateError};
use crate::route::RequestTemplate;
use crate::store::StateStore;
use crate::template::format_placeholders;
use crate::verify::canonical_json;

pub const CONTENT_TYPE: &str = "Content-Type";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Headers and body ready for dispatch.
///
/// `body: None` means no body is sent at all, which is distinct from an
/// empty body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreparedRequest {
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl PreparedRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Resolve a request template against the host's store.
///
/// Structured bodies (including a top-level `$int`/`$bool`) are serialized
/// as canonical JSON and get a JSON content type unless the template already
/// names one. Raw string bodies are substituted and sent verbatim.
pub fn build_request(
    template: &RequestTemplate,
    store: &StateStore,
) -> Result<PreparedRequest, TemplateError> {
    let mut headers = Vec::with_capacity(template.headers.len() + 1);
    for (name, value) in &template.headers {
        headers.push((name.clone(), format_placeholders(value, store)?));
    }

    let mut prepared = PreparedRequest {
        headers,
        body: None,
    };

    if let Some(body) = &template.body {
        if body.is_structured() {
            let value = body.substitute(store)?;
            prepared.body = Some(canonical_json(&value));
            if prepared.header(CONTENT_TYPE).is_none() {
                prepared
                    .headers
                    .insert(0, (CONTENT_TYPE.to_string(), JSON_CONTENT_TYPE.to_string()));
            }
        } else {
            prepared.body = Some(format_placeholders(&body.literal_text(), store)?);
        }
    }

    Ok(prepared)
}

/// Join a host base URL and a route path with exactly one slash between.
pub fn join_url(host: &str, path: &str) -> Result<String, StructuralError> {
    if path.is_empty() {
        return Err(StructuralError::UnknownRoute(path.to_string()));
    }
    let root = host.strip_suffix('/').unwrap_or(host);
    if path.starts_with('/') {
        Ok(format!("{root}{path}"))
    } else {
        Ok(format!("{root}/{path}"))
    }
}

/// Like [`join_url`] but for display, where an empty path is shown as-is.
pub fn display_url(host: &str, path: &str) -> String {
    join_url(host, path).unwrap_or_else(|_| host.to_string())
}
