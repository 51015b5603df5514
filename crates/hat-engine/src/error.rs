//! Error taxonomy for route execution.
//!
//! Every variant here except [`ExtractionError`] is absorbed per route by the
//! traversal driver and turned into a failed result. Extraction errors are
//! returned to the driver, which decides how they affect the route's outcome.
//! [`RouteError`] unifies them for code that executes a whole route.

use thiserror::Error;

/// Failure while resolving a template against a state store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Missing placeholder value: '{0}'")]
    MissingKey(String),
    #[error("Malformed template '{template}' at offset {offset}: {reason}")]
    Malformed {
        template: String,
        offset: usize,
        reason: &'static str,
    },
    #[error("Cannot coerce '{value}' to {target}")]
    Coercion { value: String, target: &'static str },
}

/// Failure raised by a transport while dispatching a call.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP request failed: {}", source_chain(.0))]
    Request(#[from] reqwest::Error),
    #[error("Invalid method: '{0}'")]
    InvalidMethod(String),
    #[error("Invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },
    #[error("Connection failed: {0}")]
    Connection(String),
}

/// `err` followed by each of its sources, joined with `": "`.
///
/// reqwest keeps the cause of a failed call (refused connection, DNS, TLS)
/// in the source chain rather than in its own message.
fn source_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let message = cause.to_string();
        if !text.contains(&message) {
            text.push_str(": ");
            text.push_str(&message);
        }
        source = cause.source();
    }
    text
}

/// Deterministic failure detected before any network call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralError {
    #[error("Unknown method: '{0}'")]
    UnknownMethod(String),
    #[error("Unknown route: '{0}'")]
    UnknownRoute(String),
}

/// An extractor path that does not address a value in the result record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Cannot resolve segment '{segment}' of extractor path '{path}'")]
    Unresolvable { path: String, segment: String },
}

/// Anything that can go wrong while executing a single route.
#[derive(Error, Debug)]
pub enum RouteError {
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}
