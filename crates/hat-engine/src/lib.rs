//! Declarative HTTP scenario engine.
//!
//! A scenario is an ordered list of [`Route`]s run against one or more hosts.
//! Requests are built from templates with `{name}` placeholders, responses are
//! verified against expected templates, and values extracted from one
//! response feed the requests that follow it on the same host.
//!
//! # Example
//!
//! ```no_run
//! use hat_engine::{Extractor, Outcome, ResponseTemplate, Route, RunConfig, Template};
//! use serde_json::json;
//!
//! let routes = vec![
//!     Route::get("/id").with_extractor(Extractor::new("body-object.id", "x")),
//!     Route::post("/echo")
//!         .with_body(Template::from(json!({"v": "{x}"})))
//!         .with_response(ResponseTemplate::status(201).with_body(Template::from(json!({"v": "7"})))),
//! ];
//!
//! let config = RunConfig::new(["http://localhost:8080/"], routes);
//! for result in config.visit().expect("client") {
//!     println!("{}", Outcome::from(result).render(1));
//! }
//! ```

mod config;
mod error;
mod extract;
mod request;
mod result;
mod route;
mod store;
mod template;
mod transport;
mod traverse;
mod verify;

pub use config::{RunConfig, RunOptions};
pub use error::{ExtractionError, RouteError, StructuralError, TemplateError, TransportError};
pub use extract::apply_extractors;
pub use request::{build_request, display_url, join_url, PreparedRequest, CONTENT_TYPE, JSON_CONTENT_TYPE};
pub use result::{CollectionResult, HttpResult, Outcome, RenderPolicy, ScalarResult};
pub use route::{Extractor, Method, RequestTemplate, ResponseTemplate, Route};
pub use store::StateStore;
pub use template::{format_placeholders, Coercion, CoercionTarget, Template, BOOL_TAG, INT_TAG};
pub use transport::{HttpResponse, HttpTransport, SentRequest, Transport};
pub use traverse::{
    execute_route, select_hosts, select_routes, traverse, Traversal, NO_ROUTES, OK_MESSAGE,
    UNEXPECTED_RESPONSE,
};
pub use verify::{canonical_json, canonicalize_text, verify_response};
