//! Run configuration: what to run, where, and how.

use crate::error::TransportError;
use crate::route::Route;
use crate::transport::{HttpTransport, Transport};
use crate::traverse::{traverse, Traversal};
use serde::Deserialize;
use std::sync::Arc;

/// Transport options for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunOptions {
    /// Share one HTTP client (and its connections) across the whole run.
    pub session: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { session: true }
    }
}

impl RunOptions {
    pub fn with_session(mut self, session: bool) -> Self {
        self.session = session;
        self
    }

    pub fn transport(&self) -> Result<HttpTransport, TransportError> {
        HttpTransport::new(self.session)
    }
}

/// Hosts, routes and options for one run, built once and passed by
/// reference to whoever drives the traversal.
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    pub hosts: Vec<String>,
    pub routes: Vec<Arc<Route>>,
    pub options: RunOptions,
}

impl RunConfig {
    pub fn new<H, R>(hosts: H, routes: R) -> Self
    where
        H: IntoIterator,
        H::Item: Into<String>,
        R: IntoIterator<Item = Route>,
    {
        Self {
            hosts: hosts.into_iter().map(Into::into).collect(),
            routes: routes.into_iter().map(Arc::new).collect(),
            options: RunOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Traverse with a caller supplied transport.
    pub fn traverse<T: Transport>(&self, transport: T) -> Traversal<T> {
        traverse(self.hosts.iter().cloned(), self.routes.iter().cloned(), transport)
    }

    /// Traverse with an HTTP transport built from the options.
    pub fn visit(&self) -> Result<Traversal<HttpTransport>, TransportError> {
        Ok(self.traverse(self.options.transport()?))
    }
}
