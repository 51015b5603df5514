//! Sequential execution of routes against hosts.
//!
//! Hosts are processed in order; for each host the routes run in declared
//! order against a fresh [`StateStore`]. [`Traversal`] is a pull-based
//! iterator: a route is only dispatched when the consumer asks for its
//! result, so dropping the iterator stops the run.

use crate::error::{RouteError, StructuralError};
use crate::extract::apply_extractors;
use crate::request::{build_request, join_url, PreparedRequest};
use crate::result::HttpResult;
use crate::route::{Method, Route};
use crate::store::StateStore;
use crate::template::format_placeholders;
use crate::transport::{HttpResponse, Transport};
use crate::verify::verify_response;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const OK_MESSAGE: &str = "Ok";
pub const UNEXPECTED_RESPONSE: &str = "Unexpected response";
pub const NO_ROUTES: &str = "No routes found.";

/// Lazy sequence of results, one per (host, route) pair in host-major order.
///
/// With no routes at all a single failed result is produced instead, so a
/// run always reports something.
pub struct Traversal<T: Transport> {
    hosts: Vec<String>,
    routes: Vec<Arc<Route>>,
    transport: T,
    host_index: usize,
    route_index: usize,
    store: StateStore,
    reported_empty: bool,
}

/// Start a traversal of `routes` against every host.
pub fn traverse<T, H, R>(hosts: H, routes: R, transport: T) -> Traversal<T>
where
    T: Transport,
    H: IntoIterator,
    H::Item: Into<String>,
    R: IntoIterator<Item = Arc<Route>>,
{
    Traversal {
        hosts: hosts.into_iter().map(Into::into).collect(),
        routes: routes.into_iter().collect(),
        transport,
        host_index: 0,
        route_index: 0,
        store: StateStore::new(),
        reported_empty: false,
    }
}

impl<T: Transport> Traversal<T> {
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: Transport> Iterator for Traversal<T> {
    type Item = HttpResult;

    fn next(&mut self) -> Option<HttpResult> {
        if self.routes.is_empty() {
            if self.reported_empty {
                return None;
            }
            self.reported_empty = true;
            warn!("traversal started without routes");
            return Some(HttpResult::new(
                NO_ROUTES,
                false,
                Arc::new(Route::new("/")),
                "/",
                None,
            ));
        }

        let host = self.hosts.get(self.host_index)?.clone();
        if self.route_index == 0 {
            info!(host = %host, routes = self.routes.len(), "starting route sequence");
            self.store = StateStore::new();
        }

        let route = Arc::clone(&self.routes[self.route_index]);
        let result = execute_route(&self.transport, &host, route, &mut self.store);

        self.route_index += 1;
        if self.route_index == self.routes.len() {
            info!(host = %host, stored = self.store.len(), "finished route sequence");
            self.route_index = 0;
            self.host_index += 1;
        }

        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.routes.is_empty() {
            usize::from(!self.reported_empty)
        } else {
            let hosts_left = self.hosts.len().saturating_sub(self.host_index);
            (hosts_left * self.routes.len()).saturating_sub(self.route_index)
        };
        (remaining, Some(remaining))
    }
}

/// Run one route against one host, updating the host's store.
///
/// Never fails: every error becomes a failed [`HttpResult`]. Extraction runs
/// whenever a result record exists (including unknown methods and
/// unexpected responses) but not after template or transport errors.
pub fn execute_route<T: Transport + ?Sized>(
    transport: &T,
    host: &str,
    route: Arc<Route>,
    store: &mut StateStore,
) -> HttpResult {
    if !route.method().is_supported() {
        let message = StructuralError::UnknownMethod(route.method().to_string()).to_string();
        let result = HttpResult::new(message, false, Arc::clone(&route), host, None);
        return extract_into(result, store);
    }

    let response = match call(transport, host, &route, store) {
        Ok(response) => response,
        Err(err) => {
            warn!(host, route = %route, error = %err, "route failed before verification");
            return HttpResult::new(err.to_string(), false, route, host, None);
        }
    };

    let (success, message) =
        match verify_response(response.status, &response.text(), route.response(), store) {
            Ok(true) => (true, OK_MESSAGE.to_string()),
            Ok(false) => (false, UNEXPECTED_RESPONSE.to_string()),
            Err(err) => (false, err.to_string()),
        };
    debug!(host, route = %route, status = response.status, success, "verified response");

    extract_into(HttpResult::new(message, success, route, host, Some(response)), store)
}

fn call<T: Transport + ?Sized>(
    transport: &T,
    host: &str,
    route: &Route,
    store: &StateStore,
) -> Result<HttpResponse, RouteError> {
    let path = format_placeholders(route.path(), store)?;
    let url = join_url(host, &path)?;
    let request = build_request(route.request(), store)?;
    debug!(method = %route.method(), url = %url, "dispatching");
    dispatch(transport, route.method(), &url, &request)
}

fn dispatch<T: Transport + ?Sized>(
    transport: &T,
    method: &Method,
    url: &str,
    request: &PreparedRequest,
) -> Result<HttpResponse, RouteError> {
    let response = match method {
        Method::Get => transport.get(url, request)?,
        Method::Post => transport.post(url, request)?,
        Method::Put => transport.put(url, request)?,
        Method::Delete => transport.delete(url, request)?,
        Method::Other(name) => return Err(StructuralError::UnknownMethod(name.clone()).into()),
    };
    Ok(response)
}

/// Apply the route's extractors to the result's record.
///
/// On a successful call an extraction error fails the result. On a call
/// that already failed it is logged and the original failure is kept.
fn extract_into(result: HttpResult, store: &mut StateStore) -> HttpResult {
    let extractors = result.route().extractors();
    if extractors.is_empty() {
        return result;
    }

    match apply_extractors(extractors, &result.to_record(), store) {
        Ok(()) => result,
        Err(err) if result.success() => result.into_failure(err.to_string()),
        Err(err) => {
            warn!(title = result.title(), error = %err, "extraction skipped on failed result");
            result
        }
    }
}

/// Pick routes by a comma separated list of 1-based indices.
///
/// Parts that are not plain numbers are ignored. `None` selects everything.
pub fn select_routes(
    selection: Option<&str>,
    routes: &[Arc<Route>],
) -> Result<Vec<Arc<Route>>, StructuralError> {
    let Some(selection) = selection else {
        return Ok(routes.to_vec());
    };

    let mut selected = Vec::new();
    for part in selection.split(',').map(str::trim) {
        if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        let route = part
            .parse::<usize>()
            .ok()
            .and_then(|index| index.checked_sub(1))
            .and_then(|index| routes.get(index))
            .ok_or_else(|| StructuralError::UnknownRoute(part.to_string()))?;
        selected.push(Arc::clone(route));
    }
    Ok(selected)
}

/// Replace the configured hosts with a comma separated list, if given.
pub fn select_hosts(selection: Option<&str>, hosts: &[String]) -> Vec<String> {
    match selection {
        Some(selection) => selection
            .split(',')
            .map(str::trim)
            .filter(|host| !host.is_empty())
            .map(str::to_string)
            .collect(),
        None => hosts.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::route::Extractor;
    use crate::transport::SentRequest;
    use serde_json::json;
    use std::cell::RefCell;

    /// Answers every call with the same status and body and records URLs.
    struct Fixed {
        status: u16,
        body: &'static str,
        calls: RefCell<Vec<String>>,
    }

    impl Fixed {
        fn new(status: u16, body: &'static str) -> Self {
            Self {
                status,
                body,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl Transport for Fixed {
        fn send(
            &self,
            method: &Method,
            url: &str,
            request: &PreparedRequest,
        ) -> Result<HttpResponse, TransportError> {
            self.calls.borrow_mut().push(format!("{method} {url}"));
            Ok(HttpResponse {
                status: self.status,
                reason: "OK".to_string(),
                headers: vec![],
                body: self.body.as_bytes().to_vec(),
                request: SentRequest {
                    method: method.to_string(),
                    url: url.to_string(),
                    headers: request.headers.clone(),
                    body: request.body.clone(),
                },
            })
        }
    }

    fn routes(paths: &[&str]) -> Vec<Arc<Route>> {
        paths.iter().map(|p| Arc::new(Route::get(*p))).collect()
    }

    #[test]
    fn test_size_hint_counts_pairs() {
        let transport = Fixed::new(200, "");
        let mut traversal = traverse(["http://a", "http://b"], routes(&["/1", "/2", "/3"]), &transport);
        assert_eq!(traversal.size_hint(), (6, Some(6)));
        traversal.next();
        assert_eq!(traversal.size_hint(), (5, Some(5)));
        assert_eq!(traversal.count(), 5);
    }

    #[test]
    fn test_lazy_dispatch() {
        let transport = Fixed::new(200, "");
        let mut traversal = traverse(["http://a"], routes(&["/1", "/2"]), &transport);
        assert!(transport.calls.borrow().is_empty());
        traversal.next();
        assert_eq!(transport.calls.borrow().len(), 1);
        drop(traversal);
        assert_eq!(transport.calls.borrow().len(), 1);
    }

    #[test]
    fn test_path_templated_from_store() {
        let transport = Fixed::new(200, r#"{"id": 7}"#);
        let first = Route::get("/id").with_extractor(Extractor::new("body-object.id", "id"));
        let second = Route::get("/items/{id}");
        let results: Vec<_> = traverse(
            ["http://h/"],
            [Arc::new(first), Arc::new(second)],
            &transport,
        )
        .collect();

        assert!(results.iter().all(HttpResult::success));
        assert_eq!(
            *transport.calls.borrow(),
            vec!["GET http://h/id", "GET http://h/items/7"]
        );
    }

    #[test]
    fn test_empty_path_is_unknown_route() {
        let transport = Fixed::new(200, "");
        let mut store = StateStore::new();
        let result = execute_route(&transport, "http://h", Arc::new(Route::get("")), &mut store);
        assert!(!result.success());
        assert_eq!(result.message(), "Unknown route: ''");
        assert!(transport.calls.borrow().is_empty());
    }

    #[test]
    fn test_missing_placeholder_fails_without_dispatch() {
        let transport = Fixed::new(200, "");
        let mut store = StateStore::new();
        let route = Route::post("/x").with_body(crate::template::Template::from(json!({"v": "{nope}"})));
        let result = execute_route(&transport, "http://h", Arc::new(route), &mut store);
        assert!(!result.success());
        assert!(result.message().contains("nope"));
        assert!(result.response().is_none());
        assert!(transport.calls.borrow().is_empty());
    }

    #[test]
    fn test_extraction_error_fails_successful_call() {
        let transport = Fixed::new(200, r#"{"id": 7}"#);
        let mut store = StateStore::new();
        let route = Route::get("/x").with_extractor(Extractor::new("body-object.name", "n"));
        let result = execute_route(&transport, "http://h", Arc::new(route), &mut store);
        assert!(!result.success());
        assert!(result.message().contains("name"));
        assert!(result.response().is_some());
    }

    #[test]
    fn test_extraction_error_on_failed_call_keeps_failure() {
        let transport = Fixed::new(500, "oops");
        let mut store = StateStore::new();
        let route = Route::get("/x").with_extractor(Extractor::new("body-object.id", "id"));
        let result = execute_route(&transport, "http://h", Arc::new(route), &mut store);
        assert!(!result.success());
        assert_eq!(result.message(), UNEXPECTED_RESPONSE);
        assert!(store.is_empty());
    }

    #[test]
    fn test_extraction_from_failed_call() {
        let transport = Fixed::new(404, r#"{"error": "missing"}"#);
        let mut store = StateStore::new();
        let route = Route::get("/x").with_extractor(Extractor::new("body-object.error", "err"));
        let result = execute_route(&transport, "http://h", Arc::new(route), &mut store);
        assert!(!result.success());
        assert_eq!(store.get("err"), Some(&json!("missing")));
    }

    #[test]
    fn test_select_routes() {
        let all = routes(&["/1", "/2", "/3"]);
        let picked = select_routes(Some("3, 1,x"), &all).unwrap();
        let paths: Vec<&str> = picked.iter().map(|r| r.path()).collect();
        assert_eq!(paths, vec!["/3", "/1"]);

        assert_eq!(select_routes(None, &all).unwrap().len(), 3);
        assert_eq!(
            select_routes(Some("4"), &all).unwrap_err(),
            StructuralError::UnknownRoute("4".to_string())
        );
        assert!(select_routes(Some("0"), &all).is_err());
        assert!(select_routes(Some("-1"), &all).unwrap().is_empty());
    }

    #[test]
    fn test_select_hosts() {
        let configured = vec!["http://a".to_string()];
        assert_eq!(select_hosts(None, &configured), configured);
        assert_eq!(
            select_hosts(Some("http://b, http://c,"), &configured),
            vec!["http://b".to_string(), "http://c".to_string()]
        );
    }
}
