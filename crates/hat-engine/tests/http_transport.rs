//! End-to-end runs through the reqwest transport against a local server.

use hat_engine::{
    Extractor, HttpTransport, Outcome, ResponseTemplate, Route, RunConfig, RunOptions, Template,
};
use serde_json::json;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

/// Serve until the test process exits.
///
/// - `GET /id` returns `{"id":7}`
/// - `POST /echo` returns the request body with 201
/// - `GET /header` returns the `X-Trace` request header as text
/// - anything else is a 404
fn start_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let _ = handle(stream);
        }
    });
    format!("http://{addr}/")
}

fn handle(mut stream: TcpStream) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);

    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let mut content_length = 0;
    let mut trace = String::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line)?;
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.parse().unwrap_or(0);
            } else if name.eq_ignore_ascii_case("x-trace") {
                trace = value.to_string();
            }
        }
    }

    let mut body = vec![0; content_length];
    reader.read_exact(&mut body)?;

    let (status, reason, payload) = match (method.as_str(), path.as_str()) {
        ("GET", "/id") => (200, "OK", br#"{"id":7}"#.to_vec()),
        ("POST", "/echo") => (201, "Created", body),
        ("GET", "/header") => (200, "OK", trace.into_bytes()),
        _ => (404, "Not Found", Vec::new()),
    };

    write!(
        stream,
        "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        payload.len()
    )?;
    stream.write_all(&payload)?;
    stream.flush()
}

fn chained_routes() -> Vec<Route> {
    vec![
        Route::get("/id").with_extractor(Extractor::new("body-object.id", "x")),
        Route::post("/echo")
            .with_body(Template::from(json!({"v": "{x}"})))
            .with_response(ResponseTemplate::status(201).with_body(Template::from(json!({"v": "7"})))),
        Route::get("/header")
            .with_header("X-Trace", "trace-{x}")
            .with_response(ResponseTemplate::status(200).with_body("trace-7")),
    ]
}

#[test]
fn chained_scenario_with_session() {
    let host = start_server();
    let config = RunConfig::new([host.clone()], chained_routes());

    let results: Vec<_> = config.visit().unwrap().collect();
    assert_eq!(results.len(), 3);
    for result in &results {
        assert!(result.success(), "{}", Outcome::from(result.clone()).render(2));
    }

    let echo = results[1].response().unwrap();
    assert_eq!(echo.status, 201);
    assert_eq!(echo.request.url, format!("{host}echo"));
    assert_eq!(echo.json(), Some(json!({"v": "7"})));
}

#[test]
fn chained_scenario_without_session() {
    let host = start_server();
    let config = RunConfig::new([host], chained_routes())
        .with_options(RunOptions::default().with_session(false));

    assert!(config.visit().unwrap().all(|result| result.success()));
}

#[test]
fn record_describes_the_exchange() {
    let host = start_server();
    let config = RunConfig::new([host.clone()], chained_routes());
    let results: Vec<_> = config.traverse(HttpTransport::new(true).unwrap()).collect();

    let record = results[1].to_record();
    assert_eq!(record["success"], json!(true));
    assert_eq!(record["method"], json!("POST"));
    assert_eq!(record["url"], json!(format!("{host}echo")));
    assert_eq!(record["request"]["headers"]["Content-Type"], json!("application/json"));
    assert_eq!(record["request"]["body-object"], json!({"v": "7"}));
    assert_eq!(record["response"]["status-code"], json!(201));
    assert_eq!(record["response"]["status"], json!("Created"));
    assert_eq!(record["response"]["body-object"], json!({"v": "7"}));
}

#[test]
fn unexpected_status_is_reported() {
    let host = start_server();
    let config = RunConfig::new([host], [Route::get("/missing")]);
    let results: Vec<_> = config.visit().unwrap().collect();

    assert!(!results[0].success());
    assert_eq!(results[0].message(), "Unexpected response");
    assert_eq!(results[0].response().unwrap().status, 404);
}

#[test]
fn connection_refused_is_a_failed_result() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = RunConfig::new([format!("http://{addr}")], [Route::get("/a"), Route::get("/b")]);
    let results: Vec<_> = config.visit().unwrap().collect();

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| !r.success() && r.response().is_none()));
    assert!(results[0].message().starts_with("HTTP request failed"));
    let message = results[0].message().to_lowercase();
    assert!(message.contains("refused"), "{message}");
}
