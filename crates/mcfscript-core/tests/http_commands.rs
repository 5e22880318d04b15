//! HTTP verb commands against a recording mock transport.

mod common;

use common::{bool_of, execute, int_of, parser_with_output, parser_with_transport, string_of, MockTransport};
use mcfscript_core::error::{ErrorKind, TransportError};
use mcfscript_core::http::Method;

const BASE: &str = "set base = new url 'http://localhost:8345/mcf-api-service/json';";

#[test]
fn test_get_stores_result() {
    let transport = MockTransport::new();
    transport.respond(200, r#"{"job":{"id":"123","description":"Crawl"}}"#);
    let (mut p, _) = parser_with_transport(transport.clone());

    execute(&mut p, &format!("{} GET result = base + 'jobs' + '123';", BASE)).unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, Method::Get);
    assert_eq!(requests[0].url, "http://localhost:8345/mcf-api-service/json/jobs/123");
    assert_eq!(requests[0].body, None);

    assert!(bool_of(&mut p, "result.__OK__"));
    assert!(!bool_of(&mut p, "result.__NOTFOUND__"));
    assert_eq!(int_of(&mut p, "result.__status__"), 200);
    assert_eq!(string_of(&mut p, "result.__value__[0].__type__"), "job");
    assert_eq!(
        string_of(&mut p, "result.__value__.__dict__['job'].__dict__['id'].__value__"),
        "123"
    );
}

#[test]
fn test_put_sends_configuration_json() {
    let transport = MockTransport::new();
    transport.respond(201, "");
    let (mut p, _) = parser_with_transport(transport.clone());

    execute(
        &mut p,
        &format!(
            "{} set job = << 'job' : : : << 'description' : 'Crawl' : : >> >>; \
             PUT result = job to base + 'jobs';",
            BASE
        ),
    )
    .unwrap();

    let requests = transport.requests();
    assert_eq!(requests[0].method, Method::Put);
    assert_eq!(requests[0].url, "http://localhost:8345/mcf-api-service/json/jobs");
    assert_eq!(requests[0].body.as_deref(), Some(r#"{"job":{"description":"Crawl"}}"#));
    assert!(bool_of(&mut p, "result.__CREATED__"));
    assert_eq!(int_of(&mut p, "result.__value__.__size__"), 0);
}

#[test]
fn test_post_and_delete() {
    let transport = MockTransport::new();
    transport.respond(200, "{}");
    transport.respond(404, "");
    let (mut p, _) = parser_with_transport(transport.clone());

    execute(
        &mut p,
        &format!(
            "{} POST r1 = {{ << 'start' : 'now' : : >> }} to base + 'start'; \
             DELETE r2 = base + 'jobs' + 'gone';",
            BASE
        ),
    )
    .unwrap();

    let requests = transport.requests();
    assert_eq!(requests[0].method, Method::Post);
    assert_eq!(requests[0].body.as_deref(), Some(r#"{"start":"now"}"#));
    assert_eq!(requests[1].method, Method::Delete);
    assert!(requests[1].body.is_none());
    assert!(bool_of(&mut p, "r2.__NOTFOUND__"));
}

#[test]
fn test_status_driven_script() {
    let transport = MockTransport::new();
    transport.respond(401, "");
    let (mut p, out) = parser_with_transport(transport.clone());

    let err = execute(
        &mut p,
        &format!(
            "{} GET r = base + 'jobs'; \
             if r.__UNAUTHORIZED__ then print 'login required'; error 'status ' + r.__status__; ;",
            BASE
        ),
    )
    .unwrap_err();
    assert_eq!(out.lines(), vec!["login required"]);
    assert_eq!(err.kind, ErrorKind::Raised);
    assert_eq!(err.message, "status 401");
}

#[test]
fn test_transport_failure_is_transport_error() {
    let transport = MockTransport::new();
    transport.fail(TransportError::Request("connection refused".into()));
    let (mut p, _) = parser_with_transport(transport.clone());

    let err = execute(&mut p, &format!("{} GET r = base;", BASE)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Transport);
    assert!(err.message.contains("connection refused"));
    assert!(err.position.is_some());
    assert!(bool_of(&mut p, "isnull r"));
}

#[test]
fn test_payload_must_be_configuration() {
    let transport = MockTransport::new();
    let (mut p, _) = parser_with_transport(transport.clone());

    let err = execute(&mut p, &format!("{} PUT r = 'text' to base;", BASE)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Type);
    assert!(transport.requests().is_empty());
}

#[test]
fn test_skipped_verb_sends_nothing() {
    let transport = MockTransport::new();
    let (mut p, _) = parser_with_transport(transport.clone());

    execute(
        &mut p,
        &format!("{} if false then GET r = base; PUT r = {{ }} to base; ;", BASE),
    )
    .unwrap();
    assert!(transport.requests().is_empty());
}

#[test]
fn test_verbs_need_a_transport() {
    let (mut p, _) = parser_with_output();
    assert!(!p.has_command("GET"));
    assert!(p.has_command("print"));
    let err = execute(&mut p, "GET r = 'http://localhost/';").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Syntax);
    assert!(err.message.starts_with("Bad command"));

    let (p, _) = parser_with_transport(MockTransport::new());
    for verb in ["GET", "PUT", "POST", "DELETE"] {
        assert!(p.has_command(verb), "{} should be registered", verb);
    }
}

#[test]
fn test_bad_json_body_fails_on_value_access() {
    let transport = MockTransport::new();
    transport.respond(500, "<html>Internal error</html>");
    let (mut p, _) = parser_with_transport(transport.clone());

    execute(&mut p, &format!("{} GET r = base;", BASE)).unwrap();
    assert_eq!(int_of(&mut p, "r.__status__"), 500);
    let err = common::evaluate(&mut p, "r.__value__").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Type);
}
