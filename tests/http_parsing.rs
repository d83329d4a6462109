//! Fixture scenarios from spec.md §8, run against the public API.
//!
//! Integration tests link the crate as an ordinary dependency, so unlike
//! the inline `#[cfg(test)]` modules these are free to reach for `std`
//! collections for convenience even though the crate itself is `no_std`.

use flowparse::{MessageType, Parser, Settings};

#[derive(Default)]
struct Recorded {
    url: Vec<u8>,
    headers: Vec<(Vec<u8>, Vec<u8>)>,
    body: Vec<u8>,
    message_begins: u32,
    headers_complete: u32,
    message_completes: u32,
    chunk_headers: u32,
    chunk_completes: u32,
    in_progress_field: Vec<u8>,
}

fn on_message_begin(p: &mut Parser<Recorded>) -> i32 {
    p.data_mut().message_begins += 1;
    0
}
fn on_url(p: &mut Parser<Recorded>, s: &[u8]) -> i32 {
    p.data_mut().url.extend_from_slice(s);
    0
}
fn on_header_field(p: &mut Parser<Recorded>, s: &[u8]) -> i32 {
    let d = p.data_mut();
    if d.in_progress_field.is_empty() {
        d.headers.push((Vec::new(), Vec::new()));
    }
    d.in_progress_field.extend_from_slice(s);
    d.headers.last_mut().unwrap().0.extend_from_slice(s);
    0
}
fn on_header_value(p: &mut Parser<Recorded>, s: &[u8]) -> i32 {
    let d = p.data_mut();
    d.in_progress_field.clear();
    d.headers.last_mut().unwrap().1.extend_from_slice(s);
    0
}
fn on_headers_complete(p: &mut Parser<Recorded>) -> i32 {
    p.data_mut().headers_complete += 1;
    0
}
fn on_body(p: &mut Parser<Recorded>, s: &[u8]) -> i32 {
    p.data_mut().body.extend_from_slice(s);
    0
}
fn on_message_complete(p: &mut Parser<Recorded>) -> i32 {
    p.data_mut().message_completes += 1;
    0
}
fn on_chunk_header(p: &mut Parser<Recorded>) -> i32 {
    p.data_mut().chunk_headers += 1;
    0
}
fn on_chunk_complete(p: &mut Parser<Recorded>) -> i32 {
    p.data_mut().chunk_completes += 1;
    0
}

fn settings() -> Settings<Recorded> {
    Settings {
        on_message_begin: Some(on_message_begin),
        on_url: Some(on_url),
        on_header_field: Some(on_header_field),
        on_header_value: Some(on_header_value),
        on_headers_complete: Some(on_headers_complete),
        on_body: Some(on_body),
        on_message_complete: Some(on_message_complete),
        on_chunk_header: Some(on_chunk_header),
        on_chunk_complete: Some(on_chunk_complete),
        ..Settings::default()
    }
}

const SIMPLE_GET: &[u8] =
    b"GET /test HTTP/1.1\r\nUser-Agent: curl/7.18.0\r\nHost: 0.0.0.0:5000\r\nAccept: */*\r\n\r\n";
const FUNKY_CONTENT_LENGTH: &[u8] = b"GET /path HTTP/1.0\r\nconTENT-Length: 5\r\n\r\nHELLO";
const CHUNKED_WITH_TRAILERS: &[u8] = b"POST /p HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n6\r\n world\r\n0\r\nVary: *\r\nContent-Type: text/plain\r\n\r\n";

#[test]
fn scenario_1_simple_get() {
    let input = SIMPLE_GET;
    let mut p = Parser::new(MessageType::Request, Recorded::default());
    let s = settings();
    assert_eq!(p.execute(&s, input), input.len());
    assert_eq!(p.method(), Some(flowparse::Method::Get));
    assert_eq!(p.data().url, b"/test");
    assert_eq!(p.data().headers.len(), 3);
    assert!(p.data().body.is_empty());
    assert!(p.should_keep_alive());
}

#[test]
fn scenario_2_get_with_query_and_fragment() {
    let input: &[u8] = b"GET /forums/1/topics/2375?page=1#posts-17408 HTTP/1.1\r\n\r\n";
    let mut p = Parser::new(MessageType::Request, Recorded::default());
    let s = settings();
    assert_eq!(p.execute(&s, input), input.len());
    assert_eq!(p.data().url, b"/forums/1/topics/2375?page=1#posts-17408");
    let url = p.url().expect("request URL decomposed");
    assert_eq!(url.path(input), Some(&b"/forums/1/topics/2375"[..]));
    assert_eq!(url.query(input), Some(&b"page=1"[..]));
    assert_eq!(url.fragment(input), Some(&b"posts-17408"[..]));
}

#[test]
fn scenario_3_funky_cased_content_length() {
    let input = FUNKY_CONTENT_LENGTH;
    let mut p = Parser::new(MessageType::Request, Recorded::default());
    let s = settings();
    assert_eq!(p.execute(&s, input), input.len());
    assert_eq!(p.data().body, b"HELLO");
    assert!(!p.should_keep_alive());
}

#[test]
fn scenario_4_chunked_with_trailers() {
    let input = CHUNKED_WITH_TRAILERS;
    let mut p = Parser::new(MessageType::Request, Recorded::default());
    let s = settings();
    assert_eq!(p.execute(&s, input), input.len());
    assert_eq!(p.data().body, b"hello world");
    assert_eq!(p.data().chunk_headers, 2);
    assert_eq!(p.data().message_completes, 1);
}

#[test]
fn scenario_5_chunk_with_parameters() {
    let input: &[u8] =
        b"POST /p HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n5; ihatew3;whatthefuck=aretheseparametersfor\r\nhello\r\n6; blahblah\r\n world\r\n0\r\n\r\n";
    let mut p = Parser::new(MessageType::Request, Recorded::default());
    let s = settings();
    assert_eq!(p.execute(&s, input), input.len());
    assert_eq!(p.data().body, b"hello world");
}

#[test]
fn scenario_6_conflicting_framing_is_an_error() {
    let input: &[u8] =
        b"POST / HTTP/1.1\r\nContent-Length: 5\r\nTransfer-Encoding: chunked\r\n\r\nhello";
    let mut p = Parser::new(MessageType::Request, Recorded::default());
    let s = settings();
    p.execute(&s, input);
    assert_eq!(p.error(), flowparse::ErrorKind::UnexpectedContentLength);
}

#[test]
fn scenario_7_malformed_start_line() {
    let input: &[u8] = b"GET / HTP/1.1\r\n\r\n";
    let mut p = Parser::new(MessageType::Request, Recorded::default());
    let s = settings();
    p.execute(&s, input);
    assert_eq!(p.error(), flowparse::ErrorKind::InvalidConstant);
}

#[test]
fn scenario_8_pipelined_messages_every_split_point() {
    let mut whole = Vec::new();
    whole.extend_from_slice(SIMPLE_GET);
    whole.extend_from_slice(FUNKY_CONTENT_LENGTH);
    whole.extend_from_slice(CHUNKED_WITH_TRAILERS);

    // Every split point is required by spec.md §8 scenario 8; the full
    // sweep is ~180 parses of a ~230 byte buffer, cheap enough to run in
    // full rather than spot-check a sample.
    for split in 1..whole.len() {
        let mut p = Parser::new(MessageType::Request, Recorded::default());
        let s = settings();
        let a = p.execute(&s, &whole[..split]);
        assert_eq!(p.error(), flowparse::ErrorKind::Ok, "split at {split}");
        let b = p.execute(&s, &whole[split..]);
        assert_eq!(p.error(), flowparse::ErrorKind::Ok, "split at {split}");
        assert_eq!(a + b, whole.len(), "split at {split}");
        assert_eq!(p.data().message_completes, 3, "split at {split}");
    }
}

#[test]
fn scenario_9_standalone_url_parse() {
    let c = flowparse::parse_url(b"http://user@host:8080/path?q#f", false).unwrap();
    use flowparse::FieldSet;
    assert!(c.field_set().has(FieldSet::SCHEMA));
    assert!(c.field_set().has(FieldSet::USERINFO));
    assert!(c.field_set().has(FieldSet::HOST));
    assert!(c.field_set().has(FieldSet::PORT));
    assert!(c.field_set().has(FieldSet::PATH));
    assert!(c.field_set().has(FieldSet::QUERY));
    assert!(c.field_set().has(FieldSet::FRAGMENT));
    assert_eq!(c.port(), Some(8080));

    assert!(flowparse::parse_url(b"http:///toto", false).is_err());

    let c = flowparse::parse_url(b"host:443", true).unwrap();
    assert!(c.field_set().has(FieldSet::HOST));
    assert!(c.field_set().has(FieldSet::PORT));
    assert!(!c.field_set().has(FieldSet::PATH));
    assert!(flowparse::parse_url(b"host:443/path", true).is_err());
}

#[test]
fn slice_invariance_byte_at_a_time() {
    let input = SIMPLE_GET;
    let mut whole_parser = Parser::new(MessageType::Request, Recorded::default());
    let whole_settings = settings();
    whole_parser.execute(&whole_settings, input);

    let mut byte_parser = Parser::new(MessageType::Request, Recorded::default());
    let byte_settings = settings();
    for &b in input {
        byte_parser.execute(&byte_settings, core::slice::from_ref(&b));
    }

    assert_eq!(whole_parser.data().url, byte_parser.data().url);
    assert_eq!(whole_parser.data().headers.len(), byte_parser.data().headers.len());
    assert_eq!(whole_parser.data().body, byte_parser.data().body);
    assert_eq!(
        whole_parser.data().message_completes,
        byte_parser.data().message_completes
    );
}

#[test]
fn bare_lf_header_value_does_not_panic() {
    let input: &[u8] = b"GET / HTTP/1.1\r\nFoo: bar\n\r\n";
    let mut p = Parser::new(MessageType::Request, Recorded::default());
    let s = settings();
    p.execute(&s, input);
    assert_eq!(p.error(), flowparse::ErrorKind::Strict);
}

#[test]
fn length_counter_bound_raises_header_overflow() {
    let mut input = b"GET / HTTP/1.1\r\nX-Long: ".to_vec();
    input.extend(core::iter::repeat(b'a').take(200));
    input.extend_from_slice(b"\r\n\r\n");
    let mut p = Parser::new(MessageType::Request, Recorded::default())
        .with_max_header_size(32);
    let s = settings();
    p.execute(&s, &input);
    assert_eq!(p.error(), flowparse::ErrorKind::HeaderOverflow);
}
