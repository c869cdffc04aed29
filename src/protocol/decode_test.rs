use pretty_assertions::assert_eq;
use serde_json::json;

use crate::error::Error;
use crate::opts::DecodeOpts;
use crate::protocol::decode::{Decoder, Outcome};
use crate::row::Row;

fn row(value: serde_json::Value) -> Row {
    match value {
        serde_json::Value::Object(map) => Row::from(map),
        other => panic!("expected object, got {other}"),
    }
}

/// Feed the whole envelope at once, then finish.
fn decode_all(text: &str) -> (Vec<Row>, Outcome) {
    let mut decoder = Decoder::new(DecodeOpts::default());
    let mut rows = decoder.feed(text).unwrap();
    let (tail, outcome) = decoder.finish().unwrap();
    rows.extend(tail);
    (rows, outcome)
}

#[test]
fn empty_envelope_yields_no_rows() {
    let (rows, outcome) = decode_all("[\n\n]");
    assert_eq!(rows, Vec::<Row>::new());
    assert_eq!(outcome, Outcome::Complete);
}

#[test]
fn rows_are_yielded_in_stream_order() {
    let (rows, outcome) = decode_all("[\n{\"id\":1},\n{\"id\":2},\n{\"id\":3}\n]");
    assert_eq!(
        rows,
        vec![row(json!({"id": 1})), row(json!({"id": 2})), row(json!({"id": 3}))]
    );
    assert_eq!(outcome, Outcome::Complete);
}

#[test]
fn one_byte_fragments_decode_identically() {
    let text = "[\n{\"id\":1,\"name\":\"alpha\"},\n{\"id\":2,\"name\":null}\n]";
    let (whole, _) = decode_all(text);

    let mut decoder = Decoder::new(DecodeOpts::default());
    let mut rows = Vec::new();
    for i in 0..text.len() {
        rows.extend(decoder.feed(&text[i..i + 1]).unwrap());
    }
    let (tail, outcome) = decoder.finish().unwrap();
    rows.extend(tail);

    assert_eq!(rows, whole);
    assert_eq!(outcome, Outcome::Complete);
}

#[test]
fn every_split_point_yields_the_same_rows() {
    let text = "[\n{\"id\":1},\n{\"id\":2}\n]";
    let (whole, _) = decode_all(text);
    for split in 0..=text.len() {
        let mut decoder = Decoder::new(DecodeOpts::default());
        let mut rows = decoder.feed(&text[..split]).unwrap();
        rows.extend(decoder.feed(&text[split..]).unwrap());
        let (tail, outcome) = decoder.finish().unwrap();
        rows.extend(tail);
        assert_eq!(rows, whole, "split at byte {split}");
        assert_eq!(outcome, Outcome::Complete);
    }
}

#[test]
fn rows_become_available_before_the_terminator() {
    let mut decoder = Decoder::new(DecodeOpts::default());
    let rows = decoder.feed("[\n{\"id\":1},\n{\"id\":2},\n").unwrap();
    assert_eq!(rows, vec![row(json!({"id": 1})), row(json!({"id": 2}))]);
}

#[test]
fn delimiter_text_inside_string_values_does_not_split_a_row() {
    let (rows, outcome) = decode_all("[\n{\"note\":\"a,\\nb\"},\n{\"note\":\"c\"}\n]");
    assert_eq!(
        rows,
        vec![row(json!({"note": "a,\nb"})), row(json!({"note": "c"}))]
    );
    assert_eq!(outcome, Outcome::Complete);
}

#[test]
fn fragments_after_terminator_are_ignored() {
    let mut decoder = Decoder::new(DecodeOpts::default());
    decoder.feed("[\n{\"id\":1}\n]").unwrap();
    assert_eq!(decoder.feed("{\"id\":99},\n").unwrap(), Vec::<Row>::new());
    let (tail, outcome) = decoder.finish().unwrap();
    assert_eq!(tail, Vec::<Row>::new());
    assert_eq!(outcome, Outcome::Complete);
}

#[test]
fn malformed_row_aborts_the_session() {
    let mut decoder = Decoder::new(DecodeOpts::default());
    let err = decoder.feed("[\n{\"id\": not-json},\n").unwrap_err();
    assert!(matches!(err, Error::MalformedRow(_)));

    // Session is dead afterwards
    let err = decoder.feed("{\"id\":1},\n").unwrap_err();
    assert!(matches!(err, Error::InvalidState));
}

#[test]
fn truncation_after_separator_returns_prior_rows() {
    let mut decoder = Decoder::new(DecodeOpts::default());
    let rows = decoder.feed("[\n{\"id\":1},\n{\"id\":2},\n").unwrap();
    assert_eq!(rows.len(), 2);
    let (tail, outcome) = decoder.finish().unwrap();
    assert_eq!(tail, Vec::<Row>::new());
    assert_eq!(outcome, Outcome::Truncated { error: None });
}

#[test]
fn truncation_with_complete_undelimited_row_recovers_it() {
    let mut decoder = Decoder::new(DecodeOpts::default());
    let rows = decoder.feed("[\n{\"id\":1},\n{\"id\":2}").unwrap();
    assert_eq!(rows, vec![row(json!({"id": 1}))]);
    let (tail, outcome) = decoder.finish().unwrap();
    assert_eq!(tail, vec![row(json!({"id": 2}))]);
    assert_eq!(outcome, Outcome::Truncated { error: None });
}

#[test]
fn truncation_mid_row_degrades_to_zero_additional_rows() {
    let mut decoder = Decoder::new(DecodeOpts::default());
    decoder.feed("[\n{\"id\":1},\n{\"id\":2,\"na").unwrap();
    let (tail, outcome) = decoder.finish().unwrap();
    assert_eq!(tail, Vec::<Row>::new());
    assert_eq!(outcome, Outcome::Truncated { error: None });
}

#[test]
fn embedded_error_object_is_reported_not_merged() {
    let mut decoder = Decoder::new(DecodeOpts::default());
    let rows = decoder
        .feed("[\n{\"id\":1},\n{\"error\": \"boom\"}")
        .unwrap();
    assert_eq!(rows, vec![row(json!({"id": 1}))]);
    let (tail, outcome) = decoder.finish().unwrap();
    assert_eq!(tail, Vec::<Row>::new());
    match outcome {
        Outcome::Truncated { error: Some(payload) } => assert_eq!(payload.error, "boom"),
        other => panic!("expected truncated-with-error outcome, got {other:?}"),
    }
}

#[test]
fn row_with_error_column_and_separator_is_a_genuine_row() {
    // A conforming encoder never emits a separator after its error object,
    // so a delimited {"error": ...} is an ordinary row.
    let (rows, outcome) = decode_all("[\n{\"error\":\"just a column\"},\n{\"id\":2}\n]");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0], row(json!({"error": "just a column"})));
    assert_eq!(outcome, Outcome::Complete);
}

#[test]
fn bare_error_object_is_a_server_error_not_an_empty_result() {
    let mut decoder = Decoder::new(DecodeOpts::default());
    decoder.feed("{\"error\": \"syntax error in query\"}").unwrap();
    let err = decoder.finish().unwrap_err();
    match err {
        Error::Server(payload) => assert_eq!(payload.error, "syntax error in query"),
        other => panic!("expected server error, got {other:?}"),
    }
}

#[test]
fn empty_stream_is_a_hard_failure() {
    let decoder = Decoder::new(DecodeOpts::default());
    let err = decoder.finish().unwrap_err();
    assert!(matches!(err, Error::MissingArrayStart));
}

#[test]
fn garbage_stream_is_a_hard_failure() {
    let mut decoder = Decoder::new(DecodeOpts::default());
    decoder.feed("<html>502 Bad Gateway</html>").unwrap();
    let err = decoder.finish().unwrap_err();
    assert!(matches!(err, Error::MissingArrayStart));
}

#[test]
fn buffer_cap_ignores_rows_drained_from_the_same_fragment() {
    // A single fragment far larger than the cap is fine as long as it is
    // made of delimited rows; only the undelimited residue counts.
    let body: Vec<String> = (0..20).map(|i| format!("{{\"id\":{i}}}")).collect();
    let envelope = format!("[\n{}\n]", body.join(",\n"));
    assert!(envelope.len() > 64);

    let mut opts = DecodeOpts::default();
    opts.max_buffer_len = 64;
    let mut decoder = Decoder::new(opts);
    let rows = decoder.feed(&envelope).unwrap();
    assert_eq!(rows.len(), 20);
    let (_, outcome) = decoder.finish().unwrap();
    assert_eq!(outcome, Outcome::Complete);
}

#[test]
fn buffer_cap_turns_boundary_free_streams_into_errors() {
    let mut opts = DecodeOpts::default();
    opts.max_buffer_len = 64;
    let mut decoder = Decoder::new(opts);
    decoder.feed("[\n{\"blob\":\"").unwrap();
    let err = decoder.feed(&"x".repeat(128)).unwrap_err();
    assert!(matches!(err, Error::BufferLimit { limit: 64 }));
}

#[test]
fn multibyte_character_split_across_byte_fragments() {
    // "é" is 0xC3 0xA9; split it between two chunks
    let text = "[\n{\"name\":\"caf\u{e9}\"}\n]".as_bytes();
    let split = text.iter().position(|&b| b == 0xC3).unwrap() + 1;

    let mut decoder = Decoder::new(DecodeOpts::default());
    let mut rows = decoder.feed_bytes(&text[..split]).unwrap();
    rows.extend(decoder.feed_bytes(&text[split..]).unwrap());
    let (tail, outcome) = decoder.finish().unwrap();
    rows.extend(tail);

    assert_eq!(rows, vec![row(json!({"name": "caf\u{e9}"}))]);
    assert_eq!(outcome, Outcome::Complete);
}

#[test]
fn invalid_utf8_aborts_the_session() {
    let mut decoder = Decoder::new(DecodeOpts::default());
    let err = decoder.feed_bytes(&[b'[', b'\n', 0xFF, 0xFE, b'{']).unwrap_err();
    assert!(matches!(err, Error::InvalidUtf8));
}

#[test]
fn disabled_recovery_surfaces_unexpected_eof() {
    let mut opts = DecodeOpts::default();
    opts.recover_truncation = false;
    let mut decoder = Decoder::new(opts);
    decoder.feed("[\n{\"id\":1},\n").unwrap();
    let err = decoder.finish().unwrap_err();
    assert!(matches!(err, Error::UnexpectedEof));
}
