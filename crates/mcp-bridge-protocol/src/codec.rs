use serde_json::Value;

use crate::{envelope::Envelope, error::CodecError};

/// The result of parsing a request body: either a single envelope or a batch.
#[derive(Debug)]
pub enum ParsedBody {
    Single(Envelope),
    Batch(Vec<Envelope>),
}

/// Parse a decoded HTTP body into one or more JSON-RPC envelopes.
///
/// Accepts a single object or a non-empty array of objects; rejects malformed
/// JSON with [`CodecError::ParseError`] and an empty array with
/// [`CodecError::EmptyBatch`].
pub fn parse_body(bytes: &[u8]) -> Result<ParsedBody, CodecError> {
    let value: Value = serde_json::from_slice(bytes)?;
    parse_value(value)
}

pub fn parse_value(value: Value) -> Result<ParsedBody, CodecError> {
    match value {
        Value::Array(items) => {
            if items.is_empty() {
                return Err(CodecError::EmptyBatch);
            }
            let envelopes = items
                .into_iter()
                .map(Envelope::from_value)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ParsedBody::Batch(envelopes))
        }
        other => Envelope::from_value(other).map(ParsedBody::Single),
    }
}

/// Parse a single line of subprocess stdout as a JSON-RPC envelope.
pub fn parse_line(line: &str) -> Result<Envelope, CodecError> {
    let value: Value = serde_json::from_str(line)?;
    Envelope::from_value(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_object_parses_as_single() {
        let body = json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}).to_string();
        match parse_body(body.as_bytes()).unwrap() {
            ParsedBody::Single(_) => {}
            ParsedBody::Batch(_) => panic!("expected single"),
        }
    }

    #[test]
    fn array_parses_as_batch_preserving_order() {
        let body = json!([
            {"jsonrpc": "2.0", "id": 1, "method": "a"},
            {"jsonrpc": "2.0", "id": 2, "method": "b"},
        ])
        .to_string();
        match parse_body(body.as_bytes()).unwrap() {
            ParsedBody::Batch(envs) => {
                assert_eq!(envs.len(), 2);
                assert_eq!(envs[0].method(), Some("a"));
                assert_eq!(envs[1].method(), Some("b"));
            }
            ParsedBody::Single(_) => panic!("expected batch"),
        }
    }

    #[test]
    fn empty_batch_is_rejected() {
        assert!(matches!(
            parse_body(b"[]"),
            Err(CodecError::EmptyBatch)
        ));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            parse_body(b"{not json"),
            Err(CodecError::ParseError(_))
        ));
    }
}
