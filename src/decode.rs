//! Incremental decoding of a JSON stream body.
//!
//! The streaming API writes one JSON object per message, normally followed by
//! `\r\n`, and sends bare `\r\n` as keep-alives. HTTP chunk boundaries do not
//! line up with message boundaries, so bytes are buffered until a complete
//! top-level value is available.
//!
//! A partial object or array cannot complete before a closing `}` or `]`
//! arrives, so after an incomplete parse the decoder does not parse again
//! until a chunk carrying one of those bytes is pushed. Each retry still
//! parses the pending message from its start.

use serde_json::{Deserializer, Value};

/// Buffers body chunks and yields complete top-level JSON values.
#[derive(Debug, Default)]
pub struct JsonStreamDecoder {
    buffer: Vec<u8>,
    offset: usize,
    // Pending bytes are an unfinished object or array.
    awaiting_close: bool,
}

impl JsonStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk of the response body.
    pub fn push(&mut self, chunk: &[u8]) {
        self.compact();
        if self.awaiting_close && chunk.iter().any(|&byte| matches!(byte, b'}' | b']')) {
            self.awaiting_close = false;
        }
        self.buffer.extend_from_slice(chunk);
    }

    /// Returns the next complete value, or `None` if more bytes are needed.
    ///
    /// Values may be separated by any JSON whitespace or by nothing at all.
    pub fn next_value(&mut self) -> Result<Option<Value>, serde_json::Error> {
        if self.awaiting_close {
            return Ok(None);
        }

        let pending = &self.buffer[self.offset..];
        let mut values = Deserializer::from_slice(pending).into_iter::<Value>();

        match values.next() {
            Some(Ok(value)) => {
                self.offset += values.byte_offset();
                Ok(Some(value))
            }
            Some(Err(err)) if err.is_eof() => {
                self.awaiting_close = matches!(
                    pending.iter().find(|byte| !byte.is_ascii_whitespace()),
                    Some(&(b'{' | b'['))
                );
                Ok(None)
            }
            Some(Err(err)) => Err(err),
            None => {
                self.offset += values.byte_offset();
                Ok(None)
            }
        }
    }

    /// Checks that nothing but whitespace is left once the body has ended.
    pub fn finish(&self) -> Result<(), serde_json::Error> {
        let pending = &self.buffer[self.offset..];
        if pending.iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }
        serde_json::from_slice::<Value>(pending).map(|_| ())
    }

    fn compact(&mut self) {
        if self.offset > 0 {
            self.buffer.drain(..self.offset);
            self.offset = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::JsonStreamDecoder;

    fn drain(decoder: &mut JsonStreamDecoder) -> Vec<serde_json::Value> {
        let mut values = Vec::new();
        while let Some(value) = decoder.next_value().expect("valid stream") {
            values.push(value);
        }
        values
    }

    #[test]
    fn decodes_newline_delimited_messages() {
        let mut decoder = JsonStreamDecoder::new();
        decoder.push(b"{\"id\":1}\r\n{\"id\":2}\r\n");
        assert_eq!(drain(&mut decoder), vec![json!({"id": 1}), json!({"id": 2})]);
        assert!(decoder.finish().is_ok());
    }

    #[test]
    fn decodes_back_to_back_messages() {
        let mut decoder = JsonStreamDecoder::new();
        decoder.push(br#"{"id":1}{"id":2}"#);
        assert_eq!(drain(&mut decoder), vec![json!({"id": 1}), json!({"id": 2})]);
    }

    #[test]
    fn skips_keep_alive_lines() {
        let mut decoder = JsonStreamDecoder::new();
        decoder.push(b"\r\n\r\n");
        assert!(drain(&mut decoder).is_empty());
        decoder.push(b"{\"text\":\"hi\"}\r\n\r\n");
        assert_eq!(drain(&mut decoder), vec![json!({"text": "hi"})]);
        assert!(decoder.finish().is_ok());
    }

    #[test]
    fn waits_for_a_message_split_across_chunks() {
        let mut decoder = JsonStreamDecoder::new();
        decoder.push(br#"{"text":"awesome "#);
        assert!(decoder.next_value().expect("partial is not an error").is_none());

        decoder.push(b"guy\",\"id\":5}\r\n{\"id\"");
        assert_eq!(
            drain(&mut decoder),
            vec![json!({"text": "awesome guy", "id": 5})]
        );

        decoder.push(b":6}\r\n");
        assert_eq!(drain(&mut decoder), vec![json!({"id": 6})]);
    }

    #[test]
    fn skips_reparsing_until_a_closing_bracket_arrives() {
        let mut decoder = JsonStreamDecoder::new();
        decoder.push(b"\r\n{\"text\":\"a");
        assert!(decoder.next_value().expect("partial is not an error").is_none());
        assert!(decoder.awaiting_close);

        decoder.push(b"bc");
        assert!(decoder.awaiting_close);
        assert!(decoder.next_value().expect("still partial").is_none());

        decoder.push(b"\",\"entities\":[]");
        assert!(!decoder.awaiting_close);
        assert!(decoder.next_value().expect("still partial").is_none());
        assert!(decoder.awaiting_close);

        decoder.push(b"}\r\n");
        assert_eq!(
            decoder.next_value().expect("complete"),
            Some(json!({"text": "abc", "entities": []}))
        );
        assert!(decoder.finish().is_ok());
    }

    #[test]
    fn malformed_message_is_an_error() {
        let mut decoder = JsonStreamDecoder::new();
        decoder.push(b"{\"id\":1}\r\n{not json}\r\n");
        assert_eq!(decoder.next_value().expect("first is valid"), Some(json!({"id": 1})));
        assert!(decoder.next_value().is_err());
    }

    #[test]
    fn truncated_message_fails_on_finish() {
        let mut decoder = JsonStreamDecoder::new();
        decoder.push(br#"{"id":1}{"id":"#);
        assert_eq!(drain(&mut decoder), vec![json!({"id": 1})]);
        assert!(decoder.finish().is_err());
    }
}
