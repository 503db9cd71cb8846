//! Line-based codec for tokio.
//!
//! This module provides a codec that splits the inbound byte stream into
//! discrete text lines and appends CRLF termination to outbound lines.
//!
//! Decoding is best-effort: invalid UTF-8 sequences are replaced rather
//! than surfaced as errors, so a malformed line can never stall the
//! receive path.

use std::io;

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

/// Codec for CRLF-terminated IRC lines.
///
/// Bytes after the last terminator stay in the buffer until a later read
/// completes the line; no byte is ever lost or duplicated across calls.
#[derive(Default)]
pub struct LineCodec {
    /// Index of next byte to check for newline
    next_index: usize,
}

impl LineCodec {
    /// Create a new line codec.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<String>> {
        if let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') {
            // Found a line - extract it, terminator included
            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            let text = String::from_utf8_lossy(&line);
            Ok(Some(text.trim_end_matches(['\r', '\n']).to_string()))
        } else {
            // No complete line yet - remember where we stopped
            self.next_index = src.len();
            Ok(None)
        }
    }
}

impl Encoder<String> for LineCodec {
    type Error = io::Error;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> io::Result<()> {
        dst.extend_from_slice(line.as_bytes());
        if !line.ends_with("\r\n") {
            dst.extend_from_slice(b"\r\n");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_complete_line() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("PING :test\r\n");

        let result = codec.decode(&mut buf).unwrap();
        assert_eq!(result, Some("PING :test".to_string()));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_partial_line_retained() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("PING :te");

        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(b"st\r\nNEXT");
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some("PING :test".to_string())
        );
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(&buf[..], b"NEXT");
    }

    #[test]
    fn test_decode_multiple_lines_in_order() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("one\r\ntwo\r\nthree\r\n");

        assert_eq!(codec.decode(&mut buf).unwrap(), Some("one".to_string()));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some("two".to_string()));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some("three".to_string()));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_decode_arbitrary_chunking() {
        // The same three lines fed one byte at a time come out identically.
        let input = b":a!b@c PRIVMSG #chan :hi\r\nPING :x\r\nNOTICE n :m\r\n";
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();
        let mut lines = Vec::new();

        for byte in input {
            buf.extend_from_slice(&[*byte]);
            while let Some(line) = codec.decode(&mut buf).unwrap() {
                lines.push(line);
            }
        }

        assert_eq!(
            lines,
            vec![":a!b@c PRIVMSG #chan :hi", "PING :x", "NOTICE n :m"]
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_invalid_utf8_is_lossy() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"PRIVMSG #t :he\xffllo\r\n"[..]);

        let line = codec.decode(&mut buf).unwrap().unwrap();
        assert!(line.starts_with("PRIVMSG #t :he"));
        assert!(line.ends_with("llo"));
    }

    #[test]
    fn test_encode_appends_crlf() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();

        codec.encode("NICK tester".to_string(), &mut buf).unwrap();
        assert_eq!(&buf[..], b"NICK tester\r\n");
    }

    #[test]
    fn test_encode_does_not_double_terminate() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();

        codec.encode("QUIT\r\n".to_string(), &mut buf).unwrap();
        assert_eq!(&buf[..], b"QUIT\r\n");
    }
}
