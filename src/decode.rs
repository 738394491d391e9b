use std::char::REPLACEMENT_CHARACTER;

/// Incremental UTF-8 decoder for a chunked response body.
///
/// A multi-byte sequence split across chunks is held back until the rest of it
/// arrives. Invalid bytes decode to U+FFFD, the same way a non-fatal text
/// decoder does.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    pending: Vec<u8>,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `chunk` (plus any held-back bytes) as is complete
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(chunk);

        let mut out = String::with_capacity(buf.len());
        let mut pos = 0;

        loop {
            match std::str::from_utf8(&buf[pos..]) {
                Ok(s) => {
                    out.push_str(s);
                    pos = buf.len();
                    break;
                }
                Err(e) => {
                    let valid = pos + e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&buf[pos..valid]));
                    match e.error_len() {
                        Some(len) => {
                            out.push(REPLACEMENT_CHARACTER);
                            pos = valid + len;
                        }
                        // Incomplete sequence at the end: wait for the next chunk
                        None => {
                            pos = valid;
                            break;
                        }
                    }
                }
            }
        }

        self.pending = buf.split_off(pos);
        out
    }

    /// End of stream: emit whatever is still held back
    pub fn finish(&mut self) -> String {
        let rest = std::mem::take(&mut self.pending);
        if rest.is_empty() {
            String::new()
        } else {
            String::from_utf8_lossy(&rest).into_owned()
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_ascii_chunks() {
        let mut decoder = StreamDecoder::new();
        assert_eq!(decoder.decode(b"He"), "He");
        assert_eq!(decoder.decode(b"llo"), "llo");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn test_split_multibyte_sequence() {
        let bytes = "aé€b".as_bytes();
        let mut decoder = StreamDecoder::new();

        // 'é' is 2 bytes and '€' is 3 bytes; cut through both of them
        assert_eq!(decoder.decode(&bytes[..2]), "a");
        assert!(decoder.has_pending());
        assert_eq!(decoder.decode(&bytes[2..4]), "é");
        assert_eq!(decoder.decode(&bytes[4..6]), "€");
        assert_eq!(decoder.decode(&bytes[6..]), "b");
        assert!(!decoder.has_pending());
    }

    #[test]
    fn test_one_byte_at_a_time() {
        let text = "日本語 ok";
        let mut decoder = StreamDecoder::new();
        let mut out = String::new();
        for b in text.as_bytes() {
            out.push_str(&decoder.decode(std::slice::from_ref(b)));
        }
        out.push_str(&decoder.finish());
        assert_eq!(out, text);
    }

    #[test]
    fn test_invalid_bytes_are_replaced() {
        let mut decoder = StreamDecoder::new();
        assert_eq!(decoder.decode(&[0xFF, b'x']), "\u{FFFD}x");
    }

    #[test]
    fn test_finish_flushes_truncated_sequence() {
        let mut decoder = StreamDecoder::new();
        assert_eq!(decoder.decode(&[b'a', 0xE2, 0x82]), "a");
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert!(!decoder.has_pending());
    }
}
