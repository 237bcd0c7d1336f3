//! NETCONF message framing (RFC 6242): end-of-message delimited for base 1.0,
//! chunked for base 1.1.

use crate::hello::Capabilities;
use thiserror::Error;

/// End-of-message delimiter used by base 1.0 framing.
pub const EOM: &[u8] = b"]]>]]>";

/// Largest chunk size the chunked framing permits (RFC 6242 section 4.2).
pub const MAX_CHUNK_SIZE: u64 = 4_294_967_295;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("malformed chunk header")]
    InvalidChunkHeader,
    #[error("malformed chunk size line")]
    InvalidChunkSize,
    #[error("chunk of {0} bytes exceeds the protocol limit")]
    ChunkTooLarge(u64),
    #[error("stream ended in the middle of a frame")]
    UnexpectedEof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// `]]>]]>`-terminated messages, base 1.0.
    Eom,
    /// `\n#<len>\n`-chunked messages, base 1.1.
    Chunked,
}

impl Framing {
    /// Chunked framing is used iff both peers advertise base 1.1.
    pub fn select(client: &Capabilities, server: &Capabilities) -> Framing {
        if client.supports_base_11() && server.supports_base_11() {
            Framing::Chunked
        } else {
            Framing::Eom
        }
    }
}

/// Frames one message for the wire.
pub fn encode(message: &[u8], framing: Framing) -> Vec<u8> {
    match framing {
        Framing::Eom => {
            let mut out = Vec::with_capacity(message.len() + EOM.len());
            out.extend_from_slice(message);
            out.extend_from_slice(EOM);
            out
        }
        Framing::Chunked => {
            // one chunk per message
            let header = format!("\n#{}\n", message.len());
            let mut out = Vec::with_capacity(header.len() + message.len() + 4);
            out.extend_from_slice(header.as_bytes());
            out.extend_from_slice(message);
            out.extend_from_slice(b"\n##\n");
            out
        }
    }
}

/// Incremental decoder. Feed raw bytes with [`extend`](Self::extend) and pull
/// complete messages with [`next_frame`](Self::next_frame); partial input
/// yields `Ok(None)` until the rest arrives.
///
/// Starts in end-of-message mode, which is what both hellos are exchanged in;
/// the session switches the mode once, right after capability negotiation.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    framing: Option<Framing>,
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> FrameDecoder {
        FrameDecoder {
            framing: None,
            buf: Vec::new(),
        }
    }

    pub fn framing(&self) -> Framing {
        self.framing.unwrap_or(Framing::Eom)
    }

    /// Locks in the framing mode chosen by hello negotiation. May be called
    /// at most once.
    pub fn set_framing(&mut self, framing: Framing) {
        debug_assert!(self.framing.is_none(), "framing renegotiated");
        self.framing = Some(framing);
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        match self.framing() {
            Framing::Eom => Ok(self.next_eom()),
            Framing::Chunked => self.next_chunked(),
        }
    }

    fn next_eom(&mut self) -> Option<Vec<u8>> {
        let pos = find(&self.buf, EOM)?;
        let message = self.buf[..pos].to_vec();
        self.buf.drain(..pos + EOM.len());
        Some(message)
    }

    fn next_chunked(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        let mut message = Vec::new();
        let mut pos = 0usize;
        loop {
            // every chunk and the end marker start with "\n#"
            if self.buf.len() < pos + 2 {
                return Ok(None);
            }
            if self.buf[pos] != b'\n' || self.buf[pos + 1] != b'#' {
                return Err(FrameError::InvalidChunkHeader);
            }
            pos += 2;
            match self.buf.get(pos) {
                None => return Ok(None),
                Some(b'#') => {
                    // end marker "\n##\n"
                    match self.buf.get(pos + 1) {
                        None => return Ok(None),
                        Some(b'\n') => {
                            self.buf.drain(..pos + 2);
                            return Ok(Some(message));
                        }
                        Some(_) => return Err(FrameError::InvalidChunkHeader),
                    }
                }
                Some(_) => {}
            }
            let digits_start = pos;
            let newline = loop {
                match self.buf.get(pos) {
                    None if pos - digits_start > 10 => return Err(FrameError::InvalidChunkSize),
                    None => return Ok(None),
                    Some(b'\n') => break pos,
                    Some(b) if b.is_ascii_digit() => pos += 1,
                    Some(_) => return Err(FrameError::InvalidChunkSize),
                }
            };
            if newline == digits_start {
                return Err(FrameError::InvalidChunkSize);
            }
            let digits = std::str::from_utf8(&self.buf[digits_start..newline])
                .map_err(|_| FrameError::InvalidChunkSize)?;
            let size: u64 = digits.parse().map_err(|_| FrameError::InvalidChunkSize)?;
            if size == 0 {
                return Err(FrameError::InvalidChunkSize);
            }
            if size > MAX_CHUNK_SIZE {
                return Err(FrameError::ChunkTooLarge(size));
            }
            pos = newline + 1;
            let size = size as usize;
            if self.buf.len() < pos + size {
                return Ok(None);
            }
            message.extend_from_slice(&self.buf[pos..pos + size]);
            pos += size;
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn decode_all(framing: Framing, input: &[u8]) -> Vec<Vec<u8>> {
        let mut decoder = FrameDecoder::new();
        decoder.set_framing(framing);
        decoder.extend(input);
        let mut frames = Vec::new();
        while let Some(frame) = decoder.next_frame().expect("decode") {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn eom_round_trip() {
        let message = b"<rpc message-id=\"1\"><get/></rpc>";
        let encoded = encode(message, Framing::Eom);
        assert_eq!(decode_all(Framing::Eom, &encoded), vec![message.to_vec()]);
    }

    #[test]
    fn eom_two_messages_in_one_read() {
        let mut wire = encode(b"<a/>", Framing::Eom);
        wire.extend_from_slice(&encode(b"<b/>", Framing::Eom));
        assert_eq!(
            decode_all(Framing::Eom, &wire),
            vec![b"<a/>".to_vec(), b"<b/>".to_vec()]
        );
    }

    #[test]
    fn eom_partial_input_yields_none() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(b"<rpc-reply>]]>]]");
        assert_eq!(decoder.next_frame().expect("decode"), None);
        decoder.extend(b">");
        assert_eq!(
            decoder.next_frame().expect("decode"),
            Some(b"<rpc-reply>".to_vec())
        );
    }

    #[test]
    fn chunked_multi_chunk_message() {
        // the literal example from RFC 6242-style framing: two chunks, one message
        let frames = decode_all(Framing::Chunked, b"\n#4\n<ok/\n#2\n>\n\n##\n");
        assert_eq!(frames, vec![b"<ok/>".to_vec()]);
    }

    #[test]
    fn chunked_round_trip() {
        let message = b"<rpc message-id=\"7\"><commit/></rpc>";
        let encoded = encode(message, Framing::Chunked);
        assert_eq!(decode_all(Framing::Chunked, &encoded), vec![message.to_vec()]);
    }

    #[test]
    fn chunked_decode_byte_at_a_time() {
        let mut decoder = FrameDecoder::new();
        decoder.set_framing(Framing::Chunked);
        let mut frames = Vec::new();
        for byte in b"\n#4\n<ok/\n#2\n>\n\n##\n" {
            decoder.extend(&[*byte]);
            if let Some(frame) = decoder.next_frame().expect("decode") {
                frames.push(frame);
            }
        }
        assert_eq!(frames, vec![b"<ok/>".to_vec()]);
    }

    #[test]
    fn chunked_zero_size_is_fatal() {
        let mut decoder = FrameDecoder::new();
        decoder.set_framing(Framing::Chunked);
        decoder.extend(b"\n#0\nx\n##\n");
        assert_eq!(decoder.next_frame(), Err(FrameError::InvalidChunkSize));
    }

    #[test]
    fn chunked_non_digit_size_is_fatal() {
        let mut decoder = FrameDecoder::new();
        decoder.set_framing(Framing::Chunked);
        decoder.extend(b"\n#4x\nabcd\n##\n");
        assert_eq!(decoder.next_frame(), Err(FrameError::InvalidChunkSize));
    }

    #[test]
    fn chunked_oversized_chunk_is_fatal() {
        let mut decoder = FrameDecoder::new();
        decoder.set_framing(Framing::Chunked);
        decoder.extend(b"\n#4294967296\n");
        assert_eq!(
            decoder.next_frame(),
            Err(FrameError::ChunkTooLarge(4_294_967_296))
        );
    }

    #[test]
    fn chunked_garbage_before_header_is_fatal() {
        let mut decoder = FrameDecoder::new();
        decoder.set_framing(Framing::Chunked);
        decoder.extend(b"<ok/>\n##\n");
        assert_eq!(decoder.next_frame(), Err(FrameError::InvalidChunkHeader));
    }

    proptest! {
        #[test]
        fn chunked_round_trip_any_payload(message in proptest::collection::vec(any::<u8>(), 1..2048)) {
            let encoded = encode(&message, Framing::Chunked);
            prop_assert_eq!(decode_all(Framing::Chunked, &encoded), vec![message]);
        }

        #[test]
        fn eom_round_trip_without_delimiter(message in proptest::collection::vec(any::<u8>(), 0..2048)) {
            prop_assume!(find(&message, EOM).is_none());
            let encoded = encode(&message, Framing::Eom);
            prop_assert_eq!(decode_all(Framing::Eom, &encoded), vec![message]);
        }

        #[test]
        fn chunked_decode_is_split_invariant(
            message in proptest::collection::vec(any::<u8>(), 1..512),
            split in any::<proptest::sample::Index>(),
        ) {
            let encoded = encode(&message, Framing::Chunked);
            let cut = split.index(encoded.len());
            let mut decoder = FrameDecoder::new();
            decoder.set_framing(Framing::Chunked);
            decoder.extend(&encoded[..cut]);
            let early = decoder.next_frame().unwrap();
            decoder.extend(&encoded[cut..]);
            let late = decoder.next_frame().unwrap();
            prop_assert_eq!(early.or(late), Some(message));
        }
    }
}
