//! Line framing for the judge's event stream.
//!
//! Bytes are split on `\n` before any text decoding happens. A newline byte
//! never occurs inside a multi-byte UTF-8 sequence, so a character split across
//! two chunks is always reassembled before it is decoded.

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

pub const DATA_PREFIX: &[u8] = b"data: ";

/// One relevant line framed out of the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataFrame {
    /// Payload of a `data: ` line with the prefix stripped.
    Data(String),
    /// A line that exceeded the length limit and was thrown away. Carries the
    /// number of bytes discarded.
    Oversized(usize),
}

#[derive(Debug, Clone)]
pub struct DataLineCodec {
    /// Index in the buffer up to which we already know there is no newline.
    next_index: usize,
    max_length: usize,
    /// Bytes dropped so far from an over-long line, if we're inside one.
    discarding: Option<usize>,
}

impl DataLineCodec {
    pub fn new() -> DataLineCodec {
        DataLineCodec::new_with_max_length(usize::MAX)
    }

    pub fn new_with_max_length(max_length: usize) -> DataLineCodec {
        DataLineCodec {
            next_index: 0,
            max_length,
            discarding: None,
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    fn classify(line: &[u8]) -> Option<DataFrame> {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        match line.strip_prefix(DATA_PREFIX) {
            Some(payload) => Some(DataFrame::Data(
                String::from_utf8_lossy(payload).into_owned(),
            )),
            None => {
                if !line.is_empty() {
                    tracing::trace!("ignoring line: {}", String::from_utf8_lossy(line));
                }
                None
            }
        }
    }
}

impl Default for DataLineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for DataLineCodec {
    type Item = DataFrame;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<DataFrame>, std::io::Error> {
        loop {
            let newline = src[self.next_index..]
                .iter()
                .position(|b| *b == b'\n')
                .map(|offset| self.next_index + offset);

            if let Some(dropped) = self.discarding {
                match newline {
                    Some(idx) => {
                        src.advance(idx + 1);
                        self.next_index = 0;
                        self.discarding = None;
                        return Ok(Some(DataFrame::Oversized(dropped + idx)));
                    }
                    None => {
                        let len = src.len();
                        src.clear();
                        self.next_index = 0;
                        self.discarding = Some(dropped + len);
                        return Ok(None);
                    }
                }
            }

            match newline {
                Some(idx) if idx <= self.max_length => {
                    let line = src.split_to(idx + 1);
                    self.next_index = 0;
                    if let Some(frame) = Self::classify(&line[..idx]) {
                        return Ok(Some(frame));
                    }
                }
                Some(_) => {
                    self.discarding = Some(0);
                }
                None if src.len() > self.max_length => {
                    self.discarding = Some(0);
                }
                None => {
                    self.next_index = src.len();
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<DataFrame>, std::io::Error> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }
        // An unterminated trailing line is dropped, never parsed.
        if !buf.is_empty() {
            tracing::debug!("discarding {} trailing bytes without newline", buf.len());
            buf.clear();
        }
        self.next_index = 0;
        self.discarding = None;
        Ok(None)
    }
}
