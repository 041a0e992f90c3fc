//! Command response delimiting
//!
//! The command protocol has no length prefix. A response is everything up to
//! the `\nars>` sentinel; bytes after the sentinel belong to the next exchange.
//!
//! ```text
//! ...previous tail | response text | \n a r s > | next response...
//!                  ^ take_response() returns this slice
//! ```

use bytes::{Buf, BytesMut};

use super::constants::RESPONSE_SENTINEL;

/// Incremental accumulator for sentinel-terminated responses
#[derive(Debug, Default)]
pub struct ResponseBuffer {
    buf: BytesMut,
    /// Offset from which the next sentinel search starts
    scanned: usize,
}

impl ResponseBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer with the given initial capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            scanned: 0,
        }
    }

    /// Mutable access for `read_buf`-style socket reads
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    /// Append received bytes
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Number of buffered bytes not yet returned as a response
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Drop everything buffered
    pub fn clear(&mut self) {
        self.buf.clear();
        self.scanned = 0;
    }

    /// Pop the next complete response, if the sentinel has arrived
    pub fn take_response(&mut self) -> Option<String> {
        let pos = find_sentinel(&self.buf[self.scanned..]).map(|p| p + self.scanned);

        match pos {
            Some(pos) => {
                let body = self.buf.split_to(pos);
                self.buf.advance(RESPONSE_SENTINEL.len());
                self.scanned = 0;
                Some(String::from_utf8_lossy(&body).into_owned())
            }
            None => {
                // The sentinel may straddle the next read
                self.scanned = self.buf.len().saturating_sub(RESPONSE_SENTINEL.len() - 1);
                None
            }
        }
    }
}

fn find_sentinel(haystack: &[u8]) -> Option<usize> {
    haystack
        .windows(RESPONSE_SENTINEL.len())
        .position(|w| w == RESPONSE_SENTINEL)
}
