//! Notify stream packet framing
//!
//! The notify connection pushes packets with this layout:
//!
//! ```text
//! +------+---------+-------------------+-------------------+
//! | 0x00 | type(1) | payload length(2) | payload(length)   |
//! |      |         | big-endian        |                   |
//! +------+---------+-------------------+-------------------+
//! ```
//!
//! TCP delivers these in arbitrary fragments, so the framer keeps a
//! reassembly buffer and an explicit [`ReassemblyState`] between reads.

use bytes::{Buf, Bytes, BytesMut};

use super::constants::{PACKET_DELIMITER, PACKET_HEADER_LEN};

/// A complete packet lifted off the notify stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    /// Packet type byte
    pub kind: u8,
    /// Payload bytes (exactly the advertised length)
    pub payload: Bytes,
}

/// Where the framer is within the current packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReassemblyState {
    /// Looking for the next NUL delimiter and header
    AwaitingHeader,
    /// Header consumed, waiting for `remaining` payload bytes
    AwaitingPayload { kind: u8, remaining: usize },
}

/// Incremental decoder for length-prefixed notify packets
#[derive(Debug)]
pub struct PacketFramer {
    buf: BytesMut,
    state: ReassemblyState,
    discarded: u64,
}

impl PacketFramer {
    /// Create a framer with an empty buffer
    pub fn new() -> Self {
        Self::with_capacity(8 * 1024)
    }

    /// Create a framer with the given initial buffer capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            state: ReassemblyState::AwaitingHeader,
            discarded: 0,
        }
    }

    /// Current reassembly state
    pub fn state(&self) -> ReassemblyState {
        self.state
    }

    /// Bytes held waiting for more data
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Total bytes thrown away while searching for a delimiter
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Forget any partial packet
    pub fn reset(&mut self) {
        self.buf.clear();
        self.state = ReassemblyState::AwaitingHeader;
    }

    /// Feed received bytes and return every packet they complete
    pub fn feed(&mut self, data: &[u8]) -> Vec<RawPacket> {
        self.buf.extend_from_slice(data);
        let mut packets = Vec::new();

        while let Some(packet) = self.next_packet() {
            packets.push(packet);
        }

        packets
    }

    fn next_packet(&mut self) -> Option<RawPacket> {
        loop {
            match self.state {
                ReassemblyState::AwaitingHeader => {
                    let start = match self.buf.iter().position(|&b| b == PACKET_DELIMITER) {
                        Some(start) => start,
                        None => {
                            if !self.buf.is_empty() {
                                tracing::trace!(bytes = self.buf.len(), "No packet start, discarding");
                                self.discarded += self.buf.len() as u64;
                                self.buf.clear();
                            }
                            return None;
                        }
                    };

                    if start > 0 {
                        self.discarded += start as u64;
                        self.buf.advance(start);
                    }

                    if self.buf.len() < PACKET_HEADER_LEN {
                        return None;
                    }

                    let kind = self.buf[1];
                    let remaining = u16::from_be_bytes([self.buf[2], self.buf[3]]) as usize;
                    self.buf.advance(PACKET_HEADER_LEN);
                    self.state = ReassemblyState::AwaitingPayload { kind, remaining };
                }
                ReassemblyState::AwaitingPayload { kind, remaining } => {
                    if self.buf.len() < remaining {
                        return None;
                    }

                    let payload = self.buf.split_to(remaining).freeze();
                    self.state = ReassemblyState::AwaitingHeader;
                    return Some(RawPacket { kind, payload });
                }
            }
        }
    }
}

impl Default for PacketFramer {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a packet in notify wire format
pub fn encode_packet(kind: u8, payload: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(PACKET_HEADER_LEN + payload.len());
    out.extend_from_slice(&[PACKET_DELIMITER, kind]);
    out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    out.extend_from_slice(payload);
    out.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_stream() -> Vec<u8> {
        let mut stream = Vec::new();
        stream.extend_from_slice(&encode_packet(0x01, &[0xC0, 0, 0, 5, 0x3F, 0x80, 0, 0]));
        stream.extend_from_slice(&encode_packet(0x05, &[]));
        // Payload containing the delimiter byte
        stream.extend_from_slice(&encode_packet(0x08, &[0x00, 0x10, 0x00, 0x20]));
        stream.extend_from_slice(&encode_packet(0x10, &[0, 0, 0, 0, 0, 0, 0, 0, 42]));
        stream
    }

    #[test]
    fn test_single_packet() {
        let mut framer = PacketFramer::new();
        let packets = framer.feed(&encode_packet(0x04, &[0, 0, 0, 2, 0, 0, 0, 1]));

        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].kind, 0x04);
        assert_eq!(&packets[0].payload[..], &[0, 0, 0, 2, 0, 0, 0, 1]);
        assert_eq!(framer.state(), ReassemblyState::AwaitingHeader);
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn test_multiple_packets_in_one_read() {
        let mut framer = PacketFramer::new();
        let packets = framer.feed(&sample_stream());

        let kinds: Vec<u8> = packets.iter().map(|p| p.kind).collect();
        assert_eq!(kinds, vec![0x01, 0x05, 0x08, 0x10]);
        assert!(packets[1].payload.is_empty());
    }

    #[test]
    fn test_every_split_point_matches_single_read() {
        let stream = sample_stream();
        let expected = PacketFramer::new().feed(&stream);

        for split in 0..=stream.len() {
            let mut framer = PacketFramer::new();
            let mut packets = framer.feed(&stream[..split]);
            packets.extend(framer.feed(&stream[split..]));
            assert_eq!(packets, expected, "split at {}", split);
        }
    }

    #[test]
    fn test_byte_at_a_time() {
        let stream = sample_stream();
        let expected = PacketFramer::new().feed(&stream);

        let mut framer = PacketFramer::new();
        let mut packets = Vec::new();
        for byte in &stream {
            packets.extend(framer.feed(std::slice::from_ref(byte)));
        }

        assert_eq!(packets, expected);
    }

    #[test]
    fn test_three_way_splits() {
        let stream = sample_stream();
        let expected = PacketFramer::new().feed(&stream);

        for a in 0..=stream.len() {
            for b in a..=stream.len() {
                let mut framer = PacketFramer::new();
                let mut packets = framer.feed(&stream[..a]);
                packets.extend(framer.feed(&stream[a..b]));
                packets.extend(framer.feed(&stream[b..]));
                assert_eq!(packets, expected, "splits at {} and {}", a, b);
            }
        }
    }

    #[test]
    fn test_garbage_without_delimiter_discarded() {
        let mut framer = PacketFramer::new();
        assert!(framer.feed(b"hello").is_empty());

        assert_eq!(framer.buffered(), 0);
        assert_eq!(framer.discarded(), 5);
    }

    #[test]
    fn test_garbage_before_packet_skipped() {
        let mut framer = PacketFramer::new();
        let mut data = b"junk".to_vec();
        data.extend_from_slice(&encode_packet(0x0b, &[0, 0, 1, 0]));

        let packets = framer.feed(&data);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].kind, 0x0b);
        assert_eq!(framer.discarded(), 4);
    }

    #[test]
    fn test_partial_header_kept() {
        let mut framer = PacketFramer::new();
        assert!(framer.feed(&[0x00, 0x04]).is_empty());
        assert_eq!(framer.buffered(), 2);
        assert_eq!(framer.state(), ReassemblyState::AwaitingHeader);

        assert!(framer.feed(&[0x00, 0x02]).is_empty());
        assert_eq!(
            framer.state(),
            ReassemblyState::AwaitingPayload {
                kind: 0x04,
                remaining: 2
            }
        );

        let packets = framer.feed(&[0xAA, 0xBB]);
        assert_eq!(packets.len(), 1);
        assert_eq!(&packets[0].payload[..], &[0xAA, 0xBB]);
    }

    #[test]
    fn test_partial_payload_not_dispatched() {
        let mut framer = PacketFramer::new();
        let packet = encode_packet(0x02, &[0, 0, 0, 1, 0x3F, 0, 0, 0]);

        assert!(framer.feed(&packet[..6]).is_empty());
        assert_eq!(framer.feed(&packet[6..]).len(), 1);
    }

    #[test]
    fn test_reset_drops_partial_packet() {
        let mut framer = PacketFramer::new();
        let packet = encode_packet(0x02, &[0, 0, 0, 1, 0x3F, 0, 0, 0]);
        framer.feed(&packet[..6]);

        framer.reset();
        assert_eq!(framer.state(), ReassemblyState::AwaitingHeader);
        assert_eq!(framer.buffered(), 0);

        let packets = framer.feed(&encode_packet(0x05, &[]));
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].kind, 0x05);
    }
}
