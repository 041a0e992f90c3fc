//! Wire protocol constants

/// Marks the end of every response on a command connection
pub const RESPONSE_SENTINEL: &[u8] = b"\nars>";

/// Switches a session into event-push mode
pub const NOTIFY_WORD: &str = "notify";

/// Switches a session into meter-push mode
pub const METER_WORD: &str = "vu";

/// Words that must never be sent on a pooled command session
pub const RESERVED_COMMANDS: [&str; 2] = [NOTIFY_WORD, METER_WORD];

/// Start-of-packet delimiter on the notify connection
pub const PACKET_DELIMITER: u8 = 0x00;

/// NUL + type + 2-byte big-endian payload length
pub const PACKET_HEADER_LEN: usize = 4;

/// High byte of a reference that marks an output address
pub const OUTPUT_FLAG: u8 = 0xC0;

/// Low 24 bits of a reference carry the index
pub const INDEX_MASK: u32 = 0x00FF_FFFF;

/// Topic prefix for raw meter streams
pub const METER_TOPIC_PREFIX: &str = "vu_";

/// Notify packet type bytes
pub mod packet_type {
    pub const VOLUME: u8 = 0x01;
    pub const BALANCE: u8 = 0x02;
    pub const BUS: u8 = 0x03;
    pub const PLAYER_STATUS: u8 = 0x04;
    pub const STATUS: u8 = 0x05;
    pub const METADATA: u8 = 0x06;
    pub const RECORDER_STATUS: u8 = 0x07;
    pub const METERS: u8 = 0x08;
    pub const RECORDER_GAIN: u8 = 0x09;
    pub const POSITION: u8 = 0x0a;
    pub const DELETED: u8 = 0x0b;
    pub const OUTPUT_DELAY: u8 = 0x0c;
    pub const PROCESSOR_LOAD: u8 = 0x10;
}

/// Returns true if the command's first word is reserved for the notify channel
pub fn is_reserved_command(command: &str) -> bool {
    command
        .split_whitespace()
        .next()
        .is_some_and(|word| RESERVED_COMMANDS.iter().any(|r| r.eq_ignore_ascii_case(word)))
}

/// Topic carrying general JSON events for a studio
pub fn event_topic(studio: &str) -> String {
    studio.to_string()
}

/// Topic carrying raw hex meter payloads for a studio
pub fn meter_topic(studio: &str) -> String {
    format!("{}{}", METER_TOPIC_PREFIX, studio)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_commands() {
        assert!(is_reserved_command("notify"));
        assert!(is_reserved_command("vu"));
        assert!(is_reserved_command("  NOTIFY  "));
        assert!(is_reserved_command("vu on"));
        assert!(!is_reserved_command("stat"));
        assert!(!is_reserved_command("notifyall"));
        assert!(!is_reserved_command(""));
    }

    #[test]
    fn test_topics() {
        assert_eq!(event_topic("main"), "main");
        assert_eq!(meter_topic("main"), "vu_main");
    }
}
