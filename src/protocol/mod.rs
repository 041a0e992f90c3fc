//! Studio wire protocol
//!
//! Each studio exposes two independent TCP connections:
//!
//! ```text
//!   command connection                  notify connection
//!   ------------------                  -----------------
//!   "stat\n"          ───────►          "notify\nvu\n"   ───────►
//!   ◄─────── "...\nars>"                ◄─── 00 <type> <len:2> <payload>
//!                                       ◄─── 00 <type> <len:2> <payload>
//! ```
//!
//! The command side is line-oriented text delimited by the `\nars>`
//! sentinel ([`response`]). The notify side is a binary push stream that
//! [`framer`] reassembles and [`event`] interprets.

pub mod constants;
pub mod event;
pub mod framer;
pub mod response;

pub use event::{DecodedEvent, EventDecoder, EventKind, EventValue};
pub use framer::{PacketFramer, RawPacket, ReassemblyState};
pub use response::ResponseBuffer;
