//! Byte-stuffed framing for stream interfaces.

pub mod hdlc;
