//! Byte-at-a-time deframer for HDLC-stuffed streams.
//!
//! Unlike a scan-for-delimiters accumulator, the deframer never holds more
//! than `cap` payload bytes for a connection. Bytes past the cap are counted
//! but not stored, and the frame they belong to is reported as oversized
//! when its closing flag arrives. The stream stays in sync: the next frame
//! starts cleanly after that flag.

use boundary_core::constants::HEADER_MINSIZE;
use boundary_core::framing::hdlc::{ESC, ESC_MASK, FLAG};

/// Outcome of one closed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deframed {
    /// A deliverable packet.
    Packet(Vec<u8>),
    /// The payload exceeded the cap and was discarded in full.
    Oversized { len: usize },
    /// Non-empty but shorter than the smallest valid header.
    Runt { len: usize },
}

#[derive(Debug)]
pub struct FrameDeframer {
    cap: usize,
    buf: Vec<u8>,
    in_frame: bool,
    escape: bool,
    /// Unescaped bytes dropped past `cap` in the current frame.
    overflow: usize,
}

impl FrameDeframer {
    /// A deframer that buffers at most `cap` payload bytes.
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            buf: Vec::with_capacity(cap),
            in_frame: false,
            escape: false,
            overflow: 0,
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Whether no partial frame is buffered.
    pub fn is_idle(&self) -> bool {
        self.buf.is_empty() && self.overflow == 0
    }

    /// Consume bytes from the stream and return every frame they closed.
    ///
    /// Empty frames (keepalives, and the gap between back-to-back frames)
    /// produce nothing. Bytes before the first flag are ignored.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Deframed> {
        let mut closed = Vec::new();
        for &byte in bytes {
            if byte == FLAG {
                if self.in_frame
                    && let Some(frame) = self.close()
                {
                    closed.push(frame);
                }
                self.in_frame = true;
                self.escape = false;
                continue;
            }
            if !self.in_frame {
                continue;
            }

            let byte = if self.escape {
                self.escape = false;
                byte ^ ESC_MASK
            } else if byte == ESC {
                self.escape = true;
                continue;
            } else {
                byte
            };

            if self.buf.len() < self.cap {
                self.buf.push(byte);
            } else {
                self.overflow += 1;
            }
        }
        closed
    }

    fn close(&mut self) -> Option<Deframed> {
        let len = self.buf.len() + self.overflow;
        let overflowed = self.overflow > 0;
        self.overflow = 0;

        if overflowed {
            self.buf.clear();
            return Some(Deframed::Oversized { len });
        }
        if len == 0 {
            return None;
        }
        if len < HEADER_MINSIZE {
            self.buf.clear();
            return Some(Deframed::Runt { len });
        }
        let packet = std::mem::replace(&mut self.buf, Vec::with_capacity(self.cap));
        Some(Deframed::Packet(packet))
    }
}
