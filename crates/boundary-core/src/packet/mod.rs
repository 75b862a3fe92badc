//! Packet envelope: flag byte, context byte and the raw wire layout.

pub mod context;
pub mod flags;
pub mod wire;
