//! HDLC-style byte stuffing.
//!
//! ESC bytes must be escaped before FLAG bytes. A frame with nothing between
//! its two delimiters is a keepalive.

use alloc::vec::Vec;

use crate::error::FramingError;

pub const FLAG: u8 = 0x7E;
pub const ESC: u8 = 0x7D;
pub const ESC_MASK: u8 = 0x20;

/// The two-byte keepalive frame.
pub const KEEPALIVE_FRAME: [u8; 2] = [FLAG, FLAG];

/// Escape special bytes in data using HDLC byte-stuffing.
pub fn hdlc_escape(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len());
    for &byte in data {
        match byte {
            ESC | FLAG => {
                result.push(ESC);
                result.push(byte ^ ESC_MASK);
            }
            _ => result.push(byte),
        }
    }
    result
}

/// Frame data with HDLC delimiters: FLAG + escape(data) + FLAG.
pub fn hdlc_frame(data: &[u8]) -> Vec<u8> {
    let escaped = hdlc_escape(data);
    let mut framed = Vec::with_capacity(escaped.len() + 2);
    framed.push(FLAG);
    framed.extend_from_slice(&escaped);
    framed.push(FLAG);
    framed
}

/// Strip delimiters from one complete frame and unescape its contents.
pub fn hdlc_unframe(framed: &[u8]) -> Result<Vec<u8>, FramingError> {
    if framed.len() < 2 || framed[0] != FLAG || framed[framed.len() - 1] != FLAG {
        return Err(FramingError::MissingDelimiter);
    }

    let inner = &framed[1..framed.len() - 1];
    let mut result = Vec::with_capacity(inner.len());
    let mut bytes = inner.iter();
    while let Some(&byte) = bytes.next() {
        if byte == ESC {
            let &next = bytes.next().ok_or(FramingError::IncompleteEscape)?;
            result.push(next ^ ESC_MASK);
        } else {
            result.push(byte);
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_escape_order() {
        assert_eq!(hdlc_escape(&[ESC]), vec![ESC, 0x5D]);
        assert_eq!(hdlc_escape(&[FLAG]), vec![ESC, 0x5E]);
        assert_eq!(hdlc_escape(&[ESC, FLAG]), vec![ESC, 0x5D, ESC, 0x5E]);
    }

    #[test]
    fn test_frame_layout() {
        let framed = hdlc_frame(&[0x01, FLAG, 0x02]);
        assert_eq!(framed, vec![FLAG, 0x01, ESC, 0x5E, 0x02, FLAG]);
    }

    #[test]
    fn test_empty_frame_is_keepalive() {
        assert_eq!(hdlc_frame(&[]), KEEPALIVE_FRAME.to_vec());
        assert!(hdlc_unframe(&KEEPALIVE_FRAME).unwrap().is_empty());
    }

    #[test]
    fn test_hdlc_roundtrip_with_specials() {
        let data = vec![0x00, 0x7D, 0x7E, 0xFF, 0x7D, 0x7E, 0x01];
        assert_eq!(hdlc_unframe(&hdlc_frame(&data)).unwrap(), data);
    }

    #[test]
    fn test_hdlc_missing_delimiter() {
        assert_eq!(hdlc_unframe(&[]), Err(FramingError::MissingDelimiter));
        assert_eq!(hdlc_unframe(&[FLAG]), Err(FramingError::MissingDelimiter));
        assert_eq!(
            hdlc_unframe(&[0x00, FLAG]),
            Err(FramingError::MissingDelimiter)
        );
    }

    #[test]
    fn test_hdlc_incomplete_escape() {
        assert_eq!(
            hdlc_unframe(&[FLAG, ESC, FLAG]),
            Err(FramingError::IncompleteEscape)
        );
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn framed_payload_has_no_inner_flags(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            let framed = hdlc_frame(&data);
            prop_assert!(!framed[1..framed.len() - 1].contains(&FLAG));
            prop_assert_eq!(hdlc_unframe(&framed).unwrap(), data);
        }
    }
}
