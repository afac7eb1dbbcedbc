//! Plain text extraction from `attributedBody` BLOBs.
//!
//! Newer archives leave `message.text` NULL and keep the body inside a
//! typedstream-encoded `NSAttributedString`. This is not a typedstream
//! decoder: it finds the one length-prefixed string run that carries the
//! visible text and reads it with bounds checks. Anything unexpected yields
//! `None`.

/// Bytes that precede the length-prefixed text run.
const TEXT_MARKER: [u8; 2] = [0x01, 0x2B];

/// Control bytes at or above this value announce a multi-byte length.
const MULTI_BYTE_LENGTH: u8 = 0x80;

/// Widest little-endian length accepted after a multi-byte control byte.
const MAX_LENGTH_BYTES: usize = 8;

/// Extract the message text from an archived body, if there is one.
///
/// Absent, empty, truncated, or otherwise malformed input returns `None`;
/// this function never panics.
#[must_use]
pub fn decode(bytes: Option<&[u8]>) -> Option<String> {
    let bytes = bytes?;
    let marker = bytes
        .windows(TEXT_MARKER.len())
        .position(|window| window == TEXT_MARKER)?;

    let (len, start) = read_length(bytes, marker + TEXT_MARKER.len())?;
    if len == 0 {
        return None;
    }

    let end = start.checked_add(len)?;
    let run = bytes.get(start..end)?;
    String::from_utf8(run.to_vec()).ok()
}

/// Read the length that starts at `at`; returns `(length, offset of the text)`.
fn read_length(bytes: &[u8], at: usize) -> Option<(usize, usize)> {
    let control = *bytes.get(at)?;
    if control < MULTI_BYTE_LENGTH {
        return Some((usize::from(control), at + 1));
    }

    let width = usize::from(control & 0x7F) + 1;
    if width > MAX_LENGTH_BYTES {
        return None;
    }

    let digits = bytes.get(at + 1..at + 1 + width)?;
    let len = digits
        .iter()
        .rev()
        .fold(0_u64, |acc, &byte| (acc << 8) | u64::from(byte));

    Some((usize::try_from(len).ok()?, at + 1 + width))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Wrap `text` the way Messages archives an `NSAttributedString`.
    fn archive(text: &str) -> Vec<u8> {
        let mut blob = b"\x04\x0bstreamtyped\x81\xe8\x03\x84\x01@\x84\x84\x84\x12NSAttributedString\x00\
\x84\x84\x08NSObject\x00\x85\x92\x84\x84\x84\x08NSString\x01\x94\x84"
            .to_vec();
        blob.extend_from_slice(&TEXT_MARKER);
        let len = text.len();
        if len < 0x80 {
            blob.push(u8::try_from(len).unwrap());
        } else {
            blob.push(0x81);
            blob.extend_from_slice(&u16::try_from(len).unwrap().to_le_bytes());
        }
        blob.extend_from_slice(text.as_bytes());
        blob.extend_from_slice(b"\x86\x84\x02iI\x01\x05\x92\x84\x84\x84\x0cNSDictionary\x00");
        blob
    }

    #[test]
    fn test_short_text() {
        let blob = archive("Hello everyone!");
        assert_eq!(decode(Some(&blob)).as_deref(), Some("Hello everyone!"));
    }

    #[test]
    fn test_long_text_uses_multi_byte_length() {
        let text = "a fairly long message that keeps going ".repeat(8);
        assert!(text.len() > 127);
        let blob = archive(&text);
        assert_eq!(decode(Some(&blob)), Some(text));
    }

    #[test]
    fn test_emoji_round_trips() {
        let text = "see you soon 🎉👋🏽 café";
        let blob = archive(text);
        assert_eq!(decode(Some(&blob)).as_deref(), Some(text));
    }

    #[test]
    fn test_absent_and_empty() {
        assert_eq!(decode(None), None);
        assert_eq!(decode(Some(&[])), None);
    }

    #[test]
    fn test_no_marker() {
        assert_eq!(decode(Some(b"streamtyped without any text run")), None);
    }

    #[test]
    fn test_zero_length_run() {
        assert_eq!(decode(Some(&[0x01, 0x2B, 0x00, b'x'])), None);
    }

    #[test]
    fn test_truncated_run() {
        // Declares 10 bytes, carries 3
        assert_eq!(decode(Some(&[0x01, 0x2B, 0x0A, b'a', b'b', b'c'])), None);
    }

    #[test]
    fn test_truncated_length_bytes() {
        // Four-byte length announced, only two present
        assert_eq!(decode(Some(&[0x01, 0x2B, 0x83, 0x10, 0x00])), None);
        // Marker at the very end
        assert_eq!(decode(Some(&[0x00, 0x01, 0x2B])), None);
    }

    #[test]
    fn test_four_byte_length() {
        let mut blob = vec![0x01, 0x2B, 0x83];
        blob.extend_from_slice(&3_u32.to_le_bytes());
        blob.extend_from_slice(b"hey");
        assert_eq!(decode(Some(&blob)).as_deref(), Some("hey"));
    }

    #[test]
    fn test_oversized_length_width() {
        assert_eq!(decode(Some(&[0x01, 0x2B, 0xFF, 0x01, 0x02])), None);
    }

    #[test]
    fn test_invalid_utf8() {
        assert_eq!(decode(Some(&[0x01, 0x2B, 0x02, 0xC3, 0x28])), None);
    }

    proptest! {
        #[test]
        fn prop_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
            let _ = decode(Some(&bytes));
        }

        #[test]
        fn prop_archived_text_round_trips(text in "\\PC{1,300}") {
            let blob = archive(&text);
            prop_assert_eq!(decode(Some(&blob)), Some(text));
        }
    }
}
