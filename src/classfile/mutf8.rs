// src/classfile/mutf8.rs

//! Modified UTF-8 as stored in class-file `Utf8` constants
//!
//! Differences from standard UTF-8: NUL is written as `C0 80`, and
//! supplementary characters are written as a surrogate pair of three-byte
//! sequences instead of one four-byte sequence.

/// Decode; `None` for malformed input or an unpaired surrogate
pub fn decode(bytes: &[u8]) -> Option<String> {
    // Fast path: plain ASCII without NUL is identical in both encodings
    if bytes.iter().all(|&b| b != 0 && b < 0x80) {
        return std::str::from_utf8(bytes).ok().map(str::to_string);
    }

    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b0 = bytes[i];
        match b0 {
            0x01..=0x7F => {
                units.push(u16::from(b0));
                i += 1;
            }
            0xC0..=0xDF => {
                let b1 = continuation(bytes, i + 1)?;
                units.push((u16::from(b0 & 0x1F) << 6) | u16::from(b1));
                i += 2;
            }
            0xE0..=0xEF => {
                let b1 = continuation(bytes, i + 1)?;
                let b2 = continuation(bytes, i + 2)?;
                units.push((u16::from(b0 & 0x0F) << 12) | (u16::from(b1) << 6) | u16::from(b2));
                i += 3;
            }
            _ => return None,
        }
    }
    String::from_utf16(&units).ok()
}

fn continuation(bytes: &[u8], at: usize) -> Option<u8> {
    let b = *bytes.get(at)?;
    (b & 0xC0 == 0x80).then_some(b & 0x3F)
}

/// Encode a string into modified UTF-8
pub fn encode(text: &str) -> Vec<u8> {
    if text.bytes().all(|b| b != 0 && b < 0x80) {
        return text.as_bytes().to_vec();
    }

    let mut out = Vec::with_capacity(text.len() + 8);
    for unit in text.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | (unit >> 6) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_is_unchanged() {
        assert_eq!(encode("javax/servlet/Filter"), b"javax/servlet/Filter");
        assert_eq!(decode(b"javax/servlet/Filter").as_deref(), Some("javax/servlet/Filter"));
    }

    #[test]
    fn test_nul_and_supplementary() {
        let text = "a\0b\u{e9}\u{1F600}";
        let encoded = encode(text);
        assert_eq!(&encoded[1..3], &[0xC0, 0x80]);
        // Surrogate pair: two three-byte sequences
        assert_eq!(encoded.len(), 1 + 2 + 1 + 2 + 6);
        assert_eq!(decode(&encoded).as_deref(), Some(text));
    }

    #[test]
    fn test_malformed() {
        assert_eq!(decode(&[0x00]), None);
        assert_eq!(decode(&[0xC3]), None);
        assert_eq!(decode(&[0xF0, 0x9F, 0x98, 0x80]), None);
        // Lone high surrogate
        assert_eq!(decode(&[0xED, 0xA0, 0xBD]), None);
    }
}
