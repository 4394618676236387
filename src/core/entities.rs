//! XML Entity Decoding
//!
//! Built-in entities (`&lt;` `&gt;` `&amp;` `&quot;` `&apos;`) and numeric
//! character references. Unknown references are kept verbatim. Uses Cow for
//! zero-copy when no entities are present.

use memchr::memchr;
use std::borrow::Cow;

/// Decode text content, handling entity references
#[inline]
pub fn decode_text(input: &[u8]) -> Cow<'_, [u8]> {
    if memchr(b'&', input).is_none() {
        return Cow::Borrowed(input);
    }
    Cow::Owned(decode_entities(input))
}

/// Decode raw bytes into a string, replacing invalid UTF-8
pub fn decode_str(input: &[u8]) -> Cow<'_, str> {
    match decode_text(input) {
        Cow::Borrowed(bytes) => String::from_utf8_lossy(bytes),
        Cow::Owned(bytes) => Cow::Owned(String::from_utf8_lossy(&bytes).into_owned()),
    }
}

/// Decode all entity references in the input
pub fn decode_entities(input: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(input.len());
    let mut pos = 0;

    while let Some(amp_pos) = memchr(b'&', &input[pos..]) {
        result.extend_from_slice(&input[pos..pos + amp_pos]);
        pos += amp_pos;

        let decoded = memchr(b';', &input[pos..]).and_then(|semi| {
            decode_entity(&input[pos + 1..pos + semi]).map(|c| (c, semi))
        });
        match decoded {
            Some((c, semi)) => {
                let mut buf = [0u8; 4];
                result.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                pos += semi + 1;
            }
            None => {
                result.push(b'&');
                pos += 1;
            }
        }
    }

    result.extend_from_slice(&input[pos..]);
    result
}

/// Decode a single entity (without & and ;)
fn decode_entity(entity: &[u8]) -> Option<char> {
    match entity {
        b"lt" => Some('<'),
        b"gt" => Some('>'),
        b"amp" => Some('&'),
        b"quot" => Some('"'),
        b"apos" => Some('\''),
        [b'#', b'x' | b'X', hex @ ..] => {
            let hex = std::str::from_utf8(hex).ok()?;
            char::from_u32(u32::from_str_radix(hex, 16).ok()?)
        }
        [b'#', dec @ ..] => {
            let dec = std::str::from_utf8(dec).ok()?;
            char::from_u32(dec.parse::<u32>().ok()?)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_entities() {
        let input = b"Hello World";
        assert!(matches!(decode_text(input), Cow::Borrowed(_)));
    }

    #[test]
    fn test_basic_entities() {
        assert_eq!(&*decode_text(b"&lt;a&gt; &amp; &quot;b&apos;"), b"<a> & \"b'");
    }

    #[test]
    fn test_numeric_references() {
        assert_eq!(decode_str(b"&#65;&#x42;&#X43;"), "ABC");
        assert_eq!(decode_str(b"caf&#233;"), "caf\u{e9}");
    }

    #[test]
    fn test_unknown_entity_kept() {
        assert_eq!(decode_str(b"&unknown; & x"), "&unknown; & x");
    }
}
