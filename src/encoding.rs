//! `TextEncoder`

/// UTF-8 encoder
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TextEncoder;

impl TextEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Always `"utf-8"`
    pub fn encoding(&self) -> &'static str {
        "utf-8"
    }

    pub fn encode(&self, input: &str) -> Vec<u8> {
        input.as_bytes().to_vec()
    }

    /// Encode UTF-16 code units as page strings hold them.
    ///
    /// Unpaired surrogates become U+FFFD (`EF BF BD`).
    pub fn encode_utf16(&self, units: &[u16]) -> Vec<u8> {
        let mut out = Vec::with_capacity(units.len() * 3);
        let mut buf = [0u8; 4];
        for ch in char::decode_utf16(units.iter().copied()) {
            let ch = ch.unwrap_or(char::REPLACEMENT_CHARACTER);
            out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
        }
        out
    }
}
