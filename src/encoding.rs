//! Text bridge between the server encoding and UTF-8.
//!
//! The dynamic value model is always UTF-8; text payloads carry bytes in
//! whatever encoding the server is configured with. UTF-8 servers
//! short-circuit without conversion. The fixed conversion set here covers
//! the encodings the bridge recognizes; anything unmappable fails loudly.

use bytes::Bytes;

use crate::error::{BridgeError, BridgeResult};

/// Server-side text encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerEncoding {
    #[default]
    Utf8,
    Latin1,
    Win1252,
    /// No conversion; bytes are passed through and must already be valid
    /// UTF-8 to cross into the dynamic value model.
    SqlAscii,
}

/// Decode server-encoded text bytes into a UTF-8 string.
pub fn decode_text(bytes: &[u8], encoding: ServerEncoding) -> BridgeResult<String> {
    match encoding {
        ServerEncoding::Utf8 | ServerEncoding::SqlAscii => std::str::from_utf8(bytes)
            .map(|s| s.to_string())
            .map_err(|e| BridgeError::Encoding(format!("invalid UTF-8 in text payload: {e}"))),
        ServerEncoding::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
        ServerEncoding::Win1252 => bytes
            .iter()
            .map(|&b| win1252_to_char(b))
            .collect::<Option<String>>()
            .ok_or_else(|| {
                BridgeError::Encoding("unmappable byte in WIN1252 text payload".to_string())
            }),
    }
}

/// Encode a UTF-8 string into server-encoded text bytes.
pub fn encode_text(text: &str, encoding: ServerEncoding) -> BridgeResult<Bytes> {
    match encoding {
        ServerEncoding::Utf8 | ServerEncoding::SqlAscii => {
            Ok(Bytes::copy_from_slice(text.as_bytes()))
        }
        ServerEncoding::Latin1 => {
            let mut out = Vec::with_capacity(text.len());
            for ch in text.chars() {
                let code = ch as u32;
                if code > 0xFF {
                    return Err(BridgeError::Encoding(format!(
                        "character '{ch}' has no representation in LATIN1"
                    )));
                }
                out.push(code as u8);
            }
            Ok(Bytes::from(out))
        }
        ServerEncoding::Win1252 => {
            let mut out = Vec::with_capacity(text.len());
            for ch in text.chars() {
                match char_to_win1252(ch) {
                    Some(b) => out.push(b),
                    None => {
                        return Err(BridgeError::Encoding(format!(
                            "character '{ch}' has no representation in WIN1252"
                        )));
                    }
                }
            }
            Ok(Bytes::from(out))
        }
    }
}

// WIN1252 is Latin-1 with the 0x80..0x9F control range replaced.
const WIN1252_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'), None, Some('\u{201A}'), Some('\u{0192}'),
    Some('\u{201E}'), Some('\u{2026}'), Some('\u{2020}'), Some('\u{2021}'),
    Some('\u{02C6}'), Some('\u{2030}'), Some('\u{0160}'), Some('\u{2039}'),
    Some('\u{0152}'), None, Some('\u{017D}'), None,
    None, Some('\u{2018}'), Some('\u{2019}'), Some('\u{201C}'),
    Some('\u{201D}'), Some('\u{2022}'), Some('\u{2013}'), Some('\u{2014}'),
    Some('\u{02DC}'), Some('\u{2122}'), Some('\u{0161}'), Some('\u{203A}'),
    Some('\u{0153}'), None, Some('\u{017E}'), Some('\u{0178}'),
];

fn win1252_to_char(b: u8) -> Option<char> {
    match b {
        0x80..=0x9F => WIN1252_HIGH[(b - 0x80) as usize],
        _ => Some(b as char),
    }
}

fn char_to_win1252(ch: char) -> Option<u8> {
    let code = ch as u32;
    match code {
        0x00..=0x7F | 0xA0..=0xFF => Some(code as u8),
        _ => WIN1252_HIGH
            .iter()
            .position(|&c| c == Some(ch))
            .map(|idx| 0x80 + idx as u8),
    }
}
