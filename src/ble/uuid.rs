//! 128-bit UUID literals
//!
//! Identifiers are kept in source as canonical strings
//! (`xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`) and converted at compile time to
//! the little-endian byte order the SoftDevice and the advertising payload use.

use defmt::Format;

/// Length of a canonical UUID string
pub const UUID_STR_LEN: usize = 36;

/// UUID parse errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum UuidError {
    InvalidLength(usize),
    MisplacedHyphen(usize),
    InvalidDigit(usize),
}

const fn is_hyphen_position(i: usize) -> bool {
    i == 8 || i == 13 || i == 18 || i == 23
}

const fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Parse a canonical UUID string into little-endian bytes.
///
/// The most significant byte of the string ends up in `bytes[15]`.
pub const fn try_parse_uuid(s: &str) -> Result<[u8; 16], UuidError> {
    let chars = s.as_bytes();
    if chars.len() != UUID_STR_LEN {
        return Err(UuidError::InvalidLength(chars.len()));
    }

    let mut bytes = [0u8; 16];
    let mut written = 0;
    let mut i = 0;
    while i < UUID_STR_LEN {
        if is_hyphen_position(i) {
            if chars[i] != b'-' {
                return Err(UuidError::MisplacedHyphen(i));
            }
            i += 1;
            continue;
        }

        // Hex pairs never straddle a hyphen position
        let hi = match hex_value(chars[i]) {
            Some(v) => v,
            None => return Err(UuidError::InvalidDigit(i)),
        };
        let lo = match hex_value(chars[i + 1]) {
            Some(v) => v,
            None => return Err(UuidError::InvalidDigit(i + 1)),
        };

        bytes[15 - written] = (hi << 4) | lo;
        written += 1;
        i += 2;
    }

    Ok(bytes)
}

/// Parse a UUID literal, failing the build if it is malformed.
pub const fn parse_uuid(s: &str) -> [u8; 16] {
    match try_parse_uuid(s) {
        Ok(bytes) => bytes,
        Err(_) => panic!("malformed UUID literal"),
    }
}
