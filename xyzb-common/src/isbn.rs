//! ISBN-13 / ISBN-10 conversion
//!
//! Pure functions converting between the canonical 13-digit identifier and the
//! legacy 10-character identifier. Malformed input is rejected with
//! [`Error::InvalidIdentifier`]; no partial output is ever produced.

use crate::{Error, Result};

/// Prefix prepended when deriving an ISBN-13 from an ISBN-10
const BOOKLAND_PREFIX: &str = "978";

/// ISBN-13 prefixes accepted for conversion to ISBN-10
const ACCEPTED_PREFIXES: [&str; 2] = ["978", "979"];

/// Convert an ISBN-13 to its ISBN-10 form
///
/// The 3-digit prefix and the trailing check digit are dropped; the check
/// character of the ISBN-10 is recomputed over the remaining 9 digits with
/// weights 10 down to 2. A check value of 10 is written as `X`, 11 as `0`.
///
/// The input's own check digit is not verified.
pub fn isbn13_to_isbn10(isbn13: &str) -> Result<String> {
    if isbn13.len() != 13 || !isbn13.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidIdentifier(format!(
            "ISBN-13 must be 13 digits: {:?}",
            isbn13
        )));
    }

    if !ACCEPTED_PREFIXES.contains(&&isbn13[..3]) {
        return Err(Error::InvalidIdentifier(format!(
            "ISBN-13 must start with 978 or 979: {:?}",
            isbn13
        )));
    }

    let body = &isbn13[3..12];
    let sum: u32 = body
        .bytes()
        .enumerate()
        .map(|(i, b)| u32::from(b - b'0') * (10 - i as u32))
        .sum();

    let check = match 11 - (sum % 11) {
        10 => 'X',
        11 => '0',
        digit => char::from(b'0' + digit as u8),
    };

    let mut isbn10 = String::with_capacity(10);
    isbn10.push_str(body);
    isbn10.push(check);
    Ok(isbn10)
}

/// Convert an ISBN-10 to its ISBN-13 form
///
/// `978` is prepended to the first 9 characters and a check digit is computed
/// over the resulting 12 digits with alternating weights 1 and 3.
pub fn isbn10_to_isbn13(isbn10: &str) -> Result<String> {
    if isbn10.len() != 10 || !isbn10.is_ascii() {
        return Err(Error::InvalidIdentifier(format!(
            "ISBN-10 must be 10 characters: {:?}",
            isbn10
        )));
    }

    let body = &isbn10[..9];
    if !body.bytes().all(|b| b.is_ascii_digit()) || !is_isbn10_check_char(isbn10.as_bytes()[9]) {
        return Err(Error::InvalidIdentifier(format!(
            "ISBN-10 must be 9 digits followed by a digit or X: {:?}",
            isbn10
        )));
    }

    let mut isbn13 = String::with_capacity(13);
    isbn13.push_str(BOOKLAND_PREFIX);
    isbn13.push_str(body);

    let sum: u32 = isbn13
        .bytes()
        .enumerate()
        .map(|(i, b)| {
            let digit = u32::from(b - b'0');
            if i % 2 == 0 {
                digit
            } else {
                digit * 3
            }
        })
        .sum();

    let check = (10 - (sum % 10)) % 10;
    isbn13.push(char::from(b'0' + check as u8));
    Ok(isbn13)
}

/// Check whether `isbn13` is 13 digits with a correct check digit
pub fn is_valid_isbn13(isbn13: &str) -> bool {
    if isbn13.len() != 13 || !isbn13.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let sum: u32 = isbn13
        .bytes()
        .enumerate()
        .map(|(i, b)| u32::from(b - b'0') * if i % 2 == 0 { 1 } else { 3 })
        .sum();

    sum % 10 == 0
}

/// Check whether `isbn10` is 9 digits plus a correct check character
pub fn is_valid_isbn10(isbn10: &str) -> bool {
    let bytes = isbn10.as_bytes();
    if bytes.len() != 10
        || !bytes[..9].iter().all(|b| b.is_ascii_digit())
        || !is_isbn10_check_char(bytes[9])
    {
        return false;
    }

    let sum: u32 = bytes
        .iter()
        .enumerate()
        .map(|(i, &b)| {
            let value = match b {
                b'X' | b'x' => 10,
                _ => u32::from(b - b'0'),
            };
            value * (10 - i as u32)
        })
        .sum();

    sum % 11 == 0
}

fn is_isbn10_check_char(b: u8) -> bool {
    b.is_ascii_digit() || b == b'X' || b == b'x'
}
