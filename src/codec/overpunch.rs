//! Signed-digit overpunch codec
//!
//! Mainframe zoned-decimal formats carry the sign of a number in its last
//! character: the final digit is replaced by a glyph that encodes both the digit
//! and the sign.
//!
//! ```text
//! digit      0 1 2 3 4 5 6 7 8 9
//! positive   { A B C D E F G H I
//! negative   } J K L M N O P Q R
//! ```
//!
//! So `250` encodes as `25{` and `-250` as `25}`. Every fixed-width adapter
//! goes through this module; none of them carry their own table.

use crate::types::AccumulationError;

const POSITIVE: [char; 10] = ['{', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I'];
const NEGATIVE: [char; 10] = ['}', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R'];

/// Encode a signed amount
///
/// The result has exactly as many characters as `amount.unsigned_abs()` has
/// decimal digits. Total over `i64`, including `0` (`"{"`) and `i64::MIN`.
pub fn encode(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let (head, last) = digits.split_at(digits.len() - 1);
    // `last` is a single ASCII digit by construction
    let digit = last.as_bytes()[0] - b'0';
    let glyph = if amount < 0 {
        NEGATIVE[digit as usize]
    } else {
        POSITIVE[digit as usize]
    };

    let mut encoded = String::with_capacity(digits.len());
    encoded.push_str(head);
    encoded.push(glyph);
    encoded
}

/// Decode an overpunch token
///
/// Leading zeros are accepted since fixed-width amount fields are zero-padded.
/// Callers trim surrounding blanks before decoding.
///
/// # Errors
///
/// `MalformedOverpunch` when the token is empty, its last character is not a
/// sign glyph, any other character is not an ASCII digit, or the value does not
/// fit in an `i64`.
pub fn decode(token: &str) -> Result<i64, AccumulationError> {
    let malformed = || AccumulationError::malformed_overpunch(token);

    let mut chars = token.chars();
    let glyph = chars.next_back().ok_or_else(malformed)?;
    let head = chars.as_str();

    let (digit, negative) = glyph_value(glyph).ok_or_else(malformed)?;

    if !head.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }

    let mut magnitude: u64 = 0;
    for b in head.bytes().chain(std::iter::once(b'0' + digit)) {
        magnitude = magnitude
            .checked_mul(10)
            .and_then(|m| m.checked_add(u64::from(b - b'0')))
            .ok_or_else(malformed)?;
    }

    let value = if negative {
        -i128::from(magnitude)
    } else {
        i128::from(magnitude)
    };
    i64::try_from(value).map_err(|_| malformed())
}

fn glyph_value(glyph: char) -> Option<(u8, bool)> {
    if let Some(pos) = POSITIVE.iter().position(|&g| g == glyph) {
        return Some((pos as u8, false));
    }
    NEGATIVE
        .iter()
        .position(|&g| g == glyph)
        .map(|pos| (pos as u8, true))
}
