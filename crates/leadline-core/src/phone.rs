//! Phone number normalization for correlation.

use crate::defaults::PHONE_TAIL_DIGITS;

/// Fold Persian and Arabic-Indic digits to ASCII, dropping everything else.
pub fn digits_only(raw: &str) -> String {
    raw.chars()
        .filter_map(|c| match c {
            '0'..='9' => Some(c),
            '\u{06F0}'..='\u{06F9}' => char::from_digit(c as u32 - 0x06F0, 10),
            '\u{0660}'..='\u{0669}' => char::from_digit(c as u32 - 0x0660, 10),
            _ => None,
        })
        .collect()
}

/// Last ten digits of a phone number, or None when it has no digits.
pub fn phone_tail(raw: &str) -> Option<String> {
    let digits = digits_only(raw);
    if digits.is_empty() {
        return None;
    }
    let skip = digits.len().saturating_sub(PHONE_TAIL_DIGITS);
    Some(digits[skip..].to_string())
}

/// Whether a stored number contains the tail once reduced to digits.
pub fn number_matches_tail(number: &str, tail: &str) -> bool {
    !tail.is_empty() && digits_only(number).contains(tail)
}
