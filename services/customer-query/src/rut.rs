//! Chilean RUT normalization and check-digit validation.
//!
//! # Purpose
//! Canonicalizes user-supplied identifiers and verifies the modulo-11 check
//! character before any storage access happens.
//!
//! # Key invariants
//! - The canonical form has no periods, is uppercase, and is shaped
//!   `<1-8 digits>-<0-9|K>`.
//! - Multipliers cycle 2..=7 starting from the least significant digit.
//! - A remainder of 11 maps to `'0'` and a remainder of 10 maps to `'K'`.
//!
//! # Notes
//! All functions are pure and allocation is limited to [`normalize`].

const MAX_BODY_DIGITS: usize = 8;

/// Strip every `.` and uppercase the rest.
///
/// Total: never fails, and `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(input: &str) -> String {
    input.replace('.', "").to_uppercase()
}

/// Return `true` if `input` normalizes to a well-formed RUT whose check
/// character matches the modulo-11 checksum of its body.
pub fn is_valid(input: &str) -> bool {
    let normalized = normalize(input);
    let Some((body, check)) = split(&normalized) else {
        return false;
    };
    check_digit(body) == Some(check)
}

/// Compute the expected check character for a RUT body.
///
/// Returns `None` unless `body` is 1 to 8 ASCII digits.
pub fn check_digit(body: &str) -> Option<char> {
    if !is_body(body) {
        return None;
    }
    let mut sum: u32 = 0;
    let mut multiplier: u32 = 2;
    for digit in body.bytes().rev() {
        sum += u32::from(digit - b'0') * multiplier;
        multiplier = if multiplier == 7 { 2 } else { multiplier + 1 };
    }
    let remainder = 11 - (sum % 11);
    Some(match remainder {
        11 => '0',
        10 => 'K',
        value => char::from_digit(value, 10)?,
    })
}

// Shape check for `<body>-<check>` on an already-normalized string.
fn split(normalized: &str) -> Option<(&str, char)> {
    let (body, check) = normalized.split_once('-')?;
    let mut chars = check.chars();
    let check = chars.next()?;
    if chars.next().is_some() || !is_body(body) {
        return None;
    }
    if !(check.is_ascii_digit() || check == 'K') {
        return None;
    }
    Some((body, check))
}

fn is_body(body: &str) -> bool {
    !body.is_empty() && body.len() <= MAX_BODY_DIGITS && body.bytes().all(|b| b.is_ascii_digit())
}
