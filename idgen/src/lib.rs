//! Generation of random lowercase-hex identifiers, suitable for stanza
//! `id` attributes and similar purposes.

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

#![warn(missing_docs)]

use core::fmt;

use rand::rngs::OsRng;
use rand::RngCore;

/// The length, in hex characters, used by [`new`] and [`new_id`].
pub const DEFAULT_LENGTH: usize = 16;

/// The underlying entropy source failed to produce random bytes.
///
/// This should never happen on a supporting platform; callers that cannot
/// tolerate a failed ID allocation should treat this as fatal, per the
/// "MUST NOT produce predictable IDs" requirement: there is no safe
/// fallback to a weaker source.
#[derive(Debug)]
pub struct EntropyError(rand::Error);

impl fmt::Display for EntropyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to draw from the entropy source: {}", self.0)
    }
}

impl core::error::Error for EntropyError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        Some(&self.0)
    }
}

/// Generate a lowercase-hex identifier of the given length, drawing from the
/// operating system's cryptographically strong entropy source.
///
/// `length` may be odd; the final nibble of the last sampled byte is simply
/// discarded.
pub fn try_generate(length: usize) -> Result<String, EntropyError> {
    let mut bytes = vec![0u8; length.div_ceil(2)];
    OsRng.try_fill_bytes(&mut bytes).map_err(EntropyError)?;

    let mut out = String::with_capacity(length);
    for byte in bytes {
        use fmt::Write;
        write!(out, "{byte:02x}").expect("writing to a String cannot fail");
    }
    out.truncate(length);
    Ok(out)
}

/// Generate a lowercase-hex identifier of the given length.
///
/// # Panics
///
/// Panics if the entropy source fails. Callers who need to handle that
/// explicitly should use [`try_generate`] instead.
pub fn generate(length: usize) -> String {
    try_generate(length).expect("entropy source failure generating an identifier")
}

/// Generate a lowercase-hex identifier of [`DEFAULT_LENGTH`] characters.
///
/// # Panics
///
/// Panics if the entropy source fails. Callers who need to handle that
/// explicitly should use [`try_generate`] instead.
pub fn new_id() -> String {
    generate(DEFAULT_LENGTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_length_matches() {
        assert_eq!(new_id().len(), DEFAULT_LENGTH);
    }

    #[test]
    fn is_lowercase_hex() {
        let id = generate(64);
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn odd_length_is_honored() {
        assert_eq!(generate(17).len(), 17);
        assert_eq!(generate(1).len(), 1);
    }

    #[test]
    fn is_not_constant() {
        let a = new_id();
        let b = new_id();
        assert_ne!(a, b);
    }
}
