// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use core::fmt;

/// Errors which can occur while parsing or constructing a [`crate::Jid`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The domainpart was empty.
    EmptyDomain,

    /// The localpart was present but empty (e.g. `@example.com`).
    EmptyLocalpart,

    /// The resourcepart was present but empty (e.g. `user@example.com/`).
    EmptyResource,

    /// The address contained a raw whitespace or control character.
    InvalidCharacter,

    /// The localpart failed nodeprep normalisation.
    InvalidLocalpart,

    /// The resourcepart failed resourceprep normalisation.
    InvalidResource,

    /// The domainpart failed normalisation.
    InvalidDomain,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EmptyDomain => f.write_str("domainpart is empty"),
            Error::EmptyLocalpart => f.write_str("localpart is present but empty"),
            Error::EmptyResource => f.write_str("resourcepart is present but empty"),
            Error::InvalidCharacter => {
                f.write_str("address contains a raw whitespace or control character")
            }
            Error::InvalidLocalpart => f.write_str("localpart failed nodeprep normalisation"),
            Error::InvalidResource => f.write_str("resourcepart failed resourceprep normalisation"),
            Error::InvalidDomain => f.write_str("domainpart is invalid"),
        }
    }
}

impl core::error::Error for Error {}
