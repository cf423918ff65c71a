// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::fmt;

/// Errors raised by a [`crate::Session`] implementation or the IQ
/// correlation engine.
#[derive(Debug)]
pub enum Error {
    /// Writing to, or reading from, the underlying token stream failed.
    Stream(xmlstream::Error),

    /// A stanza envelope failed to decode.
    Stanza(stanza::Error),

    /// The session was dropped (or its worker task died) while a request
    /// was outstanding, so no response will ever arrive.
    LostSession,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Stream(e) => write!(f, "token stream error: {e}"),
            Error::Stanza(e) => write!(f, "malformed stanza: {e}"),
            Error::LostSession => f.write_str("session closed before a response arrived"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Stream(e) => Some(e),
            Error::Stanza(e) => Some(e),
            Error::LostSession => None,
        }
    }
}

impl From<xmlstream::Error> for Error {
    fn from(e: xmlstream::Error) -> Self {
        Error::Stream(e)
    }
}

impl From<stanza::Error> for Error {
    fn from(e: stanza::Error) -> Self {
        Error::Stanza(e)
    }
}
