// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::fmt;

/// Errors raised while dispatching an inbound stanza or stream element.
#[derive(Debug)]
pub enum Error {
    /// Reading or writing the token stream failed.
    Stream(xmlstream::Error),
    /// The stanza envelope itself could not be decoded.
    Stanza(stanza::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Stream(e) => write!(f, "token stream error: {e}"),
            Error::Stanza(e) => write!(f, "malformed stanza: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Stream(e) => Some(e),
            Error::Stanza(e) => Some(e),
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
