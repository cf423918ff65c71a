// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use core::fmt;

/// Errors which can occur while decoding a stanza envelope or a
/// [`crate::StanzaError`] from a token stream.
#[derive(Debug)]
pub enum Error {
    /// A required attribute was missing.
    MissingAttribute(&'static str),

    /// An attribute held a value outside its enumerated set.
    InvalidAttribute(&'static str, String),

    /// The `from`/`to`/`by` JID failed to parse.
    Jid(jid::Error),

    /// The underlying token stream reported an error.
    Stream(xmlstream::Error),

    /// A start-element was expected but not found, or its name did not
    /// match what the caller expected.
    UnexpectedElement,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MissingAttribute(name) => write!(f, "missing required attribute `{name}`"),
            Error::InvalidAttribute(name, value) => {
                write!(f, "invalid value `{value}` for attribute `{name}`")
            }
            Error::Jid(e) => write!(f, "invalid JID: {e}"),
            Error::Stream(e) => write!(f, "token stream error: {e}"),
            Error::UnexpectedElement => f.write_str("unexpected element"),
        }
    }
}

impl core::error::Error for Error {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Error::Jid(e) => Some(e),
            Error::Stream(e) => Some(e),
            _ => None,
        }
    }
}

impl From<jid::Error> for Error {
    fn from(e: jid::Error) -> Self {
        Error::Jid(e)
    }
}

impl From<xmlstream::Error> for Error {
    fn from(e: xmlstream::Error) -> Self {
        Error::Stream(e)
    }
}
