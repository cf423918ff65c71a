// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use core::fmt;

/// An error which terminates a token stream.
///
/// Token streams are single-pass: once a read or write returns an `Error`,
/// the stream is exhausted and must not be read from (or written to) again.
#[derive(Debug)]
pub enum Error {
    /// The underlying XML tokenizer reported a parse error.
    Xml(rxml::Error),

    /// A structural rule of a combinator was violated, e.g. a mismatched
    /// end-element was observed where none was expected.
    UnbalancedStream,

    /// An I/O error occurred while reading or writing the underlying byte
    /// stream.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Xml(e) => write!(f, "XML tokenizer error: {e}"),
            Error::UnbalancedStream => f.write_str("token stream is not well-formed"),
            Error::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl core::error::Error for Error {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Error::Xml(e) => Some(e),
            Error::Io(e) => Some(e),
            Error::UnbalancedStream => None,
        }
    }
}

impl From<rxml::Error> for Error {
    fn from(e: rxml::Error) -> Self {
        Error::Xml(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}
