// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::fmt;

/// Errors raised by the protocol layers and the MUC client.
#[derive(Debug)]
pub enum Error {
    /// The session surface reported a failure (I/O, or the session was
    /// dropped while a request was outstanding).
    Session(session::Error),

    /// Reading or writing a token stream failed.
    Stream(xmlstream::Error),

    /// A stanza envelope or payload failed to decode.
    Stanza(stanza::Error),

    /// A JID embedded in a payload failed to parse.
    Jid(jid::Error),

    /// The peer replied with a stanza error that wasn't treated as a
    /// tolerated success case (e.g. anything but `service-unavailable` for
    /// a ping).
    Remote(stanza::StanzaError),

    /// A `<forwarded/>` (or similar wrapper) element was expected but the
    /// start-element read didn't match.
    UnexpectedElement,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Session(e) => write!(f, "session error: {e}"),
            Error::Stream(e) => write!(f, "token stream error: {e}"),
            Error::Stanza(e) => write!(f, "malformed stanza: {e}"),
            Error::Jid(e) => write!(f, "malformed JID: {e}"),
            Error::Remote(e) => write!(f, "peer returned an error: {e:?}"),
            Error::UnexpectedElement => f.write_str("expected a different wrapper element"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Session(e) => Some(e),
            Error::Stream(e) => Some(e),
            Error::Stanza(e) => Some(e),
            Error::Jid(e) => Some(e),
            Error::Remote(_) | Error::UnexpectedElement => None,
        }
    }
}

impl From<session::Error> for Error {
    fn from(e: session::Error) -> Self {
        Error::Session(e)
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

impl From<jid::Error> for Error {
    fn from(e: jid::Error) -> Self {
        Error::Jid(e)
    }
}
