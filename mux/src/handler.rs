// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use xmlstream::{StartElement, TokenReader, TokenWriter};

use crate::Error;

/// Handles a single top-level stream element registered with
/// [`MuxBuilder::handle`](crate::MuxBuilder::handle) — anything that isn't
/// an `iq`, `message`, or `presence`.
pub trait ElementHandler: Send + Sync {
    /// `reader` is bounded to the element's content; `writer` is the
    /// outbound stream the handler may reply on.
    fn handle(
        &self,
        start: &StartElement,
        reader: &mut dyn TokenReader,
        writer: &mut dyn TokenWriter,
    ) -> Result<(), Error>;
}

/// Handles an inbound `<iq/>` whose single child matches this handler's
/// registered type and payload name.
pub trait IqHandler: Send + Sync {
    /// `reader` replays the `<iq/>` start, the payload's start, and the
    /// payload's content; it ends with the payload's end-element.
    fn handle_iq(
        &self,
        iq: &stanza::Iq,
        child: &StartElement,
        reader: &mut dyn TokenReader,
        writer: &mut dyn TokenWriter,
    ) -> Result<(), Error>;
}

/// Handles an inbound `<message/>` whose matching child was found among its
/// top-level children.
pub trait MessageHandler: Send + Sync {
    /// See [`IqHandler::handle_iq`] for the shape of `reader`.
    fn handle_message(
        &self,
        message: &stanza::Message,
        child: &StartElement,
        reader: &mut dyn TokenReader,
        writer: &mut dyn TokenWriter,
    ) -> Result<(), Error>;
}

/// Handles an inbound `<presence/>` whose matching child was found among
/// its top-level children.
pub trait PresenceHandler: Send + Sync {
    /// See [`IqHandler::handle_iq`] for the shape of `reader`.
    fn handle_presence(
        &self,
        presence: &stanza::Presence,
        child: &StartElement,
        reader: &mut dyn TokenReader,
        writer: &mut dyn TokenWriter,
    ) -> Result<(), Error>;
}
