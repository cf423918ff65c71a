//! XEP-0280: Message Carbons.

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use rxml::{NcName, Namespace};

use mux::MessageHandler;
use session::{IqResponse, Session};
use stanza::{Iq, IqType, Message};
use xmlstream::transform::insert;
use xmlstream::{fast_forward, inner, wrap, StartElement, Token, TokenReader, TokenWriter, Transformer};

use crate::delay::Delay;
use crate::{stamp_iq, ActiveChild, Empty, Error};

fn carbons_name(local: &'static str) -> (Namespace, NcName) {
    (Namespace::from(stanza::ns::CARBONS), NcName::try_from(local).unwrap())
}

async fn set_enabled(session: &dyn Session, local: &'static str) -> Result<(), Error> {
    let (ns, name) = carbons_name(local);
    let payload = wrap(Empty, StartElement::new(ns, name));
    let iq = Iq {
        id: String::new(),
        from: None,
        to: None,
        lang: None,
        type_: IqType::Set,
    };
    let (id, stream) = stamp_iq(iq, payload);

    match session.send_iq(Box::new(stream), id, None).await? {
        IqResponse::Result(mut reader) => {
            let (_, err) = fast_forward(&mut *reader);
            if let Some(e) = err {
                return Err(e.into());
            }
            Ok(())
        }
        IqResponse::Error(err) => Err(Error::Remote(err)),
    }
}

/// Ask the server to start copying this account's messages sent and
/// received on other resources to this one.
pub async fn enable(session: &dyn Session) -> Result<(), Error> {
    set_enabled(session, "enable").await
}

/// Ask the server to stop sending carbon copies.
pub async fn disable(session: &dyn Session) -> Result<(), Error> {
    set_enabled(session, "disable").await
}

fn wrap_direction<R: TokenReader + 'static>(
    local: &'static str,
    delay: Option<Delay>,
    stanza: R,
) -> Box<dyn TokenReader> {
    let (ns, name) = carbons_name(local);
    let forwarded = crate::forward::wrap(delay, stanza);
    Box::new(wrap(forwarded, StartElement::new(ns, name)))
}

/// Compose a `<received xmlns="urn:xmpp:carbons:2"><forwarded>…</forwarded></received>`
/// element wrapping a message this account received on another resource.
pub fn wrap_received<R: TokenReader + 'static>(delay: Option<Delay>, stanza: R) -> Box<dyn TokenReader> {
    wrap_direction("received", delay, stanza)
}

/// Compose a `<sent xmlns="urn:xmpp:carbons:2"><forwarded>…</forwarded></sent>`
/// element wrapping a message this account sent from another resource.
pub fn wrap_sent<R: TokenReader + 'static>(delay: Option<Delay>, stanza: R) -> Box<dyn TokenReader> {
    wrap_direction("sent", delay, stanza)
}

/// Reacts to an inbound carbon copy: `sent` distinguishes a copy of a
/// message this account sent elsewhere from one it received elsewhere.
/// `delay` carries when the carbon-copied message was originally sent, if
/// the server included one. `stanza` is positioned at the copied message's
/// own start-element.
pub trait CarbonSink: Send + Sync {
    /// Handle one carbon copy.
    fn on_carbon(&self, sent: bool, delay: Option<Delay>, stanza: &mut dyn TokenReader);
}

/// Dispatches `<received/>` or `<sent/>` carbon notifications to a
/// [`CarbonSink`]. Register one instance per direction, on
/// `("normal", Some(ns::CARBONS), Some("received"))` and
/// `("normal", Some(ns::CARBONS), Some("sent"))`.
pub struct CarbonsHandler<S> {
    sent: bool,
    sink: S,
}

impl<S: CarbonSink> CarbonsHandler<S> {
    /// Build a handler for inbound carbons of received messages.
    pub fn received(sink: S) -> Self {
        CarbonsHandler { sent: false, sink }
    }
}

impl<S: CarbonSink> CarbonsHandler<S> {
    /// Build a handler for inbound carbons of this account's own sent
    /// messages.
    pub fn sent(sink: S) -> Self {
        CarbonsHandler { sent: true, sink }
    }
}

impl<S: CarbonSink> MessageHandler for CarbonsHandler<S> {
    fn handle_message(
        &self,
        _message: &Message,
        _child: &StartElement,
        reader: &mut dyn TokenReader,
        _writer: &mut dyn TokenWriter,
    ) -> Result<(), mux::Error> {
        // Drain the replayed <message> and <received|sent> start-elements;
        // what remains is the <forwarded/> element's own start onward.
        reader.read_token()?;
        reader.read_token()?;

        let mut outer = xmlstream::iter_children(inner(reader));
        let forwarded_start = outer.next_child()?.ok_or(stanza::Error::UnexpectedElement)?;
        let children = xmlstream::iter_children(ActiveChild(&mut outer));
        let (delay, mut stanza) =
            crate::forward::unwrap(&forwarded_start, children).map_err(to_mux_error)?;
        self.sink.on_carbon(self.sent, delay, &mut stanza);
        let (_, err) = fast_forward(&mut stanza);
        if let Some(e) = err {
            return Err(e.into());
        }
        Ok(())
    }
}

fn to_mux_error(e: Error) -> mux::Error {
    match e {
        Error::Stream(e) => mux::Error::from(e),
        Error::Stanza(e) => mux::Error::from(e),
        Error::Jid(e) => mux::Error::from(stanza::Error::from(e)),
        Error::UnexpectedElement => mux::Error::from(stanza::Error::UnexpectedElement),
        Error::Session(_) | Error::Remote(_) => mux::Error::from(stanza::Error::UnexpectedElement),
    }
}

/// Build a [`Transformer`] that prevents the server from making carbon
/// copies of the wrapped stanza, by inserting an empty
/// `<private xmlns="urn:xmpp:carbons:2"/>` child. The insertion point
/// mirrors [`crate::delay::transformer`]: depth 1 of a top-level
/// `iq`/`message`/`presence` element in the client or server namespace.
pub fn private_transformer() -> Box<dyn Transformer> {
    let mut chained: Option<Box<dyn Transformer>> = None;
    for (ns, local) in [
        (Namespace::from(stanza::ns::CLIENT), "iq"),
        (Namespace::from(stanza::ns::CLIENT), "message"),
        (Namespace::from(stanza::ns::CLIENT), "presence"),
        (Namespace::from(stanza::ns::SERVER), "iq"),
        (Namespace::from(stanza::ns::SERVER), "message"),
        (Namespace::from(stanza::ns::SERVER), "presence"),
    ] {
        let name = (ns, NcName::try_from(local).unwrap());
        let next = Box::new(insert(name, || {
            let (ns, name) = carbons_name("private");
            Box::new(wrap(crate::Empty, StartElement::new(ns, name))) as Box<dyn TokenReader>
        }));
        chained = Some(match chained {
            None => next,
            Some(prev) => Box::new(ChainTransform(prev, next)),
        });
    }
    chained.expect("the name list above is non-empty")
}

struct ChainTransform(Box<dyn Transformer>, Box<dyn Transformer>);
impl Transformer for ChainTransform {
    fn transform(self: Box<Self>, reader: Box<dyn TokenReader>) -> Box<dyn TokenReader> {
        self.1.transform(self.0.transform(reader))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct VecReader(VecDeque<Token>);
    impl TokenReader for VecReader {
        fn read_token(&mut self) -> Result<Option<Token>, xmlstream::Error> {
            Ok(self.0.pop_front())
        }
    }

    #[derive(Default)]
    struct Collector(Mutex<Vec<Token>>);
    impl TokenWriter for Collector {
        fn write_token(&mut self, token: Token) -> Result<(), xmlstream::Error> {
            self.0.lock().unwrap().push(token);
            Ok(())
        }
    }

    fn ncname(s: &str) -> NcName {
        NcName::try_from(s).unwrap()
    }

    struct RecordingSink(Mutex<Vec<bool>>);
    impl CarbonSink for RecordingSink {
        fn on_carbon(&self, sent: bool, _delay: Option<Delay>, _stanza: &mut dyn TokenReader) {
            self.0.lock().unwrap().push(sent);
        }
    }

    #[test]
    fn handler_unwraps_forwarded_message_and_invokes_sink() {
        let message_start = StartElement::new(Namespace::from(stanza::ns::CLIENT), ncname("message"));
        let (ns, local) = carbons_name("received");
        let received_start = StartElement::new(ns, local);
        let forwarded_start = StartElement::new(Namespace::from(stanza::ns::FORWARD), ncname("forwarded"));
        let inner_message = StartElement::new(Namespace::from(stanza::ns::CLIENT), ncname("message"));

        let tokens: VecDeque<Token> = vec![
            Token::StartElement(message_start),
            Token::StartElement(received_start.clone()),
            Token::StartElement(forwarded_start),
            Token::StartElement(inner_message),
            Token::Text("hi".into()),
            Token::EndElement, // closes inner message
            Token::EndElement, // closes forwarded
            Token::EndElement, // closes received
            Token::EndElement, // closes message
        ]
        .into();
        let mut reader = VecReader(tokens);
        let mut writer = Collector::default();

        let sink = RecordingSink(Mutex::new(Vec::new()));
        let handler = CarbonsHandler::received(sink);
        let message = Message {
            id: None,
            from: None,
            to: None,
            lang: None,
            type_: stanza::MessageType::Normal,
        };

        handler
            .handle_message(&message, &received_start, &mut reader, &mut writer)
            .unwrap();

        assert_eq!(*handler.sink.0.lock().unwrap(), vec![false]);
    }
}
