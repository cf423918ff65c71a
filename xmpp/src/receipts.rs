//! XEP-0184: Message Delivery Receipts.

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rxml::{NcName, Namespace};
use tokio::sync::oneshot;

use mux::MessageHandler;
use session::Session;
use stanza::{Message, MessageType};
use xmlstream::{fast_forward, wrap, StartElement, TokenReader, TokenWriter};

use crate::{Chain, Empty, Error};

fn receipts_name(local: &'static str) -> (Namespace, NcName) {
    (Namespace::from(stanza::ns::RECEIPTS), NcName::try_from(local).unwrap())
}

/// Tracks outgoing messages awaiting a delivery receipt.
///
/// Share one instance (behind an `Arc`) between the sender and however
/// many [`ReceivedHandler`] registrations the mux needs (typically one
/// per message type — "chat" and "normal" — since a handler is
/// registered by value per type).
pub struct Receipts {
    pending: Mutex<HashMap<String, oneshot::Sender<()>>>,
}

impl Default for Receipts {
    fn default() -> Self {
        Self::new()
    }
}

impl Receipts {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Receipts {
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Send `message` with `payload`, plus a `<request
    /// xmlns="urn:xmpp:receipts"/>` marker, and wait for the peer to
    /// acknowledge it with a matching `<received/>`. Allocates an id if
    /// `message.id` is absent.
    ///
    /// Dropping the returned future cancels the wait and removes the
    /// bookkeeping entry, the same as [`session::IqResponseFuture`].
    pub async fn send<R: TokenReader + Send + 'static>(
        self: &Arc<Self>,
        session: &dyn Session,
        mut message: Message,
        payload: R,
    ) -> Result<(), Error> {
        let id = message.id.get_or_insert_with(idgen::new_id).clone();

        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().insert(id.clone(), tx);
        let guard = PendingGuard {
            id: id.clone(),
            receipts: self.clone(),
            armed: true,
        };

        let (ns, name) = receipts_name("request");
        let request = wrap(Empty, StartElement::new(ns, name));
        let stream = message.wrap(Chain::new(payload, request));
        session.send(Box::new(stream)).await?;

        match rx.await {
            Ok(()) => {
                guard.disarm();
                Ok(())
            }
            Err(_) => Err(Error::Session(session::Error::LostSession)),
        }
    }

    fn fire(&self, id: &str) {
        if let Some(tx) = self.pending.lock().unwrap().remove(id) {
            let _ = tx.send(());
        }
    }
}

struct PendingGuard {
    id: String,
    receipts: Arc<Receipts>,
    armed: bool,
}

impl PendingGuard {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if self.armed {
            self.receipts.pending.lock().unwrap().remove(&self.id);
        }
    }
}

/// Reacts to an inbound `<received id="…"/>`: signals (and forgets) the
/// matching pending send, if any. An unrecognized id is ignored — it may
/// belong to a receipt request this process never made, or one this
/// process already stopped waiting on.
///
/// Register on `("chat"|"normal"|…, Some(ns::RECEIPTS), Some("received"))`,
/// once per message type the application cares about.
pub struct ReceivedHandler(Arc<Receipts>);

impl ReceivedHandler {
    /// Build a handler delivering into `receipts`.
    pub fn new(receipts: Arc<Receipts>) -> Self {
        ReceivedHandler(receipts)
    }
}

impl MessageHandler for ReceivedHandler {
    fn handle_message(
        &self,
        _message: &Message,
        child: &StartElement,
        reader: &mut dyn TokenReader,
        _writer: &mut dyn TokenWriter,
    ) -> Result<(), mux::Error> {
        let (_, err) = fast_forward(reader);
        if let Some(e) = err {
            return Err(e.into());
        }
        if let Some(id) = child.attrs.get(Namespace::NONE, "id") {
            self.0.fire(id);
        }
        Ok(())
    }
}

/// Reacts to an inbound `<request xmlns="urn:xmpp:receipts"/>` by echoing
/// a `<received id="…"/>` back to the sender, preserving the original
/// message's type and clearing its id (the ack itself needs none).
///
/// Register on `("chat"|"normal"|…, Some(ns::RECEIPTS), Some("request"))`.
pub struct RequestHandler;

impl MessageHandler for RequestHandler {
    fn handle_message(
        &self,
        message: &Message,
        _child: &StartElement,
        reader: &mut dyn TokenReader,
        writer: &mut dyn TokenWriter,
    ) -> Result<(), mux::Error> {
        let (_, err) = fast_forward(reader);
        if let Some(e) = err {
            return Err(e.into());
        }
        let Some(orig_id) = message.id.clone() else {
            return Ok(());
        };

        let reply = Message {
            id: None,
            from: message.to.clone(),
            to: message.from.clone(),
            lang: None,
            type_: message.type_,
        };
        let (ns, name) = receipts_name("received");
        let mut received = StartElement::new(ns, name);
        received = received.with_attr(Namespace::NONE, NcName::try_from("id").unwrap(), orig_id);
        let mut stream = reply.wrap(wrap(Empty, received));
        let (_, err) = xmlstream::copy(writer, &mut stream);
        if let Some(e) = err {
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use xmlstream::Token;

    struct VecReader(VecDeque<Token>);
    impl TokenReader for VecReader {
        fn read_token(&mut self) -> Result<Option<Token>, xmlstream::Error> {
            Ok(self.0.pop_front())
        }
    }

    #[derive(Default)]
    struct Collector(std::sync::Mutex<Vec<Token>>);
    impl TokenWriter for Collector {
        fn write_token(&mut self, token: Token) -> Result<(), xmlstream::Error> {
            self.0.lock().unwrap().push(token);
            Ok(())
        }
    }

    fn ncname(s: &str) -> NcName {
        NcName::try_from(s).unwrap()
    }

    #[tokio::test]
    async fn received_handler_fires_matching_pending_send() {
        let receipts = Arc::new(Receipts::new());
        let (tx, rx) = oneshot::channel();
        receipts.pending.lock().unwrap().insert("abc".into(), tx);

        let handler = ReceivedHandler::new(receipts.clone());
        let message = Message {
            id: None,
            from: None,
            to: None,
            lang: None,
            type_: MessageType::Chat,
        };
        let (ns, name) = receipts_name("received");
        let mut child = StartElement::new(ns, name);
        child = child.with_attr(Namespace::NONE, ncname("id"), "abc");
        let mut reader = VecReader(VecDeque::new());
        let mut writer = Collector::default();

        handler
            .handle_message(&message, &child, &mut reader, &mut writer)
            .unwrap();

        rx.await.unwrap();
        assert!(receipts.pending.lock().unwrap().is_empty());
    }

    #[test]
    fn request_handler_echoes_received_with_preserved_type_and_cleared_id() {
        let message = Message {
            id: Some("orig".into()),
            from: Some(jid::Jid::new("a@x").unwrap()),
            to: Some(jid::Jid::new("b@x").unwrap()),
            lang: None,
            type_: MessageType::Chat,
        };
        let (ns, name) = receipts_name("request");
        let child = StartElement::new(ns, name);
        let mut reader = VecReader(VecDeque::new());
        let mut writer = Collector::default();

        RequestHandler
            .handle_message(&message, &child, &mut reader, &mut writer)
            .unwrap();

        let written = writer.0.lock().unwrap();
        assert!(matches!(written[0], Token::StartElement(ref s) if s.name.to_string() == "message"
            && s.attrs.get(Namespace::NONE, "type") == Some("chat")
            && s.attrs.get(Namespace::NONE, "id").is_none()));
        assert!(matches!(written[1], Token::StartElement(ref s) if s.name.to_string() == "received"
            && s.attrs.get(Namespace::NONE, "id") == Some("orig")));
    }
}
