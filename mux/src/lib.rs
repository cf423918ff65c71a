//! Routes inbound stanzas and top-level stream elements to registered
//! handlers.
//!
//! A [`Mux`] is built once, via [`MuxBuilder`], from a fixed table of
//! registrations; dispatch is read-only and side-effect-free on the table
//! itself. Registering two handlers at the same specificity is a
//! programmer error and panics immediately, during construction, rather
//! than silently keeping the first or the last.

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

#![warn(missing_docs)]

mod error;
mod handler;

pub use error::Error;
pub use handler::{ElementHandler, IqHandler, MessageHandler, PresenceHandler};

use std::collections::{HashMap, VecDeque};

use xmlstream::{fast_forward, inner, iter_children, Iter, StartElement, Token, TokenReader, TokenWriter};

/// A registration key: (`type` string, namespace, local name). An empty
/// `type` string or a `None` name component is a wildcard.
type Key = (String, Option<String>, Option<String>);

fn key(type_: &str, ns: Option<&str>, local: Option<&str>) -> Key {
    (type_.to_string(), ns.map(String::from), local.map(String::from))
}

/// Look up the most specific handler registered for `(type_, ns, local)`.
///
/// Tried in order: exact `{ns}local` at the matching type, local name only,
/// namespace only, then the empty name — each of those four repeated for
/// the wildcard (empty-string) type, then `None`.
fn lookup<'a, V>(map: &'a HashMap<Key, V>, type_: &str, ns: &str, local: &str) -> Option<&'a V> {
    for t in [type_, ""] {
        let candidates = [
            (t.to_string(), Some(ns.to_string()), Some(local.to_string())),
            (t.to_string(), None, Some(local.to_string())),
            (t.to_string(), Some(ns.to_string()), None),
            (t.to_string(), None, None),
        ];
        for candidate in &candidates {
            if let Some(h) = map.get(candidate) {
                return Some(h);
            }
        }
    }
    None
}

/// Builds a [`Mux`] registration table.
#[derive(Default)]
pub struct MuxBuilder {
    elements: HashMap<(String, String), Box<dyn ElementHandler>>,
    iq: HashMap<Key, Box<dyn IqHandler>>,
    message: HashMap<Key, Box<dyn MessageHandler>>,
    presence: HashMap<Key, Box<dyn PresenceHandler>>,
}

impl MuxBuilder {
    /// Start an empty registration table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a top-level stream element that is not
    /// `iq`, `message`, or `presence`, keyed by its exact qualified name.
    ///
    /// Panics if a handler is already registered for `(ns, local)`.
    pub fn handle(mut self, ns: &str, local: &str, h: impl ElementHandler + 'static) -> Self {
        let k = (ns.to_string(), local.to_string());
        if self.elements.insert(k.clone(), Box::new(h)).is_some() {
            panic!("mux: duplicate element handler for {{{}}}{}", k.0, k.1);
        }
        self
    }

    /// Register an IQ handler for `type_` (`"get"`, `"set"`, `"result"`,
    /// `"error"`, or `""` for any) and payload name (`ns`/`local`, either
    /// `None` for wildcard).
    ///
    /// Panics if a handler is already registered at the same specificity.
    pub fn iq(mut self, type_: &str, ns: Option<&str>, local: Option<&str>, h: impl IqHandler + 'static) -> Self {
        let k = key(type_, ns, local);
        if self.iq.insert(k.clone(), Box::new(h)).is_some() {
            panic!("mux: duplicate iq handler for type={:?} name={:?}/{:?}", k.0, k.1, k.2);
        }
        self
    }

    /// Register a message handler. See [`MuxBuilder::iq`] for the
    /// parameters' shape.
    pub fn message(mut self, type_: &str, ns: Option<&str>, local: Option<&str>, h: impl MessageHandler + 'static) -> Self {
        let k = key(type_, ns, local);
        if self.message.insert(k.clone(), Box::new(h)).is_some() {
            panic!("mux: duplicate message handler for type={:?} name={:?}/{:?}", k.0, k.1, k.2);
        }
        self
    }

    /// Register a presence handler. See [`MuxBuilder::iq`] for the
    /// parameters' shape.
    pub fn presence(mut self, type_: &str, ns: Option<&str>, local: Option<&str>, h: impl PresenceHandler + 'static) -> Self {
        let k = key(type_, ns, local);
        if self.presence.insert(k.clone(), Box::new(h)).is_some() {
            panic!("mux: duplicate presence handler for type={:?} name={:?}/{:?}", k.0, k.1, k.2);
        }
        self
    }

    /// Freeze the table into a [`Mux`].
    pub fn build(self) -> Mux {
        Mux {
            elements: self.elements,
            iq: self.iq,
            message: self.message,
            presence: self.presence,
        }
    }
}

/// A frozen table of stanza and stream-element handlers.
pub struct Mux {
    elements: HashMap<(String, String), Box<dyn ElementHandler>>,
    iq: HashMap<Key, Box<dyn IqHandler>>,
    message: HashMap<Key, Box<dyn MessageHandler>>,
    presence: HashMap<Key, Box<dyn PresenceHandler>>,
}

impl Mux {
    /// Dispatch one top-level element, whose start-element has already been
    /// read from `reader`. `reader` yields the element's remaining content
    /// up to (not including) its own end-element; `writer` is where a
    /// handler's reply, if any, is written.
    pub fn dispatch(
        &self,
        start: StartElement,
        reader: &mut dyn TokenReader,
        writer: &mut dyn TokenWriter,
    ) -> Result<(), Error> {
        match start.name.to_string().as_str() {
            "iq" => self.dispatch_iq(start, reader, writer),
            "message" => self.dispatch_message(start, reader, writer),
            "presence" => self.dispatch_presence(start, reader, writer),
            _ => self.dispatch_element(start, reader, writer),
        }
    }

    fn dispatch_element(
        &self,
        start: StartElement,
        reader: &mut dyn TokenReader,
        writer: &mut dyn TokenWriter,
    ) -> Result<(), Error> {
        let k = (start.ns.to_string(), start.name.to_string());
        let mut content = inner(reader);
        let result = match self.elements.get(&k) {
            Some(h) => h.handle(&start, &mut content, writer),
            None => Ok(()),
        };
        let (_, err) = fast_forward(&mut content);
        if let Some(e) = err {
            return Err(e.into());
        }
        result
    }

    fn dispatch_iq(
        &self,
        start: StartElement,
        reader: &mut dyn TokenReader,
        writer: &mut dyn TokenWriter,
    ) -> Result<(), Error> {
        let iq = stanza::Iq::parse(&start)?;
        let type_str = match iq.type_ {
            stanza::IqType::Get => "get",
            stanza::IqType::Set => "set",
            stanza::IqType::Result => "result",
            stanza::IqType::Error => "error",
        };

        let mut children = iter_children(inner(reader));
        let child = children.next_child()?;

        let handler = match &child {
            Some(c) => lookup(&self.iq, type_str, &c.ns.to_string(), &c.name.to_string()),
            None => None,
        };

        if let (Some(h), Some(c)) = (handler, child) {
            let mut sub = ChildSubtreeReader::new(
                vec![Token::StartElement(start), Token::StartElement(c.clone())],
                children,
            );
            let result = h.handle_iq(&iq, &c, &mut sub, writer);
            let mut children = sub.finish()?;
            drain(&mut children)?;
            return result;
        }

        drain(&mut children)?;
        if matches!(iq.type_, stanza::IqType::Get | stanza::IqType::Set) {
            send_service_unavailable(&iq, writer)?;
        }
        Ok(())
    }

    fn dispatch_message(
        &self,
        start: StartElement,
        reader: &mut dyn TokenReader,
        writer: &mut dyn TokenWriter,
    ) -> Result<(), Error> {
        let message = stanza::Message::parse(&start)?;
        let type_str = match message.type_ {
            stanza::MessageType::Normal => "normal",
            stanza::MessageType::Chat => "chat",
            stanza::MessageType::Groupchat => "groupchat",
            stanza::MessageType::Headline => "headline",
            stanza::MessageType::Error => "error",
        };

        let mut children = iter_children(inner(reader));
        while let Some(child) = children.next_child()? {
            let ns = child.ns.to_string();
            let local = child.name.to_string();
            if let Some(h) = lookup(&self.message, type_str, &ns, &local) {
                let mut sub = ChildSubtreeReader::new(
                    vec![Token::StartElement(start), Token::StartElement(child.clone())],
                    children,
                );
                let result = h.handle_message(&message, &child, &mut sub, writer);
                let mut children = sub.finish()?;
                drain(&mut children)?;
                return result;
            }
        }
        Ok(())
    }

    fn dispatch_presence(
        &self,
        start: StartElement,
        reader: &mut dyn TokenReader,
        writer: &mut dyn TokenWriter,
    ) -> Result<(), Error> {
        let presence = stanza::Presence::parse(&start)?;
        let type_str = match presence.type_ {
            stanza::PresenceType::Available => "",
            stanza::PresenceType::Unavailable => "unavailable",
            stanza::PresenceType::Subscribe => "subscribe",
            stanza::PresenceType::Subscribed => "subscribed",
            stanza::PresenceType::Unsubscribe => "unsubscribe",
            stanza::PresenceType::Unsubscribed => "unsubscribed",
            stanza::PresenceType::Probe => "probe",
            stanza::PresenceType::Error => "error",
        };

        let mut children = iter_children(inner(reader));
        while let Some(child) = children.next_child()? {
            let ns = child.ns.to_string();
            let local = child.name.to_string();
            if let Some(h) = lookup(&self.presence, type_str, &ns, &local) {
                let mut sub = ChildSubtreeReader::new(
                    vec![Token::StartElement(start), Token::StartElement(child.clone())],
                    children,
                );
                let result = h.handle_presence(&presence, &child, &mut sub, writer);
                let mut children = sub.finish()?;
                drain(&mut children)?;
                return result;
            }
        }
        Ok(())
    }
}

fn drain<R: TokenReader>(children: &mut Iter<R>) -> Result<(), Error> {
    while children.next_child()?.is_some() {}
    Ok(())
}

fn send_service_unavailable<W: TokenWriter + ?Sized>(iq: &stanza::Iq, writer: &mut W) -> Result<(), Error> {
    let reply = iq.error_reply();
    let err = stanza::StanzaError::with_condition(stanza::DefinedCondition::ServiceUnavailable);
    let mut stream = reply.wrap(err.to_reader());
    let (_, e) = xmlstream::copy(writer, &mut stream);
    if let Some(e) = e {
        return Err(e.into());
    }
    Ok(())
}

/// Replays a fixed prefix of tokens, then the active child of an
/// [`Iter`], then synthesizes that child's end-element. Used to hand a
/// matched handler a self-contained stream: the stanza's own start (so a
/// handler may re-parse the full envelope if it wants to) followed by the
/// matched child in full.
struct ChildSubtreeReader<R: TokenReader> {
    replay: VecDeque<Token>,
    iter: Iter<R>,
    child_done: bool,
    end_emitted: bool,
}

impl<R: TokenReader> ChildSubtreeReader<R> {
    fn new(replay: Vec<Token>, iter: Iter<R>) -> Self {
        ChildSubtreeReader {
            replay: replay.into(),
            iter,
            child_done: false,
            end_emitted: false,
        }
    }

    /// Drain anything the handler left unread, then hand back the
    /// underlying iterator so dispatch can continue with the next sibling.
    fn finish(mut self) -> Result<Iter<R>, Error> {
        while self.read_token()?.is_some() {}
        Ok(self.iter)
    }
}

impl<R: TokenReader> TokenReader for ChildSubtreeReader<R> {
    fn read_token(&mut self) -> Result<Option<Token>, xmlstream::Error> {
        if let Some(t) = self.replay.pop_front() {
            return Ok(Some(t));
        }
        if self.child_done {
            if self.end_emitted {
                return Ok(None);
            }
            self.end_emitted = true;
            return Ok(Some(Token::EndElement));
        }
        match self.iter.child_token()? {
            Some(t) => Ok(Some(t)),
            None => {
                self.child_done = true;
                self.end_emitted = true;
                Ok(Some(Token::EndElement))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque as Queue;

    fn ncname(s: &str) -> rxml::NcName {
        rxml::NcName::try_from(s).unwrap()
    }

    struct VecReader(Queue<Token>);
    impl TokenReader for VecReader {
        fn read_token(&mut self) -> Result<Option<Token>, xmlstream::Error> {
            Ok(self.0.pop_front())
        }
    }

    #[derive(Default)]
    struct Collector(RefCell<Vec<Token>>);
    impl TokenWriter for Collector {
        fn write_token(&mut self, token: Token) -> Result<(), xmlstream::Error> {
            self.0.borrow_mut().push(token);
            Ok(())
        }
    }

    struct Ping;
    impl IqHandler for Ping {
        fn handle_iq(
            &self,
            iq: &stanza::Iq,
            _child: &StartElement,
            reader: &mut dyn TokenReader,
            writer: &mut dyn TokenWriter,
        ) -> Result<(), Error> {
            let (_, err) = fast_forward(reader);
            if let Some(e) = err {
                return Err(e.into());
            }
            let reply = iq.result_reply();
            let mut stream = reply.wrap(xmlstream::multi_reader(vec![]));
            let (_, e) = xmlstream::copy(writer, &mut stream);
            if let Some(e) = e {
                return Err(e.into());
            }
            Ok(())
        }
    }

    fn iq_get_ping() -> Queue<Token> {
        let mut start = StartElement::new(rxml::Namespace::NONE, ncname("iq"));
        start = start.with_attr(rxml::Namespace::NONE, ncname("id"), "1");
        start = start.with_attr(rxml::Namespace::NONE, ncname("type"), "get");
        let ping = StartElement::new(rxml::Namespace::from("urn:xmpp:ping"), ncname("ping"));
        vec![
            Token::StartElement(start),
            Token::StartElement(ping),
            Token::EndElement,
            Token::EndElement,
        ]
        .into()
    }

    #[test]
    fn routes_ping_to_matching_handler() {
        let mux = MuxBuilder::new()
            .iq("get", Some("urn:xmpp:ping"), Some("ping"), Ping)
            .build();
        let mut tokens = iq_get_ping();
        let start = match tokens.pop_front().unwrap() {
            Token::StartElement(s) => s,
            _ => unreachable!(),
        };
        let mut reader = VecReader(tokens);
        let mut writer = Collector::default();
        mux.dispatch(start, &mut reader, &mut writer).unwrap();

        let written = writer.0.borrow();
        assert!(matches!(written[0], Token::StartElement(ref s) if s.name.to_string() == "iq"));
        assert_eq!(written.last(), Some(&Token::EndElement));
    }

    #[test]
    fn unmatched_iq_get_gets_service_unavailable() {
        let mux = MuxBuilder::new().build();
        let mut tokens = iq_get_ping();
        let start = match tokens.pop_front().unwrap() {
            Token::StartElement(s) => s,
            _ => unreachable!(),
        };
        let mut reader = VecReader(tokens);
        let mut writer = Collector::default();
        mux.dispatch(start, &mut reader, &mut writer).unwrap();

        let written = writer.0.borrow();
        assert!(!written.is_empty());
        assert!(matches!(written[0], Token::StartElement(ref s) if s.name.to_string() == "iq"));
    }

    #[test]
    #[should_panic(expected = "duplicate")]
    fn duplicate_registration_panics() {
        MuxBuilder::new()
            .iq("get", Some("urn:xmpp:ping"), Some("ping"), Ping)
            .iq("get", Some("urn:xmpp:ping"), Some("ping"), Ping)
            .build();
    }

    #[test]
    fn lookup_prefers_exact_over_wildcard() {
        let mut map: HashMap<Key, &'static str> = HashMap::new();
        map.insert(key("get", Some("ns"), Some("name")), "exact");
        map.insert(key("get", None, None), "wildcard");
        assert_eq!(lookup(&map, "get", "ns", "name"), Some(&"exact"));
        assert_eq!(lookup(&map, "get", "other", "other"), Some(&"wildcard"));
    }
}
