//! RFC 6121 §2: Roster Management.

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use rxml::{NcName, Namespace};

use jid::Jid;
use mux::IqHandler;
use session::{IqResponse, Session};
use xmlstream::{multi_reader, wrap, StartElement, Token, TokenReader, TokenWriter};
use stanza::{Iq, IqType};

use crate::{stamp_iq, ActiveChild, Empty, Error};

fn ncname(s: &'static str) -> NcName {
    NcName::try_from(s).unwrap()
}

fn query_name() -> (Namespace, NcName) {
    (Namespace::from(stanza::ns::ROSTER), ncname("query"))
}

/// A single `<item/>` of a roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterItem {
    /// The contact's bare (usually) JID.
    pub jid: Jid,
    /// The contact's locally assigned display name, if any.
    pub name: Option<String>,
    /// The subscription state: `none`, `to`, `from`, `both`, or `remove`
    /// (a push announcing removal).
    pub subscription: String,
    /// Groups the contact is filed under.
    pub groups: Vec<String>,
}

fn decode_item<R: TokenReader>(
    start: &StartElement,
    mut children: xmlstream::Iter<R>,
) -> Result<RosterItem, Error> {
    let jid = start
        .attrs
        .get(Namespace::NONE, "jid")
        .ok_or(stanza::Error::MissingAttribute("jid"))?;
    let jid = Jid::new(jid)?;
    let name = start.attrs.get(Namespace::NONE, "name").map(str::to_string);
    let subscription = start
        .attrs
        .get(Namespace::NONE, "subscription")
        .unwrap_or("none")
        .to_string();

    let mut groups = Vec::new();
    while let Some(group_start) = children.next_child()? {
        if &*group_start.name == "group" {
            let mut text = String::new();
            while let Some(token) = children.child_token()? {
                if let Token::Text(t) = token {
                    text.push_str(&t);
                }
            }
            groups.push(text);
        } else {
            while children.child_token()?.is_some() {}
        }
    }

    Ok(RosterItem {
        jid,
        name,
        subscription,
        groups,
    })
}

/// Fetch the whole roster.
pub async fn fetch(session: &dyn Session) -> Result<Vec<RosterItem>, Error> {
    let (ns, name) = query_name();
    let payload = wrap(Empty, StartElement::new(ns, name));
    let iq = Iq {
        id: String::new(),
        from: None,
        to: None,
        lang: None,
        type_: IqType::Get,
    };
    let (id, stream) = stamp_iq(iq, payload);

    match session.send_iq(Box::new(stream), id, None).await? {
        IqResponse::Result(reader) => {
            let mut top = xmlstream::iter_children(reader);
            let _query_start = top.next_child()?.ok_or(stanza::Error::UnexpectedElement)?;
            let mut items = xmlstream::iter_children(ActiveChild(&mut top));
            let mut out = Vec::new();
            while let Some(item_start) = items.next_child()? {
                let item_children = xmlstream::iter_children(ActiveChild(&mut items));
                out.push(decode_item(&item_start, item_children)?);
            }
            Ok(out)
        }
        IqResponse::Error(err) => Err(Error::Remote(err)),
    }
}

/// Reacts to an unsolicited roster push: a `set`-type IQ carrying a single
/// `<item/>` the server wants applied locally. Replies with an empty
/// result, or an error IQ if `sink` rejects the push.
pub trait RosterSink: Send + Sync {
    /// Apply a pushed item. Returning `Err` rejects the push with that
    /// stanza error.
    fn on_push(&self, item: RosterItem) -> Result<(), stanza::StanzaError>;
}

/// Register on `("set", Some(ns::ROSTER), Some("query"))`.
pub struct PushHandler<S>(S);

impl<S: RosterSink> PushHandler<S> {
    /// Build a push handler delivering into `sink`.
    pub fn new(sink: S) -> Self {
        PushHandler(sink)
    }
}

impl<S: RosterSink> IqHandler for PushHandler<S> {
    fn handle_iq(
        &self,
        iq: &Iq,
        _child: &StartElement,
        reader: &mut dyn TokenReader,
        writer: &mut dyn TokenWriter,
    ) -> Result<(), mux::Error> {
        // reader replays the <iq> and <query> start-elements, then the
        // query's content, ending with the query's own end-element.
        reader.read_token()?;
        reader.read_token()?;

        let mut items = xmlstream::iter_children(xmlstream::inner(reader));
        let item_start = items.next_child()?.ok_or(stanza::Error::UnexpectedElement)?;
        let item_children = xmlstream::iter_children(ActiveChild(&mut items));
        let item = decode_item(&item_start, item_children).map_err(to_mux_error)?;
        while items.next_child()?.is_some() {}

        match self.0.on_push(item) {
            Ok(()) => {
                let reply = iq.result_reply();
                let mut stream = reply.wrap(multi_reader(vec![]));
                let (_, err) = xmlstream::copy(writer, &mut stream);
                if let Some(e) = err {
                    return Err(e.into());
                }
            }
            Err(stanza_err) => {
                let reply = iq.error_reply();
                let mut stream = reply.wrap(stanza_err.to_reader());
                let (_, err) = xmlstream::copy(writer, &mut stream);
                if let Some(e) = err {
                    return Err(e.into());
                }
            }
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

    fn test_ncname(s: &str) -> NcName {
        NcName::try_from(s).unwrap()
    }

    struct AcceptingSink;
    impl RosterSink for AcceptingSink {
        fn on_push(&self, _item: RosterItem) -> Result<(), stanza::StanzaError> {
            Ok(())
        }
    }

    #[test]
    fn push_handler_decodes_item_and_replies_with_result() {
        let iq = Iq {
            id: "1".into(),
            from: None,
            to: None,
            lang: None,
            type_: IqType::Set,
        };
        let iq_start = StartElement::new(Namespace::NONE, test_ncname("iq"));
        let child = StartElement::new(Namespace::from(stanza::ns::ROSTER), test_ncname("query"));
        let mut item = StartElement::new(Namespace::NONE, test_ncname("item"));
        item = item.with_attr(Namespace::NONE, test_ncname("jid"), "friend@example.com");
        item = item.with_attr(Namespace::NONE, test_ncname("subscription"), "both");
        let group = StartElement::new(Namespace::NONE, test_ncname("group"));

        let tokens: VecDeque<Token> = vec![
            Token::StartElement(iq_start),
            Token::StartElement(child.clone()),
            Token::StartElement(item),
            Token::StartElement(group),
            Token::Text("Friends".into()),
            Token::EndElement, // closes group
            Token::EndElement, // closes item
            Token::EndElement, // closes query
        ]
        .into();
        let mut reader = VecReader(tokens);
        let mut writer = Collector::default();

        let handler = PushHandler::new(AcceptingSink);
        handler
            .handle_iq(&iq, &child, &mut reader, &mut writer)
            .unwrap();

        let written = writer.0.lock().unwrap();
        assert!(matches!(written[0], Token::StartElement(ref s) if s.attrs.get(Namespace::NONE, "type") == Some("result")));
    }
}
