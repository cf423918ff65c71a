//! XEP-0045 §9 affiliation and §8.2 role management, via
//! `http://jabber.org/protocol/muc#admin`.

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use rxml::{NcName, Namespace};

use jid::Jid;
use session::{IqResponse, Session};
use stanza::{Iq, IqType};
use xmlstream::{single, wrap, StartElement, Token, TokenReader};

use crate::{maybe, stamp_iq, ActiveChild, Empty, Error};

fn ncname(s: &'static str) -> NcName {
    NcName::try_from(s).unwrap()
}

fn admin_ns() -> Namespace {
    Namespace::from(stanza::ns::MUC_ADMIN)
}

fn query_name() -> (Namespace, NcName) {
    (admin_ns(), ncname("query"))
}

/// One `<item/>` of an affiliation or role listing, or a request to
/// change one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffiliationItem {
    /// The occupant's real (bare, usually) JID.
    pub jid: Jid,
    /// `owner`, `admin`, `member`, `outcast`, or `none`.
    pub affiliation: String,
    /// The occupant's current nickname, if listed by role rather than
    /// affiliation.
    pub nick: Option<String>,
    /// An optional reason for the change, included on a request.
    pub reason: Option<String>,
}

impl AffiliationItem {
    fn to_reader(&self) -> impl TokenReader {
        let mut start = StartElement::new(Namespace::NONE, ncname("item"));
        start = start.with_attr(Namespace::NONE, ncname("affiliation"), self.affiliation.clone());
        start = start.with_attr(Namespace::NONE, ncname("jid"), self.jid.to_string());
        let reason_part = maybe(self.reason.clone().map(|r| {
            wrap(
                single(Token::Text(r)),
                StartElement::new(Namespace::NONE, ncname("reason")),
            )
        }));
        wrap(reason_part, start)
    }

    fn parse<R: TokenReader>(start: &StartElement, mut children: xmlstream::Iter<R>) -> Result<Self, Error> {
        let jid = start
            .attrs
            .get(Namespace::NONE, "jid")
            .ok_or(stanza::Error::MissingAttribute("jid"))?;
        let jid = Jid::new(jid)?;
        let affiliation = start
            .attrs
            .get(Namespace::NONE, "affiliation")
            .unwrap_or("none")
            .to_string();
        let nick = start.attrs.get(Namespace::NONE, "nick").map(str::to_string);

        let mut reason = None;
        while let Some(s) = children.next_child()? {
            if &*s.name == "reason" {
                let mut text = String::new();
                while let Some(token) = children.child_token()? {
                    if let Token::Text(t) = token {
                        text.push_str(&t);
                    }
                }
                reason = Some(text);
            } else {
                while children.child_token()?.is_some() {}
            }
        }

        Ok(AffiliationItem {
            jid,
            affiliation,
            nick,
            reason,
        })
    }
}

/// List occupants with a given affiliation (e.g. `"member"`, `"owner"`,
/// `"outcast"`, `"admin"`).
pub async fn list_affiliation(
    session: &dyn Session,
    room: &Jid,
    affiliation: &str,
) -> Result<Vec<AffiliationItem>, Error> {
    let mut item_start = StartElement::new(Namespace::NONE, ncname("item"));
    item_start = item_start.with_attr(Namespace::NONE, ncname("affiliation"), affiliation.to_string());
    let item = wrap(Empty, item_start);
    let (ns, name) = query_name();
    let payload = wrap(item, StartElement::new(ns, name));

    let iq = Iq {
        id: String::new(),
        from: None,
        to: Some(room.clone()),
        lang: None,
        type_: IqType::Get,
    };
    let (id, stream) = stamp_iq(iq, payload);

    match session.send_iq(Box::new(stream), id, Some(room.clone())).await? {
        IqResponse::Result(reader) => {
            let mut top = xmlstream::iter_children(reader);
            let _query_start = top.next_child()?.ok_or(stanza::Error::UnexpectedElement)?;
            let mut items = xmlstream::iter_children(ActiveChild(&mut top));
            let mut out = Vec::new();
            while let Some(item_start) = items.next_child()? {
                let item_children = xmlstream::iter_children(ActiveChild(&mut items));
                out.push(AffiliationItem::parse(&item_start, item_children)?);
            }
            Ok(out)
        }
        IqResponse::Error(err) => Err(Error::Remote(err)),
    }
}

/// Change a single occupant's affiliation (or role, if `item.affiliation`
/// is instead populated with a role request by the caller's convention).
pub async fn set_affiliation(
    session: &dyn Session,
    room: &Jid,
    item: AffiliationItem,
) -> Result<(), Error> {
    let (ns, name) = query_name();
    let payload = wrap(item.to_reader(), StartElement::new(ns, name));
    let iq = Iq {
        id: String::new(),
        from: None,
        to: Some(room.clone()),
        lang: None,
        type_: IqType::Set,
    };
    let (id, stream) = stamp_iq(iq, payload);

    match session.send_iq(Box::new(stream), id, Some(room.clone())).await? {
        IqResponse::Result(_) => Ok(()),
        IqResponse::Error(err) => Err(Error::Remote(err)),
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

    fn test_ncname(s: &str) -> NcName {
        NcName::try_from(s).unwrap()
    }

    #[test]
    fn parses_affiliation_item_with_reason() {
        let start = StartElement::new(Namespace::NONE, test_ncname("item"))
            .with_attr(Namespace::NONE, test_ncname("jid"), "friend@example.com")
            .with_attr(Namespace::NONE, test_ncname("affiliation"), "member");
        let reason = StartElement::new(Namespace::NONE, test_ncname("reason"));
        let tokens: VecDeque<Token> = vec![
            Token::StartElement(reason),
            Token::Text("welcome".into()),
            Token::EndElement,
        ]
        .into();
        let children = xmlstream::iter_children(VecReader(tokens));

        let item = AffiliationItem::parse(&start, children).unwrap();
        assert_eq!(item.affiliation, "member");
        assert_eq!(item.reason.as_deref(), Some("welcome"));
    }
}
