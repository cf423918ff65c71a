//! Inbound presence handling: resolves pending joins and departures, and
//! surfaces other occupants' presence to an optional [`MucSink`].

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use rxml::Namespace;

use jid::Jid;
use mux::PresenceHandler;
use stanza::{Presence, PresenceType, StanzaError};
use xmlstream::{Iter, StartElement, Token, TokenReader, TokenWriter};

use crate::Error;

use super::{Muc, Slot};

/// An occupant's affiliation, role, real JID (if disclosed), and any
/// status codes (XEP-0045 §15.5) carried on their latest presence.
///
/// Status codes are exposed as-is; nothing here interprets them beyond
/// the single code (110) [`MucPresenceHandler`] itself acts on to
/// resolve a pending join.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Item {
    /// `owner`, `admin`, `member`, `outcast`, or `none`.
    pub affiliation: Option<String>,
    /// `moderator`, `participant`, `visitor`, or `none`.
    pub role: Option<String>,
    /// The occupant's real JID, if the room discloses it.
    pub jid: Option<Jid>,
    /// The occupant's nickname, when different from the presence's own
    /// resource (e.g. a nickname change notification).
    pub nick: Option<String>,
    /// Numeric status codes from `<status code="…"/>` children.
    pub status_codes: Vec<u16>,
}

fn decode_user_x<R: TokenReader>(mut children: Iter<R>) -> Result<Item, Error> {
    let mut item = Item::default();
    while let Some(start) = children.next_child()? {
        match &*start.name {
            "item" => {
                item.affiliation = start
                    .attrs
                    .get(Namespace::NONE, "affiliation")
                    .map(str::to_string);
                item.role = start.attrs.get(Namespace::NONE, "role").map(str::to_string);
                item.jid = start
                    .attrs
                    .get(Namespace::NONE, "jid")
                    .map(Jid::new)
                    .transpose()?;
                item.nick = start.attrs.get(Namespace::NONE, "nick").map(str::to_string);
                while children.child_token()?.is_some() {}
            }
            "status" => {
                if let Some(code) = start
                    .attrs
                    .get(Namespace::NONE, "code")
                    .and_then(|c| c.parse().ok())
                {
                    item.status_codes.push(code);
                }
                while children.child_token()?.is_some() {}
            }
            _ => {
                while children.child_token()?.is_some() {}
            }
        }
    }
    Ok(item)
}

/// Reacts to an occupant presence update that this process wasn't
/// expecting to resolve anything (i.e. not our own join/leave
/// completion).
pub trait MucSink: Send + Sync {
    /// `from` is the occupant's full room JID (`room/nick`).
    fn on_occupant(&self, from: &Jid, item: Item);
}

/// A [`MucSink`] that discards every update; the default for
/// [`MucPresenceHandler::new`].
pub struct NullSink;

impl MucSink for NullSink {
    fn on_occupant(&self, _from: &Jid, _item: Item) {}
}

/// Resolves [`join`](super::join)/[`Channel::leave`](super::Channel::leave)
/// against inbound presence, and forwards everything else to a
/// [`MucSink`].
///
/// Register the *same instance* at all three keys mux needs for MUC
/// presence — available, unavailable, and error all route to one
/// `handle_presence` that branches on [`Presence::type_`]:
/// - `("", Some(ns::MUC_USER), Some("x"))`
/// - `("unavailable", Some(ns::MUC_USER), Some("x"))`
/// - `("error", None, Some("error"))`
pub struct MucPresenceHandler<S = NullSink> {
    muc: Arc<Muc>,
    sink: S,
}

impl MucPresenceHandler<NullSink> {
    /// Build a handler that only resolves joins/departures, ignoring
    /// every other occupant update.
    pub fn new(muc: Arc<Muc>) -> Self {
        MucPresenceHandler { muc, sink: NullSink }
    }
}

impl<S: MucSink> MucPresenceHandler<S> {
    /// Build a handler that also forwards occupant updates to `sink`.
    pub fn with_sink(muc: Arc<Muc>, sink: S) -> Self {
        MucPresenceHandler { muc, sink }
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

impl<S: MucSink> PresenceHandler for MucPresenceHandler<S> {
    fn handle_presence(
        &self,
        presence: &Presence,
        child: &StartElement,
        reader: &mut dyn TokenReader,
        _writer: &mut dyn TokenWriter,
    ) -> Result<(), mux::Error> {
        // reader replays the <presence> and child start-elements, then
        // the child's content, ending with the child's own end-element.
        reader.read_token()?;
        reader.read_token()?;

        match presence.type_ {
            PresenceType::Error => {
                let type_ = child.attrs.get(Namespace::NONE, "type");
                let by = child.attrs.get(Namespace::NONE, "by");
                let children = xmlstream::iter_children(xmlstream::inner(reader));
                let stanza_err = StanzaError::parse(type_, by, children).map_err(mux::Error::from)?;

                let Some(from) = &presence.from else {
                    return Ok(());
                };
                let Some(slot) = self.muc.slot_for(from) else {
                    return Ok(());
                };
                if let Some(tx) = slot.join.lock().unwrap().take() {
                    self.muc.remove(from);
                    let _ = tx.send(Err(stanza_err));
                } else if let Some(tx) = slot.depart.lock().unwrap().take() {
                    let _ = tx.send(Err(stanza_err));
                }
                Ok(())
            }
            PresenceType::Unavailable => {
                let item = decode_user_x(xmlstream::iter_children(xmlstream::inner(reader)))
                    .map_err(to_mux_error)?;
                let Some(from) = presence.from.clone() else {
                    return Ok(());
                };
                let in_room = self.muc.has_room(&from.bare());
                if let Some(slot) = self.muc.slot_for(&from) {
                    self.muc.remove(&from);
                    if let Some(tx) = slot.depart.lock().unwrap().take() {
                        let _ = tx.send(Ok(()));
                    }
                }
                if in_room {
                    self.sink.on_occupant(&from, item);
                }
                Ok(())
            }
            _ => {
                let item = decode_user_x(xmlstream::iter_children(xmlstream::inner(reader)))
                    .map_err(to_mux_error)?;
                let Some(from) = presence.from.clone() else {
                    return Ok(());
                };
                if item.status_codes.contains(&110) {
                    if let Some(slot) = self.muc.slot_for(&from) {
                        if let Some(tx) = slot.join.lock().unwrap().take() {
                            let _ = tx.send(Ok(from.clone()));
                        }
                    }
                }
                if self.muc.has_room(&from.bare()) {
                    self.sink.on_occupant(&from, item);
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::oneshot;

    use rxml::NcName;

    struct VecReader(VecDeque<Token>);
    impl TokenReader for VecReader {
        fn read_token(&mut self) -> Result<Option<Token>, xmlstream::Error> {
            Ok(self.0.pop_front())
        }
    }

    #[derive(Default)]
    struct Collector(StdMutex<Vec<Token>>);
    impl TokenWriter for Collector {
        fn write_token(&mut self, token: Token) -> Result<(), xmlstream::Error> {
            self.0.lock().unwrap().push(token);
            Ok(())
        }
    }

    fn ncname(s: &str) -> NcName {
        NcName::try_from(s).unwrap()
    }

    fn presence_start() -> StartElement {
        StartElement::new(Namespace::NONE, ncname("presence"))
    }

    #[tokio::test]
    async fn status_110_resolves_pending_join() {
        let muc = Arc::new(Muc::new());
        let from = Jid::new("room@conference.example/nick").unwrap();
        let (tx, rx) = oneshot::channel();
        muc.managed.lock().unwrap().insert(
            from.clone(),
            Arc::new(Slot {
                join: StdMutex::new(Some(tx)),
                depart: StdMutex::new(None),
            }),
        );

        let handler = MucPresenceHandler::new(muc.clone());
        let presence = Presence {
            id: None,
            from: Some(from.clone()),
            to: None,
            lang: None,
            type_: PresenceType::Available,
        };
        let child = StartElement::new(Namespace::from(stanza::ns::MUC_USER), ncname("x"));
        let item = StartElement::new(Namespace::NONE, ncname("item"));
        let status = StartElement::new(Namespace::NONE, ncname("status"))
            .with_attr(Namespace::NONE, ncname("code"), "110");

        let tokens: VecDeque<Token> = vec![
            Token::StartElement(presence_start()),
            Token::StartElement(child.clone()),
            Token::StartElement(item),
            Token::EndElement, // closes item
            Token::StartElement(status),
            Token::EndElement, // closes status
            Token::EndElement, // closes x
        ]
        .into();
        let mut reader = VecReader(tokens);
        let mut writer = Collector::default();

        handler
            .handle_presence(&presence, &child, &mut reader, &mut writer)
            .unwrap();

        assert_eq!(rx.await.unwrap().unwrap(), from);
        assert!(muc.slot_for(&from).is_some());
    }

    #[tokio::test]
    async fn unavailable_from_self_resolves_departure_and_clears_slot() {
        let muc = Arc::new(Muc::new());
        let from = Jid::new("room@conference.example/nick").unwrap();
        let (tx, rx) = oneshot::channel();
        muc.managed.lock().unwrap().insert(
            from.clone(),
            Arc::new(Slot {
                join: StdMutex::new(None),
                depart: StdMutex::new(Some(tx)),
            }),
        );

        let handler = MucPresenceHandler::new(muc.clone());
        let presence = Presence {
            id: None,
            from: Some(from.clone()),
            to: None,
            lang: None,
            type_: PresenceType::Unavailable,
        };
        let child = StartElement::new(Namespace::from(stanza::ns::MUC_USER), ncname("x"));
        let tokens: VecDeque<Token> = vec![
            Token::StartElement(presence_start()),
            Token::StartElement(child.clone()),
            Token::EndElement, // closes x
        ]
        .into();
        let mut reader = VecReader(tokens);
        let mut writer = Collector::default();

        handler
            .handle_presence(&presence, &child, &mut reader, &mut writer)
            .unwrap();

        rx.await.unwrap().unwrap();
        assert!(muc.slot_for(&from).is_none());
    }

    #[tokio::test]
    async fn presence_error_fails_pending_join_and_clears_slot() {
        let muc = Arc::new(Muc::new());
        let from = Jid::new("room@conference.example/nick").unwrap();
        let (tx, rx) = oneshot::channel();
        muc.managed.lock().unwrap().insert(
            from.clone(),
            Arc::new(Slot {
                join: StdMutex::new(Some(tx)),
                depart: StdMutex::new(None),
            }),
        );

        let handler = MucPresenceHandler::new(muc.clone());
        let presence = Presence {
            id: None,
            from: Some(from.clone()),
            to: None,
            lang: None,
            type_: PresenceType::Error,
        };
        let mut child = StartElement::new(Namespace::NONE, ncname("error"));
        child = child.with_attr(Namespace::NONE, ncname("type"), "cancel");
        let condition =
            StartElement::new(Namespace::from(stanza::ns::STANZAS), ncname("not-authorized"));
        let tokens: VecDeque<Token> = vec![
            Token::StartElement(presence_start()),
            Token::StartElement(child.clone()),
            Token::StartElement(condition),
            Token::EndElement, // closes condition
            Token::EndElement, // closes error
        ]
        .into();
        let mut reader = VecReader(tokens);
        let mut writer = Collector::default();

        handler
            .handle_presence(&presence, &child, &mut reader, &mut writer)
            .unwrap();

        let err = rx.await.unwrap().unwrap_err();
        assert_eq!(err.condition, Some(stanza::DefinedCondition::NotAuthorized));
        assert!(muc.slot_for(&from).is_none());
    }
}
