//! XEP-0045 §7.8 mediated invitations and XEP-0249 direct invitations.

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use rxml::{NcName, Namespace};

use jid::Jid;
use mux::MessageHandler;
use session::Session;
use stanza::{Message, MessageType};
use xmlstream::{single, wrap, StartElement, Token, TokenReader, TokenWriter};

use crate::{maybe, Chain, Empty, Error};

fn ncname(s: &'static str) -> NcName {
    NcName::try_from(s).unwrap()
}

fn muc_user_ns() -> Namespace {
    Namespace::from(stanza::ns::MUC_USER)
}

fn conference_ns() -> Namespace {
    Namespace::from(stanza::ns::CONFERENCE)
}

/// An inbound invitation to a room, decoded from either wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invitation {
    /// Relayed by the room itself. `room` is who the message came from;
    /// `inviter` is the occupant who asked for the invitation to be
    /// sent.
    Mediated {
        /// The room's bare JID.
        room: Jid,
        /// The occupant that issued the invitation.
        inviter: Jid,
        /// An optional reason given for the invitation.
        reason: Option<String>,
        /// The room's password, if one is required.
        password: Option<String>,
    },
    /// Sent directly by the inviter, naming the room.
    Direct {
        /// The room being invited to.
        room: Jid,
        /// An optional reason given for the invitation.
        reason: Option<String>,
        /// The room's password, if one is required.
        password: Option<String>,
        /// A thread identifier to correlate with an existing
        /// conversation.
        thread: Option<String>,
        /// Whether `thread` continues a one-to-one chat rather than
        /// starting a new one.
        continue_thread: bool,
    },
}

/// Ask `room` to invite `invitee` on this occupant's behalf.
pub async fn invite_mediated(
    session: &dyn Session,
    room: &Jid,
    invitee: &Jid,
    reason: Option<&str>,
    password: Option<&str>,
) -> Result<(), Error> {
    let mut invite_start = StartElement::new(muc_user_ns(), ncname("invite"));
    invite_start = invite_start.with_attr(Namespace::NONE, ncname("to"), invitee.to_string());

    let reason_part = maybe(reason.map(|r| {
        wrap(
            single(Token::Text(r.to_string())),
            StartElement::new(muc_user_ns(), ncname("reason")),
        )
    }));
    let invite = wrap(reason_part, invite_start);

    let password_part = maybe(password.map(|p| {
        wrap(
            single(Token::Text(p.to_string())),
            StartElement::new(muc_user_ns(), ncname("password")),
        )
    }));
    let x = wrap(
        Chain::new(invite, password_part),
        StartElement::new(muc_user_ns(), ncname("x")),
    );

    let message = Message {
        id: None,
        from: None,
        to: Some(room.clone()),
        lang: None,
        type_: MessageType::Normal,
    };
    session.send(Box::new(message.wrap(x))).await?;
    Ok(())
}

/// Invite `invitee` directly into `room`, without the room's involvement.
#[allow(clippy::too_many_arguments)]
pub async fn invite_direct(
    session: &dyn Session,
    invitee: &Jid,
    room: &Jid,
    reason: Option<&str>,
    password: Option<&str>,
    thread: Option<&str>,
    continue_thread: bool,
) -> Result<(), Error> {
    let mut start = StartElement::new(conference_ns(), ncname("x"));
    start = start.with_attr(Namespace::NONE, ncname("jid"), room.to_string());
    if continue_thread {
        start = start.with_attr(Namespace::NONE, ncname("continue"), "true");
    }
    if let Some(thread) = thread {
        start = start.with_attr(Namespace::NONE, ncname("thread"), thread.to_string());
    }
    if let Some(password) = password {
        start = start.with_attr(Namespace::NONE, ncname("password"), password.to_string());
    }
    if let Some(reason) = reason {
        start = start.with_attr(Namespace::NONE, ncname("reason"), reason.to_string());
    }
    let x = wrap(Empty, start);

    let message = Message {
        id: None,
        from: None,
        to: Some(invitee.clone()),
        lang: None,
        type_: MessageType::Normal,
    };
    session.send(Box::new(message.wrap(x))).await?;
    Ok(())
}

/// Reacts to an inbound invitation.
pub trait InvitationSink: Send + Sync {
    /// `from` is who the message carrying the invitation came from (the
    /// room for a mediated invitation, the inviter for a direct one).
    fn on_invitation(&self, from: &Jid, invitation: Invitation);
}

/// Register the same instance at both:
/// - `("normal", Some(ns::MUC_USER), Some("x"))` for mediated invitations
/// - `("normal", Some(ns::CONFERENCE), Some("x"))` for direct invitations
pub struct InvitationHandler<S>(S);

impl<S: InvitationSink> InvitationHandler<S> {
    /// Build a handler delivering into `sink`.
    pub fn new(sink: S) -> Self {
        InvitationHandler(sink)
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

impl<S: InvitationSink> MessageHandler for InvitationHandler<S> {
    fn handle_message(
        &self,
        message: &Message,
        child: &StartElement,
        reader: &mut dyn TokenReader,
        _writer: &mut dyn TokenWriter,
    ) -> Result<(), mux::Error> {
        reader.read_token()?;
        reader.read_token()?;
        let mut children = xmlstream::iter_children(xmlstream::inner(reader));

        if &*child.ns == stanza::ns::CONFERENCE {
            let room = child
                .attrs
                .get(Namespace::NONE, "jid")
                .ok_or(stanza::Error::MissingAttribute("jid"))
                .map_err(mux::Error::from)?;
            let room = jid::Jid::new(room).map_err(Error::from).map_err(to_mux_error)?;
            let continue_thread = child.attrs.get(Namespace::NONE, "continue") == Some("true");
            let thread = child.attrs.get(Namespace::NONE, "thread").map(str::to_string);
            let password = child.attrs.get(Namespace::NONE, "password").map(str::to_string);
            let reason = child.attrs.get(Namespace::NONE, "reason").map(str::to_string);
            while children.next_child()?.is_some() {
                while children.child_token()?.is_some() {}
            }

            let Some(from) = &message.from else {
                return Ok(());
            };
            self.0.on_invitation(
                from,
                Invitation::Direct {
                    room,
                    reason,
                    password,
                    thread,
                    continue_thread,
                },
            );
            return Ok(());
        }

        let mut inviter = None;
        let mut reason = None;
        let mut password = None;
        while let Some(start) = children.next_child()? {
            match &*start.name {
                "invite" => {
                    inviter = start
                        .attrs
                        .get(Namespace::NONE, "from")
                        .map(jid::Jid::new)
                        .transpose()
                        .map_err(Error::from)
                        .map_err(to_mux_error)?;
                    let mut invite_children = xmlstream::iter_children(crate::ActiveChild(&mut children));
                    while let Some(s) = invite_children.next_child()? {
                        if &*s.name == "reason" {
                            let mut text = String::new();
                            while let Some(t) = invite_children.child_token()? {
                                if let Token::Text(t) = t {
                                    text.push_str(&t);
                                }
                            }
                            reason = Some(text);
                        } else {
                            while invite_children.child_token()?.is_some() {}
                        }
                    }
                }
                "password" => {
                    let mut text = String::new();
                    while let Some(t) = children.child_token()? {
                        if let Token::Text(t) = t {
                            text.push_str(&t);
                        }
                    }
                    password = Some(text);
                }
                _ => {
                    while children.child_token()?.is_some() {}
                }
            }
        }

        let Some(room) = message.from.clone() else {
            return Ok(());
        };
        let Some(inviter) = inviter else {
            return Ok(());
        };
        let from = room.clone();
        self.0.on_invitation(
            &from,
            Invitation::Mediated {
                room,
                inviter,
                reason,
                password,
            },
        );
        Ok(())
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

    fn test_ncname(s: &str) -> NcName {
        NcName::try_from(s).unwrap()
    }

    #[derive(Default)]
    struct Recording(Mutex<Vec<(Jid, Invitation)>>);
    impl InvitationSink for Recording {
        fn on_invitation(&self, from: &Jid, invitation: Invitation) {
            self.0.lock().unwrap().push((from.clone(), invitation));
        }
    }

    #[test]
    fn decodes_direct_invitation() {
        let message = Message {
            id: None,
            from: Some(Jid::new("inviter@example.com").unwrap()),
            to: Some(Jid::new("invitee@example.com").unwrap()),
            lang: None,
            type_: MessageType::Normal,
        };
        let message_start = StartElement::new(Namespace::NONE, test_ncname("message"));
        let mut child = StartElement::new(conference_ns(), test_ncname("x"));
        child = child.with_attr(Namespace::NONE, test_ncname("jid"), "room@conference.example");
        child = child.with_attr(Namespace::NONE, test_ncname("reason"), "come on in");

        let tokens: VecDeque<Token> = vec![
            Token::StartElement(message_start),
            Token::StartElement(child.clone()),
            Token::EndElement, // closes x
        ]
        .into();
        let mut reader = VecReader(tokens);
        let mut writer_tokens = VecDeque::new();
        struct Sink<'a>(&'a mut VecDeque<Token>);
        impl<'a> TokenWriter for Sink<'a> {
            fn write_token(&mut self, t: Token) -> Result<(), xmlstream::Error> {
                self.0.push_back(t);
                Ok(())
            }
        }
        let mut writer = Sink(&mut writer_tokens);

        let recorder = Recording::default();
        let handler = InvitationHandler::new(recorder);
        handler
            .handle_message(&message, &child, &mut reader, &mut writer)
            .unwrap();

        let recorded = handler.0 .0.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        match &recorded[0].1 {
            Invitation::Direct { room, reason, .. } => {
                assert_eq!(room, &Jid::new("room@conference.example").unwrap());
                assert_eq!(reason.as_deref(), Some("come on in"));
            }
            other => panic!("expected Direct, got {other:?}"),
        }
    }
}
