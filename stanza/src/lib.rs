//! Stanza envelopes — `iq`, `message`, `presence` — and the structured
//! `<error/>` element they carry on failure.
//!
//! Every envelope type exposes the same shape: [`Iq::start_element`] et al.
//! produce the XML header with canonical attribute order, [`Iq::wrap`]
//! produces the full stanza as a token stream around a payload, and
//! [`Iq::parse`] decodes the envelope from an already-read start-element.

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

#![warn(missing_docs)]

mod error;
pub mod ns;
mod stanza_error;

pub use error::Error;
pub use stanza_error::{DefinedCondition, ErrorType, StanzaError};

use jid::Jid;
use rxml::{NcName, Namespace};
use xmlstream::{wrap, StartElement, TokenReader, Wrap};

/// The three kinds of top-level XMPP stanza.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StanzaKind {
    /// `<iq/>`
    Iq,
    /// `<message/>`
    Message,
    /// `<presence/>`
    Presence,
}

impl StanzaKind {
    /// The element local name for this kind.
    pub fn local_name(self) -> &'static str {
        match self {
            StanzaKind::Iq => "iq",
            StanzaKind::Message => "message",
            StanzaKind::Presence => "presence",
        }
    }
}

/// Common envelope attributes shared by all stanza kinds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Envelope {
    id: Option<String>,
    from: Option<Jid>,
    to: Option<Jid>,
    lang: Option<String>,
}

impl Envelope {
    fn parse(start: &StartElement) -> Result<Self, Error> {
        let id = start.attrs.get(Namespace::NONE, "id").map(|s| s.to_string());
        let from = start
            .attrs
            .get(Namespace::NONE, "from")
            .map(Jid::new)
            .transpose()?;
        let to = start
            .attrs
            .get(Namespace::NONE, "to")
            .map(Jid::new)
            .transpose()?;
        let lang = start
            .attrs
            .get(Namespace::from(ns::XML), "lang")
            .map(|s| s.to_string());
        Ok(Envelope { id, from, to, lang })
    }

    /// Apply `id`/`to`/`from`/`xml:lang` onto a start-element in canonical
    /// order: `id`, `to`, `from`, `xml:lang`, then the caller's `type`.
    fn apply(&self, mut start: StartElement) -> StartElement {
        if let Some(id) = &self.id {
            start = start.with_attr(Namespace::NONE, NcName::try_from("id").unwrap(), id.clone());
        }
        if let Some(to) = &self.to {
            start = start.with_attr(Namespace::NONE, NcName::try_from("to").unwrap(), to.to_string());
        }
        if let Some(from) = &self.from {
            start = start.with_attr(
                Namespace::NONE,
                NcName::try_from("from").unwrap(),
                from.to_string(),
            );
        }
        if let Some(lang) = &self.lang {
            start = start.with_attr(
                Namespace::from(ns::XML),
                NcName::try_from("lang").unwrap(),
                lang.clone(),
            );
        }
        start
    }

    fn swapped(&self) -> Self {
        Envelope {
            id: self.id.clone(),
            from: self.to.clone(),
            to: self.from.clone(),
            lang: self.lang.clone(),
        }
    }
}

/// The `type` attribute of an `<iq/>` stanza. The zero value marshals as
/// `get`, per the "a zero-value type marshals as get" invariant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IqType {
    /// `get`
    #[default]
    Get,
    /// `set`
    Set,
    /// `result`
    Result,
    /// `error`
    Error,
}

impl IqType {
    fn as_str(self) -> &'static str {
        match self {
            IqType::Get => "get",
            IqType::Set => "set",
            IqType::Result => "result",
            IqType::Error => "error",
        }
    }

    fn parse(s: Option<&str>) -> Self {
        match s {
            Some("set") => IqType::Set,
            Some("result") => IqType::Result,
            Some("error") => IqType::Error,
            _ => IqType::Get,
        }
    }
}

/// An `<iq/>` stanza envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Iq {
    /// Required for response correlation (see the IQ engine).
    pub id: String,
    /// The sender, if present.
    pub from: Option<Jid>,
    /// The recipient, if present.
    pub to: Option<Jid>,
    /// `xml:lang`, if present.
    pub lang: Option<String>,
    /// The IQ's `type`.
    pub type_: IqType,
}

impl Iq {
    /// Build the `<iq/>` start-element, attributes in canonical order.
    pub fn start_element(&self) -> StartElement {
        let envelope = Envelope {
            id: Some(self.id.clone()),
            from: self.from.clone(),
            to: self.to.clone(),
            lang: self.lang.clone(),
        };
        let start = StartElement::new(Namespace::NONE, NcName::try_from("iq").unwrap());
        let start = envelope.apply(start);
        start.with_attr(
            Namespace::NONE,
            NcName::try_from("type").unwrap(),
            self.type_.as_str(),
        )
    }

    /// Wrap `payload` in this IQ's envelope, producing the full stanza.
    pub fn wrap<R: TokenReader>(&self, payload: R) -> Wrap<R> {
        wrap(payload, self.start_element())
    }

    /// Decode the envelope from an already-read `<iq/>` start-element.
    ///
    /// Fails if `id` is absent: every IQ requires one for correlation.
    pub fn parse(start: &StartElement) -> Result<Self, Error> {
        let envelope = Envelope::parse(start)?;
        let id = envelope.id.clone().ok_or(Error::MissingAttribute("id"))?;
        let type_ = IqType::parse(start.attrs.get(Namespace::NONE, "type"));
        Ok(Iq {
            id,
            from: envelope.from,
            to: envelope.to,
            lang: envelope.lang,
            type_,
        })
    }

    /// Build the reply envelope for an error response: `from`/`to` swapped,
    /// `type` set to `error`, same `id`. Pair with
    /// [`StanzaError::to_reader`] as the payload.
    pub fn error_reply(&self) -> Iq {
        let envelope = Envelope {
            id: Some(self.id.clone()),
            from: self.from.clone(),
            to: self.to.clone(),
            lang: self.lang.clone(),
        }
        .swapped();
        Iq {
            id: envelope.id.unwrap(),
            from: envelope.from,
            to: envelope.to,
            lang: envelope.lang,
            type_: IqType::Error,
        }
    }

    /// Build the reply envelope for a `result` response: `from`/`to`
    /// swapped, `type` set to `result`, same `id`.
    pub fn result_reply(&self) -> Iq {
        let mut reply = self.error_reply();
        reply.type_ = IqType::Result;
        reply
    }
}

/// The `type` attribute of a `<message/>` stanza. Unrecognized or absent
/// types normalize to `normal`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MessageType {
    /// `normal` (the default).
    #[default]
    Normal,
    /// `chat`
    Chat,
    /// `groupchat`
    Groupchat,
    /// `headline`
    Headline,
    /// `error`
    Error,
}

impl MessageType {
    fn as_str(self) -> &'static str {
        match self {
            MessageType::Normal => "normal",
            MessageType::Chat => "chat",
            MessageType::Groupchat => "groupchat",
            MessageType::Headline => "headline",
            MessageType::Error => "error",
        }
    }

    fn parse(s: Option<&str>) -> Self {
        match s {
            Some("chat") => MessageType::Chat,
            Some("groupchat") => MessageType::Groupchat,
            Some("headline") => MessageType::Headline,
            Some("error") => MessageType::Error,
            _ => MessageType::Normal,
        }
    }
}

/// A `<message/>` stanza envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Optional; generated on demand by callers that need delivery
    /// receipts or carbons correlation.
    pub id: Option<String>,
    /// The sender, if present.
    pub from: Option<Jid>,
    /// The recipient, if present.
    pub to: Option<Jid>,
    /// `xml:lang`, if present.
    pub lang: Option<String>,
    /// The message's `type`.
    pub type_: MessageType,
}

impl Message {
    /// Build the `<message/>` start-element, attributes in canonical order.
    pub fn start_element(&self) -> StartElement {
        let envelope = Envelope {
            id: self.id.clone(),
            from: self.from.clone(),
            to: self.to.clone(),
            lang: self.lang.clone(),
        };
        let start = StartElement::new(Namespace::NONE, NcName::try_from("message").unwrap());
        let start = envelope.apply(start);
        start.with_attr(
            Namespace::NONE,
            NcName::try_from("type").unwrap(),
            self.type_.as_str(),
        )
    }

    /// Wrap `payload` in this message's envelope, producing the full
    /// stanza.
    pub fn wrap<R: TokenReader>(&self, payload: R) -> Wrap<R> {
        wrap(payload, self.start_element())
    }

    /// Decode the envelope from an already-read `<message/>` start-element.
    pub fn parse(start: &StartElement) -> Result<Self, Error> {
        let envelope = Envelope::parse(start)?;
        let type_ = MessageType::parse(start.attrs.get(Namespace::NONE, "type"));
        Ok(Message {
            id: envelope.id,
            from: envelope.from,
            to: envelope.to,
            lang: envelope.lang,
            type_,
        })
    }

    /// Build the reply envelope for an error response: `from`/`to`
    /// swapped, `type` set to `error`, same `id`.
    pub fn error_reply(&self) -> Message {
        let envelope = Envelope {
            id: self.id.clone(),
            from: self.from.clone(),
            to: self.to.clone(),
            lang: self.lang.clone(),
        }
        .swapped();
        Message {
            id: envelope.id,
            from: envelope.from,
            to: envelope.to,
            lang: envelope.lang,
            type_: MessageType::Error,
        }
    }
}

/// The `type` attribute of a `<presence/>` stanza. The empty string
/// (available) is the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PresenceType {
    /// No `type` attribute: the entity is available.
    #[default]
    Available,
    /// `unavailable`
    Unavailable,
    /// `subscribe`
    Subscribe,
    /// `subscribed`
    Subscribed,
    /// `unsubscribe`
    Unsubscribe,
    /// `unsubscribed`
    Unsubscribed,
    /// `probe`
    Probe,
    /// `error`
    Error,
}

impl PresenceType {
    fn as_str(self) -> Option<&'static str> {
        match self {
            PresenceType::Available => None,
            PresenceType::Unavailable => Some("unavailable"),
            PresenceType::Subscribe => Some("subscribe"),
            PresenceType::Subscribed => Some("subscribed"),
            PresenceType::Unsubscribe => Some("unsubscribe"),
            PresenceType::Unsubscribed => Some("unsubscribed"),
            PresenceType::Probe => Some("probe"),
            PresenceType::Error => Some("error"),
        }
    }

    fn parse(s: Option<&str>) -> Self {
        match s {
            None | Some("") => PresenceType::Available,
            Some("unavailable") => PresenceType::Unavailable,
            Some("subscribe") => PresenceType::Subscribe,
            Some("subscribed") => PresenceType::Subscribed,
            Some("unsubscribe") => PresenceType::Unsubscribe,
            Some("unsubscribed") => PresenceType::Unsubscribed,
            Some("probe") => PresenceType::Probe,
            _ => PresenceType::Error,
        }
    }
}

/// A `<presence/>` stanza envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presence {
    /// Optional stanza id.
    pub id: Option<String>,
    /// The sender, if present.
    pub from: Option<Jid>,
    /// The recipient, if present.
    pub to: Option<Jid>,
    /// `xml:lang`, if present.
    pub lang: Option<String>,
    /// The presence's `type`.
    pub type_: PresenceType,
}

impl Presence {
    /// Build the `<presence/>` start-element, attributes in canonical
    /// order.
    pub fn start_element(&self) -> StartElement {
        let envelope = Envelope {
            id: self.id.clone(),
            from: self.from.clone(),
            to: self.to.clone(),
            lang: self.lang.clone(),
        };
        let start = StartElement::new(Namespace::NONE, NcName::try_from("presence").unwrap());
        let start = envelope.apply(start);
        match self.type_.as_str() {
            Some(type_) => {
                start.with_attr(Namespace::NONE, NcName::try_from("type").unwrap(), type_)
            }
            None => start,
        }
    }

    /// Wrap `payload` in this presence's envelope, producing the full
    /// stanza.
    pub fn wrap<R: TokenReader>(&self, payload: R) -> Wrap<R> {
        wrap(payload, self.start_element())
    }

    /// Decode the envelope from an already-read `<presence/>`
    /// start-element.
    pub fn parse(start: &StartElement) -> Result<Self, Error> {
        let envelope = Envelope::parse(start)?;
        let type_ = PresenceType::parse(start.attrs.get(Namespace::NONE, "type"));
        Ok(Presence {
            id: envelope.id,
            from: envelope.from,
            to: envelope.to,
            lang: envelope.lang,
            type_,
        })
    }

    /// Build the reply envelope for an error response: `from`/`to`
    /// swapped, `type` set to `error`, same `id`.
    pub fn error_reply(&self) -> Presence {
        let envelope = Envelope {
            id: self.id.clone(),
            from: self.from.clone(),
            to: self.to.clone(),
            lang: self.lang.clone(),
        }
        .swapped();
        Presence {
            id: envelope.id,
            from: envelope.from,
            to: envelope.to,
            lang: envelope.lang,
            type_: PresenceType::Error,
        }
    }
}
