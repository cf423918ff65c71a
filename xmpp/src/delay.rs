//! XEP-0203: Delayed Delivery.

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use chrono::{DateTime, Utc};
use rxml::{NcName, Namespace};

use jid::Jid;
use stanza::ns;
use xmlstream::transform::insert;
use xmlstream::{single, wrap, Iter, StartElement, Token, TokenReader, Transformer};

use crate::Error;

fn ncname(s: &'static str) -> NcName {
    NcName::try_from(s).unwrap()
}

/// A `<delay xmlns="urn:xmpp:delay"/>` element: records when a stanza was
/// originally generated, for stanzas not delivered in real time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delay {
    /// The entity that originally sent (or withheld) the stanza.
    pub from: Option<Jid>,
    /// When the stanza was originally sent.
    pub stamp: DateTime<Utc>,
    /// A human-readable reason, from the element's text content.
    pub reason: String,
}

impl Delay {
    /// Build the `<delay/>` start-element and its token stream.
    pub fn to_reader(&self) -> impl TokenReader {
        let mut start = StartElement::new(Namespace::from(ns::DELAY), ncname("delay"));
        if let Some(from) = &self.from {
            start = start.with_attr(Namespace::NONE, ncname("from"), from.to_string());
        }
        start = start.with_attr(Namespace::NONE, ncname("stamp"), format_stamp(self.stamp));
        wrap(single(Token::Text(self.reason.clone())), start)
    }

    /// Decode a `Delay` from an already-read `<delay/>` start-element and
    /// its children (just character data, per the wire format, but any
    /// unexpected child elements are drained rather than rejected).
    pub fn parse<R: TokenReader>(start: &StartElement, mut children: Iter<R>) -> Result<Self, Error> {
        let from = start
            .attrs
            .get(Namespace::NONE, "from")
            .map(Jid::new)
            .transpose()?;
        let stamp_str = start
            .attrs
            .get(Namespace::NONE, "stamp")
            .ok_or(stanza::Error::MissingAttribute("stamp"))?;
        let stamp = parse_stamp(stamp_str)?;

        let mut reason = String::new();
        while let Some(token) = children.child_token()? {
            if let Token::Text(t) = token {
                reason.push_str(&t);
            }
        }
        // A `<delay/>` has no child elements in practice; if a buggy peer
        // nests one anyway, drain it rather than choke on it.
        while children.next_child()?.is_some() {}

        Ok(Delay { from, stamp, reason })
    }
}

fn format_stamp(stamp: DateTime<Utc>) -> String {
    stamp.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn parse_stamp(s: &str) -> Result<DateTime<Utc>, Error> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| Error::Stanza(stanza::Error::InvalidAttribute("stamp", s.to_string())))
}

/// The stanza local names a delay may be inserted after, one per
/// (namespace, name) pair, covering both client and server streams.
fn stanza_names() -> [(Namespace, NcName); 6] {
    [
        (Namespace::from(ns::CLIENT), ncname("iq")),
        (Namespace::from(ns::CLIENT), ncname("message")),
        (Namespace::from(ns::CLIENT), ncname("presence")),
        (Namespace::from(ns::SERVER), ncname("iq")),
        (Namespace::from(ns::SERVER), ncname("message")),
        (Namespace::from(ns::SERVER), ncname("presence")),
    ]
}

/// Build a [`Transformer`] that inserts `delay` as the first child (depth
/// 1) of any `iq`/`message`/`presence` start-element in the client or
/// server stream namespace. Any other top-level element passes through
/// unchanged.
pub fn transformer(delay: Delay) -> Box<dyn Transformer> {
    let mut chained: Option<Box<dyn Transformer>> = None;
    for name in stanza_names() {
        let delay = delay.clone();
        let next = Box::new(insert(name, move || {
            Box::new(delay.to_reader()) as Box<dyn TokenReader>
        }));
        chained = Some(match chained {
            None => next,
            Some(prev) => Box::new(ChainTransform(prev, next)),
        });
    }
    chained.expect("stanza_names is non-empty")
}

/// Applies two transformers in sequence: `first` then `second`.
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

    struct VecReader(VecDeque<Token>);
    impl TokenReader for VecReader {
        fn read_token(&mut self) -> Result<Option<Token>, xmlstream::Error> {
            Ok(self.0.pop_front())
        }
    }

    fn epoch() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("0001-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn formats_as_utc_z_suffix() {
        assert_eq!(format_stamp(epoch()), "0001-01-01T00:00:00Z");
    }

    #[test]
    fn transformer_inserts_at_depth_one_for_matching_namespace() {
        let delay = Delay {
            from: Some(Jid::new("me@x").unwrap()),
            stamp: epoch(),
            reason: "x".into(),
        };
        let start = StartElement::new(Namespace::from(ns::CLIENT), ncname("message"));
        let reader: Box<dyn TokenReader> = Box::new(wrap(VecReader(VecDeque::new()), start));

        let mut out = transformer(delay).transform(reader);
        assert!(matches!(out.read_token().unwrap(), Some(Token::StartElement(s)) if s.name.to_string() == "message"));
        assert!(matches!(out.read_token().unwrap(), Some(Token::StartElement(s)) if s.name.to_string() == "delay"));
        assert_eq!(out.read_token().unwrap(), Some(Token::Text("x".into())));
        assert_eq!(out.read_token().unwrap(), Some(Token::EndElement)); // closes <delay>
        assert_eq!(out.read_token().unwrap(), Some(Token::EndElement)); // closes <message>
        assert_eq!(out.read_token().unwrap(), None);
    }

    #[test]
    fn transformer_passes_through_unknown_namespace() {
        let delay = Delay {
            from: None,
            stamp: epoch(),
            reason: String::new(),
        };
        let start = StartElement::new(Namespace::from("jabber:badns"), ncname("message"));
        let reader: Box<dyn TokenReader> = Box::new(wrap(VecReader(VecDeque::new()), start));

        let mut out = transformer(delay).transform(reader);
        assert!(matches!(out.read_token().unwrap(), Some(Token::StartElement(s)) if &*s.ns == "jabber:badns"));
        assert_eq!(out.read_token().unwrap(), Some(Token::EndElement));
        assert_eq!(out.read_token().unwrap(), None);
    }
}
