//! XEP-0202: Entity Time.

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use chrono::{DateTime, FixedOffset, Utc};
use rxml::{NcName, Namespace};

use jid::Jid;
use mux::IqHandler;
use session::{IqResponse, Session};
use stanza::{Iq, IqType};
use xmlstream::{fast_forward, single, wrap, Iter, StartElement, Token, TokenReader, TokenWriter};

use crate::{stamp_iq, ActiveChild, Chain, Empty, Error};

fn ncname(s: &'static str) -> NcName {
    NcName::try_from(s).unwrap()
}

fn time_name() -> (Namespace, NcName) {
    (Namespace::from(stanza::ns::TIME), ncname("time"))
}

/// A decoded `<time xmlns="urn:xmpp:time"/>` response: the peer's UTC
/// offset and current instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityTime {
    /// The peer's local UTC offset.
    pub tzo: FixedOffset,
    /// The peer's current instant, in UTC.
    pub utc: DateTime<Utc>,
}

impl EntityTime {
    fn to_reader(&self) -> impl TokenReader {
        let tns = Namespace::from(stanza::ns::TIME);
        let tzo = wrap(
            single(Token::Text(format_tzo(self.tzo))),
            StartElement::new(tns.clone(), ncname("tzo")),
        );
        let utc = wrap(
            single(Token::Text(format_utc(self.utc))),
            StartElement::new(tns.clone(), ncname("utc")),
        );
        let (ns, name) = time_name();
        wrap(Chain::new(tzo, utc), StartElement::new(ns, name))
    }

    fn parse<R: TokenReader>(mut children: Iter<R>) -> Result<Self, Error> {
        let mut tzo = None;
        let mut utc = None;
        while let Some(start) = children.next_child()? {
            let mut text = String::new();
            while let Some(token) = children.child_token()? {
                if let Token::Text(t) = token {
                    text.push_str(&t);
                }
            }
            match &*start.name {
                "tzo" => tzo = Some(parse_tzo(&text)?),
                "utc" => utc = Some(parse_utc(&text)?),
                _ => {}
            }
        }
        Ok(EntityTime {
            tzo: tzo.ok_or(stanza::Error::MissingAttribute("tzo"))?,
            utc: utc.ok_or(stanza::Error::MissingAttribute("utc"))?,
        })
    }
}

fn format_tzo(offset: FixedOffset) -> String {
    let total = offset.local_minus_utc();
    let sign = if total < 0 { '-' } else { '+' };
    let total = total.abs();
    format!("{sign}{:02}:{:02}", total / 3600, (total % 3600) / 60)
}

fn invalid_tzo(s: &str) -> Error {
    Error::Stanza(stanza::Error::InvalidAttribute("tzo", s.to_string()))
}

fn parse_tzo(s: &str) -> Result<FixedOffset, Error> {
    let (sign, rest) = match s.as_bytes().first() {
        Some(b'+') => (1, &s[1..]),
        Some(b'-') => (-1, &s[1..]),
        _ => return Err(invalid_tzo(s)),
    };
    let mut parts = rest.splitn(2, ':');
    let hours: i32 = parts.next().and_then(|h| h.parse().ok()).ok_or_else(|| invalid_tzo(s))?;
    let minutes: i32 = parts.next().and_then(|m| m.parse().ok()).ok_or_else(|| invalid_tzo(s))?;
    let seconds = sign * (hours * 3600 + minutes * 60);
    FixedOffset::east_opt(seconds).ok_or_else(|| invalid_tzo(s))
}

fn format_utc(utc: DateTime<Utc>) -> String {
    utc.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn parse_utc(s: &str) -> Result<DateTime<Utc>, Error> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| Error::Stanza(stanza::Error::InvalidAttribute("utc", s.to_string())))
}

/// Ask `to` for its local time.
pub async fn request(session: &dyn Session, to: Option<Jid>) -> Result<EntityTime, Error> {
    let (ns, name) = time_name();
    let payload = wrap(Empty, StartElement::new(ns, name));
    let iq = Iq {
        id: String::new(),
        from: None,
        to: to.clone(),
        lang: None,
        type_: IqType::Get,
    };
    let (id, stream) = stamp_iq(iq, payload);

    match session.send_iq(Box::new(stream), id, to).await? {
        IqResponse::Result(reader) => {
            let mut top = xmlstream::iter_children(reader);
            let _time_start = top.next_child()?.ok_or(stanza::Error::UnexpectedElement)?;
            let children = xmlstream::iter_children(ActiveChild(&mut top));
            EntityTime::parse(children)
        }
        IqResponse::Error(err) => Err(Error::Remote(err)),
    }
}

/// Replies to an inbound time request with a fixed UTC offset, stamping
/// the current instant at reply time. Register on
/// `("get", Some(ns::TIME), Some("time"))`.
pub struct TimeHandler {
    tzo: FixedOffset,
}

impl TimeHandler {
    /// Build a handler that always reports `tzo` as the local offset.
    pub fn new(tzo: FixedOffset) -> Self {
        TimeHandler { tzo }
    }
}

impl IqHandler for TimeHandler {
    fn handle_iq(
        &self,
        iq: &Iq,
        _child: &StartElement,
        reader: &mut dyn TokenReader,
        writer: &mut dyn TokenWriter,
    ) -> Result<(), mux::Error> {
        let (_, err) = fast_forward(reader);
        if let Some(e) = err {
            return Err(e.into());
        }
        let now = EntityTime {
            tzo: self.tzo,
            utc: Utc::now(),
        };
        let reply = iq.result_reply();
        let mut stream = reply.wrap(now.to_reader());
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

    #[test]
    fn formats_positive_and_negative_offsets() {
        assert_eq!(format_tzo(FixedOffset::east_opt(3600).unwrap()), "+01:00");
        assert_eq!(format_tzo(FixedOffset::west_opt(5 * 3600 + 30 * 60).unwrap()), "-05:30");
    }

    #[test]
    fn parses_what_it_formats() {
        let offset = FixedOffset::west_opt(8 * 3600).unwrap();
        assert_eq!(parse_tzo(&format_tzo(offset)).unwrap(), offset);
    }

    #[test]
    fn handler_replies_with_tzo_and_utc() {
        let iq = Iq {
            id: "1".into(),
            from: None,
            to: None,
            lang: None,
            type_: IqType::Get,
        };
        let child = StartElement::new(Namespace::from(stanza::ns::TIME), ncname("time"));
        let mut reader = VecReader(VecDeque::new());
        let mut writer = Collector::default();

        TimeHandler::new(FixedOffset::east_opt(3600).unwrap())
            .handle_iq(&iq, &child, &mut reader, &mut writer)
            .unwrap();

        let written = writer.0.lock().unwrap();
        assert!(matches!(written[0], Token::StartElement(ref s) if s.name.to_string() == "iq"));
        assert!(written.iter().any(|t| matches!(t, Token::StartElement(s) if s.name.to_string() == "tzo")));
        assert!(written.iter().any(|t| matches!(t, Token::StartElement(s) if s.name.to_string() == "utc")));
    }
}
