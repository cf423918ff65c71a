//! XEP-0199: XMPP Ping.

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use rxml::{NcName, Namespace};

use jid::Jid;
use mux::IqHandler;
use session::{IqResponse, Session};
use stanza::{DefinedCondition, Iq, IqType, StanzaError};
use xmlstream::{fast_forward, multi_reader, wrap, StartElement, TokenReader, TokenWriter};

use crate::{stamp_iq, Empty, Error};

fn ping_name() -> (Namespace, NcName) {
    (Namespace::from(stanza::ns::PING), NcName::try_from("ping").unwrap())
}

/// Send a ping to `to` and await the response. A `service-unavailable`
/// error is treated as a successful round trip: the peer exists, it just
/// doesn't implement the feature.
pub async fn send(session: &dyn Session, to: Option<Jid>) -> Result<(), Error> {
    let (ns, name) = ping_name();
    let ping = wrap(Empty, StartElement::new(ns, name));
    let iq = Iq {
        id: String::new(),
        from: None,
        to: to.clone(),
        lang: None,
        type_: IqType::Get,
    };
    let (id, stream) = stamp_iq(iq, ping);

    match session.send_iq(Box::new(stream), id, to).await? {
        IqResponse::Result(mut reader) => {
            let (_, err) = fast_forward(&mut *reader);
            if let Some(e) = err {
                return Err(e.into());
            }
            Ok(())
        }
        IqResponse::Error(err) => {
            if err.is(&StanzaError::with_condition(DefinedCondition::ServiceUnavailable)) {
                Ok(())
            } else {
                Err(Error::Remote(err))
            }
        }
    }
}

/// Replies to an inbound ping request with an empty result. Register on
/// `("get", Some(ns::PING), Some("ping"))`.
pub struct PingHandler;

impl IqHandler for PingHandler {
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
        let reply = iq.result_reply();
        let mut stream = reply.wrap(multi_reader(vec![]));
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

    use xmlstream::Token;

    fn ncname(s: &str) -> NcName {
        NcName::try_from(s).unwrap()
    }

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
    fn handler_replies_with_empty_result() {
        let start = Iq {
            id: "abc".into(),
            from: Some(Jid::new("peer@x").unwrap()),
            to: None,
            lang: None,
            type_: IqType::Get,
        };
        let ping_start = StartElement::new(Namespace::from(stanza::ns::PING), ncname("ping"));
        let mut reader = VecReader(VecDeque::new());
        let mut writer = Collector::default();

        PingHandler
            .handle_iq(&start, &ping_start, &mut reader, &mut writer)
            .unwrap();

        let written = writer.0.lock().unwrap();
        assert!(matches!(written[0], Token::StartElement(ref s) if s.name.to_string() == "iq"));
        assert_eq!(written.last(), Some(&Token::EndElement));
    }
}
