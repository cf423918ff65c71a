//! XEP-0045 §8.1: room subject changes.

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use jid::Jid;
use mux::MessageHandler;
use session::Session;
use rxml::Namespace;
use stanza::{Message, MessageType};
use xmlstream::{single, wrap, StartElement, Token, TokenReader, TokenWriter};

use crate::Error;

fn ncname(s: &'static str) -> rxml::NcName {
    rxml::NcName::try_from(s).unwrap()
}

/// Change `room`'s subject. Only a moderator (or, depending on room
/// configuration, any occupant) may do this; a rejection arrives as a
/// presence-less message error the caller's own error-message handling
/// layer is expected to surface.
pub async fn change_subject(session: &dyn Session, room: &Jid, subject: &str) -> Result<(), Error> {
    let payload = wrap(
        single(Token::Text(subject.to_string())),
        StartElement::new(Namespace::NONE, ncname("subject")),
    );
    let message = Message {
        id: None,
        from: None,
        to: Some(room.clone()),
        lang: None,
        type_: MessageType::Groupchat,
    };
    session.send(Box::new(message.wrap(payload))).await?;
    Ok(())
}

/// Reacts to an inbound subject announcement.
pub trait SubjectSink: Send + Sync {
    /// `from` is the full room JID of whoever set the subject (the
    /// room's own JID for history replay, an occupant's for a live
    /// change).
    fn on_subject(&self, from: &Jid, subject: String);
}

/// Register on `("groupchat", None, Some("subject"))`.
pub struct SubjectHandler<S>(S);

impl<S: SubjectSink> SubjectHandler<S> {
    /// Build a handler delivering into `sink`.
    pub fn new(sink: S) -> Self {
        SubjectHandler(sink)
    }
}

impl<S: SubjectSink> MessageHandler for SubjectHandler<S> {
    fn handle_message(
        &self,
        message: &Message,
        _child: &StartElement,
        reader: &mut dyn TokenReader,
        _writer: &mut dyn TokenWriter,
    ) -> Result<(), mux::Error> {
        reader.read_token()?;
        reader.read_token()?;
        let mut text = String::new();
        let mut inner = xmlstream::inner(reader);
        loop {
            match inner.read_token()? {
                Some(Token::Text(t)) => text.push_str(&t),
                Some(_) => {}
                None => break,
            }
        }

        let Some(from) = &message.from else {
            return Ok(());
        };
        self.0.on_subject(from, text);
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

    fn test_ncname(s: &str) -> rxml::NcName {
        rxml::NcName::try_from(s).unwrap()
    }

    #[derive(Default)]
    struct Recording(Mutex<Vec<(Jid, String)>>);
    impl SubjectSink for Recording {
        fn on_subject(&self, from: &Jid, subject: String) {
            self.0.lock().unwrap().push((from.clone(), subject));
        }
    }

    #[test]
    fn decodes_subject_text() {
        let message = Message {
            id: None,
            from: Some(Jid::new("room@conference.example/nick").unwrap()),
            to: None,
            lang: None,
            type_: MessageType::Groupchat,
        };
        let message_start = StartElement::new(Namespace::NONE, test_ncname("message"));
        let child = StartElement::new(Namespace::NONE, test_ncname("subject"));
        let tokens: VecDeque<Token> = vec![
            Token::StartElement(message_start),
            Token::StartElement(child.clone()),
            Token::Text("new topic".into()),
            Token::EndElement, // closes subject
        ]
        .into();
        let mut reader = VecReader(tokens);
        struct NullWriter;
        impl TokenWriter for NullWriter {
            fn write_token(&mut self, _t: Token) -> Result<(), xmlstream::Error> {
                Ok(())
            }
        }
        let mut writer = NullWriter;

        let recorder = Recording::default();
        let handler = SubjectHandler::new(recorder);
        handler
            .handle_message(&message, &child, &mut reader, &mut writer)
            .unwrap();

        let recorded = handler.0 .0.lock().unwrap();
        assert_eq!(recorded[0].1, "new topic");
    }
}
