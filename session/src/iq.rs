// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;
use std::future::Future;
use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::{Arc, Mutex, Weak};
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use jid::Jid;
use stanza::{Iq, IqType, StanzaError};
use xmlstream::{Iter, Token, TokenReader};

use crate::Error;

/// The decoded payload of an inbound IQ response.
pub enum IqResponse {
    /// A `type="result"`. The reader is positioned at the first token of
    /// the result's children (possibly none, e.g. an empty acknowledgement)
    /// and is lazy: large payloads (a roster fetch) are not buffered.
    Result(Box<dyn TokenReader + Send>),
    /// A `type="error"`, already decoded since error payloads are small
    /// and callers almost always want to pattern-match the condition.
    Error(StanzaError),
}

/// Flattens an [`Iter`] back into a plain token stream: each child's
/// start-element, its content, and a synthesized end-element, in order.
///
/// This is how an IQ result's payload — read lazily one child at a time by
/// the correlation engine's caller — is handed back to the original
/// `send_iq` caller as an ordinary [`TokenReader`].
struct IterReader<R> {
    iter: Iter<R>,
    in_child: bool,
}

impl<R: TokenReader> TokenReader for IterReader<R> {
    fn read_token(&mut self) -> Result<Option<Token>, xmlstream::Error> {
        loop {
            if self.in_child {
                match self.iter.child_token()? {
                    Some(t) => return Ok(Some(t)),
                    None => {
                        self.in_child = false;
                        return Ok(Some(Token::EndElement));
                    }
                }
            }
            match self.iter.next_child()? {
                Some(start) => {
                    self.in_child = true;
                    return Ok(Some(Token::StartElement(start)));
                }
                None => return Ok(None),
            }
        }
    }
}

type IqKey = (Option<Jid>, String);
type IqMap = BTreeMap<IqKey, oneshot::Sender<IqResponse>>;

struct IqMapEntryHandle {
    key: IqKey,
    map: Weak<Mutex<IqMap>>,
}

impl Drop for IqMapEntryHandle {
    fn drop(&mut self) {
        let Some(map) = self.map.upgrade() else {
            return;
        };
        let Ok(mut map) = map.lock() else {
            return;
        };
        map.remove(&self.key);
    }
}

/// A pending IQ response. Polling it to completion, or dropping it, are
/// both correct: dropping removes the outstanding-request bookkeeping
/// immediately, matching the "cancellation removes the correlation entry"
/// invariant — Rust's future-cancel-on-drop is the natural expression of
/// that requirement, no explicit cancellation token needed.
pub struct IqResponseFuture {
    entry: Option<IqMapEntryHandle>,
    inner: oneshot::Receiver<IqResponse>,
}

impl Future for IqResponseFuture {
    type Output = Result<IqResponse, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.inner).poll(cx) {
            Poll::Ready(Ok(v)) => {
                self.entry.take();
                Poll::Ready(Ok(v))
            }
            Poll::Ready(Err(_)) => {
                self.entry.take();
                Poll::Ready(Err(Error::LostSession))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Tracks outstanding IQ requests and matches inbound result/error IQs
/// against them by `(from, id)`.
pub struct IqTracker {
    map: Arc<Mutex<IqMap>>,
}

impl Default for IqTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl IqTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        IqTracker {
            map: Arc::new(Mutex::new(IqMap::new())),
        }
    }

    /// Allocate a fresh id, register a slot for the response expected from
    /// `to`, and return both. The caller is responsible for stamping the
    /// returned id onto the outbound `<iq/>` before sending it.
    pub fn register(&self, to: Option<Jid>) -> (String, IqResponseFuture) {
        let id = idgen::new_id();
        let key = (to, id.clone());
        let (tx, rx) = oneshot::channel();
        let mut map = self.map.lock().unwrap();
        assert!(
            map.get(&key).is_none(),
            "session: generated IQ id collided with an outstanding request"
        );
        map.insert(key.clone(), tx);
        let future = IqResponseFuture {
            entry: Some(IqMapEntryHandle {
                key,
                map: Arc::downgrade(&self.map),
            }),
            inner: rx,
        };
        (id, future)
    }

    /// Attempt to match an inbound top-level element as an IQ response.
    ///
    /// Returns `ControlFlow::Break(())` once the response has been
    /// delivered to its waiting [`IqResponseFuture`] (or silently dropped,
    /// for an unknown id). Returns `ControlFlow::Continue(children)` for
    /// anything that isn't a matched result/error IQ, so the caller (the
    /// mux, typically) can dispatch it normally.
    pub fn handle_inbound<R>(&self, iq: &Iq, children: Iter<R>) -> ControlFlow<(), Iter<R>>
    where
        R: TokenReader + Send + 'static,
    {
        match iq.type_ {
            IqType::Result | IqType::Error => {}
            IqType::Get | IqType::Set => return ControlFlow::Continue(children),
        }

        let key = (iq.from.clone(), iq.id.clone());
        let sink = {
            let mut map = self.map.lock().unwrap();
            map.remove(&key)
        };
        let Some(sink) = sink else {
            log::warn!(
                "no outstanding IQ request for response with id {:?} from {:?}",
                key.1,
                key.0
            );
            return ControlFlow::Continue(children);
        };

        let response = match iq.type_ {
            IqType::Error => match decode_error(children) {
                Ok(err) => IqResponse::Error(err),
                Err(_) => return ControlFlow::Break(()),
            },
            IqType::Result => IqResponse::Result(Box::new(IterReader {
                iter: children,
                in_child: false,
            })),
            IqType::Get | IqType::Set => unreachable!(),
        };
        let _ = sink.send(response);
        ControlFlow::Break(())
    }
}

/// Adapts the currently active child of an [`Iter`] into a plain
/// [`TokenReader`] over just that child's content, so it can itself be
/// walked with [`xmlstream::iter_children`].
struct ActiveChildReader<'a, R: TokenReader>(&'a mut Iter<R>);

impl<'a, R: TokenReader> TokenReader for ActiveChildReader<'a, R> {
    fn read_token(&mut self) -> Result<Option<Token>, xmlstream::Error> {
        self.0.child_token()
    }
}

fn decode_error<R: TokenReader>(mut children: Iter<R>) -> Result<StanzaError, Error> {
    let Some(start) = children.next_child()? else {
        return Ok(StanzaError::default());
    };
    let type_ = start.attrs.get(rxml::Namespace::NONE, "type").map(str::to_string);
    let by = start.attrs.get(rxml::Namespace::NONE, "by").map(str::to_string);
    let inner = xmlstream::iter_children(ActiveChildReader(&mut children));
    let err = StanzaError::parse(type_.as_deref(), by.as_deref(), inner)?;
    while children.next_child()?.is_some() {}
    Ok(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    fn ncname(s: &str) -> rxml::NcName {
        rxml::NcName::try_from(s).unwrap()
    }

    struct VecReader(VecDeque<Token>);
    impl TokenReader for VecReader {
        fn read_token(&mut self) -> Result<Option<Token>, xmlstream::Error> {
            Ok(self.0.pop_front())
        }
    }

    fn iq_envelope(id: &str, type_: &str) -> StartElement {
        let mut start = StartElement::new(rxml::Namespace::NONE, ncname("iq"));
        start = start.with_attr(rxml::Namespace::NONE, ncname("id"), id);
        start = start.with_attr(rxml::Namespace::NONE, ncname("type"), type_);
        start
    }

    #[tokio::test]
    async fn result_response_is_delivered() {
        let tracker = IqTracker::new();
        let (id, future) = tracker.register(Some(Jid::new("peer@example.com").unwrap()));

        let start = iq_envelope(&id, "result");
        let iq = Iq::parse(&start).unwrap();
        let tokens: VecDeque<Token> = vec![
            Token::StartElement(StartElement::new(rxml::Namespace::NONE, ncname("query"))),
            Token::EndElement,
            Token::EndElement, // closes <iq>
        ]
        .into();
        let children = xmlstream::iter_children(VecReader(tokens));

        assert!(matches!(
            tracker.handle_inbound(&iq, children),
            ControlFlow::Break(())
        ));

        let response = future.await.unwrap();
        match response {
            IqResponse::Result(mut reader) => {
                assert!(matches!(
                    reader.read_token().unwrap(),
                    Some(Token::StartElement(_))
                ));
            }
            IqResponse::Error(_) => panic!("expected a result"),
        }
    }

    #[tokio::test]
    async fn error_response_is_decoded() {
        let tracker = IqTracker::new();
        let (id, future) = tracker.register(None);

        let start = iq_envelope(&id, "error");
        let iq = Iq::parse(&start).unwrap();
        let mut error_start = StartElement::new(rxml::Namespace::NONE, ncname("error"));
        error_start = error_start.with_attr(rxml::Namespace::NONE, ncname("type"), "cancel");
        let condition = StartElement::new(
            rxml::Namespace::from("urn:ietf:params:xml:ns:xmpp-stanzas"),
            ncname("service-unavailable"),
        );
        let tokens: VecDeque<Token> = vec![
            Token::StartElement(error_start),
            Token::StartElement(condition),
            Token::EndElement,
            Token::EndElement, // closes <error>
            Token::EndElement, // closes <iq>
        ]
        .into();
        let children = xmlstream::iter_children(VecReader(tokens));

        tracker.handle_inbound(&iq, children);
        let response = future.await.unwrap();
        match response {
            IqResponse::Error(err) => {
                assert_eq!(
                    err.condition,
                    Some(stanza::DefinedCondition::ServiceUnavailable)
                );
            }
            IqResponse::Result(_) => panic!("expected an error"),
        }
    }

    #[tokio::test]
    async fn dropping_the_future_removes_the_entry() {
        let tracker = IqTracker::new();
        let (id, future) = tracker.register(None);
        drop(future);

        let start = iq_envelope(&id, "result");
        let iq = Iq::parse(&start).unwrap();
        let children = xmlstream::iter_children(VecReader(VecDeque::from([Token::EndElement])));
        assert!(matches!(
            tracker.handle_inbound(&iq, children),
            ControlFlow::Continue(_)
        ));
    }
}
