//! XEP-0045: Multi-User Chat client.
//!
//! A room membership goes through the same six states regardless of
//! which side initiates: `unjoined → joining → joined → leaving →
//! unjoined`, with `joining`/`leaving` able to bounce back on a presence
//! error. [`Muc`] tracks every membership this process currently has in
//! flight or established, keyed by the full room JID (the room's bare
//! address with the occupant nickname as resource); [`MucPresenceHandler`]
//! (see [`presence`]) is the inbound half that resolves or fails each one
//! as the server's presence arrives.

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, SecondsFormat, Utc};
use rxml::{NcName, Namespace};
use tokio::sync::oneshot;

use jid::Jid;
use session::Session;
use stanza::{Presence, PresenceType};
use xmlstream::{single, wrap, StartElement, Token, TokenReader};

use crate::{maybe, Chain, Empty, Error};

pub mod admin;
pub mod invite;
pub mod owner;
pub mod presence;
pub mod subject;

pub use presence::{Item, MucPresenceHandler, MucSink, NullSink};

fn ncname(s: &'static str) -> NcName {
    NcName::try_from(s).unwrap()
}

fn muc_ns() -> Namespace {
    Namespace::from(stanza::ns::MUC)
}

/// Requested discussion history, attached to a join presence (XEP-0045
/// §7.1.17).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct History {
    /// Limit by number of stanzas.
    pub max_stanzas: Option<u32>,
    /// Limit by total character count.
    pub max_chars: Option<u32>,
    /// Limit to messages received in the last `seconds` seconds.
    pub seconds: Option<u32>,
    /// Send only messages received since this instant.
    pub since: Option<DateTime<Utc>>,
}

impl History {
    fn to_reader(self) -> impl TokenReader {
        let mut start = StartElement::new(muc_ns(), ncname("history"));
        if let Some(v) = self.max_stanzas {
            start = start.with_attr(Namespace::NONE, ncname("maxstanzas"), v.to_string());
        }
        if let Some(v) = self.max_chars {
            start = start.with_attr(Namespace::NONE, ncname("maxchars"), v.to_string());
        }
        if let Some(v) = self.seconds {
            start = start.with_attr(Namespace::NONE, ncname("seconds"), v.to_string());
        }
        if let Some(since) = self.since {
            start = start.with_attr(
                Namespace::NONE,
                ncname("since"),
                since.to_rfc3339_opts(SecondsFormat::Secs, true),
            );
        }
        wrap(Empty, start)
    }
}

struct Slot {
    join: Mutex<Option<oneshot::Sender<Result<Jid, stanza::StanzaError>>>>,
    depart: Mutex<Option<oneshot::Sender<Result<(), stanza::StanzaError>>>>,
}

/// Tracks every room membership this process is joining, has joined, or is
/// leaving, keyed by the full occupant JID.
///
/// Share one instance (behind an `Arc`) between [`join`]/[`Channel::leave`]
/// and the [`MucPresenceHandler`] registered on the [`mux::MuxBuilder`] —
/// the handler is what actually resolves a pending join or departure as
/// the corresponding presence arrives.
#[derive(Default)]
pub struct Muc {
    managed: Mutex<HashMap<Jid, Arc<Slot>>>,
}

impl Muc {
    /// Build a tracker with no memberships in flight.
    pub fn new() -> Self {
        Muc::default()
    }

    fn slot_for(&self, room: &Jid) -> Option<Arc<Slot>> {
        self.managed.lock().unwrap().get(room).cloned()
    }

    fn remove(&self, room: &Jid) {
        self.managed.lock().unwrap().remove(room);
    }

    /// Whether `bare` (a room's bare address) is the bare address of any
    /// currently managed full occupant JID.
    pub(crate) fn has_room(&self, bare: &Jid) -> bool {
        self.managed
            .lock()
            .unwrap()
            .keys()
            .any(|key| &key.bare() == bare)
    }
}

struct JoinGuard {
    room: Jid,
    muc: Arc<Muc>,
    armed: bool,
}

impl JoinGuard {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for JoinGuard {
    fn drop(&mut self) {
        if self.armed {
            self.muc.remove(&self.room);
        }
    }
}

/// Join `room` under `nick`. Resolves once the server's self-presence
/// (status code 110) confirms membership, or fails with the server's
/// presence error.
///
/// Dropping the returned future before it resolves — the natural way to
/// cancel an `await` in Rust — detaches the pending join from `muc`: a
/// reply that arrives afterwards, if one ever does, is simply ignored
/// rather than leaking a stale entry.
pub async fn join(
    muc: &Arc<Muc>,
    session: &dyn Session,
    room: &Jid,
    nick: &str,
    password: Option<&str>,
    history: Option<History>,
) -> Result<Channel, Error> {
    let full = room.bare().with_resource(nick)?;

    let (tx, rx) = oneshot::channel();
    let slot = Arc::new(Slot {
        join: Mutex::new(Some(tx)),
        depart: Mutex::new(None),
    });
    muc.managed.lock().unwrap().insert(full.clone(), slot);
    let guard = JoinGuard {
        room: full.clone(),
        muc: muc.clone(),
        armed: true,
    };

    let history_part = maybe(history.map(History::to_reader));
    let password_part = maybe(password.map(|p| {
        wrap(
            single(Token::Text(p.to_string())),
            StartElement::new(muc_ns(), ncname("password")),
        )
    }));
    let x = wrap(
        Chain::new(history_part, password_part),
        StartElement::new(muc_ns(), ncname("x")),
    );

    let presence = Presence {
        id: Some(idgen::new_id()),
        from: None,
        to: Some(full.clone()),
        lang: None,
        type_: PresenceType::Available,
    };
    let stream = presence.wrap(x);
    session.send(Box::new(stream)).await?;

    match rx.await {
        Ok(Ok(addr)) => {
            guard.disarm();
            Ok(Channel {
                muc: muc.clone(),
                addr,
            })
        }
        Ok(Err(stanza_err)) => Err(Error::Remote(stanza_err)),
        Err(_) => Err(Error::Session(session::Error::LostSession)),
    }
}

/// A joined room membership.
///
/// Dropping a `Channel` without calling [`Channel::leave`] leaves the
/// room's bookkeeping entry in place: the occupant is still considered
/// joined, and [`MucPresenceHandler`] will still react correctly to an
/// eventual self-presence departure or error, but nothing local observes
/// it. Call `leave` to depart on purpose.
pub struct Channel {
    muc: Arc<Muc>,
    addr: Jid,
}

impl Channel {
    /// The full JID this process occupies the room as — possibly
    /// different from the requested nickname, if the server reassigned
    /// it (XEP-0045 §7.2).
    pub fn me(&self) -> &Jid {
        &self.addr
    }

    /// Leave the room, optionally with a status message. Resolves once
    /// the server's own unavailable presence confirms departure.
    pub async fn leave(self, session: &dyn Session, status: Option<String>) -> Result<(), Error> {
        let Some(slot) = self.muc.slot_for(&self.addr) else {
            return Ok(());
        };

        let (tx, rx) = oneshot::channel();
        *slot.depart.lock().unwrap() = Some(tx);

        let payload = maybe(status.map(|s| {
            wrap(
                single(Token::Text(s)),
                StartElement::new(Namespace::NONE, ncname("status")),
            )
        }));
        let presence = Presence {
            id: Some(idgen::new_id()),
            from: None,
            to: Some(self.addr.clone()),
            lang: None,
            type_: PresenceType::Unavailable,
        };
        let stream = presence.wrap(payload);
        session.send(Box::new(stream)).await?;

        match rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(stanza_err)) => Err(Error::Remote(stanza_err)),
            Err(_) => Err(Error::Session(session::Error::LostSession)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_omits_absent_attributes() {
        let h = History {
            max_stanzas: Some(20),
            ..Default::default()
        };
        let mut reader = h.to_reader();
        let start = match reader.read_token().unwrap().unwrap() {
            Token::StartElement(s) => s,
            other => panic!("expected start element, got {other:?}"),
        };
        assert_eq!(start.attrs.get(Namespace::NONE, "maxstanzas"), Some("20"));
        assert!(start.attrs.get(Namespace::NONE, "maxchars").is_none());
    }

    #[tokio::test]
    async fn join_guard_removes_slot_when_future_is_dropped() {
        let muc = Arc::new(Muc::new());
        let room = Jid::new("room@conference.example").unwrap();
        let full = room.bare().with_resource("nick").unwrap();

        let (tx, _rx) = oneshot::channel();
        let slot = Arc::new(Slot {
            join: Mutex::new(Some(tx)),
            depart: Mutex::new(None),
        });
        muc.managed.lock().unwrap().insert(full.clone(), slot);
        let guard = JoinGuard {
            room: full.clone(),
            muc: muc.clone(),
            armed: true,
        };

        assert!(muc.slot_for(&full).is_some());
        drop(guard);
        assert!(muc.slot_for(&full).is_none());
    }
}
