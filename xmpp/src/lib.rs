//! Protocol layers built on top of the `session` and `mux` crates: ping,
//! delayed delivery, stanza forwarding, message carbons, delivery
//! receipts, the roster, entity time, and the [`muc`] room client.
//!
//! Every outbound operation here composes a [`xmlstream::TokenReader`] and
//! hands it to a [`session::Session`]; every inbound protocol layer
//! registers one or more handlers on a [`mux::MuxBuilder`]. Nothing in
//! this crate talks to a socket directly.

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

#![warn(missing_docs)]

mod error;

pub mod carbons;
pub mod delay;
pub mod forms;
pub mod forward;
pub mod muc;
pub mod ping;
pub mod receipts;
pub mod roster;
pub mod time;

pub use error::Error;

use xmlstream::{Iter, Token, TokenReader};

/// A [`TokenReader`] that immediately ends: used as the payload of an
/// element with no children.
///
/// `xmlstream::multi_reader` composes via `Box<dyn TokenReader>` (no
/// `Send` bound), which makes it unusable as part of a stream handed to
/// [`session::Session::send`]/`send_iq` (both require `Box<dyn
/// TokenReader + Send>`). This unit struct carries no such baggage.
pub(crate) struct Empty;

impl TokenReader for Empty {
    fn read_token(&mut self) -> Result<Option<Token>, xmlstream::Error> {
        Ok(None)
    }
}

/// Concatenates two `Send`-able token streams, for the same reason
/// [`Empty`] exists: `xmlstream::multi_reader`'s heterogeneous `Box<dyn
/// TokenReader>` storage cannot be `Send`. Nest to chain more than two.
pub(crate) struct Chain<A, B> {
    first: Option<A>,
    second: Option<B>,
}

impl<A, B> Chain<A, B> {
    pub(crate) fn new(first: A, second: B) -> Self {
        Chain {
            first: Some(first),
            second: Some(second),
        }
    }
}

impl<A: TokenReader, B: TokenReader> TokenReader for Chain<A, B> {
    fn read_token(&mut self) -> Result<Option<Token>, xmlstream::Error> {
        if let Some(first) = self.first.as_mut() {
            match first.read_token()? {
                Some(t) => return Ok(Some(t)),
                None => self.first = None,
            }
        }
        if let Some(second) = self.second.as_mut() {
            match second.read_token()? {
                Some(t) => return Ok(Some(t)),
                None => self.second = None,
            }
        }
        Ok(None)
    }
}

/// Concatenates an arbitrary number of `Send`-able token streams, for
/// lists whose length isn't known until run time (form fields, a field's
/// values). Same rationale as [`Chain`]; use that instead when the count
/// is fixed at two.
pub(crate) struct ChainAll(std::collections::VecDeque<Box<dyn TokenReader + Send>>);

impl ChainAll {
    pub(crate) fn new(items: Vec<Box<dyn TokenReader + Send>>) -> Self {
        ChainAll(items.into())
    }
}

impl TokenReader for ChainAll {
    fn read_token(&mut self) -> Result<Option<Token>, xmlstream::Error> {
        while let Some(front) = self.0.front_mut() {
            if let Some(t) = front.read_token()? {
                return Ok(Some(t));
            }
            self.0.pop_front();
        }
        Ok(None)
    }
}

/// Either of two `Send`-able token streams, picked at construction time.
/// Lets an optional child element be composed into a [`Chain`] without
/// falling back to `Box<dyn TokenReader>` (see [`Empty`]).
pub(crate) enum Either<A, B> {
    Left(A),
    Right(B),
}

/// Wrap `r` so its absence can still be chained: `Some(r)` becomes the
/// stream itself, `None` becomes [`Empty`].
pub(crate) fn maybe<R: TokenReader>(r: Option<R>) -> Either<R, Empty> {
    match r {
        Some(r) => Either::Left(r),
        None => Either::Right(Empty),
    }
}

impl<A: TokenReader, B: TokenReader> TokenReader for Either<A, B> {
    fn read_token(&mut self) -> Result<Option<Token>, xmlstream::Error> {
        match self {
            Either::Left(a) => a.read_token(),
            Either::Right(b) => b.read_token(),
        }
    }
}

/// Replays the currently active child of an [`Iter`] as a plain
/// [`TokenReader`] over just its own content, so it can be fed back into
/// [`xmlstream::iter`] to descend one level further.
pub(crate) struct ActiveChild<'a, R: TokenReader>(pub(crate) &'a mut Iter<R>);

impl<'a, R: TokenReader> TokenReader for ActiveChild<'a, R> {
    fn read_token(&mut self) -> Result<Option<Token>, xmlstream::Error> {
        self.0.child_token()
    }
}

/// Generate a fresh stanza id and stamp it onto `iq`, returning both the
/// id (for `Session::send_iq`'s correlation key) and the wrapped stream.
pub(crate) fn stamp_iq<R: TokenReader>(mut iq: stanza::Iq, payload: R) -> (String, impl TokenReader) {
    let id = idgen::new_id();
    iq.id = id.clone();
    (id, iq.wrap(payload))
}
