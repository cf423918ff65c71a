//! The minimal contract the rest of the library consumes: something that
//! can send a stanza, correlate an IQ request with its response, and
//! expose the raw inbound/outbound token streams.
//!
//! Everything below this crate — TCP/TLS dialing, SASL authentication,
//! and stream feature negotiation — is assumed already done by whatever
//! produces a [`Session`]; this crate only defines the surface the core
//! protocol layers need to drive one.

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

#![warn(missing_docs)]

mod error;
pub mod iq;

pub use error::Error;
pub use iq::{IqResponse, IqResponseFuture, IqTracker};

use async_trait::async_trait;
use bitflags::bitflags;

use jid::Jid;
use xmlstream::{StartElement, TokenReader, TokenWriter};

bitflags! {
    /// The session's negotiated security/authentication state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct State: u8 {
        /// The underlying transport is encrypted (TLS negotiated).
        const SECURE = 0b001;
        /// SASL authentication has completed.
        const AUTHN = 0b010;
        /// Resource binding and stream feature negotiation are complete;
        /// stanzas may be exchanged.
        const READY = 0b100;
    }
}

/// The contract the core protocol layers (ping, MUC, …) drive.
///
/// Implementations are expected to serialize concurrent `send*` calls so
/// that no two stanzas interleave their tokens on the wire, and to read
/// inbound stanzas strictly in arrival order on a single task.
///
/// Cancellation is expressed the idiomatic Rust way: dropping the future
/// returned by `send_iq` (or any `send*` call) aborts the wait and, for
/// `send_iq`, removes the outstanding correlation entry — see
/// [`IqResponseFuture`].
#[async_trait]
pub trait Session: Send + Sync {
    /// Write one top-level element to the wire. Returns once the stanza
    /// has been handed to the outbound writer; does not wait for any
    /// response.
    async fn send(&self, stream: Box<dyn TokenReader + Send>) -> Result<(), Error>;

    /// Write a get/set IQ (already carrying a unique `id` and the correct
    /// `to`) and await the matching result/error response.
    ///
    /// Implementations register the id with their [`IqTracker`] before
    /// writing the request, so a response that arrives before `send`
    /// itself returns (unlikely, but not impossible with a reordering
    /// outbound queue) is not missed.
    async fn send_iq(
        &self,
        stream: Box<dyn TokenReader + Send>,
        id: String,
        to: Option<Jid>,
    ) -> Result<IqResponse, Error>;

    /// Wrap `payload` in `start`'s envelope and send it.
    async fn send_element(
        &self,
        payload: Box<dyn TokenReader + Send>,
        start: StartElement,
    ) -> Result<(), Error>;

    /// Borrow the raw inbound token stream. At most one borrower may hold
    /// this at a time; implementations are expected to enforce that (e.g.
    /// via an internal lock) and panic or block a second concurrent
    /// caller rather than silently interleave reads.
    fn token_reader(&self) -> Box<dyn TokenReader + '_>;

    /// Borrow the raw outbound token stream. Same single-borrower
    /// contract as [`Session::token_reader`].
    fn token_writer(&self) -> Box<dyn TokenWriter + '_>;

    /// This session's own bound address.
    fn local_addr(&self) -> &Jid;

    /// The peer's address (the server, for a client connection).
    fn remote_addr(&self) -> &Jid;

    /// The session's current security/authentication state.
    fn state(&self) -> State;
}
