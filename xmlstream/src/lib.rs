//! Lazy, single-pass XML token-stream primitives.
//!
//! These primitives are the keystone the `stanza` crate builds its
//! marshaling on: every stanza's outbound representation is a
//! [`TokenReader`] assembled from [`wrap`], [`multi_reader`] and friends,
//! and every inbound stanza is parsed by walking a [`TokenReader`] with
//! [`iter_children`] and [`inner`].
//!
//! A stream is finite and not restartable: once it reports an error or end
//! of stream, it must not be read from again.

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

#![warn(missing_docs)]

mod error;
pub mod iter;
mod reader;
mod token;
pub mod transform;

pub use error::Error;
pub use iter::{iter as iter_children, Iter};
pub use reader::{
    copy, discard, fast_forward, inner, multi_reader, single, wrap, Discard, Inner, MultiReader,
    Single, TokenReader, TokenWriter, Wrap,
};
pub use token::{StartElement, Token};
pub use transform::Transformer;
