// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use rxml::{AttrMap, NcName, Namespace};

/// The header of an XML element: its qualified name and attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct StartElement {
    /// The element's namespace.
    pub ns: Namespace,

    /// The element's local name.
    pub name: NcName,

    /// The element's attributes, keyed by (namespace, local name).
    pub attrs: AttrMap,
}

impl StartElement {
    /// Construct a start-element with no attributes.
    pub fn new(ns: Namespace, name: NcName) -> Self {
        StartElement {
            ns,
            name,
            attrs: AttrMap::new(),
        }
    }

    /// Set an attribute, returning `self` for chaining.
    pub fn with_attr(mut self, ns: Namespace, name: NcName, value: impl Into<String>) -> Self {
        self.attrs.insert(ns, name, value.into());
        self
    }

    /// The end-element token that closes this start-element.
    pub fn end(&self) -> Token {
        Token::EndElement
    }
}

/// A single XML token, as produced or consumed by a [`crate::TokenReader`]
/// or [`crate::TokenWriter`].
///
/// Comments and processing instructions are part of the model for
/// completeness, even though the stream-level tokenizer a stanza pipeline
/// sits on top of rejects them outright: XMPP streams never contain them.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// The header of an opening tag.
    StartElement(StartElement),

    /// A closing tag, matching the innermost unclosed [`StartElement`].
    EndElement,

    /// Character data.
    Text(String),

    /// An XML comment.
    Comment(String),

    /// An XML processing instruction.
    ProcessingInstruction {
        /// The PI target name.
        target: String,
        /// The PI's raw data.
        data: String,
    },
}
