// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Namespace constants used across the stanza model and protocol layers.
//!
//! These are plain `&str` constants rather than `Namespace` values: building
//! a `Namespace` can allocate, and most call sites just need to compare or
//! format, so the conversion is left to the caller via `Namespace::from`.

/// The stream namespace used by XMPP clients.
pub const CLIENT: &str = "jabber:client";

/// The stream namespace used between XMPP servers.
pub const SERVER: &str = "jabber:server";

/// Namespace for `<error/>` condition elements.
pub const STANZAS: &str = "urn:ietf:params:xml:ns:xmpp-stanzas";

/// Namespace for resource binding.
pub const BIND: &str = "urn:ietf:params:xml:ns:xmpp-bind";

/// Namespace for SASL negotiation.
pub const SASL: &str = "urn:ietf:params:xml:ns:xmpp-sasl";

/// Namespace for STARTTLS negotiation.
pub const TLS: &str = "urn:ietf:params:xml:ns:xmpp-tls";

/// Namespace of the `xml:` prefix, used for `xml:lang`.
pub const XML: &str = "http://www.w3.org/XML/1998/namespace";

/// XEP-0199: XMPP Ping.
pub const PING: &str = "urn:xmpp:ping";

/// XEP-0203: Delayed Delivery.
pub const DELAY: &str = "urn:xmpp:delay";

/// XEP-0297: Stanza Forwarding.
pub const FORWARD: &str = "urn:xmpp:forward:0";

/// XEP-0280: Message Carbons.
pub const CARBONS: &str = "urn:xmpp:carbons:2";

/// XEP-0184: Message Delivery Receipts.
pub const RECEIPTS: &str = "urn:xmpp:receipts";

/// XEP-0202: Entity Time.
pub const TIME: &str = "urn:xmpp:time";

/// XEP-0393: Message Styling.
pub const STYLING: &str = "urn:xmpp:styling:0";

/// XEP-0359: Unique and Stable Stanza IDs.
pub const SID: &str = "urn:xmpp:sid:0";

/// XEP-0045: Multi-User Chat (join namespace).
pub const MUC: &str = "http://jabber.org/protocol/muc";

/// XEP-0045: Multi-User Chat, user namespace.
pub const MUC_USER: &str = "http://jabber.org/protocol/muc#user";

/// XEP-0045: Multi-User Chat, admin namespace.
pub const MUC_ADMIN: &str = "http://jabber.org/protocol/muc#admin";

/// XEP-0045: Multi-User Chat, room configuration namespace.
pub const MUC_OWNER: &str = "http://jabber.org/protocol/muc#owner";

/// XEP-0249: Direct MUC Invitations.
pub const CONFERENCE: &str = "jabber:x:conference";

/// RFC 6121 roster management.
pub const ROSTER: &str = "jabber:iq:roster";

/// XEP-0004: Data Forms.
pub const DATA_FORMS: &str = "jabber:x:data";
