//! Jabber IDs (JIDs), the addressing scheme of XMPP.
//!
//! A [`Jid`] is a triple of an optional localpart, a required domainpart and
//! an optional resourcepart: `local@domain/resource`. This crate also parses
//! `xmpp:` and `xmpp://` URIs (see [`uri`]), which embed JIDs in their
//! authority and path components.

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

#![warn(missing_docs)]

mod error;
pub mod uri;

pub use error::Error;

use core::fmt;
use core::str::FromStr;

use stringprep::{nodeprep, resourceprep};

/// Control and whitespace bytes which are never allowed to appear raw in a
/// JID, regardless of which part they'd land in.
fn has_forbidden_byte(s: &str) -> bool {
    memchr::memchr3(b' ', b'\t', b'\n', s.as_bytes()).is_some()
        || s.bytes().any(|b| b == b'\r' || b < 0x20 || b == 0x7f)
}

/// A Jabber ID: `[ localpart "@" ] domainpart [ "/" resourcepart ]`.
///
/// Comparison is by equality of all three (normalised) parts. The
/// [`Default`] JID (empty domain, no local/resource parts) compares equal to
/// itself, even though it is not a value [`Jid::new`] could ever produce.
#[derive(Debug, Clone, Default, Eq)]
pub struct Jid {
    local: Option<String>,
    domain: String,
    resource: Option<String>,
}

impl Jid {
    /// Parse a JID from its string representation.
    pub fn new(s: &str) -> Result<Self, Error> {
        if has_forbidden_byte(s) {
            return Err(Error::InvalidCharacter);
        }

        let (rest, resource) = match s.find('/') {
            Some(idx) => (&s[..idx], Some(&s[idx + 1..])),
            None => (s, None),
        };

        let (local, domain) = match rest.find('@') {
            Some(idx) => (Some(&rest[..idx]), &rest[idx + 1..]),
            None => (None, rest),
        };

        let local = match local {
            Some("") => return Err(Error::EmptyLocalpart),
            Some(l) => Some(nodeprep(l).map_err(|_| Error::InvalidLocalpart)?.into_owned()),
            None => None,
        };

        if domain.is_empty() {
            return Err(Error::EmptyDomain);
        }
        let domain = domain.to_lowercase();

        let resource = match resource {
            Some("") => return Err(Error::EmptyResource),
            Some(r) => Some(
                resourceprep(r)
                    .map_err(|_| Error::InvalidResource)?
                    .into_owned(),
            ),
            None => None,
        };

        Ok(Jid {
            local,
            domain,
            resource,
        })
    }

    /// The localpart, if any.
    pub fn local(&self) -> Option<&str> {
        self.local.as_deref()
    }

    /// The domainpart. Never empty for a JID parsed via [`Jid::new`].
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// The resourcepart, if any.
    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    /// True if this JID has no resourcepart.
    pub fn is_bare(&self) -> bool {
        self.resource.is_none()
    }

    /// True if this JID has a resourcepart.
    pub fn is_full(&self) -> bool {
        self.resource.is_some()
    }

    /// Return a copy of this JID with the resourcepart removed.
    pub fn bare(&self) -> Jid {
        Jid {
            local: self.local.clone(),
            domain: self.domain.clone(),
            resource: None,
        }
    }

    /// Return a copy of this JID with the resourcepart replaced.
    pub fn with_resource(&self, resource: &str) -> Result<Jid, Error> {
        if resource.is_empty() {
            return Err(Error::EmptyResource);
        }
        if has_forbidden_byte(resource) {
            return Err(Error::InvalidCharacter);
        }
        let resource = resourceprep(resource)
            .map_err(|_| Error::InvalidResource)?
            .into_owned();
        Ok(Jid {
            local: self.local.clone(),
            domain: self.domain.clone(),
            resource: Some(resource),
        })
    }
}

impl PartialEq for Jid {
    fn eq(&self, other: &Self) -> bool {
        self.local == other.local && self.domain == other.domain && self.resource == other.resource
    }
}

impl core::hash::Hash for Jid {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.local.hash(state);
        self.domain.hash(state);
        self.resource.hash(state);
    }
}

impl Ord for Jid {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        (&self.local, &self.domain, &self.resource).cmp(&(&other.local, &other.domain, &other.resource))
    }
}

impl PartialOrd for Jid {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(local) = &self.local {
            write!(f, "{local}@")?;
        }
        f.write_str(&self.domain)?;
        if let Some(resource) = &self.resource {
            write!(f, "/{resource}")?;
        }
        Ok(())
    }
}

impl FromStr for Jid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        Jid::new(s)
    }
}

impl TryFrom<&str> for Jid {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self, Error> {
        Jid::new(s)
    }
}

impl TryFrom<String> for Jid {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Error> {
        Jid::new(&s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_jid() {
        let jid = Jid::new("romeo@montague.lit/orchard").unwrap();
        assert_eq!(jid.local(), Some("romeo"));
        assert_eq!(jid.domain(), "montague.lit");
        assert_eq!(jid.resource(), Some("orchard"));
        assert_eq!(jid.to_string(), "romeo@montague.lit/orchard");
    }

    #[test]
    fn parses_bare_jid() {
        let jid = Jid::new("montague.lit").unwrap();
        assert_eq!(jid.local(), None);
        assert_eq!(jid.resource(), None);
        assert!(jid.is_bare());
    }

    #[test]
    fn rejects_empty_domain() {
        assert_eq!(Jid::new("romeo@").unwrap_err(), Error::EmptyDomain);
        assert_eq!(Jid::new("romeo@/orchard").unwrap_err(), Error::EmptyDomain);
    }

    #[test]
    fn rejects_empty_localpart() {
        assert_eq!(Jid::new("@montague.lit").unwrap_err(), Error::EmptyLocalpart);
    }

    #[test]
    fn rejects_raw_whitespace() {
        assert_eq!(
            Jid::new("ro meo@montague.lit").unwrap_err(),
            Error::InvalidCharacter
        );
    }

    #[test]
    fn bare_zeroes_resource() {
        let full = Jid::new("romeo@montague.lit/orchard").unwrap();
        let bare = full.bare();
        assert_eq!(bare, Jid::new("romeo@montague.lit").unwrap());
    }

    #[test]
    fn with_resource_replaces() {
        let bare = Jid::new("romeo@montague.lit").unwrap();
        let full = bare.with_resource("balcony").unwrap();
        assert_eq!(full, Jid::new("romeo@montague.lit/balcony").unwrap());
    }

    #[test]
    fn zero_jids_are_equal() {
        assert_eq!(Jid::default(), Jid::default());
    }

    #[test]
    fn domain_is_case_insensitive() {
        let a = Jid::new("romeo@Montague.LIT").unwrap();
        let b = Jid::new("romeo@montague.lit").unwrap();
        assert_eq!(a, b);
    }
}
