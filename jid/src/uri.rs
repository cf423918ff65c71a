//! Parsing of `xmpp:` and `xmpp://` URIs ([RFC 5122]).
//!
//! [RFC 5122]: https://www.rfc-editor.org/rfc/rfc5122

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use core::fmt;

use percent_encoding::percent_decode_str;

use crate::{Error as JidError, Jid};

/// Bidirectional formatting control code points which RFC 3987 requires be
/// kept percent-encoded even after IRI normalisation, since they are not
/// visually distinguishable from their encoded form and can be used to
/// disguise the meaning of an address.
const BIDI_CONTROLS: [char; 7] = [
    '\u{200E}', // LRM
    '\u{200F}', // RLM
    '\u{202A}', // LRE
    '\u{202B}', // RLE
    '\u{202C}', // PDF
    '\u{202D}', // LRO
    '\u{202E}', // RLO
];

/// Errors which can occur while parsing an `xmpp:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The string did not start with the `xmpp:` scheme.
    MissingScheme,

    /// An `xmpp://` URI had no `/` separating the authority from the path.
    MissingPath,

    /// A JID sub-part (authority or path) failed to parse.
    Jid(JidError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MissingScheme => f.write_str("URI does not start with the xmpp: scheme"),
            Error::MissingPath => f.write_str("xmpp:// URI is missing its path component"),
            Error::Jid(e) => write!(f, "invalid JID in URI: {e}"),
        }
    }
}

impl core::error::Error for Error {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Error::Jid(e) => Some(e),
            _ => None,
        }
    }
}

impl From<JidError> for Error {
    fn from(e: JidError) -> Self {
        Error::Jid(e)
    }
}

/// A single `key` or `key=value` entry from the URI's query part.
pub type QueryItem = (String, Option<String>);

/// A parsed `xmpp:` or `xmpp://` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uri {
    /// The authority JID, present only for the `xmpp://` form.
    pub auth: Option<Jid>,

    /// The recipient JID, taken from the opaque path / authority path.
    pub to: Jid,

    /// The verb this URI requests: the first query key with no value.
    pub action: Option<String>,

    /// All query entries in the order they appeared, action included.
    pub query: Vec<QueryItem>,
}

impl Uri {
    /// Parse an `xmpp:` URI.
    pub fn parse(s: &str) -> Result<Self, Error> {
        let rest = s.strip_prefix("xmpp:").ok_or(Error::MissingScheme)?;

        let (auth, path_and_query) = if let Some(authority) = rest.strip_prefix("//") {
            let slash = authority.find('/').ok_or(Error::MissingPath)?;
            let auth_part = &authority[..slash];
            let auth = Jid::new(&decode_iri(auth_part))?;
            (Some(auth), &authority[slash + 1..])
        } else {
            (None, rest)
        };

        let (path, query_str) = match path_and_query.find('?') {
            Some(idx) => (&path_and_query[..idx], Some(&path_and_query[idx + 1..])),
            None => (path_and_query, None),
        };

        let to = Jid::new(&decode_iri(path))?;

        let mut query = Vec::new();
        let mut action = None;
        if let Some(query_str) = query_str {
            for pair in query_str.split(|c| c == '&' || c == ';') {
                if pair.is_empty() {
                    continue;
                }
                let (key, value) = match pair.find('=') {
                    Some(idx) => (&pair[..idx], Some(&pair[idx + 1..])),
                    None => (pair, None),
                };
                let key = decode_iri(key);
                let value = value.map(decode_iri);
                if action.is_none() && value.as_deref().map(str::is_empty).unwrap_or(true) {
                    action = Some(key.clone());
                }
                query.push((key, value));
            }
        }

        Ok(Uri {
            auth,
            to,
            action,
            query,
        })
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("xmpp:")?;
        if let Some(auth) = &self.auth {
            write!(f, "//{auth}/")?;
        }
        write!(f, "{}", self.to)?;
        if !self.query.is_empty() {
            f.write_str("?")?;
            for (i, (key, value)) in self.query.iter().enumerate() {
                if i > 0 {
                    f.write_str(";")?;
                }
                f.write_str(key)?;
                if let Some(value) = value {
                    write!(f, "={value}")?;
                }
            }
        }
        Ok(())
    }
}

/// Percent-decode `s`, then re-encode bytes that are not part of a strictly
/// legal UTF-8 sequence and any bidirectional formatting code points, per the
/// IRI normalisation rules of RFC 3987 section 3.2.
fn decode_iri(s: &str) -> String {
    let bytes: Vec<u8> = percent_decode_str(s).collect();
    decode_bytes(&bytes)
}

fn decode_bytes(bytes: &[u8]) -> String {
    match core::str::from_utf8(bytes) {
        Ok(s) => reencode_bidi(s),
        Err(e) => {
            let valid_up_to = e.valid_up_to();
            let mut out = reencode_bidi(core::str::from_utf8(&bytes[..valid_up_to]).unwrap());
            let bad_len = e.error_len().unwrap_or(bytes.len() - valid_up_to);
            for b in &bytes[valid_up_to..valid_up_to + bad_len] {
                out.push_str(&format!("%{b:02X}"));
            }
            out.push_str(&decode_bytes(&bytes[valid_up_to + bad_len..]));
            out
        }
    }
}

fn reencode_bidi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if BIDI_CONTROLS.contains(&ch) {
            let mut buf = [0u8; 4];
            for b in ch.encode_utf8(&mut buf).as_bytes() {
                out.push_str(&format!("%{b:02X}"));
            }
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_opaque_form() {
        let uri = Uri::parse("xmpp:romeo@montague.lit?message").unwrap();
        assert_eq!(uri.auth, None);
        assert_eq!(uri.to, Jid::new("romeo@montague.lit").unwrap());
        assert_eq!(uri.action.as_deref(), Some("message"));
    }

    #[test]
    fn parses_authority_form() {
        let uri = Uri::parse("xmpp://guest@example.com/support@example.com?message").unwrap();
        assert_eq!(uri.auth, Some(Jid::new("guest@example.com").unwrap()));
        assert_eq!(uri.to, Jid::new("support@example.com").unwrap());
        assert_eq!(uri.action.as_deref(), Some("message"));
    }

    #[test]
    fn action_is_first_empty_valued_key() {
        let uri = Uri::parse("xmpp:room@muc.example.org?join;password=foo").unwrap();
        assert_eq!(uri.action.as_deref(), Some("join"));
        assert_eq!(
            uri.query,
            vec![
                ("join".to_string(), None),
                ("password".to_string(), Some("foo".to_string())),
            ]
        );
    }

    #[test]
    fn percent_decodes_jid() {
        let uri = Uri::parse("xmpp:room%40muc.example.org?join").unwrap();
        assert_eq!(uri.to, Jid::new("room@muc.example.org").unwrap());
    }

    #[test]
    fn missing_scheme_errors() {
        assert_eq!(
            Uri::parse("not-xmpp:foo@bar").unwrap_err(),
            Error::MissingScheme
        );
    }

    #[test]
    fn display_round_trips() {
        let uri = Uri::parse("xmpp:room@muc.example.org?join").unwrap();
        assert_eq!(uri.to_string(), "xmpp:room@muc.example.org?join");
    }

    #[test]
    fn invalid_jid_propagates() {
        let err = Uri::parse("xmpp:@montague.lit").unwrap_err();
        assert!(matches!(err, Error::Jid(JidError::EmptyLocalpart)));
    }
}
